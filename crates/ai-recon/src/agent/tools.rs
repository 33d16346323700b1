//! The agent tool table and its dispatch.

use crate::agent::ToolCall;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// region:    --- Tool Table

pub const GET_CURRENT_WEATHER: &str = "getCurrentWeather";
pub const GET_LOCATION: &str = "getLocation";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
	GetCurrentWeather,
	GetLocation,
}

impl ToolName {
	pub fn from_name(name: &str) -> Result<Self> {
		match name {
			GET_CURRENT_WEATHER => Ok(ToolName::GetCurrentWeather),
			GET_LOCATION => Ok(ToolName::GetLocation),
			other => Err(Error::UnknownTool(other.to_string())),
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			ToolName::GetCurrentWeather => GET_CURRENT_WEATHER,
			ToolName::GetLocation => GET_LOCATION,
		}
	}
}

/// A function tool advertised to the model.
#[derive(Debug, Clone)]
pub struct ToolSpec {
	pub name: &'static str,
	pub description: &'static str,
	/// JSON schema of the arguments object.
	pub parameters: Value,
}

pub fn tool_specs() -> Vec<ToolSpec> {
	vec![
		ToolSpec {
			name: GET_CURRENT_WEATHER,
			description: "Get the current weather",
			parameters: json!({
				"type": "object",
				"properties": {
					"location": {
						"type": "string",
						"description": "The location to get the weather for, as an address"
					}
				},
				"required": ["location"]
			}),
		},
		ToolSpec {
			name: GET_LOCATION,
			description: "Get the user's current location",
			parameters: json!({
				"type": "object",
				"properties": {},
				"required": []
			}),
		},
	]
}

// endregion: --- Tool Table

// region:    --- Tools

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
	pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weather {
	pub temperature: String,
	pub unit: String,
	pub forecast: String,
}

impl Weather {
	fn new(temperature: &str, forecast: &str) -> Self {
		Self {
			temperature: temperature.to_string(),
			unit: "C".to_string(),
			forecast: forecast.to_string(),
		}
	}
}

#[async_trait]
pub trait WeatherTools: Send + Sync {
	async fn current_weather(&self, location: &Location) -> Result<Weather>;

	async fn current_location(&self) -> Result<Location>;
}

/// Canned answers, no network.
#[derive(Debug, Clone, Default)]
pub struct HardCodedTools;

#[async_trait]
impl WeatherTools for HardCodedTools {
	async fn current_weather(&self, location: &Location) -> Result<Weather> {
		let address = location.address.to_lowercase();

		let weather = if address.contains("bhubaneswar") {
			Weather::new("35", "Sunny")
		} else if address.contains("oslo") {
			Weather::new("23", "Rainy")
		} else {
			Weather::new("15", "Windy")
		};

		Ok(weather)
	}

	async fn current_location(&self) -> Result<Location> {
		Ok(Location {
			address: "Delta Square, Bhubaneswar, Odisha, India".to_string(),
		})
	}
}

// endregion: --- Tools

// region:    --- Dispatch

#[derive(Debug, Deserialize)]
struct WeatherArgs {
	location: String,
}

/// Runs the tool named by `call` and returns the content of the `tool` message.
///
/// An unknown tool name or arguments that do not match the tool schema are errors.
pub async fn dispatch<T>(tools: &T, call: &ToolCall) -> Result<String>
where
	T: WeatherTools + ?Sized,
{
	match ToolName::from_name(&call.name)? {
		ToolName::GetCurrentWeather => {
			let args: WeatherArgs =
				serde_json::from_str(&call.arguments).map_err(|err| Error::ToolArguments {
					tool: call.name.clone(),
					cause: err.to_string(),
				})?;
			let location = Location {
				address: args.location,
			};
			let weather = tools.current_weather(&location).await?;
			Ok(serde_json::to_string(&weather)?)
		}
		ToolName::GetLocation => {
			let location = tools.current_location().await?;
			Ok(location.address)
		}
	}
}

// endregion: --- Dispatch

// region:    --- Tests


// endregion: --- Tests
