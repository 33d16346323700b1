//! The `ais` module is the interface with the OpenAI platform.
//!
//! Each remote resource kind (files, assistants, vector stores, fine-tune jobs) plugs
//! into the `reconcile` protocol with a lister and a creator, and exposes an `ensure_*`
//! function doing the find-or-create.
//!
//! Two clients live side by side in [`AisClient`]:
//! - a `reqwest` client for the list/create/get JSON surface, where the cursor (`after`)
//!   and `has_more` are needed on every resource kind,
//! - the `async-openai` client for chat completions and embeddings.

// region:    --- Modules

pub mod asst;
pub mod chat;
pub mod embed;
mod event;
pub mod file;
pub mod fine_tune;
pub mod thread;
mod types;
pub mod vector_store;

pub use event::AisEvent;
pub use types::*;

use crate::config::{openai_api_key, OpenAiConfig};
use crate::event::EventBus;
use crate::reconcile::{self, Creator, Lister, Page, Reconciled};
use crate::utils::http::{check_status, read_json};
use crate::{Error, Result};
use async_openai::config::OpenAIConfig;
use async_openai::Client;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::multipart::Form;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// endregion: --- Modules

// region:    --- Client

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const PAGE_LIMIT: &str = "100";

pub type OaClient = Client<OpenAIConfig>;

/// Wraps the OpenAI clients and provides additional functionalities
/// such as an event bus.
#[derive(Debug, Clone)]
pub struct AisClient {
	http: reqwest::Client,
	api_base: String,
	oa_client: OaClient,
	event_bus: EventBus,
}

impl AisClient {
	pub fn new(
		api_key: &str,
		api_base: Option<&str>,
		event_bus: EventBus,
	) -> Result<Self> {
		let api_base = api_base
			.unwrap_or(DEFAULT_API_BASE)
			.trim_end_matches('/')
			.to_string();

		let mut headers = HeaderMap::new();
		let bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
			.map_err(|_| Error::InvalidApiKey)?;
		headers.insert(AUTHORIZATION, bearer);
		headers.insert("openai-beta", HeaderValue::from_static("assistants=v2"));
		let http = reqwest::Client::builder().default_headers(headers).build()?;

		let oa_config = OpenAIConfig::new()
			.with_api_key(api_key)
			.with_api_base(&api_base);

		Ok(AisClient {
			http,
			api_base,
			oa_client: Client::with_config(oa_config),
			event_bus,
		})
	}

	pub fn oa_client(&self) -> &OaClient {
		&self.oa_client
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}
}

/// Builds the client from the environment key (`OPEN_API_KEY`) and the `[openai]` config.
///
/// Fails before any network call when the key is missing.
pub fn new_ais_client(
	config: &OpenAiConfig,
	event_bus: EventBus,
) -> Result<AisClient> {
	let api_key = openai_api_key()?;
	AisClient::new(&api_key, config.api_base.as_deref(), event_bus)
}

// endregion: --- Client

// region:    --- Rest

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
	data: Vec<T>,
	#[serde(default)]
	has_more: bool,
}

#[derive(Debug, Deserialize)]
struct Deleted {
	#[serde(default)]
	deleted: bool,
}

impl AisClient {
	fn url(&self, path: &str) -> String {
		format!("{}{path}", self.api_base)
	}

	/// One page of `path`, newest first, following `after` when given.
	pub(crate) async fn list_page<T>(
		&self,
		path: &str,
		filters: &[(&str, &str)],
		after: Option<&str>,
	) -> Result<Page<T>>
	where
		T: DeserializeOwned,
	{
		let mut query: Vec<(&str, &str)> = vec![("limit", PAGE_LIMIT)];
		query.extend_from_slice(filters);
		if let Some(after) = after {
			query.push(("after", after));
		}

		let res = self.http.get(self.url(path)).query(&query).send().await?;
		let list: ListResponse<T> = read_json(res).await?;

		Ok(Page::new(list.data, list.has_more))
	}

	pub(crate) async fn get_json<T>(&self, path: &str) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let res = self.http.get(self.url(path)).send().await?;
		read_json(res).await
	}

	pub(crate) async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
	where
		B: Serialize + ?Sized,
		T: DeserializeOwned,
	{
		let res = self.http.post(self.url(path)).json(body).send().await?;
		read_json(res).await
	}

	pub(crate) async fn post_multipart<T>(&self, path: &str, form: Form) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let res = self.http.post(self.url(path)).multipart(form).send().await?;
		read_json(res).await
	}

	/// Returns the `deleted` flag reported by the server.
	pub(crate) async fn delete(&self, path: &str) -> Result<bool> {
		let res = self.http.delete(self.url(path)).send().await?;
		let res = check_status(res).await?;
		let deleted: Deleted = res.json().await?;
		Ok(deleted.deleted)
	}
}

// endregion: --- Rest

// region:    --- Ensure

/// Find-or-create over `lister` and `creator`, reporting the outcome on the event bus.
pub(crate) async fn ensure<L, C>(
	event_bus: &EventBus,
	kind: ResourceKind,
	lister: &L,
	name: &str,
	creator: &C,
) -> Result<Reconciled>
where
	L: Lister + ?Sized,
	C: Creator + ?Sized,
{
	let announced = Announced {
		event_bus,
		kind,
		name,
		inner: creator,
	};
	let res = reconcile::find_or_create(lister, name, &announced).await?;

	let res_ref = ResourceRef::new(kind, name, res.id());
	if res.found() {
		event_bus.send(AisEvent::ResourceFound(res_ref))?;
	} else {
		event_bus.send(AisEvent::ResourceCreated(res_ref))?;
	}

	Ok(res)
}

/// Sends `ResourceCreating` before delegating to the wrapped creator.
struct Announced<'a, C: ?Sized> {
	event_bus: &'a EventBus,
	kind: ResourceKind,
	name: &'a str,
	inner: &'a C,
}

#[async_trait]
impl<'a, C> Creator for Announced<'a, C>
where
	C: Creator + ?Sized,
{
	async fn create(&self) -> Result<String> {
		self.event_bus.send(AisEvent::ResourceCreating {
			kind: self.kind,
			name: self.name.to_string(),
		})?;
		self.inner.create().await
	}
}

// endregion: --- Ensure
