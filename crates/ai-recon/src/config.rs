//! `recon.toml` and environment configuration.
//!
//! Demo content (data files, instructions, prompts) is referenced from the toml,
//! never embedded in code.

use crate::{Error, Result};
use serde::Deserialize;
use simple_fs::load_toml;
use std::path::Path;
use std::time::Duration;

pub const RECON_TOML: &str = "recon.toml";

// region:    --- Env

pub const ENV_OPEN_API_KEY: &str = "OPEN_API_KEY";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_SUPABASE_API_KEY: &str = "SUPABASE_API_KEY";
pub const ENV_SUPABASE_PROJECT_URL: &str = "SUPABASE_PROJECT_URL";

/// `OPEN_API_KEY`, falling back to the more common `OPENAI_API_KEY`.
pub fn openai_api_key() -> Result<String> {
	env_var(ENV_OPEN_API_KEY)
		.or_else(|_| env_var(ENV_OPENAI_API_KEY))
		.map_err(|_| Error::MissingEnv(ENV_OPEN_API_KEY))
}

#[derive(Debug, Clone)]
pub struct SupabaseEnv {
	pub api_key: String,
	pub project_url: String,
}

pub fn supabase_env() -> Result<SupabaseEnv> {
	Ok(SupabaseEnv {
		api_key: env_var(ENV_SUPABASE_API_KEY)?,
		project_url: env_var(ENV_SUPABASE_PROJECT_URL)?,
	})
}

fn env_var(name: &'static str) -> Result<String> {
	match std::env::var(name) {
		Ok(val) if !val.trim().is_empty() => Ok(val),
		_ => Err(Error::MissingEnv(name)),
	}
}

// endregion: --- Env

// region:    --- Config

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	#[serde(default)]
	pub openai: OpenAiConfig,
	pub expert: ExpertConfig,
	#[serde(default)]
	pub agent: AgentConfig,
	#[serde(default)]
	pub fine_tune: FineTuneConfig,
	#[serde(default)]
	pub documents: DocumentsConfig,
}

impl Config {
	pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Self> {
		let config: Config = load_toml(dir.as_ref().join(RECON_TOML))?;
		Ok(config)
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiConfig {
	/// Overrides `https://api.openai.com/v1`.
	pub api_base: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExpertConfig {
	pub name: String,
	#[serde(default = "default_chat_model")]
	pub model: String,
	pub instructions_file: String,
	pub run_instructions_file: Option<String>,
	/// Local file made searchable by the assistant.
	pub data_file: String,
	/// Name given to the uploaded file. Defaults to the data file name.
	pub upload_name: Option<String>,
	pub vector_store: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
	pub model: String,
	pub max_iterations: u32,
	pub system_prompt_file: Option<String>,
}

impl Default for AgentConfig {
	fn default() -> Self {
		Self {
			model: default_chat_model(),
			max_iterations: 5,
			system_prompt_file: None,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FineTuneConfig {
	pub training_file: String,
	pub base_model: String,
	/// Interval between two checks of an existing job.
	pub watch_interval_secs: u64,
	/// Checks of an existing job before giving up on it and starting a new one.
	pub watch_max_attempts: u32,
	/// Interval between two checks of a freshly started job (no attempt cap).
	pub await_interval_secs: u64,
}

impl Default for FineTuneConfig {
	fn default() -> Self {
		Self {
			training_file: "finetunedata.jsonl".to_string(),
			base_model: "gpt-3.5-turbo".to_string(),
			watch_interval_secs: 10,
			watch_max_attempts: 5,
			await_interval_secs: 5,
		}
	}
}

impl FineTuneConfig {
	pub fn watch_interval(&self) -> Duration {
		Duration::from_secs(self.watch_interval_secs)
	}

	pub fn await_interval(&self) -> Duration {
		Duration::from_secs(self.await_interval_secs)
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DocumentsConfig {
	pub table: String,
	pub embedding_model: String,
	pub page_size: u32,
	/// SQL function called for semantic search.
	pub match_function: String,
	pub match_threshold: f32,
	/// Documents returned by a search.
	pub match_count: u32,
	/// Model answering from the best matching document.
	pub answer_model: String,
	pub answer_prompt_file: Option<String>,
}

impl Default for DocumentsConfig {
	fn default() -> Self {
		Self {
			table: "documents".to_string(),
			embedding_model: "text-embedding-ada-002".to_string(),
			page_size: 100,
			match_function: "match_documents".to_string(),
			match_threshold: 0.5,
			match_count: 2,
			answer_model: default_chat_model(),
			answer_prompt_file: None,
		}
	}
}

fn default_chat_model() -> String {
	"gpt-4".to_string()
}

// endregion: --- Config

// region:    --- Tests

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_config_minimal_uses_defaults() {
		let content = r#"
[expert]
name = "Movie Expert"
instructions_file = "instructions.md"
data_file = "data/movies.txt"
vector_store = "movies_vector_store"
"#;
		let config: Config = toml::from_str(content).expect("config should parse");

		assert_eq!(config.expert.model, "gpt-4");
		assert!(config.expert.upload_name.is_none());
		assert_eq!(config.agent.max_iterations, 5);
		assert_eq!(config.fine_tune.watch_max_attempts, 5);
		assert_eq!(config.fine_tune.await_interval(), Duration::from_secs(5));
		assert_eq!(config.documents.table, "documents");
		assert_eq!(config.documents.match_function, "match_documents");
		assert_eq!(config.documents.match_count, 2);
		assert!(config.openai.api_base.is_none());
	}

	#[test]
	fn test_config_sections_override() {
		let content = r#"
[openai]
api_base = "http://localhost:8080/v1"

[expert]
name = "Movie Expert"
model = "gpt-4o"
instructions_file = "instructions.md"
run_instructions_file = "run-instructions.md"
data_file = "data/movies.txt"
upload_name = "movie_details.txt"
vector_store = "movies_vector_store"

[agent]
max_iterations = 3

[fine_tune]
training_file = "motivation.jsonl"
watch_max_attempts = 2

[documents]
table = "podcasts"
match_function = "match_podcasts"
match_threshold = 0.7
"#;
		let config: Config = toml::from_str(content).expect("config should parse");

		assert_eq!(
			config.openai.api_base.as_deref(),
			Some("http://localhost:8080/v1")
		);
		assert_eq!(config.expert.upload_name.as_deref(), Some("movie_details.txt"));
		assert_eq!(config.agent.max_iterations, 3);
		assert_eq!(config.agent.model, "gpt-4");
		assert_eq!(config.fine_tune.training_file, "motivation.jsonl");
		assert_eq!(config.fine_tune.base_model, "gpt-3.5-turbo");
		assert_eq!(config.fine_tune.watch_max_attempts, 2);
		assert_eq!(config.documents.table, "podcasts");
		assert_eq!(config.documents.match_function, "match_podcasts");
		assert_eq!(config.documents.match_threshold, 0.7);
		assert_eq!(config.documents.embedding_model, "text-embedding-ada-002");
	}

	#[test]
	fn test_config_missing_expert_is_error() {
		let res = toml::from_str::<Config>("[agent]\nmax_iterations = 2\n");

		assert!(res.is_err());
	}
}

// endregion: --- Tests
