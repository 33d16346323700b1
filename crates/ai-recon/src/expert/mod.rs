//! The `expert` module handles everything related to the Expert construct.
//!
//! An Expert is an assistant answering questions over one local data file.
//! Initializing it reconciles, in order:
//! - the data file, uploaded for the `assistants` purpose,
//! - the vector store holding that file,
//! - the assistant, with the `file_search` tool over that store.
//!
//! Every question runs in its own thread, deleted once the answer is read.

// region:    --- Modules

mod event;

pub use event::ExpertEvent;

use crate::agent::{Agent, HardCodedTools};
use crate::ais::asst::{self, CreateConfig};
use crate::ais::chat::OpenAiChat;
use crate::ais::embed::OpenAiEmbedder;
use crate::ais::file::{ensure_file, PURPOSE_ASSISTANTS};
use crate::ais::fine_tune::{ensure_fine_tuned_model, FineTuneJob};
use crate::ais::thread::{self, RunPolicy};
use crate::ais::vector_store::ensure_vector_store;
use crate::ais::{new_ais_client, AisClient, AsstId, ThreadId};
use crate::config::Config;
use crate::event::{Event, EventBus};
use crate::reconcile::Reconciled;
use crate::store::{
	answer_from_matches, ensure_document, search_documents, MatchedDocument, SupabaseStore,
	DEFAULT_ANSWER_PROMPT,
};
use crate::{Error, Result};
use simple_fs::read_to_string;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast::Receiver;

// endregion: --- Modules

#[derive(Debug)]
pub struct Expert {
	dir: PathBuf,
	ais_client: AisClient,
	asst_id: AsstId,
	config: Config,
	event_bus: EventBus,
}

/// Constructor functions
impl Expert {
	pub async fn init_from_dir(
		dir: impl AsRef<Path>,
		recreate_asst: bool,
		event_bus: Option<EventBus>,
	) -> Result<Self> {
		let dir = dir.as_ref();

		let event_bus = event_bus.unwrap_or_else(EventBus::new);

		// -- Load from the directory
		let config = Config::load_from_dir(dir)?;

		let ais_client = new_ais_client(&config.openai, event_bus.clone())?;

		// -- Ensure the data file and its vector store
		let expert_config = &config.expert;
		let file_id = ensure_file(
			&ais_client,
			&dir.join(&expert_config.data_file),
			expert_config.upload_name.as_deref(),
			PURPOSE_ASSISTANTS,
		)
		.await?
		.into_id();

		let vector_store_id =
			ensure_vector_store(&ais_client, &expert_config.vector_store, &[file_id])
				.await?
				.into_id();

		// -- Get or Create the OpenAI Assistant
		let asst_config = CreateConfig {
			name: expert_config.name.clone(),
			model: expert_config.model.clone(),
			instructions: read_optional(&dir.join(&expert_config.instructions_file))?,
			vector_store_ids: vec![vector_store_id],
		};
		let asst_id =
			asst::load_or_create(&ais_client, asst_config, recreate_asst).await?;

		// -- Create expert
		let expert = Expert {
			dir: dir.to_path_buf(),
			ais_client,
			asst_id,
			config,
			event_bus,
		};

		// -- Upload instructions, an existing assistant may have older ones
		expert.refresh_instructions().await?;

		expert.event_bus.send(ExpertEvent::Ready {
			name: expert.name().to_string(),
		})?;

		Ok(expert)
	}
}

/// Public functions
impl Expert {
	pub fn name(&self) -> &str {
		&self.config.expert.name
	}

	pub fn subscribe(&self) -> Result<Receiver<Event>> {
		self.event_bus.subscribe()
	}

	/// Re-uploads the instructions file. Returns false when there is no such file.
	pub async fn refresh_instructions(&self) -> Result<bool> {
		let file = self.dir.join(&self.config.expert.instructions_file);
		match read_optional(&file)? {
			Some(inst_content) => {
				asst::upload_instructions(&self.ais_client, &self.asst_id, inst_content)
					.await?;
				self.event_bus.send(ExpertEvent::InstUploaded)?;
				Ok(true)
			}
			None => Ok(false),
		}
	}

	/// Asks `query` in a new thread and returns the text of the answer.
	///
	/// The thread is deleted afterwards, whether the run succeeded or not.
	pub async fn ask(&self, query: &str) -> Result<String> {
		if query.trim().is_empty() {
			return Err(Error::EmptyQuery);
		}

		let thread_id = thread::create_thread(&self.ais_client, &HashMap::new()).await?;
		self.event_bus.send(ExpertEvent::QuestionSent {
			thread_id: thread_id.to_string(),
		})?;

		let answer = self.ask_in_thread(&thread_id, query).await;

		thread::delete_thread(&self.ais_client, &thread_id).await?;

		answer
	}

	/// The tool-calling agent, on the `[agent]` model and prompt, with the built-in tools.
	pub fn agent(&self) -> Result<Agent<OpenAiChat, HardCodedTools>> {
		let agent_config = &self.config.agent;
		let chat = OpenAiChat::new(&self.ais_client, &agent_config.model);

		let mut agent = Agent::new(chat, HardCodedTools, self.event_bus.clone())
			.with_max_iterations(agent_config.max_iterations);
		if let Some(file) = &agent_config.system_prompt_file {
			if let Some(prompt) = read_optional(&self.dir.join(file))? {
				agent = agent.with_system_prompt(prompt);
			}
		}

		Ok(agent)
	}

	/// Ensures the `[fine_tune]` training file has a succeeded job and returns that job.
	pub async fn fine_tune(&self) -> Result<FineTuneJob> {
		ensure_fine_tuned_model(&self.ais_client, &self.dir, &self.config.fine_tune).await
	}

	/// Asks `question` to `model`, typically a fine-tuned one, without tools.
	pub async fn ask_model(&self, model: &str, question: &str) -> Result<String> {
		OpenAiChat::new(&self.ais_client, model).ask(question).await
	}

	/// Stores `content` with its embedding in the `[documents]` table, unless already there.
	pub async fn ensure_document(&self, content: &str) -> Result<Reconciled> {
		let documents = &self.config.documents;
		let store = SupabaseStore::from_env(documents)?;
		let embedder = OpenAiEmbedder::new(&self.ais_client, &documents.embedding_model);

		ensure_document(&store, &embedder, content, &self.event_bus).await
	}

	/// The `[documents]` rows closest to `query`, best first.
	pub async fn search_documents(&self, query: &str) -> Result<Vec<MatchedDocument>> {
		let documents = &self.config.documents;
		let store = SupabaseStore::from_env(documents)?;
		let embedder = OpenAiEmbedder::new(&self.ais_client, &documents.embedding_model);

		search_documents(&store, &embedder, query, documents.match_count).await
	}

	/// Answers `question` from the closest document of the `[documents]` table.
	pub async fn answer_from_documents(&self, question: &str) -> Result<String> {
		let matches = self.search_documents(question).await?;

		let documents = &self.config.documents;
		let system_prompt = match &documents.answer_prompt_file {
			Some(file) => read_optional(&self.dir.join(file))?,
			None => None,
		};
		let system_prompt = system_prompt.unwrap_or_else(|| DEFAULT_ANSWER_PROMPT.to_string());
		let chat = OpenAiChat::new(&self.ais_client, &documents.answer_model);

		answer_from_matches(&chat, &system_prompt, &matches, question).await
	}
}

/// Private functions
impl Expert {
	async fn ask_in_thread(&self, thread_id: &ThreadId, query: &str) -> Result<String> {
		thread::add_user_message(&self.ais_client, thread_id, query).await?;

		let run_instructions = match &self.config.expert.run_instructions_file {
			Some(file) => read_optional(&self.dir.join(file))?,
			None => None,
		};

		thread::run_and_wait(
			&self.ais_client,
			thread_id,
			&self.asst_id,
			run_instructions.as_deref(),
			RunPolicy::default(),
		)
		.await?;

		thread::latest_message_text(&self.ais_client, thread_id).await
	}
}

fn read_optional(file: &Path) -> Result<Option<String>> {
	if file.exists() {
		Ok(Some(read_to_string(file)?))
	} else {
		Ok(None)
	}
}
