use crate::event;
use async_openai::error::OpenAIError;
use derive_more::From;
use std::io;
use tokio::sync::broadcast;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, From)]
pub enum Error {
	// -- Config
	MissingEnv(&'static str),
	InvalidApiKey,

	// -- Validation
	EmptyQuery,
	EmptyContent,
	LocalFileNotFound(String),

	// -- ais
	Api {
		status: u16,
		body: String,
	},
	RunFailed {
		run_id: String,
		status: String,
	},
	RunTimedOut {
		run_id: String,
	},
	NoMessageFoundInThread(String),
	NoTextInMessage(String),
	NoIdInCreateResponse,
	NoChoiceInChatResponse,
	NoEmbeddingInResponse,
	NoMatchingDocument,
	FineTuneJobFailed(String),

	// -- agent
	UnknownTool(String),
	ToolArguments {
		tool: String,
		cause: String,
	},

	// -- Event
	#[from]
	BoadcastSend(broadcast::error::SendError<event::Event>),

	// -- Std
	#[from]
	IO(io::Error),

	// -- Externals
	#[from]
	SimpleFs(simple_fs::Error),
	#[from]
	SerdeJson(serde_json::Error),
	#[from]
	Http(reqwest::Error),
	#[from]
	OpenAI(OpenAIError),
}

impl Error {
	/// True for failures a caller could reasonably retry (5xx, timeouts, connection drops).
	///
	/// Nothing in this crate retries; the classification is for the top-level boundary.
	pub fn is_transient(&self) -> bool {
		match self {
			Error::Api { status, .. } => *status >= 500 || *status == 429,
			Error::Http(err) => err.is_timeout() || err.is_connect(),
			Error::RunTimedOut { .. } => true,
			_ => false,
		}
	}

	/// True for configuration and validation errors, raised before any network call.
	pub fn is_usage(&self) -> bool {
		matches!(
			self,
			Error::MissingEnv(_)
				| Error::InvalidApiKey
				| Error::EmptyQuery
				| Error::EmptyContent
				| Error::LocalFileNotFound(_)
				| Error::SimpleFs(_)
		)
	}
}

// region:    --- Error Boilerplate
impl core::fmt::Display for Error {
	fn fmt(
		&self,
		fmt: &mut core::fmt::Formatter,
	) -> core::result::Result<(), core::fmt::Error> {
		write!(fmt, "{self:?}")
	}
}

impl std::error::Error for Error {}
// endregion: --- Error Boilerplate

// region:    --- Tests


// endregion: --- Tests
