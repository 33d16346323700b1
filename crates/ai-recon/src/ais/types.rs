use derive_more::{Deref, Display, From};
use serde::{Deserialize, Serialize};

// region:    --- Ids

#[derive(Debug, Clone, From, Deref, Display)]
pub struct AsstId(String);

impl From<&AsstId> for AsstId {
	fn from(val: &AsstId) -> Self {
		val.clone()
	}
}

#[derive(Debug, Clone, From, Deref, Display, Serialize, Deserialize)]
pub struct ThreadId(String);

#[derive(Debug, Clone, From, Deref, Display)]
pub struct JobId(String);

// endregion: --- Ids

// region:    --- ResourceRef

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ResourceKind {
	#[display("file")]
	File,
	#[display("assistant")]
	Assistant,
	#[display("vector store")]
	VectorStore,
	#[display("fine-tune job")]
	FineTuneJob,
	#[display("thread")]
	Thread,
	#[display("document")]
	Document,
}

#[derive(Debug, Clone)]
pub struct ResourceRef {
	pub kind: ResourceKind,
	pub name: String,
	pub id: String,
}

impl ResourceRef {
	pub fn new(
		kind: ResourceKind,
		name: impl Into<String>,
		id: impl Into<String>,
	) -> Self {
		Self {
			kind,
			name: name.into(),
			id: id.into(),
		}
	}
}

// endregion: --- ResourceRef
