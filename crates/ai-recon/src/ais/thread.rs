use crate::ais::{AisClient, AisEvent, AsstId, ResourceKind, ResourceRef, ThreadId};
use crate::reconcile::{self, Listed, Lister, Page};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::warn;

// region:    --- Constants

const RUN_POLLING_INTERVAL: Duration = Duration::from_secs(3);
const RUN_TIMEOUT: Duration = Duration::from_secs(60);

// endregion: --- Constants

// region:    --- Types

#[derive(Debug, Deserialize)]
struct ThreadObject {
	id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
	Queued,
	InProgress,
	RequiresAction,
	Cancelling,
	Cancelled,
	Failed,
	Completed,
	Incomplete,
	Expired,
	#[serde(other)]
	Unknown,
}

impl RunStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			RunStatus::Queued => "queued",
			RunStatus::InProgress => "in_progress",
			RunStatus::RequiresAction => "requires_action",
			RunStatus::Cancelling => "cancelling",
			RunStatus::Cancelled => "cancelled",
			RunStatus::Failed => "failed",
			RunStatus::Completed => "completed",
			RunStatus::Incomplete => "incomplete",
			RunStatus::Expired => "expired",
			RunStatus::Unknown => "unknown",
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunObject {
	pub id: String,
	pub status: RunStatus,
}

#[derive(Debug, Clone, Copy)]
pub struct RunPolicy {
	pub interval: Duration,
	pub timeout: Duration,
}

impl Default for RunPolicy {
	fn default() -> Self {
		Self {
			interval: RUN_POLLING_INTERVAL,
			timeout: RUN_TIMEOUT,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageObject {
	pub id: String,
	pub role: String,
	#[serde(default)]
	pub content: Vec<MessageContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageContent {
	#[serde(rename = "type")]
	pub kind: String,
	pub text: Option<MessageText>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageText {
	pub value: String,
}

impl MessageObject {
	/// Text of the first text content part.
	pub fn text(&self) -> Option<&str> {
		self.content
			.iter()
			.find_map(|c| c.text.as_ref().map(|t| t.value.as_str()))
	}
}

impl Listed for MessageObject {
	fn id(&self) -> &str {
		&self.id
	}

	fn identity(&self) -> Option<&str> {
		None
	}
}

#[derive(Debug, Serialize)]
struct CreateThreadRequest<'a> {
	metadata: &'a HashMap<String, String>,
}

#[derive(Debug, Serialize)]
struct CreateMessageRequest<'a> {
	role: &'static str,
	content: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateRunRequest<'a> {
	assistant_id: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	instructions: Option<&'a str>,
}

// endregion: --- Types

// region:    --- Thread

pub async fn create_thread(
	ais: &AisClient,
	metadata: &HashMap<String, String>,
) -> Result<ThreadId> {
	let thread: ThreadObject = ais
		.post_json("/threads", &CreateThreadRequest { metadata })
		.await?;

	Ok(thread.id.into())
}

/// Deletes the thread. A failure is reported, not returned.
pub async fn delete_thread(ais: &AisClient, thread_id: &ThreadId) -> Result<()> {
	let res_ref = ResourceRef::new(ResourceKind::Thread, "thread", thread_id.to_string());

	match ais.delete(&format!("/threads/{thread_id}")).await {
		Ok(_) => ais.event_bus().send(AisEvent::ResourceDeleted(res_ref))?,
		Err(err) => {
			warn!(thread_id = %thread_id, error = %err, "cannot delete thread");
			ais.event_bus().send(AisEvent::ResourceCantDelete {
				res_ref,
				cause: err.to_string(),
			})?
		}
	}

	Ok(())
}

pub async fn add_user_message(
	ais: &AisClient,
	thread_id: &ThreadId,
	content: &str,
) -> Result<()> {
	let req = CreateMessageRequest {
		role: "user",
		content,
	};
	let _: MessageObject = ais
		.post_json(&format!("/threads/{thread_id}/messages"), &req)
		.await?;

	Ok(())
}

// endregion: --- Thread

// region:    --- Run

pub async fn create_run(
	ais: &AisClient,
	thread_id: &ThreadId,
	asst_id: &AsstId,
	instructions: Option<&str>,
) -> Result<RunObject> {
	let req = CreateRunRequest {
		assistant_id: asst_id,
		instructions,
	};

	ais.post_json(&format!("/threads/{thread_id}/runs"), &req)
		.await
}

pub async fn get_run(
	ais: &AisClient,
	thread_id: &ThreadId,
	run_id: &str,
) -> Result<RunObject> {
	ais.get_json(&format!("/threads/{thread_id}/runs/{run_id}"))
		.await
}

/// Starts a run and polls it until it is completed or cancelled.
///
/// Fails on `failed`, `expired` and `incomplete`, and when `policy.timeout` elapses.
pub async fn run_and_wait(
	ais: &AisClient,
	thread_id: &ThreadId,
	asst_id: &AsstId,
	instructions: Option<&str>,
	policy: RunPolicy,
) -> Result<RunObject> {
	let run = create_run(ais, thread_id, asst_id, instructions).await?;
	let run_id = run.id.clone();

	timeout(policy.timeout, poll_run(ais, thread_id, run, policy.interval))
		.await
		.map_err(|_| Error::RunTimedOut { run_id })?
}

async fn poll_run(
	ais: &AisClient,
	thread_id: &ThreadId,
	mut run: RunObject,
	interval: Duration,
) -> Result<RunObject> {
	loop {
		ais.event_bus().send(AisEvent::RunStatus {
			run_id: run.id.clone(),
			status: run.status.as_str().to_string(),
		})?;

		match run.status {
			RunStatus::Completed | RunStatus::Cancelled => return Ok(run),
			RunStatus::Failed | RunStatus::Expired | RunStatus::Incomplete => {
				return Err(Error::RunFailed {
					run_id: run.id,
					status: run.status.as_str().to_string(),
				})
			}
			_ => (),
		}

		sleep(interval).await;
		run = get_run(ais, thread_id, &run.id).await?;
	}
}

// endregion: --- Run

// region:    --- Messages

pub struct MessageLister<'a> {
	pub ais: &'a AisClient,
	pub thread_id: &'a ThreadId,
}

#[async_trait]
impl<'a> Lister for MessageLister<'a> {
	type Item = MessageObject;

	async fn list_page(&self, after: Option<&str>) -> Result<Page<MessageObject>> {
		self.ais
			.list_page(&format!("/threads/{}/messages", self.thread_id), &[], after)
			.await
	}
}

/// All messages of the thread, newest first.
pub async fn list_messages(
	ais: &AisClient,
	thread_id: &ThreadId,
) -> Result<Vec<MessageObject>> {
	reconcile::collect_all(&MessageLister { ais, thread_id }).await
}

/// Text of the newest message of the thread. Only the first page is fetched.
pub async fn latest_message_text(
	ais: &AisClient,
	thread_id: &ThreadId,
) -> Result<String> {
	let msg = reconcile::find_first(&MessageLister { ais, thread_id }, |_| true)
		.await?
		.ok_or_else(|| Error::NoMessageFoundInThread(thread_id.to_string()))?;

	msg.text()
		.map(String::from)
		.ok_or(Error::NoTextInMessage(msg.id))
}

// endregion: --- Messages
