//! Thread runs against a mocked OpenAI REST surface.

use ai_recon::ais::thread::{
	latest_message_text, list_messages, run_and_wait, RunPolicy, RunStatus,
};
use ai_recon::ais::{AisClient, AsstId, ThreadId};
use ai_recon::event::EventBus;
use ai_recon::{Error, Result};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_policy() -> RunPolicy {
	RunPolicy {
		interval: Duration::from_millis(10),
		timeout: Duration::from_millis(500),
	}
}

async fn mount_run(server: &MockServer, created: &str, polled: &str) {
	Mock::given(method("POST"))
		.and(path("/threads/thread_1/runs"))
		.respond_with(
			ResponseTemplate::new(200).set_body_json(json!({"id": "run_1", "status": created})),
		)
		.expect(1)
		.mount(server)
		.await;
	Mock::given(method("GET"))
		.and(path("/threads/thread_1/runs/run_1"))
		.respond_with(
			ResponseTemplate::new(200).set_body_json(json!({"id": "run_1", "status": polled})),
		)
		.mount(server)
		.await;
}

fn message_json(id: &str, role: &str, text: &str) -> Value {
	json!({
		"id": id,
		"role": role,
		"content": [{"type": "text", "text": {"value": text, "annotations": []}}]
	})
}

/// Two pages of messages, newest first.
async fn mount_messages(server: &MockServer, second_page_calls: u64) {
	Mock::given(method("GET"))
		.and(path("/threads/thread_1/messages"))
		.and(query_param("after", "msg_2"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"object": "list",
			"data": [message_json("msg_1", "user", "Best movie of 2023?")],
			"has_more": false
		})))
		.expect(second_page_calls)
		.mount(server)
		.await;
	Mock::given(method("GET"))
		.and(path("/threads/thread_1/messages"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"object": "list",
			"data": [
				message_json("msg_3", "assistant", "Oppenheimer, 2023."),
				message_json("msg_2", "user", "And the runtime?")
			],
			"has_more": true
		})))
		.expect(1)
		.mount(server)
		.await;
}

fn ids() -> (ThreadId, AsstId) {
	(
		ThreadId::from("thread_1".to_string()),
		AsstId::from("asst_1".to_string()),
	)
}

#[tokio::test]
async fn test_run_and_wait_completes() -> Result<()> {
	let server = MockServer::start().await;
	mount_run(&server, "queued", "completed").await;
	let ais = AisClient::new("sk-test", Some(&server.uri()), EventBus::new())?;
	let (thread_id, asst_id) = ids();

	let run = run_and_wait(&ais, &thread_id, &asst_id, Some("Be brief."), fast_policy()).await?;

	assert_eq!(run.status, RunStatus::Completed);
	Ok(())
}

#[tokio::test]
async fn test_run_and_wait_failed_status() -> Result<()> {
	let server = MockServer::start().await;
	mount_run(&server, "in_progress", "expired").await;
	let ais = AisClient::new("sk-test", Some(&server.uri()), EventBus::new())?;
	let (thread_id, asst_id) = ids();

	let res = run_and_wait(&ais, &thread_id, &asst_id, None, fast_policy()).await;

	assert!(matches!(res, Err(Error::RunFailed { status, .. }) if status == "expired"));
	Ok(())
}

#[tokio::test]
async fn test_run_and_wait_times_out() -> Result<()> {
	let server = MockServer::start().await;
	mount_run(&server, "queued", "in_progress").await;
	let ais = AisClient::new("sk-test", Some(&server.uri()), EventBus::new())?;
	let (thread_id, asst_id) = ids();
	let policy = RunPolicy {
		interval: Duration::from_millis(10),
		timeout: Duration::from_millis(100),
	};

	let res = run_and_wait(&ais, &thread_id, &asst_id, None, policy).await;

	assert!(matches!(res, Err(Error::RunTimedOut { run_id }) if run_id == "run_1"));
	Ok(())
}

#[tokio::test]
async fn test_latest_message_text_fetches_first_page_only() -> Result<()> {
	let server = MockServer::start().await;
	mount_messages(&server, 0).await;
	let ais = AisClient::new("sk-test", Some(&server.uri()), EventBus::new())?;
	let (thread_id, _) = ids();

	let text = latest_message_text(&ais, &thread_id).await?;

	assert_eq!(text, "Oppenheimer, 2023.");
	Ok(())
}

#[tokio::test]
async fn test_list_messages_walks_all_pages() -> Result<()> {
	let server = MockServer::start().await;
	mount_messages(&server, 1).await;
	let ais = AisClient::new("sk-test", Some(&server.uri()), EventBus::new())?;
	let (thread_id, _) = ids();

	let msgs = list_messages(&ais, &thread_id).await?;

	let ids: Vec<&str> = msgs.iter().map(|msg| msg.id.as_str()).collect();
	assert_eq!(ids, vec!["msg_3", "msg_2", "msg_1"]);
	assert_eq!(msgs[2].text(), Some("Best movie of 2023?"));
	Ok(())
}
