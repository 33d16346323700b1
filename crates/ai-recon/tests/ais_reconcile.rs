//! Reconciliation against a mocked OpenAI REST surface.

use ai_recon::ais::file::{ensure_file, FileLister, PURPOSE_ASSISTANTS};
use ai_recon::ais::fine_tune::latest_by_training_file;
use ai_recon::ais::vector_store::ensure_vector_store;
use ai_recon::ais::{AisClient, AisEvent};
use ai_recon::event::{Event, EventBus};
use ai_recon::reconcile::{self, Reconciled};
use ai_recon::{Error, Result};
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// region:    --- Support

fn ais_for(server: &MockServer, event_bus: EventBus) -> Result<AisClient> {
	AisClient::new("sk-test", Some(&server.uri()), event_bus)
}

fn file_json(id: &str, filename: &str) -> Value {
	json!({
		"id": id,
		"object": "file",
		"filename": filename,
		"purpose": "assistants",
		"bytes": 120
	})
}

fn list_json(data: Vec<Value>, has_more: bool) -> Value {
	json!({ "object": "list", "data": data, "has_more": has_more })
}

fn ok_json(body: Value) -> ResponseTemplate {
	ResponseTemplate::new(200).set_body_json(body)
}

// endregion: --- Support

#[tokio::test]
async fn test_file_listing_follows_last_id_cursor() -> Result<()> {
	let server = MockServer::start().await;

	// Registered first, so it wins over the first page mock for requests with a cursor.
	Mock::given(method("GET"))
		.and(path("/files"))
		.and(query_param("after", "file-2"))
		.respond_with(ok_json(list_json(
			vec![file_json("file-3", "movie_details.txt")],
			false,
		)))
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("GET"))
		.and(path("/files"))
		.and(query_param("purpose", "assistants"))
		.respond_with(ok_json(list_json(
			vec![file_json("file-1", "notes.txt"), file_json("file-2", "podcasts.txt")],
			true,
		)))
		.expect(1)
		.mount(&server)
		.await;

	let ais = ais_for(&server, EventBus::new())?;
	let lister = FileLister {
		ais: &ais,
		purpose: PURPOSE_ASSISTANTS,
	};

	let found = reconcile::reconcile(&lister, "movie_details.txt").await?;

	assert_eq!(found.map(|f| f.id), Some("file-3".to_string()));
	Ok(())
}

#[tokio::test]
async fn test_ensure_file_uploads_when_absent() -> Result<()> {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path("/files"))
		.respond_with(ok_json(list_json(vec![file_json("file-1", "notes.txt")], false)))
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path("/files"))
		.respond_with(ok_json(file_json("file-new", "movie_details.txt")))
		.expect(1)
		.mount(&server)
		.await;

	let dir = tempfile::tempdir()?;
	let data_file = dir.path().join("movies.txt");
	std::fs::write(&data_file, "Oppenheimer: 2023 | R | 3h | 8.6 rating")?;

	let event_bus = EventBus::new();
	let mut rx = event_bus.subscribe()?;
	let ais = ais_for(&server, event_bus)?;

	let res = ensure_file(&ais, &data_file, Some("movie_details.txt"), PURPOSE_ASSISTANTS).await?;

	assert_eq!(res, Reconciled::Created("file-new".to_string()));

	let mut creating = false;
	let mut created = false;
	while let Ok(evt) = rx.try_recv() {
		match evt {
			Event::Ais(AisEvent::ResourceCreating { name, .. }) => {
				creating = name == "movie_details.txt"
			}
			Event::Ais(AisEvent::ResourceCreated(res_ref)) => created = res_ref.id == "file-new",
			_ => (),
		}
	}
	assert!(creating && created);
	Ok(())
}

#[tokio::test]
async fn test_ensure_file_found_does_not_upload() -> Result<()> {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path("/files"))
		.respond_with(ok_json(list_json(
			vec![file_json("file-9", "movie_details.txt")],
			true,
		)))
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path("/files"))
		.respond_with(ok_json(file_json("file-new", "movie_details.txt")))
		.expect(0)
		.mount(&server)
		.await;

	let dir = tempfile::tempdir()?;
	let data_file = dir.path().join("movie_details.txt");
	std::fs::write(&data_file, "Barbie: 2023 | PG-13 | 1h 54m | 7.2 rating")?;
	let ais = ais_for(&server, EventBus::new())?;

	let res = ensure_file(&ais, &data_file, None, PURPOSE_ASSISTANTS).await?;

	assert_eq!(res, Reconciled::Found("file-9".to_string()));
	Ok(())
}

#[tokio::test]
async fn test_ensure_file_missing_local_file_no_request() -> Result<()> {
	let server = MockServer::start().await;
	let ais = ais_for(&server, EventBus::new())?;

	let res = ensure_file(
		&ais,
		std::path::Path::new("does/not/exist.txt"),
		None,
		PURPOSE_ASSISTANTS,
	)
	.await;

	assert!(matches!(res, Err(Error::LocalFileNotFound(_))));
	let requests = server.received_requests().await.unwrap_or_default();
	assert!(requests.is_empty());
	Ok(())
}

#[tokio::test]
async fn test_listing_error_status_is_api_error() -> Result<()> {
	let server = MockServer::start().await;
	Mock::given(method("GET"))
		.and(path("/vector_stores"))
		.respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path("/vector_stores"))
		.respond_with(ok_json(json!({"id": "vs_1", "name": "movies"})))
		.expect(0)
		.mount(&server)
		.await;
	let ais = ais_for(&server, EventBus::new())?;

	let res = ensure_vector_store(&ais, "movies", &["file-1".to_string()]).await;

	let err = res.expect_err("listing failure should abort");
	assert!(matches!(&err, Error::Api { status: 503, body } if body == "overloaded"));
	assert!(err.is_transient());
	Ok(())
}

#[tokio::test]
async fn test_latest_fine_tune_job_by_training_file() -> Result<()> {
	let server = MockServer::start().await;
	let job = |id: &str, training_file: &str, created_at: i64| {
		json!({
			"id": id,
			"object": "fine_tuning.job",
			"training_file": training_file,
			"status": "succeeded",
			"created_at": created_at,
			"fine_tuned_model": format!("ft:gpt-3.5-turbo::{id}"),
			"model": "gpt-3.5-turbo"
		})
	};
	Mock::given(method("GET"))
		.and(path("/fine_tuning/jobs"))
		.and(query_param("after", "ftjob-b"))
		.respond_with(ok_json(list_json(
			vec![job("ftjob-c", "file-train", 300), job("ftjob-d", "file-train", 200)],
			false,
		)))
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("GET"))
		.and(path("/fine_tuning/jobs"))
		.respond_with(ok_json(list_json(
			vec![job("ftjob-a", "file-train", 100), job("ftjob-b", "file-other", 900)],
			true,
		)))
		.expect(1)
		.mount(&server)
		.await;
	let ais = ais_for(&server, EventBus::new())?;

	let latest = latest_by_training_file(&ais, "file-train").await?;

	let latest = latest.expect("a job should match");
	assert_eq!(latest.id, "ftjob-c");
	assert_eq!(latest.model_name(), "ft:gpt-3.5-turbo::ftjob-c");
	Ok(())
}
