//! Fine-tune jobs, reconciled by training file.
//!
//! Two polling policies coexist:
//! - an existing job is *watched* with a bounded policy, and given up on when the attempts run out,
//! - a freshly started job is *awaited* with no attempt cap, until it succeeds or fails.

use crate::ais::file::{ensure_file, PURPOSE_FINE_TUNE};
use crate::ais::{AisClient, AisEvent, JobId, ResourceKind, ResourceRef};
use crate::config::FineTuneConfig;
use crate::reconcile::{self, Listed, Lister, Page};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

// region:    --- Types

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
	ValidatingFiles,
	Queued,
	Running,
	Succeeded,
	Failed,
	Cancelled,
	#[serde(other)]
	Unknown,
}

impl JobStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			JobStatus::ValidatingFiles => "validating_files",
			JobStatus::Queued => "queued",
			JobStatus::Running => "running",
			JobStatus::Succeeded => "succeeded",
			JobStatus::Failed => "failed",
			JobStatus::Cancelled => "cancelled",
			JobStatus::Unknown => "unknown",
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct FineTuneJob {
	pub id: String,
	pub training_file: String,
	pub status: JobStatus,
	#[serde(default)]
	pub created_at: i64,
	pub fine_tuned_model: Option<String>,
	#[serde(default)]
	pub model: String,
}

impl FineTuneJob {
	/// The fine-tuned model when the job produced one, the base model otherwise.
	pub fn model_name(&self) -> &str {
		self.fine_tuned_model.as_deref().unwrap_or(&self.model)
	}
}

impl Listed for FineTuneJob {
	fn id(&self) -> &str {
		&self.id
	}

	fn identity(&self) -> Option<&str> {
		Some(&self.training_file)
	}
}

#[derive(Debug, Serialize)]
struct CreateJobRequest<'a> {
	model: &'a str,
	training_file: &'a str,
}

#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
	pub interval: Duration,
	/// Number of status fetches allowed. `None` polls until a terminal status.
	pub max_attempts: Option<u32>,
}

impl PollPolicy {
	pub fn bounded(interval: Duration, max_attempts: u32) -> Self {
		Self {
			interval,
			max_attempts: Some(max_attempts),
		}
	}

	pub fn unbounded(interval: Duration) -> Self {
		Self {
			interval,
			max_attempts: None,
		}
	}
}

#[derive(Debug, Clone)]
pub enum PollOutcome {
	Succeeded(FineTuneJob),
	/// `failed` or `cancelled`.
	Failed(FineTuneJob),
	/// Attempts ran out before a terminal status.
	Exhausted(FineTuneJob),
}

// endregion: --- Types

// region:    --- Lister

pub struct JobLister<'a> {
	pub ais: &'a AisClient,
}

#[async_trait]
impl<'a> Lister for JobLister<'a> {
	type Item = FineTuneJob;

	async fn list_page(&self, after: Option<&str>) -> Result<Page<FineTuneJob>> {
		self.ais.list_page("/fine_tuning/jobs", &[], after).await
	}
}

/// Most recently created job trained on `training_file_id`.
pub async fn latest_by_training_file(
	ais: &AisClient,
	training_file_id: &str,
) -> Result<Option<FineTuneJob>> {
	reconcile::find_latest(
		&JobLister { ais },
		|job| job.training_file == training_file_id,
		|job| job.created_at,
	)
	.await
}

// endregion: --- Lister

// region:    --- Job

pub async fn start_job(
	ais: &AisClient,
	training_file_id: &str,
	base_model: &str,
) -> Result<FineTuneJob> {
	let req = CreateJobRequest {
		model: base_model,
		training_file: training_file_id,
	};

	ais.post_json("/fine_tuning/jobs", &req).await
}

pub async fn retrieve_job(ais: &AisClient, job_id: &str) -> Result<FineTuneJob> {
	ais.get_json(&format!("/fine_tuning/jobs/{job_id}")).await
}

/// Polls the job through `fetch` until it reaches a terminal status,
/// or `policy.max_attempts` fetches were made.
pub async fn poll_job<F, Fut>(
	initial: FineTuneJob,
	policy: PollPolicy,
	mut fetch: F,
) -> Result<PollOutcome>
where
	F: FnMut(String) -> Fut,
	Fut: Future<Output = Result<FineTuneJob>>,
{
	let mut job = initial;
	let mut attempts: u32 = 0;

	loop {
		match job.status {
			JobStatus::Succeeded => return Ok(PollOutcome::Succeeded(job)),
			JobStatus::Failed | JobStatus::Cancelled => return Ok(PollOutcome::Failed(job)),
			_ => (),
		}

		if policy.max_attempts.is_some_and(|max| attempts >= max) {
			return Ok(PollOutcome::Exhausted(job));
		}

		sleep(policy.interval).await;
		job = fetch(job.id.clone()).await?;
		attempts += 1;
	}
}

/// `poll_job` against the API, reporting every fetched status on the event bus.
pub async fn watch_job(
	ais: &AisClient,
	job: FineTuneJob,
	policy: PollPolicy,
) -> Result<PollOutcome> {
	poll_job(job, policy, |job_id| async move {
		let job = retrieve_job(ais, &job_id).await?;
		ais.event_bus().send(AisEvent::FineTuneJobStatus {
			job_id: job.id.clone(),
			status: job.status.as_str().to_string(),
		})?;
		Ok::<_, Error>(job)
	})
	.await
}

// endregion: --- Job

// region:    --- Ensure

/// Makes sure a succeeded fine-tune job exists for the training file of `config`,
/// found in `dir`, and returns it.
///
/// The latest job of the training file is watched with the bounded policy. A new job is
/// started, and awaited with no attempt cap, when there is no such job, when it failed,
/// when watching it ran out of attempts, or when it could not be retrieved.
pub async fn ensure_fine_tuned_model(
	ais: &AisClient,
	dir: &Path,
	config: &FineTuneConfig,
) -> Result<FineTuneJob> {
	let path = dir.join(&config.training_file);
	let file_id = ensure_file(ais, &path, None, PURPOSE_FINE_TUNE).await?.into_id();

	let existing = match latest_by_training_file(ais, &file_id).await {
		Ok(job) => job,
		Err(err) => {
			warn!(file_id = %file_id, error = %err, "cannot list fine-tune jobs");
			None
		}
	};

	if let Some(job) = existing {
		ais.event_bus().send(AisEvent::ResourceFound(ResourceRef::new(
			ResourceKind::FineTuneJob,
			&config.training_file,
			job.id.clone(),
		)))?;

		let policy = PollPolicy::bounded(config.watch_interval(), config.watch_max_attempts);
		match watch_job(ais, job, policy).await {
			Ok(PollOutcome::Succeeded(job)) => return Ok(job),
			Ok(PollOutcome::Failed(job)) => {
				info!(job_id = %job.id, status = job.status.as_str(), "fine-tune job failed")
			}
			Ok(PollOutcome::Exhausted(job)) => {
				warn!(job_id = %job.id, "fine-tune job still running after watch attempts")
			}
			Err(err) => warn!(error = %err, "cannot retrieve fine-tune job"),
		}
	}

	// -- Start a new job
	ais.event_bus().send(AisEvent::ResourceCreating {
		kind: ResourceKind::FineTuneJob,
		name: config.training_file.clone(),
	})?;
	let job = start_job(ais, &file_id, &config.base_model).await?;
	let job_id = JobId::from(job.id.clone());
	ais.event_bus().send(AisEvent::ResourceCreated(ResourceRef::new(
		ResourceKind::FineTuneJob,
		&config.training_file,
		job_id.to_string(),
	)))?;

	match watch_job(ais, job, PollPolicy::unbounded(config.await_interval())).await? {
		PollOutcome::Succeeded(job) => Ok(job),
		PollOutcome::Failed(job) | PollOutcome::Exhausted(job) => {
			Err(Error::FineTuneJobFailed(job.id))
		}
	}
}

// endregion: --- Ensure

// region:    --- Tests


// endregion: --- Tests
