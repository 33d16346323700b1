use crate::ais::{ensure, AisClient, ResourceKind};
use crate::reconcile::{Creator, Listed, Lister, Page, Reconciled};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;

// region:    --- Constants

pub const PURPOSE_ASSISTANTS: &str = "assistants";
pub const PURPOSE_FINE_TUNE: &str = "fine-tune";

// endregion: --- Constants

// region:    --- Types

#[derive(Debug, Clone, Deserialize)]
pub struct FileObject {
	pub id: String,
	pub filename: String,
	#[serde(default)]
	pub purpose: String,
	pub status: Option<String>,
	pub bytes: Option<u64>,
}

impl Listed for FileObject {
	fn id(&self) -> &str {
		&self.id
	}

	fn identity(&self) -> Option<&str> {
		Some(&self.filename)
	}
}

// endregion: --- Types

// region:    --- Lister & Creator

/// Org files of one purpose.
pub struct FileLister<'a> {
	pub ais: &'a AisClient,
	pub purpose: &'a str,
}

#[async_trait]
impl<'a> Lister for FileLister<'a> {
	type Item = FileObject;

	async fn list_page(&self, after: Option<&str>) -> Result<Page<FileObject>> {
		self.ais
			.list_page("/files", &[("purpose", self.purpose)], after)
			.await
	}
}

/// Uploads a local file under `upload_name`.
///
/// The whole file is read in memory before the upload.
pub struct FileUploader<'a> {
	pub ais: &'a AisClient,
	pub path: &'a Path,
	pub upload_name: &'a str,
	pub purpose: &'a str,
}

#[async_trait]
impl<'a> Creator for FileUploader<'a> {
	async fn create(&self) -> Result<String> {
		let content = tokio::fs::read(self.path).await?;

		let file_part = Part::bytes(content).file_name(self.upload_name.to_string());
		let form = Form::new()
			.text("purpose", self.purpose.to_string())
			.part("file", file_part);

		let file: FileObject = self.ais.post_multipart("/files", form).await?;

		Ok(file.id)
	}
}

// endregion: --- Lister & Creator

// region:    --- Ensure

/// Uploads `path` unless a file named `upload_name` (default: the local file name)
/// already exists for `purpose`.
pub async fn ensure_file(
	ais: &AisClient,
	path: &Path,
	upload_name: Option<&str>,
	purpose: &str,
) -> Result<Reconciled> {
	if !path.is_file() {
		return Err(Error::LocalFileNotFound(path.display().to_string()));
	}

	let upload_name = match upload_name {
		Some(name) => name.to_string(),
		None => path
			.file_name()
			.map(|name| name.to_string_lossy().to_string())
			.ok_or_else(|| Error::LocalFileNotFound(path.display().to_string()))?,
	};

	let lister = FileLister { ais, purpose };
	let uploader = FileUploader {
		ais,
		path,
		upload_name: &upload_name,
		purpose,
	};

	ensure(ais.event_bus(), ResourceKind::File, &lister, &upload_name, &uploader).await
}

// endregion: --- Ensure
