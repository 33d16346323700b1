use crate::ais::{
	ensure, AisClient, AisEvent, AsstId, ResourceKind, ResourceRef,
};
use crate::reconcile::{self, Creator, Listed, Lister, Page};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// region:    --- Types

#[derive(Debug, Clone)]
pub struct CreateConfig {
	pub name: String,
	pub model: String,
	pub instructions: Option<String>,
	/// Stores searched by the `file_search` tool.
	pub vector_store_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantObject {
	pub id: String,
	pub name: Option<String>,
	#[serde(default)]
	pub model: String,
	pub instructions: Option<String>,
}

impl Listed for AssistantObject {
	fn id(&self) -> &str {
		&self.id
	}

	fn identity(&self) -> Option<&str> {
		self.name.as_deref()
	}
}

#[derive(Debug, Serialize)]
struct CreateAssistantRequest<'a> {
	model: &'a str,
	name: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	instructions: Option<&'a str>,
	tools: Vec<ToolSpec>,
	#[serde(skip_serializing_if = "Option::is_none")]
	tool_resources: Option<ToolResources<'a>>,
}

#[derive(Debug, Serialize)]
struct ToolSpec {
	r#type: &'static str,
}

#[derive(Debug, Serialize)]
struct ToolResources<'a> {
	file_search: FileSearchResources<'a>,
}

#[derive(Debug, Serialize)]
struct FileSearchResources<'a> {
	vector_store_ids: &'a [String],
}

#[derive(Debug, Serialize)]
struct ModifyAssistantRequest {
	instructions: String,
}

// endregion: --- Types

// region:    --- Lister & Creator

pub struct AsstLister<'a> {
	pub ais: &'a AisClient,
}

#[async_trait]
impl<'a> Lister for AsstLister<'a> {
	type Item = AssistantObject;

	async fn list_page(&self, after: Option<&str>) -> Result<Page<AssistantObject>> {
		self.ais.list_page("/assistants", &[], after).await
	}
}

pub struct AsstCreator<'a> {
	pub ais: &'a AisClient,
	pub config: &'a CreateConfig,
}

#[async_trait]
impl<'a> Creator for AsstCreator<'a> {
	async fn create(&self) -> Result<String> {
		let config = self.config;

		let tool_resources = if config.vector_store_ids.is_empty() {
			None
		} else {
			Some(ToolResources {
				file_search: FileSearchResources {
					vector_store_ids: &config.vector_store_ids,
				},
			})
		};

		let req = CreateAssistantRequest {
			model: &config.model,
			name: &config.name,
			instructions: config.instructions.as_deref(),
			tools: vec![ToolSpec {
				r#type: "file_search",
			}],
			tool_resources,
		};

		let asst_obj: AssistantObject = self.ais.post_json("/assistants", &req).await?;

		Ok(asst_obj.id)
	}
}

// endregion: --- Lister & Creator

// region:    --- Asst CRUD

pub async fn create(ais: &AisClient, config: &CreateConfig) -> Result<AsstId> {
	let asst_id: AsstId = AsstCreator { ais, config }.create().await?.into();

	ais.event_bus().send(AisEvent::ResourceCreated(ResourceRef::new(
		ResourceKind::Assistant,
		&config.name,
		asst_id.to_string(),
	)))?;

	Ok(asst_id)
}

/// Loads the assistant named `config.name`, or creates it.
/// When `recreate` is true, an existing assistant is deleted first.
pub async fn load_or_create(
	ais: &AisClient,
	config: CreateConfig,
	recreate: bool,
) -> Result<AsstId> {
	let lister = AsstLister { ais };

	if !recreate {
		let creator = AsstCreator {
			ais,
			config: &config,
		};
		let res =
			ensure(ais.event_bus(), ResourceKind::Assistant, &lister, &config.name, &creator)
				.await?;
		return Ok(res.into_id().into());
	}

	// -- Delete asst if recreate and found
	if let Some(asst_obj) = first_by_name(ais, &config.name).await? {
		let asst_id = AsstId::from(asst_obj.id);
		delete(ais, &asst_id).await?;
		ais.event_bus().send(AisEvent::ResourceDeleted(ResourceRef::new(
			ResourceKind::Assistant,
			&config.name,
			asst_id.to_string(),
		)))?;
	}

	create(ais, &config).await
}

pub async fn first_by_name(
	ais: &AisClient,
	name: &str,
) -> Result<Option<AssistantObject>> {
	reconcile::reconcile(&AsstLister { ais }, name).await
}

pub async fn upload_instructions(
	ais: &AisClient,
	asst_id: &AsstId,
	inst_content: String,
) -> Result<()> {
	let modif = ModifyAssistantRequest {
		instructions: inst_content,
	};
	let _: AssistantObject = ais
		.post_json(&format!("/assistants/{asst_id}"), &modif)
		.await?;

	Ok(())
}

pub async fn delete(ais: &AisClient, asst_id: &AsstId) -> Result<()> {
	ais.delete(&format!("/assistants/{asst_id}")).await?;

	Ok(())
}

// endregion: --- Asst CRUD
