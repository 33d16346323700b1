use crate::ais::{ensure, AisClient, ResourceKind};
use crate::reconcile::{Creator, Listed, Lister, Page, Reconciled};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct VectorStoreObject {
	pub id: String,
	pub name: Option<String>,
	pub status: Option<String>,
}

impl Listed for VectorStoreObject {
	fn id(&self) -> &str {
		&self.id
	}

	fn identity(&self) -> Option<&str> {
		self.name.as_deref()
	}
}

pub struct VectorStoreLister<'a> {
	pub ais: &'a AisClient,
}

#[async_trait]
impl<'a> Lister for VectorStoreLister<'a> {
	type Item = VectorStoreObject;

	async fn list_page(
		&self,
		after: Option<&str>,
	) -> Result<Page<VectorStoreObject>> {
		self.ais.list_page("/vector_stores", &[], after).await
	}
}

#[derive(Debug, Serialize)]
struct CreateVectorStoreRequest<'a> {
	name: &'a str,
	file_ids: &'a [String],
}

pub struct VectorStoreCreator<'a> {
	pub ais: &'a AisClient,
	pub name: &'a str,
	pub file_ids: &'a [String],
}

#[async_trait]
impl<'a> Creator for VectorStoreCreator<'a> {
	async fn create(&self) -> Result<String> {
		let req = CreateVectorStoreRequest {
			name: self.name,
			file_ids: self.file_ids,
		};
		let store: VectorStoreObject =
			self.ais.post_json("/vector_stores", &req).await?;

		Ok(store.id)
	}
}

/// Creates the vector store `name` over `file_ids`, unless one with that name exists.
///
/// An existing store is returned as-is; its files are not compared with `file_ids`.
pub async fn ensure_vector_store(
	ais: &AisClient,
	name: &str,
	file_ids: &[String],
) -> Result<Reconciled> {
	let lister = VectorStoreLister { ais };
	let creator = VectorStoreCreator {
		ais,
		name,
		file_ids,
	};

	ensure(ais.event_bus(), ResourceKind::VectorStore, &lister, name, &creator).await
}
