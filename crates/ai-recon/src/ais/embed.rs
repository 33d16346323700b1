use crate::ais::{AisClient, OaClient};
use crate::store::Embedder;
use crate::{Error, Result};
use async_openai::types::CreateEmbeddingRequestArgs;
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
	oa_client: OaClient,
	model: String,
}

impl OpenAiEmbedder {
	pub fn new(ais: &AisClient, model: impl Into<String>) -> Self {
		Self {
			oa_client: ais.oa_client().clone(),
			model: model.into(),
		}
	}
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
	async fn embed(&self, input: &str) -> Result<Vec<f32>> {
		let req = CreateEmbeddingRequestArgs::default()
			.model(&self.model)
			.input(input)
			.build()?;

		let res = self.oa_client.embeddings().create(req).await?;

		res.data
			.into_iter()
			.next()
			.map(|embedding| embedding.embedding)
			.ok_or(Error::NoEmbeddingInResponse)
	}
}
