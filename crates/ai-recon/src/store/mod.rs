//! The `store` module reconciles documents in a Supabase table, by content.
//!
//! The table is reached through its PostgREST endpoint (`/rest/v1/{table}`) and is expected
//! to have an `id` primary key, a `content` text column and an `embedding` vector column.
//!
//! Listing is keyset-paginated on `id`: the cursor is the id of the last row of the previous page,
//! and a page shorter than the page size is the last one.
//!
//! Semantic search goes through a SQL function exposed as an RPC (`/rest/v1/rpc/{function}`),
//! taking `query_embedding`, `match_threshold` and `match_count`, and returning the closest rows
//! with their `similarity`, best first.

use crate::agent::{ChatMessage, ChatModel, ModelTurn};
use crate::ais::{self, ResourceKind};
use crate::config::{supabase_env, DocumentsConfig, SupabaseEnv};
use crate::event::EventBus;
use crate::reconcile::{Creator, Listed, Lister, Page, Reconciled};
use crate::utils::http::read_json;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

pub const DEFAULT_ANSWER_PROMPT: &str = "You are an enthusiastic expert who loves recommending things to people. \
You will be given two pieces of information - some context and a question. \
Your main job is to formulate a short answer to the question using the provided context. \
If you are unsure and cannot find the answer in the context, say, \"Sorry, I don't know the answer.\" \
Please do not make up the answer.";

// region:    --- Types

#[async_trait]
pub trait Embedder: Send + Sync {
	async fn embed(&self, input: &str) -> Result<Vec<f32>>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct Document {
	#[serde(deserialize_with = "id_as_string")]
	pub id: String,
	pub content: String,
}

impl Listed for Document {
	fn id(&self) -> &str {
		&self.id
	}

	fn identity(&self) -> Option<&str> {
		Some(&self.content)
	}
}

#[derive(Debug, Serialize)]
struct NewDocument<'a> {
	content: &'a str,
	embedding: Vec<f32>,
}

/// A row returned by the match function.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchedDocument {
	pub content: String,
	pub similarity: f64,
}

#[derive(Debug, Serialize)]
struct MatchRequest<'a> {
	query_embedding: &'a [f32],
	match_threshold: f32,
	match_count: u32,
}

/// Row ids are numbers in most tables, but are kept as opaque strings.
fn id_as_string<'de, D>(deserializer: D) -> core::result::Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	match Value::deserialize(deserializer)? {
		Value::String(id) => Ok(id),
		Value::Number(id) => Ok(id.to_string()),
		other => Err(D::Error::custom(format!("invalid document id {other}"))),
	}
}

// endregion: --- Types

// region:    --- SupabaseStore

#[derive(Debug, Clone)]
pub struct SupabaseStore {
	http: reqwest::Client,
	base_url: String,
	table: String,
	page_size: u32,
	match_function: String,
	match_threshold: f32,
}

impl SupabaseStore {
	pub fn new(env: &SupabaseEnv, config: &DocumentsConfig) -> Result<Self> {
		let mut headers = HeaderMap::new();
		let api_key =
			HeaderValue::from_str(&env.api_key).map_err(|_| Error::InvalidApiKey)?;
		let bearer = HeaderValue::from_str(&format!("Bearer {}", env.api_key))
			.map_err(|_| Error::InvalidApiKey)?;
		headers.insert("apikey", api_key);
		headers.insert(AUTHORIZATION, bearer);
		let http = reqwest::Client::builder().default_headers(headers).build()?;

		Ok(SupabaseStore {
			http,
			base_url: env.project_url.trim_end_matches('/').to_string(),
			table: config.table.clone(),
			page_size: config.page_size.max(1),
			match_function: config.match_function.clone(),
			match_threshold: config.match_threshold,
		})
	}

	/// From `SUPABASE_API_KEY` and `SUPABASE_PROJECT_URL`.
	pub fn from_env(config: &DocumentsConfig) -> Result<Self> {
		Self::new(&supabase_env()?, config)
	}

	fn table_url(&self) -> String {
		format!("{}/rest/v1/{}", self.base_url, self.table)
	}

	/// Rows whose content equals `content`, by ascending id, after the row id `after`.
	pub async fn list_page_by_content(
		&self,
		content: &str,
		after: Option<&str>,
	) -> Result<Page<Document>> {
		let content_filter = format!("eq.{content}");
		let limit = self.page_size.to_string();
		let mut query: Vec<(&str, String)> = vec![
			("select", "id,content".to_string()),
			("content", content_filter),
			("order", "id.asc".to_string()),
			("limit", limit),
		];
		if let Some(after) = after {
			query.push(("id", format!("gt.{after}")));
		}

		let res = self.http.get(self.table_url()).query(&query).send().await?;
		let rows: Vec<Document> = read_json(res).await?;
		let has_more = rows.len() as u32 >= self.page_size;

		Ok(Page::new(rows, has_more))
	}

	/// Inserts one row and returns it as stored.
	pub async fn insert(&self, content: &str, embedding: Vec<f32>) -> Result<Document> {
		let rows = [NewDocument { content, embedding }];

		let res = self
			.http
			.post(self.table_url())
			.header("Prefer", "return=representation")
			.json(&rows)
			.send()
			.await?;
		let inserted: Vec<Document> = read_json(res).await?;

		inserted.into_iter().next().ok_or(Error::NoIdInCreateResponse)
	}

	/// Up to `count` rows closest to `embedding`, above the match threshold, best first.
	pub async fn match_documents(
		&self,
		embedding: &[f32],
		count: u32,
	) -> Result<Vec<MatchedDocument>> {
		let url = format!("{}/rest/v1/rpc/{}", self.base_url, self.match_function);
		let req = MatchRequest {
			query_embedding: embedding,
			match_threshold: self.match_threshold,
			match_count: count,
		};

		let res = self.http.post(url).json(&req).send().await?;
		let matches: Vec<MatchedDocument> = read_json(res).await?;
		debug!(function = %self.match_function, matches = matches.len(), "documents matched");

		Ok(matches)
	}
}

// endregion: --- SupabaseStore

// region:    --- Lister & Creator

pub struct DocumentLister<'a> {
	pub store: &'a SupabaseStore,
	pub content: &'a str,
}

#[async_trait]
impl<'a> Lister for DocumentLister<'a> {
	type Item = Document;

	async fn list_page(&self, after: Option<&str>) -> Result<Page<Document>> {
		self.store.list_page_by_content(self.content, after).await
	}
}

/// Embeds the content, then inserts it with its embedding.
pub struct DocumentCreator<'a, E: ?Sized> {
	pub store: &'a SupabaseStore,
	pub embedder: &'a E,
	pub content: &'a str,
}

#[async_trait]
impl<'a, E> Creator for DocumentCreator<'a, E>
where
	E: Embedder + ?Sized,
{
	async fn create(&self) -> Result<String> {
		let embedding = self.embedder.embed(self.content).await?;
		let doc = self.store.insert(self.content, embedding).await?;

		Ok(doc.id)
	}
}

/// Inserts `content` unless a row with the exact same content already exists.
pub async fn ensure_document<E>(
	store: &SupabaseStore,
	embedder: &E,
	content: &str,
	event_bus: &EventBus,
) -> Result<Reconciled>
where
	E: Embedder + ?Sized,
{
	if content.trim().is_empty() {
		return Err(Error::EmptyContent);
	}

	let lister = DocumentLister { store, content };
	let creator = DocumentCreator {
		store,
		embedder,
		content,
	};

	ais::ensure(event_bus, ResourceKind::Document, &lister, content, &creator).await
}

// endregion: --- Lister & Creator

// region:    --- Search

/// Embeds `query` and returns the `count` closest documents.
pub async fn search_documents<E>(
	store: &SupabaseStore,
	embedder: &E,
	query: &str,
	count: u32,
) -> Result<Vec<MatchedDocument>>
where
	E: Embedder + ?Sized,
{
	if query.trim().is_empty() {
		return Err(Error::EmptyQuery);
	}

	let embedding = embedder.embed(query).await?;
	store.match_documents(&embedding, count).await
}

/// Answers `question` from the best of `matches` only.
pub async fn answer_from_matches<M>(
	model: &M,
	system_prompt: &str,
	matches: &[MatchedDocument],
	question: &str,
) -> Result<String>
where
	M: ChatModel + ?Sized,
{
	let best = matches.first().ok_or(Error::NoMatchingDocument)?;

	let history = [
		ChatMessage::System(system_prompt.to_string()),
		ChatMessage::User(format!("Context: {}, Question: {question}", best.content)),
	];
	match model.complete(&history, &[]).await? {
		ModelTurn::Answer(text) => Ok(text),
		ModelTurn::Incomplete(text) | ModelTurn::ToolCalls { content: text, .. } => {
			Ok(text.unwrap_or_default())
		}
	}
}

// endregion: --- Search

// region:    --- Tests


// endregion: --- Tests
