//! The `reconcile` module is the find-or-create protocol shared by every remote resource kind.
//!
//! A resource kind plugs in through two small traits:
//! - [`Lister`] fetches one page of existing resources, given the cursor of the previous page.
//! - [`Creator`] creates the resource when the walk did not find it.
//!
//! The walk itself is written once in [`walk`]. The cursor for the next page is always the id
//! of the last item of the current page, and an empty page ends the walk even when the server
//! claims there is more.
//!
//! Notes:
//! - There is no retry. A lister error aborts the walk and is returned to the caller as-is.
//! - There is no idempotency key nor cross-process lock. Two processes reconciling the same target
//!   at the same time can both create it.

// region:    --- Modules

use crate::Result;
use async_trait::async_trait;
use derive_more::Display;
use std::ops::ControlFlow;
use tracing::{debug, info};

// endregion: --- Modules

// region:    --- Types

/// An item returned by a listing call.
pub trait Listed {
	/// Opaque id of the resource, also used as the cursor for the next page.
	fn id(&self) -> &str;

	/// The identifying field compared against a reconciliation target
	/// (name, filename, training file id, content...).
	fn identity(&self) -> Option<&str>;
}

/// One batch of listed resources.
#[derive(Debug, Clone)]
pub struct Page<T> {
	pub items: Vec<T>,
	pub has_more: bool,
}

impl<T> Page<T> {
	pub fn new(items: Vec<T>, has_more: bool) -> Self {
		Self { items, has_more }
	}
}

#[async_trait]
pub trait Lister: Send + Sync {
	type Item: Listed + Send;

	/// Fetch the page that follows the resource `after` (first page when `None`).
	async fn list_page(&self, after: Option<&str>) -> Result<Page<Self::Item>>;
}

#[async_trait]
pub trait Creator: Send + Sync {
	/// Create the remote resource and return its id.
	async fn create(&self) -> Result<String>;
}

/// Outcome of a find-or-create.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Reconciled {
	#[display("found {_0}")]
	Found(String),
	#[display("created {_0}")]
	Created(String),
}

impl Reconciled {
	pub fn found(&self) -> bool {
		matches!(self, Reconciled::Found(_))
	}

	pub fn id(&self) -> &str {
		match self {
			Reconciled::Found(id) | Reconciled::Created(id) => id,
		}
	}

	pub fn into_id(self) -> String {
		match self {
			Reconciled::Found(id) | Reconciled::Created(id) => id,
		}
	}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WalkStats {
	pub pages: u32,
	pub scanned: u32,
}

// endregion: --- Types

// region:    --- Walk

/// Drives the pagination of `lister`, handing each item to `visit` in listing order,
/// until `visit` breaks or the pages are exhausted.
pub async fn walk<L, F>(lister: &L, mut visit: F) -> Result<WalkStats>
where
	L: Lister + ?Sized,
	F: FnMut(L::Item) -> ControlFlow<()>,
{
	let mut stats = WalkStats::default();
	let mut after: Option<String> = None;

	loop {
		let page = lister.list_page(after.as_deref()).await?;
		stats.pages += 1;

		// An empty page ends the walk, whatever `has_more` says.
		let Some(last_id) = page.items.last().map(|item| item.id().to_string())
		else {
			debug!(page = stats.pages, "empty page, stopping walk");
			break;
		};
		let has_more = page.has_more;
		debug!(
			page = stats.pages,
			items = page.items.len(),
			has_more,
			"page fetched"
		);

		for item in page.items {
			stats.scanned += 1;
			if visit(item).is_break() {
				return Ok(stats);
			}
		}

		if !has_more {
			break;
		}
		after = Some(last_id);
	}

	Ok(stats)
}

/// First item, in listing order, matching `predicate`. Pages past the match are not fetched.
pub async fn find_first<L, P>(
	lister: &L,
	mut predicate: P,
) -> Result<Option<L::Item>>
where
	L: Lister + ?Sized,
	P: FnMut(&L::Item) -> bool,
{
	let mut found = None;

	walk(lister, |item| {
		if predicate(&item) {
			found = Some(item);
			ControlFlow::Break(())
		} else {
			ControlFlow::Continue(())
		}
	})
	.await?;

	Ok(found)
}

/// First item whose identifying field equals `target`.
pub async fn reconcile<L>(lister: &L, target: &str) -> Result<Option<L::Item>>
where
	L: Lister + ?Sized,
{
	find_first(lister, |item| item.identity() == Some(target)).await
}

/// Scans every page and keeps the matching item with the greatest `key`.
/// On equal keys, the first one encountered wins.
pub async fn find_latest<L, P, K, KF>(
	lister: &L,
	mut predicate: P,
	mut key: KF,
) -> Result<Option<L::Item>>
where
	L: Lister + ?Sized,
	P: FnMut(&L::Item) -> bool,
	K: Ord,
	KF: FnMut(&L::Item) -> K,
{
	let mut latest: Option<(K, L::Item)> = None;

	walk(lister, |item| {
		if predicate(&item) {
			let item_key = key(&item);
			let is_newer = latest
				.as_ref()
				.map(|(latest_key, _)| item_key > *latest_key)
				.unwrap_or(true);
			if is_newer {
				latest = Some((item_key, item));
			}
		}
		ControlFlow::Continue(())
	})
	.await?;

	Ok(latest.map(|(_, item)| item))
}

/// Every item of every page, in listing order.
pub async fn collect_all<L>(lister: &L) -> Result<Vec<L::Item>>
where
	L: Lister + ?Sized,
{
	let mut items = Vec::new();

	walk(lister, |item| {
		items.push(item);
		ControlFlow::Continue(())
	})
	.await?;

	Ok(items)
}

/// Looks up `target` and calls `creator` only when it was not found.
pub async fn find_or_create<L, C>(
	lister: &L,
	target: &str,
	creator: &C,
) -> Result<Reconciled>
where
	L: Lister + ?Sized,
	C: Creator + ?Sized,
{
	if let Some(item) = reconcile(lister, target).await? {
		info!(resource = target, id = item.id(), "remote resource found");
		return Ok(Reconciled::Found(item.id().to_string()));
	}

	let id = creator.create().await?;
	info!(resource = target, id = %id, "remote resource created");

	Ok(Reconciled::Created(id))
}

// endregion: --- Walk

// region:    --- Tests


// endregion: --- Tests
