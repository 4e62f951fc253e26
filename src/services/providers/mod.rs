/// External collaborators of the session core
///
/// The recommender (`CatalogueClient`) produces candidate items and the media
/// locator (`MediaLocator`) turns an item's title and artist into a playable
/// preview. Both sit behind traits so the session core can be driven by
/// in-process fakes in tests and by HTTP clients in the binary.
use crate::{
    error::AppResult,
    models::{Item, ItemId, PlayableSource, PreferenceVector},
};

pub mod preview;
pub mod recommender;

pub use preview::HttpMediaLocator;
pub use recommender::HttpCatalogueClient;

/// Source of candidate items
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogueClient: Send + Sync {
    /// Fetch up to `count` candidates for the given preferences
    ///
    /// `exclude` lets the remote side pre-filter already shown items; callers
    /// must still filter locally since the remote side may ignore it. `seed`
    /// varies the result set between successive calls.
    async fn fetch_candidates(
        &self,
        count: usize,
        preferences: &PreferenceVector,
        exclude: &[ItemId],
        seed: u64,
    ) -> AppResult<Vec<Item>>;

    /// Client name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Outcome of a lookup that found nothing playable
///
/// Both variants are expected results of a fuzzy external match, not faults.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LocateError {
    #[error("No playable preview found")]
    NotFound,

    #[error("Preview lookup failed: {0}")]
    Failed(String),
}

/// Resolver from display metadata to a playable preview
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MediaLocator: Send + Sync {
    async fn resolve(
        &self,
        title: &str,
        primary_artist: &str,
    ) -> Result<PlayableSource, LocateError>;

    fn name(&self) -> &'static str;
}
