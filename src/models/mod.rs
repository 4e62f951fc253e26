use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod item;
pub mod preferences;

pub use item::{Item, ItemId, ItemMetadata};
pub use preferences::PreferenceVector;

/// Handle the playback backend needs to stream an item's preview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayableSource {
    /// Stream URL of the preview
    pub uri: String,
    /// Playable length of the preview in seconds, when the locator knows it
    pub duration_secs: Option<f64>,
    pub resolved_at: DateTime<Utc>,
}

impl PlayableSource {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            duration_secs: None,
            resolved_at: Utc::now(),
        }
    }
}

// ============================================================================
// Batch Types
// ============================================================================

/// Where a served batch came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchSource {
    /// Served instantly from previously over-fetched items
    Pool,
    /// Served from a fresh recommender call
    Upstream,
}

/// Items returned for one "generate" request
#[derive(Debug, Clone, Serialize)]
pub struct Batch {
    pub items: Vec<Item>,
    pub requested: usize,
    /// Generation counter after this serve
    pub generation: u64,
    pub source: BatchSource,
}

impl Batch {
    /// Fewer non-repeated items were available than requested
    pub fn is_underfilled(&self) -> bool {
        self.items.len() < self.requested
    }
}

/// Soft under-fill notice for the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Underfill {
    pub requested: usize,
    pub delivered: usize,
}

/// Response to a generate request
#[derive(Debug, Clone, Serialize)]
pub struct GenerateOutcome {
    pub items: Vec<Item>,
    pub requested: usize,
    pub generation: u64,
    pub source: BatchSource,
    pub underfilled: Option<Underfill>,
}

impl From<Batch> for GenerateOutcome {
    fn from(batch: Batch) -> Self {
        let underfilled = batch.is_underfilled().then_some(Underfill {
            requested: batch.requested,
            delivered: batch.items.len(),
        });

        Self {
            items: batch.items,
            requested: batch.requested,
            generation: batch.generation,
            source: batch.source,
            underfilled,
        }
    }
}

// ============================================================================
// Snapshot Types
// ============================================================================

/// Per-item playback state as seen by the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayState {
    Idle,
    Loading,
    Active,
    Paused,
    Errored,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CacheSnapshot {
    pub pool_len: usize,
    pub shown_count: usize,
    pub generation: u64,
    pub epoch: u64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct PlaybackSnapshot {
    pub active: Option<ItemId>,
    pub loading: Option<ItemId>,
    pub paused: Option<ItemId>,
    pub errored: Option<ItemId>,
    pub resume_positions: BTreeMap<ItemId, f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub items: Vec<Item>,
    pub preferences: PreferenceVector,
    pub batch_size: usize,
    pub cache: CacheSnapshot,
    pub playback: PlaybackSnapshot,
}
