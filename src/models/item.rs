use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Stable identifier of a recommendable item within a session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Display metadata for an item
///
/// Opaque to the batch engine; the playback side only reads `name` and
/// `artist` as a lookup key for preview resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub name: String,
    pub artist: String,
    #[serde(default)]
    pub album: Option<String>,
    /// Which recommender strategy produced the item
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub popularity: Option<u32>,
}

/// A single recommended item, immutable once received
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    #[serde(flatten)]
    pub metadata: ItemMetadata,
    /// Deep link into the catalogue's own player
    #[serde(default)]
    pub external_url: Option<String>,
}

impl Item {
    pub fn new(id: impl Into<String>, name: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id: ItemId::new(id),
            metadata: ItemMetadata {
                name: name.into(),
                artist: artist.into(),
                ..Default::default()
            },
            external_url: None,
        }
    }

    pub fn title(&self) -> &str {
        &self.metadata.name
    }

    /// First listed artist; multi-artist credits are comma separated upstream
    pub fn primary_artist(&self) -> &str {
        self.metadata
            .artist
            .split(',')
            .next()
            .map(str::trim)
            .unwrap_or_default()
    }
}
