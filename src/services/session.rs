use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::{GenerateOutcome, Item, ItemId, PlayState, PreferenceVector, SessionSnapshot},
    services::{
        batch_cache::{validate_batch_size, BatchCache, DEFAULT_BATCH_SIZE},
        playback::PlaybackController,
    },
};

/// Inputs the cached pool was built under
struct SessionInputs {
    preferences: PreferenceVector,
    batch_size: usize,
}

/// Entry point for the UI's session events
///
/// Records the current preferences and batch size, routes changes to either
/// into cache invalidation, generate requests to the batch cache and play
/// requests to the playback controller. The last returned batch is kept as-is
/// so play requests can be matched to the item the UI is showing.
pub struct SessionController {
    batches: BatchCache,
    playback: PlaybackController,
    inputs: RwLock<SessionInputs>,
    displayed: RwLock<Vec<Item>>,
}

impl SessionController {
    pub fn new(batches: BatchCache, playback: PlaybackController) -> Self {
        Self {
            batches,
            playback,
            inputs: RwLock::new(SessionInputs {
                preferences: PreferenceVector::new(),
                batch_size: DEFAULT_BATCH_SIZE,
            }),
            displayed: RwLock::new(Vec::new()),
        }
    }

    pub async fn on_preferences_changed(&self, preferences: PreferenceVector) -> AppResult<()> {
        preferences.validate()?;
        let mut inputs = self.inputs.write().await;
        tracing::info!(?preferences, "Preferences changed");
        inputs.preferences = preferences;
        self.batches.invalidate().await;
        Ok(())
    }

    pub async fn on_batch_size_changed(&self, size: usize) -> AppResult<()> {
        validate_batch_size(size)?;
        let mut inputs = self.inputs.write().await;
        tracing::info!(size, "Batch size changed");
        inputs.batch_size = size;
        self.batches.invalidate().await;
        Ok(())
    }

    /// Serves a batch under the recorded inputs
    ///
    /// An explicit size or preference vector that differs from the recorded
    /// one is recorded and resets the cache before the batch is drawn.
    pub async fn on_generate_requested(
        &self,
        size: Option<usize>,
        preferences: Option<PreferenceVector>,
    ) -> AppResult<GenerateOutcome> {
        if let Some(size) = size {
            validate_batch_size(size)?;
        }
        if let Some(preferences) = &preferences {
            preferences.validate()?;
        }

        let (size, preferences) = {
            let mut inputs = self.inputs.write().await;
            let mut changed = false;
            if let Some(size) = size.filter(|size| *size != inputs.batch_size) {
                tracing::info!(size, "Batch size changed by generate request");
                inputs.batch_size = size;
                changed = true;
            }
            if let Some(preferences) = preferences.filter(|p| *p != inputs.preferences) {
                tracing::info!(?preferences, "Preferences changed by generate request");
                inputs.preferences = preferences;
                changed = true;
            }
            if changed {
                self.batches.invalidate().await;
            }
            (inputs.batch_size, inputs.preferences.clone())
        };

        let batch = self.batches.request_batch(size, &preferences).await?;
        let outcome = GenerateOutcome::from(batch);

        *self.displayed.write().await = outcome.items.clone();

        if let Some(underfill) = outcome.underfilled {
            tracing::warn!(
                requested = underfill.requested,
                delivered = underfill.delivered,
                "Fewer new recommendations than requested"
            );
        }

        Ok(outcome)
    }

    /// Toggles an item shown in the current batch or still held by playback
    pub async fn on_item_play_requested(&self, item_id: &ItemId) -> AppResult<PlayState> {
        let displayed = self
            .displayed
            .read()
            .await
            .iter()
            .find(|item| &item.id == item_id)
            .cloned();

        let item = match displayed {
            Some(item) => item,
            None => self
                .playback
                .held_item(item_id)
                .await
                .ok_or_else(|| AppError::NotFound(format!("Item {} is not displayed", item_id)))?,
        };

        Ok(self.playback.play(&item).await)
    }

    /// Drops all recommendation state and stops playback
    pub async fn reset(&self) {
        self.batches.invalidate().await;
        self.playback.stop().await;
        self.displayed.write().await.clear();
        tracing::info!("Session reset");
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let (preferences, batch_size) = {
            let inputs = self.inputs.read().await;
            (inputs.preferences.clone(), inputs.batch_size)
        };
        SessionSnapshot {
            items: self.displayed.read().await.clone(),
            preferences,
            batch_size,
            cache: self.batches.snapshot().await,
            playback: self.playback.snapshot().await,
        }
    }
}
