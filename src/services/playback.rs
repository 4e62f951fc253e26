use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::{sync::Mutex, task::JoinHandle, time::Instant};

use crate::{
    models::{Item, ItemId, PlayState, PlayableSource, PlaybackSnapshot},
    services::providers::MediaLocator,
};

/// Offset in seconds at which a never-played preview starts
pub const DEFAULT_START_OFFSET: f64 = 0.0;

/// How long a failed resolution stays visible before clearing itself
pub const ERROR_CLEAR_AFTER: Duration = Duration::from_secs(3);

/// The single playback output, owned exclusively by `PlaybackController`
#[cfg_attr(test, mockall::automock)]
pub trait PreviewSink: Send {
    /// Begin streaming `source` at `offset` seconds
    fn start(&mut self, source: &PlayableSource, offset: f64);

    /// Halt output, returning the current offset when the backend knows it
    fn stop(&mut self) -> Option<f64>;
}

/// Sink that only keeps time
///
/// Used when the browser renders the audio itself: the position is derived
/// from when playback started.
#[derive(Debug, Default)]
pub struct ClockSink {
    playing: Option<(Instant, f64)>,
}

impl PreviewSink for ClockSink {
    fn start(&mut self, source: &PlayableSource, offset: f64) {
        tracing::debug!(uri = %source.uri, offset, "Preview output started");
        self.playing = Some((Instant::now(), offset));
    }

    fn stop(&mut self) -> Option<f64> {
        self.playing
            .take()
            .map(|(started, offset)| offset + started.elapsed().as_secs_f64())
    }
}

struct ErrorMark {
    item_id: ItemId,
    token: u64,
    timer: JoinHandle<()>,
}

struct PlaybackState {
    sink: Box<dyn PreviewSink>,
    active: Option<ItemId>,
    loading: Option<ItemId>,
    paused: Option<ItemId>,
    /// The item behind `active`, `loading` or `paused`
    held: Option<Item>,
    error: Option<ErrorMark>,
    resume_positions: HashMap<ItemId, f64>,
    resolved_sources: HashMap<ItemId, PlayableSource>,
    /// Stamp of the latest resolution request
    ticket: u64,
    error_token: u64,
}

impl PlaybackState {
    fn state_of(&self, id: &ItemId) -> PlayState {
        if self.active.as_ref() == Some(id) {
            PlayState::Active
        } else if self.loading.as_ref() == Some(id) {
            PlayState::Loading
        } else if self.error.as_ref().is_some_and(|mark| &mark.item_id == id) {
            PlayState::Errored
        } else if self.paused.as_ref() == Some(id) {
            PlayState::Paused
        } else {
            PlayState::Idle
        }
    }

    /// Stops the sink and remembers where the active item got to
    fn halt_active(&mut self) -> Option<ItemId> {
        let id = self.active.take()?;
        if let Some(offset) = self.sink.stop() {
            self.resume_positions.insert(id.clone(), offset);
        }
        Some(id)
    }

    /// Forces every item out of Active, Loading and Paused
    fn release(&mut self) {
        if let Some(id) = self.halt_active() {
            tracing::info!(item_id = %id, "Playback stopped");
        }
        if let Some(id) = self.loading.take() {
            tracing::debug!(item_id = %id, "Pending resolution abandoned");
        }
        self.paused = None;
        self.held = None;
    }

    fn begin(&mut self, id: &ItemId, source: &PlayableSource) {
        let offset = match (self.resume_positions.get(id), source.duration_secs) {
            (Some(&offset), Some(duration)) if offset >= duration => DEFAULT_START_OFFSET,
            (Some(&offset), _) => offset,
            (None, _) => DEFAULT_START_OFFSET,
        };

        self.sink.start(source, offset);
        self.active = Some(id.clone());
        tracing::info!(item_id = %id, offset, "Playback started");
    }

    fn clear_error(&mut self) {
        if let Some(mark) = self.error.take() {
            mark.timer.abort();
        }
    }

    fn clear_error_for(&mut self, id: &ItemId) {
        if self.error.as_ref().is_some_and(|mark| &mark.item_id == id) {
            self.clear_error();
        }
    }
}

/// Owner of the single active preview
///
/// At most one item is Active or Loading at any time. Resolved sources and
/// resume offsets are remembered per item for the lifetime of the controller.
pub struct PlaybackController {
    locator: Arc<dyn MediaLocator>,
    state: Arc<Mutex<PlaybackState>>,
}

impl PlaybackController {
    pub fn new(locator: Arc<dyn MediaLocator>, sink: Box<dyn PreviewSink>) -> Self {
        Self {
            locator,
            state: Arc::new(Mutex::new(PlaybackState {
                sink,
                active: None,
                loading: None,
                paused: None,
                held: None,
                error: None,
                resume_positions: HashMap::new(),
                resolved_sources: HashMap::new(),
                ticket: 0,
                error_token: 0,
            })),
        }
    }

    /// Toggles playback of `item`
    ///
    /// Pauses the item if it is playing; otherwise stops whatever is playing
    /// and starts this item, resolving its source first if needed. Returns
    /// the item's state once the call settles.
    pub async fn play(&self, item: &Item) -> PlayState {
        let id = &item.id;

        let ticket = {
            let mut state = self.state.lock().await;

            if state.active.as_ref() == Some(id) {
                state.halt_active();
                state.paused = Some(id.clone());
                tracing::info!(
                    item_id = %id,
                    offset = state.resume_positions.get(id).copied(),
                    "Playback paused"
                );
                return PlayState::Paused;
            }

            if state.loading.as_ref() == Some(id) {
                return PlayState::Loading;
            }

            state.release();
            state.clear_error_for(id);
            state.held = Some(item.clone());

            if let Some(source) = state.resolved_sources.get(id).cloned() {
                state.begin(id, &source);
                return PlayState::Active;
            }

            state.loading = Some(id.clone());
            state.ticket += 1;
            state.ticket
        };

        tracing::info!(
            item_id = %id,
            title = %item.title(),
            locator = self.locator.name(),
            "Resolving preview"
        );

        let resolved = self
            .locator
            .resolve(item.title(), item.primary_artist())
            .await;

        let mut state = self.state.lock().await;
        if state.ticket != ticket || state.loading.as_ref() != Some(id) {
            tracing::debug!(item_id = %id, "Discarding stale preview resolution");
            return state.state_of(id);
        }
        state.loading = None;

        match resolved {
            Ok(source) => {
                state.resolved_sources.insert(id.clone(), source.clone());
                state.begin(id, &source);
                PlayState::Active
            }
            Err(e) => {
                tracing::warn!(item_id = %id, error = %e, "No playable preview");
                state.held = None;
                self.mark_errored(&mut state, id);
                PlayState::Errored
            }
        }
    }

    /// Sets the item's transient error and schedules its removal
    fn mark_errored(&self, state: &mut PlaybackState, id: &ItemId) {
        state.clear_error();
        state.error_token += 1;
        let token = state.error_token;

        let shared = Arc::clone(&self.state);
        let item_id = id.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(ERROR_CLEAR_AFTER).await;
            let mut state = shared.lock().await;
            if state.error.as_ref().is_some_and(|mark| mark.token == token) {
                state.error = None;
                tracing::debug!(item_id = %item_id, "Playback error cleared");
            }
        });

        state.error = Some(ErrorMark {
            item_id: id.clone(),
            token,
            timer,
        });
    }

    /// Stops all playback, keeping resume offsets and resolved sources
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        state.release();
        state.clear_error();
    }

    pub async fn state_of(&self, id: &ItemId) -> PlayState {
        self.state.lock().await.state_of(id)
    }

    /// The active, loading or paused item with this id, if there is one
    pub async fn held_item(&self, id: &ItemId) -> Option<Item> {
        self.state
            .lock()
            .await
            .held
            .as_ref()
            .filter(|item| &item.id == id)
            .cloned()
    }

    pub async fn resume_position(&self, id: &ItemId) -> Option<f64> {
        self.state.lock().await.resume_positions.get(id).copied()
    }

    pub async fn snapshot(&self) -> PlaybackSnapshot {
        let state = self.state.lock().await;
        PlaybackSnapshot {
            active: state.active.clone(),
            loading: state.loading.clone(),
            paused: state.paused.clone(),
            errored: state.error.as_ref().map(|mark| mark.item_id.clone()),
            resume_positions: state
                .resume_positions
                .iter()
                .map(|(id, offset)| (id.clone(), *offset))
                .collect(),
        }
    }
}
