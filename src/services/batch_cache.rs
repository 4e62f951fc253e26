use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    error::{AppError, AppResult},
    models::{Batch, BatchSource, CacheSnapshot, Item, ItemId, PreferenceVector},
    services::providers::CatalogueClient,
};

/// Upper bound on candidates requested from the recommender in one call
pub const MAX_OVERFETCH: usize = 50;

/// Largest batch the UI may ask for
pub const MAX_BATCH_SIZE: usize = 50;

/// Batch size used until the UI picks one
pub const DEFAULT_BATCH_SIZE: usize = 30;

/// Number of candidates to request for a visible batch of `size`
///
/// Small batches get a larger relative margin since they drain the pool
/// fastest relative to the cost of a fetch.
pub fn overfetch_target(size: usize) -> usize {
    let multiplier = match size {
        0..=10 => 5,
        11..=20 => 4,
        _ => 3,
    };
    size.saturating_mul(multiplier).min(MAX_OVERFETCH)
}

pub fn validate_batch_size(size: usize) -> AppResult<()> {
    if size == 0 || size > MAX_BATCH_SIZE {
        return Err(AppError::InvalidInput(format!(
            "Batch size must be between 1 and {}, got {}",
            MAX_BATCH_SIZE, size
        )));
    }
    Ok(())
}

/// Fetched-but-unshown items plus the session's shown set
///
/// Invariant: no id in `pool` is also in `shown`.
#[derive(Debug, Default)]
struct CacheState {
    pool: VecDeque<Item>,
    shown: HashSet<ItemId>,
    generation: u64,
    /// Bumped by every invalidation, never reset
    epoch: u64,
}

impl CacheState {
    /// Serves `size` items from the pool, oldest first, if it holds enough
    fn take_from_pool(&mut self, size: usize) -> Option<Vec<Item>> {
        self.pool.retain(|item| !self.shown.contains(&item.id));
        if self.pool.len() < size {
            return None;
        }

        let served: Vec<Item> = self.pool.drain(..size).collect();
        self.mark_shown(&served);
        self.generation += 1;
        Some(served)
    }

    /// Splits a fresh fetch into the batch served now and the pooled remainder
    fn absorb(&mut self, fetched: Vec<Item>, size: usize) -> Vec<Item> {
        let mut in_response = HashSet::new();
        let mut fresh: Vec<Item> = fetched
            .into_iter()
            .filter(|item| !self.shown.contains(&item.id) && in_response.insert(item.id.clone()))
            .collect();

        let to_cache = fresh.split_off(fresh.len().min(size));
        self.mark_shown(&fresh);

        self.pool.retain(|item| !self.shown.contains(&item.id));
        let pooled: HashSet<ItemId> = self.pool.iter().map(|item| item.id.clone()).collect();
        self.pool
            .extend(to_cache.into_iter().filter(|item| !pooled.contains(&item.id)));

        self.generation += 1;
        fresh
    }

    fn mark_shown(&mut self, items: &[Item]) {
        self.shown.extend(items.iter().map(|item| item.id.clone()));
    }

    fn reset(&mut self) {
        self.pool.clear();
        self.shown.clear();
        self.generation = 0;
        self.epoch += 1;
    }

    fn excluded_ids(&self) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = self.shown.iter().cloned().collect();
        ids.sort();
        ids
    }
}

/// Over-fetching, session-wide deduplicating cache of recommendation batches
///
/// Each request is served from the local pool when it holds enough unshown
/// items; otherwise the recommender is asked for a larger candidate set and
/// the surplus is pooled for later requests. No item is returned twice until
/// the cache is invalidated.
pub struct BatchCache {
    client: Arc<dyn CatalogueClient>,
    state: Mutex<CacheState>,
}

impl BatchCache {
    pub fn new(client: Arc<dyn CatalogueClient>) -> Self {
        Self {
            client,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Returns up to `size` never-before-shown items
    ///
    /// A shorter batch is a soft under-fill, not an error. Fails with
    /// `UpstreamUnavailable` when the recommender call fails and the pool
    /// cannot cover the request, and with `Superseded` when the cache was
    /// invalidated while the fetch was in flight.
    pub async fn request_batch(
        &self,
        size: usize,
        preferences: &PreferenceVector,
    ) -> AppResult<Batch> {
        validate_batch_size(size)?;
        preferences.validate()?;

        let (epoch, seed, exclude) = {
            let mut state = self.state.lock().await;
            if let Some(items) = state.take_from_pool(size) {
                tracing::debug!(
                    served = items.len(),
                    pool_remaining = state.pool.len(),
                    generation = state.generation,
                    "Batch served from pool"
                );
                return Ok(Batch {
                    items,
                    requested: size,
                    generation: state.generation,
                    source: BatchSource::Pool,
                });
            }
            (state.epoch, state.generation, state.excluded_ids())
        };

        let requested = overfetch_target(size);
        tracing::info!(
            size,
            requested,
            epoch,
            excluded = exclude.len(),
            client = self.client.name(),
            "Pool exhausted, fetching candidates"
        );

        let fetched = self
            .client
            .fetch_candidates(requested, preferences, &exclude, seed)
            .await;

        let mut state = self.state.lock().await;
        if state.epoch != epoch {
            tracing::debug!(
                issued_epoch = epoch,
                current_epoch = state.epoch,
                "Discarding stale fetch result"
            );
            return Err(AppError::Superseded);
        }

        let fetched = match fetched {
            Ok(items) => items,
            Err(e) => {
                // A concurrent fetch may have refilled the pool meanwhile
                if let Some(items) = state.take_from_pool(size) {
                    tracing::warn!(error = %e, "Fetch failed, served from refilled pool");
                    return Ok(Batch {
                        items,
                        requested: size,
                        generation: state.generation,
                        source: BatchSource::Pool,
                    });
                }
                tracing::warn!(error = %e, "Recommender fetch failed");
                return Err(match e {
                    AppError::UpstreamUnavailable(_) => e,
                    other => AppError::UpstreamUnavailable(other.to_string()),
                });
            }
        };

        let received = fetched.len();
        let items = state.absorb(fetched, size);

        if items.len() < size {
            tracing::warn!(
                requested = size,
                served = items.len(),
                received,
                "Batch under-filled"
            );
        }

        tracing::info!(
            served = items.len(),
            pooled = state.pool.len(),
            generation = state.generation,
            "Batch served from fresh fetch"
        );

        Ok(Batch {
            items,
            requested: size,
            generation: state.generation,
            source: BatchSource::Upstream,
        })
    }

    /// Drops the pool and the shown set and starts a new epoch
    ///
    /// Fetches issued before this call are discarded when they complete.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        state.reset();
        tracing::info!(epoch = state.epoch, "Batch cache invalidated");
    }

    pub async fn snapshot(&self) -> CacheSnapshot {
        let state = self.state.lock().await;
        CacheSnapshot {
            pool_len: state.pool.len(),
            shown_count: state.shown.len(),
            generation: state.generation,
            epoch: state.epoch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::MockCatalogueClient;
    use std::ops::Range;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;
    use tokio_test::{assert_err, assert_ok};

    fn items(range: Range<usize>) -> Vec<Item> {
        range
            .map(|i| Item::new(format!("t{i}"), format!("Song {i}"), "Artist"))
            .collect()
    }

    fn ids(batch: &Batch) -> Vec<String> {
        batch.items.iter().map(|i| i.id.to_string()).collect()
    }

    fn cache_with(client: MockCatalogueClient) -> BatchCache {
        BatchCache::new(Arc::new(client))
    }

    #[test]
    fn test_overfetch_target() {
        assert_eq!(overfetch_target(1), 5);
        assert_eq!(overfetch_target(5), 25);
        assert_eq!(overfetch_target(10), 50);
        assert_eq!(overfetch_target(11), 44);
        assert_eq!(overfetch_target(20), 50);
        assert_eq!(overfetch_target(30), 50);
        assert_eq!(overfetch_target(50), 50);
    }

    #[tokio::test]
    async fn test_fetch_path_requests_overfetch_and_pools_remainder() {
        let mut client = MockCatalogueClient::new();
        client
            .expect_fetch_candidates()
            .withf(|count, _, exclude, seed| *count == 50 && exclude.is_empty() && *seed == 0)
            .times(1)
            .returning(|count, _, _, _| Ok(items(0..count)));
        client.expect_name().return_const("mock");

        let cache = cache_with(client);
        let batch = cache
            .request_batch(10, &PreferenceVector::new())
            .await
            .unwrap();

        assert_eq!(batch.source, BatchSource::Upstream);
        assert_eq!(ids(&batch), ids_for(0..10));
        assert_eq!(
            cache.snapshot().await,
            CacheSnapshot {
                pool_len: 40,
                shown_count: 10,
                generation: 1,
                epoch: 0,
            }
        );
    }

    fn ids_for(range: Range<usize>) -> Vec<String> {
        range.map(|i| format!("t{i}")).collect()
    }

    #[tokio::test]
    async fn test_instant_path_skips_upstream_and_serves_oldest_first() {
        let mut client = MockCatalogueClient::new();
        client
            .expect_fetch_candidates()
            .times(1)
            .returning(|count, _, _, _| Ok(items(0..count)));
        client.expect_name().return_const("mock");

        let cache = cache_with(client);
        let prefs = PreferenceVector::new();
        cache.request_batch(10, &prefs).await.unwrap();

        let second = cache.request_batch(10, &prefs).await.unwrap();
        assert_eq!(second.source, BatchSource::Pool);
        assert_eq!(ids(&second), ids_for(10..20));
        assert_eq!(second.generation, 2);

        let third = cache.request_batch(30, &prefs).await.unwrap();
        assert_eq!(third.source, BatchSource::Pool);
        assert_eq!(ids(&third), ids_for(20..50));
        assert_eq!(cache.snapshot().await.pool_len, 0);
    }

    #[tokio::test]
    async fn test_large_batch_request_is_capped() {
        let mut client = MockCatalogueClient::new();
        client
            .expect_fetch_candidates()
            .withf(|count, _, _, _| *count == 50)
            .times(1)
            .returning(|count, _, _, _| Ok(items(0..count)));
        client.expect_name().return_const("mock");

        let cache = cache_with(client);
        let batch = cache
            .request_batch(30, &PreferenceVector::new())
            .await
            .unwrap();
        assert_eq!(batch.items.len(), 30);
        assert_eq!(cache.snapshot().await.pool_len, 20);
    }

    #[tokio::test]
    async fn test_no_repeats_when_upstream_ignores_exclusions() {
        // Each call returns a window overlapping the previous one by half
        let offset = Arc::new(AtomicUsize::new(0));
        let mut client = MockCatalogueClient::new();
        client
            .expect_fetch_candidates()
            .returning(move |count, _, _, _| {
                let start = offset.fetch_add(count / 2, Ordering::SeqCst);
                Ok(items(start..start + count))
            });
        client.expect_name().return_const("mock");

        let cache = cache_with(client);
        let prefs = PreferenceVector::new();
        let mut seen = HashSet::new();

        for size in [10, 20, 30, 10, 50, 20, 10] {
            let batch = cache.request_batch(size, &prefs).await.unwrap();
            for item in batch.items {
                assert!(seen.insert(item.id.clone()), "repeated {}", item.id);
            }
        }
        assert_eq!(cache.snapshot().await.shown_count, seen.len());
    }

    #[tokio::test]
    async fn test_exclusion_list_and_seed_are_forwarded() {
        let mut client = MockCatalogueClient::new();
        let mut seq = mockall::Sequence::new();
        client
            .expect_fetch_candidates()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok(items(0..3)));
        client
            .expect_fetch_candidates()
            .withf(|_, _, exclude, seed| {
                *seed == 1
                    && exclude.to_vec()
                        == vec![ItemId::from("t0"), ItemId::from("t1"), ItemId::from("t2")]
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok(items(3..6)));
        client.expect_name().return_const("mock");

        let cache = cache_with(client);
        let prefs = PreferenceVector::new();
        cache.request_batch(3, &prefs).await.unwrap();
        let second = cache.request_batch(3, &prefs).await.unwrap();
        assert_eq!(ids(&second), ids_for(3..6));
    }

    #[tokio::test]
    async fn test_underfill_is_soft() {
        let mut client = MockCatalogueClient::new();
        client
            .expect_fetch_candidates()
            .returning(|_, _, _, _| Ok(items(0..3)));
        client.expect_name().return_const("mock");

        let cache = cache_with(client);
        let batch = cache
            .request_batch(10, &PreferenceVector::new())
            .await
            .unwrap();

        assert!(batch.is_underfilled());
        assert_eq!(batch.items.len(), 3);
        assert_eq!(batch.generation, 1);
        assert_eq!(cache.snapshot().await.pool_len, 0);
    }

    #[tokio::test]
    async fn test_duplicate_ids_within_one_response_are_dropped() {
        let mut client = MockCatalogueClient::new();
        client.expect_fetch_candidates().returning(|_, _, _, _| {
            let mut all = items(0..4);
            all.extend(items(0..4));
            Ok(all)
        });
        client.expect_name().return_const("mock");

        let cache = cache_with(client);
        let batch = cache
            .request_batch(2, &PreferenceVector::new())
            .await
            .unwrap();
        assert_eq!(ids(&batch), ids_for(0..2));
        assert_eq!(cache.snapshot().await.pool_len, 2);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_reported() {
        let mut client = MockCatalogueClient::new();
        client
            .expect_fetch_candidates()
            .returning(|_, _, _, _| Err(AppError::Internal("connection reset".into())));
        client.expect_name().return_const("mock");

        let cache = cache_with(client);
        let result = cache.request_batch(10, &PreferenceVector::new()).await;

        assert!(matches!(result, Err(AppError::UpstreamUnavailable(_))));
        assert_eq!(cache.snapshot().await, CacheSnapshot::default());
    }

    #[tokio::test]
    async fn test_invalid_batch_size_rejected() {
        let client = MockCatalogueClient::new();
        let cache = cache_with(client);
        let prefs = PreferenceVector::new();

        assert!(matches!(
            cache.request_batch(0, &prefs).await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            cache.request_batch(51, &prefs).await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_invalidate_resets_and_allows_repeats() {
        let mut client = MockCatalogueClient::new();
        client
            .expect_fetch_candidates()
            .times(2)
            .returning(|count, _, _, _| Ok(items(0..count)));
        client.expect_name().return_const("mock");

        let cache = cache_with(client);
        let prefs = PreferenceVector::new();
        let first = assert_ok!(cache.request_batch(10, &prefs).await);

        cache.invalidate().await;
        assert_eq!(
            cache.snapshot().await,
            CacheSnapshot {
                pool_len: 0,
                shown_count: 0,
                generation: 0,
                epoch: 1,
            }
        );

        let again = assert_ok!(cache.request_batch(10, &prefs).await);
        assert_eq!(again.source, BatchSource::Upstream);
        assert_eq!(ids(&again), ids(&first));
    }

    struct GatedClient {
        started: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait::async_trait]
    impl CatalogueClient for GatedClient {
        async fn fetch_candidates(
            &self,
            count: usize,
            _preferences: &PreferenceVector,
            _exclude: &[ItemId],
            _seed: u64,
        ) -> AppResult<Vec<Item>> {
            self.started.notify_one();
            self.release.notified().await;
            Ok(items(0..count))
        }

        fn name(&self) -> &'static str {
            "gated"
        }
    }

    #[tokio::test]
    async fn test_fetch_completing_after_invalidate_is_discarded() {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let cache = Arc::new(BatchCache::new(Arc::new(GatedClient {
            started: started.clone(),
            release: release.clone(),
        })));

        let in_flight = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.request_batch(10, &PreferenceVector::new()).await })
        };

        started.notified().await;
        cache.invalidate().await;
        release.notify_one();

        let result = in_flight.await.unwrap();
        let error = assert_err!(result);
        assert!(matches!(error, AppError::Superseded));
        assert_eq!(
            cache.snapshot().await,
            CacheSnapshot {
                pool_len: 0,
                shown_count: 0,
                generation: 0,
                epoch: 1,
            }
        );
    }
}
