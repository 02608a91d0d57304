mod cache;
mod error;
mod mutations;
mod queries;

pub use cache::{BucketCache, bucket_index};
pub use error::ScheduleError;
pub use queries::{RangeCursor, gaps_between};

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

use tokio::sync::RwLock;
use tracing::info;

use crate::config::SchedulerConfig;
use crate::model::*;
use crate::notify::{CacheListener, SubscriberRegistry, SubscriptionId};
use crate::observability;
use crate::store::StoreGateway;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as Ms
}

/// The shared scheduling core: a time-bucketed cache over the store, the
/// query layer on top of it, and the subscriber registry it notifies.
///
/// Construct exactly one per process at the composition root and hand out
/// `Arc` clones — there is no hidden global instance. All mutating
/// operations (including lazy loads triggered by reads) serialize on the
/// cache's write lock; store round-trips are the only await points.
pub struct Scheduler {
    cache: RwLock<BucketCache>,
    store: Arc<dyn StoreGateway>,
    subscribers: SubscriberRegistry,
    config: SchedulerConfig,
    /// High-water id observed at bootstrap and on every insert since.
    max_seen_id: AtomicI64,
}

impl Scheduler {
    /// Validate the config, eagerly load `[anchor - preload, anchor +
    /// preload)`, and record the store's high-water id. Fails outright on a
    /// bad config or an unreachable store — never a partially-usable cache.
    pub async fn bootstrap(
        config: SchedulerConfig,
        store: Arc<dyn StoreGateway>,
    ) -> Result<Arc<Self>, ScheduleError> {
        config.validate()?;
        let cache = BucketCache::new(config.anchor, config.bucket_period)?;
        let scheduler = Arc::new(Self {
            cache: RwLock::new(cache),
            store,
            subscribers: SubscriberRegistry::new(),
            config,
            max_seen_id: AtomicI64::new(0),
        });

        let window = Span::new(
            scheduler.config.anchor - scheduler.config.preload,
            scheduler.config.anchor + scheduler.config.preload,
        );
        scheduler.load_range(window).await?;
        let max_id = scheduler.store.max_id().await?;
        scheduler.max_seen_id.store(max_id, Ordering::Relaxed);
        info!(
            anchor = scheduler.config.anchor,
            max_id,
            cached = scheduler.cache.read().await.len(),
            "scheduler bootstrapped"
        );
        Ok(scheduler)
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Highest appointment id this process has seen the store assign.
    pub fn max_seen_id(&self) -> AppointmentId {
        self.max_seen_id.load(Ordering::Relaxed)
    }

    /// Bucket index for a timestamp under this scheduler's anchor/period.
    pub fn bucket_of(&self, ts: Ms) -> i64 {
        bucket_index(ts, self.config.anchor, self.config.bucket_period)
    }

    pub fn subscribe(&self, listener: Arc<dyn CacheListener>) -> SubscriptionId {
        self.subscribers.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// One bucket's appointments, sorted by start. A cold bucket is loaded
    /// from the store and checked again — one bounded retry, not a
    /// recursion, so a persistently failing store surfaces as an error
    /// instead of a loop. A warm-but-empty bucket is a valid empty answer.
    pub async fn bucket(&self, index: i64) -> Result<Vec<Appointment>, ScheduleError> {
        let span = {
            let cache = self.cache.read().await;
            if let Some(list) = cache.bucket_if_warm(index) {
                metrics::counter!(observability::CACHE_HITS_TOTAL).increment(1);
                return Ok(list);
            }
            cache.bucket_span(index)
        };
        metrics::counter!(observability::CACHE_MISSES_TOTAL).increment(1);

        self.load_range(span).await?;

        let cache = self.cache.read().await;
        cache.bucket_if_warm(index).ok_or_else(|| {
            ScheduleError::Inconsistent(format!("bucket {index} still cold after load"))
        })
    }

    /// Sync the cache with the store over `span`, aligned outward to bucket
    /// boundaries. The store is consulted even when the range is already
    /// warm — the cache does not own it exclusively, so rows written by
    /// other parties must still be picked up; re-loaded rows dedupe by id.
    /// All-or-nothing: a failed store call leaves the cache untouched.
    pub async fn load_range(&self, span: Span) -> Result<(), ScheduleError> {
        if span.start >= span.end {
            return Ok(());
        }
        // Write lock up front: loads mutate the cache and must serialize
        // with every other mutation.
        let mut cache = self.cache.write().await;
        let first = cache.bucket_of(span.start);
        let last = cache.bucket_of(span.end - 1);
        let aligned = Span::new(
            cache.bucket_span(first).start,
            cache.bucket_span(last).end,
        );

        let started = Instant::now();
        let rows = self.store.find_in_range(aligned).await?;
        metrics::histogram!(observability::LOAD_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        metrics::counter!(observability::STORE_LOADS_TOTAL).increment(1);

        cache.absorb(aligned, rows);
        Ok(())
    }

    /// Number of appointments currently mirrored in memory.
    pub async fn cached_len(&self) -> usize {
        self.cache.read().await.len()
    }

    fn record_assigned_id(&self, id: AppointmentId) {
        self.max_seen_id.fetch_max(id, Ordering::Relaxed);
    }
}
