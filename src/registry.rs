//! Owns the mapping from bucket ordinal to the lazily created aggregator
//! instance accumulating that bucket.

use std::sync::{Arc, Mutex};

use itertools::Itertools;
use log::{debug, warn};
use rustc_hash::FxHashMap;

use crate::aggregator::{Aggregator, AggregatorFactory};
use crate::{AggregationError, BucketId};

/// Registry of the per-bucket aggregator instances of one wrapped
/// aggregation.
///
/// The registry is shared by every segment collected under the same wrapped
/// aggregator: the per-bucket *aggregator* is one logical accumulator fed by
/// multiple segments over time, while its per-segment *collectors* stay local
/// to [`MultiBucketLeafCollector`](crate::multi_bucket::MultiBucketLeafCollector).
/// Segments may be collected concurrently, so the ordinal map lives behind a
/// mutex.
pub struct BucketAggregatorRegistry {
    factory: Arc<dyn AggregatorFactory>,
    parent: Option<Arc<dyn Aggregator>>,
    state: Mutex<RegistryState>,
}

#[derive(Default)]
struct RegistryState {
    aggregators: FxHashMap<BucketId, Arc<dyn Aggregator>>,
    closed: bool,
}

impl BucketAggregatorRegistry {
    /// Creates an empty registry building instances from `factory`.
    ///
    /// `parent` is handed to the factory on every build.
    pub fn from_factory(
        factory: Arc<dyn AggregatorFactory>,
        parent: Option<Arc<dyn Aggregator>>,
    ) -> BucketAggregatorRegistry {
        BucketAggregatorRegistry {
            factory,
            parent,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Returns the aggregator accumulating `bucket`, building it on first
    /// reference.
    ///
    /// When the build fails nothing is recorded for `bucket`; a later call
    /// for the same ordinal asks the factory again.
    pub fn get_or_create(&self, bucket: BucketId) -> crate::Result<Arc<dyn Aggregator>> {
        let mut state = self.state.lock()?;
        if state.closed {
            return Err(AggregationError::AlreadyClosed);
        }
        if let Some(aggregator) = state.aggregators.get(&bucket) {
            return Ok(Arc::clone(aggregator));
        }
        // The lock is held across the build, so concurrent callers can never
        // observe two distinct instances for the same ordinal.
        let aggregator: Arc<dyn Aggregator> =
            Arc::from(self.factory.create(self.parent.as_deref(), true)?);
        debug!("built aggregator for bucket {bucket}");
        state.aggregators.insert(bucket, Arc::clone(&aggregator));
        Ok(aggregator)
    }

    /// Releases every created instance, in ordinal order.
    ///
    /// Best-effort: a failing release does not abort the remaining ones, all
    /// failures are reported together in
    /// [`AggregationError::CloseFailed`]. A second close is a no-op.
    pub fn close(&self) -> crate::Result<()> {
        let aggregators = {
            let mut state = self.state.lock()?;
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            std::mem::take(&mut state.aggregators)
        };
        let mut failures = Vec::new();
        for (bucket, aggregator) in aggregators
            .into_iter()
            .sorted_unstable_by_key(|(bucket, _)| *bucket)
        {
            if let Err(err) = aggregator.close() {
                warn!("failed to close aggregator for bucket {bucket}: {err}");
                failures.push(err);
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(AggregationError::CloseFailed(failures))
        }
    }
}
