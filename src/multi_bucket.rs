//! Exposes a single-bucket aggregator as a multi-bucket one.
//!
//! [`MultiBucketAggregator`] is, from the caller's perspective,
//! indistinguishable from a natively multi-bucket [`Aggregator`]: it accepts
//! any bucket id and routes each document to the aggregator instance owned by
//! that bucket, while every wrapped instance only ever sees bucket `0`.

use std::sync::Arc;

use crate::aggregator::{
    Aggregator, AggregatorFactory, Fruit, LeafBucketCollector, LeafContext, Scorer,
};
use crate::registry::BucketAggregatorRegistry;
use crate::{BucketId, DocId};

/// Adapter exposing the multi-bucket aggregator surface over a single-bucket
/// factory.
///
/// Aggregator instances are built lazily, one per bucket ordinal, on the
/// first document (or harvest) that references the ordinal. Buckets that
/// never receive a document cost nothing.
pub struct MultiBucketAggregator {
    registry: Arc<BucketAggregatorRegistry>,
}

impl MultiBucketAggregator {
    /// Wraps `factory` so its single-bucket aggregators can collect from any
    /// bucket.
    ///
    /// `parent` is forwarded to the factory whenever a per-bucket instance is
    /// built.
    pub fn from_factory(
        factory: Arc<dyn AggregatorFactory>,
        parent: Option<Arc<dyn Aggregator>>,
    ) -> MultiBucketAggregator {
        MultiBucketAggregator {
            registry: Arc::new(BucketAggregatorRegistry::from_factory(factory, parent)),
        }
    }
}

impl Aggregator for MultiBucketAggregator {
    fn leaf_collector(&self, leaf: &LeafContext) -> crate::Result<Box<dyn LeafBucketCollector>> {
        Ok(Box::new(MultiBucketLeafCollector::new(
            Arc::clone(&self.registry),
            *leaf,
        )))
    }

    fn harvest(&self, bucket: BucketId) -> crate::Result<Box<dyn Fruit>> {
        // First reference builds the instance, consistent with collect().
        self.registry.get_or_create(bucket)?.harvest(0)
    }

    fn close(&self) -> crate::Result<()> {
        self.registry.close()
    }
}

struct PerBucketLeaf {
    collector: Box<dyn LeafBucketCollector>,
    /// Scorer epoch last pushed to this collector. 0 means never.
    pushed_epoch: u64,
}

/// Routes `collect(doc, bucket)` calls of one segment to per-bucket leaf
/// collectors, creating each collector the first time its bucket receives a
/// document.
///
/// Scorer propagation is deferred: `set_scorer` only records the scorer and
/// starts a new epoch, the push to a per-bucket collector happens on that
/// bucket's next `collect` call. Pushing eagerly would force every bucket's
/// collector into existence whether or not it ever collects.
pub struct MultiBucketLeafCollector {
    registry: Arc<BucketAggregatorRegistry>,
    leaf: LeafContext,
    /// Per-bucket collectors for the current segment, indexed by bucket id.
    leaves: Vec<Option<PerBucketLeaf>>,
    scorer: Option<Arc<dyn Scorer>>,
    /// Bumped on every `set_scorer` call.
    epoch: u64,
}

impl MultiBucketLeafCollector {
    pub(crate) fn new(
        registry: Arc<BucketAggregatorRegistry>,
        leaf: LeafContext,
    ) -> MultiBucketLeafCollector {
        MultiBucketLeafCollector {
            registry,
            leaf,
            leaves: Vec::new(),
            scorer: None,
            epoch: 0,
        }
    }
}

impl LeafBucketCollector for MultiBucketLeafCollector {
    fn set_scorer(&mut self, scorer: Arc<dyn Scorer>) -> crate::Result<()> {
        self.scorer = Some(scorer);
        self.epoch += 1;
        Ok(())
    }

    #[inline]
    fn collect(&mut self, doc: DocId, bucket: BucketId) -> crate::Result<()> {
        let idx = bucket as usize;
        if self.leaves.len() <= idx {
            self.leaves.resize_with(idx + 1, || None);
        }
        let entry = match &mut self.leaves[idx] {
            Some(entry) => entry,
            slot => {
                let aggregator = self.registry.get_or_create(bucket)?;
                let collector = aggregator.leaf_collector(&self.leaf)?;
                slot.insert(PerBucketLeaf {
                    collector,
                    pushed_epoch: 0,
                })
            }
        };
        if entry.pushed_epoch != self.epoch {
            if let Some(scorer) = &self.scorer {
                entry.collector.set_scorer(Arc::clone(scorer))?;
            }
            entry.pushed_epoch = self.epoch;
        }
        // The wrapped aggregator is single-bucket by contract and must never
        // observe a nonzero bucket index.
        entry.collector.collect(doc, 0)
    }

    fn flush(&mut self) -> crate::Result<()> {
        for entry in self.leaves.iter_mut().flatten() {
            entry.collector.flush()?;
        }
        Ok(())
    }
}
