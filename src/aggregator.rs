//! The capability surface between the adapter and the wrapped aggregation
//! logic.
//!
//! An [`Aggregator`] accumulates one statistic over all segments of a
//! collection and hands out one [`LeafBucketCollector`] per segment. The
//! collection loop drives the leaf collector with `collect(doc, bucket)`
//! calls and keeps it informed of the current [`Scorer`].
//!
//! A *single-bucket* aggregator is an implementation that assumes every
//! `collect` call targets bucket `0`. The
//! [`MultiBucketAggregator`](crate::multi_bucket::MultiBucketAggregator)
//! adapter turns such an implementation into one that accepts arbitrary
//! bucket ids.

use std::sync::Arc;

use downcast_rs::{impl_downcast, Downcast};

use crate::{BucketId, DocId, Score, SegmentOrdinal};

/// What a leaf collector needs to know about the segment it is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeafContext {
    segment_ord: SegmentOrdinal,
    max_doc: DocId,
}

impl LeafContext {
    /// Creates the context for the segment `segment_ord` holding `max_doc`
    /// documents.
    pub fn new(segment_ord: SegmentOrdinal, max_doc: DocId) -> LeafContext {
        LeafContext {
            segment_ord,
            max_doc,
        }
    }

    /// The index of the segment within the collection pass.
    pub fn segment_ord(&self) -> SegmentOrdinal {
        self.segment_ord
    }

    /// The number of documents in the segment.
    pub fn max_doc(&self) -> DocId {
        self.max_doc
    }
}

/// Per-segment provider of the relevance score of a document.
///
/// One scorer is shared by all per-bucket leaf collectors of a segment, so
/// scoring takes `&self`. Implementations that need mutable state use
/// interior mutability.
pub trait Scorer: Send + Sync + 'static {
    /// Returns the score of `doc` for the query being collected.
    fn score(&self, doc: DocId) -> Score;
}

/// The result accumulated by an aggregator.
///
/// Whatever statistic the wrapped aggregator computed. Opaque to the adapter;
/// the reduction path downcasts it back to its concrete type.
pub trait Fruit: Send + Downcast {}
impl_downcast!(Fruit);

impl<T> Fruit for T where T: Send + Downcast {}

/// The per-segment collection surface of an aggregator.
pub trait LeafBucketCollector {
    /// Records the scorer for the current segment.
    ///
    /// Guaranteed to be called before the first `collect` call that needs
    /// it, whenever the collection loop scores documents at all.
    fn set_scorer(&mut self, _scorer: Arc<dyn Scorer>) -> crate::Result<()> {
        Ok(())
    }

    /// Collects one document into `bucket`.
    fn collect(&mut self, doc: DocId, bucket: BucketId) -> crate::Result<()>;

    /// Finalize method. Collectors staging docs in a buffer collect them
    /// here.
    fn flush(&mut self) -> crate::Result<()> {
        Ok(())
    }
}

/// An aggregator accumulates one statistic, fed by the segments of a
/// collection one leaf collector at a time.
pub trait Aggregator: Send + Sync + 'static {
    /// Returns the collector bound to the given segment.
    fn leaf_collector(&self, leaf: &LeafContext) -> crate::Result<Box<dyn LeafBucketCollector>>;

    /// Builds the result accumulated for `bucket`.
    fn harvest(&self, bucket: BucketId) -> crate::Result<Box<dyn Fruit>>;

    /// Releases the resources held by the aggregator.
    fn close(&self) -> crate::Result<()>;
}

impl std::fmt::Debug for dyn Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Aggregator")
    }
}

/// Builds aggregator instances for one aggregation of a request.
pub trait AggregatorFactory: Send + Sync {
    /// Builds a new aggregator instance.
    ///
    /// With `collects_from_single_bucket` set, the returned instance may
    /// assume that every `collect` call it sees targets bucket `0`.
    fn create(
        &self,
        parent: Option<&dyn Aggregator>,
        collects_from_single_bucket: bool,
    ) -> crate::Result<Box<dyn Aggregator>>;
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::AggregationError;

    /// One call observed by a recording aggregator instance.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum Call {
        NewLeaf { segment_ord: SegmentOrdinal },
        SetScorer { scorer: u32 },
        Collect { doc: DocId, bucket: BucketId },
        Flush,
        Harvest { bucket: BucketId },
        Close,
    }

    /// Scorer double whose identity can be read back through `score()`.
    pub(crate) struct TestScorer {
        id: u32,
    }

    impl TestScorer {
        pub(crate) fn new(id: u32) -> Arc<dyn Scorer> {
            Arc::new(TestScorer { id })
        }
    }

    impl Scorer for TestScorer {
        fn score(&self, _doc: DocId) -> Score {
            self.id as Score
        }
    }

    pub(crate) struct RecordingLeafCollector {
        calls: Arc<Mutex<Vec<Call>>>,
    }

    impl LeafBucketCollector for RecordingLeafCollector {
        fn set_scorer(&mut self, scorer: Arc<dyn Scorer>) -> crate::Result<()> {
            self.calls.lock().unwrap().push(Call::SetScorer {
                scorer: scorer.score(0) as u32,
            });
            Ok(())
        }

        fn collect(&mut self, doc: DocId, bucket: BucketId) -> crate::Result<()> {
            self.calls.lock().unwrap().push(Call::Collect { doc, bucket });
            Ok(())
        }

        fn flush(&mut self) -> crate::Result<()> {
            self.calls.lock().unwrap().push(Call::Flush);
            Ok(())
        }
    }

    pub(crate) struct RecordingAggregator {
        instance_id: u32,
        calls: Arc<Mutex<Vec<Call>>>,
        close_order: Arc<Mutex<Vec<u32>>>,
        fail_close: bool,
    }

    impl Aggregator for RecordingAggregator {
        fn leaf_collector(
            &self,
            leaf: &LeafContext,
        ) -> crate::Result<Box<dyn LeafBucketCollector>> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call::NewLeaf {
                segment_ord: leaf.segment_ord(),
            });
            Ok(Box::new(RecordingLeafCollector {
                calls: Arc::clone(&self.calls),
            }))
        }

        fn harvest(&self, bucket: BucketId) -> crate::Result<Box<dyn Fruit>> {
            self.calls.lock().unwrap().push(Call::Harvest { bucket });
            Ok(Box::new(self.instance_id))
        }

        fn close(&self) -> crate::Result<()> {
            self.calls.lock().unwrap().push(Call::Close);
            self.close_order.lock().unwrap().push(self.instance_id);
            if self.fail_close {
                return Err(AggregationError::InternalError(format!(
                    "instance {} failed to release",
                    self.instance_id
                )));
            }
            Ok(())
        }
    }

    /// Factory double handing out recording aggregator instances.
    ///
    /// Instances are numbered in creation order; their call logs can be read
    /// back through [`RecordingFactory::instance_calls`].
    #[derive(Default)]
    pub(crate) struct RecordingFactory {
        instances: Mutex<Vec<Arc<Mutex<Vec<Call>>>>>,
        close_order: Arc<Mutex<Vec<u32>>>,
        num_creates: AtomicU32,
        fail_next_create: AtomicBool,
        fail_close: AtomicBool,
        saw_parent: AtomicBool,
    }

    impl RecordingFactory {
        pub(crate) fn num_instances(&self) -> usize {
            self.instances.lock().unwrap().len()
        }

        /// Total `create` calls, including failed ones.
        pub(crate) fn num_creates(&self) -> u32 {
            self.num_creates.load(Ordering::SeqCst)
        }

        pub(crate) fn instance_calls(&self, nth: usize) -> Vec<Call> {
            self.instances.lock().unwrap()[nth].lock().unwrap().clone()
        }

        /// Instance ids in the order their `close()` was called.
        pub(crate) fn close_order(&self) -> Vec<u32> {
            self.close_order.lock().unwrap().clone()
        }

        pub(crate) fn fail_next_create(&self) {
            self.fail_next_create.store(true, Ordering::SeqCst);
        }

        /// Instances created from now on fail their `close()` call.
        pub(crate) fn fail_close(&self) {
            self.fail_close.store(true, Ordering::SeqCst);
        }

        /// Whether any `create` call carried a parent reference.
        pub(crate) fn saw_parent(&self) -> bool {
            self.saw_parent.load(Ordering::SeqCst)
        }
    }

    impl AggregatorFactory for RecordingFactory {
        fn create(
            &self,
            parent: Option<&dyn Aggregator>,
            collects_from_single_bucket: bool,
        ) -> crate::Result<Box<dyn Aggregator>> {
            assert!(collects_from_single_bucket);
            if parent.is_some() {
                self.saw_parent.store(true, Ordering::SeqCst);
            }
            self.num_creates.fetch_add(1, Ordering::SeqCst);
            if self.fail_next_create.swap(false, Ordering::SeqCst) {
                return Err(AggregationError::InternalError(
                    "factory failure".to_string(),
                ));
            }
            let calls = Arc::new(Mutex::new(Vec::new()));
            let mut instances = self.instances.lock().unwrap();
            instances.push(Arc::clone(&calls));
            Ok(Box::new(RecordingAggregator {
                instance_id: instances.len() as u32 - 1,
                calls,
                close_order: Arc::clone(&self.close_order),
                fail_close: self.fail_close.load(Ordering::SeqCst),
            }))
        }
    }
}
