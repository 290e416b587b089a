//! # Multi-bucket adapter
//!
//! A multi-bucket collection loop hands every matching document to an
//! aggregator together with the bucket ordinal the document fell into. Many
//! aggregator implementations only know how to accumulate a *single* bucket
//! per segment. This crate makes such a single-bucket aggregator usable in a
//! multi-bucket context by transparently keeping one aggregator instance per
//! bucket ordinal, created lazily on the first document that touches the
//! ordinal.
//!
//! The two building blocks are:
//! - [`BucketAggregatorRegistry`](registry::BucketAggregatorRegistry) owns the
//!   ordinal to aggregator mapping, shared by all segments of one collection.
//! - [`MultiBucketAggregator`](multi_bucket::MultiBucketAggregator) exposes
//!   the multi-bucket surface upward. Its per-segment
//!   [`MultiBucketLeafCollector`](multi_bucket::MultiBucketLeafCollector)
//!   routes `collect(doc, bucket)` to the right per-bucket leaf collector and
//!   defers scorer propagation to the first use per bucket per scorer epoch.
//!
//! The wrapped aggregator never observes a bucket index other than `0`.
//!
//! ```
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use std::sync::Arc;
//!
//! use multibucket::aggregator::{Aggregator, AggregatorFactory, LeafContext};
//! use multibucket::multi_bucket::MultiBucketAggregator;
//!
//! # use multibucket::aggregator::{Fruit, LeafBucketCollector};
//! # use multibucket::{BucketId, DocId};
//! # struct CountAggregator {
//! #     count: Arc<AtomicU64>,
//! # }
//! # struct CountLeafCollector {
//! #     count: Arc<AtomicU64>,
//! # }
//! # impl LeafBucketCollector for CountLeafCollector {
//! #     fn collect(&mut self, _doc: DocId, _bucket: BucketId) -> multibucket::Result<()> {
//! #         self.count.fetch_add(1, Ordering::Relaxed);
//! #         Ok(())
//! #     }
//! # }
//! # impl Aggregator for CountAggregator {
//! #     fn leaf_collector(
//! #         &self,
//! #         _leaf: &LeafContext,
//! #     ) -> multibucket::Result<Box<dyn LeafBucketCollector>> {
//! #         Ok(Box::new(CountLeafCollector {
//! #             count: Arc::clone(&self.count),
//! #         }))
//! #     }
//! #     fn harvest(&self, _bucket: BucketId) -> multibucket::Result<Box<dyn Fruit>> {
//! #         Ok(Box::new(self.count.load(Ordering::Relaxed)))
//! #     }
//! #     fn close(&self) -> multibucket::Result<()> {
//! #         Ok(())
//! #     }
//! # }
//! # struct CountAggregatorFactory;
//! # impl AggregatorFactory for CountAggregatorFactory {
//! #     fn create(
//! #         &self,
//! #         _parent: Option<&dyn Aggregator>,
//! #         _collects_from_single_bucket: bool,
//! #     ) -> multibucket::Result<Box<dyn Aggregator>> {
//! #         Ok(Box::new(CountAggregator {
//! #             count: Arc::new(AtomicU64::new(0)),
//! #         }))
//! #     }
//! # }
//! # fn main() -> multibucket::Result<()> {
//! // CountAggregatorFactory builds single-bucket doc counters.
//! let factory: Arc<dyn AggregatorFactory> = Arc::new(CountAggregatorFactory);
//! let aggregator = MultiBucketAggregator::from_factory(factory, None);
//!
//! let leaf = LeafContext::new(0, 3);
//! let mut collector = aggregator.leaf_collector(&leaf)?;
//! collector.collect(0, /* bucket */ 0)?;
//! collector.collect(1, /* bucket */ 2)?;
//! collector.collect(2, /* bucket */ 0)?;
//! collector.flush()?;
//!
//! // Two of the three docs fell into bucket 0.
//! let count = aggregator.harvest(0)?;
//! assert_eq!(count.downcast_ref::<u64>(), Some(&2));
//! aggregator.close()?;
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
mod error;
pub mod multi_bucket;
pub mod registry;

pub use error::AggregationError;

/// A `u32` identifying a document within a segment.
///
/// Documents have their `DocId` assigned incrementally, as they are added to
/// the segment.
pub type DocId = u32;

/// A f32 that represents the relevance of the document to the query.
pub type Score = f32;

/// Index of a segment within one collection pass.
pub type SegmentOrdinal = u32;

/// Index of a bucket within a segment's collection pass.
///
/// Bucket ids are assigned by the parent multi-bucket aggregation. They are
/// not globally unique; they are scoped to one collection.
pub type BucketId = u32;

/// Crate local result alias.
pub type Result<T> = std::result::Result<T, AggregationError>;
