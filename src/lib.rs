//! A synchronous, in-process stream processing engine.
//!
//! A [`Pipeline`] is a chain of stages. Raw values pushed into its entry
//! point are wrapped in an [`Element`] and relayed stage to stage, depth
//! first, before `process` returns. Pipelines can be joined on a key: the
//! [`join`] combinator wires two pipelines into one shared [`JoinStage`]
//! whose per-side caches are bounded with least-recently-used eviction.
//!
//! # Features
//!
//! - Typed, builder-style chains: `map`, `try_map`, `filter`, `reduce`
//! - Two-sided key joins with bounded correlation caches
//! - Run-to-completion-or-fault semantics: stage errors surface unchanged
//!   at the caller of `process`
//! - Per-stage metrics: received, emitted, suppressed, latency percentiles
//! - Sources that feed pipelines from iterators or channels
//!
//! # Example
//!
//! ```
//! use stream_relay::{join, Joined, Pipeline};
//! use std::sync::{Arc, Mutex};
//!
//! let joined = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&joined);
//!
//! let Joined { target, left: orders, right: payments } = join(
//!     Pipeline::<(u32, &str)>::new(),
//!     Pipeline::<(u32, &str)>::new(),
//!     128,
//! )?;
//! let _target = target.map(move |row| sink.lock().unwrap().push(row));
//!
//! orders.process((1, "book"))?;
//! payments.process((1, "paid"))?;
//! assert_eq!(*joined.lock().unwrap(), vec![(1, ("book", "paid"))]);
//! # Ok::<(), stream_relay::PipelineError>(())
//! ```

pub mod cache;
pub mod element;
pub mod error;
pub mod join;
pub mod metrics;
pub mod pipeline;
pub mod source;
pub mod stage;

// Re-exports for convenience
pub use cache::CorrelationCache;
pub use element::{Element, PipelineId};
pub use error::{PipelineError, Result};
pub use join::{join, join_with, JoinConfig, JoinStage, Joined, DEFAULT_JOIN_CAPACITY};
pub use metrics::{MetricsSnapshot, StageMetrics};
pub use pipeline::{Inlet, Pipeline};
pub use source::{ChannelSource, IterableSource, Source};
pub use stage::{FilterStage, MapStage, ReduceStage, Stage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
