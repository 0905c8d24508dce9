//! # Pull-based stage pipelines and barrier joins
//!
//! This crate provides two small concurrency building blocks:
//!
//! - **Sequence**: a lazy, single-pass producer advanced on demand
//! - **Stage**: transforms each pulled item, optionally after a suspending delay
//! - **Pipeline**: a linear chain of stages driven to exhaustion by one consumer
//! - **Task**: an independently scheduled unit of work with an explicit lifecycle
//! - **TaskSet**: fans tasks out and joins them behind a single barrier
//!
//! Pipelines are strictly demand-driven: pulling the last stage cascades down
//! to the source, and an item's delays are all paid before the next item
//! starts. Tasks are the opposite: all of them are started eagerly and run
//! concurrently until the join.
//!
//! ## Example
//!
//! ```rust
//! use pullstage::prelude::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let squares = Pipeline::new(RangeSource::new(1..6))
//!         .then_delayed(Duration::from_millis(1), |x| x * x)
//!         .collect()
//!         .await?;
//!     assert_eq!(squares, vec![1, 4, 9, 16, 25]);
//!
//!     let mut set = TaskSet::new();
//!     for n in 0..5u32 {
//!         set.launch(async move { Ok(n) });
//!     }
//!     let joined = set.join_all(None).await;
//!     assert_eq!(joined.done.len(), 5);
//!     Ok(())
//! }
//! ```

pub mod consumers;
pub mod error;
pub mod join;
pub mod pipeline;
pub mod sources;
pub mod stage;
pub mod task;
pub mod traits;
pub mod util;

// Re-export commonly used items
pub mod prelude {
    pub use crate::consumers::{CollectConsumer, CountConsumer, PrintConsumer};
    pub use crate::error::{Error, Result};
    pub use crate::join::{join_all, JoinResult, TaskSet};
    pub use crate::pipeline::{Pipeline, RunSummary};
    pub use crate::sources::{IterSource, RangeSource, RepeatSource};
    pub use crate::stage::{DelayPosition, Stage, StageConfig};
    pub use crate::task::{launch, Task, TaskId, TaskState};
    pub use crate::traits::{Consumer, Sequence, SequenceExt};
}

// Re-export main error type
pub use error::{Error, Result};

// Feature flags for optional dependencies
#[cfg(feature = "metrics")]
pub mod metrics;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
