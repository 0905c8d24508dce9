//! Pipeline orchestration and execution.
//!
//! A [`Pipeline`] is a linear chain of stages over one source. It has no
//! state beyond the chain itself: it is built once, driven to exhaustion
//! once, and then dropped. Driving it is strictly demand-driven, so with `k`
//! stages each delaying `d` per item, `n` items take `n * k * d` end to end.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::consumers::CollectConsumer;
use crate::error::Result;
use crate::stage::{Stage, StageConfig};
use crate::traits::{Consumer, Sequence, Termination};

type BoxedSequence<T> = Box<dyn Sequence<Item = T> + Send>;

/// Outcome of driving a pipeline to exhaustion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Number of items handed to the consumer
    pub items: usize,
    /// Wall-clock time from the first pull to the final End
    pub elapsed: Duration,
}

/// A linear composition of stages driven by a single consumer.
///
/// # Examples
///
/// ```rust
/// use pullstage::prelude::*;
///
/// # #[tokio::main]
/// # async fn main() -> Result<()> {
/// let output = Pipeline::new(RangeSource::new(1..4))
///     .then(|x| x * x)
///     .then(|x| x.to_string())
///     .collect()
///     .await?;
///
/// assert_eq!(output, vec!["1", "4", "9"]);
/// # Ok(())
/// # }
/// ```
pub struct Pipeline<T> {
    chain: BoxedSequence<T>,
    stages: Vec<String>,
    termination: Termination,
}

impl<T: Send + 'static> Pipeline<T> {
    /// Create a pipeline over a source, with no stages yet
    pub fn new<S>(source: S) -> Self
    where
        S: Sequence<Item = T> + Send + 'static,
    {
        Self {
            chain: Box::new(source),
            stages: Vec::new(),
            termination: Termination::default(),
        }
    }

    /// Append a configured stage
    pub fn push_stage<U, F>(self, config: StageConfig, transform: F) -> Pipeline<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> Result<U> + Send + 'static,
    {
        let Pipeline {
            chain, mut stages, ..
        } = self;

        let name = config
            .name
            .clone()
            .unwrap_or_else(|| format!("stage-{}", stages.len() + 1));
        stages.push(name.clone());

        let stage = Stage::new(chain, transform).with_config(StageConfig {
            name: Some(name),
            ..config
        });

        Pipeline {
            chain: Box::new(stage),
            stages,
            termination: Termination::default(),
        }
    }

    /// Append an infallible stage with no delay
    pub fn then<U, F>(self, mut f: F) -> Pipeline<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> U + Send + 'static,
    {
        self.push_stage(StageConfig::default(), move |item| Ok(f(item)))
    }

    /// Append an infallible stage that suspends for `delay` per item
    pub fn then_delayed<U, F>(self, delay: Duration, mut f: F) -> Pipeline<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> U + Send + 'static,
    {
        let config = StageConfig {
            delay: Some(delay),
            ..StageConfig::default()
        };
        self.push_stage(config, move |item| Ok(f(item)))
    }

    /// Append a fallible stage with no delay
    pub fn try_then<U, F>(self, f: F) -> Pipeline<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> Result<U> + Send + 'static,
    {
        self.push_stage(StageConfig::default(), f)
    }

    /// Append a fallible stage that suspends for `delay` per item
    pub fn try_then_delayed<U, F>(self, delay: Duration, f: F) -> Pipeline<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> Result<U> + Send + 'static,
    {
        let config = StageConfig {
            delay: Some(delay),
            ..StageConfig::default()
        };
        self.push_stage(config, f)
    }

    /// Names of the stages, source side first
    pub fn stage_names(&self) -> &[String] {
        &self.stages
    }

    /// Number of stages in the chain
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the pipeline is just a bare source
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Drive the pipeline to exhaustion, handing every item to `consumer`.
    ///
    /// The first failure anywhere in the chain aborts the run and is
    /// returned; the consumer is not finished in that case.
    pub async fn run<C>(mut self, mut consumer: C) -> Result<RunSummary>
    where
        C: Consumer<Item = T> + Send,
    {
        let start = Instant::now();
        let mut items = 0usize;
        debug!(stages = ?self.stages, "pipeline started");

        loop {
            match self.pull().await {
                Ok(Some(item)) => {
                    consumer.consume(item).await?;
                    items += 1;
                }
                Ok(None) => {
                    consumer.finish().await?;
                    break;
                }
                Err(e) => {
                    warn!(error = %e, items, "pipeline failed");
                    return Err(e);
                }
            }
        }

        let summary = RunSummary {
            items,
            elapsed: start.elapsed(),
        };
        let elapsed_ms = u64::try_from(summary.elapsed.as_millis()).unwrap_or(u64::MAX);
        debug!(items, elapsed_ms, "pipeline finished");
        Ok(summary)
    }

    /// Alias for [`Pipeline::run`]
    pub async fn sink<C>(self, consumer: C) -> Result<RunSummary>
    where
        C: Consumer<Item = T> + Send,
    {
        self.run(consumer).await
    }

    /// Drive the pipeline to exhaustion and collect every item
    pub async fn collect(self) -> Result<Vec<T>> {
        let collector = CollectConsumer::new();
        self.run(collector.clone()).await?;
        Ok(collector.into_items().await)
    }
}

#[async_trait]
impl<T: Send + 'static> Sequence for Pipeline<T> {
    type Item = T;

    async fn pull(&mut self) -> Result<Option<Self::Item>> {
        if let Some(settled) = self.termination.settled() {
            return settled;
        }

        let outcome = self.chain.pull().await;
        self.termination.observe(&outcome);
        outcome
    }
}

impl<T> std::fmt::Debug for Pipeline<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stages)
            .field("termination", &self.termination)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::sources::RangeSource;

    #[test]
    fn test_stage_names() {
        let pipeline = Pipeline::new(RangeSource::new(0..1))
            .then(|x| x)
            .push_stage(
                StageConfig {
                    name: Some("square".to_string()),
                    ..StageConfig::default()
                },
                |x: i64| Ok(x * x),
            )
            .then(|x| x.to_string());

        assert_eq!(pipeline.len(), 3);
        assert_eq!(pipeline.stage_names(), ["stage-1", "square", "stage-3"]);
    }

    #[tokio::test]
    async fn test_bare_source_pipeline() {
        let pipeline = Pipeline::new(RangeSource::new(0..3));
        assert!(pipeline.is_empty());
        assert_eq!(pipeline.collect().await.unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_pipeline_pull_is_sticky_after_failure() {
        let mut pipeline = Pipeline::new(RangeSource::new(0..5))
            .try_then(|x| if x == 1 { Err(Error::custom("one")) } else { Ok(x) });

        assert_eq!(pipeline.pull().await.unwrap(), Some(0));
        assert!(pipeline.pull().await.is_err());
        assert_eq!(pipeline.pull().await.unwrap_err().to_string(), "one");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_summary() {
        let summary = Pipeline::new(RangeSource::new(0..4))
            .then_delayed(Duration::from_millis(250), |x| x + 1)
            .run(CollectConsumer::<i64>::new())
            .await
            .unwrap();

        assert_eq!(summary.items, 4);
        assert_eq!(summary.elapsed, Duration::from_secs(1));
    }
}
