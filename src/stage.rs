//! Stages: sequence adapters that transform each pulled item.
//!
//! A stage is both a consumer of its upstream and a producer for its
//! downstream. It holds no buffer: one pull downstream is exactly one pull
//! upstream, so a per-item delay is paid in full before the next item can
//! enter the chain.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::traits::{Sequence, Termination};

/// Where a stage's per-item delay sits relative to its transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DelayPosition {
    /// Suspend after pulling upstream, then transform
    #[default]
    BeforeTransform,
    /// Transform first, then suspend before handing the item downstream
    AfterTransform,
}

/// Configuration for a single stage
#[derive(Debug, Clone, Default)]
pub struct StageConfig {
    /// Name used in logs and metrics
    pub name: Option<String>,
    /// Suspending delay paid once per produced item
    pub delay: Option<Duration>,
    /// Whether the delay runs before or after the transform
    pub delay_position: DelayPosition,
}

type BoxedTransform<I, U> = Box<dyn FnMut(I) -> Result<U> + Send>;

/// A transform step over an exclusively owned upstream sequence.
///
/// # Examples
///
/// ```rust
/// use pullstage::prelude::*;
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<()> {
/// let mut squares = RangeSource::new(1..4)
///     .map(|x| x * x)
///     .delay(Duration::from_millis(1))
///     .name("square");
///
/// assert_eq!(squares.pull().await?, Some(1));
/// assert_eq!(squares.pull().await?, Some(4));
/// assert_eq!(squares.pull().await?, Some(9));
/// assert_eq!(squares.pull().await?, None);
/// # Ok(())
/// # }
/// ```
pub struct Stage<S: Sequence, U> {
    upstream: S,
    transform: BoxedTransform<S::Item, U>,
    config: StageConfig,
    termination: Termination,
}

impl<S, U> Stage<S, U>
where
    S: Sequence,
    U: Send + 'static,
{
    /// Create a new stage with no delay
    pub fn new<F>(upstream: S, transform: F) -> Self
    where
        F: FnMut(S::Item) -> Result<U> + Send + 'static,
    {
        Self {
            upstream,
            transform: Box::new(transform),
            config: StageConfig::default(),
            termination: Termination::default(),
        }
    }

    /// Set the stage name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    /// Suspend for `delay` before transforming each item
    pub fn delay(mut self, delay: Duration) -> Self {
        self.config.delay = Some(delay);
        self.config.delay_position = DelayPosition::BeforeTransform;
        self
    }

    /// Suspend for `delay` after transforming each item
    pub fn delay_after(mut self, delay: Duration) -> Self {
        self.config.delay = Some(delay);
        self.config.delay_position = DelayPosition::AfterTransform;
        self
    }

    /// Replace the whole configuration
    pub fn with_config(mut self, config: StageConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    fn label(&self) -> &str {
        self.config.name.as_deref().unwrap_or("stage")
    }

    fn delay_at(&self, position: DelayPosition) -> Option<Duration> {
        self.config
            .delay
            .filter(|_| self.config.delay_position == position)
    }

    async fn advance(&mut self) -> Result<Option<U>>
    where
        S: Send,
    {
        let input = match self.upstream.pull().await? {
            Some(input) => input,
            None => {
                debug!(stage = self.label(), "upstream exhausted");
                return Ok(None);
            }
        };

        if let Some(delay) = self.delay_at(DelayPosition::BeforeTransform) {
            sleep(delay).await;
        }

        let output = match (self.transform)(input) {
            Ok(output) => output,
            Err(e) => {
                warn!(stage = self.label(), error = %e, "transform failed");
                #[cfg(feature = "metrics")]
                crate::metrics::record_stage_failure(self.label());
                return Err(e);
            }
        };

        if let Some(delay) = self.delay_at(DelayPosition::AfterTransform) {
            sleep(delay).await;
        }

        trace!(stage = self.label(), "item produced");
        #[cfg(feature = "metrics")]
        crate::metrics::record_stage_item(self.label());

        Ok(Some(output))
    }
}

#[async_trait]
impl<S, U> Sequence for Stage<S, U>
where
    S: Sequence + Send,
    U: Send + 'static,
{
    type Item = U;

    async fn pull(&mut self) -> Result<Option<Self::Item>> {
        if let Some(settled) = self.termination.settled() {
            return settled;
        }

        let outcome = self.advance().await;
        self.termination.observe(&outcome);
        outcome
    }
}

impl<S: Sequence, U> fmt::Debug for Stage<S, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("config", &self.config)
            .field("termination", &self.termination)
            .finish()
    }
}

/// Yields at most `n` items, then reports End without pulling upstream again.
///
/// An upstream End or failure is sticky here as well.
pub struct Take<S> {
    upstream: S,
    remaining: usize,
    termination: Termination,
}

impl<S> Take<S> {
    pub fn new(upstream: S, n: usize) -> Self {
        Self {
            upstream,
            remaining: n,
            termination: Termination::default(),
        }
    }
}

#[async_trait]
impl<S> Sequence for Take<S>
where
    S: Sequence + Send,
{
    type Item = S::Item;

    async fn pull(&mut self) -> Result<Option<Self::Item>> {
        if let Some(settled) = self.termination.settled() {
            return settled;
        }
        if self.remaining == 0 {
            self.termination = Termination::Exhausted;
            return Ok(None);
        }

        let outcome = self.upstream.pull().await;
        if let Ok(Some(_)) = outcome {
            self.remaining -= 1;
        }
        self.termination.observe(&outcome);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::sources::{IterSource, RangeSource, RepeatSource};
    use crate::traits::SequenceExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    /// Counts how many times upstream was actually pulled.
    struct PullCounter<S> {
        inner: S,
        pulls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl<S: Sequence + Send> Sequence for PullCounter<S> {
        type Item = S::Item;

        async fn pull(&mut self) -> Result<Option<Self::Item>> {
            self.pulls.fetch_add(1, Ordering::SeqCst);
            self.inner.pull().await
        }
    }

    #[tokio::test]
    async fn test_map_stage() {
        let mut stage = RangeSource::new(1..6).map(|x| x * 2);

        let mut results = Vec::new();
        while let Some(item) = stage.pull().await.unwrap() {
            results.push(item);
        }

        assert_eq!(results, vec![2, 4, 6, 8, 10]);
    }

    #[tokio::test]
    async fn test_exhausted_stage_stops_pulling_upstream() {
        let pulls = Arc::new(AtomicUsize::new(0));
        let counter = PullCounter {
            inner: RangeSource::new(0..2),
            pulls: pulls.clone(),
        };
        let mut stage = counter.map(|x| x + 1);

        assert_eq!(stage.pull().await.unwrap(), Some(1));
        assert_eq!(stage.pull().await.unwrap(), Some(2));
        assert_eq!(stage.pull().await.unwrap(), None);
        assert_eq!(stage.pull().await.unwrap(), None);
        assert_eq!(stage.pull().await.unwrap(), None);

        assert_eq!(pulls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_transform_failure_is_sticky() {
        let pulls = Arc::new(AtomicUsize::new(0));
        let counter = PullCounter {
            inner: RangeSource::new(1..10),
            pulls: pulls.clone(),
        };
        let mut stage = counter.try_map(|x| {
            if x == 2 {
                Err(Error::custom("bad item"))
            } else {
                Ok(x)
            }
        });

        assert_eq!(stage.pull().await.unwrap(), Some(1));
        assert_eq!(stage.pull().await.unwrap_err().to_string(), "bad item");
        assert_eq!(stage.pull().await.unwrap_err().to_string(), "bad item");

        assert_eq!(pulls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_upstream_failure_propagates() {
        let failing = IterSource::new(vec![1, 2]).try_map(|x| {
            if x == 2 {
                Err(Error::custom("upstream"))
            } else {
                Ok(x)
            }
        });
        let mut downstream = failing.map(|x| x * 10).map(|x| x + 1);

        assert_eq!(downstream.pull().await.unwrap(), Some(11));
        assert!(downstream.pull().await.is_err());
        assert!(downstream.pull().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_is_paid_per_item() {
        let mut stage = RangeSource::new(0..3)
            .map(|x| x)
            .delay(Duration::from_secs(1));

        let start = Instant::now();
        while stage.pull().await.unwrap().is_some() {}

        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_delay_on_exhaustion() {
        let mut stage = RangeSource::new(0..0)
            .map(|x| x)
            .delay(Duration::from_secs(1));

        let start = Instant::now();
        assert_eq!(stage.pull().await.unwrap(), None);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_position() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let start = Instant::now();

        let before = seen.clone();
        let mut delayed_before = RangeSource::new(0..1)
            .map(move |x| {
                before.lock().unwrap().push(start.elapsed());
                x
            })
            .delay(Duration::from_secs(2));
        delayed_before.pull().await.unwrap();

        let after = seen.clone();
        let mut delayed_after = RangeSource::new(0..1)
            .map(move |x| {
                after.lock().unwrap().push(start.elapsed());
                x
            })
            .delay_after(Duration::from_secs(2));
        delayed_after.pull().await.unwrap();

        let seen = seen.lock().unwrap();
        // Transform ran after the delay in the first stage, before it in the second
        assert_eq!(*seen, vec![Duration::from_secs(2), Duration::from_secs(2)]);
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_take_stops_pulling() {
        let pulls = Arc::new(AtomicUsize::new(0));
        let counter = PullCounter {
            inner: RepeatSource::new(7),
            pulls: pulls.clone(),
        };
        let mut taken = counter.take(3);

        let mut results = Vec::new();
        while let Some(item) = taken.pull().await.unwrap() {
            results.push(item);
        }
        assert_eq!(taken.pull().await.unwrap(), None);

        assert_eq!(results, vec![7, 7, 7]);
        assert_eq!(pulls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_take_keeps_upstream_failure() {
        let pulls = Arc::new(AtomicUsize::new(0));
        let counter = PullCounter {
            inner: RangeSource::new(0..10).try_map(|x| {
                if x == 0 {
                    Err(Error::custom("first item"))
                } else {
                    Ok(x)
                }
            }),
            pulls: pulls.clone(),
        };
        let mut taken = counter.take(5);

        assert_eq!(taken.pull().await.unwrap_err().to_string(), "first item");
        assert_eq!(taken.pull().await.unwrap_err().to_string(), "first item");
        assert_eq!(taken.pull().await.unwrap_err().to_string(), "first item");
        assert_eq!(pulls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_take_keeps_upstream_end() {
        let pulls = Arc::new(AtomicUsize::new(0));
        let counter = PullCounter {
            inner: RangeSource::new(0..1),
            pulls: pulls.clone(),
        };
        let mut taken = counter.take(5);

        assert_eq!(taken.pull().await.unwrap(), Some(0));
        assert_eq!(taken.pull().await.unwrap(), None);
        assert_eq!(taken.pull().await.unwrap(), None);
        assert_eq!(pulls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stage_config() {
        let stage = RangeSource::new(0..1)
            .map(|x| x)
            .name("identity")
            .delay_after(Duration::from_millis(5));

        let config = stage.config();
        assert_eq!(config.name.as_deref(), Some("identity"));
        assert_eq!(config.delay, Some(Duration::from_millis(5)));
        assert_eq!(config.delay_position, DelayPosition::AfterTransform);
    }
}
