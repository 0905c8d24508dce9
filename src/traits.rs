//! Core traits for pull-based sequences.
//!
//! A [`Sequence`] does no work until it is pulled. Adapters such as
//! [`Stage`](crate::stage::Stage) own their upstream exclusively, so pulling
//! the last adapter of a chain cascades synchronously down to the source and
//! back, one item at a time.

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::stage::{Stage, Take};

/// A lazy, single-pass producer of values advanced on demand.
///
/// Each pull resolves to one of three outcomes:
///
/// * `Ok(Some(item))`: the next value
/// * `Ok(None)`: the sequence is exhausted
/// * `Err(error)`: the sequence failed
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use pullstage::error::Result;
/// use pullstage::traits::Sequence;
///
/// struct Countdown {
///     remaining: u32,
/// }
///
/// #[async_trait]
/// impl Sequence for Countdown {
///     type Item = u32;
///
///     async fn pull(&mut self) -> Result<Option<Self::Item>> {
///         if self.remaining == 0 {
///             return Ok(None);
///         }
///         self.remaining -= 1;
///         Ok(Some(self.remaining))
///     }
/// }
/// ```
#[async_trait]
pub trait Sequence {
    /// The type of items this sequence yields
    type Item: Send + 'static;

    /// Pull the next item, `None` once exhausted.
    async fn pull(&mut self) -> Result<Option<Self::Item>>;
}

#[async_trait]
impl<S> Sequence for Box<S>
where
    S: Sequence + Send + ?Sized,
{
    type Item = S::Item;

    async fn pull(&mut self) -> Result<Option<Self::Item>> {
        (**self).pull().await
    }
}

/// A consumer drives a sequence from the top of a pipeline.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use pullstage::error::Result;
/// use pullstage::traits::Consumer;
///
/// struct LogConsumer;
///
/// #[async_trait]
/// impl Consumer for LogConsumer {
///     type Item = String;
///
///     async fn consume(&mut self, item: Self::Item) -> Result<()> {
///         println!("Consumed: {}", item);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Consumer {
    /// The type of items this consumer accepts
    type Item: Send + 'static;

    /// Process a single item.
    async fn consume(&mut self, item: Self::Item) -> Result<()>;

    /// Called once the pipeline is exhausted.
    async fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Terminal bookkeeping shared by adapters.
///
/// End and Fail are both sticky: after either is observed, later pulls are
/// answered from here and never reach upstream.
#[derive(Debug, Clone, Default)]
pub enum Termination {
    #[default]
    Active,
    Exhausted,
    Failed(Error),
}

impl Termination {
    /// The answer for a pull after termination, or `None` while still active.
    pub fn settled<T>(&self) -> Option<Result<Option<T>>> {
        match self {
            Termination::Active => None,
            Termination::Exhausted => Some(Ok(None)),
            Termination::Failed(e) => Some(Err(e.clone())),
        }
    }

    /// Record the outcome of a pull.
    pub fn observe<T>(&mut self, outcome: &Result<Option<T>>) {
        match outcome {
            Ok(Some(_)) => {}
            Ok(None) => *self = Termination::Exhausted,
            Err(e) => *self = Termination::Failed(e.clone()),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Termination::Active)
    }
}

/// Extension trait for composing sequences into stages.
pub trait SequenceExt: Sequence + Sized {
    /// Wrap this sequence in a stage with a fallible transform.
    ///
    /// The returned [`Stage`] can be configured further, e.g. with a delay.
    fn stage<F, U>(self, f: F) -> Stage<Self, U>
    where
        F: FnMut(Self::Item) -> Result<U> + Send + 'static,
        U: Send + 'static,
    {
        Stage::new(self, f)
    }

    /// Map items through an infallible function
    fn map<F, U>(self, mut f: F) -> Stage<Self, U>
    where
        F: FnMut(Self::Item) -> U + Send + 'static,
        U: Send + 'static,
    {
        Stage::new(self, move |item| Ok(f(item)))
    }

    /// Map items through a fallible function; the first error fails the chain
    fn try_map<F, U>(self, f: F) -> Stage<Self, U>
    where
        F: FnMut(Self::Item) -> Result<U> + Send + 'static,
        U: Send + 'static,
    {
        Stage::new(self, f)
    }

    /// Take only the first n items
    fn take(self, n: usize) -> Take<Self> {
        Take::new(self, n)
    }
}

impl<S: Sequence> SequenceExt for S {}
