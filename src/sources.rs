//! Source implementations: the first link of every chain.
//!
//! Sources never suspend on their own; any per-item latency belongs to the
//! stages built on top of them.

use async_trait::async_trait;
use std::iter::Fuse;
use std::ops::Range;

use crate::error::Result;
use crate::traits::Sequence;

/// A source that yields numbers from a range
pub struct RangeSource {
    range: Range<i64>,
}

impl RangeSource {
    /// Create a new range source
    pub fn new(range: Range<i64>) -> Self {
        Self { range }
    }
}

#[async_trait]
impl Sequence for RangeSource {
    type Item = i64;

    async fn pull(&mut self) -> Result<Option<Self::Item>> {
        Ok(self.range.next())
    }
}

/// A source that yields the items of any iterator, finite or not.
///
/// The iterator is fused, so once it reports exhaustion it is never polled
/// again.
pub struct IterSource<I: Iterator> {
    iter: Fuse<I>,
}

impl<I: Iterator> IterSource<I> {
    /// Create a new iterator source
    pub fn new<T>(items: T) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        Self {
            iter: items.into_iter().fuse(),
        }
    }
}

#[async_trait]
impl<I> Sequence for IterSource<I>
where
    I: Iterator + Send,
    I::Item: Send + 'static,
{
    type Item = I::Item;

    async fn pull(&mut self) -> Result<Option<Self::Item>> {
        Ok(self.iter.next())
    }
}

/// A source that repeats a single value
pub struct RepeatSource<T> {
    value: T,
    remaining: Option<usize>,
}

impl<T: Clone> RepeatSource<T> {
    /// Create a source that repeats a value indefinitely
    pub fn new(value: T) -> Self {
        Self {
            value,
            remaining: None,
        }
    }

    /// Create a source that repeats a value n times
    pub fn times(value: T, count: usize) -> Self {
        Self {
            value,
            remaining: Some(count),
        }
    }
}

#[async_trait]
impl<T: Clone + Send + 'static> Sequence for RepeatSource<T> {
    type Item = T;

    async fn pull(&mut self) -> Result<Option<Self::Item>> {
        if let Some(ref mut rem) = self.remaining {
            if *rem == 0 {
                return Ok(None);
            }
            *rem -= 1;
        }
        Ok(Some(self.value.clone()))
    }
}
