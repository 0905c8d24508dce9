//! Utility functions and helper types.

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use std::future::Future;
use std::marker::PhantomData;
use tokio_stream::{Stream, StreamExt};

use crate::error::Result;
use crate::traits::{Consumer, Sequence, Termination};

/// Helper function to create a source from an async function
///
/// The function is called once per pull; returning `Ok(None)` ends the
/// sequence. After the first `Ok(None)` or error the function is not called
/// again and that outcome is repeated.
pub fn from_fn<F, Fut, T>(f: F) -> FnSource<F, Fut, T>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<Option<T>>> + Send,
    T: Send + 'static,
{
    FnSource {
        f,
        termination: Termination::default(),
        _phantom: PhantomData,
    }
}

/// A source created from a function
pub struct FnSource<F, Fut, T>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<Option<T>>> + Send,
    T: Send + 'static,
{
    f: F,
    termination: Termination,
    _phantom: PhantomData<fn() -> (Fut, T)>,
}

#[async_trait]
impl<F, Fut, T> Sequence for FnSource<F, Fut, T>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<Option<T>>> + Send,
    T: Send + 'static,
{
    type Item = T;

    async fn pull(&mut self) -> Result<Option<Self::Item>> {
        if let Some(settled) = self.termination.settled() {
            return settled;
        }

        let outcome = (self.f)().await;
        self.termination.observe(&outcome);
        outcome
    }
}

/// Helper function to create a source from a stream of items
///
/// The stream is not polled again once it has ended, so streams that panic
/// when polled after completion are safe to wrap.
pub fn from_stream<S>(stream: S) -> StreamSource<S>
where
    S: Stream + Send + Unpin,
    S::Item: Send + 'static,
{
    StreamSource {
        stream,
        exhausted: false,
    }
}

/// A source backed by a stream
pub struct StreamSource<S> {
    stream: S,
    exhausted: bool,
}

#[async_trait]
impl<S> Sequence for StreamSource<S>
where
    S: Stream + Send + Unpin,
    S::Item: Send + 'static,
{
    type Item = S::Item;

    async fn pull(&mut self) -> Result<Option<Self::Item>> {
        if self.exhausted {
            return Ok(None);
        }

        let item = self.stream.next().await;
        self.exhausted = item.is_none();
        Ok(item)
    }
}

/// Expose a sequence as a stream.
///
/// The stream ends after the sequence reports End, or right after yielding
/// the first error.
pub fn into_stream<S>(sequence: S) -> BoxStream<'static, Result<S::Item>>
where
    S: Sequence + Send + 'static,
{
    Box::pin(stream::unfold(Some(sequence), |state| async move {
        let mut sequence = state?;
        match sequence.pull().await {
            Ok(Some(item)) => Some((Ok(item), Some(sequence))),
            Ok(None) => None,
            Err(e) => Some((Err(e), None)),
        }
    }))
}

/// Helper function to create a consumer from an async function
pub fn consumer_from_fn<F, Fut, T>(f: F) -> FnConsumer<F, Fut, T>
where
    F: FnMut(T) -> Fut + Send,
    Fut: Future<Output = Result<()>> + Send,
    T: Send + 'static,
{
    FnConsumer {
        f,
        _phantom: PhantomData,
    }
}

/// A consumer created from a function
pub struct FnConsumer<F, Fut, T>
where
    F: FnMut(T) -> Fut + Send,
    Fut: Future<Output = Result<()>> + Send,
    T: Send + 'static,
{
    f: F,
    _phantom: PhantomData<fn(T) -> Fut>,
}

#[async_trait]
impl<F, Fut, T> Consumer for FnConsumer<F, Fut, T>
where
    F: FnMut(T) -> Fut + Send,
    Fut: Future<Output = Result<()>> + Send,
    T: Send + 'static,
{
    type Item = T;

    async fn consume(&mut self, item: Self::Item) -> Result<()> {
        (self.f)(item).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::sources::RangeSource;
    use crate::traits::SequenceExt;

    #[tokio::test]
    async fn test_from_fn() {
        let mut counter = 0;
        let mut source = from_fn(move || {
            counter += 1;
            let current = counter;
            async move { Ok::<_, Error>(if current <= 3 { Some(current) } else { None }) }
        });

        let mut results = Vec::new();
        while let Some(item) = source.pull().await.unwrap() {
            results.push(item);
        }
        assert_eq!(results, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_from_stream() {
        let mut source = from_stream(tokio_stream::iter(vec!["a", "b"]));

        assert_eq!(source.pull().await.unwrap(), Some("a"));
        assert_eq!(source.pull().await.unwrap(), Some("b"));
        assert_eq!(source.pull().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_from_fn_end_is_sticky() {
        let mut calls = 0;
        let mut source = from_fn(move || {
            calls += 1;
            let current = calls;
            // Ends once, then would start producing again
            async move { Ok::<_, Error>(if current == 2 { None } else { Some(current) }) }
        });

        assert_eq!(source.pull().await.unwrap(), Some(1));
        assert_eq!(source.pull().await.unwrap(), None);
        assert_eq!(source.pull().await.unwrap(), None);
        assert_eq!(source.pull().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_from_fn_failure_is_sticky() {
        let mut calls = 0;
        let mut source = from_fn(move || {
            calls += 1;
            let current = calls;
            async move {
                if current == 1 {
                    Err(Error::custom("boom"))
                } else {
                    Ok(Some(current))
                }
            }
        });

        assert_eq!(source.pull().await.unwrap_err().to_string(), "boom");
        assert_eq!(source.pull().await.unwrap_err().to_string(), "boom");
        assert_eq!(source.pull().await.unwrap_err().to_string(), "boom");
    }

    #[tokio::test]
    async fn test_from_stream_is_not_polled_after_end() {
        // An unfold stream panics if polled after it returned None
        let mut source = from_stream(into_stream(RangeSource::new(0..1)));

        assert_eq!(source.pull().await.unwrap().unwrap().unwrap(), 0);
        assert!(source.pull().await.unwrap().is_none());
        assert!(source.pull().await.unwrap().is_none());
        assert!(source.pull().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_into_stream_stops_after_error() {
        let failing = RangeSource::new(0..10).try_map(|x| {
            if x == 2 {
                Err(Error::custom("stop"))
            } else {
                Ok(x)
            }
        });

        let items: Vec<Result<i64>> = into_stream(failing).collect().await;
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap(), &0);
        assert_eq!(items[1].as_ref().unwrap(), &1);
        assert!(items[2].is_err());
    }

    #[tokio::test]
    async fn test_consumer_from_fn() {
        let seen = std::sync::Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let mut consumer = consumer_from_fn(move |item: i64| {
            let seen = sink_seen.clone();
            async move {
                seen.lock().await.push(item);
                Ok(())
            }
        });

        consumer.consume(5).await.unwrap();
        consumer.consume(6).await.unwrap();
        assert_eq!(*seen.lock().await, vec![5, 6]);
    }
}
