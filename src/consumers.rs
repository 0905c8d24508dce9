//! Concrete consumer implementations.

use async_trait::async_trait;
use std::fmt::Display;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;

use crate::error::Result;
use crate::traits::Consumer;

/// A consumer that prints each item next to its type name
pub struct PrintConsumer<T> {
    prefix: Option<String>,
    _phantom: PhantomData<T>,
}

impl<T> PrintConsumer<T> {
    /// Create a new print consumer
    pub fn new() -> Self {
        Self {
            prefix: None,
            _phantom: PhantomData,
        }
    }

    /// Create a new print consumer with a prefix
    pub fn with_prefix(prefix: String) -> Self {
        Self {
            prefix: Some(prefix),
            _phantom: PhantomData,
        }
    }
}

/// Render an item the way [`PrintConsumer`] prints it.
pub fn describe<T: Display>(item: &T) -> String {
    format!("{} {}", item, std::any::type_name::<T>())
}

#[async_trait]
impl<T: Send + 'static + Display> Consumer for PrintConsumer<T> {
    type Item = T;

    async fn consume(&mut self, item: Self::Item) -> Result<()> {
        match &self.prefix {
            Some(prefix) => println!("{}: {}", prefix, describe(&item)),
            None => println!("{}", describe(&item)),
        }
        Ok(())
    }
}

impl<T> Default for PrintConsumer<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A consumer that collects items into a shared vector.
///
/// Clones share the same buffer, so a handle kept before the consumer is
/// moved into a pipeline can read the items afterwards.
pub struct CollectConsumer<T> {
    items: Arc<TokioMutex<Vec<T>>>,
}

impl<T: Send + 'static> CollectConsumer<T> {
    pub fn new() -> Self {
        Self {
            items: Arc::new(TokioMutex::new(Vec::new())),
        }
    }

    /// Take the collected items, leaving the shared buffer empty
    pub async fn into_items(self) -> Vec<T> {
        std::mem::take(&mut *self.items.lock().await)
    }

    /// Shared handle to the buffer
    pub fn items(&self) -> Arc<TokioMutex<Vec<T>>> {
        self.items.clone()
    }
}

#[async_trait]
impl<T: Send + 'static> Consumer for CollectConsumer<T> {
    type Item = T;

    async fn consume(&mut self, item: Self::Item) -> Result<()> {
        self.items.lock().await.push(item);
        Ok(())
    }
}

impl<T: Send + 'static> Default for CollectConsumer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CollectConsumer<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }
}

/// Counts consumed items and records whether the run reached End.
///
/// A failed run never finishes its consumer, so [`CountConsumer::is_finished`]
/// tells a complete run from an aborted one.
pub struct CountConsumer<T> {
    count: Arc<AtomicUsize>,
    finished: Arc<AtomicBool>,
    _phantom: PhantomData<fn(T)>,
}

impl<T> CountConsumer<T> {
    pub fn new() -> Self {
        Self {
            count: Arc::new(AtomicUsize::new(0)),
            finished: Arc::new(AtomicBool::new(false)),
            _phantom: PhantomData,
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T: Send + 'static> Consumer for CountConsumer<T> {
    type Item = T;

    async fn consume(&mut self, _item: Self::Item) -> Result<()> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        self.finished.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl<T> Default for CountConsumer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CountConsumer<T> {
    fn clone(&self) -> Self {
        Self {
            count: self.count.clone(),
            finished: self.finished.clone(),
            _phantom: PhantomData,
        }
    }
}
