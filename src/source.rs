//! Ingestion adapters that push raw values into a pipeline.
//!
//! A source is attached to a pipeline's [`Inlet`] and, once started, hands
//! every value it produces to that inlet one at a time. A source with no
//! attached pipeline drops what it receives and logs a warning.

use crate::error::{PipelineError, Result};
use crate::pipeline::Inlet;
use crossbeam::channel::{self, Receiver, Sender};
use tracing::{info, warn};

/// Trait for an external feed of raw values
pub trait Source<T> {
    /// Attach the pipeline entry that receives this source's values
    fn attach(&mut self, inlet: Inlet<T>);

    /// Deliver values until the feed is exhausted.
    ///
    /// The first error returned by the pipeline aborts the feed and is
    /// returned from here.
    fn start(&mut self) -> Result<()>;

    /// Values handed to an attached pipeline
    fn delivered(&self) -> u64;

    /// Values dropped for lack of an attached pipeline
    fn discarded(&self) -> u64;
}

/// Delivery bookkeeping shared by the concrete sources
struct Delivery<T> {
    source: String,
    inlet: Option<Inlet<T>>,
    delivered: u64,
    discarded: u64,
}

impl<T> Delivery<T> {
    fn new(source: String) -> Self {
        Self {
            source,
            inlet: None,
            delivered: 0,
            discarded: 0,
        }
    }

    fn deliver(&mut self, value: T) -> Result<()> {
        match &self.inlet {
            Some(inlet) => {
                self.delivered += 1;
                inlet.process(value)
            }
            None => {
                self.discarded += 1;
                warn!(
                    source = %self.source,
                    "received element with no attached pipeline, discarding"
                );
                Ok(())
            }
        }
    }

    fn finish(&self) {
        info!(
            source = %self.source,
            delivered = self.delivered,
            discarded = self.discarded,
            "source exhausted"
        );
    }
}

/// One-shot source draining an in-memory iterator
pub struct IterableSource<It: Iterator> {
    items: Option<It>,
    delivery: Delivery<It::Item>,
}

impl<It: Iterator> IterableSource<It> {
    pub fn new(name: impl Into<String>, items: impl IntoIterator<IntoIter = It>) -> Self {
        Self {
            items: Some(items.into_iter()),
            delivery: Delivery::new(name.into()),
        }
    }
}

impl<It: Iterator> Source<It::Item> for IterableSource<It> {
    fn attach(&mut self, inlet: Inlet<It::Item>) {
        self.delivery.inlet = Some(inlet);
    }

    fn start(&mut self) -> Result<()> {
        let items = self.items.take().ok_or(PipelineError::AlreadyStarted)?;
        info!(source = %self.delivery.source, "starting iterable source");
        for item in items {
            self.delivery.deliver(item)?;
        }
        self.delivery.finish();
        Ok(())
    }

    fn delivered(&self) -> u64 {
        self.delivery.delivered
    }

    fn discarded(&self) -> u64 {
        self.delivery.discarded
    }
}

/// Topic-style source fed through a channel.
///
/// Producers publish by sending on the paired [`Sender`]; `start` relays
/// values in arrival order until every sender has been dropped.
pub struct ChannelSource<T> {
    receiver: Receiver<T>,
    delivery: Delivery<T>,
}

impl<T> ChannelSource<T> {
    pub fn new(name: impl Into<String>, receiver: Receiver<T>) -> Self {
        Self {
            receiver,
            delivery: Delivery::new(name.into()),
        }
    }

    /// Create a source with an unbounded channel
    pub fn unbounded(name: impl Into<String>) -> (Sender<T>, Self) {
        let (sender, receiver) = channel::unbounded();
        (sender, Self::new(name, receiver))
    }

    /// Create a source whose producers block once `capacity` values are queued
    pub fn bounded(name: impl Into<String>, capacity: usize) -> (Sender<T>, Self) {
        let (sender, receiver) = channel::bounded(capacity);
        (sender, Self::new(name, receiver))
    }
}

impl<T> Source<T> for ChannelSource<T> {
    fn attach(&mut self, inlet: Inlet<T>) {
        self.delivery.inlet = Some(inlet);
    }

    fn start(&mut self) -> Result<()> {
        info!(source = %self.delivery.source, "starting channel source");
        for value in self.receiver.iter() {
            self.delivery.deliver(value)?;
        }
        self.delivery.finish();
        Ok(())
    }

    fn delivered(&self) -> u64 {
        self.delivery.delivered
    }

    fn discarded(&self) -> u64 {
        self.delivery.discarded
    }
}
