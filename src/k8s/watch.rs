use super::error::K8sError;
use futures::stream::BoxStream;
use futures::StreamExt;
use kube::api::WatchEvent;
use kube::core::DynamicObject;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use tokio::runtime::Runtime;

pub type Event = Result<WatchEvent<DynamicObject>, K8sError>;

/// Blocking handle over a live watch.
///
/// Each call to [Iterator::next] waits for the next event. The iterator ends when the server
/// closes the watch. Dropping the handle (or calling [EventStream::stop]) closes it from this side.
pub struct EventStream {
    events: Box<dyn Iterator<Item = Event> + Send>,
}

impl EventStream {
    pub fn new<I>(events: I) -> Self
    where
        I: Iterator<Item = Event> + Send + 'static,
    {
        Self {
            events: Box::new(events),
        }
    }

    /// Drives an async watch stream on the provided runtime.
    pub fn from_async(
        runtime: Arc<Runtime>,
        stream: BoxStream<'static, Result<WatchEvent<DynamicObject>, kube::Error>>,
    ) -> Self {
        Self::new(RuntimeEvents { runtime, stream })
    }

    pub fn stop(self) {
        drop(self)
    }
}

impl Iterator for EventStream {
    type Item = Event;

    fn next(&mut self) -> Option<Self::Item> {
        self.events.next()
    }
}

impl Debug for EventStream {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream").finish_non_exhaustive()
    }
}

struct RuntimeEvents {
    runtime: Arc<Runtime>,
    stream: BoxStream<'static, Result<WatchEvent<DynamicObject>, kube::Error>>,
}

impl Iterator for RuntimeEvents {
    type Item = Event;

    fn next(&mut self) -> Option<Self::Item> {
        self.runtime
            .block_on(self.stream.next())
            .map(|event| event.map_err(K8sError::from))
    }
}
