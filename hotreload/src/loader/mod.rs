//! Sources of truth for resources.
//!
//! A [`Loader`] answers point-in-time listings and hands out a push stream
//! of single-resource events plus a "resync now" signal.

pub mod disk;
pub mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::LoaderError;
use crate::model::{Component, Subscription};
use crate::resource::Resource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Created,
    Updated,
    Deleted,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventType::Created => "CREATED",
            EventType::Updated => "UPDATED",
            EventType::Deleted => "DELETED",
        };
        f.write_str(s)
    }
}

/// A change to a single resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<T> {
    pub event_type: EventType,
    pub resource: T,
}

impl<T> Event<T> {
    pub fn new(event_type: EventType, resource: T) -> Self {
        Self {
            event_type,
            resource,
        }
    }
}

/// Receiving half of a loader stream.
///
/// Producers stop once the token passed to [`Loader::stream`] is cancelled.
#[derive(Debug)]
pub struct StreamConn<T> {
    pub events: mpsc::UnboundedReceiver<Event<T>>,
    /// A unit value asks for a full resync. Signals coalesce.
    pub reconcile: mpsc::Receiver<()>,
}

#[async_trait]
pub trait Loader<T: Resource>: Send + Sync {
    /// Everything currently declared for this kind.
    async fn list(&self, cancel: &CancellationToken) -> Result<Vec<T>, LoaderError>;

    /// Open the push channel.
    async fn stream(&self, cancel: &CancellationToken) -> Result<StreamConn<T>, LoaderError>;
}

/// Hands out the loader for each resource kind.
pub trait Loaders: Send + Sync {
    fn components(&self) -> Arc<dyn Loader<Component>>;
    fn subscriptions(&self) -> Arc<dyn Loader<Subscription>>;
}
