//! In-process loader. The embedder (or a test) owns the source of truth.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{Event, EventType, Loader, Loaders, StreamConn};
use crate::error::LoaderError;
use crate::model::{Component, Subscription};
use crate::resource::Resource;

/// A loader backed by a plain list.
///
/// Clones share state, so a test can keep one handle and give another to
/// the reconciler.
#[derive(Clone)]
pub struct MemoryLoader<T> {
    state: Arc<Mutex<MemoryState<T>>>,
}

struct MemoryState<T> {
    items: Vec<T>,
    list_error: Option<String>,
    stream_error: Option<String>,
    streams: Vec<Stream<T>>,
    next_stream_id: u64,
    list_calls: usize,
    stream_calls: usize,
}

struct Stream<T> {
    id: u64,
    events: mpsc::UnboundedSender<Event<T>>,
    reconcile: mpsc::Sender<()>,
}

impl<T> Default for MemoryLoader<T> {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                items: Vec::new(),
                list_error: None,
                stream_error: None,
                streams: Vec::new(),
                next_stream_id: 0,
                list_calls: 0,
                stream_calls: 0,
            })),
        }
    }
}

impl<T: Resource> MemoryLoader<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<T>) -> Self {
        let loader = Self::new();
        loader.set(items);
        loader
    }

    /// Replace the listing. Open streams are not notified.
    pub fn set(&self, items: Vec<T>) {
        self.lock().items = items;
    }

    /// Send an event to every open stream. Returns how many received it.
    pub fn push(&self, event_type: EventType, resource: T) -> usize {
        let mut state = self.lock();
        state.streams.retain(|s| !s.events.is_closed());
        state
            .streams
            .iter()
            .filter(|s| s.events.send(Event::new(event_type, resource.clone())).is_ok())
            .count()
    }

    /// Ask every open stream for a full resync.
    pub fn resync(&self) {
        for stream in &self.lock().streams {
            // Full means a resync is already pending.
            let _ = stream.reconcile.try_send(());
        }
    }

    /// Make `list` fail with `reason` until cleared with `None`.
    pub fn fail_list(&self, reason: Option<String>) {
        self.lock().list_error = reason;
    }

    /// Make `stream` fail with `reason` until cleared with `None`.
    pub fn fail_stream(&self, reason: Option<String>) {
        self.lock().stream_error = reason;
    }

    pub fn list_calls(&self) -> usize {
        self.lock().list_calls
    }

    pub fn stream_calls(&self) -> usize {
        self.lock().stream_calls
    }

    /// Number of streams whose token has not fired yet.
    pub fn open_streams(&self) -> usize {
        self.lock().streams.len()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl<T: Resource> Loader<T> for MemoryLoader<T> {
    async fn list(&self, _cancel: &CancellationToken) -> Result<Vec<T>, LoaderError> {
        let mut state = self.lock();
        state.list_calls += 1;
        match &state.list_error {
            Some(reason) => Err(LoaderError::Unavailable(reason.clone())),
            None => Ok(state.items.clone()),
        }
    }

    async fn stream(&self, cancel: &CancellationToken) -> Result<StreamConn<T>, LoaderError> {
        let id = {
            let mut state = self.lock();
            state.stream_calls += 1;
            if let Some(reason) = &state.stream_error {
                return Err(LoaderError::Unavailable(reason.clone()));
            }
            let id = state.next_stream_id;
            state.next_stream_id += 1;
            id
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (reconcile_tx, reconcile_rx) = mpsc::channel(1);
        self.lock().streams.push(Stream {
            id,
            events: events_tx,
            reconcile: reconcile_tx,
        });

        let loader = self.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            loader.lock().streams.retain(|s| s.id != id);
            debug!(kind = T::KIND, stream = id, "Memory stream closed");
        });

        Ok(StreamConn {
            events: events_rx,
            reconcile: reconcile_rx,
        })
    }
}

/// One [`MemoryLoader`] per resource kind.
#[derive(Clone, Default)]
pub struct MemoryLoaders {
    pub components: MemoryLoader<Component>,
    pub subscriptions: MemoryLoader<Subscription>,
}

impl MemoryLoaders {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Loaders for MemoryLoaders {
    fn components(&self) -> Arc<dyn Loader<Component>> {
        Arc::new(self.components.clone())
    }

    fn subscriptions(&self) -> Arc<dyn Loader<Subscription>> {
        Arc::new(self.subscriptions.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn comp(name: &str) -> Component {
        Component::new(name, "state.in-memory", "v1")
    }

    #[tokio::test]
    async fn test_list_and_failure() {
        let loader = MemoryLoader::with_items(vec![comp("a")]);
        let cancel = CancellationToken::new();

        let items = loader.list(&cancel).await.unwrap();
        assert_eq!(items.len(), 1);

        loader.fail_list(Some("backend down".to_string()));
        let err = loader.list(&cancel).await.unwrap_err();
        assert!(matches!(err, LoaderError::Unavailable(_)));

        loader.fail_list(None);
        loader.set(vec![comp("a"), comp("b")]);
        assert_eq!(loader.list(&cancel).await.unwrap().len(), 2);
        assert_eq!(loader.list_calls(), 3);
    }

    #[tokio::test]
    async fn test_push_and_resync() {
        let loader = MemoryLoader::<Component>::new();
        let cancel = CancellationToken::new();
        let mut conn = loader.stream(&cancel).await.unwrap();

        assert_eq!(loader.push(EventType::Created, comp("a")), 1);
        let event = conn.events.recv().await.unwrap();
        assert_eq!(event.event_type, EventType::Created);
        assert_eq!(event.resource.name(), "a");

        loader.resync();
        loader.resync();
        conn.reconcile.recv().await.unwrap();
        assert!(conn.reconcile.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stream_failure() {
        let loader = MemoryLoader::<Subscription>::new();
        loader.fail_stream(Some("no stream".to_string()));
        let cancel = CancellationToken::new();
        assert!(loader.stream(&cancel).await.is_err());
        assert_eq!(loader.stream_calls(), 1);
        assert_eq!(loader.open_streams(), 0);
    }

    #[tokio::test]
    async fn test_cancel_closes_stream() {
        let loader = MemoryLoader::<Component>::new();
        let cancel = CancellationToken::new();
        let mut conn = loader.stream(&cancel).await.unwrap();
        assert_eq!(loader.open_streams(), 1);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), async {
            while loader.open_streams() > 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        assert_eq!(loader.push(EventType::Created, comp("a")), 0);
        assert!(conn.events.recv().await.is_none());
    }
}
