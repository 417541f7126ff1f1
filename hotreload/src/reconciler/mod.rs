//! The reconciliation loop.
//!
//! One [`Reconciler`] runs per resource kind. It owns the loader stream and
//! the resync ticker and turns their wake-ups into calls on a [`Manager`].

mod components;
mod subscriptions;

#[cfg(test)]
pub(crate) mod mock;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::authorizer::Authorizer;
use crate::clock::Clock;
use crate::compstore::CompStore;
use crate::differ::{self, DiffResult};
use crate::error::{Error, LoaderError, Result};
use crate::healthz::{Healthz, Target};
use crate::loader::{Event, EventType, Loaders, StreamConn};
use crate::model::{Component, Subscription};
use crate::processor::Processor;
use crate::resource::Resource;

pub use components::ComponentsManager;
pub use subscriptions::SubscriptionsManager;

/// How often a full resync runs when nothing else triggers one.
pub const RESYNC_PERIOD: Duration = Duration::from_secs(60);

/// Collaborators shared by every reconciler in the process.
#[derive(Clone)]
pub struct Options {
    pub loader: Arc<dyn Loaders>,
    pub store: Arc<CompStore>,
    pub processor: Arc<dyn Processor>,
    pub authorizer: Arc<dyn Authorizer>,
    pub healthz: Healthz,
    pub clock: Arc<dyn Clock>,
}

// =============================================================================
// Manager
// =============================================================================

/// Kind-specific half of a reconciler.
///
/// `update` and `delete` absorb their own failures: they log and return, so
/// one resource can never stall a pass.
#[async_trait]
pub trait Manager<T: Resource>: Send + Sync {
    /// Authoritative listing from the source of truth.
    async fn list(&self, cancel: &CancellationToken) -> std::result::Result<Vec<T>, LoaderError>;

    /// What the runtime currently tracks.
    async fn tracked(&self) -> Vec<T>;

    async fn stream(
        &self,
        cancel: &CancellationToken,
    ) -> std::result::Result<StreamConn<T>, LoaderError>;

    /// Create or replace a resource.
    async fn update(&self, cancel: &CancellationToken, resource: T);

    /// Tear a resource down.
    async fn delete(&self, cancel: &CancellationToken, resource: T);
}

// =============================================================================
// Reconciler
// =============================================================================

pub struct Reconciler<T: Resource> {
    kind: &'static str,
    manager: Arc<dyn Manager<T>>,
    htarget: Target,
    clock: Arc<dyn Clock>,
}

impl Reconciler<Component> {
    pub fn new_components(opts: &Options) -> Self {
        Self::with_manager(
            Arc::new(ComponentsManager::new(opts)),
            opts.healthz.add_target("component-reconciler"),
            opts.clock.clone(),
        )
    }
}

impl Reconciler<Subscription> {
    pub fn new_subscriptions(opts: &Options) -> Self {
        Self::with_manager(
            Arc::new(SubscriptionsManager::new(opts)),
            opts.healthz.add_target("subscription-reconciler"),
            opts.clock.clone(),
        )
    }
}

impl<T: Resource> Reconciler<T> {
    pub fn with_manager(manager: Arc<dyn Manager<T>>, htarget: Target, clock: Arc<dyn Clock>) -> Self {
        Self {
            kind: T::KIND,
            manager,
            htarget,
            clock,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Run until `cancel` fires.
    ///
    /// Fails only if the loader stream cannot be opened. The stream is torn
    /// down when this returns, whatever the reason.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        let cancel = cancel.child_token();
        let _guard = cancel.clone().drop_guard();

        let conn = self
            .manager
            .stream(&cancel)
            .await
            .map_err(|source| Error::Stream {
                kind: self.kind,
                source,
            })?;

        self.htarget.ready();
        self.watch_for_events(&cancel, conn).await;
        Ok(())
    }

    async fn watch_for_events(&self, cancel: &CancellationToken, mut conn: StreamConn<T>) {
        info!("Starting to watch {} updates", self.kind);

        let mut ticker = self.clock.ticker(RESYNC_PERIOD);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("Stopped watching {} updates", self.kind);
                    return;
                }
                _ = ticker.tick() => {
                    debug!("Running scheduled {} reconcile", self.kind);
                    self.reconcile_all(cancel).await;
                }
                Some(()) = conn.reconcile.recv() => {
                    debug!("Reconciling all {}", self.kind);
                    self.reconcile_all(cancel).await;
                }
                Some(event) = conn.events.recv() => {
                    handle_event(cancel, self.manager.as_ref(), event).await;
                }
            }
        }
    }

    async fn reconcile_all(&self, cancel: &CancellationToken) {
        let remote = match self.manager.list(cancel).await {
            Ok(remote) => remote,
            Err(e) => {
                error!("Error listing {}: {}", self.kind, e);
                return;
            }
        };

        let tracked = self.manager.tracked().await;
        if let Some(result) = differ::diff(&remote, &tracked) {
            self.reconcile(cancel, result).await;
        }
    }

    /// Apply a diff as three waves. Each wave finishes before the next one
    /// starts.
    async fn reconcile(&self, cancel: &CancellationToken, result: DiffResult<T>) {
        if result.is_empty() {
            return;
        }

        info!(
            kind = self.kind,
            deleted = result.deleted.len(),
            updated = result.updated.len(),
            created = result.created.len(),
            "Applying {} changes",
            self.kind
        );

        self.run_wave(cancel, EventType::Deleted, result.deleted).await;
        self.run_wave(cancel, EventType::Updated, result.updated).await;
        self.run_wave(cancel, EventType::Created, result.created).await;
    }

    async fn run_wave(&self, cancel: &CancellationToken, event_type: EventType, resources: Vec<T>) {
        let mut tasks = JoinSet::new();
        for resource in resources {
            let manager = self.manager.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                handle_event(&cancel, manager.as_ref(), Event::new(event_type, resource)).await;
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(kind = self.kind, event = %event_type, error = %e, "Reconcile task failed");
            }
        }
    }
}

async fn handle_event<T: Resource>(
    cancel: &CancellationToken,
    manager: &dyn Manager<T>,
    event: Event<T>,
) {
    debug!(
        "Received {} event {}: {}",
        T::KIND,
        event.event_type,
        event.resource.log_name()
    );

    match event.event_type {
        EventType::Created => {
            info!("Received {} creation: {}", T::KIND, event.resource.log_name());
            manager.update(cancel, event.resource).await;
        }
        EventType::Updated => {
            info!("Received {} update: {}", T::KIND, event.resource.log_name());
            manager.update(cancel, event.resource).await;
        }
        EventType::Deleted => {
            info!("Received {} deletion, closing: {}", T::KIND, event.resource.log_name());
            manager.delete(cancel, event.resource).await;
        }
    }
}
