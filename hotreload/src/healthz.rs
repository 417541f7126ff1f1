//! Readiness aggregation.
//!
//! Each long-running part of the process registers a [`Target`] and flips
//! it once it is up. [`Healthz`] is ready when every target is.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::debug;

#[derive(Clone, Default)]
pub struct Healthz {
    targets: Arc<Mutex<Vec<Target>>>,
}

impl Healthz {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new target. It starts out not ready.
    pub fn add_target(&self, name: impl Into<String>) -> Target {
        let target = Target::new(name.into());
        self.targets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(target.clone());
        target
    }

    pub fn is_ready(&self) -> bool {
        self.snapshot().iter().all(Target::is_ready)
    }

    /// Names of the targets that are not ready yet.
    pub fn not_ready(&self) -> Vec<String> {
        self.snapshot()
            .iter()
            .filter(|t| !t.is_ready())
            .map(|t| t.name().to_string())
            .collect()
    }

    /// Resolve once every target registered so far is ready.
    pub async fn wait_ready(&self) {
        for target in self.snapshot() {
            target.wait_ready().await;
        }
    }

    fn snapshot(&self) -> Vec<Target> {
        self.targets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// A single readiness flag. Once ready it stays ready.
#[derive(Clone)]
pub struct Target {
    name: Arc<str>,
    state: Arc<watch::Sender<bool>>,
}

impl Target {
    fn new(name: String) -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            name: name.into(),
            state: Arc::new(tx),
        }
    }

    pub fn ready(&self) {
        let changed = self.state.send_if_modified(|ready| {
            if *ready {
                return false;
            }
            *ready = true;
            true
        });
        if changed {
            debug!(target_name = %self.name, "Health target ready");
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.state.borrow()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    pub async fn wait_ready(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so this cannot close.
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Target")
            .field("name", &self.name)
            .field("ready", &self.is_ready())
            .finish()
    }
}
