//! Runs the reconcilers for every resource kind side by side.

use std::sync::{Mutex, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::model::{Component, Subscription};
use crate::reconciler::{Options, Reconciler};

pub struct Reloader {
    components: Reconciler<Component>,
    subscriptions: Option<Reconciler<Subscription>>,
}

impl Reloader {
    pub fn new(opts: Options) -> Self {
        Self {
            components: Reconciler::new_components(&opts),
            subscriptions: Some(Reconciler::new_subscriptions(&opts)),
        }
    }

    /// Hot-reload components only. No subscription health target is
    /// registered.
    pub fn components_only(opts: Options) -> Self {
        Self {
            components: Reconciler::new_components(&opts),
            subscriptions: None,
        }
    }

    /// Run until `cancel` fires or one reconciler fails.
    ///
    /// A failing reconciler stops the others; the first error is returned
    /// once all of them have returned.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        let cancel = cancel.child_token();
        let _guard = cancel.clone().drop_guard();

        info!("Hot reloading enabled, starting reconcilers");

        let failed = FirstError::default();

        let components = async {
            if let Err(e) = self.components.run(&cancel).await {
                error!("Component reconciler failed: {}", e);
                failed.record(e);
                cancel.cancel();
            }
        };

        let subscriptions = async {
            let Some(reconciler) = &self.subscriptions else {
                return;
            };
            if let Err(e) = reconciler.run(&cancel).await {
                error!("Subscription reconciler failed: {}", e);
                failed.record(e);
                cancel.cancel();
            }
        };

        tokio::join!(components, subscriptions);
        failed.into_result()
    }
}

/// Keeps the earliest error reported by any reconciler.
#[derive(Default)]
struct FirstError(Mutex<Option<Error>>);

impl FirstError {
    fn record(&self, err: Error) {
        let mut slot = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    fn into_result(self) -> Result<()> {
        match self.0.into_inner().unwrap_or_else(PoisonError::into_inner) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
