use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{Manager, Options};
use crate::compstore::CompStore;
use crate::error::LoaderError;
use crate::loader::{Loader, StreamConn};
use crate::model::Subscription;
use crate::processor::Processor;
use crate::resource::Resource;

/// Applies subscription changes to the runtime.
pub struct SubscriptionsManager {
    loader: Arc<dyn Loader<Subscription>>,
    store: Arc<CompStore>,
    processor: Arc<dyn Processor>,
}

impl SubscriptionsManager {
    pub fn new(opts: &Options) -> Self {
        Self {
            loader: opts.loader.subscriptions(),
            store: opts.store.clone(),
            processor: opts.processor.clone(),
        }
    }
}

#[async_trait]
impl Manager<Subscription> for SubscriptionsManager {
    async fn list(&self, cancel: &CancellationToken) -> Result<Vec<Subscription>, LoaderError> {
        self.loader.list(cancel).await
    }

    async fn tracked(&self) -> Vec<Subscription> {
        self.store.subscriptions().list().await
    }

    async fn stream(
        &self,
        cancel: &CancellationToken,
    ) -> Result<StreamConn<Subscription>, LoaderError> {
        self.loader.stream(cancel).await
    }

    async fn update(&self, cancel: &CancellationToken, sub: Subscription) {
        let store = self.store.subscriptions();
        let existing = store.get(sub.name()).await;

        if existing.as_ref() == Some(&sub) {
            debug!("Subscription {} is unchanged, skipping", sub.log_name());
            return;
        }

        if let Some(old) = existing {
            info!("Closing existing subscription to reload: {}", old.log_name());
            if let Err(e) = self.processor.close_subscription(&old).await {
                error!("Error closing subscription {}: {}", old.log_name(), e);
                return;
            }
            store.delete(old.name()).await;
        }

        info!("Adding subscription: {}", sub.log_name());
        match self.processor.init_subscription(cancel, &sub).await {
            Ok(()) => store.set(sub).await,
            Err(e) => error!("Error adding subscription {}: {}", sub.log_name(), e),
        }
    }

    async fn delete(&self, _cancel: &CancellationToken, sub: Subscription) {
        let Some(old) = self.store.subscriptions().delete(sub.name()).await else {
            debug!("Subscription {} is not tracked, nothing to close", sub.log_name());
            return;
        };

        match self.processor.close_subscription(&old).await {
            Ok(()) => info!("Closed subscription: {}", old.log_name()),
            Err(e) => error!("Error closing subscription {}: {}", old.log_name(), e),
        }
    }
}
