//! A runtime stand-in that journals what it would start and stop.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use hotreload::{Component, Processor, ProcessorError, Resource, Subscription};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Keeps the set of running resources keyed by `Kind/name`.
#[derive(Default)]
pub struct JournalProcessor {
    running: Mutex<BTreeMap<String, String>>,
}

impl JournalProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log names of everything currently running.
    pub fn running(&self) -> Vec<String> {
        self.lock().values().cloned().collect()
    }

    fn start<R: Resource>(&self, resource: &R) {
        self.lock()
            .insert(key(resource), resource.log_name());
        info!(kind = R::KIND, "Started {}", resource.log_name());
    }

    fn stop<R: Resource>(&self, resource: &R) -> Result<(), ProcessorError> {
        match self.lock().remove(&key(resource)) {
            Some(_) => {
                info!(kind = R::KIND, "Stopped {}", resource.log_name());
                Ok(())
            }
            None => Err(ProcessorError::Close {
                name: resource.name().to_string(),
                reason: "not running".to_string(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn key<R: Resource>(resource: &R) -> String {
    format!("{}/{}", R::KIND, resource.name())
}

#[async_trait]
impl Processor for JournalProcessor {
    async fn init_component(
        &self,
        _cancel: &CancellationToken,
        component: &Component,
    ) -> Result<(), ProcessorError> {
        if component.spec.component_type.is_empty() {
            return Err(ProcessorError::Init {
                name: component.name().to_string(),
                reason: "spec.type is required".to_string(),
            });
        }
        self.start(component);
        Ok(())
    }

    async fn close_component(&self, component: &Component) -> Result<(), ProcessorError> {
        self.stop(component)
    }

    async fn init_subscription(
        &self,
        _cancel: &CancellationToken,
        subscription: &Subscription,
    ) -> Result<(), ProcessorError> {
        if subscription.spec.pubsubname.is_empty() || subscription.spec.topic.is_empty() {
            return Err(ProcessorError::Init {
                name: subscription.name().to_string(),
                reason: "spec.pubsubname and spec.topic are required".to_string(),
            });
        }
        self.start(subscription);
        Ok(())
    }

    async fn close_subscription(&self, subscription: &Subscription) -> Result<(), ProcessorError> {
        self.stop(subscription)
    }
}
