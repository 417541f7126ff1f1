use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::Options;
use crate::authorizer::{AllowAll, Authorizer};
use crate::clock::FakeClock;
use crate::compstore::CompStore;
use crate::error::ProcessorError;
use crate::healthz::Healthz;
use crate::loader::memory::MemoryLoaders;
use crate::model::{Component, Subscription};
use crate::processor::Processor;
use crate::resource::Resource;

/// Records every call as `"<op> <log name>"` and fails on request.
#[derive(Default)]
pub(crate) struct MockProcessor {
    calls: Mutex<Vec<String>>,
    fail_init: Mutex<HashSet<String>>,
    fail_close: Mutex<HashSet<String>>,
}

impl MockProcessor {
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn fail_init(&self, name: &str) {
        self.fail_init.lock().unwrap().insert(name.to_string());
    }

    pub(crate) fn fail_close(&self, name: &str) {
        self.fail_close.lock().unwrap().insert(name.to_string());
    }

    fn record<R: Resource>(&self, op: &str, resource: &R) -> Result<(), ProcessorError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{op} {}", resource.log_name()));

        let name = resource.name().to_string();
        if op == "init" && self.fail_init.lock().unwrap().contains(&name) {
            return Err(ProcessorError::Init {
                name,
                reason: "injected".to_string(),
            });
        }
        if op == "close" && self.fail_close.lock().unwrap().contains(&name) {
            return Err(ProcessorError::Close {
                name,
                reason: "injected".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Processor for MockProcessor {
    async fn init_component(
        &self,
        _cancel: &CancellationToken,
        component: &Component,
    ) -> Result<(), ProcessorError> {
        self.record("init", component)
    }

    async fn close_component(&self, component: &Component) -> Result<(), ProcessorError> {
        self.record("close", component)
    }

    async fn init_subscription(
        &self,
        _cancel: &CancellationToken,
        subscription: &Subscription,
    ) -> Result<(), ProcessorError> {
        self.record("init", subscription)
    }

    async fn close_subscription(&self, subscription: &Subscription) -> Result<(), ProcessorError> {
        self.record("close", subscription)
    }
}

pub(crate) fn options(
    processor: Arc<MockProcessor>,
    authorizer: Arc<dyn Authorizer>,
) -> (Options, MemoryLoaders) {
    let loaders = MemoryLoaders::new();
    let opts = Options {
        loader: Arc::new(loaders.clone()),
        store: Arc::new(CompStore::new()),
        processor,
        authorizer,
        healthz: Healthz::new(),
        clock: Arc::new(FakeClock::new()),
    };
    (opts, loaders)
}

pub(crate) fn allow_all() -> Arc<dyn Authorizer> {
    Arc::new(AllowAll)
}
