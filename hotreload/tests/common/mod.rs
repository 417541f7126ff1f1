//! Test helpers for hotreload integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hotreload::{
    AllowAll, Authorizer, CompStore, Component, FakeClock, Healthz, MemoryLoaders, Options,
    Processor, ProcessorError, Reconciler, Resource, Subscription,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Begin,
    End,
}

/// Processor that keeps a begin/end timeline of every call.
///
/// Entries are `"init a/v1"`, `"close a/v1"` for components and
/// `"init orders"` for subscriptions.
#[derive(Default)]
pub struct RecordingProcessor {
    timeline: Mutex<Vec<(Phase, String)>>,
    delays: Mutex<HashMap<String, Duration>>,
    fail_init: Mutex<HashSet<String>>,
    fail_close: Mutex<HashSet<String>>,
}

impl RecordingProcessor {
    pub fn timeline(&self) -> Vec<(Phase, String)> {
        self.timeline.lock().unwrap().clone()
    }

    /// Calls in the order they started.
    pub fn calls(&self) -> Vec<String> {
        self.timeline()
            .into_iter()
            .filter(|(phase, _)| *phase == Phase::Begin)
            .map(|(_, op)| op)
            .collect()
    }

    pub fn set_delay(&self, name: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(name.to_string(), delay);
    }

    pub fn fail_init(&self, name: &str, fail: bool) {
        toggle(&self.fail_init, name, fail);
    }

    pub fn fail_close(&self, name: &str, fail: bool) {
        toggle(&self.fail_close, name, fail);
    }

    async fn call(&self, action: &str, name: &str, op: String) -> bool {
        self.timeline
            .lock()
            .unwrap()
            .push((Phase::Begin, format!("{action} {op}")));

        let delay = self.delays.lock().unwrap().get(name).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.timeline
            .lock()
            .unwrap()
            .push((Phase::End, format!("{action} {op}")));

        let failing = match action {
            "init" => &self.fail_init,
            _ => &self.fail_close,
        };
        !failing.lock().unwrap().contains(name)
    }
}

fn toggle(set: &Mutex<HashSet<String>>, name: &str, on: bool) {
    let mut set = set.lock().unwrap();
    if on {
        set.insert(name.to_string());
    } else {
        set.remove(name);
    }
}

fn component_op(c: &Component) -> String {
    format!("{}/{}", c.name(), c.spec.version)
}

#[async_trait]
impl Processor for RecordingProcessor {
    async fn init_component(
        &self,
        _cancel: &CancellationToken,
        component: &Component,
    ) -> Result<(), ProcessorError> {
        if self.call("init", component.name(), component_op(component)).await {
            Ok(())
        } else {
            Err(ProcessorError::Init {
                name: component.name().to_string(),
                reason: "injected failure".to_string(),
            })
        }
    }

    async fn close_component(&self, component: &Component) -> Result<(), ProcessorError> {
        if self.call("close", component.name(), component_op(component)).await {
            Ok(())
        } else {
            Err(ProcessorError::Close {
                name: component.name().to_string(),
                reason: "injected failure".to_string(),
            })
        }
    }

    async fn init_subscription(
        &self,
        _cancel: &CancellationToken,
        subscription: &Subscription,
    ) -> Result<(), ProcessorError> {
        let name = subscription.name();
        if self.call("init", name, name.to_string()).await {
            Ok(())
        } else {
            Err(ProcessorError::Init {
                name: name.to_string(),
                reason: "injected failure".to_string(),
            })
        }
    }

    async fn close_subscription(&self, subscription: &Subscription) -> Result<(), ProcessorError> {
        let name = subscription.name();
        if self.call("close", name, name.to_string()).await {
            Ok(())
        } else {
            Err(ProcessorError::Close {
                name: name.to_string(),
                reason: "injected failure".to_string(),
            })
        }
    }
}

pub fn component(name: &str, version: &str) -> Component {
    Component::new(name, "state.in-memory", version)
}

pub fn subscription(name: &str, topic: &str) -> Subscription {
    Subscription::new(name, "pubsub", topic)
}

/// A reconciler wired to in-memory collaborators and a fake clock.
///
/// Dropping the harness cancels every reconciler it started.
pub struct Harness {
    pub loaders: MemoryLoaders,
    pub store: Arc<CompStore>,
    pub processor: Arc<RecordingProcessor>,
    pub healthz: Healthz,
    pub clock: FakeClock,
    pub opts: Options,
    pub cancel: CancellationToken,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_authorizer(Arc::new(AllowAll))
    }

    pub fn with_authorizer(authorizer: Arc<dyn Authorizer>) -> Self {
        let loaders = MemoryLoaders::new();
        let store = Arc::new(CompStore::new());
        let processor = Arc::new(RecordingProcessor::default());
        let healthz = Healthz::new();
        let clock = FakeClock::new();

        let opts = Options {
            loader: Arc::new(loaders.clone()),
            store: store.clone(),
            processor: processor.clone(),
            authorizer,
            healthz: healthz.clone(),
            clock: Arc::new(clock.clone()),
        };

        Self {
            loaders,
            store,
            processor,
            healthz,
            clock,
            opts,
            cancel: CancellationToken::new(),
        }
    }

    pub fn spawn_components(&self) -> JoinHandle<hotreload::Result<()>> {
        let reconciler = Reconciler::new_components(&self.opts);
        let cancel = self.cancel.clone();
        tokio::spawn(async move { reconciler.run(&cancel).await })
    }

    pub fn spawn_subscriptions(&self) -> JoinHandle<hotreload::Result<()>> {
        let reconciler = Reconciler::new_subscriptions(&self.opts);
        let cancel = self.cancel.clone();
        tokio::spawn(async move { reconciler.run(&cancel).await })
    }

    /// Wait until every reconciler is streaming and has its ticker.
    pub async fn started(&self) {
        tokio::time::timeout(WAIT, self.healthz.wait_ready())
            .await
            .expect("reconciler did not become ready");
        wait_until(|| self.clock.has_tickers()).await;
    }

    /// Fire the resync ticker.
    pub fn tick(&self) {
        self.clock.step(hotreload::RESYNC_PERIOD);
    }

    /// Tracked components as `name/version`, ordered by name.
    pub async fn components(&self) -> Vec<String> {
        self.store
            .components()
            .list()
            .await
            .iter()
            .map(component_op)
            .collect()
    }

    pub async fn subscriptions(&self) -> Vec<String> {
        self.store
            .subscriptions()
            .list()
            .await
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    pub async fn wait_for_components(&self, expected: &[&str]) {
        let ok = tokio::time::timeout(WAIT, async {
            while self.components().await != expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(
            ok.is_ok(),
            "tracked components {:?}, expected {:?}",
            self.components().await,
            expected
        );
    }

    pub async fn wait_for_subscriptions(&self, expected: &[&str]) {
        let ok = tokio::time::timeout(WAIT, async {
            while self.subscriptions().await != expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(
            ok.is_ok(),
            "tracked subscriptions {:?}, expected {:?}",
            self.subscriptions().await,
            expected
        );
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Poll `check` until it holds, failing the test after a few seconds.
pub async fn wait_until(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}
