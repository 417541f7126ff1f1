//! The runtime side: where accepted resources are started and stopped.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ProcessorError;
use crate::model::{Component, Subscription};

/// Starts and stops resources inside the runtime.
///
/// Init receives the reconciler's cancellation token and should give up
/// promptly once it fires.
#[async_trait]
pub trait Processor: Send + Sync {
    async fn init_component(
        &self,
        cancel: &CancellationToken,
        component: &Component,
    ) -> Result<(), ProcessorError>;

    async fn close_component(&self, component: &Component) -> Result<(), ProcessorError>;

    async fn init_subscription(
        &self,
        cancel: &CancellationToken,
        subscription: &Subscription,
    ) -> Result<(), ProcessorError>;

    async fn close_subscription(&self, subscription: &Subscription)
        -> Result<(), ProcessorError>;
}
