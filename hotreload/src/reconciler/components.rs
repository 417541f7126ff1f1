use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{Manager, Options};
use crate::authorizer::Authorizer;
use crate::compstore::CompStore;
use crate::error::LoaderError;
use crate::loader::{Loader, StreamConn};
use crate::model::Component;
use crate::processor::Processor;
use crate::resource::Resource;

/// Applies component changes to the runtime.
///
/// An update closes the running copy before the new one is initialized, so
/// at no point do two copies of a component run side by side.
pub struct ComponentsManager {
    loader: Arc<dyn Loader<Component>>,
    store: Arc<CompStore>,
    processor: Arc<dyn Processor>,
    authorizer: Arc<dyn Authorizer>,
}

impl ComponentsManager {
    pub fn new(opts: &Options) -> Self {
        Self {
            loader: opts.loader.components(),
            store: opts.store.clone(),
            processor: opts.processor.clone(),
            authorizer: opts.authorizer.clone(),
        }
    }
}

#[async_trait]
impl Manager<Component> for ComponentsManager {
    async fn list(&self, cancel: &CancellationToken) -> Result<Vec<Component>, LoaderError> {
        self.loader.list(cancel).await
    }

    async fn tracked(&self) -> Vec<Component> {
        self.store.components().list().await
    }

    async fn stream(
        &self,
        cancel: &CancellationToken,
    ) -> Result<StreamConn<Component>, LoaderError> {
        self.loader.stream(cancel).await
    }

    async fn update(&self, cancel: &CancellationToken, comp: Component) {
        let store = self.store.components();
        let existing = store.get(comp.name()).await;

        if existing.as_ref() == Some(&comp) {
            debug!("Component {} is unchanged, skipping", comp.log_name());
            return;
        }

        if !self.authorizer.is_authorized(Component::KIND, comp.name()) {
            warn!("Received unauthorized component update, ignored: {}", comp.log_name());
            return;
        }

        if let Some(old) = existing {
            info!("Closing existing component to reload: {}", old.log_name());
            if let Err(e) = self.processor.close_component(&old).await {
                error!("Error closing component {}: {}", old.log_name(), e);
                return;
            }
            store.delete(old.name()).await;
        }

        info!("Adding component: {}", comp.log_name());
        match self.processor.init_component(cancel, &comp).await {
            Ok(()) => store.set(comp).await,
            Err(e) => error!("Error adding component {}: {}", comp.log_name(), e),
        }
    }

    async fn delete(&self, _cancel: &CancellationToken, comp: Component) {
        let Some(old) = self.store.components().delete(comp.name()).await else {
            debug!("Component {} is not tracked, nothing to close", comp.log_name());
            return;
        };

        match self.processor.close_component(&old).await {
            Ok(()) => info!("Closed component: {}", old.log_name()),
            Err(e) => error!("Error closing component {}: {}", old.log_name(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorizer::AccessList;
    use crate::reconciler::mock::{allow_all, options, MockProcessor};

    fn comp(name: &str, version: &str) -> Component {
        Component::new(name, "state.in-memory", version)
    }

    #[tokio::test]
    async fn test_update_creates_and_is_idempotent() {
        let processor = Arc::new(MockProcessor::default());
        let (opts, _) = options(processor.clone(), allow_all());
        let manager = ComponentsManager::new(&opts);
        let cancel = CancellationToken::new();

        manager.update(&cancel, comp("a", "v1")).await;
        manager.update(&cancel, comp("a", "v1")).await;

        assert_eq!(processor.calls(), vec!["init a (state.in-memory/v1)"]);
        assert_eq!(manager.tracked().await, vec![comp("a", "v1")]);
    }

    #[tokio::test]
    async fn test_update_replaces_old_copy() {
        let processor = Arc::new(MockProcessor::default());
        let (opts, _) = options(processor.clone(), allow_all());
        let manager = ComponentsManager::new(&opts);
        let cancel = CancellationToken::new();

        manager.update(&cancel, comp("a", "v1")).await;
        manager.update(&cancel, comp("a", "v2")).await;

        assert_eq!(
            processor.calls(),
            vec![
                "init a (state.in-memory/v1)",
                "close a (state.in-memory/v1)",
                "init a (state.in-memory/v2)",
            ]
        );
        assert_eq!(manager.tracked().await, vec![comp("a", "v2")]);
    }

    #[tokio::test]
    async fn test_close_failure_keeps_old_copy() {
        let processor = Arc::new(MockProcessor::default());
        let (opts, _) = options(processor.clone(), allow_all());
        let manager = ComponentsManager::new(&opts);
        let cancel = CancellationToken::new();

        manager.update(&cancel, comp("a", "v1")).await;
        processor.fail_close("a");
        manager.update(&cancel, comp("a", "v2")).await;

        assert_eq!(processor.calls().len(), 2);
        assert_eq!(manager.tracked().await, vec![comp("a", "v1")]);
    }

    #[tokio::test]
    async fn test_init_failure_is_not_tracked() {
        let processor = Arc::new(MockProcessor::default());
        let (opts, _) = options(processor.clone(), allow_all());
        let manager = ComponentsManager::new(&opts);

        processor.fail_init("a");
        manager.update(&CancellationToken::new(), comp("a", "v1")).await;

        assert_eq!(processor.calls(), vec!["init a (state.in-memory/v1)"]);
        assert!(manager.tracked().await.is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_never_reaches_processor() {
        let processor = Arc::new(MockProcessor::default());
        let acl = Arc::new(AccessList::new().deny("Component", "secret"));
        let (opts, _) = options(processor.clone(), acl);
        let manager = ComponentsManager::new(&opts);

        manager.update(&CancellationToken::new(), comp("secret", "v1")).await;

        assert!(processor.calls().is_empty());
        assert!(manager.tracked().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let processor = Arc::new(MockProcessor::default());
        let (opts, _) = options(processor.clone(), allow_all());
        let manager = ComponentsManager::new(&opts);
        let cancel = CancellationToken::new();

        manager.update(&cancel, comp("a", "v1")).await;
        // The event may carry a stale copy; the tracked one is closed.
        manager.delete(&cancel, comp("a", "v0")).await;
        manager.delete(&cancel, comp("untracked", "v1")).await;

        assert_eq!(
            processor.calls(),
            vec!["init a (state.in-memory/v1)", "close a (state.in-memory/v1)"]
        );
        assert!(manager.tracked().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_close_failure_still_untracks() {
        let processor = Arc::new(MockProcessor::default());
        let (opts, _) = options(processor.clone(), allow_all());
        let manager = ComponentsManager::new(&opts);
        let cancel = CancellationToken::new();

        manager.update(&cancel, comp("a", "v1")).await;
        processor.fail_close("a");
        manager.delete(&cancel, comp("a", "v1")).await;

        assert!(manager.tracked().await.is_empty());
    }
}
