//! Manifest directories on local disk.
//!
//! Every `*.yaml`, `*.yml` and `*.json` file directly inside a configured
//! directory is read. YAML files may hold several documents separated by
//! `---`; documents are routed by their `kind` field.
//!
//! A file that stops decoding keeps contributing its last good contents, so
//! a half-written edit does not tear down what is already running.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use notify::{EventKind, RecursiveMode, Watcher};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{Loader, Loaders, StreamConn};
use crate::error::LoaderError;
use crate::model::{Component, Subscription};
use crate::resource::Resource;

const MANIFEST_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Loads components and subscriptions from the same set of directories.
pub struct DiskLoader {
    components: Arc<DiskResourceLoader<Component>>,
    subscriptions: Arc<DiskResourceLoader<Subscription>>,
}

impl DiskLoader {
    /// `namespace`, when set, skips documents that name a different one.
    pub fn new(paths: Vec<PathBuf>, namespace: Option<String>) -> Self {
        Self {
            components: Arc::new(DiskResourceLoader::new(paths.clone(), namespace.clone())),
            subscriptions: Arc::new(DiskResourceLoader::new(paths, namespace)),
        }
    }
}

impl Loaders for DiskLoader {
    fn components(&self) -> Arc<dyn Loader<Component>> {
        self.components.clone()
    }

    fn subscriptions(&self) -> Arc<dyn Loader<Subscription>> {
        self.subscriptions.clone()
    }
}

/// Disk loader for a single kind.
pub struct DiskResourceLoader<T> {
    paths: Vec<PathBuf>,
    namespace: Option<String>,
    /// Last successfully decoded contents of each file.
    last_good: Mutex<HashMap<PathBuf, Vec<T>>>,
}

impl<T: Resource + DeserializeOwned> DiskResourceLoader<T> {
    pub fn new(paths: Vec<PathBuf>, namespace: Option<String>) -> Self {
        Self {
            paths,
            namespace,
            last_good: Mutex::new(HashMap::new()),
        }
    }

    fn decode_file(&self, path: &Path, raw: &str) -> Result<Vec<T>, LoaderError> {
        let mut items = Vec::new();
        for doc in decode_documents(path, raw)? {
            if let Some(item) = self.accept(path, doc)? {
                items.push(item);
            }
        }
        Ok(items)
    }

    /// Decode `path`, falling back to its last good contents on failure.
    fn load_file(&self, path: &Path, raw: &str) -> Vec<T> {
        let mut last_good = self.last_good.lock().unwrap_or_else(PoisonError::into_inner);
        match self.decode_file(path, raw) {
            Ok(items) => {
                last_good.insert(path.to_path_buf(), items.clone());
                items
            }
            Err(e) => match last_good.get(path) {
                Some(items) => {
                    warn!(kind = T::KIND, error = %e, "Keeping last good version of manifest file");
                    items.clone()
                }
                None => {
                    warn!(kind = T::KIND, error = %e, "Skipping undecodable manifest file");
                    Vec::new()
                }
            },
        }
    }

    fn accept(&self, path: &Path, doc: serde_json::Value) -> Result<Option<T>, LoaderError> {
        if doc.get("kind").and_then(|k| k.as_str()) != Some(T::KIND) {
            return Ok(None);
        }

        if let (Some(want), Some(have)) = (
            self.namespace.as_deref(),
            doc.pointer("/metadata/namespace").and_then(|n| n.as_str()),
        ) {
            if !have.is_empty() && have != want {
                debug!(kind = T::KIND, path = %path.display(), namespace = have, "Skipping manifest from other namespace");
                return Ok(None);
            }
        }

        let item: T = serde_json::from_value(doc).map_err(|e| LoaderError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if item.name().is_empty() {
            warn!(kind = T::KIND, path = %path.display(), "Skipping manifest without a name");
            return Ok(None);
        }
        Ok(Some(item))
    }
}

#[async_trait]
impl<T: Resource + DeserializeOwned> Loader<T> for DiskResourceLoader<T> {
    async fn list(&self, _cancel: &CancellationToken) -> Result<Vec<T>, LoaderError> {
        let mut found = Vec::new();
        for dir in &self.paths {
            for path in manifest_files(dir).await? {
                let raw = tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|source| LoaderError::Io {
                        path: path.clone(),
                        source,
                    })?;
                found.extend(self.load_file(&path, &raw));
            }
        }
        Ok(dedupe(found))
    }

    async fn stream(&self, cancel: &CancellationToken) -> Result<StreamConn<T>, LoaderError> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (reconcile_tx, reconcile_rx) = mpsc::channel(1);
        let kind = T::KIND;

        // Manifests already on disk are loaded by the first pass, not the
        // first tick.
        let _ = reconcile_tx.try_send(());

        let mut watcher = notify::recommended_watcher(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event) if matches!(event.kind, EventKind::Access(_)) => {}
                Ok(event) => {
                    debug!(kind, paths = ?event.paths, "Manifest change detected");
                    // Full means a resync is already pending.
                    let _ = reconcile_tx.try_send(());
                }
                Err(e) => warn!(kind, error = %e, "Manifest watcher error"),
            },
        )
        .map_err(|e| watch_error(Path::new(""), e))?;

        for path in &self.paths {
            watcher
                .watch(path, RecursiveMode::NonRecursive)
                .map_err(|e| watch_error(path, e))?;
        }

        let cancel = cancel.clone();
        tokio::spawn(async move {
            // Disk has no single-resource events; the sender only keeps the
            // channel open for the lifetime of the stream.
            let _events = events_tx;
            let _watcher = watcher;
            cancel.cancelled().await;
            debug!(kind, "Manifest watcher stopped");
        });

        Ok(StreamConn {
            events: events_rx,
            reconcile: reconcile_rx,
        })
    }
}

/// Manifest files directly inside `dir`, sorted by path.
async fn manifest_files(dir: &Path) -> Result<Vec<PathBuf>, LoaderError> {
    let io_err = |source| LoaderError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(io_err)?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let path = entry.path();
        let is_manifest = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| MANIFEST_EXTENSIONS.contains(&e));
        if !is_manifest {
            continue;
        }
        // Follows symlinks, so mounted config volumes are picked up.
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|source| LoaderError::Io {
                path: path.clone(),
                source,
            })?;
        if meta.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn decode_documents(path: &Path, raw: &str) -> Result<Vec<serde_json::Value>, LoaderError> {
    if path.extension().and_then(|e| e.to_str()) == Some("json") {
        let doc: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| decode_error(path, e))?;
        return Ok(vec![doc]);
    }

    let mut docs = Vec::new();
    for document in serde_yaml::Deserializer::from_str(raw) {
        let doc =
            serde_json::Value::deserialize(document).map_err(|e| decode_error(path, e))?;
        if !doc.is_null() {
            docs.push(doc);
        }
    }
    Ok(docs)
}

fn decode_error(path: &Path, e: impl std::fmt::Display) -> LoaderError {
    LoaderError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

fn watch_error(path: &Path, e: notify::Error) -> LoaderError {
    LoaderError::Watch {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

/// Keep one entry per name. The later definition wins but keeps the
/// position of the first.
fn dedupe<T: Resource>(items: Vec<T>) -> Vec<T> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(items.len());
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        match index.get(item.name()) {
            Some(&i) => {
                warn!(kind = T::KIND, name = item.name(), "Duplicate manifest, later definition wins");
                out[i] = item;
            }
            None => {
                index.insert(item.name().to_string(), out.len());
                out.push(item);
            }
        }
    }
    out
}
