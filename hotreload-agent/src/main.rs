//! hotreload-agent: sidecar daemon that keeps a runtime's components and
//! subscriptions in sync with manifest directories on disk.
//!
//! Manifests are re-read whenever a watched directory changes and at least
//! once a minute. Changes are applied without restarting the process.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use hotreload::{
    AccessList, CompStore, Component, DiskLoader, Healthz, Options, Reloader, Resource,
    SystemClock,
};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod processor;

use processor::JournalProcessor;

/// Hot-reload agent
#[derive(Parser, Debug)]
#[command(name = "hotreload-agent", version, about)]
struct Args {
    /// Directory containing component and subscription manifests (repeatable)
    #[arg(long = "resources-path", default_value = "./components")]
    resources_paths: Vec<PathBuf>,

    /// Only load manifests from this namespace (manifests without one always load)
    #[arg(long)]
    namespace: Option<String>,

    /// Application ID this sidecar serves
    #[arg(long, default_value = "hotreload-agent")]
    app_id: String,

    /// Only allow these components to load (repeatable; empty allows all)
    #[arg(long = "allow-component")]
    allow_components: Vec<String>,

    /// Never load these components (repeatable)
    #[arg(long = "deny-component")]
    deny_components: Vec<String>,

    /// Do not hot-reload subscriptions
    #[arg(long)]
    disable_subscriptions: bool,
}

impl Args {
    fn access_list(&self) -> AccessList {
        let acl = self
            .allow_components
            .iter()
            .fold(AccessList::new(), |acl, name| acl.allow(Component::KIND, name));
        self.deny_components
            .iter()
            .fold(acl, |acl, name| acl.deny(Component::KIND, name))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hotreload=info,hotreload_agent=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting hotreload-agent for app {}", args.app_id);
    for path in &args.resources_paths {
        let meta = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("resources path {} is not accessible", path.display()))?;
        if !meta.is_dir() {
            anyhow::bail!("resources path {} is not a directory", path.display());
        }
        info!("Watching resources path: {}", path.display());
    }

    let processor = Arc::new(JournalProcessor::new());
    let healthz = Healthz::new();

    let opts = Options {
        loader: Arc::new(DiskLoader::new(
            args.resources_paths.clone(),
            args.namespace.clone(),
        )),
        store: Arc::new(CompStore::new()),
        processor: processor.clone(),
        authorizer: Arc::new(args.access_list()),
        healthz: healthz.clone(),
        clock: Arc::new(SystemClock),
    };

    let reloader = if args.disable_subscriptions {
        info!("Subscription hot reloading disabled");
        Reloader::components_only(opts)
    } else {
        Reloader::new(opts)
    };

    let cancel = CancellationToken::new();

    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
            _ = sigint.recv() => info!("Received SIGINT, shutting down"),
        }
        shutdown.cancel();
    });

    tokio::spawn(report_ready(healthz, cancel.clone()));

    reloader
        .run(&cancel)
        .await
        .context("hot reloader stopped with an error")?;

    let running = processor.running();
    info!(count = running.len(), "hotreload-agent stopped");
    for name in running {
        info!("Still running at shutdown: {}", name);
    }
    Ok(())
}

/// Log once every reconciler is streaming.
async fn report_ready(healthz: Healthz, cancel: CancellationToken) {
    tokio::select! {
        _ = healthz.wait_ready() => info!("All reconcilers ready"),
        _ = cancel.cancelled() => {
            let pending = healthz.not_ready();
            if !pending.is_empty() {
                warn!("Shut down before ready: {}", pending.join(", "));
            }
        }
    }
}
