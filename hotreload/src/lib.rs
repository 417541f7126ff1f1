//! hotreload: keeps a sidecar runtime's components and subscriptions
//! convergent with their source of truth.
//!
//! Each resource kind gets its own [`Reconciler`], which merges three wake-up
//! sources into one ordered stream of apply operations:
//! - single-resource events pushed by the loader's stream
//! - forced resync requests sent by the loader
//! - a 60 second resync ticker
//!
//! A resync lists the source of truth, diffs it against the tracked state in
//! the [`CompStore`] and applies the result in three waves: deletions, then
//! updates, then creations.
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use hotreload::{AllowAll, CompStore, DiskLoader, Healthz, Options, Reloader, SystemClock};
//! use tokio_util::sync::CancellationToken;
//!
//! let opts = Options {
//!     loader: Arc::new(DiskLoader::new(vec!["./components".into()], None)),
//!     store: Arc::new(CompStore::new()),
//!     processor: Arc::new(my_runtime),
//!     authorizer: Arc::new(AllowAll),
//!     healthz: Healthz::new(),
//!     clock: Arc::new(SystemClock),
//! };
//! Reloader::new(opts).run(&CancellationToken::new()).await?;
//! ```

pub mod authorizer;
pub mod clock;
pub mod compstore;
pub mod differ;
pub mod error;
pub mod healthz;
pub mod loader;
pub mod model;
pub mod processor;
pub mod reconciler;
pub mod reloader;
pub mod resource;

pub use authorizer::{AccessList, AllowAll, Authorizer};
pub use clock::{Clock, FakeClock, SystemClock, Ticker};
pub use compstore::{CompStore, ResourceStore};
pub use differ::{diff, DiffResult};
pub use error::{Error, LoaderError, ProcessorError, Result};
pub use healthz::{Healthz, Target};
pub use loader::disk::DiskLoader;
pub use loader::memory::{MemoryLoader, MemoryLoaders};
pub use loader::{Event, EventType, Loader, Loaders, StreamConn};
pub use model::{Component, Subscription};
pub use processor::Processor;
pub use reconciler::{Manager, Options, Reconciler, RESYNC_PERIOD};
pub use reloader::Reloader;
pub use resource::Resource;
