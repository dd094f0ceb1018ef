//! basalt-lib: build-orchestration core for a launcher admin backend.
//!
//! Three components cooperate here:
//! - [`SpecStore`]: durable, lock-guarded store for the persisted build
//!   specification document
//! - [`BuildRunner`]: single-flight supervisor for the external builder
//!   subprocess
//! - [`LogHub`]: in-memory fan-out of build log events to live subscribers
//!
//! Construct one of each at process start and pass them by handle into the
//! serving layer; none of them is reachable through global state. A typical
//! wiring:
//!
//! ```no_run
//! use std::sync::Arc;
//! use basalt_lib::{BuildRunner, LogHub, OpsConfig, Spec, SpecStore};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = OpsConfig::from_env()?;
//! let initial = Spec {
//!   replace_download_urls: config.replace_download_urls,
//!   versions: vec![],
//! };
//! let store = Arc::new(SpecStore::open(&config.spec_file, initial)?);
//! let hub = LogHub::new();
//! let runner = BuildRunner::new(config, store.clone(), hub.clone());
//! # let _ = runner;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod event;
pub mod hub;
pub mod runner;
pub mod spec;
pub mod store;

pub use config::{ConfigError, OpsConfig};
pub use event::{BuildOutcome, BuildStatus, LogEvent, WireMessage};
pub use hub::{LogHub, SubscriberId, Subscription};
pub use runner::{AlreadyRunningError, BuildError, BuildRunner};
pub use spec::{AuthBackend, AuthKind, BuilderSpec, IncludeRule, Loader, Spec, VersionSpec};
pub use store::{SpecStore, StoreError};
