//! Persisted spec store.
//!
//! [`SpecStore`] is the sole in-process authority over the spec JSON file.
//! The file is the durable source of truth: every read decodes it fresh from
//! disk, so an out-of-band edit is visible to the next call. A shared lock
//! guards reads and an exclusive lock covers the whole read-mutate-write
//! cycle of [`SpecStore::update`], so readers never observe a partially
//! written document and concurrent updates serialize.
//!
//! The lock is in-process only. A second OS process writing the same path is
//! outside the operational contract (one owning process per spec file).

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::spec::Spec;

/// Errors returned by [`SpecStore`] operations.
#[derive(Debug, Error)]
pub enum StoreError {
  /// The spec file could not be read.
  #[error("failed to read spec file: {0}")]
  Read(#[source] io::Error),

  /// The spec file could not be written.
  #[error("failed to write spec file: {0}")]
  Write(#[source] io::Error),

  /// The persisted document is malformed.
  #[error("failed to decode spec file: {0}")]
  Decode(#[source] serde_json::Error),

  /// The in-memory document could not be encoded.
  #[error("failed to encode spec: {0}")]
  Encode(#[source] serde_json::Error),

  /// A mutator rejected the edit; nothing was written.
  #[error("invalid spec update: {0}")]
  Validation(String),
}

/// Durable, lock-guarded store for the persisted [`Spec`] document.
#[derive(Debug)]
pub struct SpecStore {
  path: PathBuf,
  lock: RwLock<()>,
}

impl SpecStore {
  /// Opens the store at `path`, seeding the file with `initial` if it does
  /// not exist yet. An existing file is left untouched.
  ///
  /// Seeding happens synchronously so the file exists before the store is
  /// handed to any other component.
  pub fn open(path: impl Into<PathBuf>, initial: Spec) -> Result<Self, StoreError> {
    let path = path.into();
    if !path.exists() {
      info!(path = %path.display(), "seeding spec file with defaults");
      let raw = encode(&initial)?;
      std::fs::write(&path, raw).map_err(StoreError::Write)?;
    }
    Ok(Self {
      path,
      lock: RwLock::new(()),
    })
  }

  /// Path of the underlying spec file.
  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Reads and decodes the document fresh from disk under a shared lock.
  pub async fn spec(&self) -> Result<Spec, StoreError> {
    let _guard = self.lock.read().await;
    read_spec(&self.path).await
  }

  /// Applies `mutator` to the current document and writes the result back,
  /// all under one exclusive lock acquisition.
  ///
  /// If the mutator returns an error the update aborts before anything is
  /// written; the on-disk file is unchanged. Returns the new document on
  /// success.
  pub async fn update<F>(&self, mutator: F) -> Result<Spec, StoreError>
  where
    F: FnOnce(&mut Spec) -> Result<(), StoreError>,
  {
    let _guard = self.lock.write().await;

    let mut spec = read_spec(&self.path).await?;
    mutator(&mut spec)?;

    let raw = encode(&spec)?;
    tokio::fs::write(&self.path, raw).await.map_err(StoreError::Write)?;

    debug!(path = %self.path.display(), versions = spec.versions.len(), "spec updated");
    Ok(spec)
  }
}

async fn read_spec(path: &Path) -> Result<Spec, StoreError> {
  let raw = tokio::fs::read(path).await.map_err(StoreError::Read)?;
  if raw.is_empty() {
    // A zero-length file counts as the default document, not a decode error.
    return Ok(Spec::default());
  }
  serde_json::from_slice(&raw).map_err(StoreError::Decode)
}

fn encode(spec: &Spec) -> Result<Vec<u8>, StoreError> {
  serde_json::to_vec_pretty(spec).map_err(StoreError::Encode)
}
