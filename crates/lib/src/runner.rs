//! Single-flight build runner.
//!
//! [`BuildRunner`] cycles between two states, `Idle` and `Running`. The
//! transition into `Running` happens only in [`BuildRunner::run_build`],
//! under one exclusive lock acquisition; the transition back happens only
//! when the detached build task finishes. At most one builder subprocess
//! exists process-wide, enforced purely by this guard.
//!
//! A build runs as its own tokio task, decoupled from whatever request
//! triggered it: cancelling the request does not cancel the build, and
//! nothing that goes wrong mid-build can surface on an unrelated caller.
//! Failures are rendered into a terminal `finished` event instead.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::OpsConfig;
use crate::event::{BuildOutcome, BuildStatus, LogEvent};
use crate::hub::LogHub;
use crate::spec::BuilderSpec;
use crate::store::{SpecStore, StoreError};

/// Synchronous rejection of a build request while another build is running.
///
/// The request is not queued; the caller may retry once the hub delivers a
/// `finished` event or [`BuildRunner::status`] reports idle.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("build already running")]
pub struct AlreadyRunningError;

/// Failure inside a detached build run.
///
/// Never returned to callers; the runner converts it into the terminal
/// `finished` event's message and logs it.
#[derive(Debug, Error)]
pub enum BuildError {
  /// Loading the persisted spec failed.
  #[error(transparent)]
  Store(#[from] StoreError),

  /// The merged builder spec could not be encoded.
  #[error("failed to encode builder spec: {0}")]
  EncodeSpec(#[source] serde_json::Error),

  /// The merged builder spec could not be written.
  #[error("failed to write builder spec: {0}")]
  WriteSpec(#[source] io::Error),

  /// The builder executable could not be spawned.
  #[error("failed to spawn builder: {0}")]
  Spawn(#[source] io::Error),

  /// Reading the builder's output streams or exit status failed.
  #[error("failed to read builder output: {0}")]
  Stream(#[source] io::Error),

  /// A stream-drain task panicked or was aborted.
  #[error("log drain task failed: {0}")]
  Drain(#[from] tokio::task::JoinError),

  /// The builder ran but reported failure.
  #[error("builder exited with {0}")]
  Exit(std::process::ExitStatus),
}

struct Inner {
  config: OpsConfig,
  store: Arc<SpecStore>,
  hub: LogHub,
  status: Mutex<BuildStatus>,
}

/// Single-flight supervisor for the external builder subprocess.
///
/// Cheap to clone; all clones share one status guard.
#[derive(Clone)]
pub struct BuildRunner {
  inner: Arc<Inner>,
}

impl BuildRunner {
  pub fn new(config: OpsConfig, store: Arc<SpecStore>, hub: LogHub) -> Self {
    Self {
      inner: Arc::new(Inner {
        config,
        store,
        hub,
        status: Mutex::new(BuildStatus::Idle),
      }),
    }
  }

  /// Non-blocking snapshot of the current state. Never waits on a build.
  pub fn status(&self) -> BuildStatus {
    *self.lock_status()
  }

  /// Attempts the idle-to-running transition and schedules a detached build
  /// task. Returns immediately; callers observe the outcome through
  /// [`BuildRunner::status`] or a hub subscription.
  ///
  /// Must be called from within a tokio runtime.
  pub fn run_build(&self) -> Result<(), AlreadyRunningError> {
    {
      let mut status = self.lock_status();
      if *status == BuildStatus::Running {
        return Err(AlreadyRunningError);
      }
      *status = BuildStatus::Running;
    }

    info!("starting build process");
    let runner = self.clone();
    tokio::spawn(async move {
      runner.execute().await;
    });
    Ok(())
  }

  /// One full build cycle. Always resets the status to idle and publishes
  /// exactly one terminal event, whatever happens in between.
  async fn execute(&self) {
    self.inner.hub.publish(LogEvent::Started);
    let result = self.run_to_completion().await;
    self.finish(result);
  }

  async fn run_to_completion(&self) -> Result<(), BuildError> {
    let spec_path = self.prepare_spec_file().await?;
    let config = &self.inner.config;

    debug!(
      builder = %config.builder_binary.display(),
      spec = %spec_path.display(),
      "spawning builder"
    );
    let mut child = Command::new(&config.builder_binary)
      .arg("-s")
      .arg(&spec_path)
      .arg(&config.generated_dir)
      .arg(&config.workdir_dir)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .spawn()
      .map_err(BuildError::Spawn)?;

    let stdout = child
      .stdout
      .take()
      .ok_or_else(|| BuildError::Stream(io::Error::other("builder stdout was not captured")))?;
    let stderr = child
      .stderr
      .take()
      .ok_or_else(|| BuildError::Stream(io::Error::other("builder stderr was not captured")))?;

    // Both drains must complete before the exit status is consumed, so that
    // every captured line is published ahead of the terminal event.
    let stdout_drain = self.spawn_drain(stdout);
    let stderr_drain = self.spawn_drain(stderr);
    let (stdout_result, stderr_result) = tokio::join!(stdout_drain, stderr_drain);
    stdout_result?.map_err(BuildError::Stream)?;
    stderr_result?.map_err(BuildError::Stream)?;

    let status = child.wait().await.map_err(BuildError::Stream)?;
    if !status.success() {
      return Err(BuildError::Exit(status));
    }
    Ok(())
  }

  /// Merges the persisted spec with operationally-owned settings and writes
  /// the result to the well-known spec-file path.
  async fn prepare_spec_file(&self) -> Result<PathBuf, BuildError> {
    let config = &self.inner.config;
    let spec = self.inner.store.spec().await?;

    let merged = BuilderSpec {
      download_server_base: config.download_server_base.clone(),
      resources_url_base: config.resources_url_base.clone(),
      replace_download_urls: spec.replace_download_urls,
      exec_before_all: config.exec_before_all.clone(),
      exec_after_all: config.exec_after_all.clone(),
      versions: spec.versions,
    };
    let raw = serde_json::to_vec_pretty(&merged).map_err(BuildError::EncodeSpec)?;
    tokio::fs::write(&config.spec_file, raw)
      .await
      .map_err(BuildError::WriteSpec)?;
    Ok(config.spec_file.clone())
  }

  /// Forwards one output stream to the hub, line by line, until closure.
  fn spawn_drain<R>(&self, pipe: R) -> JoinHandle<io::Result<()>>
  where
    R: AsyncRead + Unpin + Send + 'static,
  {
    let hub = self.inner.hub.clone();
    tokio::spawn(async move {
      let mut lines = BufReader::new(pipe).lines();
      while let Some(line) = lines.next_line().await? {
        debug!(line = %line, "build log");
        hub.publish(LogEvent::Line(line));
      }
      Ok(())
    })
  }

  fn finish(&self, result: Result<(), BuildError>) {
    {
      let mut status = self.lock_status();
      *status = BuildStatus::Idle;
    }

    match result {
      Ok(()) => {
        info!("build finished successfully");
        self.inner.hub.publish(LogEvent::Finished(BuildOutcome::Success));
      }
      Err(err) => {
        error!(error = %err, "build failed");
        self
          .inner
          .hub
          .publish(LogEvent::Finished(BuildOutcome::Failure(err.to_string())));
      }
    }
  }

  fn lock_status(&self) -> MutexGuard<'_, BuildStatus> {
    self.inner.status.lock().unwrap_or_else(PoisonError::into_inner)
  }
}
