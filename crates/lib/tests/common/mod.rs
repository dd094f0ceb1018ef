//! Shared fixtures for orchestration tests.
//!
//! Builds a fully wired store/hub/runner against a temporary data directory
//! and a fake builder script standing in for the external builder binary.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::time::timeout;

use basalt_lib::{BuildRunner, LogEvent, LogHub, OpsConfig, Spec, SpecStore, Subscription};

/// Everything a test needs to drive one backend instance.
pub struct Harness {
  /// Keeps the temporary data directory alive for the harness lifetime.
  _dir: TempDir,
  pub config: OpsConfig,
  pub store: Arc<SpecStore>,
  pub hub: LogHub,
  pub runner: BuildRunner,
}

impl Harness {
  /// Harness whose builder prints the given lines and exits with `exit_code`.
  pub fn with_echo_builder(stdout: &[String], stderr: &[String], exit_code: i32) -> Self {
    let dir = TempDir::new().unwrap();
    let script = write_echo_script(dir.path(), stdout, stderr, exit_code);
    Self::assemble(dir, script)
  }

  /// Harness whose builder prints [`WAITING_BUILDER_BANNER`], blocks until
  /// the returned release file is created, then exits successfully.
  pub fn with_waiting_builder() -> (Self, PathBuf) {
    let dir = TempDir::new().unwrap();
    let release = dir.path().join("release");
    let script = write_waiting_script(dir.path(), &release);
    (Self::assemble(dir, script), release)
  }

  /// Harness pointing at a builder binary that does not exist.
  pub fn with_missing_builder() -> Self {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("no-such-builder");
    Self::assemble(dir, missing)
  }

  fn assemble(dir: TempDir, builder: PathBuf) -> Self {
    let metadata_dir = dir.path().join("metadata");
    let generated_dir = dir.path().join("generated");
    let workdir_dir = dir.path().join("workdir");
    for d in [&metadata_dir, &generated_dir, &workdir_dir] {
      std::fs::create_dir_all(d).unwrap();
    }

    let config = OpsConfig {
      spec_file: metadata_dir.join("spec.json"),
      builder_binary: builder,
      generated_dir,
      workdir_dir,
      download_server_base: "https://files.example.com".to_string(),
      resources_url_base: Some("https://files.example.com/assets/objects".to_string()),
      replace_download_urls: false,
      exec_before_all: None,
      exec_after_all: None,
    };

    let initial = Spec {
      replace_download_urls: config.replace_download_urls,
      versions: vec![],
    };
    let store = Arc::new(SpecStore::open(&config.spec_file, initial).unwrap());
    let hub = LogHub::new();
    let runner = BuildRunner::new(config.clone(), store.clone(), hub.clone());

    Self {
      _dir: dir,
      config,
      store,
      hub,
      runner,
    }
  }
}

/// Collects events until (and including) the terminal `finished` event.
pub async fn collect_until_finished(sub: &mut Subscription) -> Vec<LogEvent> {
  let mut events = Vec::new();
  loop {
    let event = timeout(Duration::from_secs(30), sub.recv())
      .await
      .expect("timed out waiting for build events")
      .expect("hub closed before the terminal event");
    let done = matches!(event, LogEvent::Finished(_));
    events.push(event);
    if done {
      return events;
    }
  }
}

pub fn lines(prefix: &str, count: usize) -> Vec<String> {
  (0..count).map(|i| format!("{prefix} {i}")).collect()
}

/// First line the waiting builder prints, marking that the subprocess is up
/// (and therefore that the merged spec file has already been written).
pub const WAITING_BUILDER_BANNER: &str = "builder waiting for release";

/// Receives events until the waiting builder's banner line arrives.
pub async fn wait_for_banner(sub: &mut Subscription) {
  loop {
    let event = timeout(Duration::from_secs(30), sub.recv())
      .await
      .expect("timed out waiting for the builder banner")
      .expect("hub closed before the builder banner");
    if event == LogEvent::Line(WAITING_BUILDER_BANNER.to_string()) {
      return;
    }
  }
}

#[cfg(unix)]
fn write_echo_script(dir: &Path, stdout: &[String], stderr: &[String], exit_code: i32) -> PathBuf {
  let mut body = String::from("#!/bin/sh\n");
  for line in stdout {
    body.push_str(&format!("echo \"{line}\"\n"));
  }
  for line in stderr {
    body.push_str(&format!("echo \"{line}\" >&2\n"));
  }
  body.push_str(&format!("exit {exit_code}\n"));
  write_script(dir, "builder.sh", &body)
}

#[cfg(windows)]
fn write_echo_script(dir: &Path, stdout: &[String], stderr: &[String], exit_code: i32) -> PathBuf {
  let mut body = String::from("@echo off\r\n");
  for line in stdout {
    body.push_str(&format!("echo {line}\r\n"));
  }
  for line in stderr {
    body.push_str(&format!("echo {line} 1>&2\r\n"));
  }
  body.push_str(&format!("exit /b {exit_code}\r\n"));
  write_script(dir, "builder.cmd", &body)
}

#[cfg(unix)]
fn write_waiting_script(dir: &Path, release: &Path) -> PathBuf {
  let body = format!(
    "#!/bin/sh\necho \"{WAITING_BUILDER_BANNER}\"\nwhile [ ! -f \"{}\" ]; do sleep 0.1; done\nexit 0\n",
    release.display()
  );
  write_script(dir, "builder.sh", &body)
}

#[cfg(windows)]
fn write_waiting_script(dir: &Path, release: &Path) -> PathBuf {
  let body = format!(
    "@echo off\r\necho {WAITING_BUILDER_BANNER}\r\n:wait\r\nif not exist \"{}\" (\r\n  ping -n 2 127.0.0.1 >nul\r\n  goto wait\r\n)\r\nexit /b 0\r\n",
    release.display()
  );
  write_script(dir, "builder.cmd", &body)
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
  let path = dir.join(name);
  std::fs::write(&path, body).unwrap();
  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
  }
  path
}
