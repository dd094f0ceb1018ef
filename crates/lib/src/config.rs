//! Operational configuration.
//!
//! [`OpsConfig`] carries the settings the backend owns rather than the admin:
//! where the spec file lives, how to invoke the external builder, and the
//! base URLs merged into every builder spec. Loaded once from the
//! environment at process start.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors from loading the operational configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// A required environment variable is missing or empty.
  #[error("required environment variable {0} is not set")]
  MissingVar(&'static str),

  /// A configured directory could not be created.
  #[error("failed to create directory {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// A configured path could not be made absolute.
  #[error("failed to resolve path {path}: {source}")]
  ResolvePath {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Operationally-owned settings consumed by the runner's merge step and by
/// store initialization.
#[derive(Debug, Clone)]
pub struct OpsConfig {
  /// Path of the persisted spec document; also where the merged builder
  /// spec is written before each run.
  pub spec_file: PathBuf,

  /// External builder executable.
  pub builder_binary: PathBuf,

  /// Directory the builder writes generated artifacts to.
  pub generated_dir: PathBuf,

  /// Scratch directory handed to the builder.
  pub workdir_dir: PathBuf,

  /// Public base URL artifacts are served from. Required.
  pub download_server_base: String,

  /// Base URL for mirrored asset objects. Defaults to
  /// `<download_server_base>/assets/objects`.
  pub resources_url_base: Option<String>,

  /// Seeds `replace_download_urls` in the initial spec document only; the
  /// persisted value is authoritative afterwards.
  pub replace_download_urls: bool,

  /// Global hook run by the builder before all versions.
  pub exec_before_all: Option<String>,

  /// Global hook run by the builder after all versions.
  pub exec_after_all: Option<String>,
}

impl OpsConfig {
  /// Loads the configuration from the environment, creates the directories
  /// it names, and absolutizes all paths.
  ///
  /// `DOWNLOAD_SERVER_BASE` is required; everything else has a default.
  pub fn from_env() -> Result<Self, ConfigError> {
    let download_server_base =
      env_opt("DOWNLOAD_SERVER_BASE").ok_or(ConfigError::MissingVar("DOWNLOAD_SERVER_BASE"))?;

    let resources_url_base = env_opt("RESOURCES_URL_BASE").unwrap_or_else(|| {
      format!("{}/assets/objects", download_server_base.trim_end_matches('/'))
    });

    let mut config = Self {
      spec_file: PathBuf::from(env_or("SPEC_FILE", "/data/metadata/spec.json")),
      builder_binary: PathBuf::from(env_or("INSTANCE_BUILDER_BINARY", "instance_builder")),
      generated_dir: PathBuf::from(env_or("GENERATED_DIR", "/data/generated")),
      workdir_dir: PathBuf::from(env_or("WORKDIR_DIR", "/data/workdir")),
      download_server_base,
      resources_url_base: Some(resources_url_base),
      replace_download_urls: env_bool("REPLACE_DOWNLOAD_URLS", false),
      exec_before_all: env_opt("EXEC_BEFORE_ALL"),
      exec_after_all: env_opt("EXEC_AFTER_ALL"),
    };
    config.prepare_paths()?;
    Ok(config)
  }

  fn prepare_paths(&mut self) -> Result<(), ConfigError> {
    for dir in [&self.generated_dir, &self.workdir_dir] {
      ensure_dir(dir)?;
    }
    if let Some(parent) = self.spec_file.parent() {
      ensure_dir(parent)?;
    }

    self.spec_file = absolutize(&self.spec_file)?;
    self.generated_dir = absolutize(&self.generated_dir)?;
    self.workdir_dir = absolutize(&self.workdir_dir)?;
    Ok(())
  }
}

fn ensure_dir(path: &Path) -> Result<(), ConfigError> {
  std::fs::create_dir_all(path).map_err(|source| ConfigError::CreateDir {
    path: path.to_path_buf(),
    source,
  })
}

fn absolutize(path: &Path) -> Result<PathBuf, ConfigError> {
  std::path::absolute(path).map_err(|source| ConfigError::ResolvePath {
    path: path.to_path_buf(),
    source,
  })
}

fn env_or(key: &str, default: &str) -> String {
  env::var(key)
    .ok()
    .filter(|value| !value.is_empty())
    .unwrap_or_else(|| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
  env::var(key).ok().filter(|value| !value.is_empty())
}

fn env_bool(key: &str, default: bool) -> bool {
  match env::var(key).ok().as_deref().map(str::to_ascii_lowercase).as_deref() {
    Some("1" | "true" | "yes" | "on") => true,
    Some("0" | "false" | "no" | "off") => false,
    _ => default,
  }
}
