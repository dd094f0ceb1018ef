//! Build specification types.
//!
//! The [`Spec`] document is the admin-editable half of a build: which
//! version entries exist and whether downloadable artifacts are mirrored.
//! [`BuilderSpec`] is the merged document handed to the external builder,
//! combining the persisted [`Spec`] with operationally-owned settings.
//!
//! # Serialization
//!
//! Field names match the JSON the external builder decodes; do not rename
//! them without coordinating with the builder. Optional fields are omitted
//! from output when unset, except `versions`, which is always present: an
//! empty list means "no versions configured", never a missing key.

use serde::{Deserialize, Serialize};

/// Mod-loader variant a version entry targets.
///
/// Fixed set understood by the external builder; a document naming anything
/// else fails decoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Loader {
  #[default]
  Vanilla,
  Forge,
  Fabric,
  Neoforge,
}

/// Authentication backend kind for a version entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthKind {
  Mojang,
  Telegram,
  #[serde(rename = "ely.by")]
  ElyBy,
  Offline,
}

/// Authentication backend descriptor attached to a version entry.
///
/// Only the fields relevant to the chosen kind are set; the rest stay out of
/// the serialized document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthBackend {
  #[serde(rename = "type")]
  pub kind: AuthKind,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub auth_base_url: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub client_id: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub client_secret: Option<String>,
}

/// One file-inclusion rule, consumed only by the external builder.
///
/// The tri-state flags distinguish "explicitly on", "explicitly off", and
/// "builder default".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeRule {
  pub path: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub overwrite: Option<bool>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub recursive: Option<bool>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub delete_extra: Option<bool>,
}

/// One buildable target declared in the spec. Purely declarative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionSpec {
  pub name: String,

  pub minecraft_version: String,

  #[serde(default)]
  pub loader_name: Loader,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub loader_version: Option<String>,

  /// Source directory the include rules are resolved against. The builder
  /// ignores `include` when this is unset.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub include_from: Option<String>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub include: Vec<IncludeRule>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub auth_backend: Option<AuthBackend>,

  /// Recommended JVM memory limit, e.g. `"4096M"`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub recommended_xmx: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub exec_before: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub exec_after: Option<String>,
}

/// The persisted admin document.
///
/// Created with defaults at store initialization if no file exists, then
/// mutated in place through [`SpecStore::update`](crate::store::SpecStore::update)
/// for the lifetime of the process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Spec {
  #[serde(default)]
  pub replace_download_urls: bool,

  /// Always serialized, even when empty.
  #[serde(default)]
  pub versions: Vec<VersionSpec>,
}

impl Spec {
  /// Position of the version entry with the given name.
  pub fn version_index(&self, name: &str) -> Option<usize> {
    self.versions.iter().position(|v| v.name == name)
  }

  /// The version entry with the given name.
  pub fn find_version(&self, name: &str) -> Option<&VersionSpec> {
    self.versions.iter().find(|v| v.name == name)
  }
}

/// The merged document written for the external builder before each run.
///
/// User-editable fields come from the persisted [`Spec`]; the rest are
/// operationally owned (see [`OpsConfig`](crate::config::OpsConfig)).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuilderSpec {
  pub download_server_base: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub resources_url_base: Option<String>,

  #[serde(default)]
  pub replace_download_urls: bool,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub exec_before_all: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub exec_after_all: Option<String>,

  #[serde(default)]
  pub versions: Vec<VersionSpec>,
}
