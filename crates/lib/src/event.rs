//! Shared build status and log event types.

use serde::{Deserialize, Serialize};

/// Build runner state. Exactly one instance exists per process, mutated only
/// by the runner under its exclusive lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
  Idle,
  Running,
}

impl std::fmt::Display for BuildStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      BuildStatus::Idle => write!(f, "idle"),
      BuildStatus::Running => write!(f, "running"),
    }
  }
}

/// Terminal result of one build run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
  Success,
  /// The rendered error message of whatever step failed.
  Failure(String),
}

/// Ephemeral message published to the hub during a build. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
  /// A build run was accepted and is starting.
  Started,
  /// One line captured from the builder's stdout or stderr.
  Line(String),
  /// The build run completed, successfully or not.
  Finished(BuildOutcome),
}

impl LogEvent {
  /// Message text pushed to admin clients.
  pub fn message(&self) -> String {
    match self {
      LogEvent::Started => "Starting build process...".to_string(),
      LogEvent::Line(text) => text.clone(),
      LogEvent::Finished(BuildOutcome::Success) => "Build finished successfully".to_string(),
      LogEvent::Finished(BuildOutcome::Failure(message)) => format!("Build failed: {message}"),
    }
  }

  /// Wire form delivered over the push channel to subscribers.
  pub fn to_wire(&self) -> WireMessage {
    WireMessage {
      kind: "build_log".to_string(),
      message: self.message(),
    }
  }
}

/// JSON shape every event takes on the wire, for line and terminal events
/// alike: `{ "type": "build_log", "message": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
  #[serde(rename = "type")]
  pub kind: String,
  pub message: String,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn status_serializes_lowercase() {
    assert_eq!(serde_json::to_value(BuildStatus::Idle).unwrap(), json!("idle"));
    assert_eq!(serde_json::to_value(BuildStatus::Running).unwrap(), json!("running"));
  }

  #[test]
  fn started_event_message() {
    assert_eq!(LogEvent::Started.message(), "Starting build process...");
  }

  #[test]
  fn terminal_event_messages() {
    assert_eq!(
      LogEvent::Finished(BuildOutcome::Success).message(),
      "Build finished successfully"
    );
    assert_eq!(
      LogEvent::Finished(BuildOutcome::Failure("spawn failed".to_string())).message(),
      "Build failed: spawn failed"
    );
  }

  #[test]
  fn wire_shape_is_tagged_build_log() {
    let wire = LogEvent::Line("syncing assets".to_string()).to_wire();
    assert_eq!(
      serde_json::to_value(&wire).unwrap(),
      json!({ "type": "build_log", "message": "syncing assets" })
    );
  }
}
