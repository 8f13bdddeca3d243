/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Engine configuration and scripted producer scenario.
//!
//! The expected YAML structure is:
//! ```yaml
//! engine:
//!   max_message_len: 127
//!   thread_name_prefix: "display"
//! scenario:
//!   run_for_secs: 12
//!   requests:
//!     - at_ms: 0
//!       schedule: { seconds: 5, message_type: 2, message_number: 9, message: "hi" }
//!     - at_ms: 100
//!       create_worker: { message_type: 2 }
//!     - at_ms: 7000
//!       cancel: { message_number: 9 }
//! ```
//!
//! Both sections are optional; missing values fall back to their defaults.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::request::{CancelRequest, CreateWorkerRequest, ScheduleRequest, MAX_MESSAGE_LEN};

// ── Private YAML deserialization types ────────────────────────────────────────

/// Top-level wrapper that maps directly onto the YAML file layout.
#[derive(Debug, Deserialize)]
struct RawConfigFile {
    engine: Option<EngineConfig>,
    scenario: Option<Scenario>,
}

fn default_max_message_len() -> usize {
    MAX_MESSAGE_LEN
}

fn default_thread_name_prefix() -> String {
    String::from("display")
}

fn default_run_for_secs() -> u64 {
    10
}

// ── Public data structures ────────────────────────────────────────────────────

/// Tunables of the alarm engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Longest accepted Schedule message, in characters.
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,

    /// Display worker threads are named `<prefix>-<message type>`.
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_message_len: default_max_message_len(),
            thread_name_prefix: default_thread_name_prefix(),
        }
    }
}

/// One producer request of the scenario.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptedAction {
    Schedule(ScheduleRequest),
    CreateWorker(CreateWorkerRequest),
    Cancel(CancelRequest),
}

/// A producer request submitted `at_ms` milliseconds after start-up.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScriptedRequest {
    #[serde(default)]
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: ScriptedAction,
}

/// Requests the binary replays against a running engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Scenario {
    /// How long the binary keeps the engine running before shutdown.
    #[serde(default = "default_run_for_secs")]
    pub run_for_secs: u64,

    #[serde(default)]
    pub requests: Vec<ScriptedRequest>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            run_for_secs: default_run_for_secs(),
            requests: Vec::new(),
        }
    }
}

// ── ConfigFile ────────────────────────────────────────────────────────────────

/// Loads the engine configuration and scenario from a YAML file.
#[derive(Debug, Default)]
pub struct ConfigFile {
    pub engine: EngineConfig,
    pub scenario: Scenario,
}

impl ConfigFile {
    /// Creates a configuration holding only defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `path`, replacing any previously loaded values.
    ///
    /// Scenario requests are ordered by `at_ms` (stable, so requests sharing
    /// an offset keep their file order).
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or if the YAML is
    /// structurally invalid.
    pub fn load_from_file(&mut self, path: &Path) -> Result<()> {
        info!("Loading engine configuration from: {}", path.display());

        *self = Self::default();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open configuration file: {}", path.display()))?;

        let raw: RawConfigFile = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML file: {}", path.display()))?;

        match raw.engine {
            Some(engine) => self.engine = engine,
            None => warn!("No engine section in configuration file, using defaults"),
        }

        match raw.scenario {
            Some(mut scenario) => {
                scenario.requests.sort_by_key(|r| r.at_ms);
                self.scenario = scenario;
            }
            None => warn!("No scenario section in configuration file, nothing will be submitted"),
        }

        for req in &self.scenario.requests {
            debug!("  +{}ms {:?}", req.at_ms, req.action);
        }

        info!(
            max_message_len = self.engine.max_message_len,
            run_for_secs = self.scenario.run_for_secs,
            requests = self.scenario.requests.len(),
            "Engine configuration loaded"
        );

        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Helper: write a YAML string to a temp file and return it.
    fn yaml_tempfile(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn defaults_match_message_limit() {
        let cfg = ConfigFile::new();
        assert_eq!(cfg.engine.max_message_len, 127);
        assert_eq!(cfg.engine.thread_name_prefix, "display");
        assert_eq!(cfg.scenario.run_for_secs, 10);
        assert!(cfg.scenario.requests.is_empty());
    }

    #[test]
    fn load_full_scenario() {
        let yaml = r#"
engine:
  max_message_len: 64
  thread_name_prefix: "show"
scenario:
  run_for_secs: 12
  requests:
    - at_ms: 7000
      cancel: { message_number: 9 }
    - at_ms: 0
      schedule: { seconds: 5, message_type: 2, message_number: 9, message: "hi" }
    - at_ms: 100
      create_worker: { message_type: 2 }
"#;
        let f = yaml_tempfile(yaml);
        let mut cfg = ConfigFile::new();
        cfg.load_from_file(f.path()).unwrap();

        assert_eq!(cfg.engine.max_message_len, 64);
        assert_eq!(cfg.engine.thread_name_prefix, "show");
        assert_eq!(cfg.scenario.run_for_secs, 12);

        let offsets: Vec<u64> = cfg.scenario.requests.iter().map(|r| r.at_ms).collect();
        assert_eq!(offsets, vec![0, 100, 7000]);

        assert_eq!(
            cfg.scenario.requests[0].action,
            ScriptedAction::Schedule(ScheduleRequest {
                seconds: 5,
                message_type: 2,
                message_number: 9,
                message: "hi".into(),
            })
        );
        assert_eq!(
            cfg.scenario.requests[1].action,
            ScriptedAction::CreateWorker(CreateWorkerRequest { message_type: 2 })
        );
        assert_eq!(
            cfg.scenario.requests[2].action,
            ScriptedAction::Cancel(CancelRequest { message_number: 9 })
        );
    }

    #[test]
    fn missing_sections_use_defaults() {
        let f = yaml_tempfile("engine:\n  max_message_len: 20\n");
        let mut cfg = ConfigFile::new();
        cfg.load_from_file(f.path()).unwrap();

        assert_eq!(cfg.engine.max_message_len, 20);
        assert_eq!(cfg.engine.thread_name_prefix, "display");
        assert_eq!(cfg.scenario, Scenario::default());
    }

    #[test]
    fn missing_file_returns_error() {
        let mut cfg = ConfigFile::new();
        let result = cfg.load_from_file(Path::new("/nonexistent/path/alarms.yaml"));
        assert!(result.is_err());
        assert!(cfg.scenario.requests.is_empty());
    }

    #[test]
    fn malformed_yaml_returns_error() {
        let f = yaml_tempfile("scenario: { requests: [ { at_ms: 1, explode: {} } ] }");
        let mut cfg = ConfigFile::new();
        assert!(cfg.load_from_file(f.path()).is_err());
        assert!(cfg.scenario.requests.is_empty());
    }

    #[test]
    fn reload_replaces_previous_values() {
        let f1 = yaml_tempfile("engine:\n  max_message_len: 5\n");
        let f2 = yaml_tempfile("scenario:\n  run_for_secs: 3\n");

        let mut cfg = ConfigFile::new();
        cfg.load_from_file(f1.path()).unwrap();
        assert_eq!(cfg.engine.max_message_len, 5);

        cfg.load_from_file(f2.path()).unwrap();
        assert_eq!(cfg.engine.max_message_len, 127, "old value must be gone");
        assert_eq!(cfg.scenario.run_for_secs, 3);
    }
}
