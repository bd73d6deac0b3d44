//! Release switch protocol.
//!
//! A release goes live in a fixed order:
//!
//! 1. the release directory is materialized (by the caller)
//! 2. an optional hook script runs inside the sandbox
//! 3. the directory's modification time is touched as the completion mark
//! 4. the live link is swapped to the release in one rename
//! 5. later, stale releases are removed (see [`retention`])
//!
//! A failing step stops the sequence, so nothing before step 4 can disturb
//! the release that is currently live.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

use crate::command::{CommandLine, CommandSet};
use crate::error::{Error, ReleaseStepFailedDetails, Result};
use crate::transport::Transport;
use crate::utils::validation;

pub mod inventory;
pub mod retention;

pub use retention::{prune_commands, select_stale, ReleaseEntry, RetentionPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Hook,
    MarkComplete,
    GoLive,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Hook => "hook",
            StepKind::MarkComplete => "mark_complete",
            StepKind::GoLive => "go_live",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStep {
    pub kind: StepKind,
    pub command: CommandLine,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutedStep {
    pub kind: StepKind,
    pub command: String,
    pub exit_code: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SwitchReport {
    pub source: String,
    pub target: String,
    pub host: String,
    pub steps: Vec<ExecutedStep>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Hook {
    mode: String,
    script: String,
}

/// Builder for one release switch against one host.
pub struct ReleaseSwitch<'a> {
    commands: &'a dyn CommandSet,
    source: String,
    target: String,
    hook: Option<Hook>,
}

impl<'a> ReleaseSwitch<'a> {
    pub fn new(commands: &'a dyn CommandSet, source: &str, target: &str) -> Result<Self> {
        let source = validation::require_path(source, "source_path")?;
        let target = validation::require_path(target, "target_path")?;

        let separators = commands.os().separators();
        if source.trim_end_matches(separators) == target.trim_end_matches(separators) {
            return Err(Error::validation_invalid_argument(
                "target_path",
                "The live link cannot point at itself",
                Some(target.to_string()),
                None,
            ));
        }

        Ok(Self {
            commands,
            source: source.to_string(),
            target: target.to_string(),
            hook: None,
        })
    }

    /// Switch the live link back to an already-built release.
    ///
    /// The release is touched again so retention treats it as the freshest.
    pub fn rollback(commands: &'a dyn CommandSet, release: &str, target: &str) -> Result<Self> {
        Self::new(commands, release, target)
    }

    /// Run `script` with the `mode` interpreter before the release is marked.
    pub fn with_hook(mut self, mode: &str, script: &str) -> Result<Self> {
        let script = validation::require_path(script, "hook_script")?;
        self.hook = Some(Hook {
            mode: mode.to_string(),
            script: script.to_string(),
        });
        Ok(self)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn plan(&self) -> Result<Vec<PlannedStep>> {
        let mut steps = Vec::with_capacity(3);

        if let Some(hook) = &self.hook {
            steps.push(PlannedStep {
                kind: StepKind::Hook,
                command: self.commands.script_command(&hook.mode, &hook.script)?,
            });
        }

        steps.push(PlannedStep {
            kind: StepKind::MarkComplete,
            command: self.commands.touch_command(&self.source)?,
        });
        steps.push(PlannedStep {
            kind: StepKind::GoLive,
            command: self.commands.symlink_command(&self.source, &self.target)?,
        });

        Ok(steps)
    }

    /// Run the plan in order, stopping at the first step that fails.
    pub fn execute(&self, transport: &dyn Transport) -> Result<SwitchReport> {
        let steps = self.plan()?;
        let host = transport.describe();
        let mut executed = Vec::with_capacity(steps.len());

        for step in steps {
            let rendered = step.command.render();
            log_status!("release", "{} on {}: {}", step.kind.as_str(), host, rendered);

            let output = transport.execute(&rendered)?;
            if !output.success {
                log_status!(
                    "release",
                    "{} failed with exit code {}; stopping before the live link changes further",
                    step.kind.as_str(),
                    output.exit_code
                );
                return Err(Error::release_step_failed(ReleaseStepFailedDetails {
                    step: step.kind.as_str().to_string(),
                    command: rendered,
                    exit_code: output.exit_code,
                    stdout: output.stdout,
                    stderr: output.stderr,
                    target: host,
                }));
            }

            executed.push(ExecutedStep {
                kind: step.kind,
                command: rendered,
                exit_code: output.exit_code,
            });
        }

        log_status!("release", "{} is live at {}", self.source, self.target);

        Ok(SwitchReport {
            source: self.source.clone(),
            target: self.target.clone(),
            host,
            steps: executed,
        })
    }
}

/// Validated release directory name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ReleaseId(String);

fn release_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("static regex"))
}

impl ReleaseId {
    /// Timestamp id such as `20240101120000`.
    pub fn generate(now: DateTime<Utc>) -> Self {
        Self(now.format("%Y%m%d%H%M%S").to_string())
    }

    pub fn parse(value: &str) -> Result<Self> {
        if value == "." || value == ".." || !release_id_pattern().is_match(value) {
            return Err(Error::validation_invalid_argument(
                "release_id",
                "Release ids may only contain letters, digits, '.', '_' and '-'",
                Some(value.to_string()),
                None,
            ));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Full path of this release inside `releases_dir`.
    pub fn path_in(&self, releases_dir: &str, separator: char) -> String {
        format!(
            "{}{}{}",
            releases_dir.trim_end_matches(separator),
            separator,
            self.0
        )
    }
}

impl std::fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
