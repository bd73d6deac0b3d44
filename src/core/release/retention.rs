//! Stale release selection.
//!
//! The completion mark (directory mtime) orders releases. The newest `keep`
//! survive, and the release the live link points at survives regardless of
//! its rank.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::command::{CommandLine, CommandSet};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseEntry {
    pub path: String,
    pub touched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetentionPolicy {
    pub keep: usize,
}

impl RetentionPolicy {
    pub fn keep(keep: usize) -> Self {
        Self { keep }
    }
}

fn normalize<'a>(path: &'a str, separators: &[char]) -> &'a str {
    let trimmed = path.trim_end_matches(separators);
    if trimmed.is_empty() {
        path
    } else {
        trimmed
    }
}

/// Releases to remove, oldest first.
///
/// `live_release` is the resolved target of the live link; when it is `None`
/// the caller could not determine it and only the `keep` newest survive.
pub fn select_stale(
    entries: &[ReleaseEntry],
    live_release: Option<&str>,
    policy: RetentionPolicy,
    separators: &[char],
) -> Vec<ReleaseEntry> {
    let live = live_release.map(|p| normalize(p, separators));

    let mut ordered: Vec<&ReleaseEntry> = entries.iter().collect();
    ordered.sort_by(|a, b| {
        b.touched_at
            .cmp(&a.touched_at)
            .then_with(|| b.path.cmp(&a.path))
    });

    let mut stale: Vec<ReleaseEntry> = ordered
        .into_iter()
        .skip(policy.keep)
        .filter(|entry| Some(normalize(&entry.path, separators)) != live)
        .cloned()
        .collect();

    stale.reverse();
    stale
}

/// One removal command per stale release.
pub fn prune_commands(commands: &dyn CommandSet, stale: &[ReleaseEntry]) -> Result<Vec<CommandLine>> {
    stale
        .iter()
        .map(|entry| commands.remove_command(&entry.path))
        .collect()
}
