use chrono::Utc;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::fs;

use deploycmd::command::{self as cmdset, CommandLine};
use deploycmd::defaults;
use deploycmd::error::RemoteCommandFailedDetails;
use deploycmd::release::{
    inventory, prune_commands, select_stale, PlannedStep, ReleaseEntry, ReleaseId, ReleaseSwitch,
    RetentionPolicy, SwitchReport,
};
use deploycmd::transport::Transport;
use deploycmd::{log_status, Error, OsFamily};

use super::{CmdResult, TargetArgs};

#[derive(Args)]
pub struct ReleaseArgs {
    #[command(subcommand)]
    command: ReleaseCommand,
}

#[derive(Subcommand)]
enum ReleaseCommand {
    /// Generate a timestamp release id
    Id {
        /// Also print the full release path inside this directory
        #[arg(long, value_name = "DIR")]
        releases_dir: Option<String>,
        /// Operating-system family used for the path separator
        #[arg(long, value_name = "FAMILY")]
        os: Option<String>,
    },
    /// Run the hook, mark the release complete, then point the live link at it
    Switch {
        /// Materialized release directory
        source: String,
        /// Live link path
        target: String,
        /// Hook script run inside the sandbox before the release is marked
        #[arg(long, value_name = "SCRIPT")]
        hook: Option<String>,
        /// Interpreter for the hook (empty selects the configured default)
        #[arg(long, default_value = "", requires = "hook")]
        hook_mode: String,
        /// Print the plan without running it
        #[arg(long)]
        dry_run: bool,
        #[command(flatten)]
        on: TargetArgs,
    },
    /// Point the live link back at an existing release
    Rollback {
        /// Release directory to restore
        release: String,
        /// Live link path
        target: String,
        /// Print the plan without running it
        #[arg(long)]
        dry_run: bool,
        #[command(flatten)]
        on: TargetArgs,
    },
    /// Remove stale releases, keeping the newest and the live one
    Prune {
        /// Directory holding one subdirectory per release
        releases_dir: String,
        /// Live link path; pruning aborts when it cannot be resolved
        #[arg(long)]
        link: String,
        /// Number of newest releases to keep (default from config)
        #[arg(long)]
        keep: Option<usize>,
        /// Print what would be removed without removing it
        #[arg(long)]
        dry_run: bool,
        #[command(flatten)]
        on: TargetArgs,
    },
}

#[derive(Debug, Serialize)]
pub struct SwitchOutput {
    pub source: String,
    pub target: String,
    pub dry_run: bool,
    pub plan: Vec<PlannedStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<SwitchReport>,
}

#[derive(Debug, Serialize)]
pub struct PruneOutput {
    pub releases_dir: String,
    pub link: String,
    pub live: String,
    pub keep: usize,
    pub dry_run: bool,
    pub listed: usize,
    pub removed: Vec<ReleaseEntry>,
    pub commands: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "command")]
pub enum ReleaseOutput {
    #[serde(rename = "release.id")]
    Id {
        id: ReleaseId,
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    #[serde(rename = "release.switch")]
    Switch(SwitchOutput),
    #[serde(rename = "release.rollback")]
    Rollback(SwitchOutput),
    #[serde(rename = "release.prune")]
    Prune(PruneOutput),
}

pub fn run(args: ReleaseArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<ReleaseOutput> {
    match args.command {
        ReleaseCommand::Id { releases_dir, os } => id(releases_dir.as_deref(), os.as_deref()),
        ReleaseCommand::Switch {
            source,
            target,
            hook,
            hook_mode,
            dry_run,
            on,
        } => {
            let output = switch(&source, &target, hook.as_deref(), &hook_mode, dry_run, &on, false)?;
            Ok((ReleaseOutput::Switch(output), 0))
        }
        ReleaseCommand::Rollback {
            release,
            target,
            dry_run,
            on,
        } => {
            let output = switch(&release, &target, None, "", dry_run, &on, true)?;
            Ok((ReleaseOutput::Rollback(output), 0))
        }
        ReleaseCommand::Prune {
            releases_dir,
            link,
            keep,
            dry_run,
            on,
        } => {
            let output = prune(&releases_dir, &link, keep, dry_run, &on)?;
            Ok((ReleaseOutput::Prune(output), 0))
        }
    }
}

fn id(releases_dir: Option<&str>, os: Option<&str>) -> CmdResult<ReleaseOutput> {
    let os = match os {
        Some(raw) => raw.parse::<OsFamily>()?,
        None => OsFamily::local(),
    };
    let id = ReleaseId::generate(Utc::now());
    let path = releases_dir.map(|dir| id.path_in(dir, os.separators()[0]));
    Ok((ReleaseOutput::Id { id, path }, 0))
}

fn switch(
    source: &str,
    target: &str,
    hook: Option<&str>,
    hook_mode: &str,
    dry_run: bool,
    on: &TargetArgs,
    rollback: bool,
) -> deploycmd::Result<SwitchOutput> {
    let os = on.os_family()?;
    let config = defaults::load_config_strict()?;
    let commands = cmdset::for_os(os, &config.defaults);

    let mut switch = if rollback {
        ReleaseSwitch::rollback(commands.as_ref(), source, target)?
    } else {
        ReleaseSwitch::new(commands.as_ref(), source, target)?
    };
    if let Some(script) = hook {
        switch = switch.with_hook(hook_mode, script)?;
    }

    let plan = switch.plan()?;
    let report = if dry_run {
        None
    } else {
        let transport = on.transport(&config.defaults)?;
        Some(switch.execute(transport.as_ref())?)
    };

    Ok(SwitchOutput {
        source: switch.source().to_string(),
        target: switch.target().to_string(),
        dry_run,
        plan,
        report,
    })
}

/// Run `line` and return its stdout, failing on a non-zero exit.
fn run_checked(transport: &dyn Transport, line: &CommandLine) -> deploycmd::Result<String> {
    let rendered = line.render();
    let output = transport.execute(&rendered)?;
    if !output.success {
        return Err(Error::remote_command_failed(RemoteCommandFailedDetails {
            command: rendered,
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
            target: transport.describe(),
        }));
    }
    Ok(output.stdout)
}

fn read_link_local(link: &str) -> deploycmd::Result<String> {
    let raw = fs::read_link(link).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("readlink {}", link)))
            .with_hint("Pruning needs the live link to exist so the live release is never removed")
    })?;
    Ok(raw.to_string_lossy().to_string())
}

/// Resolve the live link and pick stale releases, refusing whenever the live
/// release cannot be identified among `entries`.
fn select_for_prune(
    link: &str,
    raw_link: &str,
    entries: Vec<ReleaseEntry>,
    policy: RetentionPolicy,
    separators: &[char],
) -> deploycmd::Result<(String, Vec<ReleaseEntry>, Vec<ReleaseEntry>)> {
    let raw_link = raw_link.trim_end_matches(['\r', '\n']);
    if raw_link.trim().is_empty() {
        return Err(Error::remote_output_invalid("live link target", raw_link));
    }

    let live = inventory::resolve_link_target(link, raw_link, separators);
    let entries: Vec<ReleaseEntry> = entries
        .into_iter()
        .map(|entry| ReleaseEntry {
            path: inventory::normalize_lexically(&entry.path, separators),
            touched_at: entry.touched_at,
        })
        .collect();

    if !entries.iter().any(|entry| entry.path == live) {
        return Err(Error::validation_invalid_argument(
            "link",
            "The live link does not resolve to any listed release; refusing to prune",
            Some(live),
            None,
        )
        .with_hint("Pass the releases directory and link the same way (both absolute or both relative)"));
    }

    let stale = select_stale(&entries, Some(&live), policy, separators);
    Ok((live, entries, stale))
}

fn prune(
    releases_dir: &str,
    link: &str,
    keep: Option<usize>,
    dry_run: bool,
    on: &TargetArgs,
) -> deploycmd::Result<PruneOutput> {
    let os = on.os_family()?;
    let config = defaults::load_config_strict()?;
    let defaults = &config.defaults;
    let separators = os.separators();
    let policy = RetentionPolicy::keep(keep.unwrap_or(defaults.release.keep));
    let commands = cmdset::for_os(os, defaults);
    let transport = on.transport(defaults)?;

    let (entries, raw_link) = if on.host.is_none() && os == OsFamily::local() {
        (inventory::list_local(releases_dir)?, read_link_local(link)?)
    } else {
        let listing = run_checked(
            transport.as_ref(),
            &inventory::list_command(os, defaults, releases_dir)?,
        )?;
        let raw = run_checked(
            transport.as_ref(),
            &inventory::read_link_command(os, defaults, link)?,
        )?;
        (inventory::parse_listing(&listing)?, raw)
    };

    let (live, entries, stale) = select_for_prune(link, &raw_link, entries, policy, separators)?;
    let lines = prune_commands(commands.as_ref(), &stale)?;
    let rendered: Vec<String> = lines.iter().map(CommandLine::render).collect();

    if !dry_run {
        for (entry, line) in stale.iter().zip(&lines) {
            log_status!("prune", "Removing {} on {}", entry.path, transport.describe());
            run_checked(transport.as_ref(), line)?;
        }
    }

    Ok(PruneOutput {
        releases_dir: releases_dir.to_string(),
        link: link.to_string(),
        live,
        keep: policy.keep,
        dry_run,
        listed: entries.len(),
        removed: stale,
        commands: rendered,
    })
}
