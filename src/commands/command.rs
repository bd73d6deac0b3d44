use clap::{Args, Subcommand};
use serde::Serialize;

use deploycmd::command::{self as cmdset, CommandLine, Invocation, ShellDialect};
use deploycmd::{defaults, OsFamily};

use super::CmdResult;

#[derive(Args)]
pub struct CommandArgs {
    #[command(subcommand)]
    command: CommandCommand,

    /// Operating-system family of the target host (linux, darwin, windows, ...).
    /// Defaults to the family of this machine.
    #[arg(long, global = true, value_name = "FAMILY")]
    os: Option<String>,
}

#[derive(Subcommand)]
enum CommandCommand {
    /// Run a script with an interpreter inside the platform sandbox
    Script {
        /// Script path on the target host
        script: String,
        /// Interpreter (e.g. "bash -e"); empty selects the configured default
        #[arg(long, default_value = "")]
        mode: String,
    },
    /// Mark a release directory complete by touching its modification time
    Touch {
        /// Release directory
        dir: String,
    },
    /// Atomically point a link at a release
    Symlink {
        /// Release directory the link should resolve to
        source: String,
        /// Link path
        target: String,
    },
    /// Forced, recursive removal that tolerates a missing path
    Remove {
        /// Path to remove
        path: String,
    },
    /// Show the link source a symlink command would embed
    Rewrite {
        /// Release directory
        source: String,
        /// Link path
        target: String,
    },
}

#[derive(Serialize)]
pub struct RenderedCommand {
    pub operation: &'static str,
    pub os: OsFamily,
    pub dialect: ShellDialect,
    pub program: String,
    pub steps: Vec<Invocation>,
    pub rendered: String,
}

#[derive(Serialize)]
pub struct RewriteOutput {
    pub operation: &'static str,
    pub os: OsFamily,
    pub source: String,
    pub target: String,
    pub link_source: String,
    pub relative: bool,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum CommandOutput {
    Rendered(RenderedCommand),
    Rewrite(RewriteOutput),
}

fn rendered(operation: &'static str, os: OsFamily, line: CommandLine) -> CommandOutput {
    CommandOutput::Rendered(RenderedCommand {
        operation,
        os,
        dialect: line.dialect,
        program: line.program().to_string(),
        rendered: line.render(),
        steps: line.steps,
    })
}

pub fn run(args: CommandArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<CommandOutput> {
    let os = match &args.os {
        Some(raw) => raw.parse::<OsFamily>()?,
        None => OsFamily::local(),
    };
    let config = defaults::load_config_strict()?;
    let commands = cmdset::for_os(os, &config.defaults);

    let output = match args.command {
        CommandCommand::Script { script, mode } => {
            rendered("script", os, commands.script_command(&mode, &script)?)
        }
        CommandCommand::Touch { dir } => rendered("touch", os, commands.touch_command(&dir)?),
        CommandCommand::Symlink { source, target } => {
            rendered("symlink", os, commands.symlink_command(&source, &target)?)
        }
        CommandCommand::Remove { path } => rendered("remove", os, commands.remove_command(&path)?),
        CommandCommand::Rewrite { source, target } => {
            let link_source = commands.rewrite_source(&source, &target);
            CommandOutput::Rewrite(RewriteOutput {
                operation: "rewrite",
                os,
                relative: link_source != source,
                source,
                target,
                link_source,
            })
        }
    };

    Ok((output, 0))
}
