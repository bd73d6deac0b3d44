use clap::Args;

use deploycmd::defaults::Defaults;
use deploycmd::transport::{LocalShell, SshTarget, SshTransport, Transport};
use deploycmd::OsFamily;

pub type CmdResult<T> = deploycmd::Result<(T, i32)>;

pub(crate) struct GlobalArgs {}

/// Where commands are built for and run.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Operating-system family of the target host (linux, darwin, windows, ...).
    /// Defaults to the family of this machine.
    #[arg(long, value_name = "FAMILY")]
    pub os: Option<String>,

    /// Run over SSH on user@host[:port] instead of the local shell
    #[arg(long, value_name = "USER@HOST")]
    pub host: Option<String>,

    /// SSH identity file (only with --host)
    #[arg(long, value_name = "PATH", requires = "host")]
    pub identity_file: Option<String>,
}

impl TargetArgs {
    pub fn os_family(&self) -> deploycmd::Result<OsFamily> {
        match &self.os {
            Some(raw) => raw.parse(),
            None => Ok(OsFamily::local()),
        }
    }

    pub fn transport(&self, defaults: &Defaults) -> deploycmd::Result<Box<dyn Transport>> {
        match &self.host {
            Some(spec) => {
                let target = SshTarget::parse(spec)?;
                let transport =
                    SshTransport::new(&target, self.identity_file.as_deref(), &defaults.ssh)?;
                Ok(Box::new(transport))
            }
            None => Ok(Box::new(LocalShell::new())),
        }
    }
}

pub mod command;
pub mod config;
pub mod release;

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    cmd: crate::Commands,
    global: &GlobalArgs,
) -> (deploycmd::Result<serde_json::Value>, i32) {
    crate::tty::status("deploycmd is working...");

    match cmd {
        crate::Commands::Command(args) => dispatch!(args, global, command),
        crate::Commands::Release(args) => dispatch!(args, global, release),
        crate::Commands::Config(args) => dispatch!(args, global, config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_defaults_to_local_family() {
        let args = TargetArgs::default();
        assert_eq!(args.os_family().unwrap(), OsFamily::local());
    }

    #[test]
    fn os_flag_is_parsed() {
        let args = TargetArgs {
            os: Some("Windows".to_string()),
            ..Default::default()
        };
        assert_eq!(args.os_family().unwrap(), OsFamily::Windows);
    }

    #[test]
    fn no_host_means_local_shell() {
        let transport = TargetArgs::default()
            .transport(&deploycmd::defaults::builtin_defaults())
            .unwrap();
        assert_eq!(transport.describe(), "local");
    }
}
