//! Command execution for callers of the command layer.
//!
//! The command builders never run anything; this module is what the CLI and
//! the release runner hand rendered commands to.

use crate::defaults::SshConfig;
use crate::error::{Error, Result};
use serde::Serialize;
use std::process::{Command, Stdio};

#[derive(Debug, Clone, Serialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: i32,
}

/// Something that can run a rendered command on one host.
///
/// Spawn and connection failures are `Err`; a command that ran and exited
/// non-zero is `Ok` with `success == false`.
pub trait Transport {
    fn execute(&self, command: &str) -> Result<CommandOutput>;

    /// Human-readable target, used in logs and error details.
    fn describe(&self) -> String;
}

/// Runs commands through the local shell (`sh -c`, or `cmd /C` on Windows).
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalShell;

impl LocalShell {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for LocalShell {
    fn execute(&self, command: &str) -> Result<CommandOutput> {
        execute_local_command(command)
    }

    fn describe(&self) -> String {
        "local".to_string()
    }
}

pub fn execute_local_command(command: &str) -> Result<CommandOutput> {
    #[cfg(windows)]
    let mut cmd = {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    };

    #[cfg(not(windows))]
    let mut cmd = {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    };

    let out = cmd
        .stdin(Stdio::null())
        .output()
        .map_err(|e| Error::internal_io(e.to_string(), Some("spawn local shell".to_string())))?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&out.stdout).to_string(),
        stderr: String::from_utf8_lossy(&out.stderr).to_string(),
        success: out.status.success(),
        exit_code: out.status.code().unwrap_or(-1),
    })
}

/// Parsed `user@host[:port]` SSH destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub user: String,
    pub host: String,
    pub port: Option<u16>,
}

impl SshTarget {
    pub fn parse(spec: &str) -> Result<Self> {
        let invalid = |problem: &str| {
            Error::validation_invalid_argument("host", problem, Some(spec.to_string()), None)
                .with_hint("Expected user@host or user@host:port")
        };

        let (user, rest) = spec.split_once('@').ok_or_else(|| invalid("Missing user"))?;
        if user.is_empty() {
            return Err(invalid("Missing user"));
        }

        // Bracketed IPv6: user@[::1]:2222
        let (host, port) = if let Some(inner) = rest.strip_prefix('[') {
            let (host, after) = inner
                .split_once(']')
                .ok_or_else(|| invalid("Unclosed '[' in host"))?;
            let port = match after.strip_prefix(':') {
                Some(p) => Some(p),
                None if after.is_empty() => None,
                None => return Err(invalid("Unexpected text after host")),
            };
            (host, port)
        } else {
            match rest.rsplit_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (rest, None),
            }
        };

        if host.is_empty() {
            return Err(invalid("Missing host"));
        }

        let port = port
            .map(|p| p.parse::<u16>().map_err(|_| invalid("Port must be a number from 1 to 65535")))
            .transpose()?;
        if port == Some(0) {
            return Err(invalid("Port must be a number from 1 to 65535"));
        }

        Ok(Self {
            user: user.to_string(),
            host: host.to_string(),
            port,
        })
    }
}

/// Runs commands on a remote host through the system `ssh` binary.
pub struct SshTransport {
    pub host: String,
    pub user: String,
    pub port: u16,
    pub identity_file: Option<String>,
    pub connect_timeout_secs: u32,
    pub max_attempts: u32,
    /// When true, all commands run locally instead of over SSH.
    /// Set automatically when the host is localhost/127.0.0.1/::1.
    pub is_local: bool,
}

impl SshTransport {
    pub fn new(target: &SshTarget, identity_file: Option<&str>, config: &SshConfig) -> Result<Self> {
        let identity_file = match identity_file {
            Some(path) if !path.is_empty() => {
                let expanded = shellexpand::tilde(path).to_string();
                if !std::path::Path::new(&expanded).exists() {
                    return Err(Error::ssh_identity_file_not_found(
                        target.host.clone(),
                        expanded,
                    ));
                }
                Some(expanded)
            }
            _ => None,
        };

        let is_local = is_local_host(&target.host);
        if is_local {
            log_status!("ssh", "Host '{}' is localhost, using local execution", target.host);
        }

        Ok(Self {
            host: target.host.clone(),
            user: target.user.clone(),
            port: target.port.unwrap_or(config.default_port),
            identity_file,
            connect_timeout_secs: config.connect_timeout_secs,
            max_attempts: config.max_attempts.max(1),
            is_local,
        })
    }

    fn build_ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(identity_file) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity_file.clone());
        }

        if self.port != 22 {
            args.push("-p".to_string());
            args.push(self.port.to_string());
        }

        // Never prompt, and give up on stalled connections
        args.extend([
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout_secs),
            "-o".to_string(),
            "ServerAliveInterval=15".to_string(),
            "-o".to_string(),
            "ServerAliveCountMax=3".to_string(),
        ]);

        args.push(format!("{}@{}", self.user, self.host));
        args.push(command.to_string());

        args
    }

    fn execute_once(&self, command: &str) -> Result<CommandOutput> {
        let out = Command::new("ssh")
            .args(self.build_ssh_args(command))
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::ssh_connect_failed(self.describe(), e.to_string()))?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&out.stdout).to_string(),
            stderr: String::from_utf8_lossy(&out.stderr).to_string(),
            success: out.status.success(),
            exit_code: out.status.code().unwrap_or(-1),
        })
    }
}

impl Transport for SshTransport {
    fn execute(&self, command: &str) -> Result<CommandOutput> {
        // No connection to retry; the command itself is never re-run
        if self.is_local {
            return execute_local_command(command);
        }

        let backoff_secs = [0, 2, 5]; // delays before retry 1, 2, 3

        let mut attempt = 0;
        loop {
            let result = self.execute_once(command)?;
            attempt += 1;

            // Only retry on transient connection errors, not command failures
            if result.success || attempt >= self.max_attempts || !is_transient_ssh_error(&result) {
                return Ok(result);
            }

            let delay = backoff_secs.get(attempt as usize).copied().unwrap_or(5);
            log_status!(
                "ssh",
                "Connection failed (attempt {}/{}), retrying in {}s...",
                attempt,
                self.max_attempts,
                delay
            );
            std::thread::sleep(std::time::Duration::from_secs(delay));
        }
    }

    fn describe(&self) -> String {
        if self.port == 22 {
            format!("{}@{}", self.user, self.host)
        } else {
            format!("{}@{}:{}", self.user, self.host, self.port)
        }
    }
}

/// Check if a host address refers to the local machine.
pub fn is_local_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}

/// Check if an SSH failure is a transient connection error worth retrying.
///
/// `ssh` exits 255 on its own errors, but a remote command can exit 255 too,
/// so the exit code alone never triggers a retry: stderr must also carry a
/// connection-level message from `ssh` itself.
fn is_transient_ssh_error(output: &CommandOutput) -> bool {
    if output.exit_code != 255 {
        return false;
    }
    let stderr = output.stderr.to_lowercase();

    // Prefixes of messages ssh prints about the connection, never the remote command's
    let ssh_origin = [
        "ssh:",
        "kex_exchange_identification:",
        "ssh_exchange_identification:",
        "connection closed by",
        "client_loop:",
    ];
    let transient_patterns = [
        "connection refused",
        "connection reset",
        "connection timed out",
        "no route to host",
        "network is unreachable",
        "temporary failure in name resolution",
        "broken pipe",
        "connection closed",
    ];

    stderr.lines().map(str::trim).any(|line| {
        ssh_origin.iter().any(|prefix| line.starts_with(prefix))
            && transient_patterns.iter().any(|p| line.contains(p))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::builtin_defaults;

    fn output(exit_code: i32, stderr: &str) -> CommandOutput {
        CommandOutput {
            stdout: String::new(),
            stderr: stderr.to_string(),
            success: exit_code == 0,
            exit_code,
        }
    }

    #[test]
    fn parse_user_host() {
        let target = SshTarget::parse("deploy@web1.example.com").unwrap();
        assert_eq!(target.user, "deploy");
        assert_eq!(target.host, "web1.example.com");
        assert_eq!(target.port, None);
    }

    #[test]
    fn parse_with_port() {
        let target = SshTarget::parse("deploy@10.0.0.5:2222").unwrap();
        assert_eq!(target.host, "10.0.0.5");
        assert_eq!(target.port, Some(2222));
    }

    #[test]
    fn parse_bracketed_ipv6() {
        let target = SshTarget::parse("deploy@[fe80::1]:2200").unwrap();
        assert_eq!(target.host, "fe80::1");
        assert_eq!(target.port, Some(2200));
    }

    #[test]
    fn parse_rejects_missing_user_and_bad_port() {
        assert!(SshTarget::parse("web1").is_err());
        assert!(SshTarget::parse("@web1").is_err());
        assert!(SshTarget::parse("deploy@web1:ssh").is_err());
        assert!(SshTarget::parse("deploy@web1:0").is_err());
    }

    #[test]
    fn ssh_args_include_port_and_batch_mode() {
        let target = SshTarget::parse("deploy@web1:2222").unwrap();
        let transport = SshTransport::new(&target, None, &builtin_defaults().ssh).unwrap();
        let args = transport.build_ssh_args("touch -c -m -- /data/r1");

        assert_eq!(&args[0..2], &["-p".to_string(), "2222".to_string()]);
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(args.contains(&"ConnectTimeout=10".to_string()));
        assert_eq!(args[args.len() - 2], "deploy@web1");
        assert_eq!(args.last().unwrap(), "touch -c -m -- /data/r1");
        assert_eq!(transport.describe(), "deploy@web1:2222");
    }

    #[test]
    fn missing_identity_file_is_an_error() {
        let target = SshTarget::parse("deploy@web1").unwrap();
        let err = SshTransport::new(
            &target,
            Some("/nonexistent/deploycmd/id_ed25519"),
            &builtin_defaults().ssh,
        )
        .err()
        .unwrap();
        assert_eq!(err.code, crate::ErrorCode::SshIdentityFileNotFound);
    }

    #[test]
    fn localhost_switches_to_local_execution() {
        let target = SshTarget::parse("deploy@localhost").unwrap();
        let transport = SshTransport::new(&target, None, &builtin_defaults().ssh).unwrap();
        assert!(transport.is_local);
    }

    #[test]
    fn transient_errors_are_detected() {
        assert!(is_transient_ssh_error(&output(
            255,
            "ssh: connect to host web1 port 22: Connection refused"
        )));
        assert!(is_transient_ssh_error(&output(
            255,
            "kex_exchange_identification: Connection closed by remote host"
        )));
        assert!(!is_transient_ssh_error(&output(1, "rm: cannot remove: Permission denied")));
    }

    #[test]
    fn remote_exit_255_alone_is_not_retried() {
        // A hook exiting 255 must not run again
        assert!(!is_transient_ssh_error(&output(255, "")));
        assert!(!is_transient_ssh_error(&output(255, "deploy.sh: upstream Connection refused")));
        assert!(!is_transient_ssh_error(&output(
            1,
            "ssh: connect to host web1 port 22: Connection refused"
        )));
    }

    #[cfg(unix)]
    #[test]
    fn localhost_commands_run_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("runs.log");

        let target = SshTarget::parse("deploy@localhost").unwrap();
        let mut config = builtin_defaults().ssh;
        config.max_attempts = 3;
        let transport = SshTransport::new(&target, None, &config).unwrap();

        let command = format!(
            "echo run >> '{}'; echo 'ssh: connect to host x: Connection refused' >&2; exit 255",
            log.display()
        );
        let out = transport.execute(&command).unwrap();

        assert_eq!(out.exit_code, 255);
        assert_eq!(std::fs::read_to_string(&log).unwrap().lines().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn local_shell_reports_exit_status() {
        let shell = LocalShell::new();
        let ok = shell.execute("echo hello").unwrap();
        assert!(ok.success);
        assert_eq!(ok.stdout.trim(), "hello");

        let failed = shell.execute("exit 7").unwrap();
        assert!(!failed.success);
        assert_eq!(failed.exit_code, 7);
    }
}
