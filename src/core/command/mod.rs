//! Per-platform deployment command construction.
//!
//! A [`CommandSet`] turns a deployment intent into an argument vector for the
//! target host's operating-system family. Nothing here executes anything: the
//! caller renders the returned [`CommandLine`] and hands it to its transport.
//!
//! ```ignore
//! let commands = command::for_os(OsFamily::Unix, &defaults::load_defaults());
//! let line = commands.symlink_command("/data/releases/r2", "/data/current")?;
//! transport.execute(&line.render())?;
//! ```

use serde::Serialize;
use std::fmt;

use crate::defaults::Defaults;
use crate::error::Result;
use crate::platform::OsFamily;
use crate::utils::shell;

pub mod unix;
pub mod windows;

pub use unix::UnixCommands;
pub use windows::WindowsCommands;

/// Quoting rules a rendered [`CommandLine`] is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShellDialect {
    /// POSIX `sh`.
    Posix,
    /// `cmd.exe` / MSVC runtime argument parsing.
    Windows,
}

/// One executable and its arguments, unquoted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn render(&self, dialect: ShellDialect) -> String {
        let mut words = Vec::with_capacity(self.args.len() + 1);
        words.push(self.program.clone());
        words.extend(self.args.iter().cloned());

        match dialect {
            ShellDialect::Posix => shell::quote_args(&words),
            ShellDialect::Windows => shell::quote_windows_args(&words),
        }
    }
}

/// A sequence of invocations that must all succeed, in order.
///
/// Rendering joins the steps with `&&`, which both `sh` and `cmd.exe` treat
/// as "run the next step only if the previous one exited zero".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandLine {
    pub dialect: ShellDialect,
    pub steps: Vec<Invocation>,
}

impl CommandLine {
    pub fn single(dialect: ShellDialect, invocation: Invocation) -> Self {
        Self {
            dialect,
            steps: vec![invocation],
        }
    }

    pub fn then(mut self, invocation: Invocation) -> Self {
        self.steps.push(invocation);
        self
    }

    /// Program of the first step.
    pub fn program(&self) -> &str {
        self.steps
            .first()
            .map(|step| step.program.as_str())
            .unwrap_or_default()
    }

    pub fn render(&self) -> String {
        self.steps
            .iter()
            .map(|step| step.render(self.dialect))
            .collect::<Vec<_>>()
            .join(" && ")
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// The four primitive deployment commands for one operating-system family.
///
/// Implementations are pure: no I/O, no interior state beyond their
/// configuration. Empty paths are rejected with
/// [`ErrorCode::ValidationInvalidArgument`](crate::error::ErrorCode).
pub trait CommandSet: Send + Sync {
    fn os(&self) -> OsFamily;

    fn dialect(&self) -> ShellDialect;

    /// Run `script_path` with the `sandbox_mode` interpreter inside the
    /// platform sandbox. An empty mode selects the variant's default
    /// interpreter.
    fn script_command(&self, sandbox_mode: &str, script_path: &str) -> Result<CommandLine>;

    /// Update the modification time of `dir_path` without touching content.
    fn touch_command(&self, dir_path: &str) -> Result<CommandLine>;

    /// Point `target_path` at `source_path`, replacing any existing entry in
    /// a single rename.
    fn symlink_command(&self, source_path: &str, target_path: &str) -> Result<CommandLine>;

    /// Forced recursive removal that succeeds when `path` is already gone.
    fn remove_command(&self, path: &str) -> Result<CommandLine>;

    /// Link source as it will be embedded by [`CommandSet::symlink_command`].
    fn rewrite_source(&self, source_path: &str, target_path: &str) -> String {
        crate::rewrite::relative_source(source_path, target_path, self.os().separators())
    }
}

/// Select the command set for `os`, configured from `defaults`.
pub fn for_os(os: OsFamily, defaults: &Defaults) -> Box<dyn CommandSet> {
    match os {
        OsFamily::Unix => Box::new(UnixCommands::new(defaults.unix.clone())),
        OsFamily::Windows => Box::new(WindowsCommands::new(defaults.windows.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_quotes_each_argument() {
        let line = CommandLine::single(
            ShellDialect::Posix,
            Invocation::new("touch").args(["-c", "-m", "--", "/srv/my release"]),
        );
        assert_eq!(line.render(), "touch -c -m -- '/srv/my release'");
    }

    #[test]
    fn render_chains_steps_with_and() {
        let line = CommandLine::single(ShellDialect::Posix, Invocation::new("true"))
            .then(Invocation::new("echo").arg("ok"));
        assert_eq!(line.render(), "true && echo ok");
        assert_eq!(line.to_string(), line.render());
    }

    #[test]
    fn windows_dialect_uses_double_quotes() {
        let line = CommandLine::single(
            ShellDialect::Windows,
            Invocation::new("psexec").arg(r"C:\deploy scripts\hook.ps1"),
        );
        assert_eq!(line.render(), r#"psexec "C:\deploy scripts\hook.ps1""#);
    }

    #[test]
    fn for_os_selects_matching_variant() {
        let defaults = Defaults::default();
        assert_eq!(for_os(OsFamily::Unix, &defaults).os(), OsFamily::Unix);
        assert_eq!(for_os(OsFamily::Windows, &defaults).os(), OsFamily::Windows);
        assert_eq!(
            for_os(OsFamily::Windows, &defaults).dialect(),
            ShellDialect::Windows
        );
    }

    #[test]
    fn program_is_first_step() {
        let line = CommandLine::single(ShellDialect::Posix, Invocation::new("ln"))
            .then(Invocation::new("mv"));
        assert_eq!(line.program(), "ln");
    }
}
