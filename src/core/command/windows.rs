use super::{CommandLine, CommandSet, Invocation, ShellDialect};
use crate::defaults::WindowsCommandConfig;
use crate::error::Result;
use crate::platform::OsFamily;
use crate::utils::{shell, validation};

/// Commands for Windows hosts.
///
/// File operations go through PowerShell with every path passed as a
/// single-quoted literal. Scripts run under `psexec -l`, which strips the
/// Administrators group from the process token.
///
/// The generated scripts only use APIs present in both Windows PowerShell 5.1
/// (.NET Framework) and PowerShell 7. Link swaps are two renames, so a reader
/// can briefly find no link at the target; the new link is complete before
/// the old one moves.
#[derive(Debug, Clone)]
pub struct WindowsCommands {
    config: WindowsCommandConfig,
}

impl WindowsCommands {
    pub fn new(config: WindowsCommandConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WindowsCommandConfig {
        &self.config
    }

    fn interpreter(&self, sandbox_mode: &str) -> Vec<String> {
        let words = shell::split_words(sandbox_mode);
        if words.is_empty() {
            shell::split_words(&self.config.default_interpreter)
        } else {
            words
        }
    }

    fn powershell(&self, script: String) -> CommandLine {
        let invocation = Invocation::new(self.config.powershell_program.clone())
            .args(["-NoProfile", "-NonInteractive", "-Command"])
            .arg(script);
        CommandLine::single(ShellDialect::Windows, invocation)
    }
}

impl Default for WindowsCommands {
    fn default() -> Self {
        Self::new(crate::defaults::builtin_defaults().windows)
    }
}

/// Where the outgoing link is parked while the new one is renamed into place.
const PREVIOUS_SUFFIX: &str = ".previous";

/// Directory symbolic link (flag 1); the link target is stored as given.
const CREATE_SYMBOLIC_LINK: &str = "[DllImport(\"kernel32.dll\", SetLastError = true, CharSet = CharSet.Unicode)] \
     public static extern bool CreateSymbolicLink(string lpSymlinkFileName, string lpTargetFileName, int dwFlags);";

fn trim_separators(path: &str) -> &str {
    path.trim_end_matches(['\\', '/'])
}

impl CommandSet for WindowsCommands {
    fn os(&self) -> OsFamily {
        OsFamily::Windows
    }

    fn dialect(&self) -> ShellDialect {
        ShellDialect::Windows
    }

    fn script_command(&self, sandbox_mode: &str, script_path: &str) -> Result<CommandLine> {
        let script_path = validation::require_path(script_path, "script_path")?;

        let sandboxed = Invocation::new(self.config.sandbox_program.clone())
            .args(self.config.sandbox_flags.iter().cloned())
            .args(self.interpreter(sandbox_mode))
            .arg(script_path);

        Ok(CommandLine::single(ShellDialect::Windows, sandboxed))
    }

    fn touch_command(&self, dir_path: &str) -> Result<CommandLine> {
        let dir_path = validation::require_path(dir_path, "dir_path")?;

        let script = format!(
            "(Get-Item -LiteralPath {}).LastWriteTime = Get-Date",
            shell::powershell_literal(dir_path)
        );
        Ok(self.powershell(script))
    }

    fn symlink_command(&self, source_path: &str, target_path: &str) -> Result<CommandLine> {
        let source_path = validation::require_path(source_path, "source_path")?;
        let target_path = validation::require_path(target_path, "target_path")?;

        let link_source = self.rewrite_source(source_path, target_path);
        let target = trim_separators(target_path);
        let staging = format!("{}{}", target, self.config.staging_suffix);
        let previous = format!("{}{}", target, PREVIOUS_SUFFIX);

        // CreateSymbolicLinkW stores the relative target verbatim. A directory
        // entry cannot be renamed over, so the old link is parked and put back
        // if the second rename fails.
        let script = format!(
            "$ErrorActionPreference = 'Stop'; \
             Add-Type -Namespace DeployCmd -Name Native -MemberDefinition {native}; \
             $staging = {staging}; $target = {target}; $previous = {previous}; \
             foreach ($leftover in @($staging, $previous)) {{ \
             $item = Get-Item -LiteralPath $leftover -Force -ErrorAction SilentlyContinue; \
             if ($item) {{ $item.Delete() }} }}; \
             if (-not [DeployCmd.Native]::CreateSymbolicLink($staging, {source}, 1)) {{ \
             throw (New-Object System.ComponentModel.Win32Exception([Runtime.InteropServices.Marshal]::GetLastWin32Error())) }}; \
             $old = Get-Item -LiteralPath $target -Force -ErrorAction SilentlyContinue; \
             if ($old -and -not ($old.Attributes -band [IO.FileAttributes]::ReparsePoint)) {{ \
             $link = Get-Item -LiteralPath $staging -Force; $link.Delete(); \
             throw ('Refusing to replace ' + $target + ': it is not a link') }}; \
             if ($old) {{ [IO.Directory]::Move($target, $previous) }}; \
             try {{ [IO.Directory]::Move($staging, $target) }} \
             catch {{ if ($old) {{ [IO.Directory]::Move($previous, $target) }}; throw }}; \
             if ($old) {{ (Get-Item -LiteralPath $previous -Force).Delete() }}",
            native = shell::powershell_literal(CREATE_SYMBOLIC_LINK),
            staging = shell::powershell_literal(&staging),
            target = shell::powershell_literal(target),
            previous = shell::powershell_literal(&previous),
            source = shell::powershell_literal(&link_source),
        );
        Ok(self.powershell(script))
    }

    fn remove_command(&self, path: &str) -> Result<CommandLine> {
        let path = validation::require_path(path, "path")?;

        let literal = shell::powershell_literal(path);
        let script = format!(
            "if (Test-Path -LiteralPath {literal}) {{ Remove-Item -LiteralPath {literal} -Recurse -Force }}"
        );
        Ok(self.powershell(script))
    }
}
