use super::{CommandLine, CommandSet, Invocation, ShellDialect};
use crate::defaults::UnixCommandConfig;
use crate::error::Result;
use crate::platform::OsFamily;
use crate::utils::{shell, validation};

/// Commands for Linux and other Unix-like hosts.
///
/// Scripts run under `firejail --private` by default, so they see a throwaway
/// home directory instead of the deploy user's files. Link swaps build the
/// new link under a staging name and `rename(2)` it over the old one.
#[derive(Debug, Clone)]
pub struct UnixCommands {
    config: UnixCommandConfig,
}

impl UnixCommands {
    pub fn new(config: UnixCommandConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &UnixCommandConfig {
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

    fn staging_path(&self, target_path: &str) -> String {
        format!(
            "{}{}",
            target_path.trim_end_matches('/'),
            self.config.staging_suffix
        )
    }
}

impl Default for UnixCommands {
    fn default() -> Self {
        Self::new(crate::defaults::builtin_defaults().unix)
    }
}

impl CommandSet for UnixCommands {
    fn os(&self) -> OsFamily {
        OsFamily::Unix
    }

    fn dialect(&self) -> ShellDialect {
        ShellDialect::Posix
    }

    fn script_command(&self, sandbox_mode: &str, script_path: &str) -> Result<CommandLine> {
        let script_path = validation::require_path(script_path, "script_path")?;

        let sandboxed = Invocation::new(self.config.sandbox_program.clone())
            .args(self.config.sandbox_flags.iter().cloned())
            .args(self.interpreter(sandbox_mode))
            .arg(script_path);

        Ok(CommandLine::single(ShellDialect::Posix, sandboxed))
    }

    fn touch_command(&self, dir_path: &str) -> Result<CommandLine> {
        let dir_path = validation::require_path(dir_path, "dir_path")?;

        // -c: never create; -m: modification time only
        let touch = Invocation::new("touch").args(["-c", "-m", "--", dir_path]);
        Ok(CommandLine::single(ShellDialect::Posix, touch))
    }

    fn symlink_command(&self, source_path: &str, target_path: &str) -> Result<CommandLine> {
        let source_path = validation::require_path(source_path, "source_path")?;
        let target_path = validation::require_path(target_path, "target_path")?;

        let link_source = self.rewrite_source(source_path, target_path);
        let staging = self.staging_path(target_path);
        let target = target_path.trim_end_matches('/');

        // -n keeps ln from descending into a stale staging link that points at a directory;
        // mv -T renames over the live link instead of moving into the directory it resolves to.
        let create = Invocation::new("ln").args(["-sfn", "--", link_source.as_str(), staging.as_str()]);
        let swap = Invocation::new("mv").args(["-T", "-f", "--", staging.as_str(), target]);

        Ok(CommandLine::single(ShellDialect::Posix, create).then(swap))
    }

    fn remove_command(&self, path: &str) -> Result<CommandLine> {
        let path = validation::require_path(path, "path")?;

        let remove = Invocation::new("rm").args(["-rf", "--", path]);
        Ok(CommandLine::single(ShellDialect::Posix, remove))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCode;

    fn commands() -> UnixCommands {
        UnixCommands::default()
    }

    #[test]
    fn script_defaults_to_bash_inside_firejail() {
        let line = commands().script_command("", "/srv/app/deploy.sh").unwrap();
        assert_eq!(line.render(), "firejail --private bash /srv/app/deploy.sh");
        assert_eq!(line.program(), "firejail");
    }

    #[test]
    fn script_keeps_explicit_mode_and_sandbox() {
        let line = commands().script_command("sh", "/srv/app/deploy.sh").unwrap();
        let rendered = line.render();
        assert!(rendered.starts_with("firejail --private "));
        assert!(rendered.contains(" sh "));
        assert!(!rendered.contains("bash"));
    }

    #[test]
    fn script_mode_with_flags_is_split() {
        let line = commands().script_command("bash -e", "/srv/hook.sh").unwrap();
        assert_eq!(line.steps[0].args, vec!["--private", "bash", "-e", "/srv/hook.sh"]);
        assert!(line.render().contains("bash -e"));
    }

    #[test]
    fn script_mode_words_keep_order_with_single_spacing() {
        let line = commands().script_command("bash  -e\t-u", "/srv/hook.sh").unwrap();
        assert_eq!(line.steps[0].args, vec!["--private", "bash", "-e", "-u", "/srv/hook.sh"]);
        assert_eq!(line.render(), "firejail --private bash -e -u /srv/hook.sh");
    }

    #[test]
    fn script_path_with_metacharacters_is_quoted() {
        let line = commands().script_command("", "/srv/a;reboot").unwrap();
        assert_eq!(line.render(), "firejail --private bash '/srv/a;reboot'");
    }

    #[test]
    fn empty_script_path_is_rejected() {
        let err = commands().script_command("bash", "").unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationInvalidArgument);
        assert_eq!(err.details["field"], "script_path");
    }

    #[test]
    fn custom_sandbox_is_honoured() {
        let mut config = crate::defaults::builtin_defaults().unix;
        config.sandbox_program = "bwrap".to_string();
        config.sandbox_flags = vec!["--unshare-all".to_string()];
        let line = UnixCommands::new(config).script_command("", "/srv/h.sh").unwrap();
        assert_eq!(line.render(), "bwrap --unshare-all bash /srv/h.sh");
    }

    #[test]
    fn touch_updates_mtime_only() {
        let line = commands().touch_command("/data/releases/r1").unwrap();
        let rendered = line.render();
        assert_eq!(rendered, "touch -c -m -- /data/releases/r1");
        assert_eq!(rendered.matches("/data/releases/r1").count(), 1);
        assert!(!line.steps[0].args.iter().any(|a| a == "-a" || a == "-d" || a == "-r"));
    }

    #[test]
    fn symlink_stages_then_renames() {
        let line = commands()
            .symlink_command("/data/releases/r1", "/data/current")
            .unwrap();
        assert_eq!(
            line.render(),
            "ln -sfn -- ./releases/r1 /data/current.releasing \
             && mv -T -f -- /data/current.releasing /data/current"
        );
        assert_eq!(line.steps.len(), 2);
        assert!(!line.steps.iter().any(|s| s.program == "rm"));
    }

    #[test]
    fn symlink_keeps_unrelated_source_absolute() {
        let line = commands()
            .symlink_command("/other/mount/build", "/app/releases/current")
            .unwrap();
        assert_eq!(line.steps[0].args[2], "/other/mount/build");
    }

    #[test]
    fn symlink_is_identical_on_repeat() {
        let c = commands();
        let first = c.symlink_command("/app/releases/r9", "/app/releases/current").unwrap();
        let second = c.symlink_command("/app/releases/r9", "/app/releases/current").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn symlink_rejects_empty_paths() {
        assert!(commands().symlink_command("", "/data/current").is_err());
        assert!(commands().symlink_command("/data/releases/r1", " ").is_err());
    }

    #[test]
    fn remove_is_forced_and_recursive() {
        let line = commands().remove_command("/data/releases/r1").unwrap();
        assert_eq!(line.render(), "rm -rf -- /data/releases/r1");
        assert!(line.steps[0].args[0].contains('f'));
    }

    #[test]
    fn dash_prefixed_paths_cannot_become_flags() {
        let line = commands().remove_command("-rf").unwrap();
        assert_eq!(line.steps[0].args, vec!["-rf", "--", "-rf"]);
    }
}
