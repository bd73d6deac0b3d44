use serde::{Deserialize, Serialize};
use std::fs;

use crate::paths;

/// Root configuration structure for deploycmd.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeployCmdConfig {
    #[serde(default)]
    pub defaults: Defaults,
}

/// All configurable defaults that can be overridden via deploycmd.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default = "default_unix")]
    pub unix: UnixCommandConfig,

    #[serde(default = "default_windows")]
    pub windows: WindowsCommandConfig,

    #[serde(default = "default_release")]
    pub release: ReleaseConfig,

    #[serde(default = "default_ssh")]
    pub ssh: SshConfig,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            unix: default_unix(),
            windows: default_windows(),
            release: default_release(),
            ssh: default_ssh(),
        }
    }
}

/// Command construction settings for Unix-like hosts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnixCommandConfig {
    #[serde(default = "default_unix_interpreter")]
    pub default_interpreter: String,

    #[serde(default = "default_unix_sandbox_program")]
    pub sandbox_program: String,

    #[serde(default = "default_unix_sandbox_flags")]
    pub sandbox_flags: Vec<String>,

    #[serde(default = "default_staging_suffix")]
    pub staging_suffix: String,
}

/// Command construction settings for Windows hosts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WindowsCommandConfig {
    #[serde(default = "default_windows_interpreter")]
    pub default_interpreter: String,

    #[serde(default = "default_windows_sandbox_program")]
    pub sandbox_program: String,

    #[serde(default = "default_windows_sandbox_flags")]
    pub sandbox_flags: Vec<String>,

    #[serde(default = "default_powershell_program")]
    pub powershell_program: String,

    #[serde(default = "default_staging_suffix")]
    pub staging_suffix: String,
}

/// Release retention settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseConfig {
    /// Number of most recently touched releases kept by `release prune`
    #[serde(default = "default_keep")]
    pub keep: usize,
}

/// SSH transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    #[serde(default = "default_ssh_port")]
    pub default_port: u16,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u32,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_unix() -> UnixCommandConfig {
    UnixCommandConfig {
        default_interpreter: default_unix_interpreter(),
        sandbox_program: default_unix_sandbox_program(),
        sandbox_flags: default_unix_sandbox_flags(),
        staging_suffix: default_staging_suffix(),
    }
}

fn default_unix_interpreter() -> String {
    "bash".to_string()
}

fn default_unix_sandbox_program() -> String {
    "firejail".to_string()
}

fn default_unix_sandbox_flags() -> Vec<String> {
    vec!["--private".to_string()]
}

fn default_windows() -> WindowsCommandConfig {
    WindowsCommandConfig {
        default_interpreter: default_windows_interpreter(),
        sandbox_program: default_windows_sandbox_program(),
        sandbox_flags: default_windows_sandbox_flags(),
        powershell_program: default_powershell_program(),
        staging_suffix: default_staging_suffix(),
    }
}

fn default_windows_interpreter() -> String {
    "powershell -NoProfile -ExecutionPolicy Bypass -File".to_string()
}

fn default_windows_sandbox_program() -> String {
    "psexec".to_string()
}

fn default_windows_sandbox_flags() -> Vec<String> {
    vec![
        "-accepteula".to_string(),
        "-nobanner".to_string(),
        "-l".to_string(),
    ]
}

fn default_powershell_program() -> String {
    "powershell".to_string()
}

fn default_staging_suffix() -> String {
    ".releasing".to_string()
}

fn default_release() -> ReleaseConfig {
    ReleaseConfig {
        keep: default_keep(),
    }
}

fn default_keep() -> usize {
    5
}

fn default_ssh() -> SshConfig {
    SshConfig {
        default_port: default_ssh_port(),
        connect_timeout_secs: default_connect_timeout(),
        max_attempts: default_max_attempts(),
    }
}

fn default_ssh_port() -> u16 {
    22
}

fn default_connect_timeout() -> u32 {
    10
}

fn default_max_attempts() -> u32 {
    3
}

// =============================================================================
// Loading functions
// =============================================================================

/// Load defaults, merging file config with built-in defaults.
/// If deploycmd.json is missing or invalid, silently returns built-in defaults.
pub fn load_defaults() -> Defaults {
    load_config().defaults
}

/// Load the full deploycmd.json config, falling back to defaults on any error.
pub fn load_config() -> DeployCmdConfig {
    load_config_from_file().unwrap_or_default()
}

/// Load and validate deploycmd.json, surfacing parse errors.
pub fn load_config_strict() -> crate::Result<DeployCmdConfig> {
    if !config_exists() {
        return Ok(DeployCmdConfig::default());
    }
    load_config_from_file()
}

/// Attempt to load config from deploycmd.json file.
fn load_config_from_file() -> crate::Result<DeployCmdConfig> {
    let path = paths::config_json()?;

    if !path.exists() {
        return Err(crate::Error::other("deploycmd.json not found"));
    }

    let content = fs::read_to_string(&path).map_err(|e| {
        crate::Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;

    parse_config(&content, &path.display().to_string())
}

/// Parse config text; `origin` names the source in errors.
pub fn parse_config(content: &str, origin: &str) -> crate::Result<DeployCmdConfig> {
    let config: DeployCmdConfig = serde_json::from_str(content)
        .map_err(|e| crate::Error::config_invalid_json(origin, e))?;

    validate(&config.defaults)?;
    Ok(config)
}

fn validate(defaults: &Defaults) -> crate::Result<()> {
    if defaults.unix.sandbox_program.trim().is_empty() {
        return Err(crate::Error::config_invalid_value(
            "defaults.unix.sandbox_program",
            None,
            "Scripts must always run inside a sandbox; the sandbox program cannot be empty",
        ));
    }
    if defaults.windows.sandbox_program.trim().is_empty() {
        return Err(crate::Error::config_invalid_value(
            "defaults.windows.sandbox_program",
            None,
            "Scripts must always run inside a sandbox; the sandbox program cannot be empty",
        ));
    }
    if defaults.unix.default_interpreter.trim().is_empty()
        || defaults.windows.default_interpreter.trim().is_empty()
    {
        return Err(crate::Error::config_invalid_value(
            "default_interpreter",
            None,
            "Default interpreter cannot be empty",
        ));
    }
    for (key, suffix) in [
        ("defaults.unix.staging_suffix", &defaults.unix.staging_suffix),
        ("defaults.windows.staging_suffix", &defaults.windows.staging_suffix),
    ] {
        if suffix.is_empty() || suffix.contains(['/', '\\']) {
            return Err(crate::Error::config_invalid_value(
                key,
                Some(suffix.clone()),
                "Staging suffix must be a non-empty file name fragment",
            ));
        }
    }
    if defaults.ssh.max_attempts == 0 {
        return Err(crate::Error::config_invalid_value(
            "defaults.ssh.max_attempts",
            Some("0".to_string()),
            "At least one attempt is required",
        ));
    }
    Ok(())
}

/// Check if deploycmd.json file exists
pub fn config_exists() -> bool {
    paths::config_json().map(|p| p.exists()).unwrap_or(false)
}

/// Delete deploycmd.json file (reset to defaults)
pub fn reset_config() -> crate::Result<bool> {
    let path = paths::config_json()?;

    if path.exists() {
        fs::remove_file(&path).map_err(|e| {
            crate::Error::internal_io(e.to_string(), Some(format!("delete {}", path.display())))
        })?;
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Get the path to deploycmd.json (for display purposes)
pub fn config_path() -> crate::Result<String> {
    Ok(paths::config_json()?.display().to_string())
}

/// Get built-in defaults (ignoring any file config)
pub fn builtin_defaults() -> Defaults {
    Defaults::default()
}
