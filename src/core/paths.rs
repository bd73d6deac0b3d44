use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

/// Environment variable that overrides the config directory.
pub const CONFIG_DIR_ENV: &str = "DEPLOYCMD_CONFIG_DIR";

/// Base deploycmd config directory (~/.config/deploycmd/, %APPDATA%\deploycmd on Windows)
pub fn deploycmd() -> Result<PathBuf> {
    if let Ok(dir) = env::var(CONFIG_DIR_ENV) {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(shellexpand::tilde(&dir).to_string()));
        }
    }

    #[cfg(windows)]
    {
        let appdata = env::var("APPDATA").map_err(|_| {
            Error::internal_unexpected(
                "APPDATA environment variable not set on Windows".to_string(),
            )
        })?;
        Ok(PathBuf::from(appdata).join("deploycmd"))
    }

    #[cfg(not(windows))]
    {
        let home = env::var("HOME").map_err(|_| {
            Error::internal_unexpected(
                "HOME environment variable not set on Unix-like system".to_string(),
            )
        })?;
        Ok(PathBuf::from(home).join(".config").join("deploycmd"))
    }
}

/// Global deploycmd.json config file path
pub fn config_json() -> Result<PathBuf> {
    Ok(deploycmd()?.join("deploycmd.json"))
}
