use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Operating-system family of a deploy target, as reported by host metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Unix,
    Windows,
}

const UNIX_ALIASES: &[&str] = &["unix", "linux", "darwin", "macos", "freebsd", "openbsd", "netbsd"];
const WINDOWS_ALIASES: &[&str] = &["windows", "win32", "win"];

impl OsFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            OsFamily::Unix => "unix",
            OsFamily::Windows => "windows",
        }
    }

    /// Family of the machine this binary runs on.
    pub fn local() -> Self {
        if cfg!(windows) {
            OsFamily::Windows
        } else {
            OsFamily::Unix
        }
    }

    /// Path separators understood by the family, preferred separator first.
    pub fn separators(&self) -> &'static [char] {
        match self {
            OsFamily::Unix => &['/'],
            OsFamily::Windows => &['\\', '/'],
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OsFamily {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();

        if UNIX_ALIASES.contains(&normalized.as_str()) {
            return Ok(OsFamily::Unix);
        }
        if WINDOWS_ALIASES.contains(&normalized.as_str()) {
            return Ok(OsFamily::Windows);
        }

        let tried = UNIX_ALIASES
            .iter()
            .chain(WINDOWS_ALIASES)
            .map(|s| s.to_string())
            .collect();
        Err(Error::validation_invalid_argument(
            "os",
            format!("Unknown operating-system family '{}'", value),
            Some(value.to_string()),
            Some(tried),
        ))
    }
}
