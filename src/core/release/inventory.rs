//! Reading release state back from a host.
//!
//! Retention needs two facts the command layer cannot know on its own: which
//! release directories exist (with their completion marks) and where the live
//! link points. These helpers build the commands that report both and parse
//! what they print.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::Path;

use super::ReleaseEntry;
use crate::command::{CommandLine, Invocation, ShellDialect};
use crate::defaults::Defaults;
use crate::error::{Error, Result};
use crate::platform::OsFamily;
use crate::rewrite::parent_dir;
use crate::utils::{shell, validation};

fn powershell(defaults: &Defaults, script: String) -> CommandLine {
    let invocation = Invocation::new(defaults.windows.powershell_program.clone())
        .args(["-NoProfile", "-NonInteractive", "-Command"])
        .arg(script);
    CommandLine::single(ShellDialect::Windows, invocation)
}

/// Command printing `<mtime-epoch-seconds> <path>` for every release
/// directory directly inside `releases_dir`. Symlinks are not listed.
///
/// The Unix form uses `find -printf`, which only GNU findutils provides.
pub fn list_command(os: OsFamily, defaults: &Defaults, releases_dir: &str) -> Result<CommandLine> {
    let releases_dir = validation::require_path(releases_dir, "releases_dir")?;

    Ok(match os {
        OsFamily::Unix => CommandLine::single(
            ShellDialect::Posix,
            Invocation::new("find").args([
                releases_dir,
                "-mindepth",
                "1",
                "-maxdepth",
                "1",
                "-type",
                "d",
                "-printf",
                "%T@ %p\\n",
            ]),
        ),
        OsFamily::Windows => powershell(
            defaults,
            format!(
                "Get-ChildItem -LiteralPath {} -Directory -Attributes !ReparsePoint | \
                 ForEach-Object {{ '{{0}} {{1}}' -f ([DateTimeOffset]$_.LastWriteTimeUtc).ToUnixTimeSeconds(), $_.FullName }}",
                shell::powershell_literal(releases_dir)
            ),
        ),
    })
}

/// Command printing the raw target stored in `link`.
pub fn read_link_command(os: OsFamily, defaults: &Defaults, link: &str) -> Result<CommandLine> {
    let link = validation::require_path(link, "link")?;

    Ok(match os {
        OsFamily::Unix => CommandLine::single(
            ShellDialect::Posix,
            Invocation::new("readlink").args(["--", link]),
        ),
        OsFamily::Windows => powershell(
            defaults,
            format!(
                "(Get-Item -LiteralPath {}).Target",
                shell::powershell_literal(link)
            ),
        ),
    })
}

fn parse_epoch(raw: &str) -> Option<DateTime<Utc>> {
    let (secs, frac) = match raw.split_once('.') {
        Some((secs, frac)) => (secs, frac),
        None => (raw, ""),
    };
    let secs: i64 = secs.parse().ok()?;

    let nanos = if frac.is_empty() {
        0
    } else {
        if !frac.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let digits: String = frac.chars().chain(std::iter::repeat('0')).take(9).collect();
        digits.parse::<u32>().ok()?
    };

    DateTime::from_timestamp(secs, nanos)
}

/// Parse the output of [`list_command`].
pub fn parse_listing(output: &str) -> Result<Vec<ReleaseEntry>> {
    let mut entries = Vec::new();

    for line in output.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let (stamp, path) = line
            .split_once(' ')
            .ok_or_else(|| Error::remote_output_invalid("release listing", line))?;
        let touched_at =
            parse_epoch(stamp).ok_or_else(|| Error::remote_output_invalid("release listing", line))?;
        if path.is_empty() {
            return Err(Error::remote_output_invalid("release listing", line));
        }

        entries.push(ReleaseEntry {
            path: path.to_string(),
            touched_at,
        });
    }

    Ok(entries)
}

fn is_absolute(path: &str, separators: &[char]) -> bool {
    if path.starts_with(separators) {
        return true;
    }
    // Drive-qualified Windows path such as C:\ or C:/
    let bytes = path.as_bytes();
    separators.contains(&'\\')
        && bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && separators.contains(&(bytes[2] as char))
}

/// Lexically collapse `.` and `..` components. A leading root or drive is kept.
pub fn normalize_lexically(path: &str, separators: &[char]) -> String {
    let sep = separators.first().copied().unwrap_or('/');
    let rooted = path.starts_with(separators);

    let mut parts: Vec<&str> = Vec::new();
    for part in path.split(separators) {
        match part {
            "" | "." => {}
            ".." => {
                if matches!(parts.last(), Some(last) if *last != ".." && !last.ends_with(':')) {
                    parts.pop();
                } else if !rooted {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let sep_str = sep.to_string();
    let joined = parts.join(sep_str.as_str());
    if rooted {
        format!("{}{}", sep, joined)
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Resolve the raw target of `link` into a path comparable with listed releases.
pub fn resolve_link_target(link: &str, raw: &str, separators: &[char]) -> String {
    let raw = raw.trim_end_matches(['\r', '\n']);

    if is_absolute(raw, separators) {
        return normalize_lexically(raw, separators);
    }

    let parent = parent_dir(link, separators);
    let sep = separators.first().copied().unwrap_or('/');
    normalize_lexically(&format!("{}{}{}", parent, sep, raw), separators)
}

/// List release directories on the local filesystem.
pub fn list_local(releases_dir: &str) -> Result<Vec<ReleaseEntry>> {
    let read = fs::read_dir(Path::new(releases_dir)).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", releases_dir)))
    })?;

    let mut entries = Vec::new();
    for item in read {
        let item = item.map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("read {}", releases_dir)))
        })?;
        let path = item.path();
        let meta = fs::symlink_metadata(&path).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("stat {}", path.display())))
        })?;

        if !meta.is_dir() {
            continue;
        }

        let modified = meta.modified().map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("mtime {}", path.display())))
        })?;

        entries.push(ReleaseEntry {
            path: path.to_string_lossy().to_string(),
            touched_at: DateTime::<Utc>::from(modified),
        });
    }

    Ok(entries)
}
