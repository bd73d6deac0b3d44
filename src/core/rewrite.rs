//! Relative symlink sources.
//!
//! A release staged as `/app/releases/20240101120000` and linked at
//! `/app/releases/current` is embedded in the link as `./20240101120000`, so
//! the link still resolves when the whole tree is mounted somewhere else
//! (a container bind mount, a chroot).
//!
//! Matching is purely textual. Paths that reach the same directory through a
//! symlinked ancestor, a different separator, or different letter case do not
//! match and fall back to the source unchanged.

/// Directory part of `path`, splitting on any of `separators`.
///
/// - no separator: `.`
/// - separator only at the start: that root separator
/// - repeated separators before the last component are collapsed away
pub fn parent_dir<'a>(path: &'a str, separators: &[char]) -> &'a str {
    let trimmed = path.trim_end_matches(separators);
    if trimmed.is_empty() {
        // `path` was nothing but separators (the root itself)
        return if path.is_empty() { "." } else { &path[..1] };
    }

    match trimmed.rfind(separators) {
        None => ".",
        Some(idx) => {
            let dir = trimmed[..idx].trim_end_matches(separators);
            if dir.is_empty() {
                &trimmed[..1]
            } else {
                dir
            }
        }
    }
}

/// Rewrite `source` relative to the directory that will hold `target`.
///
/// When `source` begins with that directory, the matched prefix is replaced
/// by `.` and nothing else changes. No component boundary is checked, so
/// `/app/releases-old/x` against a link in `/app/releases` becomes `.-old/x`.
pub fn relative_source(source: &str, target: &str, separators: &[char]) -> String {
    let parent = parent_dir(target, separators);

    match source.strip_prefix(parent) {
        Some(remainder) => format!(".{}", remainder),
        None => source.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIX: &[char] = &['/'];
    const WINDOWS: &[char] = &['\\', '/'];

    #[test]
    fn sibling_release_becomes_dot_relative() {
        assert_eq!(
            relative_source("/app/releases/20240101120000", "/app/releases/current", UNIX),
            "./20240101120000"
        );
    }

    #[test]
    fn unrelated_mount_is_unchanged() {
        assert_eq!(
            relative_source("/other/mount/build", "/app/releases/current", UNIX),
            "/other/mount/build"
        );
    }

    #[test]
    fn nested_release_keeps_intermediate_components() {
        assert_eq!(
            relative_source("/data/releases/r1", "/data/current", UNIX),
            "./releases/r1"
        );
    }

    #[test]
    fn matching_is_textual_not_per_component() {
        assert_eq!(
            relative_source("/app/releases-old/x", "/app/releases/current", UNIX),
            ".-old/x"
        );
        assert_eq!(
            relative_source("/app/releases/x", "/app/rel/current", UNIX),
            ".eases/x"
        );
    }

    #[test]
    fn link_in_root_directory_replaces_the_root() {
        assert_eq!(relative_source("/srv/r1", "/current", UNIX), ".srv/r1");
    }

    #[test]
    fn source_equal_to_link_directory() {
        assert_eq!(relative_source("/app", "/app/current", UNIX), ".");
    }

    #[test]
    fn bare_target_name_uses_dot_parent() {
        assert_eq!(relative_source("./r1", "current", UNIX), "./r1");
        assert_eq!(relative_source("r1", "current", UNIX), "r1");
    }

    #[test]
    fn trailing_separator_on_target_is_ignored() {
        assert_eq!(
            relative_source("/app/releases/r2", "/app/releases/current/", UNIX),
            "./r2"
        );
    }

    #[test]
    fn windows_paths_use_backslash() {
        assert_eq!(
            relative_source(r"D:\app\releases\r1", r"D:\app\current", WINDOWS),
            r".\releases\r1"
        );
    }

    #[test]
    fn mixed_separators_do_not_match() {
        assert_eq!(
            relative_source("D:/app/releases/r1", r"D:\app\current", WINDOWS),
            "D:/app/releases/r1"
        );
    }

    #[test]
    fn parent_dir_cases() {
        assert_eq!(parent_dir("/app/releases/current", UNIX), "/app/releases");
        assert_eq!(parent_dir("/current", UNIX), "/");
        assert_eq!(parent_dir("current", UNIX), ".");
        assert_eq!(parent_dir("/", UNIX), "/");
        assert_eq!(parent_dir("/a//b", UNIX), "/a");
        assert_eq!(parent_dir(r"C:\current", WINDOWS), "C:");
    }
}
