//! Rendered Unix commands run through the local shell against a temp tree.
//!
//! The symlink swap relies on GNU `mv -T`, so these only run on Linux.
#![cfg(target_os = "linux")]

use std::fs;
use std::path::Path;

use deploycmd::command::UnixCommands;
use deploycmd::release::{inventory, select_stale, ReleaseSwitch, RetentionPolicy};
use deploycmd::transport::{LocalShell, Transport};
use deploycmd::CommandSet;

fn s(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn materialize(dir: &Path, marker: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("VERSION"), marker).unwrap();
}

#[test]
fn switching_releases_moves_the_live_link() {
    let root = tempfile::tempdir().unwrap();
    let releases = root.path().join("releases");
    let current = root.path().join("current");
    let r1 = releases.join("r1");
    let r2 = releases.join("r2");
    materialize(&r1, "one");
    materialize(&r2, "two");

    let commands = UnixCommands::default();
    let shell = LocalShell::new();

    ReleaseSwitch::new(&commands, &s(&r1), &s(&current))
        .unwrap()
        .execute(&shell)
        .unwrap();
    assert_eq!(fs::read_to_string(current.join("VERSION")).unwrap(), "one");

    ReleaseSwitch::new(&commands, &s(&r2), &s(&current))
        .unwrap()
        .execute(&shell)
        .unwrap();
    assert_eq!(fs::read_to_string(current.join("VERSION")).unwrap(), "two");

    // Relative so the tree survives being mounted elsewhere
    assert_eq!(fs::read_link(&current).unwrap(), Path::new("./releases/r2"));
    assert!(!root.path().join("current.releasing").exists());

    let remove = commands.remove_command(&s(&r1)).unwrap();
    assert!(shell.execute(&remove.render()).unwrap().success);
    assert!(!r1.exists());
    assert_eq!(fs::read_to_string(current.join("VERSION")).unwrap(), "two");
}

#[test]
fn repeating_the_link_swap_is_idempotent() {
    let root = tempfile::tempdir().unwrap();
    let release = root.path().join("releases").join("r1");
    let current = root.path().join("current");
    materialize(&release, "one");

    let commands = UnixCommands::default();
    let shell = LocalShell::new();
    let line = commands.symlink_command(&s(&release), &s(&current)).unwrap();

    for _ in 0..2 {
        let out = shell.execute(&line.render()).unwrap();
        assert!(out.success, "stderr: {}", out.stderr);
    }

    assert_eq!(fs::read_to_string(current.join("VERSION")).unwrap(), "one");
    // The link itself was replaced, not descended into
    assert!(!release.join("r1").exists());
}

#[test]
fn removing_a_missing_path_succeeds() {
    let root = tempfile::tempdir().unwrap();
    let commands = UnixCommands::default();
    let line = commands.remove_command(&s(&root.path().join("gone"))).unwrap();
    assert!(LocalShell::new().execute(&line.render()).unwrap().success);
}

#[test]
fn touch_does_not_create_missing_directories() {
    let root = tempfile::tempdir().unwrap();
    let missing = root.path().join("never-built");
    let commands = UnixCommands::default();
    let line = commands.touch_command(&s(&missing)).unwrap();
    LocalShell::new().execute(&line.render()).unwrap();
    assert!(!missing.exists());
}

#[test]
fn paths_with_spaces_and_quotes_survive_rendering() {
    let root = tempfile::tempdir().unwrap();
    let release = root.path().join("my releases").join("it's r1");
    let current = root.path().join("live link");
    materialize(&release, "quoted");

    let commands = UnixCommands::default();
    ReleaseSwitch::new(&commands, &s(&release), &s(&current))
        .unwrap()
        .execute(&LocalShell::new())
        .unwrap();
    assert_eq!(fs::read_to_string(current.join("VERSION")).unwrap(), "quoted");
}

#[test]
fn listing_and_link_reading_feed_retention() {
    let root = tempfile::tempdir().unwrap();
    let releases = root.path().join("releases");
    let current = root.path().join("current");
    for name in ["r1", "r2", "r3"] {
        materialize(&releases.join(name), name);
    }

    let commands = UnixCommands::default();
    let shell = LocalShell::new();
    let defaults = deploycmd::defaults::builtin_defaults();

    // r1 goes live last, so it is the newest mark as well as the live release
    for name in ["r2", "r3", "r1"] {
        let touch = commands.touch_command(&s(&releases.join(name))).unwrap();
        let line = format!("sleep 0.05 && {}", touch.render());
        assert!(shell.execute(&line).unwrap().success);
    }
    let link = commands
        .symlink_command(&s(&releases.join("r1")), &s(&current))
        .unwrap();
    assert!(shell.execute(&link.render()).unwrap().success);

    let listing = inventory::list_command(deploycmd::OsFamily::Unix, &defaults, &s(&releases)).unwrap();
    let out = shell.execute(&listing.render()).unwrap();
    assert!(out.success, "stderr: {}", out.stderr);
    let entries = inventory::parse_listing(&out.stdout).unwrap();
    assert_eq!(entries.len(), 3);

    let read = inventory::read_link_command(deploycmd::OsFamily::Unix, &defaults, &s(&current)).unwrap();
    let raw = shell.execute(&read.render()).unwrap().stdout;
    let live = inventory::resolve_link_target(&s(&current), &raw, &['/']);
    assert_eq!(live, s(&releases.join("r1")));

    let stale = select_stale(&entries, Some(&live), RetentionPolicy::keep(2), &['/']);
    assert_eq!(stale.len(), 1);
    assert_eq!(stale[0].path, s(&releases.join("r2")));
}
