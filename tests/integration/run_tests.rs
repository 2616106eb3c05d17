//! End-to-end runs through `run_app`.
//!
//! Output goes to the real stdout, so these tests check exit codes and the
//! resulting filesystem rather than the report text.

use clap::Parser;
use dupelink::cli::Cli;
use dupelink::error::ExitCode;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn run(args: &[&str]) -> anyhow::Result<ExitCode> {
    let mut argv = vec!["dupelink", "-q"];
    argv.extend_from_slice(args);
    dupelink::run_app(Cli::try_parse_from(argv).unwrap())
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_list_with_duplicates_succeeds() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), b"dup").unwrap();
    fs::write(dir.path().join("b.txt"), b"dup").unwrap();

    let code = run(&["list", path_str(dir.path())]).unwrap();
    assert_eq!(code, ExitCode::Success);
}

#[test]
fn test_list_json_without_duplicates_succeeds() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("unique.txt"), b"unique").unwrap();

    let code = run(&["list", path_str(dir.path()), "--output", "json"]).unwrap();
    assert_eq!(code, ExitCode::Success);
}

#[test]
fn test_missing_root_is_partial_success() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), b"dup").unwrap();
    let missing = dir.path().join("not-here");

    let code = run(&["list", path_str(&missing), path_str(dir.path())]).unwrap();
    assert_eq!(code, ExitCode::PartialSuccess);
}

#[test]
fn test_explicit_missing_config_is_an_error() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("absent.toml");

    let result = run(&[
        "--config",
        path_str(&config),
        "list",
        path_str(dir.path()),
    ]);

    let err = result.unwrap_err();
    assert_eq!(dupelink::error::exit_code_for(&err), ExitCode::GeneralError);
    assert!(format!("{err:#}").contains("config file not found"));
}

#[test]
fn test_inverted_size_bounds_are_an_error() {
    let dir = tempdir().unwrap();
    let result = run(&[
        "list",
        path_str(dir.path()),
        "--min-size",
        "10KB",
        "--max-size",
        "1KB",
    ]);

    assert!(result.is_err());
}

#[cfg(unix)]
#[test]
fn test_link_hard_replaces_duplicates() {
    use std::os::unix::fs::MetadataExt;

    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), b"linked payload").unwrap();
    fs::write(dir.path().join("b.txt"), b"linked payload").unwrap();
    fs::write(dir.path().join("c.txt"), b"other payload!").unwrap();

    let code = run(&["link", path_str(dir.path())]).unwrap();
    assert_eq!(code, ExitCode::Success);

    let a = fs::metadata(dir.path().join("a.txt")).unwrap();
    let b = fs::metadata(dir.path().join("b.txt")).unwrap();
    let c = fs::metadata(dir.path().join("c.txt")).unwrap();
    assert_eq!(a.ino(), b.ino());
    assert_eq!(a.nlink(), 2);
    assert_ne!(a.ino(), c.ino());
    assert_eq!(fs::read(dir.path().join("c.txt")).unwrap(), b"other payload!");
}

#[cfg(unix)]
#[test]
fn test_link_hard_merges_copy_with_existing_link_pair() {
    use std::os::unix::fs::MetadataExt;

    let dir = tempdir().unwrap();
    fs::write(dir.path().join("0-copy"), b"payload").unwrap();
    fs::write(dir.path().join("a"), b"payload").unwrap();
    fs::hard_link(dir.path().join("a"), dir.path().join("b")).unwrap();

    let code = run(&["link", path_str(dir.path())]).unwrap();
    assert_eq!(code, ExitCode::Success);

    let ino = |name: &str| fs::metadata(dir.path().join(name)).unwrap().ino();
    assert_eq!(ino("0-copy"), ino("a"));
    assert_eq!(ino("a"), ino("b"));
    assert_eq!(fs::metadata(dir.path().join("b")).unwrap().nlink(), 3);
}

#[cfg(unix)]
#[test]
fn test_link_respects_min_size() {
    use std::os::unix::fs::MetadataExt;

    let dir = tempdir().unwrap();
    fs::write(dir.path().join("small1"), b"tiny").unwrap();
    fs::write(dir.path().join("small2"), b"tiny").unwrap();
    fs::write(dir.path().join("big1"), vec![1u8; 2048]).unwrap();
    fs::write(dir.path().join("big2"), vec![1u8; 2048]).unwrap();

    let code = run(&["link", path_str(dir.path()), "--min-size", "1KiB"]).unwrap();
    assert_eq!(code, ExitCode::Success);

    let ino = |name: &str| fs::metadata(dir.path().join(name)).unwrap().ino();
    assert_eq!(ino("big1"), ino("big2"));
    assert_ne!(ino("small1"), ino("small2"));
}

#[cfg(unix)]
#[test]
fn test_link_symbolic_across_roots() {
    let first = tempdir().unwrap();
    let second = tempdir().unwrap();
    fs::write(first.path().join("song.flac"), b"audio bytes").unwrap();
    fs::write(second.path().join("song.flac"), b"audio bytes").unwrap();

    let code = run(&[
        "link",
        "--kind",
        "symbolic",
        path_str(first.path()),
        path_str(second.path()),
    ])
    .unwrap();
    assert_eq!(code, ExitCode::Success);

    let links = [first.path(), second.path()]
        .iter()
        .map(|root| root.join("song.flac"))
        .filter(|p| fs::symlink_metadata(p).unwrap().file_type().is_symlink())
        .count();
    assert_eq!(links, 1);
    assert_eq!(fs::read(second.path().join("song.flac")).unwrap(), b"audio bytes");
}
