use dupelink::actions::link::TEMP_PREFIX;
use dupelink::actions::{
    link_duplicates, link_file, LinkConfig, LinkError, LinkKind, LinkOperation, LinkOutcome,
    LinkProgressCallback,
};
use dupelink::duplicates::{Criterion, MatchCriteria, Matcher};
use dupelink::scanner::{FileMeta, Walker, WalkerConfig};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

fn write(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

fn leftover_temp_names(dir: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with(TEMP_PREFIX))
        .map(|e| e.into_path())
        .collect()
}

fn hard_link_matcher(root: &Path) -> Matcher {
    let criteria = MatchCriteria::default().with(Criterion::Device);
    let mut matcher = Matcher::new(criteria).unwrap();
    for entry in Walker::new(root, WalkerConfig::default()).walk() {
        let entry = entry.unwrap();
        matcher.register_file(&entry.path, entry.meta).unwrap();
    }
    matcher.finalize().unwrap();
    matcher
}

type NoCallback = dyn LinkProgressCallback;

#[cfg(unix)]
#[test]
fn test_batch_hard_links_whole_tree() {
    use std::os::unix::fs::MetadataExt;

    let dir = tempdir().unwrap();
    write(&dir, "a/one", b"first payload");
    write(&dir, "b/one", b"first payload");
    write(&dir, "c/one", b"first payload");
    write(&dir, "a/two", b"second payload!");
    write(&dir, "b/two", b"second payload!");
    write(&dir, "unique", b"nothing like it");

    let mut matcher = hard_link_matcher(dir.path());
    let result = link_duplicates(
        matcher.groups(),
        &LinkKind::Hard,
        &LinkConfig::default(),
        None::<&NoCallback>,
        None,
    )
    .unwrap();

    assert_eq!(result.groups, 2);
    assert_eq!(result.links_made, 3);
    assert!(result.all_succeeded());
    assert_eq!(result.bytes_saved, 2 * 13 + 15);

    let ino = |p: &str| fs::metadata(dir.path().join(p)).unwrap().ino();
    assert_eq!(ino("a/one"), ino("b/one"));
    assert_eq!(ino("a/one"), ino("c/one"));
    assert_eq!(ino("a/two"), ino("b/two"));
    assert_ne!(ino("unique"), ino("a/one"));
    assert!(leftover_temp_names(dir.path()).is_empty());
}

#[cfg(unix)]
#[test]
fn test_second_run_finds_nothing_to_link() {
    let dir = tempdir().unwrap();
    write(&dir, "x", b"payload");
    write(&dir, "y", b"payload");

    let mut first = hard_link_matcher(dir.path());
    let result = link_duplicates(
        first.groups(),
        &LinkKind::Hard,
        &LinkConfig::default(),
        None::<&NoCallback>,
        None,
    )
    .unwrap();
    assert_eq!(result.links_made, 1);

    // The pair now shares one inode, so the group is already linked.
    let mut second = hard_link_matcher(dir.path());
    let result = link_duplicates(
        second.groups(),
        &LinkKind::Hard,
        &LinkConfig::default(),
        None::<&NoCallback>,
        None,
    )
    .unwrap();
    assert_eq!(result.groups, 1);
    assert_eq!(result.links_made, 0);
    assert_eq!(result.already_linked, 1);
    assert_eq!(result.bytes_saved, 0);
}

#[cfg(unix)]
#[test]
fn test_copy_beside_hard_link_pair_joins_one_inode() {
    use std::os::unix::fs::MetadataExt;

    let dir = tempdir().unwrap();
    let copy = write(&dir, "0-copy", b"payload");
    let a = write(&dir, "a", b"payload");
    let b = dir.path().join("b");
    fs::hard_link(&a, &b).unwrap();

    let mut matcher = hard_link_matcher(dir.path());
    let result = link_duplicates(
        matcher.groups(),
        &LinkKind::Hard,
        &LinkConfig::default(),
        None::<&NoCallback>,
        None,
    )
    .unwrap();

    let ino = |path: &Path| fs::metadata(path).unwrap().ino();
    assert_eq!(result.groups, 1);
    assert!(result.all_succeeded());
    assert_eq!(ino(&copy), ino(&a));
    assert_eq!(ino(&a), ino(&b));
    assert_eq!(fs::metadata(&copy).unwrap().nlink(), 3);
    assert!(leftover_temp_names(dir.path()).is_empty());
}

#[cfg(unix)]
#[test]
fn test_symbolic_links_point_at_original() {
    let dir = tempdir().unwrap();
    write(&dir, "a", b"payload");
    write(&dir, "b", b"payload");

    let mut matcher = hard_link_matcher(dir.path());
    let result = link_duplicates(
        matcher.groups(),
        &LinkKind::Symbolic,
        &LinkConfig::default(),
        None::<&NoCallback>,
        None,
    )
    .unwrap();
    assert_eq!(result.links_made, 1);

    let a = dir.path().join("a");
    let b = dir.path().join("b");
    let (link, target) = if fs::symlink_metadata(&a).unwrap().file_type().is_symlink() {
        (a, b)
    } else {
        (b, a)
    };
    assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
    assert!(fs::read_link(&link).unwrap().is_absolute());
    assert_eq!(
        fs::canonicalize(&link).unwrap(),
        fs::canonicalize(&target).unwrap()
    );
    assert_eq!(fs::read(&link).unwrap(), b"payload");
}

#[cfg(unix)]
#[test]
fn test_duplicate_attributes_survive_replacement() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let original = write(&dir, "original", b"payload");
    let duplicate = write(&dir, "duplicate", b"payload");
    fs::set_permissions(&duplicate, fs::Permissions::from_mode(0o640)).unwrap();
    let mtime = filetime::FileTime::from_unix_time(1_234_567_890, 0);
    filetime::set_file_mtime(&duplicate, mtime).unwrap();

    let outcome = link_file(
        &original,
        &duplicate,
        &LinkKind::Hard,
        &LinkConfig::default().with_strict(true),
    )
    .unwrap();
    assert_eq!(outcome, LinkOutcome::Linked);

    let meta = fs::metadata(&duplicate).unwrap();
    assert_eq!(meta.permissions().mode() & 0o777, 0o640);
    assert_eq!(filetime::FileTime::from_last_modification_time(&meta), mtime);
}

// ==================== Atomicity ====================

/// Produces a link whose attributes cannot be set: a dangling symbolic link
/// presented as a hard link, so strict mode fails before the rename.
struct UnpreservableLink;

impl LinkOperation for UnpreservableLink {
    fn kind(&self) -> LinkKind {
        LinkKind::Hard
    }

    #[cfg(unix)]
    fn link(&self, _original: &Path, target: &Path) -> io::Result<()> {
        std::os::unix::fs::symlink("/nonexistent/dupelink/integration", target)
    }

    #[cfg(not(unix))]
    fn link(&self, _original: &Path, _target: &Path) -> io::Result<()> {
        Err(io::Error::other("unsupported"))
    }
}

/// Refuses to create anything.
struct FailingLink;

impl LinkOperation for FailingLink {
    fn kind(&self) -> LinkKind {
        LinkKind::Clone
    }

    fn link(&self, _original: &Path, _target: &Path) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "injected"))
    }
}

#[cfg(unix)]
#[test]
fn test_failure_before_rename_leaves_duplicate_intact() {
    let dir = tempdir().unwrap();
    let original = write(&dir, "original", b"payload");
    let duplicate = write(&dir, "duplicate", b"payload");
    let before = FileMeta::read(&duplicate).unwrap();

    let result = link_file(
        &original,
        &duplicate,
        &UnpreservableLink,
        &LinkConfig::default().with_strict(true),
    );

    assert!(matches!(result, Err(LinkError::Preserve { .. })));
    let after = FileMeta::read(&duplicate).unwrap();
    assert!(before.same_file(&after));
    assert_eq!(fs::read(&duplicate).unwrap(), b"payload");
    assert!(leftover_temp_names(dir.path()).is_empty());
}

#[test]
fn test_failed_creation_is_recorded_and_batch_continues() {
    let dir = tempdir().unwrap();
    write(&dir, "g1/a", b"first group");
    write(&dir, "g1/b", b"first group");
    write(&dir, "g2/a", b"second group!");
    write(&dir, "g2/b", b"second group!");

    let mut matcher = hard_link_matcher(dir.path());
    let result = link_duplicates(
        matcher.groups(),
        &FailingLink,
        &LinkConfig::default(),
        None::<&NoCallback>,
        None,
    )
    .unwrap();

    assert_eq!(result.groups, 2);
    assert_eq!(result.links_made, 0);
    assert_eq!(result.failure_count(), 2);
    assert!(!result.all_succeeded());
    assert!(result.summary().contains("2 failed"));
    assert_eq!(fs::read(dir.path().join("g1/b")).unwrap(), b"first group");
    assert!(leftover_temp_names(dir.path()).is_empty());
}

#[test]
fn test_stop_on_error_ends_batch() {
    let dir = tempdir().unwrap();
    write(&dir, "g1/a", b"first group");
    write(&dir, "g1/b", b"first group");
    write(&dir, "g2/a", b"second group!");
    write(&dir, "g2/b", b"second group!");

    let mut matcher = hard_link_matcher(dir.path());
    let result = link_duplicates(
        matcher.groups(),
        &FailingLink,
        &LinkConfig::default().with_continue_on_error(false),
        None::<&NoCallback>,
        None,
    )
    .unwrap();

    assert_eq!(result.groups, 1);
    assert_eq!(result.failure_count(), 1);
}
