use dupelink::duplicates::{Criterion, DuplicateGroup, MatchCriteria, Matcher};
use dupelink::scanner::{FileMeta, Walker, WalkerConfig, PARTIAL_HASH_SIZE};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

const MIB: usize = 1024 * 1024;

fn write(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

fn matcher_for(root: &Path, criteria: MatchCriteria) -> Matcher {
    let mut matcher = Matcher::new(criteria).unwrap();
    for entry in Walker::new(root, WalkerConfig::default()).walk() {
        let entry = entry.unwrap();
        matcher.register_file(&entry.path, entry.meta).unwrap();
    }
    matcher.finalize().unwrap();
    matcher
}

fn groups_of(matcher: &mut Matcher) -> Vec<DuplicateGroup> {
    matcher.groups().collect::<Result<_, _>>().unwrap()
}

fn sorted(mut paths: Vec<PathBuf>) -> Vec<PathBuf> {
    paths.sort();
    paths
}

// ==================== Content scenarios ====================

#[test]
fn test_exact_duplicates_form_one_group() {
    let dir = tempdir().unwrap();
    let a = write(&dir, "a.txt", b"the same bytes");
    let b = write(&dir, "nested/b.txt", b"the same bytes");
    let c = write(&dir, "nested/deeper/c.txt", b"the same bytes");

    let mut matcher = matcher_for(dir.path(), MatchCriteria::default());
    let groups = groups_of(&mut matcher);

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].size, 14);
    assert_eq!(sorted(groups[0].files.clone()), sorted(vec![a, b, c]));
}

#[test]
fn test_same_size_different_content_not_grouped() {
    let dir = tempdir().unwrap();
    write(&dir, "a.bin", b"aaaaaaaa");
    write(&dir, "b.bin", b"bbbbbbbb");

    let mut matcher = matcher_for(dir.path(), MatchCriteria::default());

    assert!(groups_of(&mut matcher).is_empty());
    let stats = matcher.stats();
    assert_eq!(stats.partial_hashes, 2);
    assert_eq!(stats.full_hashes, 0);
}

#[test]
fn test_prefix_divergence_reads_only_partial_hashes() {
    let dir = tempdir().unwrap();
    let mut first = vec![0u8; 32 * MIB];
    let mut second = vec![0u8; 32 * MIB];
    first[0] = 1;
    second[0] = 2;
    write(&dir, "first.bin", &first);
    write(&dir, "second.bin", &second);

    let mut matcher = matcher_for(dir.path(), MatchCriteria::default());

    assert!(groups_of(&mut matcher).is_empty());
    let stats = matcher.stats();
    assert_eq!(stats.partial_hashes, 2);
    assert_eq!(stats.full_hashes, 0);
    assert_eq!(stats.bytes_hashed, 2 * PARTIAL_HASH_SIZE);
}

#[test]
fn test_suffix_divergence_needs_full_hashes() {
    let dir = tempdir().unwrap();
    let mut first = vec![7u8; 64 * 1024];
    let second = first.clone();
    *first.last_mut().unwrap() = 8;
    write(&dir, "first.bin", &first);
    write(&dir, "second.bin", &second);

    let mut matcher = Matcher::new(MatchCriteria::default())
        .unwrap()
        .with_partial_hash_size(4096);
    for name in ["first.bin", "second.bin"] {
        let path = dir.path().join(name);
        let meta = FileMeta::read(&path).unwrap();
        matcher.register_file(&path, meta).unwrap();
    }
    matcher.finalize().unwrap();

    assert!(groups_of(&mut matcher).is_empty());
    let stats = matcher.stats();
    assert_eq!(stats.partial_hashes, 2);
    assert_eq!(stats.full_hashes, 2);
    assert_eq!(stats.bytes_hashed, 2 * 4096 + 2 * 64 * 1024);
}

#[test]
fn test_empty_files_are_duplicates_of_each_other() {
    let dir = tempdir().unwrap();
    write(&dir, "empty1", b"");
    write(&dir, "empty2", b"");
    write(&dir, "full", b"x");

    let mut matcher = matcher_for(dir.path(), MatchCriteria::default());
    let groups = groups_of(&mut matcher);

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].size, 0);
    assert_eq!(groups[0].len(), 2);
}

// ==================== Hashing economy ====================

#[test]
fn test_unique_sizes_never_hash() {
    let dir = tempdir().unwrap();
    for i in 1..=20 {
        write(&dir, &format!("f{i:02}"), &vec![b'z'; i]);
    }

    let mut matcher = matcher_for(dir.path(), MatchCriteria::default());

    assert!(groups_of(&mut matcher).is_empty());
    let stats = matcher.stats();
    assert_eq!(stats.files, 20);
    assert_eq!(stats.partial_hashes, 0);
    assert_eq!(stats.full_hashes, 0);
    assert_eq!(stats.bytes_hashed, 0);
}

#[test]
fn test_each_file_hashed_at_most_once() {
    let dir = tempdir().unwrap();
    for i in 0..12 {
        // Four contents, three copies each, all the same size.
        let content = format!("content-{}", i % 4);
        write(&dir, &format!("copy{i:02}"), content.as_bytes());
    }

    let mut matcher = matcher_for(dir.path(), MatchCriteria::default());
    let groups = groups_of(&mut matcher);

    assert_eq!(groups.len(), 4);
    assert!(groups.iter().all(|g| g.len() == 3));
    let stats = matcher.stats();
    assert!(stats.partial_hashes <= 12);
    assert_eq!(stats.full_hashes, 0);
}

// ==================== Hard links ====================

#[cfg(unix)]
#[test]
fn test_hardlinks_group_as_one_file_by_default() {
    let dir = tempdir().unwrap();
    let original = write(&dir, "original", b"linked content");
    let link = dir.path().join("link");
    fs::hard_link(&original, &link).unwrap();

    let mut matcher = matcher_for(dir.path(), MatchCriteria::default());
    let groups = groups_of(&mut matcher);

    // Same inode compares equal without reading either file.
    assert_eq!(groups.len(), 1);
    assert_eq!(sorted(groups[0].files.clone()), vec![link, original]);
    assert_eq!(matcher.stats().bytes_hashed, 0);
}

#[cfg(unix)]
#[test]
fn test_distinct_hardlinks_are_ordered_by_path() {
    let dir = tempdir().unwrap();
    let original = write(&dir, "b-original", b"linked content");
    let link = dir.path().join("a-link");
    fs::hard_link(&original, &link).unwrap();

    let criteria = MatchCriteria::default().with(Criterion::Links);
    let mut first = matcher_for(dir.path(), criteria);
    let mut second = matcher_for(dir.path(), criteria);

    assert!(groups_of(&mut first).is_empty());
    assert_eq!(first.sorted_paths().unwrap(), vec![link.clone(), original.clone()]);
    assert_eq!(first.sorted_paths().unwrap(), second.sorted_paths().unwrap());
    assert!(groups_of(&mut second).is_empty());
}

#[cfg(unix)]
#[test]
fn test_distinct_hardlinks_still_match_other_copies() {
    let dir = tempdir().unwrap();
    let original = write(&dir, "original", b"shared payload");
    let link = dir.path().join("link");
    fs::hard_link(&original, &link).unwrap();
    let copy = write(&dir, "copy", b"shared payload");

    let criteria = MatchCriteria::default().with(Criterion::Links);
    let mut matcher = matcher_for(dir.path(), criteria);
    let groups = groups_of(&mut matcher);

    assert_eq!(
        groups,
        vec![DuplicateGroup::new(14, vec![copy, link, original])]
    );
}

// ==================== Criteria ====================

#[test]
fn test_mtime_criterion_separates_copies() {
    let dir = tempdir().unwrap();
    let old = write(&dir, "old", b"same");
    let new = write(&dir, "new", b"same");
    filetime::set_file_mtime(&old, filetime::FileTime::from_unix_time(1_000_000_000, 0)).unwrap();
    filetime::set_file_mtime(&new, filetime::FileTime::from_unix_time(1_500_000_000, 0)).unwrap();

    let mut plain = matcher_for(dir.path(), MatchCriteria::default());
    assert_eq!(groups_of(&mut plain).len(), 1);

    let criteria = MatchCriteria::from_criteria(&[Criterion::Mtime]);
    let mut strict = matcher_for(dir.path(), criteria);
    assert!(groups_of(&mut strict).is_empty());
}

#[cfg(unix)]
#[test]
fn test_mode_criterion_separates_copies() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let private = write(&dir, "private", b"same");
    write(&dir, "public", b"same");
    fs::set_permissions(&private, fs::Permissions::from_mode(0o600)).unwrap();
    fs::set_permissions(dir.path().join("public"), fs::Permissions::from_mode(0o644)).unwrap();

    let criteria = MatchCriteria::from_criteria(&[Criterion::Mode]);
    let mut matcher = matcher_for(dir.path(), criteria);

    assert!(groups_of(&mut matcher).is_empty());
}
