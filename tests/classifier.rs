// tests/classifier.rs

use std::path::{Path, PathBuf};

use regex::Regex;

use settled::watch::{classify, Classification, Operation};

fn p(s: &str) -> PathBuf {
    PathBuf::from(s)
}

#[test]
fn file_writes_and_creates_are_activity() {
    for op in [Operation::Create, Operation::Write] {
        assert_eq!(
            classify(Path::new("/w/a.txt"), op, false, None),
            Classification::Activity(p("/w/a.txt"))
        );
    }
}

#[test]
fn file_removes_and_renames_are_removals() {
    for op in [Operation::Remove, Operation::Rename] {
        assert_eq!(
            classify(Path::new("/w/a.txt"), op, false, None),
            Classification::Removal(p("/w/a.txt"))
        );
    }
}

#[test]
fn directory_operations_are_structural() {
    assert_eq!(
        classify(Path::new("/w/sub"), Operation::Create, true, None),
        Classification::RegisterTree(p("/w/sub"))
    );
    assert_eq!(
        classify(Path::new("/w/sub"), Operation::Remove, true, None),
        Classification::UnregisterTree(p("/w/sub"))
    );
    assert_eq!(
        classify(Path::new("/w/sub"), Operation::Rename, true, None),
        Classification::UnregisterTree(p("/w/sub"))
    );
    assert_eq!(
        classify(Path::new("/w/sub"), Operation::Write, true, None),
        Classification::Ignored
    );
}

#[test]
fn permission_changes_are_ignored() {
    assert_eq!(
        classify(Path::new("/w/a"), Operation::PermissionChange, false, None),
        Classification::Ignored
    );
    assert_eq!(
        classify(Path::new("/w/d"), Operation::PermissionChange, true, None),
        Classification::Ignored
    );
}

#[test]
fn exclusion_matches_the_full_path() {
    let re = Regex::new(r"\.part$").unwrap();
    assert_eq!(
        classify(Path::new("/w/upload.part"), Operation::Write, false, Some(&re)),
        Classification::Ignored
    );
    assert_eq!(
        classify(Path::new("/w/upload.bin"), Operation::Write, false, Some(&re)),
        Classification::Activity(p("/w/upload.bin"))
    );

    let dir_re = Regex::new("/tmp-cache").unwrap();
    assert_eq!(
        classify(Path::new("/w/tmp-cache"), Operation::Create, true, Some(&dir_re)),
        Classification::Ignored
    );
    assert_eq!(
        classify(Path::new("/w/tmp-cache/inner.txt"), Operation::Create, false, Some(&dir_re)),
        Classification::Ignored
    );
}
