//! Name resolution and inode table consistency through the dispatcher.

#![cfg(unix)]

mod common;

use common::*;
use pathfuse::{FileKind, MountConfig, Outcome, ROOT_INODE};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[test]
fn test_lookup_roundtrip() {
    let t = TestFs::new();
    t.seed_file("a", b"content");

    let ino = t.lookup_ino(ROOT_INODE, "a");
    assert_ne!(ino, ROOT_INODE);
    assert_eq!(t.fs.inodes().resolve(ino).unwrap(), t.root().join("a"));

    assert_eq!(t.lookup_ino(ROOT_INODE, "a"), ino, "repeat lookup is stable");
    assert_eq!(t.fs.inodes().nlookup(ino), Some(2));
}

#[test]
fn test_lookup_entry_carries_attributes() {
    let t = TestFs::new();
    t.seed_file("sized", b"0123456789");

    let entry = expect_entry(t.lookup(ROOT_INODE, "sized"));
    assert_eq!(entry.attr.size, 10);
    assert_eq!(entry.attr.kind, FileKind::RegularFile);
    assert_eq!(entry.attr.ino, entry.ino());
    assert_eq!(entry.generation, 1);
    assert_eq!(entry.attr_ttl, Duration::ZERO);
    assert_eq!(entry.entry_ttl, Duration::ZERO);
}

#[test]
fn test_lookup_missing_leaves_table_unchanged() {
    let t = TestFs::new();
    let before = t.fs.inodes().len();

    expect_errno(t.lookup(ROOT_INODE, "missing"), libc::ENOENT);
    assert_eq!(t.fs.inodes().len(), before);
    assert!(t.fs.inodes().inode_of(&t.root().join("missing")).is_none());
}

#[test]
fn test_lookup_unknown_parent_does_no_io() {
    let t = TestFs::new();
    t.storage().reset();

    expect_errno(t.lookup(9999, "a"), libc::ENOENT);
    assert_eq!(t.storage().total(), 0);
}

#[test]
fn test_lookup_dot_entries() {
    let t = TestFs::new();
    let dir = t.mkdir(ROOT_INODE, "d");

    assert_eq!(t.lookup_ino(ROOT_INODE, "."), ROOT_INODE);
    assert_eq!(t.lookup_ino(ROOT_INODE, ".."), ROOT_INODE, "root is its own parent");
    assert_eq!(t.lookup_ino(dir.ino(), "."), dir.ino());
    assert_eq!(t.lookup_ino(dir.ino(), ".."), ROOT_INODE);
}

#[test]
fn test_lookup_rejects_multi_component_names() {
    let t = TestFs::new();
    t.seed_file("sub/file", b"");

    expect_errno(t.lookup(ROOT_INODE, "sub/file"), libc::EINVAL);
    expect_errno(t.lookup(ROOT_INODE, ""), libc::EINVAL);
}

// Some filesystems (APFS) refuse names that are not valid UTF-8.
#[cfg(target_os = "linux")]
#[test]
fn test_lookup_non_utf8_name() {
    use std::os::unix::ffi::OsStrExt;

    let t = TestFs::new();
    let name = OsStr::from_bytes(b"caf\xe9");
    std::fs::write(t.root().join(name), b"x").unwrap();

    let outcome = call(|r| t.fs.lookup(&ctx(), ROOT_INODE, name, r));
    let entry = expect_entry(outcome);
    assert_eq!(t.fs.inodes().resolve(entry.ino()).unwrap(), t.root().join(name));
}

#[test]
fn test_created_inodes_resolve_through_getattr() {
    let t = TestFs::new();

    let dir = t.mkdir(ROOT_INODE, "dir");
    let (file, opened) = t.create(dir.ino(), "file");
    let _ = t.release(file.ino(), opened.fh);

    let link = expect_entry(call(|r| {
        t.fs.symlink(&ctx(), ROOT_INODE, OsStr::new("ln"), Path::new("dir/file"), r);
    }));
    let hard = expect_entry(call(|r| {
        t.fs.link(&ctx(), file.ino(), ROOT_INODE, OsStr::new("hard"), r);
    }));

    for (entry, kind) in [
        (dir, FileKind::Directory),
        (file, FileKind::RegularFile),
        (link, FileKind::Symlink),
        (hard, FileKind::RegularFile),
    ] {
        match t.getattr(entry.ino()) {
            Outcome::Attr { attr, .. } => {
                assert_eq!(attr.ino, entry.ino());
                assert_eq!(attr.kind, kind);
            }
            other => panic!("getattr failed for {:?}: {other:?}", entry.ino()),
        }
        assert_eq!(t.fs.inodes().nlookup(entry.ino()), Some(1));
    }
}

#[test]
fn test_symlink_and_readlink() {
    let t = TestFs::new();
    let link = expect_entry(call(|r| {
        t.fs.symlink(&ctx(), ROOT_INODE, OsStr::new("ln"), Path::new("some/target"), r);
    }));

    let outcome = call(|r| t.fs.readlink(&ctx(), link.ino(), r));
    assert_eq!(outcome, Outcome::Readlink(PathBuf::from("some/target")));
}

#[test]
fn test_link_shares_content() {
    let t = TestFs::new();
    let (file, opened) = t.create(ROOT_INODE, "orig");
    assert_eq!(t.write(file.ino(), opened.fh, 0, b"shared"), Outcome::Written(6));

    let hard = expect_entry(call(|r| {
        t.fs.link(&ctx(), file.ino(), ROOT_INODE, OsStr::new("copy"), r);
    }));
    assert_ne!(hard.ino(), file.ino(), "identifiers follow paths");
    assert_eq!(hard.attr.nlink, 2);
    assert_eq!(hard.attr.size, 6);
}

#[test]
fn test_mkdir_existing_is_eexist() {
    let t = TestFs::new();
    t.mkdir(ROOT_INODE, "d");
    let outcome = call(|r| t.fs.mkdir(&ctx(), ROOT_INODE, OsStr::new("d"), 0o755, r));
    expect_errno(outcome, libc::EEXIST);
}

#[test]
fn test_unlink_unbinds_inode() {
    let t = TestFs::new();
    let (file, opened) = t.create(ROOT_INODE, "gone");
    let _ = t.release(file.ino(), opened.fh);

    assert_eq!(t.unlink(ROOT_INODE, "gone"), Outcome::Ok);
    assert!(t.fs.inodes().resolve(file.ino()).is_err());
    expect_errno(t.getattr(file.ino()), libc::ENOENT);
    expect_errno(t.unlink(ROOT_INODE, "gone"), libc::ENOENT);
}

#[test]
fn test_rmdir_unbinds_and_reports_errors() {
    let t = TestFs::new();
    let dir = t.mkdir(ROOT_INODE, "d");
    t.seed_file("d/child", b"");

    expect_errno(t.rmdir(ROOT_INODE, "d"), libc::ENOTEMPTY);
    assert!(t.fs.inodes().resolve(dir.ino()).is_ok(), "failed rmdir keeps the inode");

    std::fs::remove_file(t.root().join("d/child")).unwrap();
    assert_eq!(t.rmdir(ROOT_INODE, "d"), Outcome::Ok);
    expect_errno(t.getattr(dir.ino()), libc::ENOENT);
}

#[test]
fn test_forget_evicts_at_zero() {
    let t = TestFs::new();
    t.seed_file("f", b"");
    let ino = t.lookup_ino(ROOT_INODE, "f");
    t.lookup_ino(ROOT_INODE, "f");

    t.fs.forget(&ctx(), ino, 1);
    assert!(t.fs.inodes().resolve(ino).is_ok());
    t.fs.batch_forget(&ctx(), &[(ino, 1), (ROOT_INODE, 100)]);
    assert!(t.fs.inodes().resolve(ino).is_err());
    assert!(t.fs.inodes().resolve(ROOT_INODE).is_ok());

    // A later lookup rebinds the same identifier.
    assert_eq!(t.lookup_ino(ROOT_INODE, "f"), ino);
}

#[test]
fn test_configured_generation_ttl_and_owner() {
    let config = MountConfig::with_ttl(Duration::from_secs(1), Duration::from_secs(2))
        .generation(9)
        .owner(4321, 8765)
        .async_reads(false);
    let t = TestFs::with_config(config);
    t.seed_file("f", b"");

    let entry = expect_entry(t.lookup(ROOT_INODE, "f"));
    assert_eq!(entry.generation, 9);
    assert_eq!(entry.attr_ttl, Duration::from_secs(1));
    assert_eq!(entry.entry_ttl, Duration::from_secs(2));
    assert_eq!((entry.attr.uid, entry.attr.gid), (4321, 8765));

    match t.getattr(entry.ino()) {
        Outcome::Attr { attr, ttl } => {
            assert_eq!(ttl, Duration::from_secs(1));
            assert_eq!(attr.uid, 4321);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_concurrent_lookups_agree() {
    let t = TestFs::new();
    for i in 0..16 {
        t.seed_file(format!("f{i}"), b"");
    }

    let results: Vec<Vec<u64>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    (0..16)
                        .map(|i| t.lookup_ino(ROOT_INODE, &format!("f{i}")))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for other in &results[1..] {
        assert_eq!(other, &results[0]);
    }
    assert_eq!(t.fs.inodes().len(), 17);
    assert_eq!(t.fs.inodes().nlookup(results[0][0]), Some(8));
}
