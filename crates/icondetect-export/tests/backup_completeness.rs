//! A written backup reads back as exactly the snapshot that produced it.

use icondetect_core::{Hive, KeyLocation};
use icondetect_export::{parse_backup, read_backup, render_backup, write_backup};
use proptest::prelude::*;
use std::collections::BTreeMap;

fn location() -> KeyLocation {
    KeyLocation::new(
        Hive::LocalMachine,
        r"SOFTWARE\Microsoft\Windows\CurrentVersion\Explorer\ShellIconOverlayIdentifiers",
    )
}

fn snapshot() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map("[ ]{0,2}[A-Za-z0-9_.]{1,12}[ ]{0,2}", "[ -~]{0,40}", 0..16)
}

proptest! {
    #[test]
    fn prop_parse_reconstructs_snapshot(entries in snapshot()) {
        let text = render_backup(&location(), &entries);
        let parsed = parse_backup(&text).unwrap();
        prop_assert_eq!(parsed.location, location());
        prop_assert_eq!(parsed.entries, entries);
    }

    #[test]
    fn prop_entries_are_written_in_sorted_order(entries in snapshot()) {
        let text = render_backup(&location(), &entries);
        let names: Vec<&str> = text
            .split("\r\n")
            .filter_map(|l| l.strip_prefix(&format!("[{}\\", location())))
            .filter_map(|l| l.strip_suffix(']'))
            .collect();
        let mut sorted = names.clone();
        sorted.sort();
        prop_assert_eq!(names.len(), entries.len());
        prop_assert_eq!(names, sorted);
    }
}

#[test]
fn test_file_round_trip_keeps_crlf() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("backup_20240101000000.reg");
    let entries = BTreeMap::from([
        (" Tortoise1Normal".to_string(), "{C5994560-53D9-4125-87C9-F193FC689CB2}".to_string()),
        ("OneDrive1".to_string(), "{BBACC218-34EA-4666-9D7A-C78F2274A524}".to_string()),
    ]);

    write_backup(&path, &location(), &entries).unwrap();

    let raw = std::fs::read(&path).unwrap();
    assert!(raw.windows(2).any(|w| w == b"\r\n"));
    assert!(!raw.windows(2).any(|w| w[1] == b'\n' && w[0] != b'\r'));
    assert_eq!(read_backup(&path).unwrap().entries, entries);
}
