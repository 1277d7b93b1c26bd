//! Detect, fix, detect again: the second pass finds nothing to do.

use icondetect_core::{DetectConfig, Entry};
use icondetect_export::{parse_backup, render_backup};
use icondetect_repair::Repairer;
use icondetect_scan::Detector;
use icondetect_store::MemoryStore;
use proptest::prelude::*;
use std::collections::{BTreeMap, HashSet};

const BOOSTED: &[&str] = &["Tortoise1Normal", "Tortoise2Modified", "OneDrive1"];

fn config() -> DetectConfig {
    DetectConfig::builder().boost(BOOSTED.iter().copied()).build().unwrap()
}

fn raw_names() -> impl Strategy<Value = Vec<String>> {
    let base = prop::sample::select(vec![
        "Tortoise1Normal",
        "Tortoise2Modified",
        "OneDrive1",
        "DropboxExt01",
        "GitShell",
    ]);
    let name = (0..3usize, base, 0..3usize)
        .prop_map(|(lead, base, trail)| format!("{}{}{}", " ".repeat(lead), base, " ".repeat(trail)));
    prop::collection::vec(name, 0..12).prop_map(|names| {
        let mut seen = HashSet::new();
        names
            .into_iter()
            .filter(|n| seen.insert(n.to_ascii_lowercase()))
            .collect()
    })
}

fn populate(names: &[String]) -> MemoryStore {
    MemoryStore::from_entries(
        &config().parent_path,
        names
            .iter()
            .enumerate()
            .map(|(i, name)| Entry::new(name.clone(), format!("{{{:08X}}}", i))),
    )
}

proptest! {
    #[test]
    fn prop_second_pass_is_clean(names in raw_names()) {
        let store = populate(&names);
        let first = Detector::new(config()).detect(&store).unwrap();
        let survivors = first.survivors().clone();

        let report = Repairer::new(&store).fix(first).unwrap();
        prop_assert_eq!(report.failed, 0);

        let second = Detector::new(config()).detect(&store).unwrap();
        prop_assert!(!second.changed());
        prop_assert_eq!(second.survivors(), &survivors);

        let before = store.mutations();
        let report = Repairer::new(&store).fix(second).unwrap();
        prop_assert!(report.records.is_empty());
        prop_assert_eq!(store.mutations(), before);
    }

    #[test]
    fn prop_fixed_names_are_canonical_or_boosted(names in raw_names()) {
        let store = populate(&names);
        let result = Detector::new(config()).detect(&store).unwrap();
        Repairer::new(&store).fix(result).unwrap();

        for entry in store.entries(&config().parent_path).unwrap() {
            let trimmed = entry.raw_name.trim();
            if BOOSTED.contains(&trimmed) {
                prop_assert_eq!(entry.raw_name.clone(), format!(" {}", trimmed));
            } else {
                prop_assert_eq!(entry.raw_name.as_str(), trimmed);
            }
        }
    }

    #[test]
    fn prop_restore_returns_to_backup(names in raw_names()) {
        let store = populate(&names);
        let result = Detector::new(config()).detect(&store).unwrap();
        let text = render_backup(result.location(), result.backup());
        Repairer::new(&store).fix(result).unwrap();

        let backup = parse_backup(&text).unwrap();
        let report = Repairer::new(&store).restore(&backup).unwrap();
        prop_assert_eq!(report.failed, 0);

        let restored: BTreeMap<String, String> = store
            .entries(&config().parent_path)
            .unwrap()
            .into_iter()
            .map(|e| (e.raw_name, e.value))
            .collect();
        prop_assert_eq!(restored, backup.entries);
    }
}

#[test]
fn test_names_differing_in_case_settle_in_one_pass() {
    let config = DetectConfig::builder().boost(["Foo"]).build().unwrap();
    let store = MemoryStore::from_entries(
        &config.parent_path,
        vec![Entry::new("foo ", "A"), Entry::new("Foo", "B")],
    );

    let first = Detector::new(config.clone()).detect(&store).unwrap();
    assert_eq!(first.renames().get("Foo"), Some(&" Foo".to_string()));
    assert_eq!(first.renames().get("foo "), Some(&"foo".to_string()));

    let report = Repairer::new(&store).fix(first).unwrap();
    assert_eq!(report.renamed, 2);
    assert_eq!(report.failed, 0);

    let second = Detector::new(config.clone()).detect(&store).unwrap();
    assert!(!second.changed());
    assert_eq!(
        store.entries(&config.parent_path).unwrap(),
        vec![Entry::new(" Foo", "B"), Entry::new("foo", "A")]
    );
}
