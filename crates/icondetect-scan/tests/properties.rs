//! Property tests for duplicate detection and rename planning

use icondetect_core::{CanonicalName, DetectConfig, Entry};
use icondetect_scan::Detector;
use icondetect_store::{FaultKind, MemoryStore};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashSet};

const BOOSTED: &[&str] = &["Foo", "Tortoise1Normal"];

fn config() -> DetectConfig {
    DetectConfig::builder().boost(BOOSTED.iter().copied()).build().unwrap()
}

/// Raw names built from a small alphabet of canonical names and padding, so
/// collisions are common. Names unique ASCII-case-insensitively, as the
/// registry enforces.
fn raw_names() -> impl Strategy<Value = Vec<String>> {
    let canonical = prop::sample::select(vec!["Foo", "Bar", "Tortoise1Normal", "Baz"]);
    let padding = prop::sample::select(vec!["", " ", "  ", "\t"]);
    prop::collection::vec((padding.clone(), canonical, padding), 0..12).prop_map(|parts| {
        let mut seen = HashSet::new();
        parts
            .into_iter()
            .map(|(lead, name, trail)| format!("{lead}{name}{trail}"))
            .filter(|n| seen.insert(n.to_ascii_lowercase()))
            .collect()
    })
}

fn store_for(names: &[String]) -> MemoryStore {
    MemoryStore::from_entries(
        &config().parent_path,
        names
            .iter()
            .enumerate()
            .map(|(i, n)| Entry::new(n.clone(), format!("{{value-{i}}}"))),
    )
}

proptest! {
    #[test]
    fn prop_exactly_first_of_each_collision_survives(names in raw_names()) {
        let result = Detector::new(config()).detect(&store_for(&names)).unwrap();

        let mut first: BTreeMap<String, &String> = BTreeMap::new();
        let mut expected_deletions = Vec::new();
        for name in &names {
            let canonical = name.trim().to_string();
            if first.contains_key(&canonical) {
                expected_deletions.push(name.clone());
            } else {
                first.insert(canonical, name);
            }
        }

        prop_assert_eq!(result.deletions(), expected_deletions.as_slice());
        prop_assert_eq!(result.survivors().len(), first.len());
        for (canonical, raw) in &first {
            let idx = names.iter().position(|n| n == *raw).unwrap();
            prop_assert_eq!(
                &result.survivors()[&CanonicalName::from_raw(canonical)],
                &format!("{{value-{idx}}}")
            );
        }
    }

    #[test]
    fn prop_rename_iff_desired_differs(names in raw_names()) {
        let result = Detector::new(config()).detect(&store_for(&names)).unwrap();
        let deletions: BTreeSet<&String> = result.deletions().iter().collect();

        for name in names.iter().filter(|n| !deletions.contains(n)) {
            let canonical = name.trim();
            let desired = if BOOSTED.contains(&canonical) {
                format!(" {canonical}")
            } else {
                canonical.to_string()
            };
            if desired == *name {
                prop_assert!(!result.renames().contains_key(name));
            } else {
                prop_assert_eq!(&result.renames()[name], &desired);
            }
        }
        prop_assert_eq!(
            result.changed(),
            !result.deletions().is_empty() || !result.renames().is_empty()
        );
    }

    #[test]
    fn prop_backup_holds_every_entry(names in raw_names()) {
        let result = Detector::new(config()).detect(&store_for(&names)).unwrap();
        prop_assert_eq!(result.backup().len(), names.len());
        for (i, name) in names.iter().enumerate() {
            prop_assert_eq!(&result.backup()[name], &format!("{{value-{i}}}"));
        }
    }

    #[test]
    fn prop_unreadable_entry_behaves_as_absent(names in raw_names(), pick in any::<prop::sample::Index>()) {
        prop_assume!(!names.is_empty());
        let victim = pick.get(&names).clone();

        let faulty = store_for(&names);
        faulty.inject_fault(FaultKind::Read, &config().location().child(&victim));
        let with_fault = Detector::new(config()).detect(&faulty).unwrap();

        let remaining: Vec<String> = names.iter().filter(|n| **n != victim).cloned().collect();
        let absent = MemoryStore::from_entries(
            &config().parent_path,
            names
                .iter()
                .enumerate()
                .filter(|(_, n)| **n != victim)
                .map(|(i, n)| Entry::new(n.clone(), format!("{{value-{i}}}"))),
        );
        let without = Detector::new(config()).detect(&absent).unwrap();

        prop_assert_eq!(remaining.len() + 1, names.len());
        prop_assert_eq!(with_fault.backup(), without.backup());
        prop_assert_eq!(with_fault.survivors(), without.survivors());
        prop_assert_eq!(with_fault.deletions(), without.deletions());
        prop_assert_eq!(with_fault.renames(), without.renames());
        prop_assert_eq!(with_fault.skipped().len(), 1);
    }
}
