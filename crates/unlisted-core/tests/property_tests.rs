//! Property-based tests for FileList operations
//!
//! Uses proptest to verify the set semantics of send and receive lists.

use proptest::prelude::*;
use unlisted_core::{ContentAddress, File, FileList};

// ============================================================================
// Strategy Generators
// ============================================================================

/// File names drawn from a small alphabet so collisions actually happen
fn file_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-c]{1,2}\\.(txt|pdf)").expect("valid regex")
}

fn hash_strategy() -> impl Strategy<Value = ContentAddress> {
    prop::string::string_regex("h[0-3]")
        .expect("valid regex")
        .prop_map(ContentAddress::new)
}

fn file_strategy() -> impl Strategy<Value = File> {
    (file_name_strategy(), hash_strategy()).prop_map(|(name, hash)| File::new(name, hash))
}

fn files_strategy(max: usize) -> impl Strategy<Value = Vec<File>> {
    prop::collection::vec(file_strategy(), 0..max)
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    /// Merging the same files twice is the same as merging them once
    #[test]
    fn merge_is_idempotent(base in files_strategy(10), added in files_strategy(10)) {
        let list = FileList::new().merged(base);
        let once = list.merged(added.clone());
        let twice = once.merged(added);
        prop_assert_eq!(once, twice);
    }

    /// Merge order does not matter
    #[test]
    fn merge_is_commutative(a in files_strategy(10), b in files_strategy(10)) {
        let ab = FileList::new().merged(a.clone()).merged(b.clone());
        let ba = FileList::new().merged(b).merged(a);
        prop_assert_eq!(ab.files(), ba.files());
    }

    /// Every merged file is present and nothing else is added
    #[test]
    fn merge_is_union(base in files_strategy(10), added in files_strategy(10)) {
        let merged = FileList::new().merged(base.clone()).merged(added.clone());
        for file in base.iter().chain(added.iter()) {
            prop_assert!(merged.contains(file));
        }
        prop_assert!(merged.len() <= base.len() + added.len());
    }

    /// Removing files drops exactly those files
    #[test]
    fn without_removes_only_given_files(
        base in files_strategy(12),
        removed in files_strategy(6),
    ) {
        let list = FileList::published(ContentAddress::new("list"), base.clone());
        let filtered = list.without(&removed);

        for file in &removed {
            prop_assert!(!filtered.contains(file));
        }
        for file in &base {
            if !removed.contains(file) {
                prop_assert!(filtered.contains(file));
            }
        }
        prop_assert_eq!(filtered.hash(), list.hash());
    }

    /// The published manifest decodes to the same set of files
    #[test]
    fn encoded_manifest_decodes(files in files_strategy(16)) {
        let list = FileList::new().merged(files);
        let encoded = list.encode().unwrap();
        let decoded = FileList::decode(&encoded).unwrap();
        prop_assert_eq!(&decoded, list.files());
    }

    /// Encoding does not depend on insertion order
    #[test]
    fn encoding_is_deterministic(files in files_strategy(16)) {
        let forward = FileList::new().merged(files.clone());
        let backward = FileList::new().merged(files.into_iter().rev());
        prop_assert_eq!(forward.encode().unwrap(), backward.encode().unwrap());
    }
}
