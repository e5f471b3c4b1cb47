//! Property-based tests for cache maintenance
//! For any mix of fresh and stale entries, garbage collection removes exactly
//! the stale ones and clearing removes all of them.

use std::collections::BTreeMap;
use std::fs::File;
use std::time::{Duration, SystemTime};

use filecache::{CacheConfig, FileCache};
use proptest::prelude::*;
use tempfile::TempDir;

const TTL_SECS: u64 = 300;

/// Entry name -> age in seconds; ages well clear of the TTL boundary
fn entries_strategy() -> impl Strategy<Value = BTreeMap<String, u64>> {
    prop::collection::btree_map(
        "[a-z0-9]{1,12}",
        prop_oneof![0..TTL_SECS - 10, TTL_SECS + 10..TTL_SECS * 10],
        0..20,
    )
}

fn populate(cache: &FileCache, dir: &std::path::Path, entries: &BTreeMap<String, u64>) {
    for (name, age) in entries {
        cache.cache_value(name.clone(), Some(name.as_str())).unwrap();
        let file = File::options().write(true).open(dir.join(name)).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(*age))
            .unwrap();
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_garbage_collect_removes_exactly_stale(entries in entries_strategy()) {
        let temp_dir = TempDir::new().unwrap();
        let cache = FileCache::new(
            CacheConfig::default()
                .with_cache_dir(temp_dir.path())
                .with_ttl(Duration::from_secs(TTL_SECS)),
        );
        populate(&cache, temp_dir.path(), &entries);

        let report = cache.garbage_collect().unwrap();
        let stale = entries.values().filter(|age| **age > TTL_SECS).count();
        prop_assert_eq!(report.removed, stale);
        prop_assert_eq!(report.retained, entries.len() - stale);

        for (name, age) in &entries {
            prop_assert_eq!(temp_dir.path().join(name).exists(), *age < TTL_SECS);
            prop_assert_eq!(cache.is_cached(name.as_str()), *age < TTL_SECS);
        }
    }

    #[test]
    fn prop_clear_removes_everything(entries in entries_strategy()) {
        let temp_dir = TempDir::new().unwrap();
        let cache = FileCache::new(
            CacheConfig::default()
                .with_cache_dir(temp_dir.path())
                .with_ttl(Duration::from_secs(TTL_SECS)),
        );
        populate(&cache, temp_dir.path(), &entries);

        let report = cache.clear_cache().unwrap();
        prop_assert_eq!(report.removed, entries.len());
        prop_assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }
}
