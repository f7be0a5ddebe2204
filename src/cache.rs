//! A thread-safe in-memory storage for the latest evaluated flags and configs. [`Cache`] provides
//! concurrent access for readers (flag reads) and writers (initialization, periodic refresh).
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{
    equality::{deep_equal, flags_equal, optional_equal},
    ChangeEvent, ConfigChange, ConfigValue, Configs, FlagChange, FlagValue, Flags,
};

#[derive(Debug, Default)]
struct Snapshot {
    flags: Flags,
    configs: Configs,
    /// Set by [`Cache::close`]; a closed cache ignores writes.
    closed: bool,
}

/// `Cache` provides a thread-safe (`Sync`) storage for flags and configs.
///
/// Flags and configs live behind a single lock, so [`Cache::seed`] and [`Cache::update`] are
/// atomic: a concurrent reader observes either the full state before a write or the full state
/// after it.
#[derive(Debug, Default)]
pub struct Cache {
    snapshot: RwLock<Snapshot>,
}

impl Cache {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Cache::default()
    }

    /// Value of flag `key`, if present.
    pub fn get_flag(&self, key: &str) -> Option<FlagValue> {
        self.read().flags.get(key).cloned()
    }

    /// Value of config `key`, if present. A stored JSON `null` is returned as `Some(Value::Null)`.
    pub fn get_config(&self, key: &str) -> Option<ConfigValue> {
        self.read().configs.get(key).cloned()
    }

    /// Copy of all flags. Mutating the copy does not affect the cache.
    pub fn all_flags(&self) -> Flags {
        self.read().flags.clone()
    }

    /// Copy of all configs. Mutating the copy does not affect the cache.
    pub fn all_configs(&self) -> Configs {
        self.read().configs.clone()
    }

    /// Whether at least one flag is stored.
    pub fn has_flags(&self) -> bool {
        !self.read().flags.is_empty()
    }

    /// Merge `flags` and `configs` into the cache, overwriting existing keys. No change detection
    /// is performed. Ignored once the cache is closed.
    pub fn seed(&self, flags: Flags, configs: Configs) {
        let mut snapshot = self.write();
        if snapshot.closed {
            return;
        }
        snapshot.flags.extend(flags);
        snapshot.configs.extend(configs);
    }

    /// Merge `flags` and `configs` into the cache, reporting every key whose value differs from the
    /// stored one.
    ///
    /// Keys missing from the input are left untouched. Returns `None` if nothing changed or the
    /// cache is closed.
    pub fn update(&self, flags: Flags, configs: Configs) -> Option<ChangeEvent> {
        let mut changes = ChangeEvent::default();
        let mut snapshot = self.write();
        if snapshot.closed {
            return None;
        }

        for (key, current) in flags {
            let previous = snapshot.flags.get(&key);
            if !optional_equal(previous, Some(&current), flags_equal) {
                changes.flags.push(FlagChange {
                    key: key.clone(),
                    previous: previous.cloned(),
                    current: current.clone(),
                });
            }
            snapshot.flags.insert(key, current);
        }

        for (key, current) in configs {
            let previous = snapshot.configs.get(&key);
            if !optional_equal(previous, Some(&current), deep_equal) {
                changes.configs.push(ConfigChange {
                    key: key.clone(),
                    previous: previous.cloned(),
                    current: current.clone(),
                });
            }
            snapshot.configs.insert(key, current);
        }

        if changes.is_empty() {
            None
        } else {
            Some(changes)
        }
    }

    /// Remove all flags and configs.
    pub fn clear(&self) {
        let mut snapshot = self.write();
        snapshot.flags.clear();
        snapshot.configs.clear();
    }

    /// Clear the cache and ignore every later [`Cache::seed`] and [`Cache::update`].
    pub fn close(&self) {
        let mut snapshot = self.write();
        snapshot.flags.clear();
        snapshot.configs.clear();
        snapshot.closed = true;
    }

    /// Whether [`Cache::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.read().closed
    }

    // No user code runs while the lock is held, so a poisoned lock still guards consistent data.
    fn read(&self) -> RwLockReadGuard<'_, Snapshot> {
        self.snapshot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Snapshot> {
        self.snapshot.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::Cache;
    use crate::{Configs, FlagValue, Flags};

    fn flags(entries: &[(&str, FlagValue)]) -> Flags {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    fn configs(entries: &[(&str, serde_json::Value)]) -> Configs {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn empty_cache_returns_none() {
        let cache = Cache::new();

        assert_eq!(cache.get_flag("dark_mode"), None);
        assert_eq!(cache.get_config("theme"), None);
        assert!(!cache.has_flags());
    }

    #[test]
    fn seed_merges_without_reporting() {
        let cache = Cache::new();
        cache.seed(flags(&[("a", true.into())]), configs(&[("x", json!(1))]));
        cache.seed(flags(&[("b", "on".into())]), Configs::new());

        assert_eq!(cache.get_flag("a"), Some(FlagValue::Boolean(true)));
        assert_eq!(cache.get_flag("b"), Some(FlagValue::from("on")));
        assert_eq!(cache.get_config("x"), Some(json!(1)));
    }

    #[test]
    fn update_reports_new_key_with_absent_previous() {
        let cache = Cache::new();

        let changes = cache
            .update(flags(&[("dark_mode", true.into())]), Configs::new())
            .unwrap();

        assert_eq!(changes.flags.len(), 1);
        assert_eq!(changes.flags[0].key, "dark_mode");
        assert_eq!(changes.flags[0].previous, None);
        assert_eq!(changes.flags[0].current, FlagValue::Boolean(true));
        assert!(changes.configs.is_empty());
    }

    #[test]
    fn update_is_idempotent() {
        let cache = Cache::new();
        let input_flags = flags(&[("dark_mode", true.into())]);
        let input_configs = configs(&[("theme", json!({"color": "blue", "sizes": [1, 2]}))]);

        assert!(cache
            .update(input_flags.clone(), input_configs.clone())
            .is_some());
        assert!(cache.update(input_flags, input_configs).is_none());
    }

    #[test]
    fn update_reports_previous_and_current() {
        let cache = Cache::new();
        cache.seed(
            flags(&[("dark_mode", true.into()), ("beta", false.into())]),
            configs(&[("theme", json!("blue"))]),
        );

        let changes = cache
            .update(
                flags(&[("dark_mode", false.into()), ("beta", false.into())]),
                configs(&[("theme", json!("red"))]),
            )
            .unwrap();

        assert_eq!(changes.flags.len(), 1);
        assert_eq!(changes.flags[0].key, "dark_mode");
        assert_eq!(changes.flags[0].previous, Some(FlagValue::Boolean(true)));
        assert_eq!(changes.flags[0].current, FlagValue::Boolean(false));
        assert_eq!(changes.configs.len(), 1);
        assert_eq!(changes.configs[0].previous, Some(json!("blue")));
        assert_eq!(changes.configs[0].current, json!("red"));
    }

    #[test]
    fn update_ignores_reordered_objects() {
        let cache = Cache::new();
        let first: FlagValue = serde_json::from_str(r#"{"a":1,"b":2}"#).unwrap();
        let second: FlagValue = serde_json::from_str(r#"{"b":2,"a":1}"#).unwrap();
        cache.seed(flags(&[("limits", first)]), Configs::new());

        assert!(cache
            .update(flags(&[("limits", second)]), Configs::new())
            .is_none());
    }

    #[test]
    fn update_keeps_missing_keys() {
        let cache = Cache::new();
        cache.seed(flags(&[("a", true.into()), ("b", true.into())]), Configs::new());

        cache.update(flags(&[("a", false.into())]), Configs::new());

        assert_eq!(cache.get_flag("b"), Some(FlagValue::Boolean(true)));
    }

    #[test]
    fn null_config_is_a_change_from_absent() {
        let cache = Cache::new();

        let changes = cache
            .update(Flags::new(), configs(&[("banner", json!(null))]))
            .unwrap();

        assert_eq!(changes.configs[0].previous, None);
        assert_eq!(cache.get_config("banner"), Some(json!(null)));
    }

    #[test]
    fn all_flags_returns_a_copy() {
        let cache = Cache::new();
        cache.seed(flags(&[("a", true.into())]), configs(&[("x", json!(1))]));

        let mut copy = cache.all_flags();
        copy.insert("a".to_owned(), false.into());
        copy.insert("b".to_owned(), true.into());
        let mut configs_copy = cache.all_configs();
        configs_copy.clear();

        assert_eq!(cache.get_flag("a"), Some(FlagValue::Boolean(true)));
        assert_eq!(cache.get_flag("b"), None);
        assert_eq!(cache.get_config("x"), Some(json!(1)));
    }

    #[test]
    fn clear_empties_everything() {
        let cache = Cache::new();
        cache.seed(flags(&[("a", true.into())]), configs(&[("x", json!(1))]));

        cache.clear();

        assert!(cache.all_flags().is_empty());
        assert!(cache.all_configs().is_empty());
    }

    #[test]
    fn closed_cache_ignores_writes() {
        let cache = Cache::new();
        cache.seed(flags(&[("a", true.into())]), Configs::new());

        cache.close();
        cache.seed(flags(&[("a", true.into())]), Configs::new());
        let changes = cache.update(flags(&[("b", false.into())]), configs(&[("c", json!(1))]));

        assert!(cache.is_closed());
        assert!(changes.is_none());
        assert_eq!(cache.get_flag("a"), None);
        assert_eq!(cache.get_flag("b"), None);
        assert_eq!(cache.get_config("c"), None);
    }

    #[test]
    fn readers_never_observe_partial_updates() {
        let cache = Arc::new(Cache::new());
        cache.seed(
            flags(&[("a", 0.into()), ("b", 0.into())]),
            configs(&[("c", json!(0))]),
        );

        let writer = {
            let cache = cache.clone();
            std::thread::spawn(move || {
                for i in 1..=500 {
                    cache.update(
                        flags(&[("a", i.into()), ("b", i.into())]),
                        configs(&[("c", json!(i))]),
                    );
                }
            })
        };

        for _ in 0..500 {
            let all = cache.all_flags();
            assert_eq!(all["a"], all["b"]);
        }
        writer.join().unwrap();

        assert_eq!(cache.get_flag("a"), Some(FlagValue::from(500)));
        assert_eq!(cache.get_config("c"), Some(json!(500)));
    }
}
