/*
 * Copyright (C) 2025 The Statuswatch Authors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 * http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::statuswatch::condition::ConditionSet;
use crate::statuswatch::object::ObjectKey;

/// Per-controller memory of what was last observed for each object identity.
///
/// Holds the last-seen condition snapshot and the last-observed deletion
/// timestamp. Each map access is atomic per key with last-writer-wins
/// semantics; there is no cross-key or cross-map coordination, so concurrent
/// reconciles of the same identity may trade updates. Snapshots are owned
/// clones and never mutated after being stored.
#[derive(Debug, Default)]
pub struct ObservationCache {
    conditions: RwLock<HashMap<ObjectKey, ConditionSet>>,
    deletions: RwLock<HashMap<ObjectKey, DateTime<Utc>>>,
}

impl ObservationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self, key: &ObjectKey) -> Option<ConditionSet> {
        self.conditions
            .read()
            .expect("observation cache lock poisoned")
            .get(key)
            .cloned()
    }

    pub fn store(&self, key: ObjectKey, snapshot: ConditionSet) {
        self.conditions
            .write()
            .expect("observation cache lock poisoned")
            .insert(key, snapshot);
    }

    pub fn load_deletion_timestamp(&self, key: &ObjectKey) -> Option<DateTime<Utc>> {
        self.deletions
            .read()
            .expect("observation cache lock poisoned")
            .get(key)
            .copied()
    }

    pub fn store_deletion_timestamp(&self, key: ObjectKey, timestamp: DateTime<Utc>) {
        self.deletions
            .write()
            .expect("observation cache lock poisoned")
            .insert(key, timestamp);
    }

    /// Drops all memory of an identity once its deletion finalizes, bounding
    /// cache growth across object churn.
    pub fn forget(&self, key: &ObjectKey) {
        self.conditions
            .write()
            .expect("observation cache lock poisoned")
            .remove(key);
        self.deletions
            .write()
            .expect("observation cache lock poisoned")
            .remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statuswatch::condition::ConditionSet;

    #[test]
    fn load_reflects_last_store() {
        let cache = ObservationCache::new();
        let key = ObjectKey::new("default", "web-0");
        assert!(cache.load(&key).is_none());

        let mut first = ConditionSet::new();
        first.set_true("Foo");
        cache.store(key.clone(), first.clone());
        assert_eq!(cache.load(&key), Some(first));

        let mut second = ConditionSet::new();
        second.set_false("Foo", "broken", "");
        cache.store(key.clone(), second.clone());
        assert_eq!(cache.load(&key), Some(second));
    }

    #[test]
    fn deletion_timestamps_are_tracked_independently() {
        let cache = ObservationCache::new();
        let key = ObjectKey::new("default", "web-0");
        assert!(cache.load_deletion_timestamp(&key).is_none());

        let marked = Utc::now();
        cache.store_deletion_timestamp(key.clone(), marked);
        assert_eq!(cache.load_deletion_timestamp(&key), Some(marked));
        assert!(cache.load(&key).is_none());
    }

    #[test]
    fn forget_clears_both_maps() {
        let cache = ObservationCache::new();
        let key = ObjectKey::new("default", "web-0");
        cache.store(key.clone(), ConditionSet::new());
        cache.store_deletion_timestamp(key.clone(), Utc::now());

        cache.forget(&key);
        assert!(cache.load(&key).is_none());
        assert!(cache.load_deletion_timestamp(&key).is_none());
    }
}
