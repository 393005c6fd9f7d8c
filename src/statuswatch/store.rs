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

use std::collections::HashMap;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::sync::RwLock;

use crate::statuswatch::object::ObjectKey;

/// Failure modes of an object read.
///
/// `NotFound` is terminal for the identity (the object was finalized and
/// removed); everything else is retryable.
#[derive(Debug)]
pub enum StoreError {
    NotFound(ObjectKey),
    Store(Box<dyn Error + Send + Sync>),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound(key) => write!(f, "object {key} not found"),
            StoreError::Store(source) => write!(f, "store read failed: {source}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StoreError::NotFound(_) => None,
            StoreError::Store(source) => Some(source.as_ref()),
        }
    }
}

/// Read access to the system of record for managed objects.
pub trait ObjectStore<T>: Send + Sync {
    fn get(&self, key: &ObjectKey) -> Result<T, StoreError>;
}

/// Concurrent in-memory store, used by tests and by embedders that feed the
/// controller from informer caches.
#[derive(Debug, Default)]
pub struct MemoryStore<T> {
    objects: RwLock<HashMap<ObjectKey, T>>,
}

impl<T: Clone> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, key: ObjectKey, object: T) {
        self.objects
            .write()
            .expect("memory store lock poisoned")
            .insert(key, object);
    }

    /// Simulates finalized deletion: subsequent `get` returns `NotFound`.
    pub fn remove(&self, key: &ObjectKey) -> Option<T> {
        self.objects
            .write()
            .expect("memory store lock poisoned")
            .remove(key)
    }
}

impl<T: Clone + Send + Sync> ObjectStore<T> for MemoryStore<T> {
    fn get(&self, key: &ObjectKey) -> Result<T, StoreError> {
        self.objects
            .read()
            .expect("memory store lock poisoned")
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_inserted_object() {
        let store = MemoryStore::new();
        let key = ObjectKey::new("default", "web-0");
        store.insert(key.clone(), 42u32);
        assert_eq!(store.get(&key).expect("object present"), 42);
    }

    #[test]
    fn get_after_remove_is_not_found() {
        let store = MemoryStore::new();
        let key = ObjectKey::new("default", "web-0");
        store.insert(key.clone(), 1u32);
        assert_eq!(store.remove(&key), Some(1));
        let err = store.get(&key).expect_err("object gone");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "object default/web-0 not found");
    }
}
