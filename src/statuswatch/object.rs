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
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

use crate::statuswatch::condition::ConditionSet;

/// API group and kind of the resource a controller instance watches.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct GroupKind {
    pub group: String,
    pub kind: String,
}

impl GroupKind {
    pub fn new(group: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
        }
    }

    /// Lowercased kind, used to derive per-kind metric names.
    pub fn kind_label(&self) -> String {
        self.kind.to_lowercase()
    }
}

impl Display for GroupKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            f.write_str(&self.kind)
        } else {
            write!(f, "{}.{}", self.kind, self.group)
        }
    }
}

/// Namespaced identity of one managed object. This is the cache key and the
/// `namespace`/`name` metric label pair.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl Display for ObjectKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Capability surface the reconcile routine needs from a managed object.
///
/// Both strongly typed resources and [`UnstructuredObject`] satisfy this, so
/// the routine never depends on a concrete representation.
///
/// [`UnstructuredObject`]: crate::statuswatch::unstructured::UnstructuredObject
pub trait StatusObject: Send + Sync {
    /// Snapshot of the object's status conditions as currently stored.
    fn status_conditions(&self) -> ConditionSet;

    /// Deletion timestamp, present once the object is marked for deletion.
    fn deletion_timestamp(&self) -> Option<DateTime<Utc>>;
}
