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
use std::collections::VecDeque;
use std::fmt::{self, Display, Formatter};
use std::sync::RwLock;

use crate::statuswatch::object::ObjectKey;

const DEFAULT_RETENTION: usize = 256;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum EventSeverity {
    Normal,
    Warning,
}

impl Display for EventSeverity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            EventSeverity::Normal => f.write_str("Normal"),
            EventSeverity::Warning => f.write_str("Warning"),
        }
    }
}

/// Human-readable record of something that happened to a managed object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub object: ObjectKey,
    pub kind: String,
    pub severity: EventSeverity,
    pub reason: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Fire-and-forget event delivery. Implementations must never block the
/// caller for long and must swallow their own failures; emission problems
/// are logged by the sink, not surfaced to reconciliation.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Bounded in-memory sink retaining the most recent events.
///
/// Doubles as the fake recorder in tests and as a minimal sink for embedders
/// that expose events over their own API.
#[derive(Debug)]
pub struct EventBuffer {
    retention: usize,
    events: RwLock<VecDeque<Event>>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }

    pub fn with_retention(retention: usize) -> Self {
        Self {
            retention: retention.max(1),
            events: RwLock::new(VecDeque::new()),
        }
    }

    /// Snapshot of retained events, oldest first.
    pub fn list(&self) -> Vec<Event> {
        self.events
            .read()
            .expect("event buffer lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.read().expect("event buffer lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for EventBuffer {
    fn emit(&self, event: Event) {
        let mut events = self.events.write().expect("event buffer lock poisoned");
        while events.len() >= self.retention {
            events.pop_front();
        }
        events.push_back(event);
    }
}
