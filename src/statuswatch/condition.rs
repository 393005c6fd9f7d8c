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

/// Reserved type of the synthesized aggregate condition.
pub const CONDITION_READY: &str = "Ready";

const REASON_AWAITING_RECONCILIATION: &str = "AwaitingReconciliation";
const REASON_NOT_READY: &str = "NotReady";

/// Tri-state status of a condition, mirroring the Kubernetes wire form.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl ConditionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
            ConditionStatus::Unknown => "Unknown",
        }
    }

    /// Parses the Kubernetes string form; anything unrecognized maps to
    /// `Unknown` so stale or malformed store content never aborts a read.
    pub fn parse(value: &str) -> Self {
        match value {
            "True" => ConditionStatus::True,
            "False" => ConditionStatus::False,
            _ => ConditionStatus::Unknown,
        }
    }
}

impl Display for ConditionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One status fact about a managed object. At most one condition per type
/// exists within a [`ConditionSet`].
///
/// `last_transition_time` is the instant the status change was recorded on
/// the object itself, not when this process observed it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: ConditionStatus,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "lastTransitionTime")]
    pub last_transition_time: DateTime<Utc>,
    #[serde(
        rename = "observedGeneration",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub observed_generation: Option<i64>,
}

/// Ordered mapping from condition type to [`Condition`], maintaining the
/// synthesized aggregate `Ready` entry.
///
/// `Ready` is True iff every other condition is True (vacuously True when
/// there are none), False if any is False, and Unknown otherwise. Its
/// `last_transition_time` refreshes only when the derived status changes.
/// Ordering is insertion order of first-seen type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionSet {
    conditions: Vec<Condition>,
}

impl ConditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a read-side snapshot from conditions observed on an object,
    /// verbatim: no root synthesis and no transition-time rewriting.
    pub fn from_observed(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }

    /// Seeds every absent declared type (and `Ready`) as Unknown. This is
    /// the lazy first-touch initialization of a managed object's conditions.
    pub fn initialize<I, S>(&mut self, types: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for condition_type in types {
            let condition_type = condition_type.as_ref();
            if self.get(condition_type).is_none() {
                self.upsert(
                    condition_type,
                    ConditionStatus::Unknown,
                    REASON_AWAITING_RECONCILIATION,
                    "",
                );
            }
        }
        self.recompute_root();
    }

    /// Exact lookup by type, no derivation.
    pub fn get(&self, condition_type: &str) -> Option<&Condition> {
        self.conditions
            .iter()
            .find(|condition| condition.condition_type == condition_type)
    }

    /// Snapshot of all entries including `Ready`, in insertion order.
    pub fn list(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// The aggregate condition, if the set has been touched.
    pub fn root(&self) -> Option<&Condition> {
        self.get(CONDITION_READY)
    }

    pub fn set_true(&mut self, condition_type: &str) {
        self.set_true_with_reason(condition_type, condition_type, "");
    }

    pub fn set_true_with_reason(&mut self, condition_type: &str, reason: &str, message: &str) {
        self.upsert(condition_type, ConditionStatus::True, reason, message);
        self.recompute_root();
    }

    pub fn set_false(&mut self, condition_type: &str, reason: &str, message: &str) {
        self.upsert(condition_type, ConditionStatus::False, reason, message);
        self.recompute_root();
    }

    pub fn set_unknown(&mut self, condition_type: &str) {
        self.upsert(
            condition_type,
            ConditionStatus::Unknown,
            REASON_AWAITING_RECONCILIATION,
            "",
        );
        self.recompute_root();
    }

    /// Removes the entry for `condition_type`, returning whether anything
    /// was removed. Removal is not a status transition: the root is
    /// re-derived over the remaining entries only.
    pub fn clear(&mut self, condition_type: &str) -> bool {
        let before = self.conditions.len();
        self.conditions
            .retain(|condition| condition.condition_type != condition_type);
        let removed = self.conditions.len() != before;
        if removed {
            self.recompute_root();
        }
        removed
    }

    fn upsert(&mut self, condition_type: &str, status: ConditionStatus, reason: &str, message: &str) {
        let now = Utc::now();
        match self
            .conditions
            .iter_mut()
            .find(|condition| condition.condition_type == condition_type)
        {
            Some(existing) => {
                if existing.status != status {
                    existing.last_transition_time = now;
                }
                existing.status = status;
                existing.reason = reason.to_string();
                existing.message = message.to_string();
            }
            None => self.conditions.push(Condition {
                condition_type: condition_type.to_string(),
                status,
                reason: reason.to_string(),
                message: message.to_string(),
                last_transition_time: now,
                observed_generation: None,
            }),
        }
    }

    fn recompute_root(&mut self) {
        let mut derived = ConditionStatus::True;
        let mut pending: Vec<&str> = Vec::new();
        for condition in &self.conditions {
            if condition.condition_type == CONDITION_READY {
                continue;
            }
            match condition.status {
                ConditionStatus::False => {
                    derived = ConditionStatus::False;
                    pending.push(&condition.condition_type);
                }
                ConditionStatus::Unknown => {
                    if derived != ConditionStatus::False {
                        derived = ConditionStatus::Unknown;
                    }
                    pending.push(&condition.condition_type);
                }
                ConditionStatus::True => {}
            }
        }
        let (reason, message) = match derived {
            ConditionStatus::True => (CONDITION_READY.to_string(), String::new()),
            ConditionStatus::False => (REASON_NOT_READY.to_string(), pending.join(", ")),
            ConditionStatus::Unknown => {
                (REASON_AWAITING_RECONCILIATION.to_string(), pending.join(", "))
            }
        };
        self.upsert(CONDITION_READY, derived, &reason, &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_true_when_all_dependents_true() {
        let mut set = ConditionSet::new();
        set.set_true("Foo");
        set.set_true("Bar");
        set.set_true("Baz");
        assert_eq!(set.root().map(|c| c.status), Some(ConditionStatus::True));
        assert_eq!(set.root().map(|c| c.reason.as_str()), Some(CONDITION_READY));
    }

    #[test]
    fn root_is_false_when_any_dependent_false() {
        let mut set = ConditionSet::new();
        set.set_true("Foo");
        set.set_false("Bar", "broken", "bar failed");
        assert_eq!(set.root().map(|c| c.status), Some(ConditionStatus::False));
        assert_eq!(set.root().map(|c| c.message.as_str()), Some("Bar"));
    }

    #[test]
    fn root_is_unknown_when_any_dependent_unknown_and_none_false() {
        let mut set = ConditionSet::new();
        set.set_true("Foo");
        set.set_unknown("Bar");
        assert_eq!(set.root().map(|c| c.status), Some(ConditionStatus::Unknown));
    }

    #[test]
    fn root_is_vacuously_true_for_empty_set() {
        let mut set = ConditionSet::new();
        set.initialize(Vec::<&str>::new());
        assert_eq!(set.root().map(|c| c.status), Some(ConditionStatus::True));
    }

    #[test]
    fn initialize_seeds_declared_types_unknown() {
        let mut set = ConditionSet::new();
        set.initialize(["Foo", "Bar"]);
        assert_eq!(
            set.get("Foo").map(|c| c.status),
            Some(ConditionStatus::Unknown)
        );
        assert_eq!(
            set.get("Bar").map(|c| c.status),
            Some(ConditionStatus::Unknown)
        );
        assert_eq!(set.root().map(|c| c.status), Some(ConditionStatus::Unknown));
    }

    #[test]
    fn status_equal_write_keeps_transition_time() {
        let mut set = ConditionSet::new();
        set.set_true("Foo");
        let first = set.get("Foo").expect("condition present").last_transition_time;
        std::thread::sleep(std::time::Duration::from_millis(5));
        set.set_true_with_reason("Foo", "again", "still true");
        let second = set.get("Foo").expect("condition present");
        assert_eq!(second.last_transition_time, first);
        assert_eq!(second.reason, "again");
    }

    #[test]
    fn status_change_refreshes_transition_time_and_root() {
        let mut set = ConditionSet::new();
        set.set_true("Foo");
        let root_before = set.root().expect("root present").last_transition_time;
        let foo_before = set.get("Foo").expect("condition present").last_transition_time;
        std::thread::sleep(std::time::Duration::from_millis(5));
        set.set_false("Foo", "broken", "");
        let foo_after = set.get("Foo").expect("condition present");
        assert!(foo_after.last_transition_time > foo_before);
        let root_after = set.root().expect("root present");
        assert_eq!(root_after.status, ConditionStatus::False);
        assert!(root_after.last_transition_time > root_before);
    }

    #[test]
    fn clear_removes_entry_and_rederives_root() {
        let mut set = ConditionSet::new();
        set.set_true("Foo");
        set.set_false("Bar", "broken", "");
        assert_eq!(set.root().map(|c| c.status), Some(ConditionStatus::False));
        assert!(set.clear("Bar"));
        assert!(!set.clear("Bar"));
        assert!(set.get("Bar").is_none());
        assert_eq!(set.root().map(|c| c.status), Some(ConditionStatus::True));
    }

    #[test]
    fn listing_preserves_first_seen_order() {
        let mut set = ConditionSet::new();
        set.set_true("Foo");
        set.set_true("Bar");
        set.set_false("Foo", "flip", "");
        let types: Vec<&str> = set.list().iter().map(|c| c.condition_type.as_str()).collect();
        assert_eq!(types, vec!["Foo", CONDITION_READY, "Bar"]);
    }

    #[test]
    fn status_parse_defaults_to_unknown() {
        assert_eq!(ConditionStatus::parse("True"), ConditionStatus::True);
        assert_eq!(ConditionStatus::parse("False"), ConditionStatus::False);
        assert_eq!(ConditionStatus::parse("bogus"), ConditionStatus::Unknown);
    }
}
