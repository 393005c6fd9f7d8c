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
use serde_json::Value;

use crate::statuswatch::condition::{Condition, ConditionSet, ConditionStatus};
use crate::statuswatch::object::StatusObject;

/// Schema-less view over any stored resource document.
///
/// Extraction is defensive throughout: a missing `status`, a
/// `status.conditions` that is not an array, non-object entries, or an
/// unparseable timestamp all degrade to "nothing observed" rather than an
/// error, since arbitrary resource kinds carry arbitrary status shapes.
#[derive(Clone, Debug)]
pub struct UnstructuredObject {
    body: Value,
}

impl UnstructuredObject {
    pub fn new(body: Value) -> Self {
        Self { body }
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    fn parse_condition(entry: &Value) -> Option<Condition> {
        let condition_type = entry.get("type")?.as_str()?;
        if condition_type.is_empty() {
            return None;
        }
        let status = entry
            .get("status")
            .and_then(Value::as_str)
            .map(ConditionStatus::parse)
            .unwrap_or(ConditionStatus::Unknown);
        // A missing or malformed transition time maps to the epoch, matching
        // the zero-time convention of upstream condition structs.
        let last_transition_time = entry
            .get("lastTransitionTime")
            .and_then(Value::as_str)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|parsed| parsed.with_timezone(&Utc))
            .unwrap_or(DateTime::UNIX_EPOCH);
        Some(Condition {
            condition_type: condition_type.to_string(),
            status,
            reason: entry
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            message: entry
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            last_transition_time,
            observed_generation: entry.get("observedGeneration").and_then(Value::as_i64),
        })
    }
}

impl StatusObject for UnstructuredObject {
    fn status_conditions(&self) -> ConditionSet {
        let entries = match self
            .body
            .get("status")
            .and_then(|status| status.get("conditions"))
            .and_then(Value::as_array)
        {
            Some(entries) => entries,
            None => return ConditionSet::new(),
        };
        ConditionSet::from_observed(entries.iter().filter_map(Self::parse_condition).collect())
    }

    fn deletion_timestamp(&self) -> Option<DateTime<Utc>> {
        self.body
            .get("metadata")
            .and_then(|metadata| metadata.get("deletionTimestamp"))
            .and_then(Value::as_str)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|parsed| parsed.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_conditions_and_deletion_timestamp() {
        let object = UnstructuredObject::new(json!({
            "metadata": {
                "name": "web-0",
                "deletionTimestamp": "2025-04-01T12:00:00Z"
            },
            "status": {
                "conditions": [
                    {
                        "type": "Ready",
                        "status": "True",
                        "reason": "Ready",
                        "lastTransitionTime": "2025-04-01T11:59:00Z"
                    },
                    {
                        "type": "Synced",
                        "status": "False",
                        "reason": "ApplyFailed",
                        "message": "apply rejected",
                        "lastTransitionTime": "2025-04-01T11:58:00Z",
                        "observedGeneration": 3
                    }
                ]
            }
        }));

        let conditions = object.status_conditions();
        let ready = conditions.get("Ready").expect("Ready parsed");
        assert_eq!(ready.status, ConditionStatus::True);
        let synced = conditions.get("Synced").expect("Synced parsed");
        assert_eq!(synced.status, ConditionStatus::False);
        assert_eq!(synced.message, "apply rejected");
        assert_eq!(synced.observed_generation, Some(3));
        assert!(object.deletion_timestamp().is_some());
    }

    #[test]
    fn missing_status_degrades_to_empty_set() {
        let object = UnstructuredObject::new(json!({"metadata": {"name": "bare"}}));
        assert!(object.status_conditions().is_empty());
        assert!(object.deletion_timestamp().is_none());
    }

    #[test]
    fn malformed_entries_are_skipped_not_fatal() {
        let object = UnstructuredObject::new(json!({
            "status": {
                "conditions": [
                    "not an object",
                    {"status": "True"},
                    {"type": ""},
                    {"type": "Usable", "status": "definitely"},
                ]
            }
        }));
        let conditions = object.status_conditions();
        assert_eq!(conditions.list().len(), 1);
        let usable = conditions.get("Usable").expect("kept entry");
        assert_eq!(usable.status, ConditionStatus::Unknown);
        assert_eq!(usable.last_transition_time, DateTime::UNIX_EPOCH);
    }

    #[test]
    fn conditions_of_wrong_shape_degrade_to_empty() {
        let object = UnstructuredObject::new(json!({
            "status": {"conditions": {"type": "Ready"}}
        }));
        assert!(object.status_conditions().is_empty());
    }

    #[test]
    fn unparseable_deletion_timestamp_reads_as_absent() {
        let object = UnstructuredObject::new(json!({
            "metadata": {"deletionTimestamp": "yesterday-ish"}
        }));
        assert!(object.deletion_timestamp().is_none());
    }
}
