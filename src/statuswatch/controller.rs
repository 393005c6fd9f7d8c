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
use prometheus::Registry;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use crate::statuswatch::cache::ObservationCache;
use crate::statuswatch::condition::{Condition, ConditionStatus};
use crate::statuswatch::events::{Event, EventSeverity, EventSink};
use crate::statuswatch::logger::log_debug;
use crate::statuswatch::metrics::{
    GaugeSeries, StatusMetrics, LABEL_NAME, LABEL_NAMESPACE, LABEL_REASON, LABEL_STATUS,
    LABEL_TYPE,
};
use crate::statuswatch::object::{GroupKind, ObjectKey, StatusObject};
use crate::statuswatch::store::{ObjectStore, StoreError};
use crate::statuswatch::unstructured::UnstructuredObject;

const COMPONENT: &str = "status-controller";

const DEFAULT_REQUEUE_INTERVAL: Duration = Duration::from_secs(10);

/// Tuning knobs for a controller instance.
#[derive(Clone, Debug)]
pub struct ControllerOptions {
    /// Fixed delay before an object is revisited after a successful
    /// reconcile, so current-status and termination gauges keep advancing
    /// even without store activity.
    pub requeue_interval: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            requeue_interval: DEFAULT_REQUEUE_INTERVAL,
        }
    }
}

/// Outcome of one successful reconcile invocation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Reconcile {
    pub requeue_after: Option<Duration>,
}

#[derive(Debug)]
pub enum ReconcileError {
    Fetch(StoreError),
}

impl Display for ReconcileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileError::Fetch(source) => write!(f, "fetching object, {source}"),
        }
    }
}

impl Error for ReconcileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ReconcileError::Fetch(source) => Some(source),
        }
    }
}

/// Instruments the condition and termination lifecycle of every object of
/// one kind.
///
/// Each invocation diffs the freshly read condition set against the snapshot
/// remembered from the previous invocation, publishes gauges for the current
/// state, retires series the diff invalidated, and records counters,
/// dwell-time histograms and transition events for observed status changes.
/// Detection is best effort: writes batched between two invocations collapse
/// into one observed transition, and concurrent invocations for the same
/// identity race benignly on the snapshot.
pub struct StatusController<T: StatusObject> {
    group_kind: GroupKind,
    store: Arc<dyn ObjectStore<T>>,
    events: Arc<dyn EventSink>,
    metrics: StatusMetrics,
    cache: ObservationCache,
    options: ControllerOptions,
}

/// The same routine over schema-less objects, for kinds without a concrete
/// Rust type. The watched kind must be named explicitly since it cannot be
/// derived from the representation.
pub type GenericStatusController = StatusController<UnstructuredObject>;

impl<T: StatusObject> StatusController<T> {
    /// Builds a controller and registers its metric families with the given
    /// registry. Fails only on metric registration conflicts, e.g. two
    /// controllers for the same kind sharing one registry.
    pub fn new(
        group_kind: GroupKind,
        store: Arc<dyn ObjectStore<T>>,
        events: Arc<dyn EventSink>,
        registry: &Registry,
        options: ControllerOptions,
    ) -> prometheus::Result<Self> {
        let metrics = StatusMetrics::new(&group_kind, registry)?;
        Ok(Self {
            group_kind,
            store,
            events,
            metrics,
            cache: ObservationCache::new(),
            options,
        })
    }

    pub fn group_kind(&self) -> &GroupKind {
        &self.group_kind
    }

    /// Runs one instrumentation pass for the identity.
    ///
    /// A missing object is the terminal case, not an error: its gauges are
    /// retired, a termination duration is observed if the object was ever
    /// seen terminating, and the identity is dropped from the cache. Only
    /// transient store failures surface as `Err`, with no side effects.
    pub fn reconcile(&self, key: &ObjectKey) -> Result<Reconcile, ReconcileError> {
        let object = match self.store.get(key) {
            Ok(object) => object,
            Err(err) if err.is_not_found() => {
                self.finalize(key);
                return Ok(Reconcile {
                    requeue_after: None,
                });
            }
            Err(err) => return Err(ReconcileError::Fetch(err)),
        };

        let current = object.status_conditions();
        let observed = self.cache.load(key);
        // Publish the new snapshot before diffing so a concurrent invocation
        // reads the freshest state we have.
        self.cache.store(key.clone(), current.clone());

        for condition in current.list() {
            self.metrics.set_gauge(
                GaugeSeries::ConditionCount,
                &condition_labels(key, condition),
                1.0,
            );
            self.metrics.set_gauge(
                GaugeSeries::ConditionCurrentStatusSeconds,
                &condition_labels(key, condition),
                seconds_since(condition.last_transition_time),
            );
        }

        if let Some(deleted_at) = object.deletion_timestamp() {
            self.metrics.set_gauge(
                GaugeSeries::TerminationCurrentTimeSeconds,
                &object_labels(key),
                seconds_since(deleted_at),
            );
            self.cache.store_deletion_timestamp(key.clone(), deleted_at);
        }

        if let Some(observed) = &observed {
            for previous in observed.list() {
                let stale = match current.get(&previous.condition_type) {
                    None => true,
                    Some(fresh) => fresh.status != previous.status,
                };
                if stale {
                    self.metrics.delete_gauge(
                        GaugeSeries::ConditionCount,
                        &condition_labels(key, previous),
                    );
                    self.metrics.delete_gauge(
                        GaugeSeries::ConditionCurrentStatusSeconds,
                        &condition_labels(key, previous),
                    );
                }
            }
        }

        // Transition accounting is best effort. The store is eventually
        // consistent and offers no atomic before/after read, so writes
        // batched between two invocations collapse into a single observed
        // transition. Slow transitions, the interesting ones for alerting,
        // are the most likely to be caught.
        for condition in current.list() {
            let previous = observed
                .as_ref()
                .and_then(|snapshot| snapshot.get(&condition.condition_type));
            // An absent previous condition reads as Unknown, so a condition
            // first seen as Unknown is not a transition.
            let previous_status = previous
                .map(|p| p.status)
                .unwrap_or(ConditionStatus::Unknown);
            if previous_status == condition.status {
                continue;
            }
            self.metrics
                .inc_transitions(&condition.condition_type, condition.status, &condition.reason);
            let previous = match previous {
                Some(previous) => previous,
                None => continue,
            };
            let dwell = condition
                .last_transition_time
                .signed_duration_since(previous.last_transition_time);
            self.metrics.observe_transition_seconds(
                &previous.condition_type,
                previous.status,
                duration_seconds(dwell),
            );
            self.events.emit(Event {
                object: key.clone(),
                kind: self.group_kind.kind.clone(),
                severity: EventSeverity::Normal,
                reason: condition.condition_type.clone(),
                message: transition_message(previous, condition),
                timestamp: Utc::now(),
            });
        }

        Ok(Reconcile {
            requeue_after: Some(self.options.requeue_interval),
        })
    }

    fn finalize(&self, key: &ObjectKey) {
        self.metrics
            .delete_partial_match_gauge(GaugeSeries::ConditionCount, &object_labels(key));
        self.metrics.delete_partial_match_gauge(
            GaugeSeries::ConditionCurrentStatusSeconds,
            &object_labels(key),
        );
        self.metrics.delete_partial_match_gauge(
            GaugeSeries::TerminationCurrentTimeSeconds,
            &object_labels(key),
        );
        if let Some(deleted_at) = self.cache.load_deletion_timestamp(key) {
            self.metrics
                .observe_termination_duration(seconds_since(deleted_at));
        }
        self.cache.forget(key);
        log_debug(
            COMPONENT,
            "object finalized, instrumentation retired",
            &[
                ("kind", self.group_kind.kind.as_str()),
                ("namespace", key.namespace.as_str()),
                ("name", key.name.as_str()),
            ],
        );
    }
}

fn object_labels(key: &ObjectKey) -> [(&'static str, &str); 2] {
    [
        (LABEL_NAMESPACE, key.namespace.as_str()),
        (LABEL_NAME, key.name.as_str()),
    ]
}

fn condition_labels<'a>(key: &'a ObjectKey, condition: &'a Condition) -> [(&'static str, &'a str); 5] {
    [
        (LABEL_NAMESPACE, key.namespace.as_str()),
        (LABEL_NAME, key.name.as_str()),
        (LABEL_TYPE, condition.condition_type.as_str()),
        (LABEL_STATUS, condition.status.as_str()),
        (LABEL_REASON, condition.reason.as_str()),
    ]
}

fn seconds_since(instant: DateTime<Utc>) -> f64 {
    duration_seconds(Utc::now().signed_duration_since(instant))
}

fn duration_seconds(duration: chrono::Duration) -> f64 {
    match duration.num_microseconds() {
        Some(micros) => micros as f64 / 1_000_000.0,
        None => duration.num_seconds() as f64,
    }
}

fn transition_message(previous: &Condition, current: &Condition) -> String {
    let mut message = format!(
        "Status condition transitioned, Type: {}, Status: {} -> {}, Reason: {}",
        current.condition_type, previous.status, current.status, current.reason
    );
    if !current.message.is_empty() {
        message.push_str(&format!(", Message: {}", current.message));
    }
    message
}
