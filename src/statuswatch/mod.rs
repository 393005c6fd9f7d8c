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

//! Statuswatch instruments the reconciliation of cluster-managed resources.
//!
//! For every managed object it tracks the lifecycle of its status conditions
//! and termination state, diffs each freshly-read condition set against the
//! previously observed one, and emits Prometheus metrics and transition
//! events reflecting the diff. Detection is best effort: the underlying
//! store offers no atomic before/after read, so the audit trail is
//! eventually consistent rather than exactly-once.

pub mod cache;
pub mod condition;
pub mod controller;
pub mod events;
pub mod logger;
pub mod metrics;
pub mod object;
pub mod runtime;
pub mod store;
pub mod unstructured;

pub use cache::ObservationCache;
pub use condition::{Condition, ConditionSet, ConditionStatus, CONDITION_READY};
pub use controller::{
    ControllerOptions, GenericStatusController, Reconcile, ReconcileError, StatusController,
};
pub use events::{Event, EventBuffer, EventSeverity, EventSink};
pub use metrics::{GaugeSeries, SeriesGauge, StatusMetrics};
pub use object::{GroupKind, ObjectKey, StatusObject};
pub use runtime::{spawn_executor, WorkQueue};
pub use store::{MemoryStore, ObjectStore, StoreError};
pub use unstructured::UnstructuredObject;
