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

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use prometheus::core::{Collector, Desc};
use prometheus::{proto, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

use crate::statuswatch::condition::ConditionStatus;
use crate::statuswatch::object::GroupKind;

pub const LABEL_GROUP: &str = "group";
pub const LABEL_KIND: &str = "kind";
pub const LABEL_NAMESPACE: &str = "namespace";
pub const LABEL_NAME: &str = "name";
pub const LABEL_TYPE: &str = "type";
pub const LABEL_STATUS: &str = "status";
pub const LABEL_REASON: &str = "reason";

const METRIC_NAMESPACE: &str = "statuswatch";

const DURATION_BUCKETS: &[f64] = &[
    1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0,
];

/// Gauge collector keyed by full label sets rather than a fixed label
/// schema, so retired series can be dropped by exact labels or by a label
/// subset. `prometheus`'s built-in vecs only remove exact label matches,
/// which is not enough to retire every series of a deleted object.
#[derive(Clone)]
pub struct SeriesGauge {
    inner: Arc<SeriesGaugeInner>,
}

struct SeriesGaugeInner {
    desc: Desc,
    name: String,
    help: String,
    series: RwLock<HashMap<BTreeMap<String, String>, f64>>,
}

impl SeriesGauge {
    pub fn new(name: &str, help: &str) -> prometheus::Result<Self> {
        Ok(Self {
            inner: Arc::new(SeriesGaugeInner {
                desc: Desc::new(name.to_string(), help.to_string(), Vec::new(), HashMap::new())?,
                name: name.to_string(),
                help: help.to_string(),
                series: RwLock::new(HashMap::new()),
            }),
        })
    }

    fn key(labels: &[(&str, &str)]) -> BTreeMap<String, String> {
        labels
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect()
    }

    pub fn set(&self, labels: &[(&str, &str)], value: f64) {
        self.inner
            .series
            .write()
            .expect("series gauge lock poisoned")
            .insert(Self::key(labels), value);
    }

    /// Removes the series with exactly these labels.
    pub fn delete(&self, labels: &[(&str, &str)]) -> bool {
        self.inner
            .series
            .write()
            .expect("series gauge lock poisoned")
            .remove(&Self::key(labels))
            .is_some()
    }

    /// Removes every series whose labels contain all of the given pairs.
    pub fn delete_partial_match(&self, labels: &[(&str, &str)]) -> usize {
        let mut series = self
            .inner
            .series
            .write()
            .expect("series gauge lock poisoned");
        let before = series.len();
        series.retain(|candidate, _| {
            !labels
                .iter()
                .all(|(key, value)| candidate.get(*key).map(String::as_str) == Some(*value))
        });
        before - series.len()
    }

    pub fn get(&self, labels: &[(&str, &str)]) -> Option<f64> {
        self.inner
            .series
            .read()
            .expect("series gauge lock poisoned")
            .get(&Self::key(labels))
            .copied()
    }
}

impl Collector for SeriesGauge {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.inner.desc]
    }

    fn collect(&self) -> Vec<proto::MetricFamily> {
        let series = self
            .inner
            .series
            .read()
            .expect("series gauge lock poisoned");
        let mut family = proto::MetricFamily::default();
        family.set_name(self.inner.name.clone());
        family.set_help(self.inner.help.clone());
        family.set_field_type(proto::MetricType::GAUGE);
        for (labels, value) in series.iter() {
            let mut metric = proto::Metric::default();
            for (key, val) in labels {
                let mut pair = proto::LabelPair::default();
                pair.set_name(key.clone());
                pair.set_value(val.clone());
                metric.mut_label().push(pair);
            }
            let mut gauge = proto::Gauge::default();
            gauge.set_value(*value);
            metric.set_gauge(gauge);
            family.mut_metric().push(metric);
        }
        vec![family]
    }
}

/// One logical gauge written to both families: the per-kind-named family
/// without a `kind` label and the shared-name family carrying one.
struct GaugePair {
    per_kind: SeriesGauge,
    shared: SeriesGauge,
}

struct CounterPair {
    per_kind: IntCounterVec,
    shared: IntCounterVec,
}

struct HistogramPair {
    per_kind: HistogramVec,
    shared: HistogramVec,
}

#[derive(Clone, Copy, Debug)]
pub enum GaugeSeries {
    ConditionCount,
    ConditionCurrentStatusSeconds,
    TerminationCurrentTimeSeconds,
}

/// The six instrument series of one controller instance, each registered
/// twice: once under a name derived from the watched kind and once under the
/// kind-agnostic shared name. Both families always receive the same value so
/// dashboards can migrate between them.
pub struct StatusMetrics {
    group: String,
    kind: String,
    condition_count: GaugePair,
    condition_current_status_seconds: GaugePair,
    termination_current_time_seconds: GaugePair,
    transitions_total: CounterPair,
    transition_seconds: HistogramPair,
    termination_duration_seconds: HistogramPair,
}

fn shared_name(series: &str) -> String {
    format!("{METRIC_NAMESPACE}_{series}")
}

fn per_kind_name(kind_label: &str, series: &str) -> String {
    format!("{METRIC_NAMESPACE}_{kind_label}_{series}")
}

fn gauge_pair(
    registry: &Registry,
    kind_label: &str,
    series: &str,
    help: &str,
) -> prometheus::Result<GaugePair> {
    let per_kind = SeriesGauge::new(&per_kind_name(kind_label, series), help)?;
    registry.register(Box::new(per_kind.clone()))?;
    let shared = SeriesGauge::new(&shared_name(series), help)?;
    registry.register(Box::new(shared.clone()))?;
    Ok(GaugePair { per_kind, shared })
}

fn counter_pair(
    registry: &Registry,
    kind_label: &str,
    series: &str,
    help: &str,
    labels: &[&str],
) -> prometheus::Result<CounterPair> {
    let per_kind = IntCounterVec::new(Opts::new(per_kind_name(kind_label, series), help), labels)?;
    registry.register(Box::new(per_kind.clone()))?;
    let mut shared_labels = labels.to_vec();
    shared_labels.push(LABEL_KIND);
    let shared = IntCounterVec::new(Opts::new(shared_name(series), help), &shared_labels)?;
    registry.register(Box::new(shared.clone()))?;
    Ok(CounterPair { per_kind, shared })
}

fn histogram_pair(
    registry: &Registry,
    kind_label: &str,
    series: &str,
    help: &str,
    labels: &[&str],
) -> prometheus::Result<HistogramPair> {
    let per_kind = HistogramVec::new(
        HistogramOpts::new(per_kind_name(kind_label, series), help)
            .buckets(DURATION_BUCKETS.to_vec()),
        labels,
    )?;
    registry.register(Box::new(per_kind.clone()))?;
    let mut shared_labels = labels.to_vec();
    shared_labels.push(LABEL_KIND);
    let shared = HistogramVec::new(
        HistogramOpts::new(shared_name(series), help).buckets(DURATION_BUCKETS.to_vec()),
        &shared_labels,
    )?;
    registry.register(Box::new(shared.clone()))?;
    Ok(HistogramPair { per_kind, shared })
}

impl StatusMetrics {
    pub fn new(group_kind: &GroupKind, registry: &Registry) -> prometheus::Result<Self> {
        let kind_label = group_kind.kind_label();
        Ok(Self {
            group: group_kind.group.clone(),
            kind: group_kind.kind.clone(),
            condition_count: gauge_pair(
                registry,
                &kind_label,
                "status_condition_count",
                "The number of a condition for a given object, type and status, labeled with the reason",
            )?,
            condition_current_status_seconds: gauge_pair(
                registry,
                &kind_label,
                "status_condition_current_status_seconds",
                "The current amount of time in seconds that a status condition has been in a specific state",
            )?,
            termination_current_time_seconds: gauge_pair(
                registry,
                &kind_label,
                "termination_current_time_seconds",
                "The current amount of time in seconds that an object has been in terminating state",
            )?,
            transitions_total: counter_pair(
                registry,
                &kind_label,
                "status_condition_transitions_total",
                "The count of transitions of a given object, type and status",
                &[LABEL_GROUP, LABEL_TYPE, LABEL_STATUS, LABEL_REASON],
            )?,
            transition_seconds: histogram_pair(
                registry,
                &kind_label,
                "status_condition_transition_seconds",
                "The amount of time a condition was in a given state before transitioning",
                &[LABEL_GROUP, LABEL_TYPE, LABEL_STATUS],
            )?,
            termination_duration_seconds: histogram_pair(
                registry,
                &kind_label,
                "termination_duration_seconds",
                "The amount of time taken by an object to go from terminating to terminated",
                &[LABEL_GROUP],
            )?,
        })
    }

    fn pair(&self, series: GaugeSeries) -> &GaugePair {
        match series {
            GaugeSeries::ConditionCount => &self.condition_count,
            GaugeSeries::ConditionCurrentStatusSeconds => &self.condition_current_status_seconds,
            GaugeSeries::TerminationCurrentTimeSeconds => &self.termination_current_time_seconds,
        }
    }

    fn labeled<'a>(&'a self, labels: &[(&'a str, &'a str)], with_kind: bool) -> Vec<(&'a str, &'a str)> {
        let mut full = Vec::with_capacity(labels.len() + 2);
        full.push((LABEL_GROUP, self.group.as_str()));
        full.extend_from_slice(labels);
        if with_kind {
            full.push((LABEL_KIND, self.kind.as_str()));
        }
        full
    }

    /// Writes the same value to both families of a gauge series. `labels`
    /// carry the per-object dimensions; group and kind are filled in here.
    pub fn set_gauge(&self, series: GaugeSeries, labels: &[(&str, &str)], value: f64) {
        let pair = self.pair(series);
        pair.per_kind.set(&self.labeled(labels, false), value);
        pair.shared.set(&self.labeled(labels, true), value);
    }

    pub fn delete_gauge(&self, series: GaugeSeries, labels: &[(&str, &str)]) {
        let pair = self.pair(series);
        pair.per_kind.delete(&self.labeled(labels, false));
        pair.shared.delete(&self.labeled(labels, true));
    }

    pub fn delete_partial_match_gauge(&self, series: GaugeSeries, labels: &[(&str, &str)]) {
        let pair = self.pair(series);
        pair.per_kind.delete_partial_match(&self.labeled(labels, false));
        pair.shared.delete_partial_match(&self.labeled(labels, true));
    }

    pub fn inc_transitions(&self, condition_type: &str, status: ConditionStatus, reason: &str) {
        self.transitions_total
            .per_kind
            .with_label_values(&[self.group.as_str(), condition_type, status.as_str(), reason])
            .inc();
        self.transitions_total
            .shared
            .with_label_values(&[
                self.group.as_str(),
                condition_type,
                status.as_str(),
                reason,
                self.kind.as_str(),
            ])
            .inc();
    }

    /// Observes how long a condition dwelled in its previous status; labeled
    /// by that previous type and status.
    pub fn observe_transition_seconds(
        &self,
        condition_type: &str,
        status: ConditionStatus,
        seconds: f64,
    ) {
        self.transition_seconds
            .per_kind
            .with_label_values(&[self.group.as_str(), condition_type, status.as_str()])
            .observe(seconds);
        self.transition_seconds
            .shared
            .with_label_values(&[
                self.group.as_str(),
                condition_type,
                status.as_str(),
                self.kind.as_str(),
            ])
            .observe(seconds);
    }

    pub fn observe_termination_duration(&self, seconds: f64) {
        self.termination_duration_seconds
            .per_kind
            .with_label_values(&[self.group.as_str()])
            .observe(seconds);
        self.termination_duration_seconds
            .shared
            .with_label_values(&[self.group.as_str(), self.kind.as_str()])
            .observe(seconds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_gauge_sets_and_deletes_exact() {
        let gauge = SeriesGauge::new("test_gauge", "test").expect("gauge built");
        gauge.set(&[("namespace", "default"), ("name", "web-0")], 1.0);
        gauge.set(&[("namespace", "default"), ("name", "web-1")], 2.0);

        assert_eq!(
            gauge.get(&[("namespace", "default"), ("name", "web-0")]),
            Some(1.0)
        );
        assert!(gauge.delete(&[("namespace", "default"), ("name", "web-0")]));
        assert!(!gauge.delete(&[("namespace", "default"), ("name", "web-0")]));
        assert_eq!(
            gauge.get(&[("namespace", "default"), ("name", "web-1")]),
            Some(2.0)
        );
    }

    #[test]
    fn series_gauge_deletes_by_label_subset() {
        let gauge = SeriesGauge::new("test_subset_gauge", "test").expect("gauge built");
        gauge.set(&[("name", "web-0"), ("type", "Ready")], 1.0);
        gauge.set(&[("name", "web-0"), ("type", "Synced")], 1.0);
        gauge.set(&[("name", "web-1"), ("type", "Ready")], 1.0);

        assert_eq!(gauge.delete_partial_match(&[("name", "web-0")]), 2);
        assert_eq!(gauge.get(&[("name", "web-1"), ("type", "Ready")]), Some(1.0));
    }

    #[test]
    fn series_gauge_collects_through_registry() {
        let registry = Registry::new();
        let gauge = SeriesGauge::new("collected_gauge", "test").expect("gauge built");
        registry
            .register(Box::new(gauge.clone()))
            .expect("gauge registered");
        gauge.set(&[("name", "web-0")], 3.5);

        let families = registry.gather();
        let family = families
            .iter()
            .find(|f| f.get_name() == "collected_gauge")
            .expect("family gathered");
        assert_eq!(family.get_metric().len(), 1);
        let metric = &family.get_metric()[0];
        assert_eq!(metric.get_gauge().get_value(), 3.5);
        assert_eq!(metric.get_label()[0].get_name(), "name");
        assert_eq!(metric.get_label()[0].get_value(), "web-0");
    }

    #[test]
    fn fan_out_writes_both_families() {
        let registry = Registry::new();
        let metrics = StatusMetrics::new(
            &GroupKind::new("apps.example.com", "TestResource"),
            &registry,
        )
        .expect("metrics registered");

        metrics.set_gauge(
            GaugeSeries::ConditionCount,
            &[
                ("namespace", "default"),
                ("name", "web-0"),
                ("type", "Ready"),
                ("status", "True"),
                ("reason", "Ready"),
            ],
            1.0,
        );
        metrics.inc_transitions("Ready", ConditionStatus::True, "Ready");

        let names: Vec<String> = registry
            .gather()
            .iter()
            .filter(|f| !f.get_metric().is_empty())
            .map(|f| f.get_name().to_string())
            .collect();
        assert!(names.contains(&"statuswatch_status_condition_count".to_string()));
        assert!(names.contains(&"statuswatch_testresource_status_condition_count".to_string()));
        assert!(names.contains(&"statuswatch_status_condition_transitions_total".to_string()));
        assert!(
            names.contains(&"statuswatch_testresource_status_condition_transitions_total".to_string())
        );

        let shared = registry
            .gather()
            .into_iter()
            .find(|f| f.get_name() == "statuswatch_status_condition_count")
            .expect("shared family present");
        let labels: Vec<(String, String)> = shared.get_metric()[0]
            .get_label()
            .iter()
            .map(|pair| (pair.get_name().to_string(), pair.get_value().to_string()))
            .collect();
        assert!(labels.contains(&("kind".to_string(), "TestResource".to_string())));
        assert!(labels.contains(&("group".to_string(), "apps.example.com".to_string())));
    }

    #[test]
    fn per_kind_family_omits_kind_label() {
        let registry = Registry::new();
        let metrics = StatusMetrics::new(
            &GroupKind::new("apps.example.com", "TestResource"),
            &registry,
        )
        .expect("metrics registered");
        metrics.set_gauge(
            GaugeSeries::TerminationCurrentTimeSeconds,
            &[("namespace", "default"), ("name", "web-0")],
            12.0,
        );

        let family = registry
            .gather()
            .into_iter()
            .find(|f| f.get_name() == "statuswatch_testresource_termination_current_time_seconds")
            .expect("per-kind family present");
        assert!(family.get_metric()[0]
            .get_label()
            .iter()
            .all(|pair| pair.get_name() != "kind"));
    }
}
