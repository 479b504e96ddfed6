// Metric classifier + registry. Built once at startup (built-in catalogue plus custom
// metric registrations) and shared by reference; never mutated after startup.

pub mod builtin;

use std::collections::BTreeMap;

use crate::models::{MetricDefinition, MetricKind, MetricValues, Sign};
use crate::plugin::{self, CustomMetric, CustomMetricKind};

#[derive(Debug, Clone, Default)]
pub struct MetricRegistry {
    definitions: BTreeMap<String, MetricDefinition>,
    custom_kinds: BTreeMap<i64, CustomMetricKind>,
}

impl MetricRegistry {
    /// Registry holding the built-in catalogue only.
    pub fn builtin() -> Self {
        let mut registry = Self::default();
        let names = builtin::CONFIGURATION_VARIABLES
            .iter()
            .chain(builtin::SIGNED_STATUS_VARIABLES)
            .chain(builtin::ALWAYS_PRESENT_STATUS);
        for name in names {
            let def = registry.definition(name);
            registry.definitions.insert(def.name.clone(), def);
        }
        registry
    }

    /// Built-in catalogue plus every enabled custom metric.
    pub fn with_custom_metrics(custom: &[CustomMetric]) -> Self {
        let mut registry = Self::builtin();
        for metric in custom.iter().filter(|m| m.enabled) {
            registry.register_custom(metric);
        }
        registry
    }

    /// Registers a custom metric and its evaluation-time companion.
    /// Returns the definition of the value metric.
    pub fn register_custom(&mut self, metric: &CustomMetric) -> MetricDefinition {
        self.custom_kinds.insert(metric.id, metric.kind);
        if metric.kind.records_elapsed_time() {
            let time_def = self.definition(&plugin::time_metric_name(metric.id));
            self.definitions.insert(time_def.name.clone(), time_def);
        }
        let def = self.definition(&plugin::value_metric_name(metric.id));
        self.definitions.insert(def.name.clone(), def.clone());
        def
    }

    /// Pure classification: custom naming scheme first, then the static tables.
    /// Unknown names are Counter/Unsigned.
    pub fn classify(&self, name: &str) -> (MetricKind, Sign) {
        if let Some((id, is_time)) = plugin::parse_metric_name(name) {
            if is_time {
                return (MetricKind::Gauge, Sign::Unsigned);
            }
            return match self.custom_kinds.get(&id) {
                Some(CustomMetricKind::ElapsedTime) => (MetricKind::Gauge, Sign::Unsigned),
                _ => (MetricKind::Counter, Sign::Unsigned),
            };
        }
        if builtin::CONFIGURATION_VARIABLES.contains(&name) {
            return (MetricKind::Gauge, Sign::Unsigned);
        }
        if builtin::SIGNED_STATUS_VARIABLES.contains(&name) {
            return (MetricKind::Counter, Sign::Signed);
        }
        (MetricKind::Counter, Sign::Unsigned)
    }

    /// Registered definition, or a classified one for names first seen at runtime.
    pub fn definition(&self, name: &str) -> MetricDefinition {
        if let Some(def) = self.definitions.get(name) {
            return def.clone();
        }
        let (kind, sign) = self.classify(name);
        MetricDefinition::new(name, kind, sign)
    }

    pub fn definitions(&self) -> impl Iterator<Item = &MetricDefinition> {
        self.definitions.values()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Inserts a null entry for every registered metric missing from `values`.
    pub fn complete(&self, values: &mut MetricValues) {
        for name in self.definitions.keys() {
            values.entry(name.clone()).or_insert(None);
        }
    }
}
