// Domain models

mod alert;
mod metric;
mod rollup;
mod snapshot;

pub use alert::{AlertCondition, AlertOccurrence, PendingAlert, Severity};
pub use metric::{MetricDefinition, MetricKind, Sign};
pub use rollup::{Envelope, GaugeRollup, MinMaxEnvelope, RollupWindow, WindowClass};
pub use snapshot::{MetricValues, ParameterChange, Sample, Snapshot};
