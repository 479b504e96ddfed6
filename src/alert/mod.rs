// Alert evaluation: conditions are parsed and evaluated against the latest sample's columns.

pub mod expr;
pub mod lifecycle;

use std::collections::BTreeMap;
use tracing::warn;

use crate::models::AlertCondition;

pub use expr::{Expr, ExprError};

/// Outcome of evaluating every enabled condition against one sample.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub firing: Vec<i64>,
    pub failed: Vec<i64>,
}

/// Evaluates one condition. Null means it cannot be assessed and is treated as not firing.
pub fn evaluate_condition(
    condition: &AlertCondition,
    columns: &BTreeMap<String, Option<f64>>,
) -> Result<bool, ExprError> {
    let value = expr::parse(&condition.expression)?.eval(columns)?;
    Ok(expr::truthy(value).unwrap_or(false))
}

/// A failing expression is reported and skipped; it never stops the others.
pub fn evaluate(
    conditions: &[AlertCondition],
    columns: &BTreeMap<String, Option<f64>>,
) -> Evaluation {
    let mut out = Evaluation::default();
    for condition in conditions.iter().filter(|c| c.enabled) {
        match evaluate_condition(condition, columns) {
            Ok(true) => out.firing.push(condition.id),
            Ok(false) => {}
            Err(e) => {
                warn!(
                    error = %e,
                    operation = "evaluate_alert",
                    condition_id = condition.id,
                    "alert condition not evaluated"
                );
                out.failed.push(condition.id);
            }
        }
    }
    out
}
