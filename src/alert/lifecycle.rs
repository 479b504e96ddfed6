// Pending alert lifecycle: debounce, batch selection, ordering and message text.
// Pure over rows loaded from the store; the cycle applies the resulting transitions.

use chrono::{DateTime, Utc};
use std::cmp::Reverse;

use crate::models::PendingAlert;

/// Scheduler jitter allowance added before truncating to whole minutes.
const JITTER_SLACK_SECS: i64 = 3;

pub const RESOLVED_SEPARATOR: &str = "-------";

/// Whole minutes between two instants (epoch millis), with jitter slack.
pub fn elapsed_minutes(first_fired_at: i64, last_fired_at: i64) -> i64 {
    let secs = (last_fired_at - first_fired_at).max(0) / 1000;
    (secs + JITTER_SLACK_SECS) / 60
}

impl PendingAlert {
    pub fn elapsed_minutes(&self) -> i64 {
        elapsed_minutes(self.first_fired_at, self.last_fired_at)
    }

    /// Debounce satisfied: the condition has been firing for at least `delay_minutes`.
    pub fn is_eligible(&self) -> bool {
        self.elapsed_minutes() >= i64::from(self.delay_minutes)
    }

    /// Needs to be part of this cycle's notification batch.
    pub fn needs_notification(&self) -> bool {
        if !self.is_eligible() {
            return false;
        }
        if self.resolved {
            self.resolution_notified_at.is_none()
        } else {
            self.notified_at.is_none() || self.repeat
        }
    }

    /// Nothing left to do: resolved and either the resolution went out or it never qualified.
    pub fn is_finished(&self) -> bool {
        self.resolved && (self.resolution_notified_at.is_some() || !self.is_eligible())
    }
}

/// Active before resolved, then most severe, longest running, lowest condition id.
pub fn sort_for_notification(batch: &mut [PendingAlert]) {
    batch.sort_by_key(|p| {
        (
            p.resolved,
            Reverse(p.severity),
            Reverse(p.last_fired_at - p.first_fired_at),
            p.condition_id,
        )
    });
}

/// Alerts to notify this cycle, in notification order.
pub fn select_batch(pending: &[PendingAlert]) -> Vec<PendingAlert> {
    let mut batch: Vec<PendingAlert> = pending
        .iter()
        .filter(|p| p.needs_notification())
        .cloned()
        .collect();
    sort_for_notification(&mut batch);
    batch
}

fn format_timestamp(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}

pub fn format_message(p: &PendingAlert) -> String {
    if p.resolved {
        return format!(
            "Resolved: {}\n    Condition id: {}",
            p.description, p.condition_id
        );
    }
    format!(
        "{}: {}\n    This {} alert is pending for {} minutes, since {}\n    Condition id: {}",
        p.severity.as_str().to_uppercase(),
        p.description,
        p.severity.as_str(),
        p.elapsed_minutes(),
        format_timestamp(p.first_fired_at),
        p.condition_id
    )
}

/// Message bodies for an ordered batch; a separator splits firing items from resolved ones.
pub fn format_messages(batch: &[PendingAlert]) -> Vec<String> {
    let mut out = Vec::with_capacity(batch.len() + 1);
    let mut separated = false;
    for p in batch {
        if p.resolved && !separated {
            if !out.is_empty() {
                out.push(RESOLVED_SEPARATOR.to_string());
            }
            separated = true;
        }
        out.push(format_message(p));
    }
    out
}
