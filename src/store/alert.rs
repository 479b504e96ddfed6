// Alert tables: conditions (seeded from config), occurrences (audit trail, purged with
// snapshots) and pending alerts (one row per condition, lifecycle state).

use super::Store;
use crate::models::{AlertCondition, AlertOccurrence, PendingAlert, Severity};
use sqlx::Row;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteRow;
use tracing::instrument;

pub(super) async fn init_alert_tables(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS alert_condition (
            id INTEGER PRIMARY KEY,
            enabled INTEGER NOT NULL,
            expression TEXT NOT NULL,
            description TEXT NOT NULL,
            severity TEXT NOT NULL,
            delay_minutes INTEGER NOT NULL,
            repeat_notification INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS alert_occurrence (
            sample_id INTEGER NOT NULL,
            condition_id INTEGER NOT NULL,
            fired_at INTEGER NOT NULL,
            UNIQUE (sample_id, condition_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS alert_pending (
            condition_id INTEGER NOT NULL UNIQUE,
            first_sample_id INTEGER NOT NULL,
            last_sample_id INTEGER NOT NULL,
            first_fired_at INTEGER NOT NULL,
            last_fired_at INTEGER NOT NULL,
            notified_at INTEGER,
            resolved INTEGER NOT NULL DEFAULT 0,
            resolution_notified_at INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

impl Store {
    /// Makes the stored conditions match `conditions`: upserts each, and drops conditions
    /// no longer configured together with their pending state.
    #[instrument(skip(self, conditions), fields(repo = "store", operation = "sync_conditions", conditions_count = conditions.len()))]
    pub async fn sync_conditions(&self, conditions: &[AlertCondition]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        for c in conditions {
            sqlx::query(
                r#"
                INSERT INTO alert_condition
                (id, enabled, expression, description, severity, delay_minutes, repeat_notification)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT(id) DO UPDATE SET
                    enabled = excluded.enabled,
                    expression = excluded.expression,
                    description = excluded.description,
                    severity = excluded.severity,
                    delay_minutes = excluded.delay_minutes,
                    repeat_notification = excluded.repeat_notification
                "#,
            )
            .bind(c.id)
            .bind(c.enabled)
            .bind(&c.expression)
            .bind(&c.description)
            .bind(c.severity.as_str())
            .bind(i64::from(c.delay_minutes))
            .bind(c.repeat)
            .execute(&mut *tx)
            .await?;
        }

        let keep: Vec<i64> = conditions.iter().map(|c| c.id).collect();
        let stored = sqlx::query_scalar::<_, i64>("SELECT id FROM alert_condition")
            .fetch_all(&mut *tx)
            .await?;
        for id in stored.into_iter().filter(|id| !keep.contains(id)) {
            sqlx::query("DELETE FROM alert_pending WHERE condition_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM alert_condition WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn conditions(&self) -> anyhow::Result<Vec<AlertCondition>> {
        let rows = sqlx::query(
            "SELECT id, enabled, expression, description, severity, delay_minutes, repeat_notification
             FROM alert_condition ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(parse_condition_row).collect()
    }

    /// Audit row for a condition that fired on a sample; re-recording the same pair is a no-op.
    pub async fn record_occurrence(
        &self,
        condition_id: i64,
        sample_id: i64,
        fired_at: i64,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO alert_occurrence (sample_id, condition_id, fired_at) VALUES ($1, $2, $3)",
        )
        .bind(sample_id)
        .bind(condition_id)
        .bind(fired_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most recent occurrences first.
    pub async fn occurrences(&self, limit: u32) -> anyhow::Result<Vec<AlertOccurrence>> {
        let rows = sqlx::query(
            "SELECT sample_id, condition_id, fired_at FROM alert_occurrence
             ORDER BY sample_id DESC, condition_id ASC LIMIT $1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(AlertOccurrence {
                condition_id: row.try_get("condition_id")?,
                sample_id: row.try_get("sample_id")?,
                fired_at: row.try_get("fired_at")?,
            });
        }
        Ok(out)
    }

    /// Starts or extends the pending alert of a firing condition. A resolved row that fires
    /// again starts a fresh episode.
    #[instrument(skip(self), fields(repo = "store", operation = "upsert_pending"))]
    pub async fn upsert_pending(
        &self,
        condition_id: i64,
        sample_id: i64,
        fired_at: i64,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO alert_pending
            (condition_id, first_sample_id, last_sample_id, first_fired_at, last_fired_at, resolved)
            VALUES ($1, $2, $2, $3, $3, 0)
            ON CONFLICT(condition_id) DO UPDATE SET
                first_sample_id = CASE WHEN resolved THEN excluded.first_sample_id ELSE first_sample_id END,
                first_fired_at = CASE WHEN resolved THEN excluded.first_fired_at ELSE first_fired_at END,
                notified_at = CASE WHEN resolved THEN NULL ELSE notified_at END,
                resolution_notified_at = NULL,
                last_sample_id = excluded.last_sample_id,
                last_fired_at = excluded.last_fired_at,
                resolved = 0
            "#,
        )
        .bind(condition_id)
        .bind(sample_id)
        .bind(fired_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Pending alerts that did not fire on `current_sample_id` become resolved.
    #[instrument(skip(self), fields(repo = "store", operation = "mark_resolved"))]
    pub async fn mark_resolved(&self, current_sample_id: i64) -> anyhow::Result<u64> {
        let r = sqlx::query(
            "UPDATE alert_pending SET resolved = 1 WHERE resolved = 0 AND last_sample_id < $1",
        )
        .bind(current_sample_id)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected())
    }

    /// Pending alerts joined with their condition's notification settings.
    pub async fn pending_alerts(&self) -> anyhow::Result<Vec<PendingAlert>> {
        let rows = sqlx::query(
            "SELECT p.condition_id, p.first_sample_id, p.last_sample_id, p.first_fired_at,
                    p.last_fired_at, p.notified_at, p.resolved, p.resolution_notified_at,
                    c.description, c.severity, c.delay_minutes, c.repeat_notification
             FROM alert_pending p JOIN alert_condition c ON c.id = p.condition_id
             ORDER BY p.condition_id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(parse_pending_row).collect()
    }

    /// Stamps delivery: `notified_at` for firing alerts, `resolution_notified_at` for resolved ones.
    #[instrument(skip(self, batch), fields(repo = "store", operation = "mark_delivered", batch_len = batch.len()))]
    pub async fn mark_delivered(&self, batch: &[PendingAlert], now_ms: i64) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        for p in batch {
            let sql = if p.resolved {
                "UPDATE alert_pending SET resolution_notified_at = $1 WHERE condition_id = $2 AND resolved = 1"
            } else {
                "UPDATE alert_pending SET notified_at = $1 WHERE condition_id = $2 AND resolved = 0"
            };
            sqlx::query(sql)
                .bind(now_ms)
                .bind(p.condition_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn delete_pending(&self, condition_ids: &[i64]) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut deleted = 0;
        for id in condition_ids {
            deleted += sqlx::query("DELETE FROM alert_pending WHERE condition_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        Ok(deleted)
    }
}

fn parse_condition_row(row: &SqliteRow) -> anyhow::Result<AlertCondition> {
    let severity: String = row.try_get("severity")?;
    let delay_minutes: i64 = row.try_get("delay_minutes")?;
    Ok(AlertCondition {
        id: row.try_get("id")?,
        enabled: row.try_get("enabled")?,
        expression: row.try_get("expression")?,
        description: row.try_get("description")?,
        severity: severity.parse()?,
        delay_minutes: u32::try_from(delay_minutes)?,
        repeat: row.try_get("repeat_notification")?,
    })
}

fn parse_pending_row(row: &SqliteRow) -> anyhow::Result<PendingAlert> {
    let severity: String = row.try_get("severity")?;
    let delay_minutes: i64 = row.try_get("delay_minutes")?;
    Ok(PendingAlert {
        condition_id: row.try_get("condition_id")?,
        first_sample_id: row.try_get("first_sample_id")?,
        last_sample_id: row.try_get("last_sample_id")?,
        first_fired_at: row.try_get("first_fired_at")?,
        last_fired_at: row.try_get("last_fired_at")?,
        notified_at: row.try_get("notified_at")?,
        resolved: row.try_get("resolved")?,
        resolution_notified_at: row.try_get("resolution_notified_at")?,
        description: row.try_get("description")?,
        severity: severity.parse::<Severity>()?,
        delay_minutes: u32::try_from(delay_minutes)?,
        repeat: row.try_get("repeat_notification")?,
    })
}
