// SQLite snapshot store. One row per collection cycle; values live in a versioned BLOB
// so the metric set can grow without DDL. Alert tables live in `alert`.

mod alert;
mod blob;

use crate::models::{MetricValues, Snapshot};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Rows removed by one retention purge.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PurgeStats {
    pub snapshots: u64,
    pub occurrences: u64,
}

pub struct Store {
    pool: SqlitePool,
    retention_ms: i64,
}

impl Store {
    pub async fn connect(path: &str, retention_days: u32, max_pool_size: u32) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_pool_size.max(1))
            .connect_with(opts)
            .await?;
        let retention_ms = i64::from(retention_days) * DAY_MS;
        Ok(Self { pool, retention_ms })
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_version (key TEXT PRIMARY KEY, value INTEGER NOT NULL)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS snapshot (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at INTEGER NOT NULL UNIQUE,
                metric_data BLOB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "INSERT OR IGNORE INTO schema_version (key, value) VALUES ('snapshot_blob', $1)",
        )
        .bind(i64::from(blob::BLOB_VERSION))
        .execute(&self.pool)
        .await?;

        alert::init_alert_tables(&self.pool).await?;

        Ok(())
    }

    pub fn retention_ms(&self) -> i64 {
        self.retention_ms
    }

    /// Appends a snapshot. A snapshot for an instant already stored is rejected: returns None.
    #[instrument(skip(self, values), fields(repo = "store", operation = "save_snapshot", metrics_count = values.len()))]
    pub async fn save_snapshot(
        &self,
        created_at: i64,
        values: &MetricValues,
    ) -> anyhow::Result<Option<Snapshot>> {
        let data = blob::encode_values(values)?;
        let r = sqlx::query("INSERT OR IGNORE INTO snapshot (created_at, metric_data) VALUES ($1, $2)")
            .bind(created_at)
            .bind(&data)
            .execute(&self.pool)
            .await?;
        if r.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(Snapshot {
            id: r.last_insert_rowid(),
            created_at,
            values: values.clone(),
        }))
    }

    pub async fn latest_snapshot_id(&self) -> anyhow::Result<Option<i64>> {
        let id = sqlx::query_scalar::<_, Option<i64>>("SELECT MAX(id) FROM snapshot")
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    pub async fn snapshot(&self, id: i64) -> anyhow::Result<Option<Snapshot>> {
        let row = sqlx::query("SELECT id, created_at, metric_data FROM snapshot WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(parse_snapshot_row).transpose()
    }

    /// Snapshot immediately preceding `id`.
    pub async fn previous_snapshot(&self, id: i64) -> anyhow::Result<Option<Snapshot>> {
        let row = sqlx::query(
            "SELECT id, created_at, metric_data FROM snapshot WHERE id < $1 ORDER BY id DESC LIMIT 1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(parse_snapshot_row).transpose()
    }

    /// Snapshots from the first one (by id) with created_at >= from_ts up to `max_id`, plus its
    /// id predecessor so the first sample in range can be derived. Ordered by id, the same
    /// pairing the collection cycle diffs, so an out-of-order timestamp yields the same
    /// invalid pair in both places. Bounded by `max_id` so a concurrent append is never observed.
    #[instrument(skip(self), fields(repo = "store", operation = "snapshots_since"))]
    pub async fn snapshots_since(&self, from_ts: i64, max_id: i64) -> anyhow::Result<Vec<Snapshot>> {
        let rows = sqlx::query(
            "WITH first_in_range AS (
                 SELECT MIN(id) AS id FROM snapshot WHERE created_at >= $1 AND id <= $2
             )
             SELECT id, created_at, metric_data FROM snapshot
             WHERE id <= $2
               AND id >= COALESCE(
                   (SELECT MAX(id) FROM snapshot WHERE id < (SELECT id FROM first_in_range)),
                   (SELECT id FROM first_in_range))
             ORDER BY id ASC",
        )
        .bind(from_ts)
        .bind(max_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(parse_snapshot_row).collect()
    }

    /// Most recent `limit` snapshots, oldest first.
    pub async fn recent_snapshots(&self, limit: u32) -> anyhow::Result<Vec<Snapshot>> {
        let rows = sqlx::query(
            "SELECT id, created_at, metric_data FROM snapshot ORDER BY id DESC LIMIT $1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        let mut out = rows
            .iter()
            .map(parse_snapshot_row)
            .collect::<anyhow::Result<Vec<_>>>()?;
        out.reverse();
        Ok(out)
    }

    pub async fn snapshot_count(&self) -> anyhow::Result<i64> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM snapshot")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    /// Deletes snapshots older than the retention horizon and every alert occurrence that
    /// referenced one of them. Both deletes commit together.
    #[instrument(skip(self), fields(repo = "store", operation = "purge_expired"))]
    pub async fn purge_expired(&self, now_ms: i64) -> anyhow::Result<PurgeStats> {
        let cutoff = now_ms - self.retention_ms;
        let mut tx = self.pool.begin().await?;
        let snapshots = sqlx::query("DELETE FROM snapshot WHERE created_at < $1")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let occurrences =
            sqlx::query("DELETE FROM alert_occurrence WHERE sample_id NOT IN (SELECT id FROM snapshot)")
                .execute(&mut *tx)
                .await?
                .rows_affected();
        tx.commit().await?;
        Ok(PurgeStats {
            snapshots,
            occurrences,
        })
    }

    /// Reclaim space after deletes (run periodically after purging).
    #[instrument(skip(self), fields(repo = "store", operation = "vacuum"))]
    pub async fn vacuum(&self) -> anyhow::Result<()> {
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }
}

fn parse_snapshot_row(row: &SqliteRow) -> anyhow::Result<Snapshot> {
    let id: i64 = row.try_get("id")?;
    let created_at: i64 = row.try_get("created_at")?;
    let data: Vec<u8> = row.try_get("metric_data")?;
    let values = blob::decode_values(&data)?;
    Ok(Snapshot {
        id,
        created_at,
        values,
    })
}
