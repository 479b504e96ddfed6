// Dump recent snapshots and the samples derived from them as JSON (deserializes wincode BLOBs).
//
// Usage: cargo run --example dump_snapshots -- [DB_PATH] [LIMIT]
//   DB_PATH  default: ./data/dbcheckpoint.db
//   LIMIT    default: 5

use dbcheckpoint::diff;
use dbcheckpoint::metrics::MetricRegistry;
use dbcheckpoint::store::Store;
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let path = args
        .get(1)
        .map(String::as_str)
        .unwrap_or("./data/dbcheckpoint.db");
    let limit: u32 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(5);

    // Retention is irrelevant for a read-only dump; nothing is purged here.
    let store = Store::connect(path, u32::MAX, 1).await?;
    let snapshots = store.recent_snapshots(limit).await?;
    let samples = diff::samples_from(&snapshots, &MetricRegistry::builtin());

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "snapshots": snapshots,
            "samples": samples,
        }))?
    );
    Ok(())
}
