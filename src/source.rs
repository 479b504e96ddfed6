// Snapshot source: where raw metric values come from each cycle.
// CommandSource shells out to a database client (e.g. `mysql --batch --skip-column-names -e`)
// and parses its tab-separated output.

use std::future::Future;

use crate::config::SourceConfig;
use crate::metrics::builtin::CONFIGURATION_VARIABLES;
use crate::models::MetricValues;

/// Rows of nullable text cells returned by an ad-hoc query.
pub type QueryRows = Vec<Vec<Option<String>>>;

pub trait SnapshotSource: Send + Sync {
    /// One full capture of metric name -> raw value.
    fn fetch(&self) -> impl Future<Output = anyhow::Result<MetricValues>> + Send;

    /// Runs a custom metric expression on the monitored server.
    fn run_query(&self, expression: &str)
    -> impl Future<Output = anyhow::Result<QueryRows>> + Send;
}

pub struct CommandSource {
    command: String,
    args: Vec<String>,
    status_query: String,
    variables_query: String,
}

impl CommandSource {
    pub fn new(config: &SourceConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            status_query: config.status_query.clone(),
            variables_query: config.variables_query.clone(),
        }
    }

    async fn run(&self, query: &str) -> anyhow::Result<String> {
        let output = tokio::process::Command::new(&self.command)
            .args(&self.args)
            .arg(query)
            .kill_on_drop(true)
            .output()
            .await?;
        anyhow::ensure!(
            output.status.success(),
            "{} exited with {}: {}",
            self.command,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl SnapshotSource for CommandSource {
    async fn fetch(&self) -> anyhow::Result<MetricValues> {
        let mut values = MetricValues::new();

        let status = self.run(&self.status_query).await?;
        for (name, value) in parse_name_value_lines(&status) {
            if !is_neglectable(&name) {
                values.insert(name, normalize_value(&value));
            }
        }

        let variables = self.run(&self.variables_query).await?;
        for (name, value) in parse_name_value_lines(&variables) {
            if CONFIGURATION_VARIABLES.contains(&name.as_str()) {
                values.insert(name, normalize_value(&value));
            }
        }

        tracing::debug!(
            operation = "fetch_snapshot",
            metrics_count = values.len(),
            "status & variables recorded"
        );
        Ok(values)
    }

    async fn run_query(&self, expression: &str) -> anyhow::Result<QueryRows> {
        let out = self.run(expression).await?;
        Ok(parse_rows(&out))
    }
}

/// `Name\tValue` lines -> lower-cased (name, value). Lines without a tab are ignored.
pub fn parse_name_value_lines(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(|line| {
            let (name, value) = line.split_once('\t')?;
            let name = name.trim().to_lowercase();
            if name.is_empty() {
                return None;
            }
            Some((name, value.trim().to_lowercase()))
        })
        .collect()
}

/// Tab-separated rows; a literal `NULL` cell is a null.
pub fn parse_rows(text: &str) -> QueryRows {
    text.lines()
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.split('\t')
                .map(|cell| (cell != "NULL").then(|| cell.to_string()))
                .collect()
        })
        .collect()
}

/// Variables that change on every read or carry no numeric meaning.
pub fn is_neglectable(name: &str) -> bool {
    name.starts_with("ssl_") || name.starts_with("ndb_") || name == "last_query_cost"
}

/// Maps textual switches to integers; anything non-integer becomes null.
pub fn normalize_value(value: &str) -> Option<i64> {
    match value {
        "off" | "no" => Some(0),
        "on" | "yes" => Some(1),
        "demand" => Some(2),
        "" => None,
        other => other.parse().ok(),
    }
}
