// Snapshot values BLOB: [version: u8][wincode payload].
// Version 1 = Vec<StoredValue> sorted by name.

use wincode::{SchemaRead, SchemaWrite};

use crate::models::MetricValues;

pub(super) const BLOB_VERSION: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq, SchemaRead, SchemaWrite)]
pub(super) struct StoredValue {
    pub name: String,
    pub value: Option<i64>,
}

pub(super) fn with_version_prefix(version: u8, payload: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + payload.len());
    out.push(version);
    out.extend_from_slice(&payload);
    out
}

pub(super) fn blob_version(bytes: &[u8]) -> u8 {
    bytes.first().copied().unwrap_or(0)
}

pub(super) fn encode_values(values: &MetricValues) -> anyhow::Result<Vec<u8>> {
    let stored: Vec<StoredValue> = values
        .iter()
        .map(|(name, value)| StoredValue {
            name: name.clone(),
            value: *value,
        })
        .collect();
    let payload = wincode::serialize(&stored).map_err(|e| anyhow::anyhow!("wincode: {}", e))?;
    Ok(with_version_prefix(BLOB_VERSION, payload))
}

pub(super) fn decode_values(bytes: &[u8]) -> anyhow::Result<MetricValues> {
    let version = blob_version(bytes);
    anyhow::ensure!(
        version == BLOB_VERSION,
        "unsupported snapshot blob version {}",
        version
    );
    let stored: Vec<StoredValue> = wincode::deserialize(&bytes[1..])
        .map_err(|e| anyhow::anyhow!("wincode deserialize snapshot values: {}", e))?;
    Ok(stored.into_iter().map(|s| (s.name, s.value)).collect())
}
