use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single relayed data record
///
/// Immutable once created. `id` is the millisecond epoch of `timestamp`, so two
/// entries ingested within the same millisecond share an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Submitted payload, stored as-is
    pub data: Value,
    #[serde(with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
    /// Remote address of the submitter, empty when unknown
    pub source: String,
    pub id: i64,
}

impl Entry {
    /// Stamp a payload with the current time
    pub fn new(data: Value, source: impl Into<String>) -> Self {
        Self::at(data, source, Utc::now())
    }

    /// Stamp a payload with a given time
    pub fn at(data: Value, source: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            data,
            timestamp,
            source: source.into(),
            id: timestamp.timestamp_millis(),
        }
    }
}

/// Acknowledgement returned to the submitter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestAck {
    pub success: bool,
    pub message: String,
    pub data_id: i64,
}

impl IngestAck {
    pub fn accepted(entry: &Entry) -> Self {
        Self {
            success: true,
            message: "Data received and broadcasted".to_string(),
            data_id: entry.id,
        }
    }
}

/// `2024-05-01T12:00:00.123Z` timestamps
mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
