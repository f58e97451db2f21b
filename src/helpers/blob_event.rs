use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const BLOB_CREATED_EVENT_TYPE: &str = "Microsoft.Storage.BlobCreated";

/// Event Grid event as it arrives inside an Event Hub message body.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct EventGridEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "eventType", default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(rename = "eventTime", default, deserialize_with = "iso8601")]
    pub event_time: Option<DateTime<Utc>>,
    // `None` when the member is absent, `Some(Value::Null)` for an explicit null.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<Value>,
    #[serde(rename = "dataVersion", default)]
    pub data_version: Option<String>,
    #[serde(rename = "metadataVersion", default)]
    pub metadata_version: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

// Timestamps without an offset are taken as UTC, bare dates as midnight UTC.
fn iso8601<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };

    if let Ok(time) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(time.with_timezone(&Utc)));
    }
    if let Ok(time) = raw.parse::<NaiveDateTime>() {
        return Ok(Some(Utc.from_utc_datetime(&time)));
    }
    if let Some(midnight) = raw
        .parse::<NaiveDate>()
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(Some(Utc.from_utc_datetime(&midnight)));
    }

    Err(serde::de::Error::custom(format!(
        "eventTime is not an ISO-8601 timestamp: {:?}",
        raw
    )))
}

impl EventGridEvent {
    pub fn is_blob_created(&self) -> bool {
        self.event_type.as_deref() == Some(BLOB_CREATED_EVENT_TYPE)
    }
}

/// Payload of a `Microsoft.Storage.BlobCreated` event.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct BlobCreatedEventData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api: Option<String>,
    #[serde(rename = "clientRequestId", skip_serializing_if = "Option::is_none")]
    pub client_request_id: Option<String>,
    #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(rename = "eTag", skip_serializing_if = "Option::is_none")]
    pub e_tag: Option<String>,
    #[serde(rename = "contentType", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(rename = "contentLength", skip_serializing_if = "Option::is_none")]
    pub content_length: Option<i64>,
    #[serde(rename = "blobType", skip_serializing_if = "Option::is_none")]
    pub blob_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequencer: Option<String>,
    #[serde(rename = "storageDiagnostics", skip_serializing_if = "Option::is_none")]
    pub storage_diagnostics: Option<HashMap<String, Value>>,
}

impl BlobCreatedEventData {
    /// Reads the payload out of an envelope's raw `data`. An explicit JSON
    /// `null` yields `Ok(None)`.
    pub fn from_raw(data: &Value) -> Result<Option<Self>, serde_json::Error> {
        Option::<Self>::deserialize(data)
    }
}
