use std::collections::HashMap;

use bytes::Bytes;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name of the Event Hub trigger binding in `ProcessBlobEvents/function.json`.
pub const EVENTS_BINDING: &str = "events";

/// Request body the Functions host sends to a custom handler for a trigger.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct InvocationRequest {
    #[serde(rename = "Data", default)]
    pub data: HashMap<String, Value>,
    #[serde(rename = "Metadata", default)]
    pub metadata: HashMap<String, Value>,
}

impl InvocationRequest {
    /// Raw message bodies of the Event Hub batch.
    ///
    /// String entries are the message text; anything else was already
    /// decoded as JSON by the host and is serialized back.
    pub fn event_bodies(&self) -> Result<Vec<Bytes>, serde_json::Error> {
        let events = match self.data.get(EVENTS_BINDING) {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Array(events)) => events.iter().collect::<Vec<_>>(),
            Some(single) => vec![single],
        };

        events
            .into_iter()
            .map(|event| match event {
                Value::String(text) => Ok(Bytes::from(text.clone())),
                other => serde_json::to_vec(other).map(Bytes::from),
            })
            .collect()
    }
}

/// Response body returned to the Functions host.
#[derive(Serialize, Deserialize, Debug, Default)]
pub struct InvocationResponse {
    #[serde(rename = "Outputs")]
    pub outputs: HashMap<String, Value>,
    #[serde(rename = "Logs")]
    pub logs: Vec<String>,
    #[serde(rename = "ReturnValue")]
    pub return_value: Option<Value>,
}

impl InvocationResponse {
    pub fn with_logs(logs: Vec<String>) -> Self {
        InvocationResponse {
            logs,
            ..Default::default()
        }
    }
}
