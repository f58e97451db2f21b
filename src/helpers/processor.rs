use std::sync::Arc;

use log::Level;

use super::blob_event::{BlobCreatedEventData, EventGridEvent};
use super::blob_path::{extract_blob_name, extract_container_name};
use super::error::ProcessingError;
use super::event_log::{
    EventLogger, LogRecord, BLOB_CREATED_TEMPLATE, PARSE_FAILED_MESSAGE,
    PROCESSING_FAILED_MESSAGE, UNEXPECTED_EVENT_TEMPLATE,
};

/// Turns batches of Event Hub messages into log records.
///
/// Every message is handled on its own: a failing message is reported and
/// skipped, and `process` itself never fails.
pub struct EventBatchProcessor {
    logger: Arc<dyn EventLogger>,
}

impl EventBatchProcessor {
    pub fn new(logger: Arc<dyn EventLogger>) -> Self {
        EventBatchProcessor { logger }
    }

    pub fn process<M: AsRef<[u8]>>(&self, batch: &[M]) {
        for message in batch {
            if let Err(err) = self.process_message(message.as_ref()) {
                let message = if err.is_parse_error() {
                    PARSE_FAILED_MESSAGE
                } else {
                    PROCESSING_FAILED_MESSAGE
                };
                self.logger
                    .log(&LogRecord::new(Level::Error, message).error(&err));
            }
        }
    }

    // A failing envelope abandons the rest of its message.
    fn process_message(&self, body: &[u8]) -> Result<(), ProcessingError> {
        let text = std::str::from_utf8(body)?;

        let events: Option<Vec<Option<EventGridEvent>>> =
            serde_json::from_str(text).map_err(ProcessingError::MalformedEnvelope)?;

        for event in events.iter().flatten() {
            match event {
                Some(event) if event.is_blob_created() => self.blob_created(event)?,
                other => self.logger.log(
                    &LogRecord::new(Level::Warn, UNEXPECTED_EVENT_TEMPLATE).field(
                        "EventType",
                        other.as_ref().and_then(|e| e.event_type.clone()),
                    ),
                ),
            }
        }

        Ok(())
    }

    fn blob_created(&self, event: &EventGridEvent) -> Result<(), ProcessingError> {
        let id = || event.id.clone().unwrap_or_default();

        let data = event
            .data
            .as_ref()
            .ok_or_else(|| ProcessingError::MissingPayload { id: id() })?;
        let payload = BlobCreatedEventData::from_raw(data)
            .map_err(|source| ProcessingError::MalformedPayload { id: id(), source })?;

        let url = payload.as_ref().and_then(|p| p.url.as_deref());

        self.logger.log(
            &LogRecord::new(Level::Info, BLOB_CREATED_TEMPLATE)
                .field("BlobName", extract_blob_name(url))
                .field("ContainerName", extract_container_name(url))
                .field("EventTime", event.event_time.map(|t| t.to_rfc3339())),
        );

        Ok(())
    }
}
