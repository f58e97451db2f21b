use thiserror::Error;

/// Why a single Event Hub message was skipped.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("message body is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("message body is not an array of Event Grid events: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),

    #[error("BlobCreated event {id} has malformed data: {source}")]
    MalformedPayload {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("BlobCreated event {id} carries no data")]
    MissingPayload { id: String },
}

impl ProcessingError {
    /// Decoding failures are reported apart from every other failure.
    pub fn is_parse_error(&self) -> bool {
        !matches!(self, ProcessingError::MissingPayload { .. })
    }
}
