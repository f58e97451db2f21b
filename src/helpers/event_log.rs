use std::fmt;
use std::sync::{Arc, Mutex};

use log::Level;

pub const BLOB_CREATED_TEMPLATE: &str =
    "Blob created event processed: {BlobName} in container {ContainerName} at {EventTime}";
pub const UNEXPECTED_EVENT_TEMPLATE: &str = "Received unexpected event type: {EventType}";
pub const PARSE_FAILED_MESSAGE: &str = "Failed to parse event data from Event Hub";
pub const PROCESSING_FAILED_MESSAGE: &str = "Error processing blob event from Event Hub";

/// A structured log record: a message template plus the named values that
/// fill its `{Placeholders}`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: Level,
    pub template: &'static str,
    pub fields: Vec<(&'static str, Option<String>)>,
    pub error: Option<String>,
}

impl LogRecord {
    pub fn new(level: Level, template: &'static str) -> Self {
        LogRecord {
            level,
            template,
            fields: Vec::new(),
            error: None,
        }
    }

    pub fn field(mut self, name: &'static str, value: Option<String>) -> Self {
        self.fields.push((name, value));
        self
    }

    pub fn error(mut self, error: impl fmt::Display) -> Self {
        self.error = Some(error.to_string());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .and_then(|(_, value)| value.as_deref())
    }

    /// Fills the template; absent values are written as `null`.
    pub fn render(&self) -> String {
        let mut message = self.template.to_string();
        for (name, value) in &self.fields {
            message = message.replace(
                &format!("{{{}}}", name),
                value.as_deref().unwrap_or("null"),
            );
        }

        match &self.error {
            Some(error) => format!("{}: {}", message, error),
            None => message,
        }
    }
}

/// Where processed events are reported.
pub trait EventLogger: Send + Sync {
    fn log(&self, record: &LogRecord);
}

/// Forwards records to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct FacadeLogger;

impl EventLogger for FacadeLogger {
    fn log(&self, record: &LogRecord) {
        log::log!(record.level, "{}", record.render());
    }
}

/// Collects the rendered records of one trigger invocation so they can be
/// returned to the Functions host, while still passing them on.
pub struct InvocationLogger {
    inner: Arc<dyn EventLogger>,
    lines: Mutex<Vec<String>>,
}

impl InvocationLogger {
    pub fn new(inner: Arc<dyn EventLogger>) -> Self {
        InvocationLogger {
            inner,
            lines: Mutex::new(Vec::new()),
        }
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EventLogger for InvocationLogger {
    fn log(&self, record: &LogRecord) {
        self.inner.log(record);

        let line = format!("[{}] {}", record.level, record.render());
        match self.lines.lock() {
            Ok(mut lines) => lines.push(line),
            Err(poisoned) => poisoned.into_inner().push(line),
        }
    }
}
