pub mod blob_event;
pub mod blob_path;
pub mod config;
pub mod error;
pub mod event_log;
pub mod health;
pub mod invocation;
pub mod processor;
