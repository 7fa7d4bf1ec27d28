//! examprep-client: HTTP backend integration.
//!
//! Implements the core `QuestionSource` and `AttemptSink` traits against
//! an examprep backend, and loads the file/env configuration shared by
//! the CLI.

pub mod config;
pub mod error;
pub mod http;

pub use config::{load_config_from, BackendConfig, ExamprepConfig};
pub use error::BackendError;
pub use http::HttpBackend;
