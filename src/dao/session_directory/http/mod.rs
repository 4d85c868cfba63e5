//! Session directory backed by the external session-content HTTP service.

mod client;
mod config;
mod error;

pub use client::HttpSessionDirectory;
pub use config::HttpDirectoryConfig;
pub use error::{HttpDirectoryError, HttpResult};
