//! HTTP client for the Transloadit assembly API.
//!
//! Implements [`hotfolder_core::service::JobService`] on top of
//! [`reqwest`]: signed multipart submission, signed status queries, and
//! streamed artifact downloads.

pub mod api;
pub mod messages;
pub mod signing;

pub use api::{ClientConfig, ClientError, TransloaditClient, DEFAULT_ENDPOINT};
