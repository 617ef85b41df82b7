//! Core types shared by the hotfolder crates.
//!
//! Holds the job/artifact snapshot model, the watch configuration, the
//! output naming convention, the error taxonomy, and the [`JobService`]
//! trait the pipeline talks to.
//!
//! [`JobService`]: service::JobService

pub mod config;
pub mod error;
pub mod naming;
pub mod service;
pub mod types;
