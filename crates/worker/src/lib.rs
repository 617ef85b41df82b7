//! Hot-folder worker: environment configuration for the binary.

pub mod config;
