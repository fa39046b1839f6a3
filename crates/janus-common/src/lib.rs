//! Janus Common - Shared types and utilities
//!
//! This crate provides the resource data model, error definitions, and
//! configuration types used across all janus components.

pub mod config;
pub mod error;
pub mod types;

pub use config::DualWriteConfig;
pub use error::{Error, Result};
pub use types::*;
