//! # Spooltrack Common Library
//!
//! Shared code for the Spooltrack filament tracker:
//! - Database schema, initialization and models
//! - Settings (key-value) access
//! - Configuration loading and data folder resolution
//! - Common error types

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
