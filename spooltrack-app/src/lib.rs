//! # Spooltrack application library
//!
//! Inventory and record-keeping engine for 3D-printing filament:
//! - Entity CRUD over the record store (filaments, printers, components, jobs)
//! - Inventory status aggregation and classification
//! - Ideal-quantity reconciliation across link-group changes
//! - Print job cost calculation and CSV export
//! - Usage reports
//! - Cloud backup sync scheduler

pub mod costs;
pub mod db;
pub mod export;
pub mod inventory;
pub mod reports;
pub mod sync;

pub use spooltrack_common::{Error, Result};
