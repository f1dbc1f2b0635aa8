//! Inventory status aggregation, classification and reconciliation

pub mod aggregator;
pub mod classifier;
pub mod reconciler;

pub use aggregator::{compute_inventory_status, StatusRow};
pub use classifier::StatusBand;
pub use reconciler::{IntegrityWarning, ReconcileOutcome};
