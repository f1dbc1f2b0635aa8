//! Database backup synchronization
//!
//! The scheduler snapshots the database and pushes it through a
//! [`RemoteBackup`] implementation on a configurable cadence. The remote
//! boundary is a trait so the transfer mechanics stay swappable; the crate
//! ships a filesystem-backed implementation.

pub mod backup;
pub mod scheduler;

pub use backup::{restore_backup, BackupEntry, FolderBackup, RemoteBackup};
pub use scheduler::{SyncConfig, SyncFrequency, SyncScheduler, SyncState};
