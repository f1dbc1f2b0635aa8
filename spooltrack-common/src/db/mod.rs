//! Database layer: schema initialization, models, settings access

pub mod init;
pub mod models;
pub mod settings;

pub use init::{create_all_tables, init_database, init_memory_database};
