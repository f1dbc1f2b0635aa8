//! Entity queries against the record store
//!
//! One module per entity family. Every mutating operation runs as a single
//! transaction and rolls back on any internal error.

pub mod components;
pub mod filaments;
pub mod ideal;
pub mod link_groups;
pub mod print_jobs;
pub mod printers;
