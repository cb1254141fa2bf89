//! Background Tasks Module
//!
//! Contains background tasks that run periodically while the service is up.
//!
//! # Tasks
//! - Cache maintenance: drops expired entries, then trims the store to its size cap

mod maintenance;

pub use maintenance::{run_maintenance, spawn_maintenance_task, MaintenanceReport};
