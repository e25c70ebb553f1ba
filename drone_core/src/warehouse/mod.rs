//! Append-only destination warehouses.

pub mod auth;
pub mod bigquery;
pub mod memory;
pub mod traits;
