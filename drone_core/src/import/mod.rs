//! Feed import (fetch, dedupe, append, log).
//!
//! - Pulls the full current snapshot from a feed (via `FeedSource`)
//! - Drops records whose natural key is already stored (via `Warehouse::existing_keys`)
//! - Appends the remaining rows to the feed's table
//! - Appends one `ImportLog` entry per successful run

pub mod engine;
pub mod models;
pub mod traits;
