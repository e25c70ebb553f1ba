//! Feed sources implementing the drone `FeedSource` trait.

pub mod feeds;

pub use feeds::{FeedOptions, all, by_name, select};
