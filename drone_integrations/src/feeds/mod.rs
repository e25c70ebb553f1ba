//! Built-in feeds and the registry used to select them by name.

pub mod abusech;
mod http;

use drone_core::{Error, FeedSource, Result};
use std::fmt;
use std::sync::Arc;

/// Options shared by feed constructors.
#[derive(Clone, Default)]
pub struct FeedOptions {
    /// abuse.ch Auth-Key, sent when set.
    pub abusech_auth_key: Option<String>,
}

impl fmt::Debug for FeedOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedOptions")
            .field(
                "abusech_auth_key",
                &self.abusech_auth_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Feed ids, in registry order.
pub const FEED_IDS: &[&str] = &[abusech::feodo::FEED_ID, abusech::threatfox::FEED_ID];

pub fn by_name(name: &str, opts: &FeedOptions) -> Result<Arc<dyn FeedSource>> {
    let key = opts.abusech_auth_key.as_deref();
    match name.trim() {
        abusech::feodo::FEED_ID => Ok(Arc::new(abusech::Feodo::new(key)?)),
        abusech::threatfox::FEED_ID => Ok(Arc::new(abusech::ThreatFox::new(key)?)),
        other => Err(Error::Configuration(format!(
            "unknown feed '{other}' (available: {})",
            FEED_IDS.join(", ")
        ))),
    }
}

pub fn all(opts: &FeedOptions) -> Result<Vec<Arc<dyn FeedSource>>> {
    FEED_IDS.iter().map(|id| by_name(id, opts)).collect()
}

/// Resolve `names` to feeds; an empty selection means every feed.
pub fn select(names: &[String], opts: &FeedOptions) -> Result<Vec<Arc<dyn FeedSource>>> {
    if names.is_empty() {
        return all(opts);
    }
    let mut out: Vec<Arc<dyn FeedSource>> = Vec::with_capacity(names.len());
    for name in names {
        let feed = by_name(name, opts)?;
        if out.iter().any(|f| f.id() == feed.id()) {
            continue;
        }
        out.push(feed);
    }
    Ok(out)
}
