//! abuse.ch feeds (https://abuse.ch).

pub mod feodo;
pub mod threatfox;

pub use feodo::Feodo;
pub use threatfox::ThreatFox;
