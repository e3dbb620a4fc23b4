//! Credential lifecycle: acquisition, persistence, expiry, refresh.

pub mod cache;
pub mod model;
pub mod source;
pub mod store;
