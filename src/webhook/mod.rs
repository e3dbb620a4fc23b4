//! Inbound webhook verification and message handling.

pub mod payload;
pub mod reply;
pub mod server;
pub mod signature;
