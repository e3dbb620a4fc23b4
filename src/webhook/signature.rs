//! Callback signature computation and verification.
//!
//! The platform signs every callback by sorting `timestamp`, `nonce`, and
//! the shared token lexicographically, concatenating, and hashing with
//! SHA-1. The check is identical for every HTTP method and must pass
//! before any request body is read.

use sha1::{Digest, Sha1};

/// Outcome of the authenticity check on one inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Recomputed signature matches the caller-supplied one.
    Verified,
    /// Mismatch: the request did not come from the platform.
    Rejected,
}

/// Compute the expected callback signature.
pub fn expected_signature(token: &str, timestamp: &str, nonce: &str) -> String {
    let mut parts = [timestamp, nonce, token];
    parts.sort_unstable();
    let joined = parts.concat();
    hex::encode(Sha1::digest(joined.as_bytes()))
}

/// Check a caller-supplied signature against the recomputed one.
pub fn verify(token: &str, timestamp: &str, nonce: &str, signature: &str) -> Verification {
    if expected_signature(token, timestamp, nonce) == signature {
        Verification::Verified
    } else {
        Verification::Rejected
    }
}

/// Compute the JS-SDK config signature from a jsapi ticket.
///
/// The four `key=value` parts are sorted lexicographically, joined with
/// `&`, and hashed with SHA-1.
pub fn jsapi_signature(ticket: &str, noncestr: &str, timestamp: i64, url: &str) -> String {
    let mut parts = [
        format!("jsapi_ticket={}", ticket),
        format!("noncestr={}", noncestr),
        format!("timestamp={}", timestamp),
        format!("url={}", url),
    ];
    parts.sort_unstable();
    let joined = parts.join("&");
    hex::encode(Sha1::digest(joined.as_bytes()))
}
