//! Wxgate error types.

use thiserror::Error;

/// Errors that can occur in the gateway.
///
/// `Clone` because a single refresh outcome is shared by every caller
/// awaiting that refresh.
#[derive(Debug, Clone, Error)]
pub enum WxGateError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Remote credential call failed or timed out.
    ///
    /// Terminal for the `fetch` invocation that triggered the refresh;
    /// the cache does not retry.
    #[error("Remote credential fetch failed: {0}")]
    RemoteFetch(String),

    /// The platform returned a well-formed error body (`errcode`/`errmsg`).
    #[error("Platform rejected request: errcode={errcode} errmsg={errmsg}")]
    PlatformRejected {
        /// Platform error code.
        errcode: i64,
        /// Platform error message.
        errmsg: String,
    },

    /// Remote response body could not be parsed.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Durable credential store could not be written.
    ///
    /// Store *reads* never produce this: a missing or malformed record is
    /// the normal "no cached credential yet" condition.
    #[error("Credential store write failed: {0}")]
    StoreWrite(String),

    /// Inbound webhook payload could not be decoded.
    #[error("Payload error: {0}")]
    Payload(String),

    /// Webhook server failed to bind or serve.
    #[error("Server error: {0}")]
    Server(String),
}
