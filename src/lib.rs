//! # Wxgate
//!
//! **WeChat Official Account gateway for Rust.**
//!
//! Wxgate manages the platform's short-lived credentials and verifies the
//! callbacks it delivers, so nothing unauthenticated ever reaches message
//! handling and no request ever waits on an avoidable token round-trip.
//!
//! ## Features
//!
//! - **Credential lifecycle** — the `access_token` and the derived
//!   `jsapi_ticket` are fetched, persisted, and refreshed transparently
//!   behind one cache with a memory -> disk -> network fallback chain
//! - **Early local expiry** — a 300-second safety margin is subtracted
//!   from every server-declared lifetime, so credentials go dead locally
//!   before the platform expires them
//! - **Single-flight refresh** — concurrent fetches of an expired
//!   credential collapse into one remote call; a caller timeout cannot
//!   cancel the refresh for the others
//! - **Webhook verification** — every callback is gated on the SHA-1
//!   signature over `{timestamp, nonce, token}` before any body is read
//! - **Payload normalization** — delivered XML is flattened into the
//!   attribute map the reply policy consumes
//!
//! ## Quickstart
//!
//! ```no_run
//! use std::sync::Arc;
//! use wxgate::{CredentialCache, FileStore, WeixinApi, WxGateConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), wxgate::WxGateError> {
//!     let config = WxGateConfig::from_env()?;
//!     let source = Arc::new(WeixinApi::new(&config)?);
//!     let store = FileStore::new(&config.store_dir)?;
//!     let cache = CredentialCache::new(source, store);
//!
//!     wxgate::webhook::server::serve(&config, cache).await
//! }
//! ```

#![deny(warnings)]
#![deny(missing_docs)]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;

// Credential lifecycle
pub mod credential;

// Inbound webhook handling
pub mod webhook;

// Outbound menu management
pub mod menu;

// Re-exports for public API
pub use clock::{Clock, SystemClock};
pub use config::WxGateConfig;
pub use credential::cache::CredentialCache;
pub use credential::model::{Credential, CredentialKind, IssuedCredential};
pub use credential::source::{CredentialSource, WeixinApi};
pub use credential::store::FileStore;
pub use errors::WxGateError;
pub use webhook::payload::NormalizedMessage;
pub use webhook::signature::Verification;

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
