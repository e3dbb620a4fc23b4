//! Credential types shared by the cache, store, and remote source.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Seconds subtracted from a server-declared lifetime before computing the
/// local expiry, so a credential goes dead locally before the platform
/// actually expires it.
pub const EXPIRY_SAFETY_MARGIN_SECONDS: i64 = 300;

/// The two credential types issued by the platform.
///
/// Both share one protocol shape (`value` + lifetime) and one refresh
/// routine; they differ only in endpoint and persistence key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    /// Platform-wide short-lived bearer token required on nearly all
    /// authenticated calls.
    AccessToken,
    /// Secondary short-lived token obtained using the access token,
    /// used for client-side JS-SDK signing.
    JsapiTicket,
}

impl CredentialKind {
    /// File name of the durable record for this kind.
    pub fn record_name(self) -> &'static str {
        match self {
            CredentialKind::AccessToken => "access_token.json",
            CredentialKind::JsapiTicket => "jsapi_ticket.json",
        }
    }

    /// Human-readable label for logs and errors.
    pub fn label(self) -> &'static str {
        match self {
            CredentialKind::AccessToken => "access_token",
            CredentialKind::JsapiTicket => "jsapi_ticket",
        }
    }
}

/// Raw issuance from the remote source: the token value plus the
/// server-declared lifetime, before local expiry is computed.
#[derive(Debug, Clone)]
pub struct IssuedCredential {
    /// The issued token value.
    pub value: String,
    /// Declared validity in seconds (e.g. 7200).
    pub lifetime_seconds: i64,
}

/// One acquired credential with its computed absolute expiry.
///
/// This is also the durable record format: the store serializes it as JSON
/// and overwrites the whole record on each refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// The token value.
    pub value: String,
    /// Absolute expiry, already shortened by the safety margin.
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Compute a credential from a raw issuance at `issue_time`.
    ///
    /// `expires_at = issue_time + (lifetime - safety margin)`, never the
    /// server's raw lifetime.
    pub fn from_issued(issued: &IssuedCredential, issue_time: DateTime<Utc>) -> Self {
        let effective = issued.lifetime_seconds - EXPIRY_SAFETY_MARGIN_SECONDS;
        Self {
            value: issued.value.clone(),
            expires_at: issue_time + Duration::seconds(effective),
        }
    }

    /// Liveness predicate: live iff `expires_at > now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Classification of a durable-store lookup.
///
/// A record is `Absent` when the file is missing or malformed, or when
/// either required field is missing; a well-formed record is `Live` or
/// `Expired` by the expiry comparison alone.
#[derive(Debug, Clone)]
pub enum RecordState {
    /// Present and not yet expired.
    Live(Credential),
    /// Present but past its expiry.
    Expired,
    /// No usable record.
    Absent,
}

impl RecordState {
    /// Classify an optional stored record against `now`.
    pub fn classify(record: Option<Credential>, now: DateTime<Utc>) -> Self {
        match record {
            Some(credential) if credential.is_live(now) => RecordState::Live(credential),
            Some(_) => RecordState::Expired,
            None => RecordState::Absent,
        }
    }
}
