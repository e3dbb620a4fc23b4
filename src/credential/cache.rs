//! In-memory credential cache with the memory -> store -> remote fallback
//! chain.
//!
//! The cache owns one entry per [`CredentialKind`]; entries refresh
//! independently. A refresh runs as a spawned task whose outcome is shared
//! by every concurrent caller, so an expired entry triggers at most one
//! remote call and a caller that times out cannot cancel the refresh for
//! the others.

use crate::clock::{Clock, SystemClock};
use crate::credential::model::{Credential, CredentialKind, RecordState};
use crate::credential::source::CredentialSource;
use crate::credential::store::FileStore;
use crate::errors::WxGateError;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

type SharedRefresh = Shared<BoxFuture<'static, Result<Credential, WxGateError>>>;

/// Per-kind cache entry: the last known credential plus the in-flight
/// refresh slot.
struct Entry {
    current: RwLock<Option<Credential>>,
    inflight: Mutex<Option<SharedRefresh>>,
}

impl Entry {
    fn new() -> Self {
        Self {
            current: RwLock::new(None),
            inflight: Mutex::new(None),
        }
    }
}

/// Credential cache over a remote source and a durable store.
///
/// Cheap to clone; clones share the same entries.
#[derive(Clone)]
pub struct CredentialCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    source: Arc<dyn CredentialSource>,
    store: FileStore,
    clock: Arc<dyn Clock>,
    access_token: Entry,
    jsapi_ticket: Entry,
}

impl CredentialCache {
    /// Create a cache using the system clock.
    pub fn new(source: Arc<dyn CredentialSource>, store: FileStore) -> Self {
        Self::with_clock(source, store, Arc::new(SystemClock))
    }

    /// Create a cache with a custom clock (for testing).
    pub fn with_clock(
        source: Arc<dyn CredentialSource>,
        store: FileStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                source,
                store,
                clock,
                access_token: Entry::new(),
                jsapi_ticket: Entry::new(),
            }),
        }
    }

    /// Get a live credential of the given kind.
    ///
    /// Fallback chain: in-memory entry, then the durable record, then the
    /// remote source. Only a remote failure is surfaced; a missing or
    /// expired record just falls through to the next layer.
    pub async fn fetch(&self, kind: CredentialKind) -> Result<Credential, WxGateError> {
        self.inner.clone().fetch(kind).await
    }

    /// Convenience: fetch the platform access token.
    pub async fn access_token(&self) -> Result<Credential, WxGateError> {
        self.fetch(CredentialKind::AccessToken).await
    }

    /// Convenience: fetch the jsapi ticket.
    pub async fn jsapi_ticket(&self) -> Result<Credential, WxGateError> {
        self.fetch(CredentialKind::JsapiTicket).await
    }
}

impl CacheInner {
    fn entry(&self, kind: CredentialKind) -> &Entry {
        match kind {
            CredentialKind::AccessToken => &self.access_token,
            CredentialKind::JsapiTicket => &self.jsapi_ticket,
        }
    }

    /// Return the in-memory credential if it is still live.
    fn live_in_memory(&self, kind: CredentialKind) -> Option<Credential> {
        let now = self.clock.now_utc();
        let guard = self.entry(kind).current.read().ok()?;
        guard.as_ref().filter(|c| c.is_live(now)).cloned()
    }

    /// Adopt a credential into the in-memory entry.
    fn adopt(&self, kind: CredentialKind, credential: &Credential) {
        if let Ok(mut guard) = self.entry(kind).current.write() {
            *guard = Some(credential.clone());
        }
    }

    async fn fetch(self: Arc<Self>, kind: CredentialKind) -> Result<Credential, WxGateError> {
        // Fast path: live in-memory entry, zero I/O.
        if let Some(credential) = self.live_in_memory(kind) {
            debug!(kind = kind.label(), "credential cache hit");
            return Ok(credential);
        }

        let refresh = {
            let entry = self.entry(kind);
            let mut inflight = entry.inflight.lock().await;

            // Re-check under the lock: a refresh may have landed while we
            // waited for the slot.
            if let Some(credential) = self.live_in_memory(kind) {
                return Ok(credential);
            }

            // Join the in-flight refresh if one is still running; a
            // completed future in the slot is a leftover and gets replaced.
            match inflight.as_ref().filter(|shared| shared.peek().is_none()) {
                Some(shared) => shared.clone(),
                None => {
                    let shared = spawn_refresh(self.clone(), kind);
                    *inflight = Some(shared.clone());
                    shared
                }
            }
        };

        refresh.await
    }

    /// One refresh pass: durable record first, remote source second.
    async fn refresh(self: Arc<Self>, kind: CredentialKind) -> Result<Credential, WxGateError> {
        let now = self.clock.now_utc();
        match RecordState::classify(self.store.load(kind).await, now) {
            RecordState::Live(credential) => {
                debug!(kind = kind.label(), "adopted live credential record");
                self.adopt(kind, &credential);
                return Ok(credential);
            }
            RecordState::Expired => debug!(kind = kind.label(), "credential record expired"),
            RecordState::Absent => debug!(kind = kind.label(), "no credential record"),
        }

        let issued = match kind {
            CredentialKind::AccessToken => self.source.issue_access_token().await?,
            CredentialKind::JsapiTicket => {
                // Derived credential: needs a live access token first,
                // obtained through this same cache.
                let token = self.clone().fetch(CredentialKind::AccessToken).await?;
                self.source.issue_jsapi_ticket(&token.value).await?
            }
        };

        let credential = Credential::from_issued(&issued, self.clock.now_utc());
        info!(
            kind = kind.label(),
            expires_at = %credential.expires_at,
            "refreshed credential from remote source"
        );

        // A failed write does not invalidate the refresh: the in-memory
        // credential is good, persistence just lagged.
        if let Err(e) = self.store.save(kind, &credential).await {
            warn!(kind = kind.label(), error = %e, "failed to persist credential record");
        }

        self.adopt(kind, &credential);
        Ok(credential)
    }
}

/// Spawn a refresh as a detached task and wrap its outcome in a shareable
/// future. Spawning keeps the refresh running to completion even when the
/// caller that started it is dropped by a request timeout.
fn spawn_refresh(inner: Arc<CacheInner>, kind: CredentialKind) -> SharedRefresh {
    let handle = tokio::spawn(inner.refresh(kind));
    async move {
        handle.await.unwrap_or_else(|e| {
            Err(WxGateError::RemoteFetch(format!(
                "Refresh task failed: {}",
                e
            )))
        })
    }
    .boxed()
    .shared()
}
