//! Webhook HTTP server: one callback route, demultiplexed by method.
//!
//! Every inbound request passes the signature gate first, before any body
//! byte is read; only then does the method decide between the GET
//! handshake (echo `echostr` verbatim) and the POST delivery (decode,
//! normalize, run the reply policy, acknowledge with an empty body). Any
//! other method, and any failed signature, gets the literal error marker.

use crate::clock::{Clock, SystemClock};
use crate::config::WxGateConfig;
use crate::credential::cache::CredentialCache;
use crate::errors::WxGateError;
use crate::webhook::payload::parse_message;
use crate::webhook::reply::{decide, render_xml};
use crate::webhook::signature::{jsapi_signature, verify, Verification};
use axum::body::to_bytes;
use axum::extract::{Query, Request, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Literal response body for rejected or unsupported requests.
pub const ERROR_MARKER: &str = "error";

/// Upper bound on a delivery body.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Upper bound on reading a delivery body.
const BODY_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared server state: the callback token plus the credential cache the
/// authenticated outbound calls go through.
pub struct GatewayState {
    token: String,
    cache: CredentialCache,
    clock: Arc<dyn Clock>,
}

impl GatewayState {
    /// Create server state.
    pub fn new(token: String, cache: CredentialCache, clock: Arc<dyn Clock>) -> Self {
        Self {
            token,
            cache,
            clock,
        }
    }
}

/// Query parameters the platform sends on every callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    signature: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    nonce: Option<String>,
    /// Handshake only.
    #[serde(default)]
    echostr: Option<String>,
}

/// Build the callback router.
pub fn build_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/", any(handle_callback))
        .route("/jsapi/config", get(handle_jsapi_config))
        .with_state(state)
}

/// Bind and serve until ctrl-c.
pub async fn serve(config: &WxGateConfig, cache: CredentialCache) -> Result<(), WxGateError> {
    let state = Arc::new(GatewayState::new(
        config.token.clone(),
        cache,
        Arc::new(SystemClock),
    ));

    let listener = TcpListener::bind(&config.bind)
        .await
        .map_err(|e| WxGateError::Server(format!("Failed to bind {}: {}", config.bind, e)))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| WxGateError::Server(format!("Failed to resolve bound address: {}", e)))?;
    info!(addr = %local_addr, "webhook server listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .map_err(|e| WxGateError::Server(format!("Server exited unexpectedly: {}", e)))
}

async fn handle_callback(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<CallbackQuery>,
    request: Request,
) -> Response {
    // Authenticity gate comes first, identical for every method, before
    // any body byte is read.
    let verification = verify(
        &state.token,
        query.timestamp.as_deref().unwrap_or(""),
        query.nonce.as_deref().unwrap_or(""),
        query.signature.as_deref().unwrap_or(""),
    );
    if verification == Verification::Rejected {
        debug!("callback signature rejected");
        return ERROR_MARKER.into_response();
    }

    let method = request.method().clone();
    if method == Method::GET {
        handle_handshake(query)
    } else if method == Method::POST {
        handle_delivery(&state, request).await
    } else {
        ERROR_MARKER.into_response()
    }
}

/// Verified GET: endpoint-ownership handshake, echo `echostr` verbatim.
fn handle_handshake(query: CallbackQuery) -> Response {
    query.echostr.unwrap_or_default().into_response()
}

/// Verified POST: delivery of a user-originated event or message.
///
/// The platform redelivers up to twice more if no timely acknowledgement
/// is observed, so every path out of here answers with an empty body.
async fn handle_delivery(state: &GatewayState, request: Request) -> Response {
    let body = match tokio::time::timeout(
        BODY_READ_TIMEOUT,
        to_bytes(request.into_body(), MAX_BODY_BYTES),
    )
    .await
    {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => {
            warn!(error = %e, "failed to read delivery body");
            return "".into_response();
        }
        Err(_) => {
            warn!("timed out reading delivery body");
            return "".into_response();
        }
    };

    let xml = String::from_utf8_lossy(&body);
    match parse_message(&xml) {
        Ok(message) => {
            let reply = decide(&message, state.clock.now_utc().timestamp());
            debug!(
                msg_type = message.msg_type(),
                reply = %render_xml(&reply),
                "delivery handled"
            );
        }
        Err(e) => warn!(error = %e, "undecodable delivery payload"),
    }

    "".into_response()
}

/// Query parameters for the JS-SDK config signature endpoint.
#[derive(Debug, Deserialize)]
pub struct JsapiConfigQuery {
    url: String,
}

/// Compute a JS-SDK config signature for a page URL.
///
/// Goes through the credential cache for the jsapi ticket; the ticket
/// refresh, if needed, transparently obtains an access token first.
async fn handle_jsapi_config(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<JsapiConfigQuery>,
) -> Response {
    let ticket = match state.cache.jsapi_ticket().await {
        Ok(ticket) => ticket,
        Err(e) => {
            warn!(error = %e, "jsapi ticket unavailable");
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({"error": e.to_string()})),
            )
                .into_response();
        }
    };

    let now = state.clock.now_utc();
    let timestamp = now.timestamp();
    let noncestr = format!("{:x}", now.timestamp_nanos_opt().unwrap_or(timestamp));
    let signature = jsapi_signature(&ticket.value, &noncestr, timestamp, &query.url);

    Json(json!({
        "signature": signature,
        "noncestr": noncestr,
        "timestamp": timestamp,
    }))
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::credential::model::IssuedCredential;
    use crate::credential::source::CredentialSource;
    use crate::credential::store::FileStore;
    use crate::webhook::signature::expected_signature;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    const TOKEN: &str = "mytoken123";
    const TIMESTAMP: &str = "1571012359";
    const NONCE: &str = "226149479";

    struct StaticSource;

    #[async_trait]
    impl CredentialSource for StaticSource {
        async fn issue_access_token(&self) -> Result<IssuedCredential, WxGateError> {
            Ok(IssuedCredential {
                value: "TOKEN".to_string(),
                lifetime_seconds: 7200,
            })
        }

        async fn issue_jsapi_ticket(
            &self,
            _access_token: &str,
        ) -> Result<IssuedCredential, WxGateError> {
            Ok(IssuedCredential {
                value: "TICKET".to_string(),
                lifetime_seconds: 7200,
            })
        }
    }

    /// Bind the router on an ephemeral port and return its base URL.
    async fn spawn_server(temp_dir: &TempDir) -> String {
        let store = FileStore::new(temp_dir.path()).unwrap();
        let clock = MockClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap());
        let cache = CredentialCache::with_clock(Arc::new(StaticSource), store, Arc::new(clock.clone()));
        let state = Arc::new(GatewayState::new(
            TOKEN.to_string(),
            cache,
            Arc::new(clock),
        ));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, build_router(state)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn signed_query() -> String {
        format!(
            "signature={}&timestamp={}&nonce={}",
            expected_signature(TOKEN, TIMESTAMP, NONCE),
            TIMESTAMP,
            NONCE
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn handshake_echoes_echostr_verbatim() {
        let temp_dir = TempDir::new().unwrap();
        let base = spawn_server(&temp_dir).await;
        let url = format!("{}/?{}&echostr=7968985672938160023", base, signed_query());

        let response = reqwest::get(&url).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), "7968985672938160023");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn handshake_with_bad_signature_returns_error_marker() {
        let temp_dir = TempDir::new().unwrap();
        let base = spawn_server(&temp_dir).await;
        let url = format!(
            "{}/?signature=deadbeef&timestamp={}&nonce={}&echostr=x",
            base, TIMESTAMP, NONCE
        );

        let response = reqwest::get(&url).await.unwrap();
        assert_eq!(response.text().await.unwrap(), ERROR_MARKER);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delivery_acknowledges_with_empty_body() {
        let temp_dir = TempDir::new().unwrap();
        let base = spawn_server(&temp_dir).await;
        let url = format!("{}/?{}", base, signed_query());

        let payload = "<xml><MsgType><![CDATA[text]]></MsgType>\
                       <ToUserName><![CDATA[gh]]></ToUserName>\
                       <FromUserName><![CDATA[user]]></FromUserName>\
                       <Content><![CDATA[1]]></Content></xml>";
        let response = reqwest::Client::new()
            .post(&url)
            .body(payload)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), "");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejected_delivery_short_circuits_before_the_body() {
        let temp_dir = TempDir::new().unwrap();
        let base = spawn_server(&temp_dir).await;
        let url = format!(
            "{}/?signature=deadbeef&timestamp={}&nonce={}",
            base, TIMESTAMP, NONCE
        );

        // The body is not even valid XML; a rejected request must never
        // look at it.
        let response = reqwest::Client::new()
            .post(&url)
            .body("not xml at all")
            .send()
            .await
            .unwrap();
        assert_eq!(response.text().await.unwrap(), ERROR_MARKER);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unsupported_method_returns_error_marker() {
        let temp_dir = TempDir::new().unwrap();
        let base = spawn_server(&temp_dir).await;
        let url = format!("{}/?{}", base, signed_query());

        let response = reqwest::Client::new().put(&url).send().await.unwrap();
        assert_eq!(response.text().await.unwrap(), ERROR_MARKER);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn jsapi_config_signs_through_the_cache() {
        let temp_dir = TempDir::new().unwrap();
        let base = spawn_server(&temp_dir).await;
        let url = format!("{}/jsapi/config?url=https://example.com/page", base);

        let response = reqwest::get(&url).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = response.json().await.unwrap();

        let signature = body["signature"].as_str().unwrap();
        let noncestr = body["noncestr"].as_str().unwrap();
        let timestamp = body["timestamp"].as_i64().unwrap();
        assert_eq!(
            signature,
            jsapi_signature("TICKET", noncestr, timestamp, "https://example.com/page")
        );
    }
}
