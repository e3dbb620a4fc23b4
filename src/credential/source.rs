//! Remote credential source over the platform HTTP API.
//!
//! Both credential kinds come back in the same protocol shape: a token
//! value plus `expires_in` seconds. Errors arrive as an `errcode`/`errmsg`
//! body on the same endpoints with a 200 status, so parsing has to treat
//! the envelope fields as optional and decide afterwards.

use crate::config::WxGateConfig;
use crate::credential::model::IssuedCredential;
use crate::errors::WxGateError;
use async_trait::async_trait;
use serde::Deserialize;

/// Issues credentials when called. The cache drives this; implementations
/// must not retry internally — a failed call is terminal for that refresh.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Issue a fresh access token.
    async fn issue_access_token(&self) -> Result<IssuedCredential, WxGateError>;

    /// Issue a fresh jsapi ticket. Requires a live access token, which the
    /// cache obtains first and passes in.
    async fn issue_jsapi_ticket(&self, access_token: &str)
        -> Result<IssuedCredential, WxGateError>;
}

/// Production source calling the platform API with reqwest.
pub struct WeixinApi {
    client: reqwest::Client,
    api_base: String,
    app_id: String,
    app_secret: String,
}

impl WeixinApi {
    /// Create a client from config.
    pub fn new(config: &WxGateConfig) -> Result<Self, WxGateError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| WxGateError::RemoteFetch(format!("Failed to create client: {}", e)))?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            app_id: config.app_id.clone(),
            app_secret: config.app_secret.clone(),
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T, WxGateError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| WxGateError::RemoteFetch(format!("Request failed: {}", e)))?;

        let body = response
            .bytes()
            .await
            .map_err(|e| WxGateError::RemoteFetch(format!("Failed to read body: {}", e)))?;

        serde_json::from_slice(&body)
            .map_err(|e| WxGateError::Protocol(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl CredentialSource for WeixinApi {
    async fn issue_access_token(&self) -> Result<IssuedCredential, WxGateError> {
        let url = format!(
            "{}/token?grant_type=client_credential&appid={}&secret={}",
            self.api_base, self.app_id, self.app_secret
        );
        let envelope: TokenEnvelope = self.get_json(&url).await?;
        envelope.into_issued()
    }

    async fn issue_jsapi_ticket(
        &self,
        access_token: &str,
    ) -> Result<IssuedCredential, WxGateError> {
        let url = format!(
            "{}/ticket/getticket?type=jsapi&access_token={}",
            self.api_base, access_token
        );
        let envelope: TicketEnvelope = self.get_json(&url).await?;
        envelope.into_issued()
    }
}

/// Token endpoint response: either the credential fields or an error body.
#[derive(Debug, Deserialize)]
struct TokenEnvelope {
    access_token: Option<String>,
    expires_in: Option<i64>,
    errcode: Option<i64>,
    errmsg: Option<String>,
}

impl TokenEnvelope {
    fn into_issued(self) -> Result<IssuedCredential, WxGateError> {
        if let Some(errcode) = self.errcode.filter(|&c| c != 0) {
            return Err(WxGateError::PlatformRejected {
                errcode,
                errmsg: self.errmsg.unwrap_or_default(),
            });
        }
        match (self.access_token, self.expires_in) {
            (Some(value), Some(lifetime_seconds)) => Ok(IssuedCredential {
                value,
                lifetime_seconds,
            }),
            _ => Err(WxGateError::Protocol(
                "Token response missing access_token or expires_in".to_string(),
            )),
        }
    }
}

/// Ticket endpoint response. Unlike the token endpoint, success carries
/// `errcode: 0` alongside the ticket.
#[derive(Debug, Deserialize)]
struct TicketEnvelope {
    ticket: Option<String>,
    expires_in: Option<i64>,
    errcode: Option<i64>,
    errmsg: Option<String>,
}

impl TicketEnvelope {
    fn into_issued(self) -> Result<IssuedCredential, WxGateError> {
        if let Some(errcode) = self.errcode.filter(|&c| c != 0) {
            return Err(WxGateError::PlatformRejected {
                errcode,
                errmsg: self.errmsg.unwrap_or_default(),
            });
        }
        match (self.ticket, self.expires_in) {
            (Some(value), Some(lifetime_seconds)) => Ok(IssuedCredential {
                value,
                lifetime_seconds,
            }),
            _ => Err(WxGateError::Protocol(
                "Ticket response missing ticket or expires_in".to_string(),
            )),
        }
    }
}
