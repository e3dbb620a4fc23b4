//! Self-menu management calls, gated behind the credential cache.
//!
//! Thin glue over the platform's menu endpoints: every call first asks the
//! cache for a live access token, which refreshes transparently if needed.

use crate::config::WxGateConfig;
use crate::credential::cache::CredentialCache;
use crate::errors::WxGateError;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

/// Menu management client.
pub struct MenuApi {
    client: reqwest::Client,
    api_base: String,
    cache: CredentialCache,
}

impl MenuApi {
    /// Create a menu client sharing the given credential cache.
    pub fn new(config: &WxGateConfig, cache: CredentialCache) -> Result<Self, WxGateError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| WxGateError::RemoteFetch(format!("Failed to create client: {}", e)))?;
        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            cache,
        })
    }

    /// Create (replace) the account's custom menu.
    pub async fn create(&self, menu: &Value) -> Result<(), WxGateError> {
        let token = self.cache.access_token().await?;
        let url = format!("{}/menu/create?access_token={}", self.api_base, token.value);
        let body = self
            .client
            .post(&url)
            .json(menu)
            .send()
            .await
            .map_err(|e| WxGateError::RemoteFetch(format!("Menu create failed: {}", e)))?
            .bytes()
            .await
            .map_err(|e| WxGateError::RemoteFetch(format!("Failed to read body: {}", e)))?;
        check_envelope(&body)?;
        info!("custom menu created");
        Ok(())
    }

    /// Delete the account's custom menu.
    pub async fn delete(&self) -> Result<(), WxGateError> {
        let token = self.cache.access_token().await?;
        let url = format!("{}/menu/delete?access_token={}", self.api_base, token.value);
        let body = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| WxGateError::RemoteFetch(format!("Menu delete failed: {}", e)))?
            .bytes()
            .await
            .map_err(|e| WxGateError::RemoteFetch(format!("Failed to read body: {}", e)))?;
        check_envelope(&body)?;
        info!("custom menu deleted");
        Ok(())
    }
}

/// Menu endpoints answer with a bare `errcode`/`errmsg` envelope.
#[derive(Debug, Deserialize)]
struct MenuEnvelope {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

fn check_envelope(body: &[u8]) -> Result<(), WxGateError> {
    let envelope: MenuEnvelope = serde_json::from_slice(body)
        .map_err(|e| WxGateError::Protocol(format!("Failed to parse response: {}", e)))?;
    if envelope.errcode != 0 {
        return Err(WxGateError::PlatformRejected {
            errcode: envelope.errcode,
            errmsg: envelope.errmsg,
        });
    }
    Ok(())
}

/// Default menu payload: one click button plus two submenus.
pub fn default_menu() -> Value {
    json!({
        "button": [
            {
                "type": "click",
                "name": "Poke me",
                "key": "poke"
            },
            {
                "name": "Menu",
                "sub_button": [
                    {
                        "type": "view",
                        "name": "Open site",
                        "url": "https://example.com/"
                    },
                    {
                        "type": "scancode_waitmsg",
                        "name": "Scan with prompt",
                        "key": "scan_wait"
                    },
                    {
                        "type": "scancode_push",
                        "name": "Scan and push",
                        "key": "scan_push"
                    }
                ]
            },
            {
                "name": "Pictures",
                "sub_button": [
                    {
                        "type": "pic_sysphoto",
                        "name": "Camera",
                        "key": "pic_camera"
                    },
                    {
                        "type": "pic_photo_or_album",
                        "name": "Camera or album",
                        "key": "pic_album"
                    },
                    {
                        "type": "location_select",
                        "name": "Send location",
                        "key": "send_location"
                    }
                ]
            }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_ok() {
        assert!(check_envelope(br#"{"errcode":0,"errmsg":"ok"}"#).is_ok());
    }

    #[test]
    fn envelope_error_code() {
        let err = check_envelope(br#"{"errcode":40018,"errmsg":"invalid button name size"}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            WxGateError::PlatformRejected { errcode: 40018, .. }
        ));
    }

    #[test]
    fn envelope_not_json() {
        assert!(matches!(
            check_envelope(b"<html>"),
            Err(WxGateError::Protocol(_))
        ));
    }

    #[test]
    fn default_menu_has_three_top_buttons() {
        let menu = default_menu();
        assert_eq!(menu["button"].as_array().unwrap().len(), 3);
        assert_eq!(menu["button"][0]["type"], "click");
    }
}
