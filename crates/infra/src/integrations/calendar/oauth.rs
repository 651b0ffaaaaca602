//! Google OAuth token refresh
//!
//! Tokens minted by the mobile apps must be refreshed with the client id of
//! the app that minted them, and those public clients carry no secret. Web
//! tokens use the configured web client id and secret.

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use reqwest::{Method, StatusCode};
use schej_core::TokenRefresher;
use schej_domain::{GoogleConfig, OAuthTokens, RefreshError, TokenOrigin};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::http::HttpClient;

/// Exchanges refresh tokens at Google's token endpoint
pub struct GoogleTokenRefresher {
    http: HttpClient,
    config: GoogleConfig,
}

/// Client credentials sent with a refresh request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthClient<'a> {
    pub client_id: &'a str,
    pub client_secret: Option<&'a str>,
}

impl GoogleTokenRefresher {
    pub fn new(http: HttpClient, config: GoogleConfig) -> Self {
        Self { http, config }
    }

    /// Client to refresh with for tokens of the given origin. Mobile origins
    /// fall back to the web client when their id is not configured.
    pub fn client_for(&self, origin: Option<TokenOrigin>) -> OAuthClient<'_> {
        let mobile_id = match origin {
            Some(TokenOrigin::Ios) => self.config.ios_client_id.as_deref(),
            Some(TokenOrigin::Android) => self.config.android_client_id.as_deref(),
            Some(TokenOrigin::Web) | None => None,
        };

        match mobile_id {
            Some(client_id) => OAuthClient { client_id, client_secret: None },
            None => OAuthClient {
                client_id: &self.config.client_id,
                client_secret: Some(&self.config.client_secret),
            },
        }
    }
}

#[async_trait]
impl TokenRefresher for GoogleTokenRefresher {
    async fn refresh(
        &self,
        tokens: &OAuthTokens,
        origin: Option<TokenOrigin>,
    ) -> Result<OAuthTokens, RefreshError> {
        let client = self.client_for(origin);

        let mut form = vec![
            ("client_id", client.client_id),
            ("refresh_token", tokens.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];
        if let Some(secret) = client.client_secret {
            form.push(("client_secret", secret));
        }

        let request = self.http.request(Method::POST, &self.config.token_url).form(&form);
        let response = self
            .http
            .send(request)
            .await
            .map_err(|e| RefreshError::Unreachable(format!("Token refresh request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body));
        }

        let refreshed: GoogleTokenRefreshResponse = response.json().await.map_err(|e| {
            RefreshError::Unreachable(format!("Failed to parse token response: {e}"))
        })?;

        debug!(origin = ?origin, expires_in = refreshed.expires_in, "access token refreshed");

        let access_token_expires_at = TimeDelta::try_seconds(refreshed.expires_in)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                RefreshError::Unreachable(format!(
                    "Token response has out-of-range expires_in: {}",
                    refreshed.expires_in
                ))
            })?;

        Ok(OAuthTokens {
            access_token: refreshed.access_token,
            access_token_expires_at,
            refresh_token: refreshed
                .refresh_token
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| tokens.refresh_token.clone()),
        })
    }
}

fn classify_failure(status: StatusCode, body: &str) -> RefreshError {
    let error = serde_json::from_str::<GoogleTokenError>(body).ok();
    let code = error.as_ref().map(|e| e.error.as_str()).unwrap_or("unknown_error");
    let message = format!("Token refresh failed ({status}): {code}");

    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        return RefreshError::Unreachable(message);
    }

    warn!(%status, code, "token refresh rejected");
    match (status, code) {
        (_, "invalid_grant" | "invalid_client" | "unauthorized_client") => {
            RefreshError::RefreshDenied(message)
        }
        (StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => {
            RefreshError::RefreshDenied(message)
        }
        _ => RefreshError::Unreachable(message),
    }
}

#[derive(Debug, Deserialize)]
struct GoogleTokenRefreshResponse {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleTokenError {
    error: String,
}
