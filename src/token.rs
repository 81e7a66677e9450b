use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Tokens are treated as expired this long before their actual expiry so
/// an in-flight request never carries a token that dies mid-call.
const EXPIRY_BUFFER_SECS: i64 = 60;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("HTTP request failed")]
    Request(#[from] reqwest::Error),

    #[error("token refresh failed: status={status:?}, message='{message}'")]
    RefreshFailed {
        status: Option<reqwest::StatusCode>,
        message: String,
    },
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn expires_within(&self, buffer: Duration) -> bool {
        Utc::now() + buffer >= self.expires_at
    }
}

#[derive(Debug, Serialize)]
pub struct TokenStatus {
    pub service: &'static str,
    pub has_token: bool,
    pub expires_in_secs: i64,
}

/// Bearer-token cache for one remote platform. Refreshes lazily via the
/// client_credentials grant; the refresh happens under the mutex, so
/// concurrent callers wait for a single refresh instead of racing.
pub struct TokenProvider {
    service: &'static str,
    token_url: String,
    client_id: String,
    client_secret: String,
    http: Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(
        service: &'static str,
        http: Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            service,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            http,
            cached: Mutex::new(None),
        }
    }

    pub async fn bearer_token(&self) -> Result<String, TokenError> {
        let mut guard = self.cached.lock().await;

        if let Some(token) = guard.as_ref() {
            if !token.expires_within(Duration::seconds(EXPIRY_BUFFER_SECS)) {
                return Ok(token.access_token.clone());
            }
            debug!("{} token expires soon, refreshing", self.service);
        }

        match self.request_token().await {
            Ok(response) => {
                let expires_at = Utc::now() + Duration::seconds(response.expires_in as i64);
                *guard = Some(CachedToken {
                    access_token: response.access_token.clone(),
                    expires_at,
                });
                info!(
                    "{} token refreshed, valid for {}s",
                    self.service, response.expires_in
                );
                Ok(response.access_token)
            }
            Err(e) => {
                // A failed refresh leaves no token worth reusing.
                *guard = None;
                Err(e)
            }
        }
    }

    async fn request_token(&self) -> Result<TokenResponse, TokenError> {
        let credentials =
            BASE64_STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));

        let response = self
            .http
            .post(&self.token_url)
            .header(AUTHORIZATION, format!("Basic {credentials}"))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(response.json::<TokenResponse>().await?)
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|e| format!("failed to read error body: {e}"));
            Err(TokenError::RefreshFailed {
                status: Some(status),
                message,
            })
        }
    }

    pub async fn status(&self) -> TokenStatus {
        let guard = self.cached.lock().await;
        match guard.as_ref() {
            Some(token) => TokenStatus {
                service: self.service,
                has_token: true,
                expires_in_secs: (token.expires_at - Utc::now()).num_seconds().max(0),
            },
            None => TokenStatus {
                service: self.service,
                has_token: false,
                expires_in_secs: 0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_outside_buffer_is_not_expired() {
        let token = CachedToken {
            access_token: "abc".to_string(),
            expires_at: Utc::now() + Duration::seconds(300),
        };
        assert!(!token.expires_within(Duration::seconds(EXPIRY_BUFFER_SECS)));
    }

    #[test]
    fn token_inside_buffer_counts_as_expired() {
        let token = CachedToken {
            access_token: "abc".to_string(),
            expires_at: Utc::now() + Duration::seconds(30),
        };
        assert!(token.expires_within(Duration::seconds(EXPIRY_BUFFER_SECS)));
    }

    #[tokio::test]
    async fn status_reports_missing_token() {
        let provider = TokenProvider::new(
            "hr-platform",
            Client::new(),
            "http://localhost:1/token",
            "id",
            "secret",
        );
        let status = provider.status().await;
        assert!(!status.has_token);
        assert_eq!(status.expires_in_secs, 0);
    }
}
