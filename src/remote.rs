use reqwest::header::ACCEPT;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::token::{TokenError, TokenProvider};

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("HTTP request failed")]
    Request(#[from] reqwest::Error),

    #[error("JSON processing error")]
    Json(#[from] serde_json::Error),

    #[error("URL parsing error")]
    UrlParse(#[from] url::ParseError),

    #[error("{service} API error: status={status}, message='{message}'")]
    Api {
        service: &'static str,
        status: StatusCode,
        message: String,
    },

    #[error("{service} rate limit exceeded (status 429)")]
    RateLimitExceeded { service: &'static str },

    #[error(transparent)]
    Token(#[from] TokenError),
}

// Error bodies vary per platform; a top-level "message" is the common case.
#[derive(Debug, Deserialize)]
struct RemoteErrorBody {
    message: Option<String>,
}

/// Shared plumbing for one bearer-authenticated remote platform: base URL
/// joining, token injection, response decoding and error-body surfacing.
pub struct RemoteService {
    name: &'static str,
    base_url: Url,
    http: Client,
    tokens: Arc<TokenProvider>,
}

impl RemoteService {
    pub fn new(
        name: &'static str,
        http: Client,
        base_url: &str,
        tokens: Arc<TokenProvider>,
    ) -> Result<Self, RemoteError> {
        // A trailing slash keeps Url::join appending instead of replacing
        // the last path segment.
        let mut raw = base_url.to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Ok(Self {
            name,
            base_url: Url::parse(&raw)?,
            http,
            tokens,
        })
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
        Ok(self.base_url.join(path)?)
    }

    async fn authorized(&self, method: Method, url: Url) -> Result<RequestBuilder, RemoteError> {
        let token = self.tokens.bearer_token().await?;
        Ok(self
            .http
            .request(method, url)
            .bearer_auth(token)
            .header(ACCEPT, "application/json"))
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        url: Url,
        context_msg: &str,
    ) -> Result<T, RemoteError> {
        let builder = self.authorized(Method::GET, url).await?;
        self.execute(builder, context_msg).await
    }

    pub async fn send_json<B, T>(
        &self,
        method: Method,
        url: Url,
        body: &B,
        context_msg: &str,
    ) -> Result<T, RemoteError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self.authorized(method, url).await?.json(body);
        self.execute(builder, context_msg).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        context_msg: &str,
    ) -> Result<T, RemoteError> {
        let response = builder.send().await?;
        let status = response.status();
        debug!("{}: '{}' returned {}", self.name, context_msg, status);

        if status.is_success() {
            let bytes = response.bytes().await?;
            match serde_json::from_slice(&bytes) {
                Ok(data) => Ok(data),
                Err(e) => {
                    error!(
                        "{}: deserializing '{}' response failed: {}",
                        self.name, context_msg, e
                    );
                    Err(RemoteError::Json(e))
                }
            }
        } else {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("failed to read error body: {e}"));
            error!(
                "{}: '{}' failed with {}: {}",
                self.name, context_msg, status, body
            );

            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(RemoteError::RateLimitExceeded { service: self.name });
            }

            let message = serde_json::from_str::<RemoteErrorBody>(&body)
                .ok()
                .and_then(|parsed| parsed.message)
                .unwrap_or(body);
            Err(RemoteError::Api {
                service: self.name,
                status,
                message,
            })
        }
    }
}
