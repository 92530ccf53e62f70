//! Authenticated fetch wrapper.
//!
//! Every protected call goes through [`AuthenticatedFetch`], which reads
//! the live token at send time and turns a `401` into a logout.

use reqwest::header::HeaderMap;
use reqwest::{Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::context::AuthContext;

use super::{ApiClient, FetchError};

/// Method, headers and optional JSON body of an outgoing request.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post(body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthenticatedFetch {
    api: ApiClient,
    context: AuthContext,
}

impl AuthenticatedFetch {
    pub fn new(api: ApiClient, context: AuthContext) -> Self {
        Self { api, context }
    }

    pub fn context(&self) -> &AuthContext {
        &self.context
    }

    /// Send a request, attaching the current token if there is one.
    ///
    /// Any status other than `401` is handed back for the caller to
    /// interpret. A `401` invalidates the session that was attached and
    /// returns [`FetchError::AuthRejected`]. Nothing is retried.
    pub async fn request(&self, path: &str, options: RequestOptions) -> Result<Response, FetchError> {
        let RequestOptions { method, headers, body } = options;
        let url = self.api.url(path);
        let token = self.context.token();

        let mut builder = self.api.http().request(method.clone(), &url).headers(headers);
        if let Some(ref token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref body) = body {
            builder = builder.json(body);
        }

        debug!(%method, url = %url, authenticated = token.is_some(), "Sending request");
        let response = builder.send().await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            if let Some(token) = token {
                warn!(url = %url, "Token rejected by server, ending session");
                if let Err(e) = self.context.invalidate(&token) {
                    warn!(error = %e, "Session cleared but durable copy remains");
                }
            }
            return Err(FetchError::AuthRejected);
        }

        Ok(response)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let response = self.request(path, RequestOptions::get()).await?;
        Self::parse(response).await
    }

    pub async fn post_json<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, FetchError> {
        let body = serde_json::to_value(body)
            .map_err(|e| FetchError::InvalidResponse(format!("Failed to encode request body: {}", e)))?;
        let response = self.request(path, RequestOptions::post(body)).await?;
        Self::parse(response).await
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, FetchError> {
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(FetchError::from_status(status, &text));
        }
        serde_json::from_str(&text)
            .map_err(|e| FetchError::InvalidResponse(format!("Failed to parse JSON response: {}", e)))
    }
}
