//! Minimal Graph API client shared by the Facebook and Instagram targets
//!
//! Every call sends the access token as a form/query parameter and returns the
//! decoded JSON body. Non-2xx responses are mapped onto [`PlatformError`]
//! using the Graph error envelope when one is present.

use std::time::Duration;

use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::config::Config;
use crate::error::{PlatformError, Result};

/// Graph error codes that mean the token is invalid or lacks a grant
const AUTH_ERROR_CODES: &[i64] = &[10, 102, 190, 200];

/// Graph error codes for application/user/page throttling
const RATE_LIMIT_ERROR_CODES: &[i64] = &[4, 17, 32, 613];

pub struct GraphClient {
    http: Client,
    base_url: String,
    access_token: SecretString,
}

impl GraphClient {
    pub fn new(base_url: &str, access_token: SecretString, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("reposter/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PlatformError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
        })
    }

    /// Client for the configured Graph base URL and Page access token
    pub fn from_config(config: &Config) -> Result<Self> {
        let token = config.credentials.fb_access_token.expose_secret().to_string();
        Self::new(
            &config.settings.publish.graph_base,
            SecretString::from(token),
            config.settings.publish.request_timeout()?,
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// POST form fields to `path`; the access token is appended
    pub async fn post_form(&self, path: &str, fields: &[(&str, &str)], context: &str) -> Result<Value> {
        let mut form: Vec<(&str, &str)> = fields.to_vec();
        form.push(("access_token", self.access_token.expose_secret()));

        tracing::debug!("Graph POST {} ({})", path, context);
        let response = self
            .http
            .post(self.url(path))
            .form(&form)
            .send()
            .await
            .map_err(|e| map_transport_error(e, context))?;

        decode(response, context).await
    }

    /// GET `path` with query parameters; the access token is appended
    pub async fn get(&self, path: &str, query: &[(&str, &str)], context: &str) -> Result<Value> {
        let mut params: Vec<(&str, &str)> = query.to_vec();
        params.push(("access_token", self.access_token.expose_secret()));

        tracing::debug!("Graph GET {} ({})", path, context);
        let response = self
            .http
            .get(self.url(path))
            .query(&params)
            .send()
            .await
            .map_err(|e| map_transport_error(e, context))?;

        decode(response, context).await
    }
}

/// Pull a string `id`-like field out of a response body
///
/// Graph returns ids as strings, but numeric ids are accepted too.
pub fn require_str(body: &Value, field: &str, context: &str) -> Result<String> {
    match body.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(PlatformError::Protocol(format!(
            "{} response has no '{}' field: {}",
            context, field, body
        ))
        .into()),
    }
}

async fn decode(response: Response, context: &str) -> Result<Value> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| map_transport_error(e, context))?;

    if !status.is_success() {
        return Err(map_graph_error(status.as_u16(), &text, context).into());
    }

    serde_json::from_str(&text).map_err(|e| {
        PlatformError::Protocol(format!("{} returned invalid JSON: {}", context, e)).into()
    })
}

fn map_transport_error(error: reqwest::Error, context: &str) -> PlatformError {
    if error.is_timeout() {
        PlatformError::Network(format!("{} timed out: {}", context, error))
    } else {
        PlatformError::Network(format!("{} failed: {}", context, error))
    }
}

/// Map a non-2xx Graph response onto a [`PlatformError`]
///
/// The Graph error envelope is `{"error": {"message", "type", "code"}}`; the
/// numeric code takes precedence over the HTTP status when both are known.
pub fn map_graph_error(status: u16, body: &str, context: &str) -> PlatformError {
    let envelope: Option<Value> = serde_json::from_str(body).ok();
    let error = envelope.as_ref().and_then(|v| v.get("error"));
    let code = error.and_then(|e| e.get("code")).and_then(Value::as_i64);
    let message = error
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.chars().take(200).collect());

    let detail = match code {
        Some(code) => format!("{} (HTTP {}, code {}): {}", context, status, code, message),
        None => format!("{} (HTTP {}): {}", context, status, message),
    };

    if let Some(code) = code {
        if AUTH_ERROR_CODES.contains(&code) {
            return PlatformError::Authentication(detail);
        }
        if RATE_LIMIT_ERROR_CODES.contains(&code) {
            return PlatformError::RateLimit(detail);
        }
    }

    match status {
        401 | 403 => PlatformError::Authentication(detail),
        429 => PlatformError::RateLimit(detail),
        400 => PlatformError::Validation(detail),
        _ => PlatformError::Posting(detail),
    }
}
