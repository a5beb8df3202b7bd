//! Request strategies for the two credential kinds.
//!
//! A plain token is sent as a bearer header to the public API origin. A
//! browser session is replayed against the workspace's own origin: the
//! session token travels as the `d` cookie and the web client token as a
//! `token` form field.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, COOKIE, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;

use crate::config::ApiConfig;
use crate::error::{CliError, Result};
use crate::types::{WorkspaceCredential, WorkspaceRecord};

/// A named remote operation and its parameters, in call order
#[derive(Debug, Clone)]
pub struct RemoteOperation {
    name: String,
    params: Vec<(String, Value)>,
}

impl RemoteOperation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.push((key.to_string(), value.into()));
        self
    }

    pub fn param_opt<V: Into<Value>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.param(key, v),
            None => self,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Form-encode parameters: scalars as text, primitive lists comma-joined,
    /// anything nested as JSON. Nulls are dropped.
    pub fn form_pairs(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .filter_map(|(key, value)| {
                let encoded = match value {
                    Value::Null => return None,
                    Value::String(s) => s.clone(),
                    Value::Bool(_) | Value::Number(_) => value.to_string(),
                    Value::Array(items) if items.iter().all(is_scalar) => items
                        .iter()
                        .map(|item| match item {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join(","),
                    other => other.to_string(),
                };
                Some((key.clone(), encoded))
            })
            .collect()
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

/// Unparsed reply of one remote call
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
    pub retry_after: Option<String>,
}

impl RawResponse {
    async fn read(res: Response) -> Result<Self> {
        let status = res.status().as_u16();
        let retry_after = res
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = res.text().await?;
        Ok(Self {
            status,
            body,
            retry_after,
        })
    }
}

/// How requests are authenticated against the remote
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name for logs
    fn strategy(&self) -> &'static str;

    async fn call(&self, operation: &RemoteOperation) -> Result<RawResponse>;

    /// Fetch a private file URL with the same credentials
    async fn download(&self, url: &str) -> Result<Vec<u8>>;
}

/// Pick the strategy matching a workspace's credential
pub fn for_workspace(record: &WorkspaceRecord, api: &ApiConfig) -> Result<Box<dyn Transport>> {
    let http = build_http(api)?;
    Ok(match &record.credential {
        WorkspaceCredential::Token { token, .. } => {
            Box::new(TokenTransport::new(http, &api.base_url, token))
        }
        WorkspaceCredential::Browser {
            session_token,
            api_token,
            origin_url,
        } => Box::new(BrowserTransport::new(
            http,
            origin_url,
            session_token,
            api_token,
            &api.user_agent,
        )),
    })
}

pub fn build_http(api: &ApiConfig) -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(api.timeout))
        .build()?)
}

fn endpoint(origin: &str, operation: &str) -> String {
    format!("{}/api/{}", origin.trim_end_matches('/'), operation)
}

async fn fetch_bytes(request: RequestBuilder, url: &str) -> Result<Vec<u8>> {
    let res = request.send().await?;
    if !res.status().is_success() {
        return Err(CliError::remote(
            format!("http_{}", res.status().as_u16()),
            format!("download of {} failed", url),
        ));
    }
    Ok(res.bytes().await?.to_vec())
}

/// Bearer-token strategy
pub struct TokenTransport {
    http: Client,
    base_url: String,
    token: String,
}

impl TokenTransport {
    pub fn new(http: Client, base_url: &str, token: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
            token: token.to_string(),
        }
    }

    fn bearer(&self) -> Result<HeaderValue> {
        HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|_| CliError::Auth("token contains invalid characters".to_string()))
    }
}

#[async_trait]
impl Transport for TokenTransport {
    fn strategy(&self) -> &'static str {
        "token"
    }

    async fn call(&self, operation: &RemoteOperation) -> Result<RawResponse> {
        let res = self
            .http
            .post(endpoint(&self.base_url, operation.name()))
            .header(AUTHORIZATION, self.bearer()?)
            .form(&operation.form_pairs())
            .send()
            .await?;
        RawResponse::read(res).await
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        fetch_bytes(self.http.get(url).header(AUTHORIZATION, self.bearer()?), url).await
    }
}

/// Browser-session strategy
pub struct BrowserTransport {
    http: Client,
    origin: String,
    session_token: String,
    api_token: String,
    user_agent: String,
}

impl BrowserTransport {
    pub fn new(
        http: Client,
        origin: &str,
        session_token: &str,
        api_token: &str,
        user_agent: &str,
    ) -> Self {
        Self {
            http,
            origin: origin.to_string(),
            session_token: session_token.to_string(),
            api_token: api_token.to_string(),
            user_agent: user_agent.to_string(),
        }
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let cookie = format!("d={}", urlencoding::encode(&self.session_token));
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&cookie)
                .map_err(|_| CliError::Auth("session token contains invalid characters".to_string()))?,
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.user_agent)
                .map_err(|_| CliError::Config("user_agent contains invalid characters".to_string()))?,
        );
        Ok(headers)
    }
}

#[async_trait]
impl Transport for BrowserTransport {
    fn strategy(&self) -> &'static str {
        "browser"
    }

    async fn call(&self, operation: &RemoteOperation) -> Result<RawResponse> {
        let mut form = vec![("token".to_string(), self.api_token.clone())];
        form.extend(operation.form_pairs());

        let res = self
            .http
            .post(endpoint(&self.origin, operation.name()))
            .headers(self.headers()?)
            .form(&form)
            .send()
            .await?;
        RawResponse::read(res).await
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        fetch_bytes(self.http.get(url).headers(self.headers()?), url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_form_pairs_encoding() {
        let op = RemoteOperation::new("conversations.list")
            .param("types", json!(["public_channel", "im"]))
            .param("limit", 200)
            .param("exclude_archived", true)
            .param("blocks", json!([{"type": "section"}]))
            .param("cursor", Value::Null)
            .param_opt::<String>("oldest", None);

        assert_eq!(
            op.form_pairs(),
            vec![
                ("types".to_string(), "public_channel,im".to_string()),
                ("limit".to_string(), "200".to_string()),
                ("exclude_archived".to_string(), "true".to_string()),
                ("blocks".to_string(), r#"[{"type":"section"}]"#.to_string()),
            ]
        );
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        assert_eq!(
            endpoint("https://acme.example.com/", "auth.test"),
            "https://acme.example.com/api/auth.test"
        );
    }
}
