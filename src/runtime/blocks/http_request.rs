//! HttpRequest block: outbound HTTP call with optional authentication
//!
//! The response lands in fixed variables (`httpStatusCode`, `httpResponseBody`,
//! `httpSuccess`) and, when configured, the body is also copied into a named
//! variable. Transport failures and non-2xx statuses take the Error edge.

use crate::runtime::executor::{BlockContext, BlockExecutor, BlockOutcome};
use crate::runtime::variables::VariableStore;
use crate::workflow::types::{block_types, Block};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::Deserialize;
use std::time::Duration;

use super::{invalid_config, truncate};

pub const STATUS_CODE_VARIABLE: &str = "httpStatusCode";
pub const RESPONSE_BODY_VARIABLE: &str = "httpResponseBody";
pub const SUCCESS_VARIABLE: &str = "httpSuccess";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HttpRequestConfig {
    #[serde(default = "default_method")]
    method: String,
    url: String,
    #[serde(default)]
    headers: Vec<HeaderEntry>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    auth: Option<AuthConfig>,
    #[serde(default)]
    result_variable: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Deserialize)]
struct HeaderEntry {
    key: String,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
enum AuthKind {
    #[default]
    None,
    Bearer,
    BasicAuth,
    ApiKeyHeader,
    ApiKeyQuery,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthConfig {
    #[serde(rename = "type", default)]
    kind: AuthKind,
    token: Option<String>,
    username: Option<String>,
    password: Option<String>,
    key_name: Option<String>,
    key_value: Option<String>,
}

/// Expected config:
/// { "method": "POST", "url": "https://api.example.com/orders",
///   "headers": [{"key": "Accept", "value": "application/json"}],
///   "body": "$payload", "auth": {"type": "bearer", "token": "$apiToken"},
///   "resultVariable": "response" }
#[derive(Debug, Clone)]
pub struct HttpRequestExecutor {
    client: reqwest::Client,
}

impl HttpRequestExecutor {
    /// Build the executor with a shared client bounded by `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Validate config and assemble the request; errors here are config errors
    fn build_request(
        &self,
        config: &HttpRequestConfig,
        variables: &VariableStore,
    ) -> Result<reqwest::RequestBuilder> {
        let method = match config.method.trim().to_uppercase().as_str() {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "PATCH" => Method::PATCH,
            "DELETE" => Method::DELETE,
            "HEAD" => Method::HEAD,
            other => return Err(anyhow::anyhow!("unsupported HTTP method: {}", other)),
        };

        let raw_url = variables.resolve(config.url.trim());
        if raw_url.is_empty() {
            return Err(anyhow::anyhow!("request URL is empty"));
        }
        let mut url = Url::parse(&raw_url)
            .map_err(|e| anyhow::anyhow!("invalid URL '{}': {}", raw_url, e))?;

        let auth = config.auth.as_ref();
        if let Some(auth) = auth.filter(|a| a.kind == AuthKind::ApiKeyQuery) {
            let (name, value) = api_key(auth, variables)?;
            url.query_pairs_mut().append_pair(&name, &value);
        }

        let mut request = self.client.request(method, url);

        for header in &config.headers {
            if header.key.trim().is_empty() {
                continue;
            }
            request = request.header(header.key.trim(), variables.resolve(&header.value));
        }

        if let Some(auth) = auth {
            request = match auth.kind {
                AuthKind::None | AuthKind::ApiKeyQuery => request,
                AuthKind::Bearer => {
                    let token = required(&auth.token, "token", variables)?;
                    request.bearer_auth(token)
                }
                AuthKind::BasicAuth => {
                    let username = required(&auth.username, "username", variables)?;
                    let password = auth.password.as_deref().map(|p| variables.resolve(p));
                    request.basic_auth(username, password)
                }
                AuthKind::ApiKeyHeader => {
                    let (name, value) = api_key(auth, variables)?;
                    request.header(name, value)
                }
            };
        }

        if let Some(body) = config.body.as_deref().filter(|b| !b.is_empty()) {
            request = request.body(variables.resolve(body));
        }

        Ok(request)
    }
}

fn required(field: &Option<String>, name: &str, variables: &VariableStore) -> Result<String> {
    field
        .as_deref()
        .map(|v| variables.resolve(v))
        .filter(|v| !v.is_empty())
        .ok_or_else(|| anyhow::anyhow!("auth configuration is missing '{}'", name))
}

fn api_key(auth: &AuthConfig, variables: &VariableStore) -> Result<(String, String)> {
    Ok((
        required(&auth.key_name, "keyName", variables)?,
        required(&auth.key_value, "keyValue", variables)?,
    ))
}

fn record_response(
    variables: &mut VariableStore,
    result_variable: Option<&str>,
    status: u16,
    body: &str,
    success: bool,
) {
    variables.set(STATUS_CODE_VARIABLE, status.to_string());
    variables.set(RESPONSE_BODY_VARIABLE, body);
    variables.set(SUCCESS_VARIABLE, success.to_string());
    if let Some(name) = result_variable.filter(|n| !n.trim().is_empty()) {
        variables.set(name, body);
    }
}

#[async_trait]
impl BlockExecutor for HttpRequestExecutor {
    fn name(&self) -> &'static str {
        "HttpRequest"
    }

    fn can_execute(&self, block: &Block) -> bool {
        block.is_type(block_types::HTTP_REQUEST)
    }

    async fn execute(&self, block: &Block, ctx: &mut BlockContext<'_>) -> BlockOutcome {
        let config: HttpRequestConfig = match block.parse_config() {
            Ok(config) => config,
            Err(e) => return invalid_config(block, e),
        };

        let request = match self.build_request(&config, ctx.variables) {
            Ok(request) => request,
            Err(e) => {
                record_response(ctx.variables, config.result_variable.as_deref(), 0, "", false);
                return invalid_config(block, e);
            }
        };

        tracing::debug!("🌍 HTTP Request: {} {}", config.method, config.url);

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("⚠️ HTTP request failed for block '{}': {}", block.name, e);
                record_response(ctx.variables, config.result_variable.as_deref(), 0, "", false);
                return BlockOutcome::error(format!("HttpRequest {}: request failed: {}", block.name, e));
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                record_response(ctx.variables, config.result_variable.as_deref(), status.as_u16(), "", false);
                return BlockOutcome::error(format!(
                    "HttpRequest {}: failed to read response body: {}",
                    block.name, e
                ));
            }
        };

        let success = status.is_success();
        record_response(ctx.variables, config.result_variable.as_deref(), status.as_u16(), &body, success);

        tracing::debug!("📡 Response status: {}", status);

        let description = format!(
            "HttpRequest {}: {} {} -> {} {}",
            block.name,
            config.method.to_uppercase(),
            config.url,
            status.as_u16(),
            truncate(&body, 200)
        );
        if success {
            BlockOutcome::success(description)
        } else {
            BlockOutcome::error(description)
        }
    }
}
