//! Shared HTTP plumbing for OpenAI-compatible providers.

use crate::error::ProviderError;
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;
use url::Url;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            api_key: None,
            model: model.into(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Connection to one OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub(crate) struct OpenAiTransport {
    client: Client,
    url: Url,
    api_key: Option<String>,
}

impl OpenAiTransport {
    pub(crate) fn new(config: &OpenAiConfig, path: &str) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            url: endpoint_url(&config.base_url, path)?,
            api_key: config.api_key.clone(),
        })
    }

    pub(crate) fn url(&self) -> &Url {
        &self.url
    }

    pub(crate) fn post(&self) -> RequestBuilder {
        let request = self
            .client
            .post(self.url.clone())
            .header("content-type", "application/json");

        match &self.api_key {
            Some(api_key) => request.bearer_auth(api_key),
            None => request,
        }
    }
}

pub(crate) fn endpoint_url(base_url: &str, path: &str) -> Result<Url, ProviderError> {
    let base = format!("{}/", base_url.trim_end_matches('/'));
    Ok(Url::parse(&base)?.join(path.trim_start_matches('/'))?)
}

pub(crate) async fn ensure_success(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let details = response.text().await.unwrap_or_default();
    Err(ProviderError::BackendResponse {
        backend: "openai".to_string(),
        status: status.as_u16(),
        details: if details.is_empty() {
            status.to_string()
        } else {
            details
        },
    })
}
