//! HTTP client for the remote API
//!
//! This module handles every outbound request of the crawler, including:
//! - Building the HTTP client with a fixed timeout and user agent
//! - Calling API methods with the access token and version attached
//! - Classifying transport, HTTP and API-level failures

use crate::api::wire::{match_groups, CommentsResponse, Envelope, GroupInfo};
use crate::api::{BatchSource, SourceResolver};
use crate::config::ApiConfig;
use crate::model::{Page, Source};
use crate::FetchError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `timeout` - Upper bound for a whole request, connect included
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    let user_agent = format!(
        "{}/{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Client for the VK-style method API
#[derive(Clone)]
pub struct VkClient {
    client: Client,
    base_url: String,
    version: String,
    access_token: String,
    comments_method: String,
    resolve_method: String,
    web_base_url: String,
}

impl VkClient {
    /// Creates a client from the API configuration and a loaded token
    pub fn new(
        api: &ApiConfig,
        access_token: String,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(timeout)?,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            version: api.version.clone(),
            access_token,
            comments_method: api.comments_method.clone(),
            resolve_method: api.resolve_method.clone(),
            web_base_url: api.web_base_url.clone(),
        })
    }

    /// Calls `method` and unwraps the response envelope
    ///
    /// # Error Classification
    ///
    /// | Condition | Result |
    /// |-----------|--------|
    /// | Timeout, connection failure | Transient |
    /// | HTTP 408, 429, 5xx | Transient |
    /// | Other HTTP 4xx | Fatal (code = status) |
    /// | Undecodable body | Transient |
    /// | API error 29 | RateLimited |
    /// | API error 6, 10 | Transient |
    /// | Any other API error | Fatal |
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let url = format!("{}/{}", self.base_url, method);

        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[
                ("access_token", self.access_token.as_str()),
                ("v", self.version.as_str()),
            ])
            .send()
            .await
            .map_err(|e| classify_transport_error(method, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(method, status));
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_transport_error(method, e))?;

        let envelope: Envelope<T> = serde_json::from_str(&body).map_err(|e| {
            FetchError::Transient(format!("{}: undecodable response: {}", method, e))
        })?;

        envelope.into_result()
    }
}

#[async_trait]
impl BatchSource for VkClient {
    async fn fetch(&self, source: &Source, offset: u64, page_size: u32) -> Result<Page, FetchError> {
        let params = [
            ("group", source.id.clone()),
            ("offset", offset.to_string()),
            ("req", page_size.to_string()),
        ];
        let response: CommentsResponse = self.call(&self.comments_method, &params).await?;
        Ok(response.into_page(source, &self.web_base_url))
    }
}

#[async_trait]
impl SourceResolver for VkClient {
    async fn resolve(&self, names: &[String]) -> Result<Vec<Source>, FetchError> {
        let params = [("group_ids", names.join(","))];
        let groups: Vec<GroupInfo> = self.call(&self.resolve_method, &params).await?;
        Ok(match_groups(names, groups))
    }
}

fn classify_transport_error(method: &str, error: reqwest::Error) -> FetchError {
    // The URL carries the access token; keep it out of logs
    let error = error.without_url();
    if error.is_timeout() {
        FetchError::Transient(format!("{}: request timeout", method))
    } else if error.is_connect() {
        FetchError::Transient(format!("{}: connection failed: {}", method, error))
    } else {
        FetchError::Transient(format!("{}: {}", method, error))
    }
}

fn classify_status(method: &str, status: StatusCode) -> FetchError {
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        FetchError::Transient(format!("{}: HTTP {}", method, status))
    } else {
        FetchError::Fatal {
            code: i64::from(status.as_u16()),
            message: format!("{}: HTTP {}", method, status),
        }
    }
}
