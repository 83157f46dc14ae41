// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use reqwest::cookie::Jar;
use reqwest::header::{CONTENT_TYPE, REFERER, USER_AGENT};

/// A streaming response body
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// HTTP response with status, content length, and body stream
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Content-Length header value, if present
    pub content_length: Option<u64>,
    /// Response body as a stream of bytes
    pub body: ByteStream,
}

/// Per-request headers sent alongside the session cookies
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    /// Declare `Content-Type: application/json` on the request
    pub json: bool,
}

/// HTTP client abstraction for testability
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Fetch the entire response body as text, failing on error statuses
    async fn get_text(&self, url: &str, options: &RequestOptions) -> Result<String, reqwest::Error>;

    /// Get a streaming response for large downloads
    async fn get_stream(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> Result<HttpResponse, reqwest::Error>;
}

/// Transport settings applied once when the client is built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Skip TLS certificate validation (the target serves an untrusted chain)
    pub accept_invalid_certs: bool,
    /// Upper bound on pooled connections per host
    pub max_connections: usize,
    /// TCP keep-alive interval, `None` disables keep-alive probes
    pub keep_alive: Option<Duration>,
    /// Whole-request timeout, `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            accept_invalid_certs: true,
            max_connections: 64,
            keep_alive: Some(Duration::from_secs(60)),
            timeout: None,
        }
    }
}

/// Default HTTP client implementation using reqwest with a shared cookie jar
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
    cookies: Arc<Jar>,
}

impl ReqwestClient {
    /// Build a client from the transport settings with an empty cookie jar
    pub fn new(transport: &TransportConfig) -> Result<Self, reqwest::Error> {
        let cookies = Arc::new(Jar::default());

        let mut builder = reqwest::Client::builder()
            .cookie_provider(cookies.clone())
            .danger_accept_invalid_certs(transport.accept_invalid_certs)
            .pool_max_idle_per_host(transport.max_connections)
            .tcp_keepalive(transport.keep_alive);

        if let Some(timeout) = transport.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            cookies,
        })
    }

    /// The cookie jar attached to every request made by this client
    pub fn cookies(&self) -> &Arc<Jar> {
        &self.cookies
    }

    fn request(&self, url: &str, options: &RequestOptions) -> reqwest::RequestBuilder {
        let mut request = self.client.get(url);
        if let Some(user_agent) = &options.user_agent {
            request = request.header(USER_AGENT, user_agent);
        }
        if let Some(referer) = &options.referer {
            request = request.header(REFERER, referer);
        }
        if options.json {
            request = request.header(CONTENT_TYPE, "application/json");
        }
        request
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get_text(&self, url: &str, options: &RequestOptions) -> Result<String, reqwest::Error> {
        self.request(url, options)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }

    async fn get_stream(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> Result<HttpResponse, reqwest::Error> {
        let response = self.request(url, options).send().await?;
        let status = response.status().as_u16();
        let content_length = response.content_length();

        let body: ByteStream = Box::pin(response.bytes_stream());

        Ok(HttpResponse {
            status,
            content_length,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reqwest_client_can_be_built_from_defaults() {
        let client = ReqwestClient::new(&TransportConfig::default()).unwrap();
        let _cloned = client.clone();
    }

    #[test]
    fn reqwest_client_accepts_a_timeout() {
        let transport = TransportConfig {
            timeout: Some(Duration::from_secs(5)),
            keep_alive: None,
            ..Default::default()
        };
        assert!(ReqwestClient::new(&transport).is_ok());
    }

    #[test]
    fn default_transport_trusts_any_certificate() {
        let transport = TransportConfig::default();
        assert!(transport.accept_invalid_certs);
        assert_eq!(transport.max_connections, 64);
        assert!(transport.keep_alive.is_some());
        assert!(transport.timeout.is_none());
    }

    #[test]
    fn clones_share_the_cookie_jar() {
        let client = ReqwestClient::new(&TransportConfig::default()).unwrap();
        let cloned = client.clone();
        assert!(Arc::ptr_eq(client.cookies(), cloned.cookies()));
    }
}
