use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, Method, Request, RequestBuilder, Response};
use tracing::debug;

use crate::api::errors::ApiError;

/// The single seam through which the client talks to the network.
///
/// Implementations send exactly one request; retries and re-authentication
/// are decided by the caller.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: Request) -> Result<Response, reqwest::Error>;

    /// Create a request builder bound to this transport's client.
    fn request(&self, method: Method, url: url::Url) -> RequestBuilder;
}

/// reqwest-backed transport.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, ApiError> {
        Self::builder().build()
    }
}

#[async_trait]
impl HttpTransport for HttpClient {
    async fn execute(&self, request: Request) -> Result<Response, reqwest::Error> {
        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, %url, "sending HTTP request");

        let result = self.client.execute(request).await;
        match &result {
            Ok(response) => debug!(%method, %url, status = %response.status(), "received HTTP response"),
            Err(err) => debug!(%method, %url, error = %err, "HTTP request failed"),
        }
        result
    }

    fn request(&self, method: Method, url: url::Url) -> RequestBuilder {
        self.client.request(method, url)
    }
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Builder for [`HttpClient`].
///
/// Timeouts are applied per request by the dispatcher; the builder only fixes
/// the connect timeout.
#[derive(Debug, Default)]
pub struct HttpClientBuilder {
    user_agent: Option<String>,
    accept_invalid_certs: bool,
}

impl HttpClientBuilder {
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Skip TLS certificate validation (controllers commonly ship
    /// self-signed certificates).
    pub fn accept_invalid_certs(mut self, enabled: bool) -> Self {
        self.accept_invalid_certs = enabled;
        self
    }

    pub fn build(self) -> Result<HttpClient, ApiError> {
        let mut builder =
            ReqwestClient::builder().connect_timeout(CONNECT_TIMEOUT).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if self.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|err| ApiError::Config(format!("Failed to build HTTP client: {err}")))?;

        Ok(HttpClient { client })
    }
}
