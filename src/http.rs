//! HTTP transport with rate limiting for the Thryve API.
//!
//! This module provides a wrapper around `reqwest::Client` that adds:
//! * Request rate limiting so that bursts of concurrent page loads do not
//!   overwhelm the backend
//! * Consistent timeouts and headers
//!
//! It knows nothing about authentication. Bearer tokens and refresh
//! handling live in [`crate::client`], which builds on this transport.
//!
//! # Example
//!
//! ```rust
//! use thryve::http::Client;
//!
//! let client = Client::new(&config)?;
//! let request = client.json(Method::POST, url, &body)?;
//! let response = client.execute(request).await?;
//! ```

use std::{future::Future, time::Duration};

use futures_util::{FutureExt, TryFutureExt};
use governor::{DefaultDirectRateLimiter, Quota};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE},
    Method, Url,
};
use serde::Serialize;

use crate::{
    config::Config,
    error::{Error, Result},
};

/// HTTP client with built-in rate limiting.
pub struct Client {
    /// Underlying client. Every request goes through the rate limiter
    /// first.
    http_client: reqwest::Client,

    rate_limiter: DefaultDirectRateLimiter,
}

impl Client {
    /// Duration to keep idle connections alive.
    const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Overall timeout for a single request, including the body.
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Timeout for establishing a connection.
    const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// * HTTP client creation fails
    /// * Header values are invalid
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .tcp_keepalive(Self::KEEPALIVE_TIMEOUT)
            .connect_timeout(Self::CONNECT_TIMEOUT)
            .timeout(Self::REQUEST_TIMEOUT)
            .default_headers(headers)
            .user_agent(&config.user_agent);

        let replenish_interval = config.rate_limit_interval / config.rate_limit_calls.get();
        let quota = Quota::with_period(replenish_interval)
            .ok_or_else(|| Error::invalid_argument("rate limit interval is zero"))?
            .allow_burst(config.rate_limit_calls);

        Ok(Self {
            http_client: http_client.build()?,
            rate_limiter: governor::RateLimiter::direct(quota),
        })
    }

    /// Builds a request without a body.
    #[must_use]
    pub fn request(&self, method: Method, url: Url) -> reqwest::Request {
        reqwest::Request::new(method, url)
    }

    /// Builds a request with a JSON body.
    ///
    /// The body is serialized eagerly, so the resulting request can be
    /// cloned with `reqwest::Request::try_clone` for a retry.
    ///
    /// # Errors
    ///
    /// Returns error if `body` cannot be serialized to JSON.
    pub fn json<T>(&self, method: Method, url: Url, body: &T) -> Result<reqwest::Request>
    where
        T: Serialize + ?Sized,
    {
        let mut request = self.request(method, url);
        let bytes = serde_json::to_vec(body)?;
        request
            .headers_mut()
            .try_insert(CONTENT_TYPE, HeaderValue::from_static("application/json"))?;
        *request.body_mut() = Some(bytes.into());

        Ok(request)
    }

    /// Executes a request with rate limiting.
    ///
    /// The response is returned whatever its status; mapping error statuses
    /// is up to the caller.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// * Request execution fails
    /// * Network error occurs
    pub fn execute(
        &self,
        request: reqwest::Request,
    ) -> impl Future<Output = Result<reqwest::Response>> + '_ {
        trace!("{} {}", request.method(), request.url().path());
        let throttle = self.rate_limiter.until_ready();
        throttle.then(|()| self.http_client.execute(request).map_err(Into::into))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use wiremock::{
        matchers::{body_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    #[tokio::test]
    async fn sends_json_and_returns_any_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .and(header("content-type", "application/json"))
            .and(header("accept", "application/json"))
            .and(body_json(serde_json::json!({ "email": "ana@thryve.local" })))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let config = Config::new(server.uri().parse().unwrap()).unwrap();
        let client = Client::new(&config).unwrap();
        let url = config.endpoint("/api/auth/login").unwrap();
        let request = client
            .json(Method::POST, url, &serde_json::json!({ "email": "ana@thryve.local" }))
            .unwrap();

        let response = client.execute(request).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn json_requests_can_be_cloned() {
        let config = Config::new("http://localhost:8080".parse().unwrap()).unwrap();
        let client = Client::new(&config).unwrap();
        let url = config.endpoint("/api/users").unwrap();

        let request = client.json(Method::POST, url, &[1, 2, 3]).unwrap();
        assert!(request.try_clone().is_some());
    }
}
