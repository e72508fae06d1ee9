//! Authenticated requests against the Thryve API.
//!
//! [`ApiClient`] wraps the rate-limited transport with the session:
//!
//! * Before a request is sent, an expired access token is refreshed
//!   proactively, unless the request targets an authentication endpoint.
//! * The current access token, if any, is attached as a bearer token.
//! * A `401 Unauthorized` on a regular endpoint triggers one refresh and
//!   one resubmission of the request with the new token. A second 401 is
//!   returned as is.
//!
//! All refreshes go through the shared [`SessionManager`], so any number of
//! concurrent requests produce a single call to the refresh endpoint.

use std::{fmt, sync::Arc};

use reqwest::{
    header::{HeaderValue, AUTHORIZATION},
    Method, StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    error::Result,
    http::Client as HttpClient,
    navigator::Navigator,
    protocol::{self, auth, PageRequest},
    session::SessionManager,
    store::TokenStore,
};

/// Whether `path` is one of the authentication endpoints, which never
/// trigger a token refresh.
#[must_use]
pub fn is_auth_endpoint(method: &Method, path: &str) -> bool {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let path = format!("/{}", path.trim_start_matches('/'));

    path.starts_with(auth::AUTH_PREFIX)
        || (*method == Method::POST && path.trim_end_matches('/') == auth::REGISTER)
}

/// A request on its way through the pipeline.
pub struct Request {
    inner: reqwest::Request,
    auth_endpoint: bool,
    skip_auth_refresh: bool,
    retried: bool,
}

impl Request {
    fn new(inner: reqwest::Request, path: &str) -> Self {
        let auth_endpoint = is_auth_endpoint(inner.method(), path);
        Self {
            inner,
            auth_endpoint,
            skip_auth_refresh: false,
            retried: false,
        }
    }

    /// Opts out of the refresh and retry on `401 Unauthorized`.
    #[must_use]
    pub fn skip_auth_refresh(mut self) -> Self {
        self.skip_auth_refresh = true;
        self
    }

    /// Appends page selection to the query string.
    #[must_use]
    pub fn page(mut self, page: PageRequest) -> Self {
        page.apply(self.inner.url_mut());
        self
    }

    #[must_use]
    pub fn is_auth_endpoint(&self) -> bool {
        self.auth_endpoint
    }

    #[must_use]
    pub fn is_retried(&self) -> bool {
        self.retried
    }

    #[must_use]
    pub fn inner(&self) -> &reqwest::Request {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut reqwest::Request {
        &mut self.inner
    }

    fn may_retry(&self) -> bool {
        !(self.retried || self.auth_endpoint || self.skip_auth_refresh)
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", self.inner.method())
            .field("path", &self.inner.url().path())
            .field("auth_endpoint", &self.auth_endpoint)
            .field("skip_auth_refresh", &self.skip_auth_refresh)
            .field("retried", &self.retried)
            .finish()
    }
}

/// Client for the Thryve API with transparent token refresh.
///
/// Cloning is cheap; clones share the session and therefore its refresh.
#[derive(Clone)]
pub struct ApiClient {
    session: Arc<SessionManager>,
}

impl ApiClient {
    /// Creates a client with a new session on top of `store`.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the HTTP client cannot be created.
    pub fn new(
        config: Config,
        store: Arc<dyn TokenStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        let http_client = HttpClient::new(&config)?;
        let session = SessionManager::new(
            Arc::new(config),
            Arc::new(http_client),
            store,
            navigator,
        );

        Ok(Self::with_session(Arc::new(session)))
    }

    /// Creates a client sharing an existing session.
    #[must_use]
    pub fn with_session(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    #[must_use]
    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        self.session.config()
    }

    /// Builds a request to the API `path`, e.g. `/api/courses`.
    ///
    /// # Errors
    ///
    /// Will return `Err` if `path` does not make a valid URL.
    pub fn request(&self, method: Method, path: &str) -> Result<Request> {
        let url = self.config().endpoint(path)?;
        let inner = self.session.http_client().request(method, url);
        Ok(Request::new(inner, path))
    }

    /// Builds a request to the API `path` with a JSON body.
    ///
    /// # Errors
    ///
    /// Will return `Err` if `path` does not make a valid URL or `body`
    /// cannot be serialized.
    pub fn json_request<T>(&self, method: Method, path: &str, body: &T) -> Result<Request>
    where
        T: Serialize + ?Sized,
    {
        let url = self.config().endpoint(path)?;
        let inner = self.session.http_client().json(method, url, body)?;
        Ok(Request::new(inner, path))
    }

    /// Sends a request through the authenticated pipeline.
    ///
    /// Error statuses are returned as [`Error`](crate::error::Error)s
    /// carrying the status and body.
    ///
    /// # Errors
    ///
    /// Will return `Err` if:
    /// - the request fails on the network
    /// - the response has an error status, after at most one refresh and
    ///   resubmission on `401 Unauthorized`
    pub async fn execute(&self, mut request: Request) -> Result<reqwest::Response> {
        // Set once a refresh failed and tore the session down, so that a
        // 401 on the same request does not tear it down again.
        let mut session_lost = false;

        loop {
            if !request.auth_endpoint && !session_lost {
                if let Some(stale) = self.session.stale_token() {
                    debug!("access token expired, refreshing before request");
                    if let Err(e) = self.session.refresh_stale(Some(&stale)).await {
                        // Send the request without a token and let the
                        // backend answer.
                        debug!("continuing without refreshed token: {e}");
                        session_lost = true;
                    }
                }
            }

            let retry = if request.may_retry() {
                let retry = request.inner.try_clone();
                if retry.is_none() {
                    trace!("request body cannot be cloned, no retry possible");
                }
                retry
            } else {
                None
            };

            let sent_with = self.session.access_token();
            let response = self.send(request.inner, sent_with.as_deref()).await?;
            if response.status() != StatusCode::UNAUTHORIZED {
                return protocol::check(response).await;
            }

            let unauthorized = match protocol::check(response).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };
            let Some(retry) = retry else {
                return Err(unauthorized);
            };
            if session_lost {
                trace!("session already ended, not refreshing again");
                return Err(unauthorized);
            }

            // Another request may have replaced the token while this one was
            // in flight; the session hands that out instead of refreshing.
            debug!("unauthorized, refreshing access token");
            if let Err(e) = self.session.refresh_stale(sent_with.as_deref()).await {
                debug!("refresh failed: {e}");
                return Err(unauthorized);
            }

            request = Request {
                inner: retry,
                auth_endpoint: request.auth_endpoint,
                skip_auth_refresh: request.skip_auth_refresh,
                retried: true,
            };
        }
    }

    async fn send(&self, mut request: reqwest::Request, token: Option<&str>) -> Result<reqwest::Response> {
        if let Some(token) = token {
            let mut bearer = HeaderValue::from_str(&format!("Bearer {token}"))?;
            bearer.set_sensitive(true);
            request.headers_mut().insert(AUTHORIZATION, bearer);
        }

        self.session.http_client().execute(request).await
    }

    /// Sends `request` and parses the response as `T`.
    ///
    /// # Errors
    ///
    /// Will return `Err` if sending fails (see [`ApiClient::execute`]) or the
    /// body does not parse as `T`.
    pub async fn fetch<T>(&self, request: Request) -> Result<T>
    where
        T: for<'de> Deserialize<'de> + fmt::Debug,
    {
        let origin = request.inner.url().path().to_owned();
        let response = self.execute(request).await?;
        protocol::parse(response, &origin).await
    }

    /// `GET` of `path`, parsed as `T`.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::fetch`].
    pub async fn get<T>(&self, path: &str) -> Result<T>
    where
        T: for<'de> Deserialize<'de> + fmt::Debug,
    {
        self.fetch(self.request(Method::GET, path)?).await
    }

    /// `GET` of one page of `path`.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::fetch`].
    pub async fn get_page<T>(&self, path: &str, page: PageRequest) -> Result<protocol::Page<T>>
    where
        T: for<'de> Deserialize<'de> + fmt::Debug,
    {
        self.fetch(self.request(Method::GET, path)?.page(page)).await
    }

    /// `POST` of `body` to `path`, parsed as `T`.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::fetch`].
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: for<'de> Deserialize<'de> + fmt::Debug,
    {
        self.fetch(self.json_request(Method::POST, path, body)?)
            .await
    }

    /// `PATCH` of `body` to `path`, parsed as `T`.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::fetch`].
    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: for<'de> Deserialize<'de> + fmt::Debug,
    {
        self.fetch(self.json_request(Method::PATCH, path, body)?)
            .await
    }

    /// Sends a bodiless request whose response body is of no interest.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::execute`].
    pub async fn send_empty(&self, method: Method, path: &str) -> Result<()> {
        self.execute(self.request(method, path)?).await.map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ErrorKind, events::Event, navigator::ChannelNavigator, store::MemoryStore,
        token::tests::token, util,
    };

    use std::time::Duration;

    use wiremock::{
        matchers::{header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn access_token(name: &str, lifetime: i64) -> String {
        #[allow(clippy::cast_possible_wrap)]
        let now = util::now_from_epoch() as i64;
        token(&serde_json::json!({ "sub": name, "exp": now + lifetime, "roles": ["ROLE_STUDENT"] }))
    }

    fn client(server: &MockServer, location: &str) -> (ApiClient, Arc<MemoryStore>, Arc<ChannelNavigator>) {
        let config = Config::new(server.uri().parse().unwrap()).unwrap();
        let store = Arc::new(MemoryStore::new());
        let navigator = Arc::new(ChannelNavigator::detached(location));
        let client = ApiClient::new(
            config,
            Arc::clone(&store) as Arc<dyn TokenStore>,
            Arc::clone(&navigator) as Arc<dyn Navigator>,
        )
        .unwrap();

        (client, store, navigator)
    }

    async fn mount_refresh(server: &MockServer, access: &str, expect: u64) {
        Mock::given(method("POST"))
            .and(path(auth::REFRESH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(100))
                    .set_body_json(serde_json::json!({ "accessToken": access })),
            )
            .expect(expect)
            .mount(server)
            .await;
    }

    #[test]
    fn auth_endpoints() {
        assert!(is_auth_endpoint(&Method::POST, "/api/auth/login"));
        assert!(is_auth_endpoint(&Method::POST, "api/auth/refresh-token"));
        assert!(is_auth_endpoint(&Method::GET, "/api/auth/anything?x=1"));
        assert!(is_auth_endpoint(&Method::POST, "/api/users"));
        assert!(!is_auth_endpoint(&Method::GET, "/api/users"));
        assert!(!is_auth_endpoint(&Method::GET, "/api/users/me"));
        assert!(!is_auth_endpoint(&Method::GET, "/api/courses"));
    }

    #[tokio::test]
    async fn attaches_bearer_token() {
        let server = MockServer::start().await;
        let access = access_token("ana@thryve.local", 3600);
        Mock::given(method("GET"))
            .and(path("/api/courses/1"))
            .and(header("authorization", format!("Bearer {access}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": 1 })))
            .expect(1)
            .mount(&server)
            .await;

        let (client, store, _) = client(&server, "/courses");
        store.set_tokens(&access, Some("refresh")).unwrap();

        let body: serde_json::Value = client.get("/api/courses/1").await.unwrap();
        assert_eq!(body["id"], 1);
    }

    #[tokio::test]
    async fn concurrent_expired_requests_refresh_once() {
        let server = MockServer::start().await;
        let fresh = access_token("ana@thryve.local", 3600);
        mount_refresh(&server, &fresh, 1).await;
        Mock::given(method("GET"))
            .and(path("/api/notifications/me/unread-count"))
            .and(header("authorization", format!("Bearer {fresh}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_string("3"))
            .expect(5)
            .mount(&server)
            .await;

        let (client, store, _) = client(&server, "/courses");
        store
            .set_tokens(&access_token("ana@thryve.local", -60), Some("refresh"))
            .unwrap();

        let calls = (0..5).map(|_| {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .get::<u64>("/api/notifications/me/unread-count")
                    .await
            })
        });
        for result in futures_util::future::join_all(calls).await {
            assert_eq!(result.unwrap().unwrap(), 3);
        }
        assert_eq!(store.access_token(), Some(fresh));
    }

    #[tokio::test]
    async fn auth_endpoints_never_refresh_proactively() {
        let server = MockServer::start().await;
        mount_refresh(&server, "unused", 0).await;
        Mock::given(method("POST"))
            .and(path(auth::LOGIN))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let (client, store, _) = client(&server, "/login");
        store
            .set_tokens(&access_token("ana@thryve.local", -60), Some("refresh"))
            .unwrap();

        let request = client
            .json_request(
                Method::POST,
                auth::LOGIN,
                &serde_json::json!({ "email": "ana@thryve.local", "password": "wrong" }),
            )
            .unwrap();
        let err = client.execute(request).await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert!(store.refresh_token().is_some());
    }

    #[tokio::test]
    async fn unauthorized_is_retried_once_with_new_token() {
        let server = MockServer::start().await;
        let revoked = access_token("ana@thryve.local", 3600);
        let fresh = access_token("ana@thryve.local", 7200);
        mount_refresh(&server, &fresh, 1).await;
        Mock::given(method("GET"))
            .and(path("/api/users/me"))
            .and(header("authorization", format!("Bearer {revoked}").as_str()))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/users/me"))
            .and(header("authorization", format!("Bearer {fresh}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        let (client, store, _) = client(&server, "/profile");
        store.set_tokens(&revoked, Some("refresh")).unwrap();

        let body: serde_json::Value = client.get("/api/users/me").await.unwrap();
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn second_unauthorized_propagates() {
        let server = MockServer::start().await;
        let fresh = access_token("ana@thryve.local", 3600);
        mount_refresh(&server, &fresh, 1).await;
        Mock::given(method("GET"))
            .and(path("/api/courses/7"))
            .respond_with(ResponseTemplate::new(401).set_body_string("nope"))
            .expect(2)
            .mount(&server)
            .await;

        let (client, store, navigator) = client(&server, "/courses/7");
        store
            .set_tokens(&access_token("ana@thryve.local", 3600), Some("refresh"))
            .unwrap();

        let err = client
            .get::<serde_json::Value>("/api/courses/7")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthenticated);
        assert_eq!(
            err.downcast::<crate::error::HttpStatusError>()
                .map(|e| e.body.as_str()),
            Some("nope")
        );
        // The refresh itself succeeded, so the session survives.
        assert_eq!(store.access_token(), Some(fresh));
        assert_eq!(navigator.location(), "/courses/7");
    }

    #[tokio::test]
    async fn failed_refresh_rejects_with_original_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(auth::REFRESH))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/courses/7"))
            .respond_with(ResponseTemplate::new(401).set_body_string("revoked"))
            .expect(1)
            .mount(&server)
            .await;

        let (client, store, navigator) = client(&server, "/courses/7");
        store
            .set_tokens(&access_token("ana@thryve.local", 3600), Some("refresh"))
            .unwrap();

        let err = client
            .get::<serde_json::Value>("/api/courses/7")
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(store.access_token(), None);
        assert_eq!(navigator.location(), "/login");
    }

    #[tokio::test]
    async fn opted_out_requests_are_not_retried() {
        let server = MockServer::start().await;
        mount_refresh(&server, "unused", 0).await;
        Mock::given(method("GET"))
            .and(path("/api/users/me"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let (client, store, _) = client(&server, "/profile");
        store
            .set_tokens(&access_token("ana@thryve.local", 3600), Some("refresh"))
            .unwrap();

        let request = client
            .request(Method::GET, "/api/users/me")
            .unwrap()
            .skip_auth_refresh();
        let err = client.execute(request).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthenticated);
    }

    #[tokio::test]
    async fn missing_refresh_token_tears_down_and_fails() {
        let server = MockServer::start().await;
        mount_refresh(&server, "unused", 0).await;
        Mock::given(method("GET"))
            .and(path("/api/courses"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let (client, store, navigator) = client(&server, "/courses");
        store
            .set_tokens(&access_token("ana@thryve.local", -60), None)
            .unwrap();

        let err = client
            .get_page::<serde_json::Value>("/api/courses", PageRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(store.access_token(), None);
        assert_eq!(navigator.location(), "/login");
    }

    #[tokio::test]
    async fn lost_session_is_torn_down_once() {
        let server = MockServer::start().await;
        mount_refresh(&server, "unused", 0).await;
        Mock::given(method("GET"))
            .and(path("/api/courses/7"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let config = Config::new(server.uri().parse().unwrap()).unwrap();
        let store = Arc::new(MemoryStore::new());
        let (navigator, mut events) = ChannelNavigator::new("/courses/7");
        let client = ApiClient::new(
            config,
            Arc::clone(&store) as Arc<dyn TokenStore>,
            Arc::new(navigator),
        )
        .unwrap();
        store
            .set_tokens(&access_token("ana@thryve.local", -60), None)
            .unwrap();

        let err = client
            .get::<serde_json::Value>("/api/courses/7")
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(events.try_recv().unwrap(), Event::SessionExpired);
        assert_eq!(events.try_recv().unwrap(), Event::Navigate("/login".to_owned()));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn token_replaced_in_flight_is_reused() {
        let server = MockServer::start().await;
        let fresh = access_token("ana@thryve.local", 3600);
        mount_refresh(&server, "unused", 0).await;
        Mock::given(method("GET"))
            .and(path("/api/courses/7"))
            .and(header("authorization", format!("Bearer {fresh}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": 7 })))
            .expect(1)
            .mount(&server)
            .await;

        let (client, store, _) = client(&server, "/courses/7");
        let revoked = access_token("ana@thryve.local", 3600);
        store.set_tokens(&revoked, Some("refresh")).unwrap();

        // Another task replaces the token while the first attempt is on the
        // wire; the rejection then picks up the replacement.
        let replacing = {
            let store = Arc::clone(&store);
            let fresh = fresh.clone();
            move |_: &wiremock::Request| {
                store.set_tokens(&fresh, Some("refresh")).unwrap();
                ResponseTemplate::new(401)
            }
        };
        Mock::given(method("GET"))
            .and(path("/api/courses/7"))
            .and(header("authorization", format!("Bearer {revoked}").as_str()))
            .respond_with(replacing)
            .expect(1)
            .mount(&server)
            .await;

        let body: serde_json::Value = client.get("/api/courses/7").await.unwrap();
        assert_eq!(body["id"], 7);
    }

    #[tokio::test]
    async fn anonymous_requests_pass_through() {
        let server = MockServer::start().await;
        mount_refresh(&server, "unused", 0).await;
        Mock::given(method("GET"))
            .and(path("/api/courses"))
            .and(|request: &wiremock::Request| !request.headers.contains_key("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "content": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _, _) = client(&server, "/");
        let page = client
            .get_page::<serde_json::Value>("/api/courses", PageRequest::default())
            .await
            .unwrap();
        assert!(page.content.is_empty());
    }
}
