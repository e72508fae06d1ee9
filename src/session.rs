//! Session management and single-flight token refresh.
//!
//! A [`SessionManager`] owns everything that makes up one signed-in
//! session: the token store, the navigator to escalate to, and the state
//! that coordinates refreshes. Create one per session and share it through
//! an `Arc`; nothing is kept in globals.
//!
//! # Single flight
//!
//! Many requests can find the access token expired at the same time. Only
//! the first one to call [`SessionManager::refresh`] reaches the network.
//! Every caller arriving while that refresh is in flight is queued and
//! receives the same outcome: the new access token, or a failure.
//!
//! A caller that saw a token which has since been replaced uses
//! [`SessionManager::refresh_stale`] and gets the replacement without a
//! second refresh.
//!
//! ```rust
//! let session = Arc::new(SessionManager::new(config, http, store, navigator));
//!
//! // Any number of tasks may do this concurrently; one refresh is sent.
//! let token = session.refresh().await?;
//! ```
//!
//! # Failure
//!
//! A failed refresh is terminal for the session. The stored tokens are
//! cleared and the client is sent to the login entry point before any
//! waiter learns about the failure. A refresh whose task is dropped midway
//! is not a failure: its waiters are released with `Cancelled` and the
//! session is left as it is.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use reqwest::Method;
use tokio::sync::oneshot;

use crate::{
    config::Config,
    error::{Error, ErrorKind, Result},
    events::Event,
    http::Client as HttpClient,
    identity::Identity,
    navigator::Navigator,
    protocol::{
        self,
        auth::{self, RefreshTokenRequest, TokenPair},
    },
    store::TokenStore,
    token,
};

/// Outcome handed to queued callers: the new access token, or the kind of
/// error to fail with.
type Outcome = std::result::Result<String, ErrorKind>;

type Waiter = oneshot::Sender<Outcome>;

#[derive(Debug, Default)]
struct RefreshState {
    refreshing: bool,
    waiters: Vec<Waiter>,
}

pub struct SessionManager {
    config: Arc<Config>,
    http_client: Arc<HttpClient>,
    store: Arc<dyn TokenStore>,
    navigator: Arc<dyn Navigator>,
    state: Mutex<RefreshState>,
}

/// Settles a refresh when the refreshing caller is done with it, or when
/// its future is dropped before that.
struct Settle<'a> {
    manager: &'a SessionManager,
    settled: bool,
}

impl Settle<'_> {
    fn with(mut self, outcome: Outcome) {
        self.settled = true;
        self.manager.settle(outcome);
    }
}

impl Drop for Settle<'_> {
    fn drop(&mut self) {
        if !self.settled {
            debug!("token refresh abandoned before it settled");
            self.manager.settle(Err(ErrorKind::Cancelled));
        }
    }
}

impl SessionManager {
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        http_client: Arc<HttpClient>,
        store: Arc<dyn TokenStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            config,
            http_client,
            store,
            navigator,
            state: Mutex::new(RefreshState::default()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn http_client(&self) -> &HttpClient {
        &self.http_client
    }

    #[must_use]
    pub fn store(&self) -> &dyn TokenStore {
        self.store.as_ref()
    }

    #[must_use]
    pub fn navigator(&self) -> &dyn Navigator {
        self.navigator.as_ref()
    }

    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.store.access_token()
    }

    #[must_use]
    pub fn skew(&self) -> Duration {
        self.config.refresh_skew
    }

    /// Whether the stored access token needs refreshing before use.
    ///
    /// Only a present token can be stale; without one there is nothing to
    /// refresh.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.stale_token().is_some()
    }

    /// The stored access token, if it needs refreshing before use.
    #[must_use]
    pub fn stale_token(&self) -> Option<String> {
        self.access_token()
            .filter(|access| token::is_expired(Some(access), self.skew()))
    }

    /// Identity derived from the current access token.
    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity::from_token(self.access_token().as_deref(), self.skew())
    }

    /// Whether a refresh is in flight right now.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.state
            .lock()
            .map(|state| state.refreshing)
            .unwrap_or_default()
    }

    /// Obtains a new access token, sharing one refresh among all callers.
    ///
    /// # Errors
    ///
    /// See [`SessionManager::refresh_stale`].
    pub async fn refresh(&self) -> Result<String> {
        let current = self.access_token();
        self.refresh_stale(current.as_deref()).await
    }

    /// Obtains an access token to replace `seen`, the token a caller found
    /// expired or had rejected.
    ///
    /// If the stored token is no longer `seen`, another refresh already
    /// replaced it and it is returned as is. Otherwise this refreshes, or
    /// waits for the refresh in flight.
    ///
    /// # Errors
    ///
    /// Will return `Err` if:
    /// - no refresh token is stored (`FailedPrecondition`)
    /// - the refresh endpoint fails or answers without an access token
    /// - the refresh this caller was queued behind failed (`Unauthenticated`)
    /// - `seen` was cleared by a failed refresh or a logout since
    ///   (`Unauthenticated`)
    /// - the refresh this caller was queued behind was dropped before it
    ///   settled (`Cancelled`)
    ///
    /// A failure of this call's own refresh, or of the refresh it waited
    /// on, means the session has been torn down by the time the error is
    /// returned. Neither a cancelled refresh nor a cleared `seen` tears it
    /// down again.
    pub async fn refresh_stale(&self, seen: Option<&str>) -> Result<String> {
        let waiter = {
            let mut state = self.state.lock()?;
            if state.refreshing {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                Some(rx)
            } else {
                match (seen, self.store.access_token()) {
                    (_, Some(current)) if seen != Some(current.as_str()) => {
                        debug!("access token already replaced");
                        return Ok(current);
                    }
                    (Some(_), None) => {
                        return Err(Error::unauthenticated("session ended meanwhile"));
                    }
                    _ => {}
                }

                state.refreshing = true;
                None
            }
        };

        if let Some(rx) = waiter {
            trace!("waiting for token refresh in flight");
            return match rx.await {
                Ok(Ok(access)) => Ok(access),
                Ok(Err(ErrorKind::Cancelled)) | Err(_) => {
                    Err(Error::cancelled("token refresh abandoned"))
                }
                Ok(Err(kind)) => Err(Error::new(kind, "token refresh failed")),
            };
        }

        let settle = Settle {
            manager: self,
            settled: false,
        };

        match self.exchange().await {
            Ok(access) => {
                debug!("access token refreshed");
                settle.with(Ok(access.clone()));
                Ok(access)
            }
            Err(e) => {
                warn!("token refresh failed: {e}");
                self.teardown();
                settle.with(Err(ErrorKind::Unauthenticated));
                Err(e)
            }
        }
    }

    /// Trades the stored refresh token for a new access token and stores
    /// the result.
    async fn exchange(&self) -> Result<String> {
        let refresh_token = self
            .store
            .refresh_token()
            .filter(|refresh| !refresh.is_empty())
            .ok_or_else(|| Error::failed_precondition("no refresh token stored"))?;

        let url = self.config.endpoint(auth::REFRESH)?;
        let body = RefreshTokenRequest { refresh_token };
        let request = self.http_client.json(Method::POST, url, &body)?;

        let response = self.http_client.execute(request).await?;
        let pair: TokenPair = protocol::parse(response, auth::REFRESH).await?;

        let access = pair
            .access_token
            .filter(|access| !access.is_empty())
            .ok_or_else(|| Error::unauthenticated("no access token in refresh response"))?;
        if pair.refresh_token.is_none() {
            trace!("refresh token not rotated");
        }

        self.store
            .set_tokens(&access, pair.refresh_token.as_deref())?;
        Ok(access)
    }

    /// Clears the refresh state and hands `outcome` to every queued caller.
    fn settle(&self, outcome: Outcome) {
        let waiters = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.refreshing = false;
            std::mem::take(&mut state.waiters)
        };

        if !waiters.is_empty() {
            trace!("settling {} queued caller(s)", waiters.len());
        }
        for waiter in waiters {
            // The caller may have given up waiting; that is fine.
            let _ = waiter.send(outcome.clone());
        }
    }

    /// Ends the session after an irrecoverable refresh failure.
    fn teardown(&self) {
        if let Err(e) = self.store.clear_tokens() {
            error!("failed clearing session: {e}");
        }

        self.navigator.notify(Event::SessionExpired);

        let login = &self.config.login_path;
        if self.navigator.location() == *login {
            trace!("already at {login}");
        } else {
            self.navigator.navigate(login);
        }
    }
}
