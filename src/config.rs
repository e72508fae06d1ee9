//! Client configuration.
//!
//! A [`Config`] is built once at start-up and shared by the transport, the
//! session manager and the API client. Only the API base URL is mandatory;
//! everything else has defaults matching the Thryve web client.

use std::{num::NonZeroU32, time::Duration};

use url::Url;

use crate::error::{Error, Result};

#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Config {
    pub app_name: String,
    pub app_version: String,

    /// Base URL of the backend, e.g. `http://localhost:8080`.
    pub api_url: Url,

    /// Path of the login entry point that a torn-down session redirects to.
    pub login_path: String,

    /// Safety margin subtracted from a token's `exp` claim before comparing
    /// it against the current time.
    pub refresh_skew: Duration,

    /// Window and number of requests allowed within it.
    pub rate_limit_interval: Duration,
    pub rate_limit_calls: NonZeroU32,

    pub user_agent: String,
}

impl Config {
    /// Default refresh skew, guarding against clock drift and latency.
    pub const DEFAULT_REFRESH_SKEW: Duration = Duration::from_secs(30);

    /// Default login entry point.
    pub const DEFAULT_LOGIN_PATH: &'static str = "/login";

    /// Creates a configuration for the backend at `api_url`.
    ///
    /// # Errors
    ///
    /// Will return `Err` if:
    /// - `api_url` cannot be used as a base URL (e.g. `mailto:`)
    /// - no valid `User-Agent` can be created out of the application name,
    ///   version and operating system
    pub fn new(api_url: Url) -> Result<Self> {
        if api_url.cannot_be_a_base() {
            return Err(Error::invalid_argument(format!(
                "{api_url} cannot be used as API base URL"
            )));
        }

        let app_name = env!("CARGO_PKG_NAME").to_owned();
        let app_version = env!("CARGO_PKG_VERSION").to_owned();

        // Additional `User-Agent` string checks on top of `reqwest::HeaderValue`.
        let illegal_chars = |chr| chr == '/' || chr == ';';
        if app_name.is_empty()
            || app_name.contains(illegal_chars)
            || app_version.is_empty()
            || app_version.contains(illegal_chars)
        {
            return Err(Error::invalid_argument(format!(
                "application name and/or version invalid (\"{app_name}\"; \"{app_version}\")"
            )));
        }

        let os_name = match std::env::consts::OS {
            "macos" => "osx",
            other => other,
        };
        let os_version = sysinfo::System::os_version().unwrap_or_else(|| String::from("0"));
        if os_name.is_empty() || os_name.contains(illegal_chars) || os_version.contains(illegal_chars)
        {
            return Err(Error::invalid_argument(format!(
                "os name and/or version invalid (\"{os_name}\"; \"{os_version}\")"
            )));
        }

        let user_agent = format!("{app_name}/{app_version} (Rust; {os_name}/{os_version})");
        trace!("user agent: {user_agent}");

        Ok(Self {
            app_name,
            app_version,

            api_url,
            login_path: Self::DEFAULT_LOGIN_PATH.to_owned(),
            refresh_skew: Self::DEFAULT_REFRESH_SKEW,

            rate_limit_interval: Duration::from_secs(1),
            rate_limit_calls: NonZeroU32::new(20).unwrap_or(NonZeroU32::MIN),

            user_agent,
        })
    }

    /// Resolves an API path such as `/api/courses` against the base URL.
    ///
    /// A base URL with a path prefix (`https://host/thryve/`) keeps that
    /// prefix. The result always stays below the base URL, so that bearer
    /// tokens are never sent anywhere else.
    ///
    /// # Errors
    ///
    /// Will return `Err` if:
    /// - `path` is an absolute URL
    /// - `path` resolves outside of the base URL
    /// - the joined URL is invalid
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        if Url::parse(path).is_ok() {
            return Err(Error::invalid_argument(format!(
                "{path} is not a path on the API"
            )));
        }

        let mut base = self.api_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }

        let url = base.join(path.trim_start_matches('/'))?;
        if url.origin() != base.origin() || !url.path().starts_with(base.path()) {
            return Err(Error::invalid_argument(format!(
                "{path} resolves outside of {base}"
            )));
        }

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(base: &str) -> Config {
        Config::new(base.parse().expect("valid url")).expect("valid config")
    }

    #[test]
    fn defaults() {
        let config = config_for("http://localhost:8080");
        assert_eq!(config.login_path, "/login");
        assert_eq!(config.refresh_skew, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("thryve/"));
    }

    #[test]
    fn endpoint_joins_paths() {
        let config = config_for("http://localhost:8080");
        assert_eq!(
            config.endpoint("/api/courses").unwrap().as_str(),
            "http://localhost:8080/api/courses"
        );

        let config = config_for("https://example.org/thryve");
        assert_eq!(
            config.endpoint("/api/auth/login").unwrap().as_str(),
            "https://example.org/thryve/api/auth/login"
        );
    }

    #[test]
    fn endpoint_stays_on_the_api() {
        let config = config_for("https://example.org/thryve");
        for path in [
            "https://evil.example/steal",
            "http://example.org/thryve/api/courses",
            "javascript:alert(1)",
            "../admin",
            "/api/../../admin",
            "\\\\evil.example/x",
        ] {
            let err = config.endpoint(path).unwrap_err();
            assert_eq!(err.kind, crate::error::ErrorKind::InvalidArgument, "{path}");
        }

        // Leading slashes are stripped, so this is a path and not a host.
        assert_eq!(
            config.endpoint("//evil.example/x").unwrap().as_str(),
            "https://example.org/thryve/evil.example/x"
        );
    }

    #[test]
    fn rejects_non_base_urls() {
        let url = "mailto:someone@example.org".parse().unwrap();
        assert!(Config::new(url).is_err());
    }
}
