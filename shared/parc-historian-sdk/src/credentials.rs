//! Bearer token cache for the historian login endpoint

use chrono::{DateTime, Utc};
use parc_telemetry::Counter;
use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::upstream_message;
use crate::types::{LoginRequest, LoginResponse};
use crate::{Clock, HistorianError, Result};

/// Share of the stated token lifetime the cache trusts before logging in again
pub const EXPIRY_SAFETY_FACTOR: f64 = 0.92;

/// Ceiling on a stated token lifetime
pub const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(30 * 24 * 3600);

/// A cached bearer token
#[derive(Clone)]
pub struct Credential {
    token: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Credential {
    /// Lifetimes above [`MAX_TOKEN_LIFETIME`] are clamped to it
    pub fn issue(token: String, issued_at: DateTime<Utc>, lifetime: Duration) -> Self {
        let lifetime = lifetime.min(MAX_TOKEN_LIFETIME);
        let trusted_ms = (lifetime.as_millis() as f64 * EXPIRY_SAFETY_FACTOR).round() as i64;
        let expires_at = issued_at
            .checked_add_signed(chrono::Duration::milliseconds(trusted_ms))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            token,
            issued_at,
            expires_at,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Token metadata safe to expose on readiness probes
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialStatus {
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub valid: bool,
}

/// Logs in lazily and hands out the cached token.
///
/// Logins are serialised on `refresh`: callers arriving during an in-flight
/// login wait for it and then reuse its token instead of logging in
/// themselves. The cached credential sits behind its own short-lived lock,
/// so status reads never wait on the network.
pub struct CredentialCache {
    http: reqwest::Client,
    login_url: String,
    username: String,
    password: SecretString,
    default_lifetime: Duration,
    clock: Arc<dyn Clock>,
    refresh: Mutex<()>,
    current: RwLock<Option<Credential>>,
    logins: Counter,
}

impl CredentialCache {
    pub fn new(
        http: reqwest::Client,
        login_url: String,
        username: String,
        password: SecretString,
        default_lifetime: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            http,
            login_url,
            username,
            password,
            default_lifetime,
            clock,
            refresh: Mutex::new(()),
            current: RwLock::new(None),
            logins: Counter::new("historian_logins"),
        }
    }

    /// Current bearer token, logging in first when none is cached or it expired
    pub async fn get_token(&self) -> Result<String> {
        if let Some(token) = self.valid_token() {
            return Ok(token);
        }

        let _refresh = self.refresh.lock().await;
        // Whoever held the lock before us may have just logged in
        if let Some(token) = self.valid_token() {
            return Ok(token);
        }
        if let Some(expired_at) = self.current.read().as_ref().map(|c| c.expires_at) {
            debug!(%expired_at, "Historian token expired");
        }

        let credential = self.login().await?;
        let token = credential.token.clone();
        *self.current.write() = Some(credential);
        Ok(token)
    }

    fn valid_token(&self) -> Option<String> {
        let now = self.clock.now();
        self.current
            .read()
            .as_ref()
            .filter(|c| c.is_valid_at(now))
            .map(|c| c.token.clone())
    }

    /// Drops the cached credential if it is still the one that was rejected.
    ///
    /// Returns whether anything was cleared.
    pub fn invalidate(&self, rejected_token: &str) -> bool {
        let mut current = self.current.write();
        match current.as_ref() {
            Some(credential) if credential.token == rejected_token => {
                *current = None;
                warn!("Historian token rejected, credential invalidated");
                true
            }
            _ => false,
        }
    }

    /// Unconditionally forget the cached credential
    pub fn clear(&self) {
        *self.current.write() = None;
    }

    pub fn status(&self) -> Option<CredentialStatus> {
        let now = self.clock.now();
        self.current.read().as_ref().map(|c| CredentialStatus {
            issued_at: c.issued_at,
            expires_at: c.expires_at,
            valid: c.is_valid_at(now),
        })
    }

    /// Number of login exchanges attempted so far
    pub fn login_count(&self) -> u64 {
        self.logins.get()
    }

    async fn login(&self) -> Result<Credential> {
        self.logins.inc();
        debug!(url = %self.login_url, username = %self.username, "Logging in to historian");

        let request = LoginRequest {
            username: &self.username,
            password: self.password.expose_secret(),
        };

        let response = self
            .http
            .post(&self.login_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Historian login request failed");
                HistorianError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = upstream_message(response).await;
            warn!(status = status.as_u16(), %message, "Historian login rejected");
            return Err(HistorianError::Auth(format!(
                "login rejected [{}]: {}",
                status.as_u16(),
                message
            )));
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| HistorianError::Auth(format!("malformed login response: {}", e)))?;

        if body.token.is_empty() {
            return Err(HistorianError::Auth("login response carried no token".to_string()));
        }

        let lifetime = match body.expires_in.filter(|secs| *secs > 0) {
            Some(secs) if Duration::from_secs(secs) > MAX_TOKEN_LIFETIME => {
                warn!(expires_in = secs, "Historian token lifetime clamped");
                MAX_TOKEN_LIFETIME
            }
            Some(secs) => Duration::from_secs(secs),
            None => self.default_lifetime,
        };
        let credential = Credential::issue(body.token, self.clock.now(), lifetime);

        info!(
            lifetime_secs = lifetime.as_secs(),
            expires_at = %credential.expires_at,
            "Historian token acquired"
        );

        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ManualClock;
    use futures_util::future::join_all;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cache_for(server: &MockServer, clock: Arc<ManualClock>) -> CredentialCache {
        cache_at(&server.uri(), reqwest::Client::new(), clock)
    }

    fn cache_at(base_url: &str, http: reqwest::Client, clock: Arc<ManualClock>) -> CredentialCache {
        CredentialCache::new(
            http,
            format!("{}/api/v1/auth/login", base_url),
            "bridge".to_string(),
            SecretString::new("s3cret".into()),
            Duration::from_secs(3600),
            clock,
        )
    }

    async fn mount_login(server: &MockServer, body: serde_json::Value, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/login"))
            .and(body_json(json!({"username": "bridge", "password": "s3cret"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[test]
    fn test_expiry_uses_safety_margin() {
        let issued = "2024-05-01T00:00:00Z".parse().unwrap();
        let credential = Credential::issue("t".to_string(), issued, Duration::from_secs(1000));
        assert_eq!(credential.expires_at() - issued, chrono::Duration::seconds(920));
        assert!(credential.is_valid_at(issued + chrono::Duration::seconds(919)));
        assert!(!credential.is_valid_at(issued + chrono::Duration::seconds(920)));
    }

    #[test]
    fn test_oversized_lifetime_is_clamped() {
        let issued = "2024-05-01T00:00:00Z".parse().unwrap();
        let credential = Credential::issue(
            "t".to_string(),
            issued,
            Duration::from_secs(10_000_000_000_000),
        );
        let trusted = Credential::issue("t".to_string(), issued, MAX_TOKEN_LIFETIME);
        assert_eq!(credential.expires_at(), trusted.expires_at());
        assert!(credential.expires_at() > issued);
    }

    #[test]
    fn test_debug_hides_token() {
        let credential = Credential::issue("abc123".to_string(), Utc::now(), Duration::from_secs(1));
        assert!(!format!("{:?}", credential).contains("abc123"));
    }

    #[tokio::test]
    async fn test_token_reused_within_window() {
        let server = MockServer::start().await;
        mount_login(&server, json!({"token": "tok-1", "expiresIn": 3600}), 1).await;

        let clock = Arc::new(ManualClock::default());
        let cache = cache_for(&server, clock.clone());

        assert_eq!(assert_ok!(cache.get_token().await), "tok-1");
        clock.advance(chrono::Duration::minutes(30));
        assert_eq!(assert_ok!(cache.get_token().await), "tok-1");
        assert_eq!(cache.login_count(), 1);
    }

    #[tokio::test]
    async fn test_relogin_after_safety_window() {
        let server = MockServer::start().await;
        mount_login(&server, json!({"token": "tok", "expiresIn": 100}), 2).await;

        let clock = Arc::new(ManualClock::default());
        let cache = cache_for(&server, clock.clone());

        assert_ok!(cache.get_token().await);
        // 93s is inside the nominal 100s lifetime but past the trusted 92s
        clock.advance(chrono::Duration::seconds(93));
        assert_ok!(cache.get_token().await);
        assert_eq!(cache.login_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_lifetime_uses_default() {
        let server = MockServer::start().await;
        mount_login(&server, json!({"access_token": "tok"}), 1).await;

        let clock = Arc::new(ManualClock::default());
        let cache = cache_for(&server, clock.clone());
        assert_ok!(cache.get_token().await);

        let status = cache.status().unwrap();
        assert_eq!(
            status.expires_at - status.issued_at,
            chrono::Duration::seconds(3312)
        );
    }

    #[tokio::test]
    async fn test_invalidate_forces_single_new_login() {
        let server = MockServer::start().await;
        mount_login(&server, json!({"token": "tok", "expiresIn": 3600}), 2).await;

        let cache = cache_for(&server, Arc::new(ManualClock::default()));
        let token = assert_ok!(cache.get_token().await);

        assert!(cache.invalidate(&token));
        assert!(cache.status().is_none());

        assert_ok!(cache.get_token().await);
        assert_ok!(cache.get_token().await);
        assert_eq!(cache.login_count(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_ignores_stale_token() {
        let server = MockServer::start().await;
        mount_login(&server, json!({"token": "fresh", "expiresIn": 3600}), 1).await;

        let cache = cache_for(&server, Arc::new(ManualClock::default()));
        assert_ok!(cache.get_token().await);

        assert!(!cache.invalidate("some-older-token"));
        assert_eq!(assert_ok!(cache.get_token().await), "fresh");
    }

    #[tokio::test]
    async fn test_concurrent_first_calls_share_one_login() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/login"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"token": "shared", "expiresIn": 3600}))
                    .set_delay(std::time::Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let cache = Arc::new(cache_for(&server, Arc::new(ManualClock::default())));
        let calls = (0..8).map(|_| {
            let cache = cache.clone();
            async move { cache.get_token().await }
        });

        for token in join_all(calls).await {
            assert_eq!(assert_ok!(token), "shared");
        }
        assert_eq!(cache.login_count(), 1);
    }

    #[tokio::test]
    async fn test_rejected_login_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/login"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "bad password"})),
            )
            .mount(&server)
            .await;

        let cache = cache_for(&server, Arc::new(ManualClock::default()));
        let err = assert_err!(cache.get_token().await);
        assert!(err.is_auth());
        assert!(err.to_string().contains("bad password"));
        assert!(cache.status().is_none());
    }

    #[tokio::test]
    async fn test_huge_stated_lifetime_still_logs_in() {
        let server = MockServer::start().await;
        mount_login(&server, json!({"token": "t", "expiresIn": 10_000_000_000_000u64}), 1).await;

        let cache = cache_for(&server, Arc::new(ManualClock::default()));
        assert_eq!(assert_ok!(cache.get_token().await), "t");

        let status = cache.status().unwrap();
        assert!(status.valid);
        assert!(status.expires_at - status.issued_at <= chrono::Duration::days(30));
    }

    #[tokio::test]
    async fn test_login_timeout_is_not_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/login"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"token": "late"}))
                    .set_delay(std::time::Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(50))
            .build()
            .unwrap();
        let cache = cache_at(&server.uri(), http, Arc::new(ManualClock::default()));

        let err = assert_err!(cache.get_token().await);
        assert!(matches!(err, HistorianError::Timeout(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_unreachable_login_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let cache = cache_at(
            &format!("http://{}", addr),
            reqwest::Client::new(),
            Arc::new(ManualClock::default()),
        );

        let err = assert_err!(cache.get_token().await);
        assert!(matches!(err, HistorianError::Transport(_)), "{:?}", err);
        assert_eq!(cache.login_count(), 1);
    }

    #[tokio::test]
    async fn test_status_readable_during_login() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/login"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"token": "slow", "expiresIn": 3600}))
                    .set_delay(std::time::Duration::from_millis(300)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let cache = Arc::new(cache_for(&server, Arc::new(ManualClock::default())));
        let login = tokio::spawn({
            let cache = cache.clone();
            async move { cache.get_token().await }
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(cache.status().is_none());

        assert_eq!(assert_ok!(login.await.unwrap()), "slow");
        assert!(cache.status().is_some());
    }
}
