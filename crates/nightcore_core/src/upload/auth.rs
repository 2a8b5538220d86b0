//! OAuth credentials for the video platform.
//!
//! Tokens are cached as JSON. A valid cached token is reused, an expired one
//! is refreshed, and otherwise the installed-app loopback flow runs: a
//! listener on `127.0.0.1:<ephemeral>` receives the authorization code from
//! the browser redirect.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use super::{UploadError, UploadResult};
use crate::logging::RunLogger;

/// Scopes requested for uploading and managing videos.
pub const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/youtube",
    "https://www.googleapis.com/auth/youtube.upload",
];

/// Tokens this close to expiry are refreshed.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// How long the loopback flow waits for the user's consent.
const CONSENT_TIMEOUT: Duration = Duration::from_secs(300);

const CONSENT_PAGE: &str = "The authentication flow has completed. You may close this window.";

/// Installed-app client credentials.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    pub auth_uri: String,
    pub token_uri: String,
}

#[derive(Deserialize)]
struct ClientSecretFile {
    installed: ClientSecret,
}

impl ClientSecret {
    /// Read the `installed` section of a downloaded client secret file.
    pub fn load(path: &Path) -> UploadResult<Self> {
        if !path.exists() {
            return Err(UploadError::MissingClientSecret(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| UploadError::io(format!("reading {}", path.display()), e))?;
        let file: ClientSecretFile = serde_json::from_str(&content)
            .map_err(|e| UploadError::Auth(format!("invalid client secret file: {}", e)))?;
        Ok(file.installed)
    }
}

/// Cached OAuth token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCache {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl TokenCache {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - chrono::Duration::seconds(EXPIRY_MARGIN_SECS) > now
    }

    pub fn load(path: &Path) -> UploadResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| UploadError::io(format!("reading {}", path.display()), e))?;
        // An unreadable cache is treated as absent
        Ok(serde_json::from_str(&content).ok())
    }

    pub fn save(&self, path: &Path) -> UploadResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| UploadError::io("creating credentials folder", e))?;
        }
        let content =
            serde_json::to_string_pretty(self).map_err(|e| UploadError::Parse(e.to_string()))?;
        std::fs::write(path, content)
            .map_err(|e| UploadError::io(format!("writing {}", path.display()), e))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: String,
}

/// Obtains access tokens, caching them on disk.
pub struct Authenticator {
    client_secret_path: PathBuf,
    token_cache_path: PathBuf,
    http: reqwest::Client,
}

impl Authenticator {
    pub fn new(
        client_secret_path: impl Into<PathBuf>,
        token_cache_path: impl Into<PathBuf>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            client_secret_path: client_secret_path.into(),
            token_cache_path: token_cache_path.into(),
            http,
        }
    }

    /// Return a valid access token, running the consent flow if needed.
    pub async fn access_token(&self, logger: &RunLogger) -> UploadResult<String> {
        let cached = TokenCache::load(&self.token_cache_path)?;
        if let Some(token) = &cached {
            if token.is_valid(Utc::now()) {
                logger.debug("Using cached access token");
                return Ok(token.access_token.clone());
            }
        }

        let secret = ClientSecret::load(&self.client_secret_path)?;
        let refreshed = match cached.and_then(|t| t.refresh_token) {
            Some(refresh_token) => {
                logger.info("Refreshing access token");
                match self.refresh(&secret, &refresh_token).await {
                    Ok(token) => Some(token),
                    Err(e) => {
                        logger.warn(&format!("Token refresh failed, re-authorizing: {}", e));
                        None
                    }
                }
            }
            None => None,
        };

        let token = match refreshed {
            Some(token) => token,
            None => self.authorize(&secret, logger).await?,
        };
        token.save(&self.token_cache_path)?;
        Ok(token.access_token)
    }

    async fn refresh(&self, secret: &ClientSecret, refresh_token: &str) -> UploadResult<TokenCache> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", secret.client_id.as_str()),
            ("client_secret", secret.client_secret.as_str()),
        ];
        let response = self.exchange(&secret.token_uri, &form).await?;
        Ok(to_cache(response, Some(refresh_token.to_string())))
    }

    /// Installed-app loopback flow.
    async fn authorize(&self, secret: &ClientSecret, logger: &RunLogger) -> UploadResult<TokenCache> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| UploadError::io("binding consent listener", e))?;
        let port = listener
            .local_addr()
            .map_err(|e| UploadError::io("binding consent listener", e))?
            .port();
        let redirect_uri = format!("http://127.0.0.1:{}/", port);
        let state = random_state();

        let consent_url = consent_url(secret, &redirect_uri, &state)?;
        logger.info(&format!(
            "Please visit this URL to authorize this application: {}",
            consent_url
        ));

        let code = tokio::time::timeout(CONSENT_TIMEOUT, receive_code(listener, &state))
            .await
            .map_err(|_| UploadError::Auth("timed out waiting for consent".to_string()))??;

        let form = [
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("client_id", secret.client_id.as_str()),
            ("client_secret", secret.client_secret.as_str()),
        ];
        let response = self.exchange(&secret.token_uri, &form).await?;
        logger.success("Authorization granted");
        Ok(to_cache(response, None))
    }

    async fn exchange(&self, token_uri: &str, form: &[(&str, &str)]) -> UploadResult<TokenResponse> {
        let response = self
            .http
            .post(token_uri)
            .form(form)
            .send()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<TokenErrorResponse>(&body)
                .map(|e| format!("{} {}", e.error, e.error_description))
                .unwrap_or(body);
            return Err(UploadError::Auth(message.trim().to_string()));
        }

        serde_json::from_str(&body).map_err(|e| UploadError::Parse(e.to_string()))
    }
}

fn to_cache(response: TokenResponse, previous_refresh: Option<String>) -> TokenCache {
    TokenCache {
        access_token: response.access_token,
        refresh_token: response.refresh_token.or(previous_refresh),
        expires_at: Utc::now() + chrono::Duration::seconds(response.expires_in),
    }
}

fn random_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(30)
        .map(char::from)
        .collect()
}

/// Consent page URL for the loopback flow.
pub fn consent_url(secret: &ClientSecret, redirect_uri: &str, state: &str) -> UploadResult<Url> {
    let scope = SCOPES.join(" ");
    Url::parse_with_params(
        &secret.auth_uri,
        &[
            ("response_type", "code"),
            ("client_id", secret.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("scope", scope.as_str()),
            ("state", state),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map_err(|e| UploadError::Auth(format!("invalid auth uri: {}", e)))
}

/// Query of the consent redirect.
#[derive(Debug, Default, Deserialize)]
struct RedirectParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

#[derive(Clone)]
struct CallbackState {
    expected_state: Arc<str>,
    outcome: Arc<Mutex<Option<oneshot::Sender<UploadResult<String>>>>>,
}

/// Serve the redirect URI until a request carries the authorization code.
async fn receive_code(listener: TcpListener, expected_state: &str) -> UploadResult<String> {
    let (outcome_tx, outcome_rx) = oneshot::channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let state = CallbackState {
        expected_state: Arc::from(expected_state),
        outcome: Arc::new(Mutex::new(Some(outcome_tx))),
    };
    let app = Router::new().route("/", get(consent_callback)).with_state(state);

    tokio::spawn(async move {
        let shutdown = async move {
            let _ = shutdown_rx.await;
        };
        if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
            tracing::debug!("Consent listener stopped: {}", e);
        }
    });

    let outcome = outcome_rx
        .await
        .map_err(|_| UploadError::Auth("consent listener closed".to_string()));
    if shutdown_tx.send(()).is_err() {
        tracing::debug!("Consent listener already stopped");
    }
    outcome?
}

async fn consent_callback(
    State(state): State<CallbackState>,
    Query(params): Query<RedirectParams>,
) -> String {
    let Some(outcome) = check_redirect(params, &state.expected_state) else {
        return "Waiting for authorization.".to_string();
    };
    let body = match &outcome {
        Ok(_) => CONSENT_PAGE.to_string(),
        Err(e) => e.to_string(),
    };

    let sender = state.outcome.lock().take();
    match sender {
        Some(sender) => {
            if sender.send(outcome).is_err() {
                tracing::debug!("Consent redirect arrived after the flow ended");
            }
        }
        None => tracing::debug!("Ignoring repeated consent redirect"),
    }
    body
}

/// `None` when the request carries neither a code nor an error.
fn check_redirect(params: RedirectParams, expected_state: &str) -> Option<UploadResult<String>> {
    if let Some(error) = params.error {
        return Some(Err(UploadError::Auth(format!("consent denied: {}", error))));
    }
    let code = params.code?;
    if params.state.as_deref() != Some(expected_state) {
        return Some(Err(UploadError::Auth("state mismatch in redirect".to_string())));
    }
    Some(Ok(code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn secret() -> ClientSecret {
        ClientSecret {
            client_id: "id.apps.example".to_string(),
            client_secret: "s3cret".to_string(),
            auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
        }
    }

    #[test]
    fn reads_installed_client_secret() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("client_secret.json");
        std::fs::write(
            &path,
            r#"{"installed":{"client_id":"id.apps.example","client_secret":"s3cret",
                "auth_uri":"https://accounts.google.com/o/oauth2/auth",
                "token_uri":"https://oauth2.googleapis.com/token",
                "redirect_uris":["http://localhost"]}}"#,
        )
        .unwrap();

        assert_eq!(ClientSecret::load(&path).unwrap(), secret());
        assert!(matches!(
            ClientSecret::load(&dir.path().join("missing.json")),
            Err(UploadError::MissingClientSecret(_))
        ));
    }

    #[test]
    fn token_cache_round_trips_and_expires() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials").join("token.json");
        let now = Utc::now();
        let token = TokenCache {
            access_token: "ya29".to_string(),
            refresh_token: Some("1//r".to_string()),
            expires_at: now + chrono::Duration::seconds(3600),
        };

        token.save(&path).unwrap();
        let loaded = TokenCache::load(&path).unwrap().unwrap();
        assert_eq!(loaded, token);
        assert!(loaded.is_valid(now));
        assert!(!loaded.is_valid(now + chrono::Duration::seconds(3590)));
    }

    #[test]
    fn corrupt_cache_is_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "not json").unwrap();
        assert_eq!(TokenCache::load(&path).unwrap(), None);
    }

    #[test]
    fn consent_url_requests_offline_access() {
        let url = consent_url(&secret(), "http://127.0.0.1:5555/", "xyz").unwrap();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        assert!(pairs.contains(&("access_type".to_string(), "offline".to_string())));
        assert!(pairs.contains(&("redirect_uri".to_string(), "http://127.0.0.1:5555/".to_string())));
        assert!(pairs.contains(&("scope".to_string(), SCOPES.join(" "))));
    }

    fn params(code: Option<&str>, state: Option<&str>, error: Option<&str>) -> RedirectParams {
        RedirectParams {
            code: code.map(str::to_string),
            state: state.map(str::to_string),
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn checks_redirect_parameters() {
        let ok = check_redirect(params(Some("4/0Ab"), Some("abc"), None), "abc");
        assert_eq!(ok.unwrap().unwrap(), "4/0Ab");

        let mismatch = check_redirect(params(Some("c"), Some("zzz"), None), "abc");
        assert!(matches!(mismatch, Some(Err(UploadError::Auth(_)))));

        let denied = check_redirect(params(None, None, Some("access_denied")), "abc");
        assert!(matches!(denied, Some(Err(UploadError::Auth(_)))));

        assert!(check_redirect(RedirectParams::default(), "abc").is_none());
    }

    async fn consent_listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        (listener, base)
    }

    #[tokio::test]
    async fn loopback_receives_authorization_code() {
        let (listener, base) = consent_listener().await;
        let flow = tokio::spawn(async move { receive_code(listener, "abc").await });

        let http = reqwest::Client::new();
        let favicon = http.get(format!("{}/favicon.ico", base)).send().await.unwrap();
        assert_eq!(favicon.status(), reqwest::StatusCode::NOT_FOUND);

        let page = http
            .get(format!("{}/?state=abc&code=4%2F0Ab&scope=youtube", base))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(page, CONSENT_PAGE);
        assert_eq!(flow.await.unwrap().unwrap(), "4/0Ab");
    }

    #[tokio::test]
    async fn loopback_rejects_foreign_state() {
        let (listener, base) = consent_listener().await;
        let flow = tokio::spawn(async move { receive_code(listener, "abc").await });

        let page = reqwest::get(format!("{}/?state=zzz&code=c", base))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(page.contains("state mismatch"));
        assert!(matches!(flow.await.unwrap(), Err(UploadError::Auth(_))));
    }

    #[test]
    fn random_state_is_alphanumeric() {
        let state = random_state();
        assert_eq!(state.len(), 30);
        assert!(state.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
