//! W3C WebDriver adapter.
//!
//! Talks to a running driver (geckodriver, chromedriver) over HTTP. Each
//! session gets its own temporary download folder, so concurrent sessions
//! never see each other's files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::time::Instant;

use super::session::{
    BrowserError, BrowserLauncher, BrowserResult, BrowserSession, Download, ElementHandle, Key,
    SessionOptions,
};

/// Key of an element reference in WebDriver responses.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Interval between element and download polls.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Suffixes of downloads still in progress.
const PARTIAL_SUFFIXES: &[&str] = &["part", "crdownload", "tmp", "download"];

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct WireError {
    error: String,
    #[serde(default)]
    message: String,
}

/// Opens sessions on a WebDriver server.
pub struct WebDriverLauncher {
    endpoint: String,
    browser: String,
    http: reqwest::Client,
}

impl WebDriverLauncher {
    pub fn new(endpoint: impl Into<String>, browser: impl Into<String>) -> BrowserResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| BrowserError::Network(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            browser: browser.into(),
            http,
        })
    }

    /// Capabilities requesting a browser that downloads into `download_dir`
    /// without prompting.
    fn capabilities(&self, options: &SessionOptions, download_dir: &Path) -> Value {
        let dir = download_dir.to_string_lossy().to_string();
        let mut args = options.args.clone();

        let mut always_match = json!({ "browserName": self.browser });
        if self.browser.eq_ignore_ascii_case("firefox") {
            if options.headless {
                args.push("-headless".to_string());
            }
            always_match["moz:firefoxOptions"] = json!({
                "args": args,
                "prefs": {
                    "browser.download.folderList": 2,
                    "browser.download.dir": dir,
                    "browser.download.useDownloadDir": true,
                    "browser.helperApps.neverAsk.saveToDisk": "audio/mpeg,audio/mp3,application/octet-stream",
                },
            });
        } else {
            if options.headless {
                args.push("--headless=new".to_string());
            }
            always_match["goog:chromeOptions"] = json!({
                "args": args,
                "prefs": {
                    "download.default_directory": dir,
                    "download.prompt_for_download": false,
                },
            });
        }

        json!({ "capabilities": { "alwaysMatch": always_match } })
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn open(&self, options: &SessionOptions) -> BrowserResult<Box<dyn BrowserSession>> {
        let downloads = tempfile::Builder::new()
            .prefix("nightcore-downloads-")
            .tempdir()
            .map_err(|e| BrowserError::io("creating download folder", e))?;

        let body = self.capabilities(options, downloads.path());
        let url = format!("{}/session", self.endpoint);
        let value = send(self.http.post(&url).json(&body))
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| BrowserError::Launch("response has no session id".to_string()))?
            .to_string();

        tracing::debug!(session = %session_id, browser = %self.browser, "WebDriver session opened");

        Ok(Box::new(WebDriverSession {
            base: format!("{}/session/{}", self.endpoint, session_id),
            http: self.http.clone(),
            downloads,
            closed: false,
        }))
    }
}

/// One WebDriver session.
pub struct WebDriverSession {
    base: String,
    http: reqwest::Client,
    downloads: TempDir,
    closed: bool,
}

impl WebDriverSession {
    async fn find(&self, selector: &str) -> BrowserResult<Option<ElementHandle>> {
        let url = format!("{}/element", self.base);
        let body = json!({ "using": "css selector", "value": selector });

        match send(self.http.post(&url).json(&body)).await {
            Ok(value) => {
                let id = value
                    .get(ELEMENT_KEY)
                    .and_then(Value::as_str)
                    .ok_or_else(|| BrowserError::Protocol {
                        status: 200,
                        error: "invalid response".to_string(),
                        message: format!("no element reference for `{}`", selector),
                    })?;
                Ok(Some(ElementHandle::new(id, selector)))
            }
            Err(BrowserError::Protocol { error, .. }) if error == "no such element" => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn element_command(
        &self,
        element: &ElementHandle,
        command: &str,
        body: Value,
    ) -> BrowserResult<Value> {
        let url = format!("{}/element/{}/{}", self.base, element.id(), command);
        send(self.http.post(&url).json(&body)).await
    }

    /// Finished files in the download folder.
    fn finished_downloads(&self) -> BrowserResult<Vec<PathBuf>> {
        let entries = std::fs::read_dir(self.downloads.path())
            .map_err(|e| BrowserError::io("listing download folder", e))?;

        let mut files = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let partial = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| PARTIAL_SUFFIXES.iter().any(|p| p.eq_ignore_ascii_case(e)))
                .unwrap_or(false);
            if path.is_file() && !partial {
                files.push(path);
            }
        }
        Ok(files)
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&mut self, url: &str) -> BrowserResult<()> {
        let endpoint = format!("{}/url", self.base);
        send(self.http.post(&endpoint).json(&json!({ "url": url }))).await?;
        Ok(())
    }

    async fn submit_file(&mut self, selector: &str, path: &Path) -> BrowserResult<()> {
        let absolute = path
            .canonicalize()
            .map_err(|e| BrowserError::io(format!("resolving {}", path.display()), e))?;
        let input = self
            .find(selector)
            .await?
            .ok_or_else(|| BrowserError::ElementTimeout {
                selector: selector.to_string(),
                timeout: Duration::ZERO,
            })?;

        self.element_command(
            &input,
            "value",
            json!({ "text": absolute.to_string_lossy() }),
        )
        .await?;
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> BrowserResult<ElementHandle> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(element) = self.find(selector).await? {
                return Ok(element);
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::ElementTimeout {
                    selector: selector.to_string(),
                    timeout,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn click(&mut self, element: &ElementHandle) -> BrowserResult<()> {
        self.element_command(element, "click", json!({})).await?;
        Ok(())
    }

    async fn press_key(
        &mut self,
        element: &ElementHandle,
        key: Key,
        times: u32,
    ) -> BrowserResult<()> {
        if times == 0 {
            return Ok(());
        }
        let text: String = std::iter::repeat(key.webdriver_code())
            .take(times as usize)
            .collect();
        self.element_command(element, "value", json!({ "text": text }))
            .await?;
        Ok(())
    }

    async fn read_attribute(
        &mut self,
        element: &ElementHandle,
        name: &str,
    ) -> BrowserResult<Option<String>> {
        let url = format!("{}/element/{}/attribute/{}", self.base, element.id(), name);
        let value = send(self.http.get(&url)).await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn wait_for_download(&mut self, timeout: Duration) -> BrowserResult<Download> {
        let deadline = Instant::now() + timeout;
        // A file counts as finished once its size holds across two polls
        let mut last_seen: Option<(PathBuf, u64)> = None;

        loop {
            if let Some(path) = self.finished_downloads()?.into_iter().next() {
                let size = std::fs::metadata(&path)
                    .map(|m| m.len())
                    .map_err(|e| BrowserError::io("inspecting download", e))?;

                match &last_seen {
                    Some((seen, seen_size)) if *seen == path && *seen_size == size && size > 0 => {
                        let suggested_name = path
                            .file_name()
                            .map(|n| n.to_string_lossy().to_string())
                            .unwrap_or_default();
                        return Ok(Download {
                            path,
                            suggested_name,
                        });
                    }
                    _ => last_seen = Some((path, size)),
                }
            }

            if Instant::now() >= deadline {
                return Err(BrowserError::DownloadTimeout(timeout));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn save(&mut self, download: Download, destination: &Path) -> BrowserResult<()> {
        move_file(&download.path, destination).await
    }

    async fn close(&mut self) -> BrowserResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        send(self.http.delete(&self.base)).await?;
        Ok(())
    }
}

/// Move a finished download, copying when the rename fails (the download
/// folder may sit on another filesystem).
async fn move_file(from: &Path, to: &Path) -> BrowserResult<()> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::debug!("Renaming {} failed ({}), copying instead", from.display(), e);
            copy_and_remove(from, to).await
        }
    }
}

async fn copy_and_remove(from: &Path, to: &Path) -> BrowserResult<()> {
    tokio::fs::copy(from, to)
        .await
        .map_err(|e| BrowserError::io(format!("saving {}", to.display()), e))?;
    tokio::fs::remove_file(from)
        .await
        .map_err(|e| BrowserError::io("removing finished download", e))
}

/// Send a request and unwrap the WebDriver `value` envelope.
async fn send(request: reqwest::RequestBuilder) -> BrowserResult<Value> {
    let response = request
        .send()
        .await
        .map_err(|e| BrowserError::Network(e.to_string()))?;
    let status = response.status();
    let body: Value = response
        .json()
        .await
        .map_err(|e| BrowserError::Network(e.to_string()))?;
    let value = body.get("value").cloned().unwrap_or(Value::Null);

    if status.is_success() {
        return Ok(value);
    }

    let wire: WireError = serde_json::from_value(value).unwrap_or(WireError {
        error: "unknown error".to_string(),
        message: String::new(),
    });
    Err(BrowserError::Protocol {
        status: status.as_u16(),
        error: wire.error,
        message: wire.message,
    })
}
