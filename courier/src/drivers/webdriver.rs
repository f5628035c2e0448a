use crate::config::CourierConfig;
use crate::drivers::{ElementHandle, UiDriver};
use crate::errors::DriverError;
use crate::locator::Locator;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// W3C web element identifier key
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f700d9f6a2b";

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(60);

// WebDriver key codepoints
const KEY_NULL: char = '\u{E000}';
const KEY_ENTER: char = '\u{E007}';
const KEY_SHIFT: char = '\u{E008}';

/// A browser session driven over the W3C WebDriver HTTP protocol.
///
/// Works against any chromedriver-compatible endpoint. The session is created
/// by [`WebDriverSession::start`] and torn down by [`UiDriver::quit`].
#[derive(Debug)]
pub struct WebDriverSession {
    client: reqwest::Client,
    base_url: String,
    session_id: String,
    poll_interval: Duration,
    closed: AtomicBool,
}

impl WebDriverSession {
    /// Create a new browser session.
    #[instrument(skip(config), fields(webdriver_url = %config.webdriver_url))]
    pub async fn start(config: &CourierConfig) -> Result<Self, DriverError> {
        let client = build_client()?;
        let base_url = config.webdriver_url.trim_end_matches('/').to_string();

        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": config.browser_args },
                }
            }
        });

        let value = execute(
            client
                .post(format!("{base_url}/session"))
                .json(&capabilities),
        )
        .await
        .map_err(|e| match e {
            created @ DriverError::SessionNotCreated(_) => created,
            other => DriverError::SessionNotCreated(format!(
                "{other}. Is a WebDriver server (e.g. chromedriver) running at {base_url}?"
            )),
        })?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                DriverError::SessionNotCreated(format!("No sessionId in response: {value}"))
            })?
            .to_string();

        info!(session_id = %session_id, "WebDriver session started");
        Ok(Self {
            client,
            base_url,
            session_id,
            poll_interval: config.timeouts.poll_interval(),
            closed: AtomicBool::new(false),
        })
    }

    /// Ask a WebDriver endpoint whether it can create sessions.
    pub async fn status(webdriver_url: &str) -> Result<String, DriverError> {
        let client = build_client()?;
        let base_url = webdriver_url.trim_end_matches('/');
        let value = execute(client.get(format!("{base_url}/status"))).await?;

        let ready = value.get("ready").and_then(Value::as_bool).unwrap_or(false);
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        if ready {
            Ok(message)
        } else {
            Err(DriverError::Protocol {
                error: "not ready".to_string(),
                message,
            })
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn command(&self, method: Method, path: &str, body: Value) -> Result<Value, DriverError> {
        let url = format!("{}/session/{}{}", self.base_url, self.session_id, path);
        let request = self.client.request(method, url);
        execute(request.json(&body)).await
    }

    async fn find_element(&self, locator: &Locator) -> Result<ElementHandle, DriverError> {
        let value = self
            .command(
                Method::POST,
                "/element",
                json!({ "using": locator.strategy.as_webdriver(), "value": locator.value }),
            )
            .await?;

        value
            .get(ELEMENT_KEY)
            .or_else(|| value.get("ELEMENT"))
            .and_then(Value::as_str)
            .map(|id| ElementHandle(id.to_string()))
            .ok_or_else(|| DriverError::InvalidResponse(format!("No element reference in {value}")))
    }
}

#[async_trait::async_trait]
impl UiDriver for WebDriverSession {
    #[instrument(level = "debug", skip(self, url), fields(url = %redact_url(url)))]
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.command(Method::POST, "/url", json!({ "url": url }))
            .await
            .map(|_| ())
    }

    #[instrument(level = "debug", skip(self, timeout), fields(locator = %locator))]
    async fn wait_for_locator(
        &self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<ElementHandle, DriverError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            match self.find_element(locator).await {
                Ok(element) => {
                    debug!(attempts, element = element.id(), "Element present");
                    return Ok(element);
                }
                Err(DriverError::ElementNotFound(_)) => {
                    let now = tokio::time::Instant::now();
                    if now >= deadline {
                        return Err(DriverError::Timeout(format!(
                            "Timed out after {timeout:?} waiting for element {locator}"
                        )));
                    }
                    tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    #[instrument(level = "debug", skip(self, text), fields(element = element.id(), chars = text.chars().count()))]
    async fn send_keys(&self, element: &ElementHandle, text: &str) -> Result<(), DriverError> {
        let path = format!("/element/{}/value", element.id());
        self.command(Method::POST, &path, json!({ "text": encode_keys(text) }))
            .await
            .map(|_| ())
    }

    #[instrument(level = "debug", skip(self), fields(element = element.id()))]
    async fn click(&self, element: &ElementHandle) -> Result<(), DriverError> {
        let path = format!("/element/{}/click", element.id());
        self.command(Method::POST, &path, json!({})).await.map(|_| ())
    }

    async fn quit(&self) -> Result<(), DriverError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let url = format!("{}/session/{}", self.base_url, self.session_id);
        execute(self.client.delete(url)).await?;
        info!(session_id = %self.session_id, "WebDriver session closed");
        Ok(())
    }
}

fn build_client() -> Result<reqwest::Client, DriverError> {
    reqwest::Client::builder()
        .timeout(DEFAULT_HTTP_TIMEOUT)
        .build()
        .map_err(|e| DriverError::Transport(format!("Failed to build HTTP client: {e}")))
}

/// Send a WebDriver request and unwrap its `value`, mapping error payloads.
async fn execute(request: reqwest::RequestBuilder) -> Result<Value, DriverError> {
    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;

    let body: Value = serde_json::from_str(&text).map_err(|e| {
        DriverError::InvalidResponse(format!(
            "HTTP {status}: {e}: {}",
            text.chars().take(200).collect::<String>()
        ))
    })?;
    let value = body.get("value").cloned().unwrap_or(Value::Null);

    let error = value.get("error").and_then(Value::as_str);
    if status.is_success() && error.is_none() {
        return Ok(value);
    }
    Err(protocol_error(status, &value))
}

fn protocol_error(status: StatusCode, value: &Value) -> DriverError {
    let error = value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .map(|m| m.lines().next().unwrap_or("").to_string())
        .unwrap_or_else(|| format!("HTTP {status}"));

    match error {
        "no such element" | "stale element reference" | "element not interactable" => {
            DriverError::ElementNotFound(format!("{error}: {message}"))
        }
        "invalid selector" => DriverError::InvalidLocator(message),
        "timeout" | "script timeout" => DriverError::Timeout(message),
        "session not created" => DriverError::SessionNotCreated(message),
        _ => {
            warn!(%status, error, message = %message, "WebDriver command failed");
            DriverError::Protocol {
                error: error.to_string(),
                message,
            }
        }
    }
}

/// A URL fit for logs: a `text` query parameter carries a message body, so
/// only its length is kept.
fn redact_url(url: &str) -> String {
    let Some((head, query)) = url.split_once('?') else {
        return url.to_string();
    };
    let params: Vec<String> = query
        .split('&')
        .map(|param| match param.strip_prefix("text=") {
            Some(text) => format!("text=<{} bytes>", text.len()),
            None => param.to_string(),
        })
        .collect();
    format!("{head}?{}", params.join("&"))
}

/// Encode text for element send-keys.
///
/// A bare Enter would submit the message, so line breaks become Shift+Enter
/// followed by a modifier release.
pub fn encode_keys(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\r' => {}
            '\n' => {
                out.push(KEY_SHIFT);
                out.push(KEY_ENTER);
                out.push(KEY_NULL);
            }
            other => out.push(other),
        }
    }
    out
}
