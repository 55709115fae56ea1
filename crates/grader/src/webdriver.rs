//! WebDriver browser automation
//!
//! Spawns a `chromedriver` process and speaks the W3C WebDriver wire
//! protocol to it over HTTP.

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::browser::{Browser, ElementRef, Locator};
use crate::error::{GradeError, GradeResult};
use crate::server::pump_lines;

/// Key under which W3C drivers return element references
const ELEMENT_KEY: &str = "element-6066-11e4-a52f-4a4c87e2c84a";

/// Handle to a running WebDriver process
pub struct DriverProcess {
    child: Option<Child>,
    pub url: String,
}

impl DriverProcess {
    /// Spawn the driver and wait until it reports ready
    pub async fn spawn(config: &DriverConfig) -> GradeResult<Self> {
        let port = match config.port {
            Some(port) => port,
            None => find_free_port()?,
        };
        let url = format!("http://127.0.0.1:{}", port);

        info!("Spawning {} on port {}", config.binary, port);

        let mut child = Command::new(&config.binary)
            .arg(format!("--port={}", port))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| GradeError::DriverNotFound(format!("{}: {}", config.binary, e)))?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            pump_lines(stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            pump_lines(stderr, tx);
        }
        tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                debug!(target: "cardgrade::driver_output", "{}", line);
            }
        });

        let handle = DriverProcess {
            child: Some(child),
            url,
        };

        handle.wait_for_healthy(config.startup_timeout()).await?;

        info!("WebDriver is ready at {}", handle.url);
        Ok(handle)
    }

    /// Poll `/status` until the driver accepts sessions
    async fn wait_for_healthy(&self, timeout_duration: Duration) -> GradeResult<()> {
        let status_url = format!("{}/status", self.url);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = std::time::Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout_duration {
            attempts += 1;

            match client.get(&status_url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    let body: Value = resp.json().await?;
                    if body["value"]["ready"].as_bool().unwrap_or(false) {
                        return Ok(());
                    }
                    debug!("WebDriver not ready yet: {}", body["value"]["message"]);
                }
                Ok(resp) => {
                    warn!("WebDriver status returned {}", resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for WebDriver to start...");
                    }
                    // Connection refused is expected while the driver boots
                    if !e.is_connect() {
                        warn!("WebDriver status error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(100)).await;
        }

        Err(GradeError::DriverHealthCheck(attempts))
    }

    /// Stop the driver; calling it again is a no-op
    pub fn stop(&mut self) -> GradeResult<()> {
        if let Some(mut child) = self.child.take() {
            info!("Stopping WebDriver");
            if let Err(e) = child.start_kill() {
                debug!("WebDriver already gone: {}", e);
            }
            let _ = child.try_wait();
        }
        Ok(())
    }
}

impl Drop for DriverProcess {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// One browser session on a WebDriver endpoint
pub struct WebDriverSession {
    client: reqwest::Client,
    session_url: String,
    detach: bool,
    closed: bool,
}

impl WebDriverSession {
    /// Open a Chrome session configured from `config`
    pub async fn open(driver_url: &str, config: &DriverConfig) -> GradeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        let resp = client
            .post(format!("{}/session", driver_url))
            .json(&config.capabilities())
            .send()
            .await?;
        let body = parse_response(resp).await?;

        let session_id = body["sessionId"]
            .as_str()
            .ok_or_else(|| GradeError::WebDriver {
                error: "session not created".to_string(),
                message: format!("no sessionId in {}", body),
            })?
            .to_string();

        info!("Browser session {} started", session_id);

        let session = Self {
            client,
            session_url: format!("{}/session/{}", driver_url, session_id),
            detach: config.detach,
            closed: false,
        };

        session
            .command(
                Method::POST,
                "/timeouts",
                Some(json!({ "implicit": config.implicit_wait_ms })),
            )
            .await?;

        Ok(session)
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> GradeResult<Value> {
        let url = format!("{}{}", self.session_url, path);
        debug!("WebDriver {} {}", method, path);

        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let resp = request.send().await?;
        parse_response(resp).await
    }

    fn element_path(element: &ElementRef, suffix: &str) -> String {
        format!("/element/{}{}", element.id(), suffix)
    }
}

#[async_trait]
impl Browser for WebDriverSession {
    async fn goto(&mut self, url: &str) -> GradeResult<()> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    async fn refresh(&mut self) -> GradeResult<()> {
        self.command(Method::POST, "/refresh", Some(json!({})))
            .await?;
        Ok(())
    }

    async fn find_all(
        &mut self,
        scope: Option<&ElementRef>,
        locator: &Locator,
    ) -> GradeResult<Vec<ElementRef>> {
        let path = match scope {
            Some(parent) => Self::element_path(parent, "/elements"),
            None => "/elements".to_string(),
        };
        let value = self
            .command(
                Method::POST,
                &path,
                Some(json!({ "using": "css selector", "value": locator.to_css() })),
            )
            .await?;

        Ok(parse_elements(&value))
    }

    async fn click(&mut self, element: &ElementRef) -> GradeResult<()> {
        self.command(
            Method::POST,
            &Self::element_path(element, "/click"),
            Some(json!({})),
        )
        .await?;
        Ok(())
    }

    async fn send_keys(&mut self, element: &ElementRef, text: &str) -> GradeResult<()> {
        self.command(
            Method::POST,
            &Self::element_path(element, "/value"),
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    async fn attribute(
        &mut self,
        element: &ElementRef,
        name: &str,
    ) -> GradeResult<Option<String>> {
        // Properties reflect live state (typed values, toggled readonly);
        // fall back to the markup attribute when there is no such property.
        let property = self
            .command(
                Method::GET,
                &Self::element_path(element, &format!("/property/{}", property_name(name))),
                None,
            )
            .await?;
        if !property.is_null() {
            return Ok(value_to_attribute(&property));
        }

        let attribute = self
            .command(
                Method::GET,
                &Self::element_path(element, &format!("/attribute/{}", name)),
                None,
            )
            .await?;
        Ok(value_to_attribute(&attribute))
    }

    async fn quit(&mut self) -> GradeResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if self.detach {
            info!("- leaving browser open");
            return Ok(());
        }
        self.command(Method::DELETE, "", None).await?;
        info!("- browser stopped.");
        Ok(())
    }
}

/// Unwrap the `value` member of a WebDriver response, mapping protocol errors
async fn parse_response(resp: reqwest::Response) -> GradeResult<Value> {
    let status = resp.status();
    let body: Value = resp.json().await?;
    let value = body.get("value").cloned().unwrap_or(Value::Null);

    if status.is_success() {
        return Ok(value);
    }

    let error = value["error"].as_str().unwrap_or("unknown error").to_string();
    let message = value["message"].as_str().unwrap_or_default().to_string();
    if error == "no such element" {
        return Err(GradeError::NoSuchElement(message));
    }
    Err(GradeError::WebDriver { error, message })
}

fn parse_elements(value: &Value) -> Vec<ElementRef> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item[ELEMENT_KEY].as_str())
                .map(|id| ElementRef(id.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

/// DOM property that carries the live state of an HTML attribute
fn property_name(attribute: &str) -> &str {
    match attribute {
        "readonly" => "readOnly",
        "class" => "className",
        "for" => "htmlFor",
        other => other,
    }
}

fn value_to_attribute(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::Bool(true) => Some("true".to_string()),
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Find a free local port
fn find_free_port() -> GradeResult<u16> {
    use std::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// Configuration for the WebDriver process and browser session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Path or name of the chromedriver binary
    pub binary: String,

    /// Port to run the driver on (None = find free port)
    pub port: Option<u16>,

    pub startup_timeout_ms: u64,

    pub headless: bool,

    /// Keep the browser window alive after the session ends
    pub detach: bool,

    /// How long element lookups keep retrying
    pub implicit_wait_ms: u64,

    /// Extra Chrome command-line switches
    pub browser_args: Vec<String>,
}

impl DriverConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    /// New-session capabilities payload
    pub fn capabilities(&self) -> Value {
        let mut args = self.browser_args.clone();
        if self.headless {
            args.push("--headless=new".to_string());
        }

        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": {
                        "args": args,
                        "detach": self.detach,
                    }
                }
            }
        })
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            binary: "chromedriver".to_string(),
            port: None,
            startup_timeout_ms: 10_000,
            headless: true,
            detach: false,
            implicit_wait_ms: 500,
            browser_args: vec!["--window-size=1280,720".to_string()],
        }
    }
}
