use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use thiserror::Error;
use tokio_retry::Retry;
use tokio_retry::strategy::FixedInterval;
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::progress::ProgressSink;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Script evaluation failed: {0}")]
    Evaluation(String),

    #[error("Session unreachable: {0}")]
    Unreachable(String),
}

impl SessionError {
    /// Whether the session can be assumed dead. Evaluation failures are
    /// transient and a later pass may succeed; everything else means the
    /// browser or page is gone.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SessionError::Evaluation(_))
    }
}

/// Scroll-driven session surface the acquisition loop consumes.
///
/// All methods are called from one driving flow and awaited strictly
/// sequentially; implementations never see two operations in flight.
#[async_trait]
pub trait ScrollSession: Send + Sync {
    /// Snapshot of the currently rendered document. Visible cards are
    /// selected out of this snapshot by the extractor.
    async fn page_html(&self) -> Result<String, SessionError>;

    /// Scrollable content extent (document scroll height).
    async fn content_height(&self) -> Result<i64, SessionError>;

    /// Advances the viewport by a fraction of its own height.
    async fn scroll_by_viewport(&self, fraction: f64) -> Result<(), SessionError>;

    async fn scroll_to_bottom(&self) -> Result<(), SessionError>;

    /// Lets asynchronous rendering catch up before the next measurement.
    async fn settle(&self, wait: Duration);
}

/// Live session over a locally launched Chrome.
pub struct ChromeSession {
    // Keeps the browser process alive for the lifetime of the session
    _browser: Browser,
    tab: Arc<Tab>,
    config: SessionConfig,
}

impl ChromeSession {
    pub fn launch(config: &SessionConfig) -> Result<Self, SessionError> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .sandbox(false) // Often needed in containerized environments
            .args(vec![
                OsStr::new("--no-sandbox"),
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--disable-gpu"),
                OsStr::new("--disable-extensions"),
                OsStr::new("--disable-background-timer-throttling"),
            ])
            .build()
            .map_err(|e| SessionError::Launch(format!("launch options: {}", e)))?;

        launch_options.window_size = Some((config.window_width, config.window_height));
        if let Some(chrome_path) = &config.chrome_path {
            launch_options.path = Some(PathBuf::from(chrome_path));
        }

        let browser =
            Browser::new(launch_options).map_err(|e| SessionError::Launch(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| SessionError::Launch(format!("tab: {}", e)))?;

        if let Some(user_agent) = &config.user_agent {
            tab.set_user_agent(user_agent, None, None)
                .map_err(|e| SessionError::Launch(format!("user agent: {}", e)))?;
        }

        info!("Browser session ready (headless: {})", config.headless);
        Ok(Self {
            _browser: browser,
            tab,
            config: config.clone(),
        })
    }

    /// Navigates with fixed-interval retry, then waits for the initial load.
    pub async fn open(&self, url: &str) -> Result<(), SessionError> {
        let strategy = FixedInterval::from_millis(self.config.nav_retry_delay_ms)
            .take(self.config.nav_retry_attempts as usize);

        Retry::spawn(strategy, || {
            let attempt = self.try_open(url);
            async move { attempt }
        })
        .await?;

        info!("Opened {}", url);
        Ok(())
    }

    fn try_open(&self, url: &str) -> Result<(), SessionError> {
        self.tab
            .navigate_to(url)
            .map_err(|e| SessionError::Navigation(format!("{}: {}", url, e)))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| SessionError::Navigation(format!("{}: {}", url, e)))?;
        Ok(())
    }

    /// Injects a start button into the page and polls until the operator
    /// clicks it. The button is re-created after navigations, so the
    /// operator can move around the site freely first. Returns `false` when
    /// cancelled before the click.
    pub async fn wait_for_start_signal(&self, cancel: &AtomicBool) -> Result<bool, SessionError> {
        info!("Waiting for the in-page start button (navigate and filter freely, then click it)");
        loop {
            if cancel.load(Ordering::Relaxed) {
                let _ = self.eval(START_CLEANUP_JS);
                return Ok(false);
            }
            if let Err(e) = self.eval(START_BUTTON_JS) {
                debug!("Start button injection failed: {}", e);
            }
            match self.eval(START_READY_JS) {
                Ok(value) => {
                    if value.and_then(|v| v.as_bool()).unwrap_or(false) {
                        let _ = self.eval(START_CLEANUP_JS);
                        info!("Start signal received");
                        return Ok(true);
                    }
                }
                Err(e) => debug!("Start poll failed: {}", e),
            }
            tokio::time::sleep(Duration::from_millis(self.config.start_poll_ms)).await;
        }
    }

    pub fn tab(&self) -> Arc<Tab> {
        self.tab.clone()
    }

    fn eval(&self, expression: &str) -> Result<Option<Value>, SessionError> {
        eval_on(&self.tab, expression)
    }
}

#[async_trait]
impl ScrollSession for ChromeSession {
    async fn page_html(&self) -> Result<String, SessionError> {
        self.tab
            .get_content()
            .map_err(|e| SessionError::Evaluation(format!("content snapshot: {}", e)))
    }

    async fn content_height(&self) -> Result<i64, SessionError> {
        let value = self.eval("document.body.scrollHeight")?;
        value
            .and_then(|v| v.as_i64())
            .ok_or_else(|| SessionError::Evaluation("scrollHeight was not a number".to_string()))
    }

    async fn scroll_by_viewport(&self, fraction: f64) -> Result<(), SessionError> {
        self.eval(&format!(
            "window.scrollBy(0, window.innerHeight * {})",
            fraction
        ))?;
        Ok(())
    }

    async fn scroll_to_bottom(&self) -> Result<(), SessionError> {
        self.eval("window.scrollTo(0, document.body.scrollHeight)")?;
        Ok(())
    }

    async fn settle(&self, wait: Duration) {
        tokio::time::sleep(wait).await;
    }
}

fn eval_on(tab: &Tab, expression: &str) -> Result<Option<Value>, SessionError> {
    let object = tab
        .evaluate(expression, false)
        .map_err(|e| SessionError::Evaluation(e.to_string()))?;
    Ok(object.value)
}

/// Progress overlay hosted in the live page. Every failure here is swallowed
/// after a debug log; progress display must never affect the run.
pub struct PageProgressSink {
    tab: Arc<Tab>,
    created: AtomicBool,
}

impl PageProgressSink {
    pub fn new(tab: Arc<Tab>) -> Self {
        Self {
            tab,
            created: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ProgressSink for PageProgressSink {
    async fn on_progress(&self, percent: u8, label: &str) {
        if !self.created.swap(true, Ordering::Relaxed) {
            if let Err(e) = eval_on(&self.tab, OVERLAY_CREATE_JS) {
                debug!("Progress overlay creation failed: {}", e);
            }
        }
        if let Err(e) = eval_on(&self.tab, &overlay_update_js(percent, label)) {
            debug!("Progress overlay update failed: {}", e);
        }
    }

    async fn on_finish(&self, success: bool) {
        if let Err(e) = eval_on(&self.tab, &overlay_finish_js(success)) {
            debug!("Progress overlay finish failed: {}", e);
        }
    }
}

const START_BUTTON_JS: &str = "(() => { \
    if (document.getElementById('harvest-start-btn')) return true; \
    if (!document.body) return false; \
    const btn = document.createElement('button'); \
    btn.id = 'harvest-start-btn'; \
    btn.textContent = 'Start harvest'; \
    btn.style.cssText = 'position:fixed;top:24px;left:50%;transform:translateX(-50%);z-index:2147483647;padding:14px 36px;background:#2563eb;color:#fff;border:0;border-radius:999px;font-size:15px;font-weight:700;cursor:pointer;box-shadow:0 8px 30px rgba(37,99,235,.45);'; \
    btn.onclick = () => { window.__harvestReady = true; btn.disabled = true; btn.textContent = 'Harvesting...'; }; \
    document.body.appendChild(btn); \
    return true; })()";

const START_READY_JS: &str = "window.__harvestReady === true";

const START_CLEANUP_JS: &str = "(() => { \
    const btn = document.getElementById('harvest-start-btn'); \
    if (btn) btn.remove(); \
    return true; })()";

const OVERLAY_CREATE_JS: &str = "(() => { \
    if (document.getElementById('harvest-progress')) return true; \
    if (!document.body) return false; \
    const wrap = document.createElement('div'); \
    wrap.id = 'harvest-progress'; \
    wrap.style.cssText = 'position:fixed;top:20px;right:20px;width:320px;z-index:2147483647;background:rgba(17,24,39,.95);color:#e5e7eb;padding:14px 16px;border-radius:10px;font:13px/1.4 sans-serif;box-shadow:0 10px 40px rgba(0,0,0,.4);'; \
    wrap.innerHTML = '<div id=\"harvest-progress-label\" style=\"margin-bottom:8px;\"></div>' + \
        '<div style=\"background:#374151;border-radius:999px;height:8px;overflow:hidden;\">' + \
        '<div id=\"harvest-progress-bar\" style=\"background:#3b82f6;height:100%;width:0%;transition:width .2s;\"></div></div>' + \
        '<div id=\"harvest-progress-pct\" style=\"margin-top:6px;text-align:right;color:#9ca3af;\">0%</div>'; \
    document.body.appendChild(wrap); \
    return true; })()";

fn overlay_update_js(percent: u8, label: &str) -> String {
    format!(
        "(() => {{ const bar = document.getElementById('harvest-progress-bar'); \
        const lab = document.getElementById('harvest-progress-label'); \
        const pct = document.getElementById('harvest-progress-pct'); \
        if (bar) bar.style.width = '{percent}%'; \
        if (lab) lab.textContent = {label}; \
        if (pct) pct.textContent = '{percent}%'; \
        return true; }})()",
        percent = percent.min(100),
        label = js_string(label)
    )
}

fn overlay_finish_js(success: bool) -> String {
    let color = if success { "#22c55e" } else { "#ef4444" };
    let label = if success { "Report complete" } else { "Report failed" };
    format!(
        "(() => {{ const wrap = document.getElementById('harvest-progress'); \
        if (!wrap) return false; \
        const bar = document.getElementById('harvest-progress-bar'); \
        const lab = document.getElementById('harvest-progress-label'); \
        if (bar) {{ bar.style.width = '100%'; bar.style.background = '{color}'; }} \
        if (lab) lab.textContent = '{label}'; \
        setTimeout(() => {{ wrap.style.transition = 'opacity .5s'; wrap.style.opacity = '0'; \
        setTimeout(() => wrap.remove(), 500); }}, 1500); \
        return true; }})()"
    )
}

// JSON string literal, so labels with quotes or newlines stay valid JS.
fn js_string(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}
