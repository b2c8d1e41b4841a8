//! [`BrowserSession`] over the Chrome DevTools Protocol. Works for both
//! Chrome and Edge since both are Chromium builds.

use anyhow::Context as _;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{EnableParams, SetBlockedUrLsParams};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::layout::Point;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt as _;
use serde_json::Value;
use tokio::task::JoinHandle;

use super::{BrowserChoice, BrowserLauncher, BrowserSession, LaunchOptions};
use crate::geometry::WindowSize;

pub struct ChromiumLauncher {
    choice: BrowserChoice,
}

impl ChromiumLauncher {
    pub fn new(choice: BrowserChoice) -> Self {
        Self { choice }
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, options: &LaunchOptions) -> anyhow::Result<Box<dyn BrowserSession>> {
        tracing::info!(
            browser = %self.choice.kind,
            headless = options.headless,
            "launching browser"
        );

        let mut builder = BrowserConfig::builder()
            .chrome_executable(&self.choice.executable)
            .window_size(options.window.width, options.window.height)
            .viewport(None)
            .no_sandbox()
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--force-device-scale-factor=1")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--hide-scrollbars");
        if options.headless {
            builder = builder.new_headless_mode();
        } else {
            builder = builder.with_head();
        }
        for arg in &options.extra_args {
            builder = builder.arg(arg);
        }
        let config = builder
            .build()
            .map_err(|err| anyhow::anyhow!("build browser config: {err}"))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .with_context(|| format!("launch {}", self.choice.executable.display()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    tracing::debug!(%err, "browser handler error");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(err) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler_task.abort();
                return Err(err).context("open browser tab");
            }
        };

        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler_task,
            window: options.window,
        }))
    }
}

pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    window: WindowSize,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn block_urls(&mut self, patterns: &[String]) -> anyhow::Result<()> {
        self.page
            .execute(EnableParams::default())
            .await
            .context("enable network domain")?;
        self.page
            .execute(SetBlockedUrLsParams::new(patterns.to_vec()))
            .await
            .context("set blocked urls")?;
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> anyhow::Result<()> {
        self.page
            .goto(url)
            .await
            .with_context(|| format!("navigate to {url}"))?;
        Ok(())
    }

    async fn execute_script(&mut self, function: &str, args: &[Value]) -> anyhow::Result<Value> {
        let args = serde_json::to_string(args).context("serialize script arguments")?;
        let params = EvaluateParams::builder()
            .expression(format!("({function})(...{args})"))
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(|err| anyhow::anyhow!("build evaluate params: {err}"))?;

        let result = self
            .page
            .evaluate_expression(params)
            .await
            .context("evaluate script")?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn click_at(&mut self, x: f64, y: f64) -> anyhow::Result<()> {
        self.page
            .click(Point { x, y })
            .await
            .with_context(|| format!("click at ({x}, {y})"))?;
        Ok(())
    }

    async fn screenshot(&mut self) -> anyhow::Result<Vec<u8>> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        self.page.screenshot(params).await.context("capture screenshot")
    }

    async fn window_size(&mut self) -> anyhow::Result<WindowSize> {
        Ok(self.window)
    }

    async fn resize(&mut self, size: WindowSize) -> anyhow::Result<()> {
        let params = SetDeviceMetricsOverrideParams::new(
            i64::from(size.width),
            i64::from(size.height),
            0.0,
            false,
        );
        self.page
            .execute(params)
            .await
            .with_context(|| format!("resize viewport to {}x{}", size.width, size.height))?;
        self.window = size;
        Ok(())
    }

    async fn quit(mut self: Box<Self>) -> anyhow::Result<()> {
        let closed = self.browser.close().await.context("close browser");
        if let Err(err) = self.browser.wait().await {
            tracing::debug!(%err, "wait for browser process");
        }
        self.handler_task.abort();
        closed.map(|_| ())
    }
}
