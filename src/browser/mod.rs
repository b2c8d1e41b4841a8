//! Browser capability interface used by the capture engine.
//!
//! The engine only talks to [`BrowserSession`]; which browser binary backs
//! it is decided once by the caller (see [`selection`]) and handed to a
//! [`BrowserLauncher`].

pub mod chromium;
#[cfg(test)]
pub mod fake;
pub mod selection;

use async_trait::async_trait;
use serde_json::Value;

use crate::geometry::WindowSize;

pub use selection::{BrowserChoice, BrowserKind, BrowserPreference};

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub window: WindowSize,
    pub extra_args: Vec<String>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            window: WindowSize::new(1920, 1080),
            extra_args: Vec::new(),
        }
    }
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> anyhow::Result<Box<dyn BrowserSession>>;
}

/// One live browser tab.
#[async_trait]
pub trait BrowserSession: Send {
    /// Blocks requests whose URL matches any of the glob `patterns`.
    async fn block_urls(&mut self, patterns: &[String]) -> anyhow::Result<()>;

    async fn navigate(&mut self, url: &str) -> anyhow::Result<()>;

    /// Calls the JavaScript function declaration `function` with `args` and
    /// returns its (awaited) result by value. `undefined` maps to `Null`.
    async fn execute_script(&mut self, function: &str, args: &[Value]) -> anyhow::Result<Value>;

    /// Dispatches a native mouse click at viewport coordinates.
    async fn click_at(&mut self, x: f64, y: f64) -> anyhow::Result<()>;

    /// PNG of the current viewport.
    async fn screenshot(&mut self) -> anyhow::Result<Vec<u8>>;

    async fn window_size(&mut self) -> anyhow::Result<WindowSize>;

    async fn resize(&mut self, size: WindowSize) -> anyhow::Result<()>;

    async fn quit(self: Box<Self>) -> anyhow::Result<()>;
}
