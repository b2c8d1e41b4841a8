//! Chapter Capture Engine: one browser session per chapter, pages captured
//! strictly in order until the reader stops advancing.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;

use crate::browser::{BrowserLauncher, BrowserSession, LaunchOptions};
use crate::error::CaptureError;
use crate::geometry::ViewportPolicy;
use crate::pacing::Pacer;
use crate::wait::{self, Patience};
use crate::{navigation, page_capture};

pub const DEFAULT_IMAGE_ID: &str = "mangaFile";

pub const DEFAULT_BLOCKED_URLS: &[&str] = &[
    "*doubleclick.net*",
    "*googleadservices.com*",
    "*googlesyndication.com*",
    "*adservice.google.com*",
    "*sitemaji.com*",
    "*exdynsrv.com*",
    "*google-analytics.com*",
    "*googletagmanager.com*",
];

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// DOM id of the page image.
    pub image_id: String,
    /// CSS pixels subtracted from the image's top edge before cropping.
    pub vertical_offset: f64,
    /// Network-layer URL globs blocked for the whole session.
    pub blocked_urls: Vec<String>,
    /// Hard ceiling on pages per chapter.
    pub max_pages: u32,
    pub launch: LaunchOptions,
    pub viewport: ViewportPolicy,

    pub element_wait: Patience,
    pub clickable_wait: Patience,

    pub isolation_fallback_settle: Duration,
    pub isolation_settle: Duration,
    pub resize_settle: Duration,
    pub link_scroll_settle: Duration,
    pub navigation_settle: Duration,
    pub page_pause: Duration,
    pub long_pause_every: u32,
    pub long_pause: Duration,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        let poll = Duration::from_millis(500);
        Self {
            image_id: DEFAULT_IMAGE_ID.to_owned(),
            vertical_offset: 0.0,
            blocked_urls: DEFAULT_BLOCKED_URLS
                .iter()
                .map(|url| (*url).to_owned())
                .collect(),
            max_pages: 1000,
            launch: LaunchOptions::default(),
            viewport: ViewportPolicy::default(),
            element_wait: Patience::new(Duration::from_secs(60), poll),
            clickable_wait: Patience::new(Duration::from_secs(10), poll),
            isolation_fallback_settle: Duration::from_millis(500),
            isolation_settle: Duration::from_millis(1500),
            resize_settle: Duration::from_secs(2),
            link_scroll_settle: Duration::from_millis(200),
            navigation_settle: Duration::from_millis(500),
            page_pause: Duration::from_secs(1),
            long_pause_every: 30,
            long_pause: Duration::from_secs(10),
        }
    }
}

/// How one engine invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterOutcome {
    /// The reader stopped advancing (or the page ceiling was hit) after
    /// `pages` pages were saved.
    Done { pages: u32, truncated: bool },
    /// Capturing `page` failed; earlier pages stay on disk.
    Aborted { page: u32 },
    /// The session never reached the first page.
    Failed,
}

impl ChapterOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ChapterOutcome::Done { .. })
    }
}

/// What the task runner needs from a chapter capture.
#[async_trait]
pub trait ChapterCapturer: Send + Sync {
    /// Captures every page of the chapter at `url` into `output_dir` as
    /// `1.png`, `2.png`, ... and reports whether the chapter completed.
    async fn capture_chapter(&self, url: &str, output_dir: &Path) -> bool;
}

pub struct ChapterCaptureEngine {
    launcher: Arc<dyn BrowserLauncher>,
    pacer: Arc<dyn Pacer>,
    settings: CaptureSettings,
}

impl ChapterCaptureEngine {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        pacer: Arc<dyn Pacer>,
        settings: CaptureSettings,
    ) -> Self {
        Self {
            launcher,
            pacer,
            settings,
        }
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    pub async fn capture(&self, url: &str, output_dir: &Path) -> ChapterOutcome {
        if let Err(err) = tokio::fs::create_dir_all(output_dir)
            .await
            .with_context(|| format!("create {}", output_dir.display()))
        {
            tracing::error!("{err:#}");
            return ChapterOutcome::Failed;
        }

        let mut session = match self.launcher.launch(&self.settings.launch).await {
            Ok(session) => session,
            Err(err) => {
                tracing::error!("browser launch failed: {err:#}");
                return ChapterOutcome::Failed;
            }
        };

        let outcome = self.page_loop(session.as_mut(), url, output_dir).await;

        if let Err(err) = session.quit().await {
            tracing::warn!("closing browser failed: {err:#}");
        } else {
            tracing::info!("browser closed");
        }

        match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(url, "chapter capture failed: {err}");
                ChapterOutcome::Failed
            }
        }
    }

    async fn page_loop(
        &self,
        session: &mut dyn BrowserSession,
        url: &str,
        output_dir: &Path,
    ) -> Result<ChapterOutcome, CaptureError> {
        let settings = &self.settings;
        let pacer = self.pacer.as_ref();

        if !settings.blocked_urls.is_empty() {
            tracing::info!(patterns = settings.blocked_urls.len(), "blocking ad/tracker urls");
            session.block_urls(&settings.blocked_urls).await?;
        }

        tracing::info!(url, "opening chapter");
        session.navigate(url).await?;
        if !wait::until_body_present(session, pacer, settings.element_wait).await {
            return Err(CaptureError::NavigationTimeout {
                stage: "initial page body",
            });
        }
        tracing::info!(output = %output_dir.display(), "chapter page loaded");

        if settings.max_pages == 0 {
            tracing::warn!("page ceiling is zero; nothing captured");
            return Ok(ChapterOutcome::Done {
                pages: 0,
                truncated: true,
            });
        }

        let mut page = 1;
        loop {
            tracing::info!(page, "capturing page");
            let saved: PathBuf =
                match page_capture::capture_page(session, pacer, settings, output_dir, page).await
                {
                    Ok(saved) => saved,
                    Err(err) => {
                        tracing::warn!(page, "page capture failed, stopping chapter: {err}");
                        return Ok(ChapterOutcome::Aborted { page });
                    }
                };
            tracing::debug!(page, path = %saved.display(), "page saved");

            pacer.pause(settings.page_pause).await;

            if !navigation::advance(session, pacer, settings).await {
                tracing::info!(pages = page, "reader did not advance; chapter finished");
                return Ok(ChapterOutcome::Done {
                    pages: page,
                    truncated: false,
                });
            }

            page += 1;

            if settings.long_pause_every > 0 && page % settings.long_pause_every == 0 {
                tracing::info!(page, pause_secs = settings.long_pause.as_secs(), "periodic cooldown");
                pacer.pause(settings.long_pause).await;
            }

            if page > settings.max_pages {
                tracing::warn!(
                    max_pages = settings.max_pages,
                    "page ceiling reached; chapter truncated"
                );
                return Ok(ChapterOutcome::Done {
                    pages: settings.max_pages,
                    truncated: true,
                });
            }
        }
    }
}

#[async_trait]
impl ChapterCapturer for ChapterCaptureEngine {
    async fn capture_chapter(&self, url: &str, output_dir: &Path) -> bool {
        self.capture(url, output_dir).await.is_success()
    }
}
