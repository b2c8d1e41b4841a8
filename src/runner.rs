//! Chapter Task Runner: walks a ledger chapter by chapter, capturing,
//! assembling and recording progress after every completed chapter.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;

use crate::engine::ChapterCapturer;
use crate::error::LedgerError;
use crate::ledger::{ChapterEntry, DEFAULT_GROUP_ORDER, Ledger};
use crate::pacing::Pacer;
use crate::pdf::{PdfAssembler, numbered_pages};
use crate::sanitize::sanitize_filename;

#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Groups processed first, in this order; the rest follow in file order.
    pub group_order: Vec<String>,
    /// Capture attempts per chapter.
    pub max_attempts: u32,
    pub retry_cooldown: Duration,
    /// Pause after each fully completed chapter.
    pub chapter_pause: Duration,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            group_order: DEFAULT_GROUP_ORDER
                .iter()
                .map(|group| (*group).to_owned())
                .collect(),
            max_attempts: 3,
            retry_cooldown: Duration::from_secs(5),
            chapter_pause: Duration::from_secs(5),
        }
    }
}

/// Tally of one run. The run succeeded when nothing failed and every
/// completion reached disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: usize,
    pub failed: usize,
    pub already_completed: usize,
    pub invalid: usize,
    pub unsaved: usize,
}

impl RunSummary {
    pub fn success(&self) -> bool {
        self.failed == 0 && self.unsaved == 0
    }
}

pub struct ChapterTaskRunner {
    capturer: Arc<dyn ChapterCapturer>,
    assembler: Arc<dyn PdfAssembler>,
    pacer: Arc<dyn Pacer>,
    settings: RunnerSettings,
}

impl ChapterTaskRunner {
    pub fn new(
        capturer: Arc<dyn ChapterCapturer>,
        assembler: Arc<dyn PdfAssembler>,
        pacer: Arc<dyn Pacer>,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            capturer,
            assembler,
            pacer,
            settings,
        }
    }

    /// Loads the ledger at `path` and processes it. Only a ledger that
    /// cannot be read is an error; chapter failures show up in the summary.
    pub async fn run(&self, path: &Path) -> Result<RunSummary, LedgerError> {
        let mut ledger = Ledger::load(path).await?;
        tracing::info!(ledger = %path.display(), root = %ledger.root_dir().display(), "ledger loaded");
        Ok(self.run_ledger(&mut ledger).await)
    }

    pub async fn run_ledger(&self, ledger: &mut Ledger) -> RunSummary {
        let mut summary = RunSummary::default();
        let root = ledger.root_dir().to_path_buf();

        let order = ledger.processing_order(self.settings.group_order.as_slice());
        if order.is_empty() {
            tracing::info!("ledger has no chapter groups");
        }

        for group in order {
            let Some(count) = ledger.sort_group(&group) else {
                tracing::warn!(group = %group, "group is not a list; skipping");
                continue;
            };
            if count == 0 {
                tracing::info!(group = %group, "group is empty; skipping");
                continue;
            }
            tracing::info!(group = %group, chapters = count, "processing group");
            let group_dir = root.join(sanitize_filename(&group));

            for index in 0..count {
                let record = ledger.entry(&group, index).and_then(ChapterEntry::record);
                let Some((title, url)) = record.and_then(|r| r.target()) else {
                    tracing::warn!(group = %group, index, "chapter entry lacks a title or url; skipping");
                    summary.invalid += 1;
                    continue;
                };
                if record.is_some_and(|r| r.completed) {
                    tracing::info!(group = %group, chapter = title, "already completed; skipping");
                    summary.already_completed += 1;
                    continue;
                }
                let (title, url) = (title.to_owned(), url.to_owned());

                if !self.process_chapter(&group_dir, &title, &url).await {
                    summary.failed += 1;
                    continue;
                }

                ledger.mark_completed(&group, index);
                summary.completed += 1;
                match ledger.save().await {
                    Ok(()) => tracing::info!(chapter = %title, "ledger updated"),
                    Err(err) => {
                        tracing::error!(chapter = %title, "{:#}", anyhow::Error::from(err));
                        summary.unsaved += 1;
                    }
                }
                self.pacer.pause(self.settings.chapter_pause).await;
            }
        }

        tracing::info!(
            completed = summary.completed,
            failed = summary.failed,
            skipped = summary.already_completed + summary.invalid,
            "run finished"
        );
        summary
    }

    async fn process_chapter(&self, group_dir: &Path, title: &str, url: &str) -> bool {
        let dir_name = sanitize_filename(title);
        let chapter_dir = group_dir.join(&dir_name);
        if let Err(err) = tokio::fs::create_dir_all(&chapter_dir).await {
            tracing::error!(chapter = title, dir = %chapter_dir.display(), "create chapter dir: {err}");
            return false;
        }

        let max_attempts = self.settings.max_attempts.max(1);
        let mut captured = false;
        for attempt in 1..=max_attempts {
            tracing::info!(chapter = title, url, attempt, max_attempts, "capturing chapter");
            if let Err(err) = clear_pages(&chapter_dir).await {
                tracing::error!(chapter = title, "clearing old pages failed: {err:#}");
                return false;
            }
            if self.capturer.capture_chapter(url, &chapter_dir).await {
                captured = true;
                break;
            }
            tracing::warn!(chapter = title, attempt, "capture attempt failed");
            if attempt < max_attempts {
                tracing::info!(
                    retry_in_secs = self.settings.retry_cooldown.as_secs(),
                    "retrying chapter"
                );
                self.pacer.pause(self.settings.retry_cooldown).await;
            }
        }
        if !captured {
            tracing::error!(chapter = title, max_attempts, "giving up on chapter");
            return false;
        }

        let pdf_path = group_dir.join(format!("{dir_name}.pdf"));
        match self.assemble(chapter_dir, pdf_path.clone()).await {
            Ok(pages) => {
                tracing::info!(chapter = title, pages, pdf = %pdf_path.display(), "chapter complete");
                true
            }
            Err(err) => {
                tracing::error!(chapter = title, "pdf assembly failed: {err:#}");
                false
            }
        }
    }

    async fn assemble(&self, images_dir: PathBuf, pdf_path: PathBuf) -> anyhow::Result<usize> {
        let assembler = Arc::clone(&self.assembler);
        tokio::task::spawn_blocking(move || assembler.assemble(&images_dir, &pdf_path))
            .await
            .context("spawn_blocking join")?
    }
}

/// Removes numbered page images left by an earlier attempt or run, so the
/// PDF only ever holds pages from the attempt that succeeded.
async fn clear_pages(dir: &Path) -> anyhow::Result<()> {
    let scan_dir = dir.to_path_buf();
    let stale = tokio::task::spawn_blocking(move || numbered_pages(&scan_dir))
        .await
        .context("spawn_blocking join")??;
    if !stale.is_empty() {
        tracing::debug!(dir = %dir.display(), pages = stale.len(), "removing old pages");
    }
    for (_, path) in stale {
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("remove {}", path.display()))?;
    }
    Ok(())
}
