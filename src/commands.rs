//! Command handlers: turn parsed CLI arguments into settings and wire the
//! capture pipeline together. Each returns whether the work succeeded.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;

use crate::browser::chromium::ChromiumLauncher;
use crate::browser::{BrowserChoice, BrowserLauncher, selection};
use crate::cli::{
    BrowserArgs, CaptureArgs, CaptureOptions, DownloadArgs, MetadataOptions, PdfArgs, RunArgs,
    RunnerOptions, SearchArgs,
};
use crate::engine::{CaptureSettings, ChapterCaptureEngine, ChapterOutcome};
use crate::metadata::bangumi::BangumiClient;
use crate::metadata::manhuagui::ManhuaguiClient;
use crate::metadata::wikipedia::WikipediaClient;
use crate::metadata::{FetchedTitle, MetadataFetcher};
use crate::pacing::{Pacer, TokioPacer};
use crate::pdf::{ImagePdfAssembler, PdfAssembler as _};
use crate::prompt::{LinePrompt, Prompt};
use crate::runner::{ChapterTaskRunner, RunSummary, RunnerSettings};

pub fn capture_settings(options: &CaptureOptions, browser: &BrowserArgs) -> CaptureSettings {
    let mut settings = CaptureSettings {
        image_id: options.image_id.clone(),
        vertical_offset: options.vertical_offset,
        blocked_urls: options.block_urls.clone(),
        max_pages: options.max_pages,
        ..CaptureSettings::default()
    };
    settings.launch.headless = !browser.headful;
    settings
}

pub fn runner_settings(options: &RunnerOptions) -> RunnerSettings {
    RunnerSettings {
        group_order: options.group_order.clone(),
        max_attempts: options.max_attempts,
        ..RunnerSettings::default()
    }
}

pub fn metadata_fetcher(options: &MetadataOptions) -> anyhow::Result<MetadataFetcher> {
    let fetcher = MetadataFetcher::new(
        ManhuaguiClient::new(&options.base_url)?,
        Arc::new(TokioPacer),
    );
    if options.chapter_site_only {
        return Ok(fetcher);
    }
    Ok(fetcher
        .with_source(BangumiClient::new(&options.bangumi_url)?)
        .with_source(WikipediaClient::new(&options.wikipedia_api_url)?))
}

fn resolve_browser(args: &BrowserArgs, prompt: &mut dyn Prompt) -> anyhow::Result<BrowserChoice> {
    let installed = selection::detect_installed();
    selection::resolve(args.browser, installed, prompt).context("select browser")
}

fn engine(choice: BrowserChoice, settings: CaptureSettings) -> ChapterCaptureEngine {
    let launcher: Arc<dyn BrowserLauncher> = Arc::new(ChromiumLauncher::new(choice));
    let pacer: Arc<dyn Pacer> = Arc::new(TokioPacer);
    ChapterCaptureEngine::new(launcher, pacer, settings)
}

fn task_runner(engine: ChapterCaptureEngine, settings: RunnerSettings) -> ChapterTaskRunner {
    ChapterTaskRunner::new(
        Arc::new(engine),
        Arc::new(ImagePdfAssembler),
        Arc::new(TokioPacer),
        settings,
    )
}

async fn run_ledger(runner: &ChapterTaskRunner, ledger: &Path) -> anyhow::Result<RunSummary> {
    let summary = runner
        .run(ledger)
        .await
        .with_context(|| format!("run ledger {}", ledger.display()))?;
    if !summary.success() {
        tracing::error!(
            failed = summary.failed,
            unsaved = summary.unsaved,
            "some chapters did not complete"
        );
    }
    Ok(summary)
}

pub async fn download(args: DownloadArgs) -> anyhow::Result<bool> {
    let mut prompt = LinePrompt::stdio();
    let fetcher = metadata_fetcher(&args.metadata)?;

    // Before any network work, so a missing browser fails fast.
    let choice = resolve_browser(&args.browser, &mut prompt)?;

    let Some(title) = fetch_title(&fetcher, &mut prompt, &args.title, &args.out).await? else {
        return Ok(false);
    };
    tracing::info!(title = %title.confirmed_name, "download: capture chapters");

    let engine = engine(choice, capture_settings(&args.capture, &args.browser));
    let runner = task_runner(engine, runner_settings(&args.runner));
    let summary = run_ledger(&runner, &title.ledger_path).await?;
    Ok(summary.success())
}

pub async fn run(args: RunArgs) -> anyhow::Result<bool> {
    let ledger = PathBuf::from(&args.ledger);
    if !ledger.is_file() {
        anyhow::bail!("ledger not found: {}", ledger.display());
    }

    let mut prompt = LinePrompt::stdio();
    let choice = resolve_browser(&args.browser, &mut prompt)?;
    let engine = engine(choice, capture_settings(&args.capture, &args.browser));
    let runner = task_runner(engine, runner_settings(&args.runner));
    let summary = run_ledger(&runner, &ledger).await?;
    Ok(summary.success())
}

pub async fn capture(args: CaptureArgs) -> anyhow::Result<bool> {
    let mut prompt = LinePrompt::stdio();
    let choice = resolve_browser(&args.browser, &mut prompt)?;
    let engine = engine(choice, capture_settings(&args.capture, &args.browser));

    let out = PathBuf::from(&args.out);
    let outcome = engine.capture(&args.url, &out).await;
    match outcome {
        ChapterOutcome::Done { pages, truncated } => {
            tracing::info!(pages, truncated, out = %out.display(), "capture finished");
        }
        ChapterOutcome::Aborted { page } => {
            tracing::error!(page, "capture aborted");
        }
        ChapterOutcome::Failed => tracing::error!(url = %args.url, "capture failed"),
    }
    Ok(outcome.is_success())
}

pub async fn pdf(args: PdfArgs) -> anyhow::Result<bool> {
    let images = PathBuf::from(&args.images);
    let out = PathBuf::from(&args.out);
    let pages = tokio::task::spawn_blocking(move || ImagePdfAssembler.assemble(&images, &out))
        .await
        .context("spawn_blocking join")??;
    tracing::info!(pages, "pdf assembled");
    Ok(true)
}

pub async fn search(args: SearchArgs) -> anyhow::Result<bool> {
    let mut prompt = LinePrompt::stdio();
    let fetcher = metadata_fetcher(&args.metadata)?;
    let found = fetch_title(&fetcher, &mut prompt, &args.title, &args.out).await?;
    if let Some(title) = &found {
        println!("{}", title.ledger_path.display());
    }
    Ok(found.is_some())
}

async fn fetch_title(
    fetcher: &MetadataFetcher,
    prompt: &mut dyn Prompt,
    query: &str,
    out: &str,
) -> anyhow::Result<Option<FetchedTitle>> {
    let base_dir = PathBuf::from(out);
    tokio::fs::create_dir_all(&base_dir)
        .await
        .with_context(|| format!("create output dir: {}", base_dir.display()))?;

    let found = fetcher
        .get_or_fetch(prompt, query, &base_dir)
        .await
        .context("fetch title metadata")?;
    match &found {
        Some(title) => tracing::info!(
            title = %title.confirmed_name,
            ledger = %title.ledger_path.display(),
            "title ready"
        ),
        None => tracing::warn!(query, "no title selected"),
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use clap::Parser as _;

    use super::*;
    use crate::cli::{Cli, Command};

    #[test]
    fn cli_options_flow_into_settings() {
        let cli = Cli::try_parse_from([
            "comic-capture",
            "run",
            "--ledger",
            "l.json",
            "--headful",
            "--image-id",
            "pageImg",
            "--max-pages",
            "5",
            "--max-attempts",
            "7",
            "--group-order",
            "单话",
        ])
        .unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };

        let capture = capture_settings(&args.capture, &args.browser);
        assert_eq!(capture.image_id, "pageImg");
        assert_eq!(capture.max_pages, 5);
        assert!(!capture.launch.headless);
        assert_eq!(capture.long_pause_every, 30);

        let runner = runner_settings(&args.runner);
        assert_eq!(runner.max_attempts, 7);
        assert_eq!(runner.group_order, vec!["单话"]);
        assert_eq!(runner.retry_cooldown, std::time::Duration::from_secs(5));
    }

    #[test]
    fn metadata_sources_follow_flags() {
        let cli = Cli::try_parse_from(["comic-capture", "search", "--title", "x", "--out", "o"])
            .unwrap();
        let Command::Search(args) = cli.command else {
            panic!("expected search");
        };
        assert_eq!(
            metadata_fetcher(&args.metadata).unwrap().source_names(),
            vec!["bangumi", "wikipedia"]
        );

        let cli = Cli::try_parse_from([
            "comic-capture",
            "search",
            "--title",
            "x",
            "--out",
            "o",
            "--chapter-site-only",
        ])
        .unwrap();
        let Command::Search(args) = cli.command else {
            panic!("expected search");
        };
        assert!(metadata_fetcher(&args.metadata).unwrap().source_names().is_empty());
    }
}
