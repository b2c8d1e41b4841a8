use clap::{Args, Parser, Subcommand};

use crate::browser::BrowserPreference;
use crate::engine::{DEFAULT_BLOCKED_URLS, DEFAULT_IMAGE_ID};
use crate::ledger::DEFAULT_GROUP_ORDER;
use crate::metadata::{bangumi, manhuagui, wikipedia};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Find a title, write its chapter ledger, then capture every chapter.
    Download(DownloadArgs),
    /// Capture the pending chapters of an existing ledger.
    Run(RunArgs),
    /// Capture a single chapter into a directory of numbered PNGs.
    Capture(CaptureArgs),
    /// Assemble numbered PNG pages into one PDF.
    Pdf(PdfArgs),
    /// Find a title and write its chapter ledger without capturing.
    Search(SearchArgs),
}

#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// Title to search for.
    #[arg(long)]
    pub title: String,

    /// Base output directory; the title gets its own directory below it.
    #[arg(long)]
    pub out: String,

    #[command(flatten)]
    pub metadata: MetadataOptions,

    #[command(flatten)]
    pub browser: BrowserArgs,

    #[command(flatten)]
    pub capture: CaptureOptions,

    #[command(flatten)]
    pub runner: RunnerOptions,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Ledger file (`chapters_manhuagui.json`) to process and update.
    #[arg(long)]
    pub ledger: String,

    #[command(flatten)]
    pub browser: BrowserArgs,

    #[command(flatten)]
    pub capture: CaptureOptions,

    #[command(flatten)]
    pub runner: RunnerOptions,
}

#[derive(Debug, Args)]
pub struct CaptureArgs {
    /// First page of the chapter.
    #[arg(long)]
    pub url: String,

    /// Output directory for `1.png`, `2.png`, ...
    #[arg(long)]
    pub out: String,

    #[command(flatten)]
    pub browser: BrowserArgs,

    #[command(flatten)]
    pub capture: CaptureOptions,
}

#[derive(Debug, Args)]
pub struct PdfArgs {
    /// Directory of numbered PNG pages.
    #[arg(long)]
    pub images: String,

    /// Output file path for the PDF.
    #[arg(long)]
    pub out: String,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Title to search for.
    #[arg(long)]
    pub title: String,

    /// Base output directory; the title gets its own directory below it.
    #[arg(long)]
    pub out: String,

    #[command(flatten)]
    pub metadata: MetadataOptions,
}

#[derive(Debug, Clone, Args)]
pub struct MetadataOptions {
    /// Chapter site root used for search and detail pages.
    #[arg(long, default_value = manhuagui::BASE_URL)]
    pub base_url: String,

    /// Bangumi site root.
    #[arg(long, default_value = bangumi::BASE_URL)]
    pub bangumi_url: String,

    /// MediaWiki API endpoint; articles are read from the same host.
    #[arg(long, default_value = wikipedia::API_URL)]
    pub wikipedia_api_url: String,

    /// Skip Bangumi and Wikipedia; only the chapter site is consulted.
    #[arg(long)]
    pub chapter_site_only: bool,
}

#[derive(Debug, Clone, Args)]
pub struct BrowserArgs {
    /// Browser to drive. `auto` asks when both Chrome and Edge are installed.
    #[arg(long, value_enum, default_value_t = BrowserPreference::Auto)]
    pub browser: BrowserPreference,

    /// Show the browser window (debugging).
    #[arg(long)]
    pub headful: bool,
}

#[derive(Debug, Clone, Args)]
pub struct CaptureOptions {
    /// DOM id of the page image.
    #[arg(long, default_value = DEFAULT_IMAGE_ID)]
    pub image_id: String,

    /// CSS pixels trimmed above the image when cropping.
    #[arg(long, default_value_t = 0.0)]
    pub vertical_offset: f64,

    /// URL glob blocked at the network layer (repeatable). Replaces the
    /// default ad/tracker list when given.
    #[arg(long = "block-url", default_values_t = DEFAULT_BLOCKED_URLS.iter().map(|url| url.to_string()))]
    pub block_urls: Vec<String>,

    /// Maximum pages captured per chapter.
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_pages: u32,
}

#[derive(Debug, Clone, Args)]
pub struct RunnerOptions {
    /// Capture attempts per chapter.
    #[arg(long, default_value_t = 3)]
    pub max_attempts: u32,

    /// Group processed first (repeatable, in order). Remaining groups follow
    /// in ledger order.
    #[arg(long = "group-order", default_values_t = DEFAULT_GROUP_ORDER.iter().map(|group| group.to_string()))]
    pub group_order: Vec<String>,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_defaults() {
        let cli = Cli::try_parse_from(["comic-capture", "run", "--ledger", "l.json"]).unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.capture.image_id, "mangaFile");
        assert_eq!(args.capture.block_urls.len(), 8);
        assert_eq!(args.capture.max_pages, 1000);
        assert_eq!(args.runner.max_attempts, 3);
        assert_eq!(args.runner.group_order, vec!["番外篇", "单行本", "单话"]);
        assert_eq!(args.browser.browser, BrowserPreference::Auto);
        assert!(!args.browser.headful);
    }

    #[test]
    fn repeated_flags_replace_defaults() {
        let cli = Cli::try_parse_from([
            "comic-capture",
            "capture",
            "--url",
            "https://example.com/1.html",
            "--out",
            "out",
            "--block-url",
            "*ads*",
            "--block-url",
            "*track*",
            "--browser",
            "edge",
            "--vertical-offset",
            "12.5",
        ])
        .unwrap();
        let Command::Capture(args) = cli.command else {
            panic!("expected capture");
        };
        assert_eq!(args.capture.block_urls, vec!["*ads*", "*track*"]);
        assert_eq!(args.capture.vertical_offset, 12.5);
        assert_eq!(args.browser.browser, BrowserPreference::Edge);
    }

    #[test]
    fn zero_page_ceiling_is_rejected() {
        let result = Cli::try_parse_from([
            "comic-capture",
            "capture",
            "--url",
            "https://example.com/1.html",
            "--out",
            "out",
            "--max-pages",
            "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn metadata_sources_default_to_public_sites() {
        let cli = Cli::try_parse_from(["comic-capture", "search", "--title", "x", "--out", "o"])
            .unwrap();
        let Command::Search(args) = cli.command else {
            panic!("expected search");
        };
        assert_eq!(args.metadata.base_url, manhuagui::BASE_URL);
        assert_eq!(args.metadata.bangumi_url, "https://bangumi.tv");
        assert_eq!(args.metadata.wikipedia_api_url, "https://zh.wikipedia.org/w/api.php");
        assert!(!args.metadata.chapter_site_only);
    }
}
