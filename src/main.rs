use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

use comic_capture::cli::{Cli, Command};
use comic_capture::commands;

#[tokio::main]
async fn main() -> ExitCode {
    match try_main().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn try_main() -> anyhow::Result<bool> {
    comic_capture::logging::init().context("init logging")?;

    let cli = Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    // Ledger writes are atomic, so stopping between awaits never leaves a
    // half-written ledger behind.
    tokio::select! {
        result = dispatch(cli.command) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted; completed chapters are already recorded");
            Ok(false)
        }
    }
}

async fn dispatch(command: Command) -> anyhow::Result<bool> {
    match command {
        Command::Download(args) => commands::download(args).await.context("download"),
        Command::Run(args) => commands::run(args).await.context("run"),
        Command::Capture(args) => commands::capture(args).await.context("capture"),
        Command::Pdf(args) => commands::pdf(args).await.context("pdf"),
        Command::Search(args) => commands::search(args).await.context("search"),
    }
}
