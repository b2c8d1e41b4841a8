use anyhow::Context as _;

/// Used when `RUST_LOG` is unset. The CDP client logs every unknown event
/// at info level, so it is held back to warnings.
const DEFAULT_FILTER: &str = "info,chromiumoxide=warn,tungstenite=warn,hyper=warn";

pub fn init() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(DEFAULT_FILTER))
        .context("build log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    tracing::debug!("logging initialised");
    Ok(())
}
