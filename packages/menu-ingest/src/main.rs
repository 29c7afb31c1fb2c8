// Command-line entry point for a menu ingest run

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use menu_ingest::fetch::FetcherExt;
use menu_ingest::traits::Renderer;
use menu_ingest::{
    FallbackRenderer, Fetcher, HttpFetcher, IngestConfig, Reconciler, RemoteRenderer, StrapiStore,
};

#[derive(Parser, Debug)]
#[command(name = "menu-ingest", about = "Ingest partner menus into the product catalogue")]
struct Cli {
    /// Source id to ingest, or "all"
    #[arg(value_name = "SOURCE")]
    source: Option<String>,

    /// Alias for the positional SOURCE
    #[arg(long = "source", value_name = "SOURCE", conflicts_with = "source")]
    source_flag: Option<String>,
}

impl Cli {
    /// Selected source id; `None` means every active source.
    fn selected_source(&self) -> Option<String> {
        self.source
            .as_ref()
            .or(self.source_flag.as_ref())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("all"))
    }
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,menu_ingest=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run(Cli::parse()).await {
        error!(error = %format!("{:#}", e), "Ingest run failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = IngestConfig::from_env().context("Failed to load configuration")?;
    if let Some(id) = cli.selected_source() {
        config = config.with_only_source(id);
    }

    let store = StrapiStore::new(&config.store).context("Failed to create store client")?;
    let renderer = build_renderer(&config)?;
    let http = HttpFetcher::new(&config.fetch, &config.render)
        .context("Failed to create HTTP fetcher")?
        .with_renderer(renderer);

    let fetcher: Arc<dyn Fetcher> = match config.fetch.rate_limit_per_sec {
        Some(rps) => {
            info!(requests_per_second = rps, "Rate limiting page fetches");
            Arc::new(http.rate_limited(rps))
        }
        None => Arc::new(http),
    };

    let reconciler = Reconciler::new(store, fetcher, &config);
    let report = reconciler
        .run_all(config.only_source_id.as_deref(), config.concurrency)
        .await
        .context("Ingest run failed")?;

    info!(
        sources = report.sources.len(),
        upserted = report.total_upserted(),
        deleted = report.total_deleted(),
        "Done"
    );
    Ok(())
}

/// Local headless browser first (when compiled in), then the remote service.
fn build_renderer(config: &IngestConfig) -> Result<Arc<dyn Renderer>> {
    let remote: Option<Arc<dyn Renderer>> = RemoteRenderer::from_config(&config.render)
        .context("Invalid RENDER_HTTP_URL")?
        .map(|r| Arc::new(r) as Arc<dyn Renderer>);

    #[cfg(feature = "headless")]
    let local: Option<Arc<dyn Renderer>> =
        Some(Arc::new(menu_ingest::fetch::HeadlessRenderer::new()));
    #[cfg(not(feature = "headless"))]
    let local: Option<Arc<dyn Renderer>> = None;

    Ok(Arc::new(FallbackRenderer::new(local, remote)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_selection() {
        let cli = Cli::parse_from(["menu-ingest", "12"]);
        assert_eq!(cli.selected_source().as_deref(), Some("12"));

        let cli = Cli::parse_from(["menu-ingest", "--source", "7"]);
        assert_eq!(cli.selected_source().as_deref(), Some("7"));

        let cli = Cli::parse_from(["menu-ingest", "all"]);
        assert!(cli.selected_source().is_none());

        let cli = Cli::parse_from(["menu-ingest"]);
        assert!(cli.selected_source().is_none());
    }
}
