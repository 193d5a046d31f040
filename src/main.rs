// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use render_agent::app::{create_router, AppState, VERSION};
use render_agent::models::config::AgentConfig;
use render_agent::services::challenge::ChallengeDetector;
use render_agent::services::chrome::ChromeRenderer;
use render_agent::services::local::{LocalFetchConfig, LocalFetchStrategy};
use render_agent::services::logging::redact_url;
use render_agent::services::orchestrator::Fetcher;
use render_agent::services::provider::HttpProvider;
use render_agent::services::robots::{HttpRobotsSource, RobotsGate};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "render-agent", version = VERSION, about = "Rendered-page fetch service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service (default when no subcommand is provided).
    Serve,
    /// Fetch one URL and print its rendered HTML.
    Fetch { url: String },
    /// Render one URL and write a PNG screenshot.
    Screenshot {
        url: String,
        #[arg(long)]
        full_page: bool,
        #[arg(short, long)]
        out: PathBuf,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        // stderr keeps stdout clean for `fetch` output
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

fn build_fetcher(config: &AgentConfig) -> Result<Fetcher> {
    let local_config = LocalFetchConfig::default();
    let renderer = ChromeRenderer::new(config.browser.clone(), local_config.navigation_timeout);
    let local = LocalFetchStrategy::new(
        Arc::new(renderer),
        config.identity.clone(),
        ChallengeDetector::default(),
        local_config,
    );

    let robots = if config.respect_robots {
        let source = HttpRobotsSource::new(&config.identity.user_agent)
            .context("Failed to build robots.txt client")?;
        Some(RobotsGate::new(Arc::new(source)))
    } else {
        None
    };

    let provider = HttpProvider::new(&config.provider).context("Failed to build provider client")?;
    if !provider.is_configured() {
        tracing::warn!("PROVIDER_API_KEY is not set, provider fallback will always fail");
    }

    Ok(Fetcher::new(robots, local, Arc::new(provider)))
}

async fn serve(config: &AgentConfig, fetcher: Fetcher) -> Result<()> {
    let state = AppState {
        fetcher: Arc::new(fetcher),
    };
    let app = create_router(state);

    let addr = format!("{}:{}", config.bind_addr, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!(
        %addr,
        version = VERSION,
        robots = config.respect_robots,
        proxy = ?config.identity.proxy.as_ref().map(|p| redact_url(&p.server)),
        "render-agent listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await
        .context("Server error")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_telemetry(&cli);

    let config = AgentConfig::from_env().context("Invalid configuration")?;
    let fetcher = build_fetcher(&config)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&config, fetcher).await,
        Commands::Fetch { url } => {
            let page = fetcher.fetch(&url).await?;
            tracing::info!(source = %page.source, url = %page.url, "Fetched");
            println!("{}", page.html);
            Ok(())
        }
        Commands::Screenshot {
            url,
            full_page,
            out,
        } => {
            let png = fetcher.screenshot(&url, full_page).await?;
            tokio::fs::write(&out, &png)
                .await
                .with_context(|| format!("Failed to write {}", out.display()))?;
            tracing::info!(bytes = png.len(), out = %out.display(), "Screenshot written");
            Ok(())
        }
    }
}
