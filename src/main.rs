//! LeadBot ops service.
//!
//! Wires the process-wide singletons (document store, pacing governor,
//! proxy pool) and serves the observability/admin API. Campaign execution
//! is driven by the external API layer through `CampaignRunner`; this
//! binary observes and administers the shared state those runs use.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use leadbot_backend::api::{self, ApiState};
use leadbot_backend::models::Config;
use leadbot_backend::pacing::PacingGovernor;
use leadbot_backend::proxy::ProxyPool;
use leadbot_backend::store::{DocumentStore, SqliteStore};

#[derive(Debug, Parser)]
#[command(name = "leadbot", about = "LeadBot engine ops service")]
struct Args {
    /// Override the listen port (falls back to PORT, then 8080).
    #[arg(long)]
    port: Option<u16>,

    /// Override the document-store path (falls back to DATABASE_PATH).
    #[arg(long)]
    database: Option<String>,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "leadbot_backend=info,leadbot=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(database) = args.database {
        config.database_path = database;
    }

    info!("🚀 LeadBot engine starting");

    let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::new(&config.database_path)?);
    let pacing = Arc::new(PacingGovernor::default());
    let proxies = Arc::new(ProxyPool::new(
        config.proxy_urls.clone(),
        config.proxy_rotation,
    ));

    info!(
        proxies = config.proxy_urls.len(),
        rotation = ?config.proxy_rotation,
        max_posts = config.max_posts,
        "📊 Shared state initialized"
    );

    let state = ApiState {
        pacing,
        proxies,
        store,
    };
    let app = api::router(state).layer(tower_http::cors::CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(addr = %addr, "📡 Ops API listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
