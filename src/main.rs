use anyhow::{Context, Result};
use clap::Parser;
use lingua_live::account::{AccountStore, RestAccountStore};
use lingua_live::model::HttpModelClient;
use lingua_live::{create_router, AppState, Config};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "lingua-live", about = "Language tutor live-session service")]
struct Args {
    /// Config file (without extension)
    #[arg(long, default_value = "config/lingua-live")]
    config: String,

    /// Override the HTTP bind address
    #[arg(long)]
    bind: Option<String>,

    /// Override the HTTP port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    let bind = args.bind.unwrap_or_else(|| cfg.service.http.bind.clone());
    let port = args.port.unwrap_or(cfg.service.http.port);

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!("Live channel bus: {}", cfg.live.nats_url);
    if cfg.model.resolve_api_key().is_none() {
        info!("No model API key configured; model operations will report how to set one");
    }

    let account: Option<Arc<dyn AccountStore>> = match RestAccountStore::from_config(&cfg.account)
    {
        Ok(store) => {
            info!("Usage tracking enabled");
            Some(Arc::new(store))
        }
        Err(_) => None,
    };

    let model = Arc::new(HttpModelClient::from_config(&cfg.model));
    let state = AppState::new(&cfg, model, account);
    let app = create_router(state);

    let addr = format!("{}:{}", bind, port);
    info!("HTTP server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .await
        .context("HTTP server failed")?;

    Ok(())
}
