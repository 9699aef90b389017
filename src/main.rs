mod age;
mod api;
mod config;
mod error;
mod explorer;
mod network;
mod render;
mod service;

use eyre::WrapErr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::{
    api::AppState,
    explorer::EtherscanClient,
    network::{EnvKeys, NetworkResolver},
    render::CardRenderer,
    service::WalletAgeService,
};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // RUST_LOG wins, otherwise info
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stdout)
        .with_target(false)
        .init();

    info!("Wallet age service starting...");

    let cfg = config::load()?;
    info!("  Bind: {}:{}", cfg.bind_addr, cfg.port);
    info!("  Default network: {}", cfg.default_network);
    info!("  Card template: {}", cfg.card_template_path.display());

    let renderer = CardRenderer::load(
        &cfg.card_template_path,
        &cfg.card_font_path,
        (cfg.card_width, cfg.card_height),
    )
    .wrap_err("loading card assets")?;

    let source = Arc::new(EtherscanClient::new(reqwest::Client::new()));
    let state = Arc::new(AppState {
        service: WalletAgeService::new(source, NetworkResolver::new(EnvKeys)),
        renderer: Box::new(renderer),
        default_network: cfg.default_network,
    });

    let api_handle = tokio::spawn(api::serve(cfg, state));

    tokio::select! {
        res = api_handle => match res {
            Ok(Ok(_)) => info!("API exited cleanly"),
            Ok(Err(e)) => error!("API error: {:?}", e),
            Err(e) => error!("API task panicked: {:?}", e),
        },
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received, stopping...");
        }
    }

    info!("Wallet age service stopped.");
    Ok(())
}
