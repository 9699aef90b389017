use dotenvy::dotenv;
use eyre::{Result, WrapErr};
use std::{env, net::IpAddr, path::PathBuf};
use tracing::info;

use crate::network::Network;

/// Server settings. Explorer API keys are not here: they are read per request.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub default_network: Network,
    pub card_width: u32,
    pub card_height: u32,
    pub card_template_path: PathBuf,
    pub card_font_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::from([127, 0, 0, 1]),
            port: 8080,
            default_network: Network::Ethereum,
            card_width: 1200,
            card_height: 630,
            card_template_path: PathBuf::from("public/template.png"),
            card_font_path: PathBuf::from("public/DejaVuSans-Bold.ttf"),
        }
    }
}

fn parsed_or<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(fallback)
}

pub fn load() -> Result<Config> {
    dotenv().ok(); // .env is optional

    let defaults = Config::default();

    // An unknown default chain is a startup error, not a silent fallback
    let default_network = match env::var("DEFAULT_NETWORK") {
        Ok(id) => id
            .parse()
            .wrap_err_with(|| format!("DEFAULT_NETWORK={id}"))?,
        Err(_) => defaults.default_network,
    };

    let cfg = Config {
        bind_addr: parsed_or("BIND_ADDR", defaults.bind_addr),
        port: parsed_or("PORT", defaults.port),
        default_network,
        card_width: parsed_or("CARD_WIDTH", defaults.card_width),
        card_height: parsed_or("CARD_HEIGHT", defaults.card_height),
        card_template_path: env::var("CARD_TEMPLATE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.card_template_path),
        card_font_path: env::var("CARD_FONT_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.card_font_path),
    };

    info!("Loaded config: {:?}", cfg);

    Ok(cfg)
}
