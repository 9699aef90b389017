// src/network.rs
use serde::Serialize;
use std::{env, fmt, str::FromStr};

use crate::error::AgeError;

/// Chains with a configured block explorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Ethereum,
    Base,
}

impl Network {
    /// Fixed query order for cross-chain lookups. Ties go to the earlier entry.
    pub const ALL: [Network; 2] = [Network::Ethereum, Network::Base];

    pub fn id(&self) -> &'static str {
        match self {
            Network::Ethereum => "ethereum",
            Network::Base => "base",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Network::Ethereum => "Ethereum",
            Network::Base => "Base",
        }
    }

    fn api_base_url(&self) -> &'static str {
        match self {
            Network::Ethereum => "https://api.etherscan.io",
            Network::Base => "https://api.basescan.org",
        }
    }

    /// Environment variable holding the explorer API key.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Network::Ethereum => "ETHERSCAN_API_KEY",
            Network::Base => "BASESCAN_API_KEY",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Network {
    type Err = AgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ethereum" => Ok(Network::Ethereum),
            "base" => Ok(Network::Base),
            _ => Err(AgeError::UnsupportedNetwork(s.to_string())),
        }
    }
}

/// Everything needed to talk to one chain's explorer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub network: Network,
    pub api_base_url: String,
    pub api_key: String,
    pub name: String,
}

/// Source of explorer API keys.
pub trait KeyProvider: Send + Sync {
    fn api_key(&self, network: Network) -> String;
}

/// Reads keys from the process environment on every call.
/// A missing key is returned as empty and shows up later as a provider auth failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvKeys;

impl KeyProvider for EnvKeys {
    fn api_key(&self, network: Network) -> String {
        env::var(network.api_key_var()).unwrap_or_default()
    }
}

/// Fixed keys for tests.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct StaticKeys(std::collections::HashMap<Network, String>);

#[cfg(test)]
impl StaticKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, network: Network, key: impl Into<String>) -> Self {
        self.0.insert(network, key.into());
        self
    }
}

#[cfg(test)]
impl KeyProvider for StaticKeys {
    fn api_key(&self, network: Network) -> String {
        self.0.get(&network).cloned().unwrap_or_default()
    }
}

pub struct NetworkResolver {
    keys: Box<dyn KeyProvider>,
}

impl NetworkResolver {
    pub fn new(keys: impl KeyProvider + 'static) -> Self {
        Self { keys: Box::new(keys) }
    }

    /// Builds a fresh config; nothing is cached between calls.
    pub fn resolve(&self, network: Network) -> NetworkConfig {
        NetworkConfig {
            network,
            api_base_url: network.api_base_url().to_string(),
            api_key: self.keys.api_key(network),
            name: network.display_name().to_string(),
        }
    }
}
