use thiserror::Error;

/// Everything that can go wrong while working out a wallet's age.
#[derive(Error, Debug)]
pub enum AgeError {
    #[error("Valid Ethereum address is required")]
    MissingAddress,

    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),

    #[error("{network} API failed: {network} API error: {payload}")]
    Provider { network: String, payload: String },

    #[error("Error fetching {network} transactions: {source}")]
    Transport {
        network: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected {network} response: {reason}")]
    Decode { network: String, reason: String },

    #[error("Invalid transaction timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Render failed: {0}")]
    Render(String),
}

impl AgeError {
    /// Errors raised before any outbound request is made.
    pub fn is_client_error(&self) -> bool {
        matches!(self, AgeError::MissingAddress | AgeError::UnsupportedNetwork(_))
    }

    /// Errors that came from, or while talking to, a block explorer.
    pub fn is_upstream_error(&self) -> bool {
        matches!(
            self,
            AgeError::Provider { .. } | AgeError::Transport { .. } | AgeError::Decode { .. }
        )
    }
}
