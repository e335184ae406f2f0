// ABOUTME: Error taxonomy for the dispatch core
// ABOUTME: Parse, transport, dispatch, registry and provider failures

use thiserror::Error;

/// Malformed command line. Recovered by routing to the default handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unbalanced {quote} quote opened at position {position}")]
    UnbalancedQuote { quote: char, position: usize },

    #[error("dangling escape at end of input")]
    DanglingEscape,
}

/// Connect, authenticate, send or subscription failures reported by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("not connected")]
    NotConnected,

    #[error("delivery to {to} failed: {reason}")]
    Delivery { to: String, reason: String },

    #[error("subscription update for {peer} failed: {reason}")]
    Subscription { peer: String, reason: String },

    #[error("event stream unavailable: {0}")]
    Stream(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("dispatch queue is full ({capacity} pending)")]
    QueueFull { capacity: usize },

    #[error("worker pool has shut down")]
    PoolClosed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("command name must not be empty")]
    EmptyName,
}

/// Failure inside a command provider (e.g. upstream service unavailable).
///
/// The `Display` form is for logs. [`ProviderError::reply_text`] is what the
/// peer sees.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{what} not found")]
    NotFound { what: String },

    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProviderError {
    /// User-safe explanation, without internal detail
    pub fn reply_text(&self) -> String {
        match self {
            ProviderError::NotFound { what } => format!("{} not found", what),
            ProviderError::Unavailable(_) => {
                "-> The service is not available right now. Try again later.".to_string()
            }
            ProviderError::Rejected(_) => "-> The service refused that request.".to_string(),
            ProviderError::Other(_) => "-> Can't do that operation".to_string(),
        }
    }
}
