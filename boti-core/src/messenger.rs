// ABOUTME: Outbound message delivery through the transport
// ABOUTME: Single sends and paced, fail-fast sequences

use crate::peer::PeerId;
use crate::registry::Reply;
use crate::session::{SessionState, StateCell};
use crate::transport::Transport;
use std::sync::Arc;
use std::time::Duration;

/// Delay between consecutive items of a sequence, to stay under server-side
/// rate limits
pub const SEQUENCE_PACING: Duration = Duration::from_secs(1);

/// Sends messages to peers, refusing when the session is not connected.
///
/// Failures are logged and reported as `false`; nothing here returns an error.
#[derive(Clone)]
pub struct Messenger {
    transport: Arc<dyn Transport>,
    state: Arc<StateCell>,
}

impl Messenger {
    pub fn new(transport: Arc<dyn Transport>, state: Arc<StateCell>) -> Self {
        Self { transport, state }
    }

    /// Whether a send may be attempted right now
    pub fn is_live(&self) -> bool {
        self.state.load() == SessionState::Connected && self.transport.is_connected()
    }

    /// Send one message
    pub async fn send(&self, to: &PeerId, text: &str) -> bool {
        if !self.is_live() {
            tracing::warn!(to = %to, "Bot is not connected. Can't send the message.");
            return false;
        }

        tracing::info!(to = %to, "Sending message");
        match self.transport.send(to, text).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(to = %to, error = %e, "Error sending message");
                false
            }
        }
    }

    /// Send `texts` in order with [`SEQUENCE_PACING`] between items.
    ///
    /// Stops at the first failed item and returns false; the items before it
    /// have been sent, the rest are not attempted.
    pub async fn send_sequence(&self, to: &PeerId, texts: &[String]) -> bool {
        for (index, text) in texts.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(SEQUENCE_PACING).await;
            }
            if !self.send(to, text).await {
                tracing::warn!(
                    to = %to,
                    sent = index,
                    remaining = texts.len() - index,
                    "Message sequence aborted"
                );
                return false;
            }
        }
        true
    }

    /// Deliver whatever a handler produced
    pub async fn deliver(&self, to: &PeerId, reply: &Reply) -> bool {
        match reply {
            Reply::Silent => true,
            Reply::Text(text) => self.send(to, text).await,
            Reply::Sequence(texts) => self.send_sequence(to, texts).await,
        }
    }
}
