// ABOUTME: Contract for the duplex chat transport the session drives
// ABOUTME: Connect/send/subscription primitives plus the inbound event stream

use crate::error::TransportError;
use crate::peer::PeerId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::pin::Pin;
use tokio_stream::Stream;

// =============================================================================
// Inbound Events
// =============================================================================

/// A chat message received from a peer
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Sender, possibly with a resource suffix
    pub from: PeerId,
    pub body: String,
    /// Transport-specific message ID, if any
    pub id: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(from: impl Into<PeerId>, body: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            body: body.into(),
            id: None,
            received_at: Utc::now(),
        }
    }
}

/// Subscription state of a roster entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscription {
    None,
    To,
    From,
    Both,
}

/// A contact as the transport's roster knows it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterItem {
    pub peer: PeerId,
    pub name: Option<String>,
    pub subscription: Subscription,
}

/// A friend/subscription request from a peer
#[derive(Debug, Clone)]
pub struct SubscriptionRequest {
    /// The requester
    pub from: PeerId,
    /// Existing roster entry for the requester, if any
    pub roster_item: Option<RosterItem>,
    pub received_at: DateTime<Utc>,
}

impl SubscriptionRequest {
    pub fn new(from: impl Into<PeerId>) -> Self {
        Self {
            from: from.into(),
            roster_item: None,
            received_at: Utc::now(),
        }
    }
}

/// Events delivered by the transport, one at a time
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Message(InboundMessage),
    SubscriptionRequest(SubscriptionRequest),
}

/// Boxed stream type for transport events
pub type EventStream = Pin<Box<dyn Stream<Item = TransportEvent> + Send>>;

// =============================================================================
// Transport
// =============================================================================

/// An already-configured duplex channel to a chat server.
///
/// The wire protocol lives behind this trait. Event delivery is sequential:
/// the stream returned by [`Transport::event_stream`] is drained by a single
/// loop.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport identifier for logging (e.g., "xmpp", "console")
    fn transport_id(&self) -> &'static str;

    /// Establish and authenticate the session
    async fn connect(&self) -> Result<(), TransportError>;

    /// Tear down the session
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Whether the underlying link is currently up
    fn is_connected(&self) -> bool;

    /// Deliver one chat message
    async fn send(&self, to: &PeerId, text: &str) -> Result<(), TransportError>;

    /// Accept a pending subscription request
    async fn accept_subscription(&self, peer: &PeerId) -> Result<(), TransportError>;

    /// Decline a pending subscription request
    async fn decline_subscription(&self, peer: &PeerId) -> Result<(), TransportError>;

    /// Inbound events. Only one stream is handed out per connection.
    async fn event_stream(&self) -> Result<EventStream, TransportError>;
}
