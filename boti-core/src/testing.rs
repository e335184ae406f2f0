// ABOUTME: Test doubles for sessions - an in-memory transport and a recording handler.
// ABOUTME: Allows deterministic tests without a chat server.
//!
//! # Example
//!
//! ```no_run
//! use boti_core::testing::MockTransport;
//! use boti_core::{Session, SessionConfig};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let transport = Arc::new(MockTransport::new());
//! let session = Session::builder(transport.clone(), SessionConfig::new(["alice@example.com"]))
//!     .build();
//!
//! assert!(session.connect().await);
//! assert!(session.send_text(&"alice@example.com".into(), "hi").await);
//! assert_eq!(transport.sent_texts(), vec!["hi".to_string()]);
//! # }
//! ```

use crate::error::TransportError;
use crate::peer::PeerId;
use crate::registry::{CommandHandler, Invocation, Reply};
use crate::transport::{EventStream, InboundMessage, SubscriptionRequest, Transport, TransportEvent};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// In-memory [`Transport`] that records everything the session does
pub struct MockTransport {
    connected: AtomicBool,
    fail_connect: AtomicBool,
    connect_delay: Option<Duration>,
    fail_send_at: Option<usize>,
    fail_send_text: Option<String>,
    send_attempts: Mutex<Vec<(PeerId, String)>>,
    sent: Mutex<Vec<(PeerId, String)>>,
    accepted: Mutex<Vec<PeerId>>,
    declined: Mutex<Vec<PeerId>>,
    connect_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
    events_tx: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    events_rx: Mutex<Option<mpsc::Receiver<TransportEvent>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(64);
        Self {
            connected: AtomicBool::new(false),
            fail_connect: AtomicBool::new(false),
            connect_delay: None,
            fail_send_at: None,
            fail_send_text: None,
            send_attempts: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            accepted: Mutex::new(Vec::new()),
            declined: Mutex::new(Vec::new()),
            connect_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
            events_tx: Mutex::new(Some(tx)),
            events_rx: Mutex::new(Some(rx)),
        }
    }

    /// Make every `connect` take `delay` before it completes
    pub fn connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    /// Make every `connect` fail
    pub fn fail_connect(self) -> Self {
        self.fail_connect.store(true, Ordering::SeqCst);
        self
    }

    /// Make the `n`th send attempt (1-based) fail
    pub fn fail_send_at(mut self, n: usize) -> Self {
        self.fail_send_at = Some(n);
        self
    }

    /// Make every send of exactly `text` fail
    pub fn fail_send_of(mut self, text: impl Into<String>) -> Self {
        self.fail_send_text = Some(text.into());
        self
    }

    /// Toggle connect failures after construction
    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Simulate the link going down without a disconnect call
    pub fn drop_link(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Successfully delivered messages, in order
    pub fn sent(&self) -> Vec<(PeerId, String)> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, text)| text).collect()
    }

    /// Every send attempt, including failed ones
    pub fn send_attempts(&self) -> Vec<(PeerId, String)> {
        self.send_attempts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn accepted(&self) -> Vec<PeerId> {
        self.accepted.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn declined(&self) -> Vec<PeerId> {
        self.declined.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    /// Push an event onto the inbound stream
    pub async fn inject(&self, event: TransportEvent) {
        let tx = self
            .events_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(tx) = tx {
            let _ = tx.send(event).await;
        }
    }

    pub async fn inject_message(&self, from: &str, body: &str) {
        self.inject(TransportEvent::Message(InboundMessage::new(from, body)))
            .await;
    }

    pub async fn inject_subscription(&self, from: &str) {
        self.inject(TransportEvent::SubscriptionRequest(SubscriptionRequest::new(
            from,
        )))
        .await;
    }

    /// End the inbound stream once the queued events are drained
    pub fn close_events(&self) {
        self.events_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
    }

    /// Wait until at least `count` messages were delivered, or give up after
    /// a generous timeout. Returns whatever was delivered.
    pub async fn wait_for_sends(&self, count: usize) -> Vec<(PeerId, String)> {
        let poll = async {
            while self.sent.lock().unwrap_or_else(|e| e.into_inner()).len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        let _ = tokio::time::timeout(Duration::from_secs(30), poll).await;
        self.sent()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn transport_id(&self) -> &'static str {
        "mock"
    }

    async fn connect(&self) -> Result<(), TransportError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError::Connect("authentication failed".to_string()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send(&self, to: &PeerId, text: &str) -> Result<(), TransportError> {
        let attempt = {
            let mut attempts = self.send_attempts.lock().unwrap_or_else(|e| e.into_inner());
            attempts.push((to.clone(), text.to_string()));
            attempts.len()
        };

        let scripted_failure = self.fail_send_at == Some(attempt)
            || self.fail_send_text.as_deref() == Some(text);
        if scripted_failure || !self.is_connected() {
            return Err(TransportError::Delivery {
                to: to.to_string(),
                reason: "scripted failure".to_string(),
            });
        }

        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((to.clone(), text.to_string()));
        Ok(())
    }

    async fn accept_subscription(&self, peer: &PeerId) -> Result<(), TransportError> {
        self.accepted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(peer.clone());
        Ok(())
    }

    async fn decline_subscription(&self, peer: &PeerId) -> Result<(), TransportError> {
        self.declined
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(peer.clone());
        Ok(())
    }

    async fn event_stream(&self) -> Result<EventStream, TransportError> {
        let rx = self
            .events_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or_else(|| TransportError::Stream("event stream already taken".to_string()))?;
        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// Command handler that records every invocation and answers with a fixed
/// reply
pub struct RecordingHandler {
    reply: Reply,
    calls: Mutex<Vec<Invocation>>,
    notify: mpsc::UnboundedSender<Invocation>,
}

impl RecordingHandler {
    /// Returns the handler and a receiver yielding each invocation as it runs
    pub fn new(reply: Reply) -> (Self, mpsc::UnboundedReceiver<Invocation>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                reply,
                calls: Mutex::new(Vec::new()),
                notify: tx,
            },
            rx,
        )
    }

    /// Handler that answers nothing
    pub fn silent() -> (Self, mpsc::UnboundedReceiver<Invocation>) {
        Self::new(Reply::Silent)
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl CommandHandler for RecordingHandler {
    async fn handle(&self, invocation: &Invocation) -> anyhow::Result<Reply> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(invocation.clone());
        let _ = self.notify.send(invocation.clone());
        Ok(self.reply.clone())
    }
}
