// ABOUTME: Session orchestrator owning the transport lifecycle and event wiring
// ABOUTME: Routes friend requests through the allow-list and messages into dispatch

use crate::allow_list::AllowList;
use crate::commands::parse;
use crate::config::SessionConfig;
use crate::dispatch::{Dispatcher, WorkerPool, BUSY_NOTICE, FAILURE_NOTICE};
use crate::error::{DispatchError, RegistryError, TransportError};
use crate::guard::Guarded;
use crate::messenger::Messenger;
use crate::peer::PeerId;
use crate::registry::{CommandHandler, CommandRegistry, Invocation, Reply};
use crate::transport::{InboundMessage, RosterItem, SubscriptionRequest, Transport, TransportEvent};
use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, RwLock};
use tokio_stream::StreamExt;

// =============================================================================
// Connection State
// =============================================================================

/// `Disconnected --connect--> Connecting --success--> Connected --disconnect--> Disconnected`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

impl SessionState {
    fn as_u8(self) -> u8 {
        match self {
            SessionState::Disconnected => 0,
            SessionState::Connecting => 1,
            SessionState::Connected => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionState::Connecting,
            2 => SessionState::Connected,
            _ => SessionState::Disconnected,
        }
    }
}

/// Atomic holder for [`SessionState`], shared with in-flight senders
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: SessionState) -> Self {
        Self(AtomicU8::new(state.as_u8()))
    }

    pub fn load(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, state: SessionState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }

    /// Move from `from` to `to` only if the current state is still `from`.
    /// Returns the state found when the move is refused.
    pub fn transition(&self, from: SessionState, to: SessionState) -> Result<(), SessionState> {
        self.0
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(SessionState::from_u8)
    }

    /// Set `state`, returning the previous one
    pub fn swap(&self, state: SessionState) -> SessionState {
        SessionState::from_u8(self.0.swap(state.as_u8(), Ordering::AcqRel))
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new(SessionState::Disconnected)
    }
}

// =============================================================================
// Event Callbacks
// =============================================================================

/// Callback for inbound messages from allowed peers
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn on_message(
        &self,
        session: &Session,
        text: &str,
        from: &PeerId,
        raw: &InboundMessage,
    ) -> anyhow::Result<()>;
}

/// Callback run after the built-in accept/decline decision on a friend request
#[async_trait]
pub trait FriendRequestHandler: Send + Sync {
    async fn on_friend_request(
        &self,
        session: &Session,
        from: &PeerId,
        roster_item: Option<&RosterItem>,
        raw: &SubscriptionRequest,
    ) -> anyhow::Result<()>;
}

/// Adapter turning an async closure into a [`MessageHandler`]
pub struct MessageFn<F> {
    f: F,
}

pub fn message_fn<F, Fut>(f: F) -> MessageFn<F>
where
    F: Fn(Session, String, PeerId, InboundMessage) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    MessageFn { f }
}

#[async_trait]
impl<F, Fut> MessageHandler for MessageFn<F>
where
    F: Fn(Session, String, PeerId, InboundMessage) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn on_message(
        &self,
        session: &Session,
        text: &str,
        from: &PeerId,
        raw: &InboundMessage,
    ) -> anyhow::Result<()> {
        (self.f)(session.clone(), text.to_string(), from.clone(), raw.clone()).await
    }
}

/// Adapter turning an async closure into a [`FriendRequestHandler`]
pub struct FriendRequestFn<F> {
    f: F,
}

pub fn friend_request_fn<F, Fut>(f: F) -> FriendRequestFn<F>
where
    F: Fn(Session, PeerId, Option<RosterItem>, SubscriptionRequest) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    FriendRequestFn { f }
}

#[async_trait]
impl<F, Fut> FriendRequestHandler for FriendRequestFn<F>
where
    F: Fn(Session, PeerId, Option<RosterItem>, SubscriptionRequest) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn on_friend_request(
        &self,
        session: &Session,
        from: &PeerId,
        roster_item: Option<&RosterItem>,
        raw: &SubscriptionRequest,
    ) -> anyhow::Result<()> {
        (self.f)(session.clone(), from.clone(), roster_item.cloned(), raw.clone()).await
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Collects command registrations before the session exists.
///
/// The registry is frozen by [`SessionBuilder::build`], so every command is in
/// place before the session can connect or receive events.
pub struct SessionBuilder {
    transport: Arc<dyn Transport>,
    config: SessionConfig,
    registry: CommandRegistry,
}

impl SessionBuilder {
    pub fn new(transport: Arc<dyn Transport>, config: SessionConfig) -> Self {
        Self {
            transport,
            config,
            registry: CommandRegistry::new(),
        }
    }

    /// Bind `handler` to `name`. A later registration of the same name wins.
    pub fn register_command<H>(
        &mut self,
        name: impl Into<String>,
        handler: H,
    ) -> Result<&mut Self, RegistryError>
    where
        H: CommandHandler + 'static,
    {
        self.register_shared(name, Arc::new(handler))
    }

    pub fn register_shared(
        &mut self,
        name: impl Into<String>,
        handler: Arc<dyn CommandHandler>,
    ) -> Result<&mut Self, RegistryError> {
        self.registry.register(name, handler)?;
        Ok(self)
    }

    pub fn command_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Freeze the registry and start the command worker pool.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> Session {
        let state = Arc::new(StateCell::default());
        let messenger = Messenger::new(Arc::clone(&self.transport), Arc::clone(&state));
        let pool = WorkerPool::spawn(&self.config.dispatch);
        let dispatcher = Dispatcher::new(Arc::new(self.registry), pool, messenger.clone());

        tracing::info!(
            transport = self.transport.transport_id(),
            commands = ?dispatcher.registry().names(),
            allowed = self.config.allowed.len(),
            "Session built"
        );

        Session {
            inner: Arc::new(Inner {
                transport: self.transport,
                state,
                allow_list: AllowList::new(&self.config.allowed),
                stranger_reply: self.config.stranger_reply,
                dispatcher,
                messenger,
                message_handler: RwLock::new(None),
                friend_handler: RwLock::new(None),
            }),
        }
    }
}

// =============================================================================
// Session
// =============================================================================

struct Inner {
    transport: Arc<dyn Transport>,
    state: Arc<StateCell>,
    allow_list: AllowList,
    stranger_reply: Option<String>,
    dispatcher: Dispatcher,
    messenger: Messenger,
    message_handler: RwLock<Option<Guarded<dyn MessageHandler>>>,
    friend_handler: RwLock<Option<Guarded<dyn FriendRequestHandler>>>,
}

/// A bot session over one transport.
///
/// Cheap to clone; clones share the same connection, registry and callbacks.
/// Operations that need a live connection log and return `false` instead of
/// failing when the session is not connected.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    pub fn builder(transport: Arc<dyn Transport>, config: SessionConfig) -> SessionBuilder {
        SessionBuilder::new(transport, config)
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.load()
    }

    /// True when the session is `Connected` and the transport link is up
    pub fn is_connected(&self) -> bool {
        let connected = self.inner.messenger.is_live();
        tracing::debug!(connected, "Asked if bot is connected");
        connected
    }

    /// Establish the transport session. Does not retry on failure.
    pub async fn connect(&self) -> bool {
        let transport = &self.inner.transport;
        let state = &self.inner.state;

        let mut current = state.load();
        loop {
            match current {
                SessionState::Connecting => {
                    tracing::warn!("Connection attempt already in progress");
                    return false;
                }
                SessionState::Connected if transport.is_connected() => {
                    tracing::debug!("Already connected");
                    return true;
                }
                _ => match state.transition(current, SessionState::Connecting) {
                    Ok(()) => break,
                    Err(found) => current = found,
                },
            }
        }

        tracing::info!(transport = transport.transport_id(), "Connecting...");
        match transport.connect().await {
            Ok(()) => {
                if state
                    .transition(SessionState::Connecting, SessionState::Connected)
                    .is_err()
                {
                    // disconnect() ran while the transport was still connecting
                    tracing::warn!(
                        transport = transport.transport_id(),
                        "Disconnected while connecting, dropping the new link"
                    );
                    if let Err(e) = transport.disconnect().await {
                        tracing::error!(error = %e, "Error disconnecting");
                    }
                    return false;
                }
                tracing::info!(transport = transport.transport_id(), "Connected");
                true
            }
            Err(e) => {
                let _ = state.transition(SessionState::Connecting, SessionState::Disconnected);
                tracing::error!(
                    transport = transport.transport_id(),
                    error = %e,
                    "Error connecting"
                );
                false
            }
        }
    }

    /// Tear down the transport session. Idempotent.
    pub async fn disconnect(&self) -> bool {
        let transport = &self.inner.transport;

        if self.inner.state.swap(SessionState::Disconnected) == SessionState::Disconnected {
            tracing::debug!("Already disconnected");
            return true;
        }

        tracing::info!(transport = transport.transport_id(), "Closing session");
        match transport.disconnect().await {
            Ok(()) => {
                tracing::info!("Session closed");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Error disconnecting");
                false
            }
        }
    }

    pub fn is_allowed(&self, peer: &PeerId) -> bool {
        self.inner.allow_list.is_allowed(peer)
    }

    pub fn command_names(&self) -> Vec<String> {
        self.inner.dispatcher.registry().names()
    }

    pub async fn accept_friend(&self, peer: &PeerId) -> bool {
        if !self.is_connected() {
            tracing::warn!(peer = %peer, "Bot is not connected. Can't accept friend.");
            return false;
        }
        match self.inner.transport.accept_subscription(peer).await {
            Ok(()) => {
                tracing::info!(peer = %peer, "Accepted friend request");
                true
            }
            Err(e) => {
                tracing::error!(peer = %peer, error = %e, "Error accepting friend");
                false
            }
        }
    }

    pub async fn decline_friend(&self, peer: &PeerId) -> bool {
        if !self.is_connected() {
            tracing::warn!(peer = %peer, "Bot is not connected. Can't decline friend.");
            return false;
        }
        match self.inner.transport.decline_subscription(peer).await {
            Ok(()) => {
                tracing::info!(peer = %peer, "Declined friend request");
                true
            }
            Err(e) => {
                tracing::error!(peer = %peer, error = %e, "Error declining friend");
                false
            }
        }
    }

    pub async fn send_text(&self, to: &PeerId, text: &str) -> bool {
        self.inner.messenger.send(to, text).await
    }

    /// Paced, fail-fast delivery of several messages
    pub async fn send_texts(&self, to: &PeerId, texts: &[String]) -> bool {
        self.inner.messenger.send_sequence(to, texts).await
    }

    pub async fn send_message(&self, to: &PeerId, reply: &Reply) -> bool {
        self.inner.messenger.deliver(to, reply).await
    }

    /// Install the callback for inbound messages, replacing any earlier one
    pub fn on_message<H>(&self, handler: H)
    where
        H: MessageHandler + 'static,
    {
        let guarded = Guarded::new("on_message", Arc::new(handler) as Arc<dyn MessageHandler>);
        *self
            .inner
            .message_handler
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(guarded);
    }

    /// Install the extension callback for friend requests. Accept/decline
    /// is decided by the allow-list before it runs.
    pub fn on_friend_request<H>(&self, handler: H)
    where
        H: FriendRequestHandler + 'static,
    {
        let guarded = Guarded::new(
            "on_friend_request",
            Arc::new(handler) as Arc<dyn FriendRequestHandler>,
        );
        *self
            .inner
            .friend_handler
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(guarded);
    }

    fn invocation(&self, text: &str, from: &PeerId) -> Invocation {
        let tokens = match parse(text) {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!(peer = %from, input = %text, error = %e, "Unparseable command");
                Vec::new()
            }
        };
        Invocation::new(tokens, text, from.bare())
    }

    /// Log a refused dispatch and tell the sender, off the caller's path
    fn refused(&self, text: &str, from: &PeerId, error: DispatchError) {
        tracing::warn!(peer = %from, input = %text, error = %error, "Command not dispatched");
        let notice = match error {
            DispatchError::QueueFull { .. } => BUSY_NOTICE,
            DispatchError::PoolClosed => FAILURE_NOTICE,
        };
        let messenger = self.inner.messenger.clone();
        let to = from.bare();
        tokio::spawn(async move {
            messenger.send(&to, notice).await;
        });
    }

    /// Parse `text` and launch the matching command, or `default` when none
    /// matches or the text cannot be parsed.
    ///
    /// Returns false without parsing when the session is not connected, or
    /// when the command queue is full. A refused sender is told the bot is
    /// busy.
    pub fn execute_or_default(
        &self,
        text: &str,
        from: &PeerId,
        default: Arc<dyn CommandHandler>,
    ) -> bool {
        if !self.is_connected() {
            tracing::warn!(peer = %from, "Bot is not connected. Can't execute the command.");
            return false;
        }

        let invocation = self.invocation(text, from);
        match self.inner.dispatcher.dispatch(invocation, default) {
            Ok(_) => true,
            Err(e) => {
                self.refused(text, from, e);
                false
            }
        }
    }

    /// Parse `text` and launch the matching command. Returns true only when a
    /// registered command was found and launched.
    pub fn execute(&self, text: &str, from: &PeerId) -> bool {
        if !self.is_connected() {
            tracing::warn!(peer = %from, "Bot is not connected. Can't execute the command.");
            return false;
        }

        let invocation = self.invocation(text, from);
        match self.inner.dispatcher.dispatch_registered(invocation) {
            Ok(route) => route.is_some(),
            Err(e) => {
                self.refused(text, from, e);
                false
            }
        }
    }

    /// Drain the transport's event stream until it ends.
    ///
    /// Events are handled one at a time; command handlers run on the worker
    /// pool so a slow command does not hold up the next event.
    pub async fn run(&self) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        let mut events = self.inner.transport.event_stream().await?;
        tracing::info!("Listening for events");

        while let Some(event) = events.next().await {
            self.handle_event(event).await;
        }

        tracing::info!("Event stream closed");
        Ok(())
    }

    /// Handle one inbound event. Never fails; callback failures are logged.
    pub async fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Message(msg) => self.handle_message(msg).await,
            TransportEvent::SubscriptionRequest(req) => self.handle_subscription(req).await,
        }
    }

    async fn handle_message(&self, msg: InboundMessage) {
        let from = msg.from.bare();
        tracing::info!(peer = %from, "Incoming message");

        if !self.is_allowed(&from) {
            tracing::warn!(peer = %from, "Ignoring message from peer outside the allow-list");
            if let Some(reply) = &self.inner.stranger_reply {
                self.send_text(&from, reply).await;
            }
            return;
        }

        let handler = self
            .inner
            .message_handler
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        match handler {
            Some(handler) => {
                handler
                    .call(&from, &msg.body, |h| h.on_message(self, &msg.body, &from, &msg))
                    .await;
            }
            None => tracing::debug!(peer = %from, "No message handler installed"),
        }
    }

    async fn handle_subscription(&self, req: SubscriptionRequest) {
        let from = req.from.bare();
        tracing::info!(peer = %from, "Incoming friend petition");

        if self.is_allowed(&from) {
            self.accept_friend(&from).await;
        } else {
            self.decline_friend(&from).await;
        }

        let handler = self
            .inner
            .friend_handler
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        if let Some(handler) = handler {
            handler
                .call(&from, from.as_str(), |h| {
                    h.on_friend_request(self, &from, req.roster_item.as_ref(), &req)
                })
                .await;
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("transport", &self.inner.transport.transport_id())
            .field("state", &self.state())
            .field("commands", &self.command_names())
            .finish()
    }
}
