// ABOUTME: Command handler contract and the name-to-handler registry
// ABOUTME: Built once at startup, read-only once the session exists

use crate::error::RegistryError;
use crate::peer::PeerId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// One parsed line of inbound text and who sent it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Parsed words. `tokens[0]` is the command key; empty when the text was
    /// blank or could not be parsed.
    pub tokens: Vec<String>,
    /// The text as received
    pub raw: String,
    /// Bare identity of the sender, used as the reply target
    pub sender: PeerId,
}

impl Invocation {
    pub fn new(tokens: Vec<String>, raw: impl Into<String>, sender: PeerId) -> Self {
        Self {
            tokens,
            raw: raw.into(),
            sender,
        }
    }

    /// The command key, if any
    pub fn command(&self) -> Option<&str> {
        self.tokens.first().map(|s| s.as_str())
    }

    /// Argument by index, not counting the command key
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.tokens.get(index + 1).map(|s| s.as_str())
    }
}

/// What a handler wants sent back to the sender
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Reply {
    #[default]
    Silent,
    Text(String),
    /// Delivered in order, paced, stopping at the first failure
    Sequence(Vec<String>),
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text(text.into())
    }

    pub fn is_silent(&self) -> bool {
        matches!(self, Reply::Silent)
    }
}

impl From<String> for Reply {
    fn from(value: String) -> Self {
        Reply::Text(value)
    }
}

impl From<&str> for Reply {
    fn from(value: &str) -> Self {
        Reply::Text(value.to_string())
    }
}

impl From<Vec<String>> for Reply {
    fn from(value: Vec<String>) -> Self {
        Reply::Sequence(value)
    }
}

/// A unit of logic bound to a command name.
///
/// Handlers may run concurrently for different senders.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, invocation: &Invocation) -> anyhow::Result<Reply>;
}

/// Adapter turning an async closure into a [`CommandHandler`]
pub struct FnHandler<F> {
    f: F,
}

/// Wrap an async closure taking an owned [`Invocation`]
///
/// ```
/// use boti_core::{handler_fn, Reply};
///
/// let ping = handler_fn(|_inv| async { Ok(Reply::text("pong")) });
/// # let _ = ping;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Invocation) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Reply>> + Send,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> CommandHandler for FnHandler<F>
where
    F: Fn(Invocation) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Reply>> + Send,
{
    async fn handle(&self, invocation: &Invocation) -> anyhow::Result<Reply> {
        (self.f)(invocation.clone()).await
    }
}

/// Mapping from command name to handler.
///
/// Lookups are case-sensitive. Registering a name twice replaces the
/// earlier handler.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under `name`, replacing any earlier one
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: Arc<dyn CommandHandler>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.handlers.insert(name.clone(), handler).is_some() {
            tracing::debug!(command = %name, "Command handler replaced");
        } else {
            tracing::info!(command = %name, "New command added");
        }
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.names())
            .finish()
    }
}
