// ABOUTME: Contract for pluggable command providers and conversational responders
// ABOUTME: Adapters turn both into command handlers the dispatcher can launch

use crate::error::ProviderError;
use crate::registry::{CommandHandler, Invocation, Reply};
use async_trait::async_trait;

/// A named command backed by an external service.
///
/// `exec_command` receives the full token list, including the command key
/// at `tokens[0]` and the sub-command at `tokens[1]`.
#[async_trait]
pub trait CommandProvider: Send + Sync {
    /// Command key the provider answers to (e.g., "hudson")
    fn command(&self) -> &str;

    /// One-line usage shown by the help listing
    fn usage(&self) -> &str;

    async fn exec_command(&self, tokens: &[String]) -> Result<Reply, ProviderError>;
}

/// Registers a [`CommandProvider`] as a [`CommandHandler`].
///
/// Provider errors are logged and answered with their user-safe text; they
/// never reach the dispatcher as failures.
pub struct ProviderCommand<P> {
    provider: P,
}

impl<P: CommandProvider> ProviderCommand<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P: CommandProvider> CommandHandler for ProviderCommand<P> {
    async fn handle(&self, invocation: &Invocation) -> anyhow::Result<Reply> {
        match self.provider.exec_command(&invocation.tokens).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                tracing::warn!(
                    command = self.provider.command(),
                    peer = %invocation.sender,
                    error = %e,
                    "Provider request failed"
                );
                Ok(Reply::Text(e.reply_text()))
            }
        }
    }
}

/// Free-text responder used when no command matches
#[async_trait]
pub trait Conversational: Send + Sync {
    /// Answer to `text`, or `None` when there is nothing to say
    async fn say(&self, text: &str) -> Option<String>;
}

#[async_trait]
impl<C: Conversational + ?Sized> Conversational for std::sync::Arc<C> {
    async fn say(&self, text: &str) -> Option<String> {
        self.as_ref().say(text).await
    }
}

/// Default handler that hands the raw text to a [`Conversational`] responder
pub struct ConversationalFallback<C> {
    responder: C,
}

impl<C: Conversational> ConversationalFallback<C> {
    pub fn new(responder: C) -> Self {
        Self { responder }
    }
}

#[async_trait]
impl<C: Conversational> CommandHandler for ConversationalFallback<C> {
    async fn handle(&self, invocation: &Invocation) -> anyhow::Result<Reply> {
        match self.responder.say(&invocation.raw).await {
            Some(answer) => Ok(Reply::Text(answer)),
            None => {
                tracing::debug!(peer = %invocation.sender, "Responder had nothing to say");
                Ok(Reply::Silent)
            }
        }
    }
}
