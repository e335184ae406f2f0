// ABOUTME: Application wiring - builds the session from config and back-ends
// ABOUTME: Registers providers, installs event handlers, and drives the connect/run/disconnect cycle

use crate::config::Config;
use anyhow::{Context, Result};
use boti_core::{
    friend_request_fn, message_fn, CommandHandler, CommandProvider, Conversational,
    ConversationalFallback, ProviderCommand, RegistryError, Session, SessionBuilder, Transport,
};
use boti_providers::{
    CannedReply, CiProvider, CiServer, CommitSource, Help, RepoProvider, SocialProvider, Timeline,
};
use std::sync::Arc;

/// Greeting sent to a peer once their friend request is accepted
pub const WELCOME: &str = "Hi! Write help to see what I can do.";

/// External services the providers talk to. A provider is only registered
/// when its back-end is present.
#[derive(Clone, Default)]
pub struct Backends {
    pub ci: Option<Arc<dyn CiServer>>,
    pub repo: Option<Arc<dyn CommitSource>>,
    pub social: Option<Arc<dyn Timeline>>,
    /// Answers text that matches no command; a canned reply when absent
    pub conversational: Option<Arc<dyn Conversational>>,
}

fn register<P>(builder: &mut SessionBuilder, help: &mut Help, provider: P) -> Result<(), RegistryError>
where
    P: CommandProvider + 'static,
{
    help.add(provider.command(), provider.usage());
    let name = provider.command().to_string();
    builder.register_command(name, ProviderCommand::new(provider))?;
    Ok(())
}

/// Build a session with every available provider registered and the message
/// and friend-request handlers installed. Must run inside a Tokio runtime.
pub fn build_session(
    config: &Config,
    transport: Arc<dyn Transport>,
    backends: Backends,
) -> Result<Session> {
    let mut builder = Session::builder(transport, config.session_config());
    let mut help = Help::new();

    if let Some(server) = backends.ci {
        register(
            &mut builder,
            &mut help,
            CiProvider::new(server, config.providers.ci.clone()),
        )?;
    }
    if let Some(source) = backends.repo {
        register(
            &mut builder,
            &mut help,
            RepoProvider::new(source, config.providers.repo.clone()),
        )?;
    }
    if let Some(timeline) = backends.social {
        register(
            &mut builder,
            &mut help,
            SocialProvider::new(timeline, config.providers.social.clone()),
        )?;
    }
    let name = help.command().to_string();
    builder.register_command(name, ProviderCommand::new(help))?;

    let session = builder.build();

    let fallback: Arc<dyn CommandHandler> = match backends.conversational {
        Some(responder) => Arc::new(ConversationalFallback::new(responder)),
        None => Arc::new(ConversationalFallback::new(CannedReply::default())),
    };

    session.on_message(message_fn(move |session, text, from, _raw| {
        let fallback = Arc::clone(&fallback);
        async move {
            session.execute_or_default(&text, &from, fallback);
            Ok(())
        }
    }));

    session.on_friend_request(friend_request_fn(|session, from, _item, _raw| async move {
        if session.is_allowed(&from) {
            session.send_text(&from, WELCOME).await;
        }
        Ok(())
    }));

    tracing::info!(commands = ?session.command_names(), "Session ready");
    Ok(session)
}

/// Connect, process events until the transport's stream ends, then
/// disconnect
pub async fn run(session: &Session) -> Result<()> {
    if !session.connect().await {
        anyhow::bail!("Could not connect to the chat server");
    }

    let result = session.run().await;
    session.disconnect().await;
    result.context("Event loop failed")
}
