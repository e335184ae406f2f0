// ABOUTME: Transport-agnostic command dispatch and session orchestration for chat bots
// ABOUTME: Provides the allow-list, parser, registry, dispatcher, messenger and session

pub mod allow_list;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod guard;
pub mod messenger;
pub mod peer;
pub mod provider;
pub mod registry;
pub mod session;
pub mod testing;
pub mod transport;

pub use allow_list::AllowList;
pub use commands::parse;
pub use config::{DispatchConfig, SessionConfig};
pub use dispatch::{Dispatcher, Route, WorkerPool};
pub use error::{DispatchError, ParseError, ProviderError, RegistryError, TransportError};
pub use messenger::{Messenger, SEQUENCE_PACING};
pub use peer::PeerId;
pub use provider::{CommandProvider, Conversational, ConversationalFallback, ProviderCommand};
pub use registry::{handler_fn, CommandHandler, CommandRegistry, FnHandler, Invocation, Reply};
pub use session::{
    friend_request_fn, message_fn, FriendRequestFn, FriendRequestHandler, MessageFn,
    MessageHandler, Session, SessionBuilder, SessionState, StateCell,
};
pub use transport::{
    EventStream, InboundMessage, RosterItem, Subscription, SubscriptionRequest, Transport,
    TransportEvent,
};
