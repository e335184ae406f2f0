// ABOUTME: Runtime settings consumed by the session and the dispatcher
// ABOUTME: Deserializable so the application config can embed them directly

use serde::{Deserialize, Serialize};

/// Worker pool limits for command execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Maximum number of command handlers running at once
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Maximum number of invocations waiting for a worker
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_max_concurrent() -> usize {
    8
}

fn default_queue_capacity() -> usize {
    64
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Settings for a [`crate::Session`]
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Bare peer identities allowed to befriend and command the bot
    pub allowed: Vec<String>,
    /// Text sent to peers outside the allow-list who message the bot
    pub stranger_reply: Option<String>,
    pub dispatch: DispatchConfig,
}

impl SessionConfig {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_stranger_reply(mut self, reply: impl Into<String>) -> Self {
        self.stranger_reply = Some(reply.into());
        self
    }

    pub fn with_dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.dispatch = dispatch;
        self
    }
}
