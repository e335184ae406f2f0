// ABOUTME: Canned conversational responder used when no command matches
// ABOUTME: Points the peer at the help command

use async_trait::async_trait;
use boti_core::Conversational;

pub const UNKNOWN_INPUT_REPLY: &str = "I don't know what you are saying. Try writing: help";

/// Answers every text with the same line
#[derive(Debug, Clone)]
pub struct CannedReply {
    text: String,
}

impl CannedReply {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Default for CannedReply {
    fn default() -> Self {
        Self::new(UNKNOWN_INPUT_REPLY)
    }
}

#[async_trait]
impl Conversational for CannedReply {
    async fn say(&self, _text: &str) -> Option<String> {
        Some(self.text.clone())
    }
}
