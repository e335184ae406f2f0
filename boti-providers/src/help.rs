// ABOUTME: The help command, listing every registered provider with its usage
// ABOUTME: Built from the provider list after all other providers are constructed

use async_trait::async_trait;
use boti_core::{CommandProvider, ProviderError, Reply};

/// Lists `-> name: usage` for each known command
#[derive(Debug, Clone, Default)]
pub struct Help {
    entries: Vec<(String, String)>,
}

impl Help {
    pub const USAGE: &'static str = "List the available commands: help";

    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider's command and usage to the listing
    pub fn with(mut self, provider: &dyn CommandProvider) -> Self {
        self.add(provider.command(), provider.usage());
        self
    }

    pub fn add(&mut self, command: impl Into<String>, usage: impl Into<String>) {
        self.entries.push((command.into(), usage.into()));
    }

    /// The listing text, help itself included
    pub fn listing(&self) -> String {
        let mut lines = vec!["Available commands:".to_string()];
        lines.extend(
            self.entries
                .iter()
                .map(|(name, usage)| format!("-> {}: {}", name, usage)),
        );
        lines.push(format!("-> {}: {}", self.command(), self.usage()));
        lines.join("\n")
    }
}

#[async_trait]
impl CommandProvider for Help {
    fn command(&self) -> &str {
        "help"
    }

    fn usage(&self) -> &str {
        Self::USAGE
    }

    async fn exec_command(&self, _tokens: &[String]) -> Result<Reply, ProviderError> {
        Ok(Reply::Text(self.listing()))
    }
}
