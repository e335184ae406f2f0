// ABOUTME: Social timeline command ("twitter"): read recent posts and publish new ones
// ABOUTME: The social network API sits behind the Timeline trait

use crate::{count_arg, DATE_FORMAT};
use async_trait::async_trait;
use boti_core::{CommandProvider, ProviderError, Reply};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const HELP: &str = "Please, tell me what action do you want me to do with Twitter:
  -> last <username>: Show last tweet by <username>
  -> show <username> [count]: Show last [count] tweets (default 5) by <username>
  -> new \"<tweet text>\": Create a new tweet on the bot account";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// `"<text>" - dd/mm/YYYY HH:MM`
    pub fn render(&self) -> String {
        format!("\"{}\" - {}", self.text, self.created_at.format(DATE_FORMAT))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub handle: String,
    pub protected: bool,
}

/// Remote social network API
#[async_trait]
pub trait Timeline: Send + Sync {
    /// The account for `user`, or `None` when it does not exist
    async fn account(&self, user: &str) -> Result<Option<Account>, ProviderError>;

    /// Latest posts by `user`, newest first
    async fn posts(&self, user: &str, count: usize) -> Result<Vec<Post>, ProviderError>;

    /// Publish on the bot's own account
    async fn publish(&self, text: &str) -> Result<Post, ProviderError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialSettings {
    #[serde(default = "default_count")]
    pub default_count: usize,
    #[serde(default = "max_count")]
    pub max_count: usize,
}

fn default_count() -> usize {
    5
}

fn max_count() -> usize {
    10
}

impl Default for SocialSettings {
    fn default() -> Self {
        Self {
            default_count: default_count(),
            max_count: max_count(),
        }
    }
}

pub struct SocialProvider {
    timeline: Arc<dyn Timeline>,
    settings: SocialSettings,
}

impl SocialProvider {
    pub fn new(timeline: Arc<dyn Timeline>, settings: SocialSettings) -> Self {
        Self { timeline, settings }
    }

    async fn posts(&self, user: &str, count: usize) -> Result<Reply, ProviderError> {
        let user = user.strip_prefix('@').unwrap_or(user);

        match self.timeline.account(user).await? {
            None => return Ok(Reply::text(format!("-> @{} doesn't exist.", user))),
            Some(account) if account.protected => {
                tracing::warn!(user = %user, "Protected account");
                return Ok(Reply::text(format!(
                    "-> @{} has a protected account. I can't show you the tweets.",
                    user
                )));
            }
            Some(_) => {}
        }

        let posts = self.timeline.posts(user, count).await?;
        let mut rendered: Vec<String> = posts.iter().take(count).map(Post::render).collect();

        match rendered.len() {
            0 => Ok(Reply::text(format!("-> @{} hasn't tweeted yet.", user))),
            1 => Ok(Reply::Text(rendered.remove(0))),
            _ => Ok(Reply::Sequence(rendered)),
        }
    }

    async fn publish(&self, text: &str) -> Result<Reply, ProviderError> {
        let post = self.timeline.publish(text).await?;
        Ok(Reply::text(format!("Tweet sent: \"{}\"", post.text)))
    }
}

#[async_trait]
impl CommandProvider for SocialProvider {
    fn command(&self) -> &str {
        "twitter"
    }

    fn usage(&self) -> &str {
        "Read and write tweets: twitter last <user> | twitter show <user> [count] | twitter new \"<text>\""
    }

    async fn exec_command(&self, tokens: &[String]) -> Result<Reply, ProviderError> {
        let action = tokens.get(1).map(String::as_str);
        tracing::info!(command = "twitter", action = ?action, "Timeline command received");

        match action {
            Some("last") => match tokens.get(2) {
                Some(user) => self.posts(user, 1).await,
                None => Ok(Reply::text("Please, tell me the user: twitter last username")),
            },
            Some("show") => match tokens.get(2) {
                Some(user) => {
                    let count = count_arg(
                        tokens.get(3),
                        self.settings.default_count,
                        self.settings.max_count,
                    );
                    self.posts(user, count).await
                }
                None => Ok(Reply::text("Please, tell me the user: twitter show username")),
            },
            Some("new") => match tokens.get(2) {
                Some(text) if !text.trim().is_empty() => self.publish(text).await,
                _ => Ok(Reply::text(
                    "Please, give me the tweet text: twitter new \"Lorem ipsum dolor\"",
                )),
            },
            _ => Ok(Reply::text(HELP)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_render_post() {
        let post = Post {
            text: "Lorem ipsum dolor".to_string(),
            created_at: Utc.with_ymd_and_hms(2011, 12, 12, 15, 32, 0).unwrap(),
        };
        assert_eq!(post.render(), "\"Lorem ipsum dolor\" - 12/12/2011 15:32");
    }
}
