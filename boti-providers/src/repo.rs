// ABOUTME: Repository command ("github"): show the latest commits of a repository
// ABOUTME: Commit history comes from the CommitSource trait

use crate::{count_arg, DATE_FORMAT};
use async_trait::async_trait;
use boti_core::{CommandProvider, ProviderError, Reply};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const COMMITS_USAGE: &str =
    "Please, tell me the username/repository pair: github commits rails/rails";

const FORMAT_HINT: &str = "The format for username and repository should be: username/repository";

const HELP: &str = "Please, tell me what action do you want me to do with GitHub:
  -> commits <username>/<repository> <count>: Show last <count> commits from <username>/<repository>: github commits rails/rails 8";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub id: String,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub committed_at: DateTime<Utc>,
    pub url: String,
}

impl Commit {
    /// `[<8-char id>] "<first line>"`, author line, then the URL
    pub fn render(&self) -> String {
        let id: String = self.id.chars().take(8).collect();
        let summary = self.message.lines().next().unwrap_or_default();
        format!(
            "[{}] \"{}\"\n{} <{}> {}\n{}",
            id,
            summary,
            self.author_name,
            self.author_email,
            self.committed_at.format(DATE_FORMAT),
            self.url
        )
    }
}

/// Source of repository history, newest first
#[async_trait]
pub trait CommitSource: Send + Sync {
    async fn commits(
        &self,
        owner: &str,
        repository: &str,
        count: usize,
    ) -> Result<Vec<Commit>, ProviderError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSettings {
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

impl Default for RepoSettings {
    fn default() -> Self {
        Self {
            default_count: default_count(),
            max_count: max_count(),
        }
    }
}

pub struct RepoProvider {
    source: Arc<dyn CommitSource>,
    settings: RepoSettings,
}

impl RepoProvider {
    pub fn new(source: Arc<dyn CommitSource>, settings: RepoSettings) -> Self {
        Self { source, settings }
    }

    async fn commits(&self, pair: &str, count: Option<&String>) -> Result<Reply, ProviderError> {
        let Some((owner, repository)) = pair
            .split_once('/')
            .filter(|(owner, repo)| !owner.is_empty() && !repo.is_empty())
        else {
            return Ok(Reply::text(FORMAT_HINT));
        };

        let count = count_arg(count, self.settings.default_count, self.settings.max_count);
        let commits = match self.source.commits(owner, repository, count).await {
            Ok(commits) => commits,
            Err(ProviderError::NotFound { .. }) => {
                return Ok(Reply::text(format!("Repository '{}' not found", pair)))
            }
            Err(e) => return Err(e),
        };

        if commits.is_empty() {
            return Ok(Reply::text(format!("No commits found for {}", pair)));
        }

        Ok(Reply::Sequence(
            commits.iter().take(count).map(Commit::render).collect(),
        ))
    }
}

#[async_trait]
impl CommandProvider for RepoProvider {
    fn command(&self) -> &str {
        "github"
    }

    fn usage(&self) -> &str {
        "Show repository commits: github commits <username>/<repository> [count]"
    }

    async fn exec_command(&self, tokens: &[String]) -> Result<Reply, ProviderError> {
        let action = tokens.get(1).map(String::as_str);
        tracing::info!(command = "github", action = ?action, "Repository command received");

        match action {
            Some("commits") => match tokens.get(2) {
                Some(pair) => self.commits(pair, tokens.get(3)).await,
                None => Ok(Reply::text(COMMITS_USAGE)),
            },
            _ => Ok(Reply::text(HELP)),
        }
    }
}
