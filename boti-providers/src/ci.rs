// ABOUTME: CI server command ("hudson"): trigger builds, list jobs and views
// ABOUTME: The server API sits behind the CiServer trait

use async_trait::async_trait;
use boti_core::{CommandProvider, ProviderError, Reply};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const BUILD_USAGE: &str =
    "Please, tell me the name of the project to build: hudson build project_name";

const HELP: &str = "Please, tell me what action do you want me to do with Hudson:
  -> build <job_name> - Launch a build on <job_name>: hudson build sample_name
  -> jobs <view> - List all existing jobs on given <view> (default \"All\"): hudson jobs view_name
  -> views - List all existing views: hudson views";

/// A job as the CI server reports it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiJob {
    pub name: String,
    pub url: String,
    /// Status colour, e.g. "blue" or "red"
    pub color: String,
}

impl CiJob {
    /// Human status for the job's colour
    pub fn status(&self) -> &'static str {
        match self.color.as_str() {
            "blue" => "OK",
            "red" => "FAIL",
            "yellow" => "TESTS FAIL",
            "grey" => "NO BUILD",
            _ => "NO STATUS",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiView {
    pub name: String,
    pub url: String,
}

/// Remote CI server API.
///
/// Implementations return [`ProviderError::NotFound`] for unknown jobs and
/// views.
#[async_trait]
pub trait CiServer: Send + Sync {
    async fn build(&self, job: &str) -> Result<(), ProviderError>;

    async fn jobs(&self, view: &str) -> Result<Vec<CiJob>, ProviderError>;

    async fn views(&self) -> Result<Vec<CiView>, ProviderError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiSettings {
    /// View listed by `jobs` when none is given
    #[serde(default = "default_view")]
    pub default_view: String,
}

fn default_view() -> String {
    "All".to_string()
}

impl Default for CiSettings {
    fn default() -> Self {
        Self {
            default_view: default_view(),
        }
    }
}

pub struct CiProvider {
    server: Arc<dyn CiServer>,
    settings: CiSettings,
}

impl CiProvider {
    pub fn new(server: Arc<dyn CiServer>, settings: CiSettings) -> Self {
        Self { server, settings }
    }

    async fn build(&self, job: &str) -> Result<Reply, ProviderError> {
        match self.server.build(job).await {
            Ok(()) => Ok(Reply::text(format!("Build for '{}' successfully sent", job))),
            Err(ProviderError::NotFound { .. }) => {
                Ok(Reply::text(format!("Project '{}' not found", job)))
            }
            Err(e) => Err(e),
        }
    }

    async fn jobs(&self, view: &str) -> Result<Reply, ProviderError> {
        let jobs = match self.server.jobs(view).await {
            Ok(jobs) => jobs,
            Err(ProviderError::NotFound { .. }) => {
                return Ok(Reply::text(format!("View '{}' doesn't exist.", view)))
            }
            Err(e) => return Err(e),
        };

        if jobs.is_empty() {
            return Ok(Reply::text(format!("No jobs in view '{}'", view)));
        }

        let lines: Vec<String> = jobs
            .iter()
            .map(|job| format!("-> [{}] {} ({})", job.status(), job.name, job.url))
            .collect();
        Ok(Reply::Text(lines.join("\n")))
    }

    async fn views(&self) -> Result<Reply, ProviderError> {
        let views = self.server.views().await?;
        if views.is_empty() {
            return Ok(Reply::text("No views defined"));
        }

        let lines: Vec<String> = views
            .iter()
            .map(|view| format!("-> {} ({})", view.name, view.url))
            .collect();
        Ok(Reply::Text(lines.join("\n")))
    }
}

#[async_trait]
impl CommandProvider for CiProvider {
    fn command(&self) -> &str {
        "hudson"
    }

    fn usage(&self) -> &str {
        "Manage the CI server: hudson build <job> | hudson jobs [view] | hudson views"
    }

    async fn exec_command(&self, tokens: &[String]) -> Result<Reply, ProviderError> {
        let action = tokens.get(1).map(String::as_str);
        tracing::info!(command = "hudson", action = ?action, "CI command received");

        match action {
            Some("build") => match tokens.get(2) {
                Some(job) => self.build(job).await,
                None => Ok(Reply::text(BUILD_USAGE)),
            },
            Some("jobs") => {
                let view = tokens
                    .get(2)
                    .map(String::as_str)
                    .unwrap_or(&self.settings.default_view);
                self.jobs(view).await
            }
            Some("views") => self.views().await,
            _ => Ok(Reply::text(HELP)),
        }
    }
}
