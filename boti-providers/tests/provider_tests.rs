use async_trait::async_trait;
use boti_core::{
    CommandHandler, CommandProvider, Conversational, ConversationalFallback, Invocation, PeerId,
    ProviderCommand, ProviderError, Reply,
};
use boti_providers::{
    Account, CannedReply, CiJob, CiProvider, CiServer, CiSettings, CiView, Commit, CommitSource,
    Help, Post, RepoProvider, RepoSettings, SocialProvider, SocialSettings, Timeline,
    UNKNOWN_INPUT_REPLY,
};
use chrono::{TimeZone, Utc};
use std::sync::{Arc, Mutex};

fn tokens(line: &str) -> Vec<String> {
    boti_core::parse(line).unwrap()
}

// =============================================================================
// CI server
// =============================================================================

#[derive(Default)]
struct FakeCi {
    built: Mutex<Vec<String>>,
    views_requested: Mutex<Vec<String>>,
    down: bool,
}

#[async_trait]
impl CiServer for FakeCi {
    async fn build(&self, job: &str) -> Result<(), ProviderError> {
        if self.down {
            return Err(ProviderError::Unavailable("connection refused".to_string()));
        }
        if job != "core" {
            return Err(ProviderError::NotFound {
                what: format!("job {}", job),
            });
        }
        self.built.lock().unwrap().push(job.to_string());
        Ok(())
    }

    async fn jobs(&self, view: &str) -> Result<Vec<CiJob>, ProviderError> {
        self.views_requested.lock().unwrap().push(view.to_string());
        match view {
            "All" => Ok(vec![
                CiJob {
                    name: "core".to_string(),
                    url: "http://ci/job/core".to_string(),
                    color: "blue".to_string(),
                },
                CiJob {
                    name: "web".to_string(),
                    url: "http://ci/job/web".to_string(),
                    color: "red".to_string(),
                },
            ]),
            "Empty" => Ok(Vec::new()),
            other => Err(ProviderError::NotFound {
                what: format!("view {}", other),
            }),
        }
    }

    async fn views(&self) -> Result<Vec<CiView>, ProviderError> {
        Ok(vec![CiView {
            name: "All".to_string(),
            url: "http://ci/view/All".to_string(),
        }])
    }
}

fn ci(server: Arc<FakeCi>) -> CiProvider {
    CiProvider::new(server, CiSettings::default())
}

#[tokio::test]
async fn test_ci_build_known_and_unknown_jobs() {
    let server = Arc::new(FakeCi::default());
    let provider = ci(server.clone());

    let reply = provider.exec_command(&tokens("hudson build core")).await.unwrap();
    assert_eq!(reply, Reply::text("Build for 'core' successfully sent"));
    assert_eq!(*server.built.lock().unwrap(), vec!["core"]);

    let reply = provider.exec_command(&tokens("hudson build nope")).await.unwrap();
    assert_eq!(reply, Reply::text("Project 'nope' not found"));
}

#[tokio::test]
async fn test_ci_build_without_job_asks_for_one() {
    let provider = ci(Arc::new(FakeCi::default()));
    let reply = provider.exec_command(&tokens("hudson build")).await.unwrap();
    assert_eq!(
        reply,
        Reply::text("Please, tell me the name of the project to build: hudson build project_name")
    );
}

#[tokio::test]
async fn test_ci_jobs_uses_default_view() {
    let server = Arc::new(FakeCi::default());
    let provider = ci(server.clone());

    let reply = provider.exec_command(&tokens("hudson jobs")).await.unwrap();
    assert_eq!(
        reply,
        Reply::text("-> [OK] core (http://ci/job/core)\n-> [FAIL] web (http://ci/job/web)")
    );
    assert_eq!(*server.views_requested.lock().unwrap(), vec!["All"]);
}

#[tokio::test]
async fn test_ci_jobs_unknown_and_empty_views() {
    let provider = ci(Arc::new(FakeCi::default()));

    let reply = provider.exec_command(&tokens("hudson jobs Nightly")).await.unwrap();
    assert_eq!(reply, Reply::text("View 'Nightly' doesn't exist."));

    let reply = provider.exec_command(&tokens("hudson jobs Empty")).await.unwrap();
    assert_eq!(reply, Reply::text("No jobs in view 'Empty'"));
}

#[tokio::test]
async fn test_ci_views_and_help() {
    let provider = ci(Arc::new(FakeCi::default()));

    let reply = provider.exec_command(&tokens("hudson views")).await.unwrap();
    assert_eq!(reply, Reply::text("-> All (http://ci/view/All)"));

    let Reply::Text(help) = provider.exec_command(&tokens("hudson")).await.unwrap() else {
        panic!("expected help text");
    };
    assert!(help.contains("hudson build sample_name"));
}

#[tokio::test]
async fn test_ci_outage_reaches_peer_as_safe_text() {
    let server = Arc::new(FakeCi {
        down: true,
        ..Default::default()
    });
    let handler = ProviderCommand::new(ci(server));
    let invocation = Invocation::new(
        tokens("hudson build core"),
        "hudson build core",
        PeerId::from("alice@example.com"),
    );

    let reply = handler.handle(&invocation).await.unwrap();
    let Reply::Text(text) = reply else {
        panic!("expected text reply");
    };
    assert!(!text.contains("connection refused"));
}

// =============================================================================
// Repository commits
// =============================================================================

struct FakeCommits {
    requested: Mutex<Vec<(String, String, usize)>>,
}

impl FakeCommits {
    fn new() -> Self {
        Self {
            requested: Mutex::new(Vec::new()),
        }
    }
}

fn commit(n: usize) -> Commit {
    Commit {
        id: format!("{:040x}", n),
        message: format!("Commit number {}\n\nbody", n),
        author_name: "Ada".to_string(),
        author_email: "ada@example.com".to_string(),
        committed_at: Utc.with_ymd_and_hms(2012, 1, 2, 3, 4, 0).unwrap(),
        url: format!("https://github.com/rails/rails/commit/{}", n),
    }
}

#[async_trait]
impl CommitSource for FakeCommits {
    async fn commits(
        &self,
        owner: &str,
        repository: &str,
        count: usize,
    ) -> Result<Vec<Commit>, ProviderError> {
        self.requested
            .lock()
            .unwrap()
            .push((owner.to_string(), repository.to_string(), count));
        if repository == "missing" {
            return Err(ProviderError::NotFound {
                what: "repository".to_string(),
            });
        }
        Ok((1..=count).map(commit).collect())
    }
}

#[tokio::test]
async fn test_repo_commits_with_count() {
    let source = Arc::new(FakeCommits::new());
    let provider = RepoProvider::new(source.clone(), RepoSettings::default());

    let reply = provider
        .exec_command(&tokens("github commits rails/rails 2"))
        .await
        .unwrap();

    let Reply::Sequence(items) = reply else {
        panic!("expected one message per commit");
    };
    assert_eq!(items.len(), 2);
    assert_eq!(
        items[0],
        "[00000000] \"Commit number 1\"\nAda <ada@example.com> 02/01/2012 03:04\nhttps://github.com/rails/rails/commit/1"
    );
    assert_eq!(
        *source.requested.lock().unwrap(),
        vec![("rails".to_string(), "rails".to_string(), 2)]
    );
}

#[tokio::test]
async fn test_repo_count_falls_back_to_default() {
    let source = Arc::new(FakeCommits::new());
    let provider = RepoProvider::new(source.clone(), RepoSettings::default());

    for line in [
        "github commits rails/rails",
        "github commits rails/rails 0",
        "github commits rails/rails 11",
        "github commits rails/rails lots",
    ] {
        provider.exec_command(&tokens(line)).await.unwrap();
    }

    let counts: Vec<usize> = source
        .requested
        .lock()
        .unwrap()
        .iter()
        .map(|(_, _, count)| *count)
        .collect();
    assert_eq!(counts, vec![5, 5, 5, 5]);
}

#[tokio::test]
async fn test_repo_argument_errors() {
    let provider = RepoProvider::new(Arc::new(FakeCommits::new()), RepoSettings::default());

    let reply = provider.exec_command(&tokens("github commits")).await.unwrap();
    assert_eq!(
        reply,
        Reply::text("Please, tell me the username/repository pair: github commits rails/rails")
    );

    let reply = provider
        .exec_command(&tokens("github commits rails"))
        .await
        .unwrap();
    assert_eq!(
        reply,
        Reply::text("The format for username and repository should be: username/repository")
    );

    let reply = provider
        .exec_command(&tokens("github commits rails/missing"))
        .await
        .unwrap();
    assert_eq!(reply, Reply::text("Repository 'rails/missing' not found"));
}

// =============================================================================
// Social timeline
// =============================================================================

struct FakeTimeline {
    published: Mutex<Vec<String>>,
}

fn post(text: &str) -> Post {
    Post {
        text: text.to_string(),
        created_at: Utc.with_ymd_and_hms(2011, 12, 12, 15, 32, 0).unwrap(),
    }
}

#[async_trait]
impl Timeline for FakeTimeline {
    async fn account(&self, user: &str) -> Result<Option<Account>, ProviderError> {
        Ok(match user {
            "ada" => Some(Account {
                handle: "ada".to_string(),
                protected: false,
            }),
            "secret" => Some(Account {
                handle: "secret".to_string(),
                protected: true,
            }),
            _ => None,
        })
    }

    async fn posts(&self, _user: &str, count: usize) -> Result<Vec<Post>, ProviderError> {
        Ok((0..count).map(|i| post(&format!("post {}", i))).collect())
    }

    async fn publish(&self, text: &str) -> Result<Post, ProviderError> {
        self.published.lock().unwrap().push(text.to_string());
        Ok(post(text))
    }
}

fn social() -> (Arc<FakeTimeline>, SocialProvider) {
    let timeline = Arc::new(FakeTimeline {
        published: Mutex::new(Vec::new()),
    });
    (
        timeline.clone(),
        SocialProvider::new(timeline, SocialSettings::default()),
    )
}

#[tokio::test]
async fn test_social_last_strips_at_sign() {
    let (_timeline, provider) = social();

    let reply = provider.exec_command(&tokens("twitter last @ada")).await.unwrap();
    assert_eq!(reply, Reply::text("\"post 0\" - 12/12/2011 15:32"));
}

#[tokio::test]
async fn test_social_show_returns_count_posts() {
    let (_timeline, provider) = social();

    let reply = provider
        .exec_command(&tokens("twitter show ada 3"))
        .await
        .unwrap();
    let Reply::Sequence(items) = reply else {
        panic!("expected a sequence");
    };
    assert_eq!(items.len(), 3);

    let reply = provider.exec_command(&tokens("twitter show ada")).await.unwrap();
    let Reply::Sequence(items) = reply else {
        panic!("expected a sequence");
    };
    assert_eq!(items.len(), 5);
}

#[tokio::test]
async fn test_social_refuses_protected_and_unknown_accounts() {
    let (_timeline, provider) = social();

    let reply = provider
        .exec_command(&tokens("twitter last secret"))
        .await
        .unwrap();
    assert_eq!(
        reply,
        Reply::text("-> @secret has a protected account. I can't show you the tweets.")
    );

    let reply = provider
        .exec_command(&tokens("twitter last ghost"))
        .await
        .unwrap();
    assert_eq!(reply, Reply::text("-> @ghost doesn't exist."));
}

#[tokio::test]
async fn test_social_new_publishes_quoted_text() {
    let (timeline, provider) = social();

    let reply = provider
        .exec_command(&tokens("twitter new \"hello world\""))
        .await
        .unwrap();
    assert_eq!(reply, Reply::text("Tweet sent: \"hello world\""));
    assert_eq!(*timeline.published.lock().unwrap(), vec!["hello world"]);

    let reply = provider.exec_command(&tokens("twitter new")).await.unwrap();
    assert_eq!(
        reply,
        Reply::text("Please, give me the tweet text: twitter new \"Lorem ipsum dolor\"")
    );
}

// =============================================================================
// Help and fallback
// =============================================================================

#[tokio::test]
async fn test_help_lists_every_provider() {
    let (_timeline, social) = social();
    let repo = RepoProvider::new(Arc::new(FakeCommits::new()), RepoSettings::default());
    let help = Help::new().with(&repo).with(&social);

    let reply = help.exec_command(&tokens("help")).await.unwrap();
    let Reply::Text(text) = reply else {
        panic!("expected text");
    };
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Available commands:");
    assert_eq!(lines[1], format!("-> github: {}", repo.usage()));
    assert_eq!(lines[2], format!("-> twitter: {}", social.usage()));
    assert_eq!(lines[3], format!("-> help: {}", Help::USAGE));
}

#[tokio::test]
async fn test_canned_reply_as_default_handler() {
    assert_eq!(
        CannedReply::default().say("anything").await,
        Some(UNKNOWN_INPUT_REPLY.to_string())
    );

    let fallback = ConversationalFallback::new(CannedReply::default());
    let invocation = Invocation::new(Vec::new(), "hola", PeerId::from("alice@example.com"));
    let reply = fallback.handle(&invocation).await.unwrap();
    assert_eq!(reply, Reply::text(UNKNOWN_INPUT_REPLY));
}

#[test]
fn test_settings_deserialize_with_defaults() {
    let settings: RepoSettings = toml::from_str("max_count = 20").unwrap();
    assert_eq!(settings.default_count, 5);
    assert_eq!(settings.max_count, 20);

    let settings: CiSettings = toml::from_str("").unwrap();
    assert_eq!(settings.default_view, "All");
}
