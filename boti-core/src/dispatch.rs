// ABOUTME: Routes parsed invocations to command handlers and runs them off the event loop
// ABOUTME: Bounded worker pool fed by a queue; dispatch itself never waits on a handler

use crate::config::DispatchConfig;
use crate::error::DispatchError;
use crate::guard::isolate;
use crate::messenger::Messenger;
use crate::peer::PeerId;
use crate::registry::{CommandHandler, CommandRegistry, Invocation};
use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

/// Sent to a peer whose command failed. Never carries error detail.
pub const FAILURE_NOTICE: &str = "-> Can't do that operation";

/// Sent to a peer whose command was refused because the queue is full
pub const BUSY_NOTICE: &str = "-> Too busy right now, try again in a moment";

/// Where an invocation was sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// A registered command, by name
    Command(String),
    /// The caller-supplied default handler
    Default,
}

struct Job {
    label: String,
    origin: PeerId,
    input: String,
    work: BoxFuture<'static, anyhow::Result<()>>,
}

/// Fixed-size pool of command workers.
///
/// Submissions go onto a bounded queue and never block: when the queue is
/// full the submission is refused. A pump task takes jobs off the queue and
/// runs each one once a worker permit is free. There is no timeout, so a hung
/// job keeps its permit until it finishes.
#[derive(Clone)]
pub struct WorkerPool {
    queue: mpsc::Sender<Job>,
    capacity: usize,
}

impl WorkerPool {
    /// Start the pump task. Must be called from within a Tokio runtime.
    pub fn spawn(config: &DispatchConfig) -> Self {
        let capacity = config.queue_capacity.max(1);
        let workers = config.max_concurrent.max(1);
        let (tx, rx) = mpsc::channel(capacity);

        tokio::spawn(run_pool(rx, Arc::new(Semaphore::new(workers))));
        tracing::debug!(workers, capacity, "Command worker pool started");

        Self {
            queue: tx,
            capacity,
        }
    }

    /// Queue `work` for execution. Failures inside `work` are logged against
    /// `label`, `origin` and `input`.
    pub fn submit<F>(
        &self,
        label: impl Into<String>,
        origin: &PeerId,
        input: &str,
        work: F,
    ) -> Result<(), DispatchError>
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let job = Job {
            label: label.into(),
            origin: origin.clone(),
            input: input.to_string(),
            work: Box::pin(work),
        };
        self.queue.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DispatchError::QueueFull {
                capacity: self.capacity,
            },
            mpsc::error::TrySendError::Closed(_) => DispatchError::PoolClosed,
        })
    }
}

async fn run_pool(mut queue: mpsc::Receiver<Job>, permits: Arc<Semaphore>) {
    let mut workers = JoinSet::new();

    loop {
        tokio::select! {
            job = queue.recv() => {
                let Some(job) = job else { break };
                let permit = match Arc::clone(&permits).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                workers.spawn(async move {
                    let _permit = permit;
                    isolate(&job.label, &job.origin, &job.input, job.work).await;
                });
            }
            Some(result) = workers.join_next(), if !workers.is_empty() => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Command worker aborted");
                }
            }
        }
    }

    tracing::debug!("Command queue closed, draining workers");
    while let Some(result) = workers.join_next().await {
        if let Err(e) = result {
            tracing::error!(error = %e, "Command worker aborted");
        }
    }
}

/// Matches invocations against the registry and launches the handler.
///
/// Each call produces exactly one launch (or a refusal); replies are
/// delivered to the sender by the worker once the handler returns.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
    pool: WorkerPool,
    messenger: Messenger,
}

impl Dispatcher {
    pub fn new(registry: Arc<CommandRegistry>, pool: WorkerPool, messenger: Messenger) -> Self {
        Self {
            registry,
            pool,
            messenger,
        }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Registered handler for the invocation's first token, if any
    fn resolve(&self, invocation: &Invocation) -> Option<(String, Arc<dyn CommandHandler>)> {
        let name = invocation.command()?;
        self.registry
            .lookup(name)
            .map(|handler| (name.to_string(), handler))
    }

    /// Launch the registered handler for `tokens[0]`, or `default` when the
    /// invocation is empty or names no registered command.
    pub fn dispatch(
        &self,
        invocation: Invocation,
        default: Arc<dyn CommandHandler>,
    ) -> Result<Route, DispatchError> {
        match self.resolve(&invocation) {
            Some((name, handler)) => {
                tracing::info!(command = %name, peer = %invocation.sender, "Registered command found. Executing");
                self.launch(name.clone(), handler, invocation)?;
                Ok(Route::Command(name))
            }
            None => {
                tracing::info!(peer = %invocation.sender, "Executing default action");
                self.launch("default".to_string(), default, invocation)?;
                Ok(Route::Default)
            }
        }
    }

    /// Launch the registered handler for `tokens[0]`. Returns `Ok(None)`
    /// without launching anything when no command matches.
    pub fn dispatch_registered(
        &self,
        invocation: Invocation,
    ) -> Result<Option<Route>, DispatchError> {
        match self.resolve(&invocation) {
            Some((name, handler)) => {
                tracing::info!(command = %name, peer = %invocation.sender, "Registered command found. Executing");
                self.launch(name.clone(), handler, invocation)?;
                Ok(Some(Route::Command(name)))
            }
            None => {
                tracing::warn!(
                    command = invocation.command().unwrap_or_default(),
                    tokens = ?invocation.tokens,
                    "Command not found"
                );
                Ok(None)
            }
        }
    }

    fn launch(
        &self,
        label: String,
        handler: Arc<dyn CommandHandler>,
        invocation: Invocation,
    ) -> Result<(), DispatchError> {
        let messenger = self.messenger.clone();
        let origin = invocation.sender.clone();
        let input = invocation.raw.clone();
        let handler_label = label.clone();

        self.pool.submit(label, &origin, &input, async move {
            let sender = &invocation.sender;
            match isolate(
                &handler_label,
                sender,
                &invocation.raw,
                handler.handle(&invocation),
            )
            .await
            {
                Some(reply) => {
                    messenger.deliver(sender, &reply).await;
                }
                None => {
                    messenger.send(sender, FAILURE_NOTICE).await;
                }
            }
            Ok(())
        })
    }
}
