// ABOUTME: Local stdin/stdout transport for running the bot without a chat server
// ABOUTME: Each input line is a message from the console peer; /subscribe simulates friend requests

use async_trait::async_trait;
use boti_core::{
    EventStream, InboundMessage, PeerId, SubscriptionRequest, Transport, TransportError,
    TransportEvent,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};

/// Transport over a line-oriented reader and a writer.
///
/// Input lines:
/// - `/subscribe [peer]` raises a friend request from `peer` (default: the
///   console peer)
/// - `/quit` ends the event stream
/// - anything else is a chat message from the console peer
///
/// Outbound messages are written as `[to] text`.
pub struct ConsoleTransport<R, W> {
    peer: PeerId,
    connected: AtomicBool,
    input: Mutex<Option<R>>,
    output: tokio::sync::Mutex<W>,
}

impl ConsoleTransport<BufReader<Stdin>, Stdout> {
    pub fn stdio(peer: PeerId) -> Self {
        Self::new(peer, BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> ConsoleTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(peer: PeerId, input: R, output: W) -> Self {
        Self {
            peer,
            connected: AtomicBool::new(false),
            input: Mutex::new(Some(input)),
            output: tokio::sync::Mutex::new(output),
        }
    }

    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    /// Locked access to the writer
    pub async fn writer(&self) -> tokio::sync::MutexGuard<'_, W> {
        self.output.lock().await
    }

    async fn write_line(&self, line: &str) -> Result<(), TransportError> {
        let mut output = self.output.lock().await;
        output.write_all(line.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
        Ok(())
    }
}

enum ConsoleLine {
    Event(TransportEvent),
    Quit,
    Blank,
}

fn read_line(line: &str, peer: &PeerId) -> ConsoleLine {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ConsoleLine::Blank;
    }
    if trimmed == "/quit" {
        return ConsoleLine::Quit;
    }

    if let Some(rest) = trimmed.strip_prefix("/subscribe") {
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            let from = match rest.trim() {
                "" => peer.clone(),
                requester => PeerId::from(requester),
            };
            return ConsoleLine::Event(TransportEvent::SubscriptionRequest(
                SubscriptionRequest::new(from),
            ));
        }
    }

    ConsoleLine::Event(TransportEvent::Message(InboundMessage::new(
        peer.clone(),
        line,
    )))
}

#[async_trait]
impl<R, W> Transport for ConsoleTransport<R, W>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send,
{
    fn transport_id(&self) -> &'static str {
        "console"
    }

    async fn connect(&self) -> Result<(), TransportError> {
        self.connected.store(true, Ordering::SeqCst);
        tracing::info!(peer = %self.peer, "Console attached");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send(&self, to: &PeerId, text: &str) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        self.write_line(&format!("[{}] {}", to, text)).await
    }

    async fn accept_subscription(&self, peer: &PeerId) -> Result<(), TransportError> {
        self.write_line(&format!("* accepted friend request from {}", peer))
            .await
    }

    async fn decline_subscription(&self, peer: &PeerId) -> Result<(), TransportError> {
        self.write_line(&format!("* declined friend request from {}", peer))
            .await
    }

    async fn event_stream(&self) -> Result<EventStream, TransportError> {
        let input = self
            .input
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or_else(|| TransportError::Stream("console input already taken".to_string()))?;
        let peer = self.peer.clone();

        let events = futures_util::stream::unfold(
            (input.lines(), peer),
            |(mut lines, peer)| async move {
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => match read_line(&line, &peer) {
                            ConsoleLine::Event(event) => return Some((event, (lines, peer))),
                            ConsoleLine::Blank => continue,
                            ConsoleLine::Quit => return None,
                        },
                        Ok(None) => return None,
                        Err(e) => {
                            tracing::error!(error = %e, "Error reading console input");
                            return None;
                        }
                    }
                }
            },
        );

        Ok(Box::pin(events))
    }
}
