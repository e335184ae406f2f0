use boti_core::testing::MockTransport;
use boti_core::{Messenger, PeerId, Reply, SessionState, StateCell, Transport, SEQUENCE_PACING};
use std::sync::Arc;
use tokio::time::Instant;

async fn messenger(transport: MockTransport) -> (Arc<MockTransport>, Messenger) {
    let transport = Arc::new(transport);
    transport.connect().await.unwrap();
    let state = Arc::new(StateCell::new(SessionState::Connected));
    (transport.clone(), Messenger::new(transport, state))
}

fn alice() -> PeerId {
    PeerId::from("alice@example.com")
}

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test(start_paused = true)]
async fn test_sequence_is_paced_between_items_only() {
    let (transport, messenger) = messenger(MockTransport::new()).await;

    let start = Instant::now();
    assert!(messenger.send_sequence(&alice(), &texts(&["a", "b", "c"])).await);
    let elapsed = start.elapsed();

    assert_eq!(transport.sent_texts(), vec!["a", "b", "c"]);
    assert!(elapsed >= SEQUENCE_PACING * 2);
    assert!(elapsed < SEQUENCE_PACING * 3);
}

#[tokio::test(start_paused = true)]
async fn test_sequence_stops_at_first_failure() {
    let (transport, messenger) = messenger(MockTransport::new().fail_send_at(2)).await;

    let ok = messenger
        .send_sequence(&alice(), &texts(&["a", "b", "c"]))
        .await;

    assert!(!ok);
    assert_eq!(transport.sent_texts(), vec!["a"]);
    let attempted: Vec<String> = transport
        .send_attempts()
        .into_iter()
        .map(|(_, text)| text)
        .collect();
    assert_eq!(attempted, vec!["a", "b"]);
}

#[tokio::test(start_paused = true)]
async fn test_single_send_is_not_delayed() {
    let (transport, messenger) = messenger(MockTransport::new()).await;

    let start = Instant::now();
    assert!(messenger.send(&alice(), "hello").await);
    assert_eq!(start.elapsed(), std::time::Duration::ZERO);
    assert_eq!(transport.sent(), vec![(alice(), "hello".to_string())]);
}

#[tokio::test]
async fn test_empty_sequence_is_a_successful_no_op() {
    let (transport, messenger) = messenger(MockTransport::new()).await;

    assert!(messenger.send_sequence(&alice(), &[]).await);
    assert!(transport.send_attempts().is_empty());
}

#[tokio::test]
async fn test_send_refused_when_not_connected() {
    let transport = Arc::new(MockTransport::new());
    let state = Arc::new(StateCell::new(SessionState::Disconnected));
    let messenger = Messenger::new(transport.clone(), state);

    assert!(!messenger.is_live());
    assert!(!messenger.send(&alice(), "hello").await);
    assert!(transport.send_attempts().is_empty());
}

#[tokio::test]
async fn test_send_refused_when_link_dropped() {
    let (transport, messenger) = messenger(MockTransport::new()).await;
    transport.drop_link();

    assert!(!messenger.send(&alice(), "hello").await);
    assert!(transport.send_attempts().is_empty());
}

#[tokio::test]
async fn test_transport_error_is_reported_as_false() {
    let (transport, messenger) = messenger(MockTransport::new().fail_send_of("bad")).await;

    assert!(!messenger.send(&alice(), "bad").await);
    assert!(messenger.send(&alice(), "good").await);
    assert_eq!(transport.sent_texts(), vec!["good"]);
}

#[tokio::test(start_paused = true)]
async fn test_deliver_routes_each_reply_kind() {
    let (transport, messenger) = messenger(MockTransport::new()).await;

    assert!(messenger.deliver(&alice(), &Reply::Silent).await);
    assert!(transport.send_attempts().is_empty());

    assert!(messenger.deliver(&alice(), &Reply::text("one")).await);
    assert!(
        messenger
            .deliver(&alice(), &Reply::Sequence(texts(&["two", "three"])))
            .await
    );
    assert_eq!(transport.sent_texts(), vec!["one", "two", "three"]);
}
