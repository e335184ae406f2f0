// ABOUTME: Failure isolation for callbacks and command handlers
// ABOUTME: Catches errors and panics, logs them with context, never propagates

use crate::peer::PeerId;
use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Run `fut`, catching both `Err` results and panics.
///
/// Failures are logged with the handler label, the originating peer and the
/// raw input, then swallowed. Returns `None` on failure.
pub async fn isolate<F, T>(label: &str, origin: &PeerId, input: &str, fut: F) -> Option<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            tracing::error!(
                handler = label,
                peer = %origin,
                input = %input,
                error = %e,
                "Handler failed"
            );
            None
        }
        Err(panic) => {
            tracing::error!(
                handler = label,
                peer = %origin,
                input = %input,
                panic = %panic_message(panic.as_ref()),
                "Handler panicked"
            );
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// A callback wrapped so that its failures stay inside the wrapper.
///
/// The event loop only ever calls guarded callbacks, so one misbehaving
/// handler cannot stop delivery of later events.
pub struct Guarded<H: ?Sized> {
    label: &'static str,
    inner: Arc<H>,
}

impl<H: ?Sized> Guarded<H> {
    pub fn new(label: &'static str, inner: Arc<H>) -> Self {
        Self { label, inner }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Invoke the wrapped callback through `call`. Returns false if it failed.
    pub async fn call<'a, F, Fut>(&'a self, origin: &PeerId, input: &str, call: F) -> bool
    where
        F: FnOnce(&'a H) -> Fut,
        Fut: Future<Output = anyhow::Result<()>> + 'a,
    {
        isolate(self.label, origin, input, call(self.inner.as_ref()))
            .await
            .is_some()
    }
}

impl<H: ?Sized> Clone for Guarded<H> {
    fn clone(&self) -> Self {
        Self {
            label: self.label,
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> PeerId {
        PeerId::from("alice@example.com")
    }

    #[tokio::test]
    async fn test_isolate_passes_success_through() {
        let value = isolate("test", &peer(), "input", async { Ok(42) }).await;
        assert_eq!(value, Some(42));
    }

    #[tokio::test]
    async fn test_isolate_swallows_errors() {
        let value: Option<()> = isolate("test", &peer(), "input", async {
            Err(anyhow::anyhow!("boom"))
        })
        .await;
        assert!(value.is_none());
    }

    fn explode() -> anyhow::Result<()> {
        panic!("handler exploded");
    }

    #[tokio::test]
    async fn test_isolate_catches_panics() {
        let value = isolate("test", &peer(), "input", async { explode() }).await;
        assert!(value.is_none());
    }

    trait Greeter: Send + Sync {
        fn greet(&self, name: &str) -> anyhow::Result<()>;
    }

    struct Strict;

    impl Greeter for Strict {
        fn greet(&self, name: &str) -> anyhow::Result<()> {
            if name.is_empty() {
                anyhow::bail!("no name");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_guarded_reports_outcome() {
        let guarded: Guarded<dyn Greeter> = Guarded::new("greeter", Arc::new(Strict));
        assert_eq!(guarded.label(), "greeter");

        let ok = guarded
            .call(&peer(), "bob", |g| async move { g.greet("bob") })
            .await;
        assert!(ok);

        let failed = guarded
            .call(&peer(), "", |g| async move { g.greet("") })
            .await;
        assert!(!failed);
    }
}
