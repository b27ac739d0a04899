use std::future::Future;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

struct ActiveSubscription {
    generation: u64,
    cancellation_token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Holds at most one live subscription task.
///
/// Replacing the occupant cancels the previous task and waits for it to finish
/// before the new one is spawned, so two subscriptions never overlap.
#[derive(Default)]
pub struct SubscriptionSlot {
    active: Option<ActiveSubscription>,
}

impl SubscriptionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.generation)
    }

    /// Tears down the current occupant, then spawns `task` with a fresh token.
    pub async fn replace<F, Fut>(&mut self, generation: u64, task: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.clear().await;
        let cancellation_token = CancellationToken::new();
        let handle = tokio::spawn(task(cancellation_token.clone()));
        debug!(generation, "Subscription started");
        self.active = Some(ActiveSubscription {
            generation,
            cancellation_token,
            handle,
        });
    }

    /// Cancels the current occupant, if any, and waits for it to stop.
    pub async fn clear(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancellation_token.cancel();
            if let Err(e) = active.handle.await {
                warn!(
                    generation = active.generation,
                    "Subscription task ended abnormally: {}", e
                );
            }
            debug!(generation = active.generation, "Subscription stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_replace_waits_for_previous_task() {
        let running = Arc::new(AtomicUsize::new(0));
        let max_running = Arc::new(AtomicUsize::new(0));
        let mut slot = SubscriptionSlot::new();

        for generation in 1..=3 {
            let running = running.clone();
            let max_running = max_running.clone();
            slot.replace(generation, move |token| async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                max_running.fetch_max(now, Ordering::SeqCst);
                token.cancelled().await;
                running.fetch_sub(1, Ordering::SeqCst);
            })
            .await;
            assert_eq!(slot.generation(), Some(generation));
        }

        slot.clear().await;
        assert_eq!(slot.generation(), None);
        assert_eq!(running.load(Ordering::SeqCst), 0);
        assert_eq!(max_running.load(Ordering::SeqCst), 1);
    }
}
