use std::time::Duration;

use driftline_core::Id;
use tokio::task::AbortHandle;

pub type ExpiryId = Id<Expiry>;

/// A scheduled callback tied to a restriction or a pending request.
///
/// Dropping the handle cancels the callback, so replacing an entry in a map
/// is enough to disarm the previous timer. A callback that already woke up
/// when it was cancelled still runs, which is why it receives its [ExpiryId]
/// and must compare it against the current entry before acting.
#[derive(Debug)]
pub struct Expiry {
    id: ExpiryId,
    task: AbortHandle,
}

impl Expiry {
    /// Runs `on_expire` after `delay`, on the current tokio runtime.
    pub fn schedule<F>(delay: Duration, on_expire: F) -> Self
    where
        F: FnOnce(ExpiryId) + Send + 'static,
    {
        let id = ExpiryId::new();

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_expire(id)
        })
        .abort_handle();

        Self { id, task }
    }

    pub fn id(&self) -> ExpiryId {
        self.id
    }
}

impl Drop for Expiry {
    fn drop(&mut self) {
        self.task.abort()
    }
}

#[cfg(test)]
mod test {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        let _expiry = Expiry::schedule(Duration::from_secs(30), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        let expiry = Expiry::schedule(Duration::from_secs(30), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        drop(expiry);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
