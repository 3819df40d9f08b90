//! Live listener handles.
//!
//! A `Subscription` owns one background task that forwards values from a
//! `watch` channel to a callback. Teardown happens exactly once, either
//! through `unsubscribe()` or on drop. Deliveries racing with teardown are
//! dropped instead of reaching the callback.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

/// Error pushed by a remote listener (permission revoked, stream reset...).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ListenerError(pub String);

/// What a store listener delivers: a fresh snapshot or an error.
pub type ListenerEvent<T> = Result<T, ListenerError>;

/// Cancellation handle for one live listener.
pub struct Subscription {
    label: &'static str,
    active: Arc<AtomicBool>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Forward every value of `rx` (current value first) to `on_change`.
    pub fn watch<T, F>(label: &'static str, rx: watch::Receiver<T>, on_change: F) -> Self
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        Self::watch_async(label, rx, move |value| {
            on_change(value);
            std::future::ready(())
        })
    }

    /// Like `watch`, but the handler is async. Values are handled one at a
    /// time, in order.
    pub fn watch_async<T, F, Fut>(label: &'static str, mut rx: watch::Receiver<T>, handler: F) -> Self
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let active = Arc::new(AtomicBool::new(true));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let flag = Arc::clone(&active);

        let task = tokio::spawn(async move {
            let initial = rx.borrow_and_update().clone();
            if flag.load(Ordering::SeqCst) {
                handler(initial).await;
            }

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            tracing::debug!(label, "Listener source closed");
                            break;
                        }
                        let value = rx.borrow_and_update().clone();
                        if !flag.load(Ordering::SeqCst) {
                            tracing::trace!(label, "Delivery after teardown ignored");
                            break;
                        }
                        handler(value).await;
                    }
                }
            }
        });

        tracing::debug!(label, "Listener subscribed");
        Self {
            label,
            active,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        }
    }

    /// Subscribe to a store listener. Errors are logged and skipped so the
    /// consumer keeps its last known state.
    pub fn listen<T, F>(
        label: &'static str,
        rx: watch::Receiver<ListenerEvent<T>>,
        on_change: F,
    ) -> Self
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        Self::watch(label, rx, move |event: ListenerEvent<T>| match event {
            Ok(value) => on_change(value),
            Err(e) => {
                tracing::warn!(label, error = %e, "Listener error, keeping last known state");
            }
        })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Tear the listener down. Returns `true` only for the call that
    /// actually performed the teardown.
    pub fn unsubscribe(&mut self) -> bool {
        if !self.active.swap(false, Ordering::SeqCst) {
            return false;
        }
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        // The task exits on its own after the shutdown signal; detach it.
        self.task.take();
        tracing::debug!(label = self.label, "Listener unsubscribed");
        true
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
