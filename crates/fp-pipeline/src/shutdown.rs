//! A cooperative shutdown signal shared by the scheduler and every
//! consumer worker, in the same spirit as the source system's
//! per-session cancel tokens — but there is exactly one signal here,
//! not a token per turn, since every task in this pipeline is shutting
//! down together rather than being individually cancellable.

use tokio::sync::watch;

#[derive(Clone)]
pub struct ShutdownSignal {
    tx: watch::Sender<bool>,
}

pub struct ShutdownHandle {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn new() -> (Self, ShutdownHandle) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, ShutdownHandle { rx })
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

impl ShutdownHandle {
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown has been triggered. Safe to call
    /// repeatedly and to race against in a `select!`.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|shutdown| *shutdown).await;
    }
}

impl Clone for ShutdownHandle {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_resolves_after_trigger() {
        let (signal, mut handle) = ShutdownSignal::new();
        assert!(!handle.is_shutdown());

        let waiter = tokio::spawn(async move {
            handle.wait().await;
            handle.is_shutdown()
        });

        signal.trigger();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn multiple_handles_all_observe_shutdown() {
        let (signal, handle_a) = ShutdownSignal::new();
        let handle_b = handle_a.clone();
        signal.trigger();
        assert!(handle_a.is_shutdown());
        assert!(handle_b.is_shutdown());
    }
}
