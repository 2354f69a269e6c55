use futures_util::stream::StreamExt;
use std::future::Future;
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook_tokio::{Handle, Signals};
use tokio::sync::watch;

/// Create a linked trigger/listener pair.
///
/// Listeners may be cloned; every clone observes the same trigger.
pub fn channel() -> (ShutdownTrigger, ShutdownListener) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, ShutdownListener { rx })
}

#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl ShutdownListener {
    /// Resolves once the trigger fires or is dropped
    pub async fn triggered(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Run `work` to completion unless `stop` resolves first.
///
/// Returns `None` when stopped; `work` is dropped at its current await point.
pub async fn unless_stopped<W, S>(work: W, stop: S) -> Option<W::Output>
where
    W: Future,
    S: Future<Output = ()>,
{
    tokio::select! {
        biased;
        _ = stop => None,
        output = work => Some(output),
    }
}

/// SIGINT/SIGTERM subscription, registered before any task starts
pub struct OsSignals {
    signals: Signals,
    handle: Handle,
}

impl OsSignals {
    pub fn register() -> std::io::Result<Self> {
        let signals = Signals::new([SIGTERM, SIGINT])?;
        let handle = signals.handle();
        Ok(Self { signals, handle })
    }

    /// Wait for the next termination signal
    pub async fn recv(&mut self) -> Option<i32> {
        while let Some(signal) = self.signals.next().await {
            match signal {
                SIGTERM | SIGINT => return Some(signal),
                _ => {}
            }
        }
        None
    }

    pub fn close(self) {
        self.handle.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_listener_resolves_after_trigger() {
        let (trigger, mut listener) = channel();

        let waiter = tokio::spawn(async move { listener.triggered().await });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        trigger.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_listener_resolves_when_trigger_dropped() {
        let (trigger, mut listener) = channel();
        drop(trigger);

        tokio::time::timeout(Duration::from_secs(1), listener.triggered())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_stop_during_startup_abandons_work() {
        let (trigger, mut listener) = channel();
        trigger.trigger();

        let outcome = unless_stopped(std::future::pending::<()>(), listener.triggered()).await;
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn test_startup_work_completes_when_not_stopped() {
        let (_trigger, mut listener) = channel();

        let outcome = unless_stopped(async { 42 }, listener.triggered()).await;
        assert_eq!(outcome, Some(42));
    }

    #[tokio::test]
    async fn test_cloned_listeners_observe_the_same_trigger() {
        let (trigger, mut first) = channel();
        let mut second = first.clone();

        trigger.trigger();
        tokio::time::timeout(Duration::from_secs(1), async {
            first.triggered().await;
            second.triggered().await;
        })
        .await
        .unwrap();
    }
}
