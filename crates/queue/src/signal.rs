//! Single-consumer wakeup with piggy-backed control messages.
//!
//! Producers (enqueuers, finishing workers) call [`Signal::poke`] to tell
//! the dispatch loop "something changed, look again". Pokes are idempotent:
//! any number of pokes without an intervening wait collapse into one
//! wakeup, which `Notify`'s stored-permit semantics give us for free — a
//! poke landing between a failed scan and the wait completes the wait
//! immediately, so wakeups cannot be lost.
//!
//! Control messages (flush / shutdown) ride the same wakeup path but are
//! queued separately; the dispatch loop decides when to take one (only
//! when no scheduled work remains — see the scheduler).

use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::{oneshot, Notify};

/// Lifecycle request handed to the dispatch loop. The ack fires once the
/// worker set has drained.
pub(crate) enum Ctrl {
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

pub(crate) struct Signal {
    notify: Notify,
    ctrl: Mutex<VecDeque<Ctrl>>,
}

impl Signal {
    pub fn new() -> Self {
        Self {
            notify: Notify::new(),
            ctrl: Mutex::new(VecDeque::new()),
        }
    }

    /// Wake the consumer. Callable from any thread, any number of times.
    pub fn poke(&self) {
        self.notify.notify_one();
    }

    /// Queue a control message and wake the consumer.
    pub fn submit(&self, ctrl: Ctrl) {
        self.ctrl.lock().push_back(ctrl);
        self.notify.notify_one();
    }

    /// Take the oldest pending control message, if any.
    pub fn try_take_ctrl(&self) -> Option<Ctrl> {
        self.ctrl.lock().pop_front()
    }

    /// Wait until the next poke. Single consumer only.
    pub async fn wait(&self) {
        self.notify.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_poke_before_wait_is_not_lost() {
        let signal = Signal::new();
        signal.poke();
        // The stored permit completes the wait immediately.
        tokio::time::timeout(Duration::from_secs(1), signal.wait())
            .await
            .expect("wait should complete from the stored permit");
    }

    #[tokio::test]
    async fn test_pokes_coalesce() {
        let signal = Signal::new();
        signal.poke();
        signal.poke();
        signal.poke();
        signal.wait().await;
        // A second wait must block: the three pokes were one wakeup.
        let timed_out = tokio::time::timeout(Duration::from_millis(10), signal.wait())
            .await
            .is_err();
        assert!(timed_out);
    }

    #[tokio::test]
    async fn test_submit_wakes_waiter() {
        let signal = Arc::new(Signal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            tokio::spawn(async move {
                signal.wait().await;
                signal.try_take_ctrl().is_some()
            })
        };
        tokio::task::yield_now().await;

        let (tx, _rx) = oneshot::channel();
        signal.submit(Ctrl::Flush(tx));
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_ctrl_fifo() {
        let signal = Signal::new();
        let (flush_tx, _a) = oneshot::channel();
        let (shutdown_tx, _b) = oneshot::channel();
        signal.submit(Ctrl::Flush(flush_tx));
        signal.submit(Ctrl::Shutdown(shutdown_tx));

        assert!(matches!(signal.try_take_ctrl(), Some(Ctrl::Flush(_))));
        assert!(matches!(signal.try_take_ctrl(), Some(Ctrl::Shutdown(_))));
        assert!(signal.try_take_ctrl().is_none());
    }
}
