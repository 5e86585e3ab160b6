use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// One-shot cancellation signal shared by a session's run function and its
/// coordination side channel.
///
/// The first [`fire`](Self::fire) wins; later calls are no-ops. Observers either
/// poll [`is_cancelled`](Self::is_cancelled) or await [`cancelled`](Self::cancelled).
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    token: CancellationToken,
    fired: Arc<AtomicBool>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. Returns `true` only for the call that performed the transition.
    pub fn fire(&self) -> bool {
        let first = self
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            self.token.cancel();
        }
        first
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Resolves once the signal has fired (immediately if it already has).
    #[inline]
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn fires_exactly_once() {
        let signal = CancellationSignal::new();
        assert!(!signal.is_cancelled());

        assert!(signal.fire());
        assert!(signal.is_cancelled());

        assert!(!signal.fire());
        assert!(signal.is_cancelled());
    }

    #[test]
    fn clones_share_state() {
        let a = CancellationSignal::new();
        let b = a.clone();
        b.fire();
        assert!(a.is_cancelled());
    }

    #[tokio::test]
    async fn waiters_are_woken() {
        let signal = CancellationSignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.cancelled().await })
        };
        signal.fire();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter woke")
            .unwrap();
    }
}
