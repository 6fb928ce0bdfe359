//! Injectable time source for polling loops.
//!
//! Every wait in the lifecycle goes through [`Clock::sleep`] so tests can
//! exhaust a wait budget without real elapsed time, and a front-end can end
//! a wait early through a [`CancelHandle`].

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// How a [`Clock::sleep`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Elapsed,
    Cancelled,
}

pub trait Clock {
    /// Block for `duration` unless cancelled first.
    fn sleep(&self, duration: Duration) -> Wake;
}

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake every sleeper and make future sleeps return immediately.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    fn wait(&self, duration: Duration) -> Wake {
        if self.token.is_cancelled() {
            return Wake::Cancelled;
        }
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::warn!("cannot start timer runtime, ending wait: {e}");
                return Wake::Cancelled;
            }
        };
        runtime.block_on(async {
            tokio::select! {
                () = self.token.cancelled() => Wake::Cancelled,
                () = tokio::time::sleep(duration) => Wake::Elapsed,
            }
        })
    }
}

/// Real time, cancellable.
#[derive(Debug, Clone, Default)]
pub struct SystemClock {
    cancel: CancelHandle,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn with_cancel(cancel: CancelHandle) -> Self {
        Self { cancel }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }
}

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) -> Wake {
        self.cancel.wait(duration)
    }
}

/// Virtual time: sleeps return immediately and only advance a counter.
/// Clones share the same timeline.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualState>>,
}

#[derive(Debug, Default)]
struct ManualState {
    elapsed: Duration,
    sleeps: usize,
    cancel_after: Option<usize>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report [`Wake::Cancelled`] from the `n`-th sleep onwards (1-based).
    pub fn cancel_after(&self, n: usize) {
        self.state().cancel_after = Some(n);
    }

    /// Total virtual time slept.
    pub fn elapsed(&self) -> Duration {
        self.state().elapsed
    }

    /// Number of sleep calls made.
    pub fn sleeps(&self) -> usize {
        self.state().sleeps
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for ManualClock {
    fn sleep(&self, duration: Duration) -> Wake {
        let mut state = self.state();
        state.sleeps += 1;
        if state.cancel_after.is_some_and(|n| state.sleeps >= n) {
            return Wake::Cancelled;
        }
        state.elapsed += duration;
        Wake::Elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn manual_clock_accumulates_without_blocking() {
        let clock = ManualClock::new();
        let started = Instant::now();
        for _ in 0..10 {
            assert_eq!(clock.sleep(Duration::from_secs(60)), Wake::Elapsed);
        }
        assert_eq!(clock.elapsed(), Duration::from_secs(600));
        assert_eq!(clock.sleeps(), 10);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn manual_clock_cancel_after() {
        let clock = ManualClock::new();
        clock.cancel_after(2);
        assert_eq!(clock.sleep(Duration::from_millis(800)), Wake::Elapsed);
        assert_eq!(clock.sleep(Duration::from_millis(800)), Wake::Cancelled);
        assert_eq!(clock.elapsed(), Duration::from_millis(800));
    }

    #[test]
    fn system_clock_sleeps() {
        let clock = SystemClock::new();
        let started = Instant::now();
        assert_eq!(clock.sleep(Duration::from_millis(20)), Wake::Elapsed);
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn cancelled_system_clock_wakes_early() {
        let clock = SystemClock::new();
        let handle = clock.cancel_handle();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            handle.cancel();
        });

        let started = Instant::now();
        assert_eq!(clock.sleep(Duration::from_secs(30)), Wake::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(canceller.join().is_ok());

        // Stays cancelled.
        assert_eq!(clock.sleep(Duration::from_secs(30)), Wake::Cancelled);
    }
}
