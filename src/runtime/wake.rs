/*!
 * Network Wake-up
 *
 * Broadcast hook network threads use to tell an idle scheduler that some
 * endpoint has new work. Carries no payload: the scheduler simply fires
 * its actors again.
 */

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Hook invoked by network threads after they moved a token
pub trait NetworkWaker: Send + Sync {
    fn wake_up_network(&self);
}

/// Waker for endpoints driven by a scheduler that polls regardless
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopWaker;

impl NetworkWaker for NoopWaker {
    #[inline]
    fn wake_up_network(&self) {}
}

/// Generation counter + condvar
///
/// Callers read `generation()` before checking for work, then
/// `wait_for(seen, ..)` parks only if nothing was signalled in between, so
/// no wake-up is lost.
#[derive(Debug, Default)]
pub struct WakeSignal {
    generation: Mutex<u64>,
    cond: Condvar,
}

impl WakeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generation
    pub fn generation(&self) -> u64 {
        *self.generation.lock()
    }

    /// Bump the generation and wake every waiter
    pub fn notify(&self) {
        let mut generation = self.generation.lock();
        *generation = generation.wrapping_add(1);
        self.cond.notify_all();
    }

    /// Wait until the generation moves past `seen` or `timeout` elapses
    ///
    /// Returns the generation observed on return.
    pub fn wait_for(&self, seen: u64, timeout: Duration) -> u64 {
        let deadline = Instant::now() + timeout;
        let mut generation = self.generation.lock();
        while *generation == seen {
            if self.cond.wait_until(&mut generation, deadline).timed_out() {
                break;
            }
        }
        *generation
    }
}

impl NetworkWaker for WakeSignal {
    fn wake_up_network(&self) {
        self.notify();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_wait_returns_after_notify() {
        let signal = Arc::new(WakeSignal::new());
        let seen = signal.generation();

        let notifier = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                signal.wake_up_network();
            })
        };

        let start = Instant::now();
        let now = signal.wait_for(seen, Duration::from_secs(5));
        notifier.join().unwrap();

        assert_eq!(now, seen + 1);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_notify_before_wait_is_not_lost() {
        let signal = WakeSignal::new();
        let seen = signal.generation();
        signal.notify();

        let start = Instant::now();
        assert_eq!(signal.wait_for(seen, Duration::from_secs(5)), seen + 1);
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_wait_times_out() {
        let signal = WakeSignal::new();
        let seen = signal.generation();
        assert_eq!(signal.wait_for(seen, Duration::from_millis(20)), seen);
    }
}
