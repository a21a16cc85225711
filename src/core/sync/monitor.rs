/*!
 * Token Monitor
 *
 * Single-slot rendezvous buffer between a blocking network thread and the
 * cooperative scheduler thread.
 *
 * # Design
 *
 * One `parking_lot::Mutex` guards the slot; two condvars signal the two
 * transitions:
 * - `available`: slot became full (network sender waits on it)
 * - `empty`: slot became empty (network receiver waits on it)
 *
 * The scheduler side only ever uses the `try_*` variants so it never parks.
 * Network threads use the blocking variants, which return
 * `TeleportError::MonitorClosed` once the monitor is closed at teardown.
 */

use crate::core::errors::{TeleportError, TeleportResult};
use parking_lot::{Condvar, Mutex, MutexGuard};

struct Slot {
    full: bool,
    closed: bool,
    token: Box<[u8]>,
}

/// Single-token hand-off buffer
pub struct TokenMonitor {
    slot: Mutex<Slot>,
    available: Condvar,
    empty: Condvar,
    token_size: usize,
}

impl std::fmt::Debug for TokenMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.slot.lock();
        f.debug_struct("TokenMonitor")
            .field("token_size", &self.token_size)
            .field("full", &slot.full)
            .field("closed", &slot.closed)
            .finish()
    }
}

impl TokenMonitor {
    /// Create an empty monitor holding tokens of `token_size` bytes
    pub fn new(token_size: usize) -> Self {
        Self {
            slot: Mutex::new(Slot {
                full: false,
                closed: false,
                token: vec![0u8; token_size].into_boxed_slice(),
            }),
            available: Condvar::new(),
            empty: Condvar::new(),
            token_size,
        }
    }

    #[inline]
    pub fn token_size(&self) -> usize {
        self.token_size
    }

    /// Whether the slot currently holds a token
    pub fn is_full(&self) -> bool {
        self.slot.lock().full
    }

    pub fn is_closed(&self) -> bool {
        self.slot.lock().closed
    }

    /// Block until the slot is empty, then deposit `token`
    pub fn wait_until_empty_then_fill(&self, token: &[u8]) -> TeleportResult<()> {
        self.check_len(token.len());
        let mut slot = self.wait_while(&self.empty, |s| s.full)?;
        slot.token.copy_from_slice(token);
        slot.full = true;
        self.available.notify_one();
        Ok(())
    }

    /// Block until the slot is full, then take the token out of it
    pub fn wait_until_full_then_drain(&self, out: &mut [u8]) -> TeleportResult<()> {
        self.check_len(out.len());
        let mut slot = self.wait_while(&self.available, |s| !s.full)?;
        out.copy_from_slice(&slot.token);
        slot.full = false;
        self.empty.notify_one();
        Ok(())
    }

    /// Block until the slot is empty without touching it
    pub fn wait_until_empty(&self) -> TeleportResult<()> {
        self.wait_while(&self.empty, |s| s.full).map(drop)
    }

    /// Block until the slot is full and copy the token out, leaving the slot full
    ///
    /// Pair with [`TokenMonitor::release`] once the token has been consumed.
    pub fn wait_until_full_then_peek(&self, out: &mut [u8]) -> TeleportResult<()> {
        self.check_len(out.len());
        let slot = self.wait_while(&self.available, |s| !s.full)?;
        out.copy_from_slice(&slot.token);
        Ok(())
    }

    /// Mark the slot empty and wake a waiting producer
    pub fn release(&self) {
        let mut slot = self.slot.lock();
        debug_assert!(slot.full, "release() on an empty token monitor");
        slot.full = false;
        self.empty.notify_one();
    }

    /// Deposit `token` if the slot is empty. Never blocks.
    pub fn try_fill(&self, token: &[u8]) -> bool {
        self.check_len(token.len());
        let mut slot = self.slot.lock();
        if slot.full {
            return false;
        }
        slot.token.copy_from_slice(token);
        slot.full = true;
        self.available.notify_one();
        true
    }

    /// Deposit a token produced by `fill` if the slot is empty. Never blocks.
    ///
    /// `fill` runs under the lock and must write the whole buffer.
    pub fn try_fill_with<F>(&self, fill: F) -> bool
    where
        F: FnOnce(&mut [u8]),
    {
        let mut slot = self.slot.lock();
        if slot.full {
            return false;
        }
        fill(&mut slot.token);
        slot.full = true;
        self.available.notify_one();
        true
    }

    /// Take the token out if the slot is full. Never blocks.
    pub fn try_drain(&self, out: &mut [u8]) -> bool {
        self.check_len(out.len());
        self.try_drain_with(|token| out.copy_from_slice(token))
    }

    /// Hand the token to `drain` and empty the slot if it is full. Never blocks.
    pub fn try_drain_with<F>(&self, drain: F) -> bool
    where
        F: FnOnce(&[u8]),
    {
        let mut slot = self.slot.lock();
        if !slot.full {
            return false;
        }
        drain(&slot.token);
        slot.full = false;
        self.empty.notify_one();
        true
    }

    /// Wake every blocked waiter and make further blocking waits fail
    pub fn close(&self) {
        let mut slot = self.slot.lock();
        slot.closed = true;
        self.available.notify_all();
        self.empty.notify_all();
    }

    fn wait_while<F>(&self, condvar: &Condvar, mut blocked: F) -> TeleportResult<MutexGuard<'_, Slot>>
    where
        F: FnMut(&Slot) -> bool,
    {
        let mut slot = self.slot.lock();
        loop {
            if slot.closed {
                return Err(TeleportError::MonitorClosed);
            }
            if !blocked(&slot) {
                return Ok(slot);
            }
            condvar.wait(&mut slot);
        }
    }

    #[inline]
    fn check_len(&self, len: usize) {
        assert_eq!(
            len, self.token_size,
            "token buffer is {} bytes, monitor holds {}-byte tokens",
            len, self.token_size
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_try_drain_on_empty_fails() {
        let mon = TokenMonitor::new(4);
        let mut out = [0u8; 4];
        assert!(!mon.try_drain(&mut out));
    }

    #[test]
    fn test_second_fill_rejected_until_drained() {
        let mon = TokenMonitor::new(2);
        assert!(mon.try_fill(&[1, 2]));
        assert!(!mon.try_fill(&[3, 4]));

        let mut out = [0u8; 2];
        assert!(mon.try_drain(&mut out));
        assert_eq!(out, [1, 2]);
        assert!(mon.try_fill(&[3, 4]));
    }

    #[test]
    fn test_peek_keeps_slot_full() {
        let mon = TokenMonitor::new(3);
        assert!(mon.try_fill(&[7, 8, 9]));

        let mut out = [0u8; 3];
        mon.wait_until_full_then_peek(&mut out).unwrap();
        assert_eq!(out, [7, 8, 9]);
        assert!(mon.is_full());

        mon.release();
        assert!(!mon.is_full());
    }

    #[test]
    fn test_blocking_fill_waits_for_drain() {
        let mon = Arc::new(TokenMonitor::new(1));
        assert!(mon.try_fill(&[1]));

        let producer = {
            let mon = Arc::clone(&mon);
            thread::spawn(move || mon.wait_until_empty_then_fill(&[2]))
        };

        thread::sleep(Duration::from_millis(50));
        let mut out = [0u8; 1];
        assert!(mon.try_drain(&mut out));
        assert_eq!(out, [1]);

        producer.join().unwrap().unwrap();
        assert!(mon.try_drain(&mut out));
        assert_eq!(out, [2]);
    }

    #[test]
    fn test_close_wakes_waiters() {
        let mon = Arc::new(TokenMonitor::new(8));
        let consumer = {
            let mon = Arc::clone(&mon);
            thread::spawn(move || {
                let mut out = [0u8; 8];
                mon.wait_until_full_then_drain(&mut out)
            })
        };

        thread::sleep(Duration::from_millis(50));
        mon.close();

        assert_eq!(consumer.join().unwrap(), Err(TeleportError::MonitorClosed));
        assert!(mon.is_closed());
    }

    #[test]
    #[should_panic(expected = "monitor holds 4-byte tokens")]
    fn test_wrong_length_panics() {
        let mon = TokenMonitor::new(4);
        mon.try_fill(&[1, 2, 3]);
    }
}
