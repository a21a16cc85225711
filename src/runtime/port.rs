/*!
 * Local Ports
 * Scheduler-side token ports and a bounded FIFO implementing them
 */

use crate::core::limits::DEFAULT_FIFO_CAPACITY;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Input side of an actor port, as seen by the firing actor
///
/// `read_token` may only be called after `tokens_available` reported at
/// least one token during the same firing.
pub trait InputPort {
    /// Number of whole tokens ready to be read
    fn tokens_available(&self) -> usize;

    /// Consume the oldest token into `out`
    fn read_token(&mut self, out: &mut [u8]);
}

/// Output side of an actor port, as seen by the firing actor
///
/// `write_token` may only be called after `space_available` reported room
/// for at least one token during the same firing.
pub trait OutputPort {
    /// Number of tokens that can still be written
    fn space_available(&self) -> usize;

    /// Append one token
    fn write_token(&mut self, token: &[u8]);
}

/// Bounded FIFO of fixed-size tokens
///
/// Clones share the same queue, so a driver can feed or drain a port bound
/// to an actor inside the scheduler.
#[derive(Clone)]
pub struct TokenFifo {
    tokens: Arc<Mutex<VecDeque<Box<[u8]>>>>,
    token_size: usize,
    capacity: usize,
}

impl std::fmt::Debug for TokenFifo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenFifo")
            .field("token_size", &self.token_size)
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

impl TokenFifo {
    pub fn new(token_size: usize, capacity: usize) -> Self {
        assert!(capacity > 0, "a token FIFO needs room for at least one token");
        Self {
            tokens: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            token_size,
            capacity,
        }
    }

    pub fn with_default_capacity(token_size: usize) -> Self {
        Self::new(token_size, DEFAULT_FIFO_CAPACITY)
    }

    #[inline]
    pub fn token_size(&self) -> usize {
        self.token_size
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.lock().is_empty()
    }

    /// Append a token; returns `false` when the FIFO is full
    pub fn push(&self, token: &[u8]) -> bool {
        self.check_len(token.len());
        let mut tokens = self.tokens.lock();
        if tokens.len() >= self.capacity {
            return false;
        }
        tokens.push_back(token.into());
        true
    }

    /// Remove the oldest token
    pub fn pop(&self) -> Option<Vec<u8>> {
        self.tokens.lock().pop_front().map(Vec::from)
    }

    /// Remove every buffered token, oldest first
    pub fn drain(&self) -> Vec<Vec<u8>> {
        self.tokens.lock().drain(..).map(Vec::from).collect()
    }

    fn check_len(&self, len: usize) {
        assert_eq!(
            len, self.token_size,
            "token is {} bytes, port carries {}-byte tokens",
            len, self.token_size
        );
    }
}

impl InputPort for TokenFifo {
    fn tokens_available(&self) -> usize {
        self.len()
    }

    fn read_token(&mut self, out: &mut [u8]) {
        self.check_len(out.len());
        let token = self
            .tokens
            .lock()
            .pop_front()
            .expect("read_token() on an empty port");
        out.copy_from_slice(&token);
    }
}

impl OutputPort for TokenFifo {
    fn space_available(&self) -> usize {
        self.capacity - self.len()
    }

    fn write_token(&mut self, token: &[u8]) {
        let pushed = self.push(token);
        assert!(pushed, "write_token() on a full port");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order_and_capacity() {
        let fifo = TokenFifo::new(2, 2);
        assert!(fifo.push(&[1, 1]));
        assert!(fifo.push(&[2, 2]));
        assert!(!fifo.push(&[3, 3]));
        assert_eq!(fifo.space_available(), 0);

        assert_eq!(fifo.pop(), Some(vec![1, 1]));
        assert_eq!(fifo.pop(), Some(vec![2, 2]));
        assert_eq!(fifo.pop(), None);
    }

    #[test]
    fn test_clones_share_queue() {
        let fifo = TokenFifo::with_default_capacity(1);
        let mut port = fifo.clone();
        port.write_token(&[9]);

        assert_eq!(fifo.tokens_available(), 1);
        let mut out = [0u8; 1];
        let mut reader = fifo.clone();
        reader.read_token(&mut out);
        assert_eq!(out, [9]);
        assert!(port.is_empty());
    }

    #[test]
    #[should_panic(expected = "read_token() on an empty port")]
    fn test_read_empty_port_panics() {
        let mut fifo = TokenFifo::new(1, 1);
        let mut out = [0u8; 1];
        fifo.read_token(&mut out);
    }
}
