/*!
 * Link State
 * Observable connection state and counters of an endpoint
 */

use super::types::Direction;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Where an endpoint's network thread currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum LinkState {
    /// Constructed, thread not yet running
    Starting = 0,
    /// Receiver waiting for a client
    Listening = 1,
    /// Sender waiting for its remote address
    AwaitingAddress = 2,
    /// Sender connect in progress
    Connecting = 3,
    /// Peer connected, tokens flowing
    Connected = 4,
    /// Permanently non-functional after a setup or I/O failure
    Broken = 5,
    /// Network thread has exited on teardown
    Stopped = 6,
}

impl LinkState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => LinkState::Starting,
            1 => LinkState::Listening,
            2 => LinkState::AwaitingAddress,
            3 => LinkState::Connecting,
            4 => LinkState::Connected,
            5 => LinkState::Broken,
            _ => LinkState::Stopped,
        }
    }
}

/// Atomic cell holding a [`LinkState`]
#[derive(Debug)]
pub(crate) struct LinkCell(AtomicU8);

impl LinkCell {
    pub(crate) fn new(state: LinkState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    #[inline]
    pub(crate) fn get(&self) -> LinkState {
        LinkState::from_u8(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn set(&self, state: LinkState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Set `state` unless the link is already broken
    pub(crate) fn set_unless_broken(&self, state: LinkState) {
        let _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                (raw != LinkState::Broken as u8).then_some(state as u8)
            });
    }
}

/// Per-endpoint counters, bumped by the network thread
#[derive(Debug, Default)]
pub(crate) struct LinkCounters {
    pub tokens: AtomicU64,
    pub connections: AtomicU64,
}

impl LinkCounters {
    #[inline]
    pub(crate) fn token(&self) {
        self.tokens.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn connection(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time snapshot of an endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EndpointStats {
    pub instance: String,
    pub class: String,
    pub direction: Direction,
    pub token_size: usize,
    pub state: LinkState,
    /// Tokens moved over the socket
    pub tokens: u64,
    /// Accepted clients (receiver) or established connections (sender)
    pub connections: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
}

impl EndpointStats {
    pub(crate) fn counters(&mut self, counters: &LinkCounters) -> &mut Self {
        self.tokens = counters.tokens.load(Ordering::Relaxed);
        self.connections = counters.connections.load(Ordering::Relaxed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broken_is_sticky() {
        let cell = LinkCell::new(LinkState::Connecting);
        cell.set(LinkState::Broken);
        cell.set_unless_broken(LinkState::Stopped);
        assert_eq!(cell.get(), LinkState::Broken);

        let cell = LinkCell::new(LinkState::Connected);
        cell.set_unless_broken(LinkState::Stopped);
        assert_eq!(cell.get(), LinkState::Stopped);
    }
}
