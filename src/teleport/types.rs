/*!
 * Teleport Types
 * Endpoint classes, port descriptions and instantiation context
 */

use super::endpoint::Endpoint;
use super::receiver::SocketReceiver;
use super::sender::SocketSender;
use crate::core::config::TeleportConfig;
use crate::core::limits::{
    RECEIVER_CLASS_PREFIX, RECEIVER_PORT_NAME, SENDER_CLASS_PREFIX, SENDER_PORT_NAME,
};
use crate::runtime::{NetworkWaker, NoopWaker};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which way tokens travel through an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// TCP server; tokens arrive from the network and leave through an output port
    Receiver,
    /// TCP client; tokens enter through an input port and leave over the network
    Sender,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Receiver => f.write_str("receiver"),
            Direction::Sender => f.write_str("sender"),
        }
    }
}

/// The single port an endpoint class exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PortDescription {
    pub name: &'static str,
    pub token_size: usize,
}

/// Outcome of one scheduler firing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Firing {
    /// One token moved between the port and the network buffer
    Transferred,
    /// Nothing to do this time
    Idle,
}

impl Firing {
    #[inline]
    pub fn is_transferred(self) -> bool {
        self == Firing::Transferred
    }
}

/// Endpoint class: immutable metadata shared by every instance of one
/// `(direction, token size)` pair
///
/// Obtained from the class registry, which hands out the same `Arc` for the
/// same key for the lifetime of the process.
#[derive(Debug, PartialEq, Eq)]
pub struct EndpointClass {
    direction: Direction,
    name: String,
    port: PortDescription,
}

impl EndpointClass {
    pub(crate) fn new(direction: Direction, token_size: usize) -> Self {
        let (prefix, port_name) = match direction {
            Direction::Receiver => (RECEIVER_CLASS_PREFIX, RECEIVER_PORT_NAME),
            Direction::Sender => (SENDER_CLASS_PREFIX, SENDER_PORT_NAME),
        };
        Self {
            direction,
            name: format!("{}{}B", prefix, token_size),
            port: PortDescription {
                name: port_name,
                token_size,
            },
        }
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Generated class name, e.g. `_receiver_4B`
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn token_size(&self) -> usize {
        self.port.token_size
    }

    #[inline]
    pub fn port(&self) -> &PortDescription {
        &self.port
    }

    pub fn num_input_ports(&self) -> usize {
        match self.direction {
            Direction::Receiver => 0,
            Direction::Sender => 1,
        }
    }

    pub fn num_output_ports(&self) -> usize {
        match self.direction {
            Direction::Receiver => 1,
            Direction::Sender => 0,
        }
    }

    /// Construct an instance: opens the socket and starts its network thread
    ///
    /// Setup failures are logged and yield an endpoint in
    /// [`LinkState::Broken`](super::LinkState::Broken) rather than an error.
    pub fn instantiate(
        self: &Arc<Self>,
        instance_name: impl Into<String>,
        ctx: EndpointContext,
    ) -> Endpoint {
        let instance_name = instance_name.into();
        match self.direction {
            Direction::Receiver => {
                Endpoint::Receiver(SocketReceiver::new(Arc::clone(self), instance_name, ctx))
            }
            Direction::Sender => {
                Endpoint::Sender(SocketSender::new(Arc::clone(self), instance_name, ctx))
            }
        }
    }
}

/// Everything an endpoint needs from its host runtime at construction
#[derive(Clone)]
pub struct EndpointContext {
    pub(crate) waker: Arc<dyn NetworkWaker>,
    pub(crate) config: TeleportConfig,
}

impl EndpointContext {
    pub fn new(waker: Arc<dyn NetworkWaker>) -> Self {
        Self {
            waker,
            config: TeleportConfig::default(),
        }
    }

    pub fn with_config(mut self, config: TeleportConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &TeleportConfig {
        &self.config
    }
}

impl Default for EndpointContext {
    fn default() -> Self {
        Self::new(Arc::new(NoopWaker))
    }
}

impl std::fmt::Debug for EndpointContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_metadata() {
        let rx = EndpointClass::new(Direction::Receiver, 4);
        assert_eq!(rx.name(), "_receiver_4B");
        assert_eq!(rx.port().name, "out");
        assert_eq!(rx.num_input_ports(), 0);
        assert_eq!(rx.num_output_ports(), 1);

        let tx = EndpointClass::new(Direction::Sender, 128);
        assert_eq!(tx.name(), "_sender_128B");
        assert_eq!(tx.port().name, "in");
        assert_eq!(tx.token_size(), 128);
        assert_eq!(tx.num_input_ports(), 1);
        assert_eq!(tx.num_output_ports(), 0);
    }
}
