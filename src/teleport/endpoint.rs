/*!
 * Endpoint
 *
 * Instance of an endpoint class as the scheduler sees it. Enum dispatch
 * over the two directions; the per-firing action and teardown (`Drop`)
 * forward to the concrete endpoint.
 */

use super::link::{EndpointStats, LinkState};
use super::receiver::SocketReceiver;
use super::sender::SocketSender;
use super::types::{Direction, EndpointClass, Firing};
use crate::runtime::{InputPort, OutputPort};
use std::sync::Arc;

/// The port a firing operates on
pub enum PortBinding<'a> {
    Input(&'a mut dyn InputPort),
    Output(&'a mut dyn OutputPort),
}

/// Live endpoint instance
#[derive(Debug)]
pub enum Endpoint {
    Receiver(SocketReceiver),
    Sender(SocketSender),
}

impl Endpoint {
    pub fn class(&self) -> &Arc<EndpointClass> {
        match self {
            Endpoint::Receiver(r) => r.class(),
            Endpoint::Sender(s) => s.class(),
        }
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        self.class().direction()
    }

    pub fn instance_name(&self) -> &str {
        match self {
            Endpoint::Receiver(r) => r.instance_name(),
            Endpoint::Sender(s) => s.instance_name(),
        }
    }

    pub fn link_state(&self) -> LinkState {
        match self {
            Endpoint::Receiver(r) => r.link_state(),
            Endpoint::Sender(s) => s.link_state(),
        }
    }

    pub fn stats(&self) -> EndpointStats {
        match self {
            Endpoint::Receiver(r) => r.stats(),
            Endpoint::Sender(s) => s.stats(),
        }
    }

    pub fn as_receiver(&self) -> Option<&SocketReceiver> {
        match self {
            Endpoint::Receiver(r) => Some(r),
            Endpoint::Sender(_) => None,
        }
    }

    pub fn as_sender(&self) -> Option<&SocketSender> {
        match self {
            Endpoint::Sender(s) => Some(s),
            Endpoint::Receiver(_) => None,
        }
    }

    /// One scheduler firing
    ///
    /// Never blocks; moves at most one token. Binding a receiver to an
    /// input port (or a sender to an output port) is a wiring bug and panics.
    pub fn fire(&self, port: PortBinding<'_>) -> Firing {
        match (self, port) {
            (Endpoint::Receiver(r), PortBinding::Output(output)) => r.fire(output),
            (Endpoint::Sender(s), PortBinding::Input(input)) => s.fire(input),
            (endpoint, _) => panic!(
                "{} '{}' bound to the wrong kind of port",
                endpoint.direction(),
                endpoint.instance_name()
            ),
        }
    }
}
