/*!
 * Actor Teleport Library
 * TCP transport endpoints for dataflow actor networks split across processes
 *
 * A receiver endpoint listens on an ephemeral port and feeds the tokens it
 * reads into its actor output port; a sender endpoint connects to that port
 * and writes the tokens its actor input port delivers. Both talk to the
 * cooperative scheduler through a single-slot buffer and never block it.
 */

pub mod core;
pub mod monitoring;
pub mod runtime;
pub mod teleport;

// Re-exports
pub use crate::core::{TeleportConfig, TeleportError, TeleportResult};
pub use monitoring::init_tracing;
pub use runtime::{ActionScheduler, InputPort, NetworkWaker, OutputPort, TokenFifo, WakeSignal};
pub use teleport::{
    get_receiver_class, get_sender_class, receiver_port, set_sender_remote_address,
    ClassRegistry, Direction, Endpoint, EndpointClass, EndpointContext, EndpointStats, Firing,
    LinkState,
};
