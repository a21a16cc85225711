/*!
 * Teleport Module
 * TCP transport endpoints that splice a dataflow actor network across processes
 *
 * # Architecture
 *
 * - **Registry**: memoized endpoint classes per `(direction, token size)`
 * - **Receiver**: TCP server, one client at a time, survives reconnects
 * - **Sender**: TCP client, connects once, stops on the first failure
 *
 * Each endpoint runs one blocking network thread and talks to the
 * scheduler only through a single-slot `TokenMonitor`.
 */

pub mod endpoint;
mod io;
pub mod link;
pub mod receiver;
pub mod registry;
pub mod sender;
pub mod types;

// Re-export public API
pub use endpoint::{Endpoint, PortBinding};
pub use link::{EndpointStats, LinkState};
pub use receiver::SocketReceiver;
pub use registry::{
    get_receiver_class, get_sender_class, receiver_port, set_sender_remote_address,
    ClassRegistry,
};
pub use sender::{RemoteAddress, SocketSender};
pub use types::{Direction, EndpointClass, EndpointContext, Firing, PortDescription};
