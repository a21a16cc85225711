/*!
 * Reference Runtime
 *
 * Minimal stand-in for the host actor runtime: scheduler-side ports, the
 * network wake-up hook, and a cooperative scheduler that fires endpoints.
 */

pub mod port;
pub mod scheduler;
pub mod wake;

// Re-export public API
pub use port::{InputPort, OutputPort, TokenFifo};
pub use scheduler::{ActionScheduler, ActorId};
pub use wake::{NetworkWaker, NoopWaker, WakeSignal};
