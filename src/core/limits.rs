/*!
 * Teleport Limits and Constants
 *
 * Centralized location for socket parameters and naming conventions used by
 * teleport endpoints.
 */

use std::net::Ipv4Addr;
use std::time::Duration;

// =============================================================================
// SOCKET PARAMETERS
// =============================================================================

/// Listen backlog for receivers
/// Exactly one peer may be pending; a receiver serves a single client at a time
pub const LISTEN_BACKLOG: i32 = 1;

/// Default address receivers bind to (all interfaces)
pub const DEFAULT_BIND_HOST: Ipv4Addr = Ipv4Addr::UNSPECIFIED;

/// Port requested at bind time; 0 lets the OS pick an ephemeral port
pub const EPHEMERAL_PORT: u16 = 0;

// =============================================================================
// CLASS NAMING
// =============================================================================

/// Name prefix of generated receiver classes (`_receiver_4B`)
pub const RECEIVER_CLASS_PREFIX: &str = "_receiver_";

/// Name prefix of generated sender classes (`_sender_4B`)
pub const SENDER_CLASS_PREFIX: &str = "_sender_";

/// Port name exposed by receiver classes
pub const RECEIVER_PORT_NAME: &str = "out";

/// Port name exposed by sender classes
pub const SENDER_PORT_NAME: &str = "in";

// =============================================================================
// REFERENCE RUNTIME
// =============================================================================

/// Default capacity (in tokens) of a scheduler-side port FIFO
pub const DEFAULT_FIFO_CAPACITY: usize = 16;

/// Longest the reference scheduler sleeps while idle before firing again
/// Bounds latency for ports fed from outside the scheduler thread
pub const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(10);

// =============================================================================
// TEARDOWN
// =============================================================================

/// How long teardown waits for a woken network thread before detaching it
pub const TEARDOWN_GRACE: Duration = Duration::from_millis(500);

/// Bound on the loopback connect that wakes a receiver parked in accept
/// A full accept queue drops the SYN, so the connect may never complete
pub const ACCEPT_POKE_TIMEOUT: Duration = Duration::from_millis(50);
