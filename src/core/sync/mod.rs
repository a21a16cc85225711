/*!
 * Synchronization Primitives
 *
 * Hand-off primitives shared between network threads and the cooperative
 * scheduler thread.
 *
 * # Use Cases
 *
 * - **Endpoint buffers**: one token in flight per teleport endpoint
 * - **Teardown**: waking parked network threads so they can be joined
 */

mod monitor;

pub use monitor::TokenMonitor;
