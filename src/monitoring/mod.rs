/*!
 * Monitoring Module
 * Logging setup shared by the library and the teleport binary
 */

pub mod tracer;

pub use tracer::{endpoint_span, init_tracing};
