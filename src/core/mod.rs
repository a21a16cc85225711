/*!
 * Core Module
 * Fundamental teleport types, configuration and error handling
 */

pub mod config;
pub mod errors;
pub mod limits;
pub mod sync;

// Re-export for convenience
pub use config::TeleportConfig;
pub use errors::*;
