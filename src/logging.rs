//! Logging utilities for failguard
//!
//! Re-exports tracing macros with log_* naming convention for consistency.
//! Sink delivery failures log on the `failguard::sink` target so deployments
//! can route them separately from operational state transitions.

// Re-export tracing macros with log_* naming
pub use tracing::{debug as log_debug, error as log_error, info as log_info, warn as log_warn};
