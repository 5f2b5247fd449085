//! # Hindsight Utilities
//!
//! Shared infrastructure for the Hindsight workspace. Currently that means
//! one thing: structured logging built on `tracing`, configured the same
//! way in every binary that links it.

pub mod logging;

// Re-export commonly used logging functions for convenience
pub use logging::{init_logging, init_logging_with_level, LogFormat, LogLevel, LoggingError};
pub use tracing::{debug, error, info, trace, warn};
