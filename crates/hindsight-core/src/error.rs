//! # Error Types
//!
//! General error handling for the trace engine.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for trace-engine operations
///
/// Resolution itself never surfaces these: `Symbolizer::resolve` degrades to
/// emptier fields instead of failing, all the way down to a bare hexadecimal
/// address. The variants exist for the internal constructors (image parsing,
/// tool spawning) and for callers such as the CLI that want to report why a
/// backend is unavailable.
#[derive(Error, Debug)]
pub enum TraceError
{
    /// The executable image could not be read or parsed
    ///
    /// This happens when:
    /// - The binary on disk was removed or replaced after exec
    /// - The file is not a valid object file for this platform
    /// - A DWARF section is present but malformed
    #[error("Failed to load image {path}: {reason}")]
    Image
    {
        /// Path of the binary we tried to parse
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// The external resolver tool could not be spawned or queried
    ///
    /// The tool path comes from `HINDSIGHT_ADDR2LINE` (default `addr2line`).
    /// Spawn failures usually mean the tool is not installed or not on
    /// `PATH`; read failures mean it died or hung mid-answer.
    #[error("External tool failed: {0}")]
    Tool(String),

    /// I/O error (for file operations, etc.)
    ///
    /// Used for errors when reading the executable image from disk.
    /// This is a standard Rust `std::io::Error` converted to our error type.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for `Result<T, TraceError>`
///
/// ```rust
/// use hindsight_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, TraceError>;
