//! # hindsight-core
//!
//! Stack capture and symbol resolution for the current process.
//!
//! This crate provides the engine behind Hindsight:
//! - Raw instruction-pointer capture via the platform unwinder
//! - Layered symbol resolution: DWARF debug info parsed in-process,
//!   the dynamic symbol table, and an external `addr2line` child as a
//!   last resort
//! - Rust and C++ symbol demangling
//! - Plain-text trace reports
//!
//! ## Platform Support
//!
//! POSIX only. The unwinder speaks the C unwind ABI (`_Unwind_Backtrace`)
//! provided by libgcc or LLVM's libunwind; module and symbol lookups go
//! through `dladdr`.
//!
//! ## Why unsafe code is needed
//!
//! Walking the stack and querying the runtime linker mean calling C APIs
//! that traffic in raw pointers into our own address space. Those calls
//! are confined to `capture::ffi`, `symbols::dynamic`, and the `poll`
//! loop in `symbols::tool`, and wrapped in safe interfaces everywhere
//! else.

#![allow(unsafe_code)] // Required for the unwind ABI, dladdr, and poll

pub mod capture;
pub mod error;
pub mod report;
pub mod symbols;
pub mod types;

// Re-export commonly used types
pub use capture::{capture, CaptureBuffer};
pub use error::{Result, TraceError};
pub use report::render_report;
pub use symbols::{BackendKind, Symbolizer, ToolSettings};
pub use types::{Address, FrameInfo};
