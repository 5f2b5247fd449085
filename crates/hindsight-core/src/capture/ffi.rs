//! # Unwind ABI FFI Declarations
//!
//! This module contains the extern "C" declarations for the C unwind ABI
//! (the Itanium "level 1" interface) used to walk the current call stack.
//! The symbols live in the platform unwinder - libgcc_s on glibc systems,
//! LLVM's libunwind elsewhere - which is already linked into every Rust
//! program, so no extra link flags are needed.
//!
//! ## Why Centralize These?
//!
//! - **Visibility**: All FFI declarations in one place for easy review
//! - **Documentation**: Centralized documentation of what each function does
//! - **Safety**: Clear separation between safe Rust code and unsafe FFI
//!
//! These functions are wrapped in a safe interface in [`super`].
//!
//! ## References
//!
//! - [Itanium C++ ABI: Exception Handling](https://itanium-cxx-abi.github.io/cxx-abi/abi-eh.html)

#![allow(nonstandard_style)] // ABI names are spelled the way the unwinder exports them

use libc::{c_void, uintptr_t};

/// Result codes exchanged with the unwind routines.
///
/// The backtrace path only ever produces `_URC_NO_REASON` and
/// `_URC_END_OF_STACK`, but the unwinder reports everything through this
/// one integer type, which is why the full set is declared and the enum is
/// `#[repr(C)]`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum _Unwind_Reason_Code
{
    _URC_NO_REASON = 0,
    _URC_FOREIGN_EXCEPTION_CAUGHT = 1,
    _URC_FATAL_PHASE2_ERROR = 2,
    _URC_FATAL_PHASE1_ERROR = 3,
    _URC_NORMAL_STOP = 4,
    _URC_END_OF_STACK = 5,
    _URC_HANDLER_FOUND = 6,
    _URC_INSTALL_CONTEXT = 7,
    _URC_CONTINUE_UNWIND = 8,
}

/// Opaque cursor over one frame of the stack being walked.
///
/// Only valid for the duration of the callback invocation it was passed
/// to; never stored or dereferenced on the Rust side.
pub enum _Unwind_Context {}

/// Callback invoked once per frame during a backtrace.
///
/// Returning anything other than `_URC_NO_REASON` stops the walk.
pub type _Unwind_Trace_Fn = extern "C" fn(context: *mut _Unwind_Context, argument: *mut c_void) -> _Unwind_Reason_Code;

extern "C" {
    /// Walk the current call stack, innermost frame first.
    ///
    /// Invokes `trace` once per frame with an opaque frame cursor and
    /// `trace_argument`. Walking stops when `trace` returns anything other
    /// than `_URC_NO_REASON`, or when the unwinder runs out of frames.
    ///
    /// ## Safety
    ///
    /// `trace_argument` must be valid for the duration of the walk and must
    /// point at whatever `trace` expects to find behind it. The callback
    /// must not unwind into the walker, so no panics.
    pub fn _Unwind_Backtrace(trace: _Unwind_Trace_Fn, trace_argument: *mut c_void) -> _Unwind_Reason_Code;

    /// Read the instruction pointer recorded for the frame `context` is
    /// positioned at.
    ///
    /// ## Safety
    ///
    /// `context` must be the cursor passed to the currently executing trace
    /// callback; it is meaningless outside that call.
    pub fn _Unwind_GetIP(context: *mut _Unwind_Context) -> uintptr_t;
}
