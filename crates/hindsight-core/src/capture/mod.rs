//! # Stack Capture
//!
//! Raw instruction-pointer capture for the current thread.
//!
//! [`capture`] walks the stack through the platform unwinder and records
//! the instruction pointer of each frame, innermost first. No symbol work
//! happens here; the result is a bounded buffer of raw addresses that the
//! resolvers in [`crate::symbols`] turn into something readable.
//!
//! The walk itself allocates nothing: the buffer is reserved up front and
//! the trace callback only writes into it. That keeps this path usable
//! from places where allocation is unwelcome, such as panic hooks.

pub mod ffi;

use libc::c_void;
use smallvec::SmallVec;

use crate::types::Address;
use ffi::{_Unwind_Backtrace, _Unwind_Context, _Unwind_GetIP, _Unwind_Reason_Code};

/// Frames that fit inline before the buffer spills to the heap.
const INLINE_FRAMES: usize = 32;

/// Ordered instruction pointers for one captured stack, innermost first.
#[derive(Debug, Clone)]
pub struct CaptureBuffer
{
    frames: SmallVec<[Address; INLINE_FRAMES]>,
    capacity: usize,
}

/// What the trace callback should tell the unwinder after one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepControl
{
    KeepGoing,
    Stop,
}

impl CaptureBuffer
{
    fn with_capacity(capacity: usize) -> Self
    {
        let mut frames = SmallVec::new();
        frames.reserve(capacity);
        Self { frames, capacity }
    }

    /// Number of captured frames. Never exceeds the requested capacity.
    pub fn len(&self) -> usize
    {
        self.frames.len()
    }

    /// Whether the capture recorded anything at all.
    pub fn is_empty(&self) -> bool
    {
        self.frames.is_empty()
    }

    /// Captured addresses, innermost frame first.
    pub fn addresses(&self) -> &[Address]
    {
        &self.frames
    }

    /// Record one instruction pointer and decide whether the walk goes on.
    ///
    /// A null pointer is the unwinder's end-of-stack marker: it is not
    /// recorded and stops the walk, as does running out of room.
    fn record(&mut self, ip: Address) -> StepControl
    {
        if ip.is_null() || self.frames.len() >= self.capacity {
            return StepControl::Stop;
        }
        self.frames.push(ip);
        if self.frames.len() == self.capacity {
            StepControl::Stop
        } else {
            StepControl::KeepGoing
        }
    }
}

extern "C" fn trace_callback(context: *mut _Unwind_Context, argument: *mut c_void) -> _Unwind_Reason_Code
{
    // SAFETY: argument is the CaptureBuffer passed to _Unwind_Backtrace in
    // capture(), exclusively ours for exactly this walk.
    let buffer = unsafe { &mut *argument.cast::<CaptureBuffer>() };
    // SAFETY: context is the live cursor for the frame being visited.
    let ip = Address::from(unsafe { _Unwind_GetIP(context) });

    match buffer.record(ip) {
        StepControl::KeepGoing => _Unwind_Reason_Code::_URC_NO_REASON,
        StepControl::Stop => _Unwind_Reason_Code::_URC_END_OF_STACK,
    }
}

/// Capture up to `capacity` frames of the current thread's call stack.
///
/// Returns the captured instruction pointers innermost first. The walk
/// stops early when the unwinder reports the end of the stack, and an
/// unwalkable stack simply yields an empty buffer. `capture(0)` returns an
/// empty buffer without touching the unwinder at all.
///
/// ## Example
///
/// ```rust
/// use hindsight_core::capture;
///
/// let trace = capture(64);
/// assert!(trace.len() <= 64);
/// ```
pub fn capture(capacity: usize) -> CaptureBuffer
{
    let mut buffer = CaptureBuffer::with_capacity(capacity);
    if capacity == 0 {
        return buffer;
    }

    let state: *mut CaptureBuffer = &mut buffer;
    // The walker's own return value is uninteresting: a stopped or partial
    // walk still leaves valid frames in the buffer.
    unsafe {
        _Unwind_Backtrace(trace_callback, state.cast::<c_void>());
    }

    buffer
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_record_stops_at_null_without_keeping_it()
    {
        let mut buffer = CaptureBuffer::with_capacity(4);
        assert_eq!(buffer.record(Address::from(0x1000u64)), StepControl::KeepGoing);
        assert_eq!(buffer.record(Address::ZERO), StepControl::Stop);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_record_stops_when_full()
    {
        let mut buffer = CaptureBuffer::with_capacity(2);
        assert_eq!(buffer.record(Address::from(0x10u64)), StepControl::KeepGoing);
        assert_eq!(buffer.record(Address::from(0x20u64)), StepControl::Stop);
        assert_eq!(buffer.record(Address::from(0x30u64)), StepControl::Stop);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.addresses(), &[Address::from(0x10u64), Address::from(0x20u64)]);
    }

    #[test]
    fn test_zero_capacity_records_nothing()
    {
        let mut buffer = CaptureBuffer::with_capacity(0);
        assert_eq!(buffer.record(Address::from(0x10u64)), StepControl::Stop);
        assert!(buffer.is_empty());
    }
}
