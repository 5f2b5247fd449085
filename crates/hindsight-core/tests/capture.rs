//! Tests for raw stack capture.

use std::hint::black_box;

use hindsight_core::{capture, Address, CaptureBuffer};

#[inline(never)]
fn capture_at_depth(depth: usize, capacity: usize) -> CaptureBuffer
{
    if depth == 0 {
        capture(capacity)
    } else {
        // black_box keeps the recursion from collapsing into a loop.
        black_box(capture_at_depth(black_box(depth - 1), capacity))
    }
}

#[test]
fn test_capture_zero_capacity_is_empty()
{
    let trace = capture(0);
    assert_eq!(trace.len(), 0);
    assert!(trace.is_empty());
}

#[test]
fn test_capture_never_exceeds_capacity()
{
    for capacity in [1, 2, 5, 16, 64] {
        let trace = capture(capacity);
        assert!(trace.len() <= capacity, "capacity {capacity} gave {} frames", trace.len());
    }
}

#[test]
fn test_capture_yields_frames_for_a_real_stack()
{
    // The test harness alone is several frames deep; a generous capacity
    // must find at least our own call and its caller.
    let trace = capture(128);
    assert!(trace.len() >= 2, "got {} frames", trace.len());
}

#[test]
fn test_captured_addresses_are_non_null()
{
    let trace = capture(64);
    for addr in trace.addresses() {
        assert_ne!(*addr, Address::ZERO);
    }
}

#[test]
fn test_deeper_call_chains_yield_more_frames()
{
    let shallow = capture_at_depth(1, 200);
    let deep = capture_at_depth(12, 200);
    assert!(
        deep.len() > shallow.len(),
        "deep {} vs shallow {}",
        deep.len(),
        shallow.len()
    );
}

#[test]
fn test_small_capacity_truncates_a_deep_stack()
{
    let trace = capture_at_depth(12, 4);
    assert_eq!(trace.len(), 4);
}
