//! # Types
//!
//! Core value types shared across the trace engine.
//!
//! These types carry no platform detail: an `Address` is just a strongly
//! typed instruction pointer, and a `FrameInfo` is whatever the resolvers
//! managed to recover for one.

pub mod address;
pub mod frame;

// Re-export all public types
pub use address::Address;
pub use frame::FrameInfo;
