//! Environment abstraction for the tracker reconstruction core.
//!
//! The reconstruction core (`tracker_core`) is batch-oriented and
//! single-threaded: one event is processed to completion before the next
//! begins, and there is no inter-event shared mutable state after
//! geometry construction. The only ambient resource a component needs is
//! randomness (optional TDC smearing, optional drift-point tie-breaking),
//! and this crate's [`Context`] is the explicit, seedable owner of it.

mod context;

pub use context::Context;
