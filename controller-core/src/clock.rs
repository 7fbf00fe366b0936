//! Monotonic timestamp abstraction shared by the core state machines.
//!
//! The firmware binds this to the Embassy instant type while tests and the
//! emulator substitute simple counters, keeping every deadline computation
//! in this crate free of platform time sources.

use core::ops::Add;
use core::time::Duration;

/// Trait implemented by monotonic instant wrappers used for deadline and
/// idle-time tracking.
pub trait MonotonicInstant: Copy + Ord + Add<Duration, Output = Self> {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}
