//! Atomic types used for meter storage.
//!
//! We always require a 64-bit atomic integer regardless of whether the standard library exposes
//! one for the target architecture, so 32-bit targets fall back to `portable-atomic`.
//!
//! Floating-point accumulators are stored as their bit patterns inside an [`AtomicU64`] and
//! updated with compare-and-swap loops.

use std::sync::atomic::Ordering;

#[cfg(target_pointer_width = "32")]
pub use portable_atomic::AtomicU64;
#[cfg(not(target_pointer_width = "32"))]
pub use std::sync::atomic::AtomicU64;

/// An atomic 64-bit floating-point value.
#[derive(Debug)]
pub struct AtomicF64 {
    bits: AtomicU64,
}

impl AtomicF64 {
    /// Creates a new `AtomicF64` holding `value`.
    pub fn new(value: f64) -> Self {
        Self { bits: AtomicU64::new(value.to_bits()) }
    }

    /// Loads the current value.
    pub fn load(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    /// Replaces the current value.
    pub fn store(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Release);
    }

    /// Adds `delta` to the current value.
    pub fn add(&self, delta: f64) {
        // The closure never returns `None`, so `fetch_update` only returns once the swap lands.
        let _ = self.bits.fetch_update(Ordering::AcqRel, Ordering::Relaxed, |curr| {
            Some((f64::from_bits(curr) + delta).to_bits())
        });
    }

    /// Raises the current value to `value` if `value` is larger.
    pub fn fetch_max(&self, value: f64) {
        let _ = self.bits.fetch_update(Ordering::AcqRel, Ordering::Relaxed, |curr| {
            if value > f64::from_bits(curr) {
                Some(value.to_bits())
            } else {
                None
            }
        });
    }
}

impl Default for AtomicF64 {
    fn default() -> Self {
        Self::new(0.0)
    }
}
