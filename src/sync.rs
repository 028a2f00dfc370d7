//! # Synchronization Primitives
//!
//! Interrupt-safe critical sections. On Cortex-M the implementation comes
//! from `cortex-m`'s `critical-section-single-core` feature (interrupts
//! masked with `cpsid i`); host tests use the `std` implementation.

pub use critical_section::CriticalSection;

/// Execute a closure with interrupts disabled.
///
/// The exit path requires interrupts to stay masked from the moment the
/// running task is identified until the next head is promoted, so all of
/// `exit::task_exit` runs inside one of these.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(CriticalSection<'_>) -> R,
{
    critical_section::with(f)
}
