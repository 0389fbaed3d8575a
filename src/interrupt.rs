//! Scoped disable/restore of the machine's interrupt line.
//!
//! The original source disables interrupts around short critical sections as
//! its sole atomicity primitive, relying on a single logical CPU never
//! preempting itself mid-section. Hosted on real OS threads we model "the
//! interrupt line" as one process-wide gate: holding [`InterruptGuard`] is
//! holding the gate, and only one kernel thread may hold it at a time. The
//! guard restores the gate on every exit path, including unwinding, via `Drop`.
//!
//! Per the design note on shared kernel state, the frame allocator and the
//! process registry do *not* use this gate — they take their own small
//! `std::sync::Mutex` instead, since real locks compose better across real
//! threads than a single global gate would. The gate remains the primitive
//! for sections that the spec calls out explicitly, such as the alarm's
//! tick-driven heap drain (`alarm.rs`).

use std::sync::Mutex;

static GATE: Mutex<()> = Mutex::new(());

/// Holding this guard means the gate is "disabled"; dropping it restores
/// "enabled". Acquisitions do not nest: acquiring while already holding the
/// gate on the same thread would deadlock, so callers must keep critical
/// sections short and non-reentrant, exactly as the original leaf primitives do.
#[must_use = "the gate is released when this guard is dropped"]
pub struct InterruptGuard<'a> {
    _guard: std::sync::MutexGuard<'a, ()>,
}

/// Disables the interrupt gate, returning a guard that re-enables it on drop.
pub fn disable() -> InterruptGuard<'static> {
    let guard = GATE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    InterruptGuard { _guard: guard }
}
