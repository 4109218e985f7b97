//! Configuration constants for the scheduler

/// Default number of task slots in a scheduler arena.
pub const MAX_TASKS: usize = 16;

/// Hard cap on list entries visited by a single tick-advance pass.
///
/// Bounds the work done in interrupt context if the active list is ever
/// corrupted into a cycle that never reaches the sentinel.
pub const TICK_SCAN_LIMIT: usize = 1000;
