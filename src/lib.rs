//! Cooperative tick-driven task scheduler for bare-metal targets
//!
//! Periodic, non-preemptive tasks over a fixed slot arena, no heap and no
//! OS. A hardware timer drives [`Scheduler::tick_advance`], which counts
//! every active task down and marks expirations ready; a faster timer
//! drives [`Scheduler::runtime_accumulate`], which measures how long ready
//! tasks wait; the main loop drives [`Scheduler::execute`], which runs
//! every ready callback once and clears readiness.
//!
//! Every operation takes its own `critical-section`, so the drive passes
//! can be called straight from interrupt handlers and the scheduler can
//! live in a `static`. Link a `critical-section` implementation for the
//! target (or its `std` feature on a host).
//!
//! Task identity is a 16-bit fingerprint of the task name; two distinct
//! names can alias to the same task. See [`TaskId`].
//!
//! ```
//! use ticksched::Scheduler;
//!
//! static SCHED: Scheduler = Scheduler::new();
//!
//! fn blink() { /* toggle a pin */ }
//!
//! SCHED.add("blink", blink, 3).unwrap();
//! SCHED.tick_advance(); // from the tick ISR, normally
//! SCHED.tick_advance();
//! SCHED.tick_advance();
//! SCHED.execute(); // from the main loop
//! assert!(!SCHED.lookup("blink").unwrap().ready);
//! ```

#![cfg_attr(not(test), no_std)]

pub mod config;
mod list;
mod sched;
mod task;

pub use sched::{Error, Scheduler};
pub use task::{TaskFn, TaskId, TaskInfo};
