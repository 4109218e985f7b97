//! Task descriptors and name identity

use ufmt::{uDebug, uWrite, Formatter};

/// Zero-argument task callback, run to completion from the execute pass.
pub type TaskFn = fn();

/// 16-bit fingerprint of a task name.
///
/// Computed with a DJB2-style rolling hash truncated to 16 bits. Two
/// distinct names can alias to the same id; every lookup, suspend, resume
/// and existence check treats aliasing names as the same task. Fixed-width
/// identity is a deliberate trade-off for fast comparisons without string
/// scans in interrupt context.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TaskId(u16);

impl TaskId {
    /// Fingerprints `name` with `h = h * 33 + byte` starting from 5381.
    pub fn of(name: &str) -> Self {
        let mut hash: u16 = 5381;
        for &byte in name.as_bytes() {
            hash = hash
                .wrapping_shl(5)
                .wrapping_add(hash)
                .wrapping_add(byte as u16);
        }
        TaskId(hash)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl uDebug for TaskId {
    fn fmt<W>(&self, f: &mut Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        ufmt::uwrite!(f, "TaskId({})", self.0)
    }
}

impl core::fmt::Debug for TaskId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "TaskId({})", self.0)
    }
}

/// One arena slot. Owned by the scheduler, never moved after registration.
#[derive(Clone, Copy)]
pub(crate) struct Task {
    pub name: &'static str,
    pub id: TaskId,
    pub ready: bool,
    pub handle: TaskFn,
    /// Countdown in tick units; restored to `period` when readiness fires.
    pub timer: u32,
    pub period: u32,
    /// High-frequency ticks accumulated while ready but not yet executed.
    pub run_tick: u32,
    /// `run_tick` as observed at the most recent execution.
    pub run_time: u32,
}

impl Task {
    pub(crate) fn new(name: &'static str, handle: TaskFn, period: u32) -> Self {
        Task {
            name,
            id: TaskId::of(name),
            ready: false,
            handle,
            timer: period,
            period,
            run_tick: 0,
            run_time: 0,
        }
    }

    /// State reset applied on every list transition.
    pub(crate) fn reset(&mut self) {
        self.ready = false;
        self.timer = self.period;
    }

    pub(crate) fn info(&self, suspended: bool) -> TaskInfo {
        TaskInfo {
            name: self.name,
            id: self.id,
            ready: self.ready,
            timer: self.timer,
            period: self.period,
            run_tick: self.run_tick,
            run_time: self.run_time,
            suspended,
        }
    }
}

/// Copy snapshot of a task's state, taken under the critical section.
#[derive(Clone, Copy, Debug)]
pub struct TaskInfo {
    pub name: &'static str,
    pub id: TaskId,
    pub ready: bool,
    pub timer: u32,
    pub period: u32,
    pub run_tick: u32,
    pub run_time: u32,
    pub suspended: bool,
}

impl uDebug for TaskInfo {
    fn fmt<W>(&self, f: &mut Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        ufmt::uwrite!(
            f,
            "{} [{}] timer={}/{} run_time={}",
            self.name,
            if self.suspended { "suspended" } else { "active" },
            self.timer,
            self.period,
            self.run_time
        )
    }
}
