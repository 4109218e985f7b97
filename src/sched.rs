//! Scheduler state transitions and the three drive passes
//!
//! All state lives behind a `critical_section::Mutex<RefCell<..>>`, the
//! portable form of an interrupt-masked global. Every operation enters the
//! critical section itself, so `tick_advance` and `runtime_accumulate` can
//! be called straight from ISRs while the registration surface runs from
//! the main loop, with no locking left to the caller. Callbacks are the
//! one exception: `execute` invokes them with the critical section
//! released, so interrupts are not masked for the duration of user code
//! and a callback may call back into the scheduler.

use core::cell::RefCell;

use critical_section::Mutex;
use ufmt::{uDebug, uWrite, Formatter};

use crate::config::{MAX_TASKS, TICK_SCAN_LIMIT};
use crate::list::{self, ListId, Registry, NIL};
use crate::task::{Task, TaskFn, TaskId, TaskInfo};

/// Status codes surfaced by the registration and mutation operations.
///
/// These are the only failure kinds; the drive passes never fail, they
/// abort silently when a guard rail trips.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// Registration or resume targeted a task already on the active list.
    AlreadyActive,
    /// Suspension targeted a task already on the suspended list.
    AlreadySuspended,
    /// No registered task matches the given name or id.
    NotFound,
    /// Every arena slot is occupied by a distinct task id.
    CapacityExhausted,
}

impl uDebug for Error {
    fn fmt<W>(&self, f: &mut Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        let s = match self {
            Error::AlreadyActive => "AlreadyActive",
            Error::AlreadySuspended => "AlreadySuspended",
            Error::NotFound => "NotFound",
            Error::CapacityExhausted => "CapacityExhausted",
        };
        f.write_str(s)
    }
}

struct Core<const CAP: usize> {
    slots: [Option<Task>; CAP],
    registry: Registry<CAP>,
    /// Mailbox holding the slot last marked ready by `tick_advance`,
    /// `NIL` when none. Cleared whenever that slot changes list so it
    /// never points at a parked task.
    last_ready: u16,
}

/// Cooperative tick-driven task scheduler over a fixed slot arena.
///
/// `CAP` is the arena capacity; slots are claimed on first registration of
/// a name and reused by that name afterwards. There is no destroy
/// operation, a task is parked on the suspended list instead.
pub struct Scheduler<const CAP: usize = MAX_TASKS> {
    core: Mutex<RefCell<Core<CAP>>>,
}

impl<const CAP: usize> Scheduler<CAP> {
    /// Empty scheduler: both lists empty, no last-ready task.
    pub const fn new() -> Self {
        assert!(CAP <= (u16::MAX - 3) as usize, "arena capacity exceeds the index space");
        Scheduler {
            core: Mutex::new(RefCell::new(Core {
                slots: [None; CAP],
                registry: Registry::new(),
                last_ready: NIL,
            })),
        }
    }

    /// Registers `name` on the active list with a fresh countdown.
    ///
    /// A task parked on the suspended list is reinitialized and moved back
    /// to active. Registering a name whose id is already active is a no-op
    /// reported as [`Error::AlreadyActive`].
    pub fn add(&self, name: &'static str, handle: TaskFn, period: u32) -> Result<TaskId, Error> {
        critical_section::with(|cs| self.core.borrow_ref_mut(cs).add(name, handle, period))
    }

    /// Parks the task with id `id`: countdown reset, evicted from active,
    /// inserted at the head of the suspended list.
    pub fn remove(&self, id: TaskId) -> Result<(), Error> {
        critical_section::with(|cs| self.core.borrow_ref_mut(cs).park(id))
    }

    /// Parks the task registered under `name` (or any name aliasing it).
    pub fn suspend(&self, name: &str) -> Result<(), Error> {
        critical_section::with(|cs| self.core.borrow_ref_mut(cs).park(TaskId::of(name)))
    }

    /// Moves a suspended task back to the active list with a fresh
    /// countdown. Only the suspended list is searched.
    pub fn resume(&self, name: &str) -> Result<(), Error> {
        critical_section::with(|cs| self.core.borrow_ref_mut(cs).resume(TaskId::of(name)))
    }

    /// Snapshot of the active task registered under `name`. Suspended
    /// tasks are not found by this query.
    pub fn lookup(&self, name: &str) -> Option<TaskInfo> {
        let id = TaskId::of(name);
        critical_section::with(|cs| {
            let core = self.core.borrow_ref(cs);
            let idx = core.find(ListId::Active, id)?;
            core.slots[idx as usize].as_ref().map(|t| t.info(false))
        })
    }

    /// Updates the period of an active or suspended task. Takes effect at
    /// the next countdown reset, not immediately.
    pub fn set_period(&self, id: TaskId, ticks: u32) -> Result<(), Error> {
        critical_section::with(|cs| self.core.borrow_ref_mut(cs).set_period(id, ticks))
    }

    /// Overrides the remaining countdown of the task most recently marked
    /// ready by `tick_advance`, changing only its next firing delay.
    ///
    /// Meant to be called by that task's own callback during the execute
    /// pass. Fails with [`Error::NotFound`] when no task has been marked
    /// ready since the last list transition.
    pub fn reschedule_current(&self, ticks: u32) -> Result<(), Error> {
        critical_section::with(|cs| self.core.borrow_ref_mut(cs).reschedule_current(ticks))
    }

    /// Advances every active countdown by one tick; expirations become
    /// ready and their timers reset to the period.
    ///
    /// Call from the platform's periodic timer interrupt. The scan visits
    /// at most [`TICK_SCAN_LIMIT`] entries and aborts early on a link that
    /// does not resolve, trading completeness for bounded execution when
    /// the list is corrupted.
    pub fn tick_advance(&self) {
        critical_section::with(|cs| self.core.borrow_ref_mut(cs).tick_advance());
    }

    /// Accumulates one high-frequency tick on every active task currently
    /// ready, measuring ready-to-run latency. No state transitions.
    ///
    /// Call from a timer interrupt running faster than the tick source.
    pub fn runtime_accumulate(&self) {
        critical_section::with(|cs| self.core.borrow_ref_mut(cs).runtime_accumulate());
    }

    /// Runs every ready callback once and clears readiness.
    ///
    /// Call from the application main loop. The ready set is snapshotted
    /// under the critical section, then each callback runs with the
    /// section released; a callback that suspends, resumes or re-registers
    /// tasks (itself included) is tolerated, and a task parked by an
    /// earlier callback in the same pass is skipped, not run while
    /// suspended. Visit order is list order,
    /// most recently added first; callers must not rely on FIFO order.
    pub fn execute(&self) {
        let mut batch = [None::<(u16, TaskId, TaskFn)>; CAP];
        let mut n = 0;
        critical_section::with(|cs| {
            let core = self.core.borrow_ref(cs);
            for idx in core.registry.iter(ListId::Active) {
                if n >= CAP {
                    break;
                }
                if let Some(task) = core.slots.get(idx as usize).and_then(|s| s.as_ref()) {
                    if task.ready {
                        batch[n] = Some((idx, task.id, task.handle));
                        n += 1;
                    }
                }
            }
        });

        for entry in batch.iter().take(n) {
            let Some((idx, id, handle)) = *entry else {
                continue;
            };
            // an earlier callback may have parked or re-registered this
            // task; invoke it only while the slot still holds the same
            // task and it is still ready
            let still_ready = critical_section::with(|cs| {
                let core = self.core.borrow_ref(cs);
                matches!(
                    core.slots.get(idx as usize).and_then(|s| s.as_ref()),
                    Some(task) if task.id == id && task.ready
                )
            });
            if !still_ready {
                continue;
            }
            handle();
            critical_section::with(|cs| {
                let mut core = self.core.borrow_ref_mut(cs);
                // the callback may have re-registered the slot; only
                // finish bookkeeping if it still holds the same task
                if let Some(task) = core.slots.get_mut(idx as usize).and_then(|s| s.as_mut()) {
                    if task.id == id {
                        task.run_time = task.run_tick;
                        task.ready = false;
                        task.run_tick = 0;
                    }
                }
            });
        }
    }

    /// Number of tasks on the active list.
    pub fn active_count(&self) -> usize {
        critical_section::with(|cs| self.core.borrow_ref(cs).registry.iter(ListId::Active).count())
    }

    /// Number of tasks parked on the suspended list.
    pub fn suspended_count(&self) -> usize {
        critical_section::with(|cs| {
            self.core.borrow_ref(cs).registry.iter(ListId::Suspended).count()
        })
    }

    /// Writes one status line per task to `w`, active list first.
    pub fn dump<W: uWrite>(&self, w: &mut W) -> Result<(), W::Error> {
        let mut infos = [None::<TaskInfo>; CAP];
        let mut n = 0;
        critical_section::with(|cs| {
            let core = self.core.borrow_ref(cs);
            for (list, suspended) in [(ListId::Active, false), (ListId::Suspended, true)] {
                for idx in core.registry.iter(list) {
                    if n >= CAP {
                        return;
                    }
                    if let Some(task) = core.slots.get(idx as usize).and_then(|s| s.as_ref()) {
                        infos[n] = Some(task.info(suspended));
                        n += 1;
                    }
                }
            }
        });
        for info in infos.iter().take(n).flatten() {
            ufmt::uwriteln!(w, "{:?}", info)?;
        }
        Ok(())
    }
}

impl<const CAP: usize> Core<CAP> {
    /// Linear id scan over one list, the only lookup the 16-bit
    /// fingerprint scheme needs.
    fn find(&self, list: ListId, id: TaskId) -> Option<u16> {
        self.registry.iter(list).find(|&idx| {
            matches!(self.slots.get(idx as usize), Some(Some(task)) if task.id == id)
        })
    }

    fn clear_last_ready(&mut self, idx: u16) {
        if self.last_ready == idx {
            self.last_ready = NIL;
        }
    }

    fn add(&mut self, name: &'static str, handle: TaskFn, period: u32) -> Result<TaskId, Error> {
        let id = TaskId::of(name);
        if let Some(idx) = self.find(ListId::Suspended, id) {
            self.slots[idx as usize] = Some(Task::new(name, handle, period));
            self.registry.remove(idx);
            self.registry.insert_head(ListId::Active, idx);
            self.clear_last_ready(idx);
            return Ok(id);
        }
        if self.find(ListId::Active, id).is_some() {
            return Err(Error::AlreadyActive);
        }
        let idx = self
            .slots
            .iter()
            .position(|slot| slot.is_none())
            .ok_or(Error::CapacityExhausted)? as u16;
        self.slots[idx as usize] = Some(Task::new(name, handle, period));
        self.registry.insert_head(ListId::Active, idx);
        Ok(id)
    }

    fn park(&mut self, id: TaskId) -> Result<(), Error> {
        if let Some(idx) = self.find(ListId::Active, id) {
            if let Some(task) = self.slots[idx as usize].as_mut() {
                task.reset();
            }
            self.registry.remove(idx);
            self.registry.insert_head(ListId::Suspended, idx);
            self.clear_last_ready(idx);
            return Ok(());
        }
        if self.find(ListId::Suspended, id).is_some() {
            return Err(Error::AlreadySuspended);
        }
        Err(Error::NotFound)
    }

    fn resume(&mut self, id: TaskId) -> Result<(), Error> {
        if let Some(idx) = self.find(ListId::Suspended, id) {
            if let Some(task) = self.slots[idx as usize].as_mut() {
                task.reset();
            }
            self.registry.remove(idx);
            self.registry.insert_head(ListId::Active, idx);
            return Ok(());
        }
        if self.find(ListId::Active, id).is_some() {
            return Err(Error::AlreadyActive);
        }
        Err(Error::NotFound)
    }

    fn set_period(&mut self, id: TaskId, ticks: u32) -> Result<(), Error> {
        let idx = self
            .find(ListId::Active, id)
            .or_else(|| self.find(ListId::Suspended, id))
            .ok_or(Error::NotFound)?;
        if let Some(task) = self.slots[idx as usize].as_mut() {
            task.period = ticks;
        }
        Ok(())
    }

    fn reschedule_current(&mut self, ticks: u32) -> Result<(), Error> {
        let idx = self.last_ready;
        match self.slots.get_mut(idx as usize).and_then(|s| s.as_mut()) {
            Some(task) => {
                task.timer = ticks;
                Ok(())
            }
            None => Err(Error::NotFound),
        }
    }

    fn tick_advance(&mut self) {
        let mut node = self.registry.first(ListId::Active);
        let mut count = 0;
        while !list::is_sentinel(node) {
            // capture the successor first; abort on anything that does
            // not resolve rather than walking corrupted links
            let next = match self.registry.link(node) {
                Some(link) if link.next != NIL => link.next,
                _ => return,
            };
            let task = match self.slots.get_mut(node as usize).and_then(|s| s.as_mut()) {
                Some(task) => task,
                None => return,
            };
            if task.timer > 0 {
                task.timer -= 1;
                if task.timer == 0 {
                    task.ready = true;
                    task.timer = task.period;
                    self.last_ready = node;
                }
            }
            count += 1;
            if count >= TICK_SCAN_LIMIT {
                return;
            }
            node = next;
        }
    }

    fn runtime_accumulate(&mut self) {
        let mut node = self.registry.first(ListId::Active);
        let mut count = 0;
        while !list::is_sentinel(node) && count <= CAP {
            let next = match self.registry.link(node) {
                Some(link) if link.next != NIL => link.next,
                _ => return,
            };
            if let Some(task) = self.slots.get_mut(node as usize).and_then(|s| s.as_mut()) {
                if task.ready {
                    task.run_tick = task.run_tick.saturating_add(1);
                }
            }
            count += 1;
            node = next;
        }
    }
}

impl<const CAP: usize> Default for Scheduler<CAP> {
    fn default() -> Self {
        Self::new()
    }
}
