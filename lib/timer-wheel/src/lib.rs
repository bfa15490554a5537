//! A pooled, tick-driven timer core for cooperative protocol stacks.
//!
//! Timers are allocated from a fixed-capacity pool and linked into a
//! doubly-linked active list. A periodic task drives the pool with
//! [`sweep`](TimerPool::sweep): every sweep decrements each active timer once
//! and runs the callbacks of the timers that reached zero on a *previous*
//! sweep. Because the decrement happens on the sweep after insertion and the
//! test happens before the decrement, a timer requested for `N` ticks expires
//! on the `(N+1)`-th sweep; a zero-tick timer fires on the very next sweep.
//!
//! Callbacks receive a caller-chosen context type `C` and may re-enter the
//! pool: they can [`get`](TimerPool::get) new timers and [`free`](TimerPool::free)
//! or [`set`](TimerPool::set) other timers, including the timer the sweep is
//! about to visit. The sweep cursor is advanced *before* each timer is
//! handled, and `free` moves the cursor past a cell that is about to be
//! visited, so no cell is ever visited twice in one sweep and a freed cell's
//! callback never runs.
//!
//! The pool's internal state sits behind an [`AtomicRefCell`]: list and pool
//! mutation happens inside short borrow windows, and the borrow is dropped
//! before any callback is invoked. The pool itself performs no locking beyond
//! that; serializing sweeps against API calls from other threads is the
//! embedding's job (a network stack typically holds its global lock around
//! both).

#![forbid(unsafe_code)]

use std::fmt::Debug;

use atomic_refcell::AtomicRefCell;
use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Handle to an allocated timer cell. Keys are generational: a key whose
    /// cell was freed never aliases a newer allocation.
    pub struct TimerKey;
}

type Callback<C> = Box<dyn FnOnce(&mut C) + Send + Sync>;

/// Error returned by [`TimerPool::get`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GetError {
    /// The pool is exhausted.
    NoneAvail,
}

/// Error returned by [`TimerPool::set`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SetError {
    /// The timer was already freed (or already expired and fired).
    Freed,
}

/// A snapshot of the pool's occupancy statistics.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub capacity: usize,
    pub used: usize,
    /// High-water mark of `used`.
    pub max_used: usize,
    /// Frees of already-freed timers (idempotent no-ops).
    pub not_used: u64,
    /// Total number of timers that expired and ran their callback.
    pub expired: u64,
}

struct Cell<C> {
    prev: Option<TimerKey>,
    next: Option<TimerKey>,
    /// Remaining sweeps before expiry, decrement-then-test.
    ticks: u64,
    callback: Callback<C>,
}

struct Inner<C> {
    cells: SlotMap<TimerKey, Cell<C>>,
    /// Head of the active list; newest timers are inserted here.
    head: Option<TimerKey>,
    /// Next cell the in-progress sweep will visit. `None` outside of sweeps.
    /// `free` must advance this past a cell it removes.
    cursor: Option<TimerKey>,
    capacity: usize,
    max_used: usize,
    not_used: u64,
    expired: u64,
}

/// Fixed-capacity pool of one-shot timers driven by [`sweep`](Self::sweep).
pub struct TimerPool<C> {
    inner: AtomicRefCell<Inner<C>>,
}

// Not derived: a derive would demand `C: Debug` (the sweep context often
// contains the pool itself), and formatting must not take an internal
// borrow mid-sweep.
impl<C> Debug for TimerPool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerPool").finish_non_exhaustive()
    }
}

impl<C> TimerPool<C> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: AtomicRefCell::new(Inner {
                cells: SlotMap::with_capacity_and_key(capacity),
                head: None,
                cursor: None,
                capacity,
                max_used: 0,
                not_used: 0,
                expired: 0,
            }),
        }
    }

    /// Reserve a timer that fires `ticks` sweeps from now (plus the one
    /// implicit tick described in the crate docs) and insert it at the head
    /// of the active list.
    pub fn get(
        &self,
        ticks: u64,
        callback: impl FnOnce(&mut C) + Send + Sync + 'static,
    ) -> Result<TimerKey, GetError> {
        let inner = &mut *self.inner.borrow_mut();

        if inner.cells.len() >= inner.capacity {
            log::trace!("timer pool exhausted (capacity {})", inner.capacity);
            return Err(GetError::NoneAvail);
        }

        let head = inner.head;
        let key = inner.cells.insert(Cell {
            prev: None,
            next: head,
            ticks,
            callback: Box::new(callback),
        });

        if let Some(head) = head {
            inner.cells[head].prev = Some(key);
        }
        inner.head = Some(key);

        inner.max_used = inner.max_used.max(inner.cells.len());

        Ok(key)
    }

    /// Release a timer. Idempotent: freeing an already-freed (or already
    /// expired) timer only bumps the `not_used` counter. If the freed cell is
    /// the one the in-progress sweep would visit next, the sweep cursor is
    /// advanced past it.
    pub fn free(&self, timer: TimerKey) {
        let inner = &mut *self.inner.borrow_mut();

        if !inner.cells.contains_key(timer) {
            inner.not_used += 1;
            return;
        }

        if inner.cursor == Some(timer) {
            inner.cursor = inner.cells[timer].next;
        }

        unlink(inner, timer);
        inner.cells.remove(timer);
    }

    /// Update a live timer with a new callback and tick count.
    pub fn set(
        &self,
        timer: TimerKey,
        ticks: u64,
        callback: impl FnOnce(&mut C) + Send + Sync + 'static,
    ) -> Result<(), SetError> {
        let inner = &mut *self.inner.borrow_mut();

        let Some(cell) = inner.cells.get_mut(timer) else {
            return Err(SetError::Freed);
        };

        cell.ticks = ticks;
        cell.callback = Box::new(callback);

        Ok(())
    }

    /// One pass over the active list: decrement every live timer, fire the
    /// expired ones. An expired cell is unlinked and freed *before* its
    /// callback runs, so the callback can immediately allocate a new timer
    /// even from a full pool. Callbacks run with no internal borrow held and
    /// may call any pool method; they must not assume the cell they were
    /// registered on still exists.
    pub fn sweep(&self, ctx: &mut C) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.cursor = inner.head;
        }

        loop {
            let fired = {
                let inner = &mut *self.inner.borrow_mut();

                let Some(key) = inner.cursor else {
                    break;
                };

                // Advance first so that reentrant frees from the callback
                // below stay coherent with this walk.
                inner.cursor = inner.cells[key].next;

                let cell = &mut inner.cells[key];
                if cell.ticks > 0 {
                    cell.ticks -= 1;
                    None
                } else {
                    unlink(inner, key);
                    let cell = inner.cells.remove(key).unwrap();
                    inner.expired += 1;
                    Some(cell.callback)
                }
            };

            if let Some(callback) = fired {
                callback(ctx);
            }
        }

        self.inner.borrow_mut().cursor = None;
    }

    pub fn pool_stats(&self) -> PoolStats {
        let inner = self.inner.borrow();
        PoolStats {
            capacity: inner.capacity,
            used: inner.cells.len(),
            max_used: inner.max_used,
            not_used: inner.not_used,
            expired: inner.expired,
        }
    }

    /// Reset the high-water mark down to the current occupancy.
    pub fn reset_max_used(&self) {
        let inner = &mut *self.inner.borrow_mut();
        inner.max_used = inner.cells.len();
    }

    /// Remaining ticks of a live timer, mostly useful for diagnostics.
    pub fn remaining_ticks(&self, timer: TimerKey) -> Option<u64> {
        self.inner.borrow().cells.get(timer).map(|cell| cell.ticks)
    }
}

fn unlink<C>(inner: &mut Inner<C>, key: TimerKey) {
    let (prev, next) = {
        let cell = &inner.cells[key];
        (cell.prev, cell.next)
    };

    match prev {
        Some(prev) => inner.cells[prev].next = next,
        None => inner.head = next,
    }

    if let Some(next) = next {
        inner.cells[next].prev = prev;
    }
}

// The pool is handed to a periodic timer task on another thread, so it must
// stay shareable even though callbacks box arbitrary closures.
static_assertions::assert_impl_all!(TimerPool<()>: Send, Sync);
