// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};
use std::vec::Vec;

use crate::platform::rtos::{FlagId, FlagMask, MutexId, Rtos, Timeout};
use crate::ErrorCode;

const TICKS_PER_SECOND: u32 = 1000;

struct Flag {
    set: bool,
    auto_reset: bool,
    waiters: usize,
    /// Bumped by `abort_waits`; a waiter that sees it change was aborted.
    aborts: usize,
}

struct State {
    flags: Vec<Flag>,
    mutex_owners: Vec<Option<ThreadId>>,
    isr_depth: usize,
    isr_entries: usize,
}

/// Thread-backed model of the RTOS.
///
/// One tick is one millisecond of host time.
pub struct EmulatedRtos {
    state: Mutex<State>,
    changed: Condvar,
    interrupt_mask: Mutex<()>,
    max_flags: usize,
    max_mutexes: usize,
}

impl EmulatedRtos {
    pub fn new() -> EmulatedRtos {
        EmulatedRtos::with_limits(FlagId::MAX as usize + 1, 16)
    }

    /// An RTOS that fails object creation past the given counts.
    pub fn with_limits(max_flags: usize, max_mutexes: usize) -> EmulatedRtos {
        EmulatedRtos {
            state: Mutex::new(State {
                flags: Vec::new(),
                mutex_owners: Vec::new(),
                isr_depth: 0,
                isr_entries: 0,
            }),
            changed: Condvar::new(),
            interrupt_mask: Mutex::new(()),
            max_flags: max_flags.min(FlagId::MAX as usize + 1),
            max_mutexes,
        }
    }

    /// Run `isr` as an interrupt handler: it cannot overlap a task's
    /// `atomic` section or another handler.
    pub fn interrupt<F, T>(&self, isr: F) -> T
    where
        F: FnOnce() -> T,
    {
        let _masked = self
            .interrupt_mask
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        isr()
    }

    pub fn is_flag_set(&self, flag: FlagId) -> bool {
        self.lock().flags[flag.index()].set
    }

    pub fn clear_flag(&self, flag: FlagId) {
        self.lock().flags[flag.index()].set = false;
    }

    /// Block the calling thread until `count` tasks are suspended on `flag`.
    ///
    /// Panics after five seconds, which only happens when a test is wrong.
    pub fn wait_for_waiters(&self, flag: FlagId, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut state = self.lock();
        while state.flags[flag.index()].waiters < count {
            let now = Instant::now();
            assert!(now < deadline, "no task ever waited on {:?}", flag);
            state = self
                .changed
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Abort every task currently suspended on `flag` with `CANCEL`.
    pub fn abort_waits(&self, flag: FlagId) {
        self.lock().flags[flag.index()].aborts += 1;
        self.changed.notify_all();
    }

    /// Total number of `enter_isr` calls.
    pub fn isr_entries(&self) -> usize {
        self.lock().isr_entries
    }

    pub fn in_isr(&self) -> bool {
        self.lock().isr_depth > 0
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn flags_in(state: &State, mask: FlagMask) -> impl Iterator<Item = usize> + '_ {
        (0..state.flags.len()).filter(move |&i| mask.bits() & (1 << i) != 0)
    }
}

impl Rtos for EmulatedRtos {
    fn create_flag(&self, auto_reset: bool, initially_set: bool) -> Result<FlagId, ErrorCode> {
        let mut state = self.lock();
        if state.flags.len() >= self.max_flags {
            return Err(ErrorCode::NOMEM);
        }
        state.flags.push(Flag {
            set: initially_set,
            auto_reset,
            waiters: 0,
            aborts: 0,
        });
        Ok(FlagId::new((state.flags.len() - 1) as u8))
    }

    fn wait_flag(&self, flag: FlagId, timeout: Timeout) -> Result<(), ErrorCode> {
        self.wait_any(flag.mask(), timeout).map(|_| ())
    }

    fn wait_any(&self, flags: FlagMask, timeout: Timeout) -> Result<FlagMask, ErrorCode> {
        let deadline = match timeout {
            Timeout::Forever => None,
            Timeout::Ticks(ticks) => Some(Instant::now() + Duration::from_millis(ticks.into())),
        };

        let mut state = self.lock();
        let unknown = flags
            .bits()
            .checked_shr(state.flags.len() as u32)
            .unwrap_or(0);
        if flags.is_empty() || unknown != 0 {
            return Err(ErrorCode::INVAL);
        }

        let watched: Vec<usize> = EmulatedRtos::flags_in(&state, flags).collect();
        let aborts: Vec<usize> = watched.iter().map(|&i| state.flags[i].aborts).collect();
        for &i in &watched {
            state.flags[i].waiters += 1;
        }
        self.changed.notify_all();

        let result = loop {
            if watched
                .iter()
                .zip(&aborts)
                .any(|(&i, &seen)| state.flags[i].aborts != seen)
            {
                break Err(ErrorCode::CANCEL);
            }

            let mut ready = FlagMask::empty();
            for &i in &watched {
                let flag = &mut state.flags[i];
                if flag.set {
                    ready |= FlagId::new(i as u8);
                    if flag.auto_reset {
                        flag.set = false;
                    }
                }
            }
            if !ready.is_empty() {
                break Ok(ready);
            }

            state = match deadline {
                None => self
                    .changed
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break Err(ErrorCode::TIMEOUT);
                    }
                    self.changed
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        };

        for &i in &watched {
            state.flags[i].waiters -= 1;
        }
        result
    }

    fn set_flag_from_isr(&self, flag: FlagId) {
        self.lock().flags[flag.index()].set = true;
        self.changed.notify_all();
    }

    fn create_mutex(&self) -> Result<MutexId, ErrorCode> {
        let mut state = self.lock();
        if state.mutex_owners.len() >= self.max_mutexes {
            return Err(ErrorCode::NOMEM);
        }
        state.mutex_owners.push(None);
        Ok(MutexId::new((state.mutex_owners.len() - 1) as u8))
    }

    fn enter_mutex(&self, mutex: MutexId) {
        let me = thread::current().id();
        let mut state = self.lock();
        while state.mutex_owners[mutex.index()].is_some() {
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.mutex_owners[mutex.index()] = Some(me);
    }

    fn leave_mutex(&self, mutex: MutexId) {
        let mut state = self.lock();
        assert_eq!(
            state.mutex_owners[mutex.index()],
            Some(thread::current().id()),
            "mutex released by a task that does not own it"
        );
        state.mutex_owners[mutex.index()] = None;
        drop(state);
        self.changed.notify_all();
    }

    fn enter_isr(&self) {
        let mut state = self.lock();
        state.isr_depth += 1;
        state.isr_entries += 1;
    }

    fn exit_isr(&self) {
        let mut state = self.lock();
        assert!(state.isr_depth > 0, "exit_isr without enter_isr");
        state.isr_depth -= 1;
    }

    fn atomic<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _masked = self
            .interrupt_mask
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f()
    }

    fn ticks_per_second(&self) -> u32 {
        TICKS_PER_SECOND
    }
}
