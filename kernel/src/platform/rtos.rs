// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Interface to the RTOS scheduling the transport's tasks.
//!
//! The transport does not implement tasks, flags or mutexes; it consumes
//! them through [`Rtos`]. Flags and mutexes are named by small integer ids,
//! which lets a task wait on the union of several flags with a single call.
//!
//! Calls are split by context:
//!
//! - Task context only: `create_*`, `wait_flag`, `wait_any`, `enter_mutex`,
//!   `leave_mutex`. These may suspend the caller.
//! - Interrupt context only: `set_flag_from_isr`, `enter_isr`, `exit_isr`.
//! - Either: `atomic`, `ticks_per_second`.

use core::ops::{BitOr, BitOrAssign};

use crate::ErrorCode;

/// Identifier of an event flag.
///
/// Ids are below 32 so that a set of flags fits a [`FlagMask`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlagId(u8);

impl FlagId {
    pub const MAX: u8 = 31;

    /// Panics if `id` is larger than [`FlagId::MAX`].
    pub const fn new(id: u8) -> FlagId {
        assert!(id <= FlagId::MAX, "flag id out of range");
        FlagId(id)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn mask(self) -> FlagMask {
        FlagMask(1 << self.0)
    }
}

/// A set of flags, one bit per [`FlagId`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlagMask(u32);

impl FlagMask {
    pub const fn empty() -> FlagMask {
        FlagMask(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, flag: FlagId) -> bool {
        self.0 & (1 << flag.0) != 0
    }

    pub const fn intersection(self, other: FlagMask) -> FlagMask {
        FlagMask(self.0 & other.0)
    }
}

impl From<FlagId> for FlagMask {
    fn from(flag: FlagId) -> FlagMask {
        flag.mask()
    }
}

impl BitOr for FlagMask {
    type Output = FlagMask;

    fn bitor(self, rhs: FlagMask) -> FlagMask {
        FlagMask(self.0 | rhs.0)
    }
}

impl BitOr<FlagId> for FlagMask {
    type Output = FlagMask;

    fn bitor(self, rhs: FlagId) -> FlagMask {
        self | rhs.mask()
    }
}

impl BitOrAssign<FlagId> for FlagMask {
    fn bitor_assign(&mut self, rhs: FlagId) {
        self.0 |= rhs.mask().0;
    }
}

/// Identifier of an RTOS mutex.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MutexId(u8);

impl MutexId {
    pub const fn new(id: u8) -> MutexId {
        MutexId(id)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// How long a blocking call may suspend the calling task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Timeout {
    /// Wait until signalled or aborted.
    Forever,
    /// Wait at most this many scheduler ticks.
    Ticks(u32),
}

impl Timeout {
    /// A bounded wait of `seconds`, converted with the RTOS tick rate.
    pub fn from_seconds<R: Rtos + ?Sized>(rtos: &R, seconds: u32) -> Timeout {
        Timeout::Ticks(seconds.saturating_mul(rtos.ticks_per_second()))
    }
}

/// RTOS services consumed by the transport.
pub trait Rtos: Sync {
    /// Create a binary flag. An auto-reset flag is cleared by the wait that
    /// observes it.
    fn create_flag(&self, auto_reset: bool, initially_set: bool) -> Result<FlagId, ErrorCode>;

    /// Suspend the calling task until `flag` is set.
    ///
    /// Returns `Err(ErrorCode::TIMEOUT)` when a bounded wait expires and
    /// `Err(ErrorCode::CANCEL)` when the wait is aborted.
    fn wait_flag(&self, flag: FlagId, timeout: Timeout) -> Result<(), ErrorCode>;

    /// Suspend the calling task until any flag in `flags` is set.
    ///
    /// Returns the subset of `flags` that was set; auto-reset flags in that
    /// subset are cleared.
    fn wait_any(&self, flags: FlagMask, timeout: Timeout) -> Result<FlagMask, ErrorCode>;

    /// Set `flag` from interrupt context, waking a task waiting on it.
    fn set_flag_from_isr(&self, flag: FlagId);

    fn create_mutex(&self) -> Result<MutexId, ErrorCode>;

    /// Suspend until the calling task owns `mutex`.
    fn enter_mutex(&self, mutex: MutexId);

    fn leave_mutex(&self, mutex: MutexId);

    /// Bookkeeping hook called first thing in every interrupt handler.
    fn enter_isr(&self);

    /// Bookkeeping hook called last thing in every interrupt handler.
    fn exit_isr(&self);

    /// Run `f` with interrupts globally masked.
    ///
    /// On a single core this excludes every interrupt handler for the
    /// duration of `f`, so `f` must be short and must not block.
    fn atomic<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R;

    fn ticks_per_second(&self) -> u32;
}

/// A scoped hold on an RTOS mutex, released when dropped.
#[must_use = "the mutex is released as soon as the section is dropped"]
pub struct MutexSection<'a, R: Rtos + ?Sized> {
    rtos: &'a R,
    mutex: MutexId,
}

impl<'a, R: Rtos + ?Sized> MutexSection<'a, R> {
    pub fn enter(rtos: &'a R, mutex: MutexId) -> MutexSection<'a, R> {
        rtos.enter_mutex(mutex);
        MutexSection { rtos, mutex }
    }
}

impl<R: Rtos + ?Sized> Drop for MutexSection<'_, R> {
    fn drop(&mut self) {
        self.rtos.leave_mutex(self.mutex);
    }
}
