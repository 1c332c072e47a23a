// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Single-slot mailbox from an interrupt handler to a task.
//!
//! The slot is one bit wider than a byte so that [`EMPTY`] can never be
//! confused with received data. The interrupt handler publishes
//! unconditionally: a byte that has not been taken by the time the next one
//! arrives is overwritten. The mailbox is therefore lossy for bursts longer
//! than one byte; overwritten bytes are counted but not reported.

use core::sync::atomic::{AtomicU16, AtomicUsize, Ordering};

use crate::platform::rtos::{FlagId, Rtos, Timeout};
use crate::ErrorCode;

/// Slot value meaning "nothing latched".
pub const EMPTY: u16 = 0x100;

pub struct Mailbox {
    slot: AtomicU16,
    overruns: AtomicUsize,
    ready: FlagId,
}

impl Mailbox {
    /// `ready` should be an auto-reset flag that starts clear.
    pub const fn new(ready: FlagId) -> Mailbox {
        Mailbox {
            slot: AtomicU16::new(EMPTY),
            overruns: AtomicUsize::new(0),
            ready,
        }
    }

    pub fn ready_flag(&self) -> FlagId {
        self.ready
    }

    pub fn is_empty(&self) -> bool {
        self.slot.load(Ordering::Acquire) == EMPTY
    }

    /// Number of bytes lost to overwrites since creation.
    pub fn overruns(&self) -> usize {
        self.overruns.load(Ordering::Relaxed)
    }

    /// Latch `byte` and signal the ready flag. Interrupt context only.
    pub fn publish<R: Rtos + ?Sized>(&self, rtos: &R, byte: u8) {
        if self.slot.swap(u16::from(byte), Ordering::AcqRel) != EMPTY {
            self.overruns.fetch_add(1, Ordering::Relaxed);
        }
        rtos.set_flag_from_isr(self.ready);
    }

    /// Take the latched byte, if any, leaving the slot empty.
    pub fn take(&self) -> Option<u8> {
        match self.slot.swap(EMPTY, Ordering::AcqRel) {
            EMPTY => None,
            value => Some(value as u8),
        }
    }

    /// Suspend until a byte has been published, then take it.
    ///
    /// Task context only. A signal that finds the slot already emptied (for
    /// example by a caller of [`take`](Mailbox::take)) is ignored and the
    /// wait starts over.
    pub fn consume<R: Rtos + ?Sized>(&self, rtos: &R, timeout: Timeout) -> Result<u8, ErrorCode> {
        loop {
            rtos.wait_flag(self.ready, timeout)?;
            if let Some(byte) = self.take() {
                return Ok(byte);
            }
        }
    }
}
