// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::vec::Vec;

use crate::collections::mailbox::EMPTY;
use crate::hil::usart::{Status, Usart};

/// Register-level model of a USART.
///
/// The receive side latches one byte, as the hardware data register does.
/// The transmit side accepts `tx_room` bytes before reporting "not ready";
/// by default it never fills up.
pub struct EmulatedUsart {
    rx: AtomicU16,
    tx_room: AtomicUsize,
    tx_interrupt: AtomicBool,
    sent: Mutex<Vec<u8>>,
}

impl EmulatedUsart {
    pub fn new() -> EmulatedUsart {
        EmulatedUsart {
            rx: AtomicU16::new(EMPTY),
            tx_room: AtomicUsize::new(usize::MAX),
            tx_interrupt: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// A byte arrives on the line.
    pub fn receive(&self, byte: u8) {
        self.rx.store(u16::from(byte), Ordering::Release);
    }

    /// Limit how many more bytes the transmitter accepts.
    pub fn set_tx_room(&self, bytes: usize) {
        self.tx_room.store(bytes, Ordering::Release);
    }

    pub fn tx_interrupt_enabled(&self) -> bool {
        self.tx_interrupt.load(Ordering::Acquire)
    }

    /// Whether the interrupt line would be asserted right now.
    pub fn interrupt_pending(&self) -> bool {
        let status = self.status();
        status.rx_ready || (status.tx_ready && self.tx_interrupt_enabled())
    }

    /// Everything written to the data register so far, oldest first.
    pub fn take_sent(&self) -> Vec<u8> {
        core::mem::take(&mut *self.sent.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Usart for EmulatedUsart {
    fn status(&self) -> Status {
        Status {
            rx_ready: self.rx.load(Ordering::Acquire) != EMPTY,
            tx_ready: self.tx_room.load(Ordering::Acquire) > 0,
        }
    }

    fn read_data(&self) -> u8 {
        match self.rx.swap(EMPTY, Ordering::AcqRel) {
            EMPTY => 0,
            value => value as u8,
        }
    }

    fn write_data(&self, byte: u8) {
        let room = self.tx_room.load(Ordering::Acquire);
        assert!(room > 0, "write to a full transmit register");
        if room != usize::MAX {
            self.tx_room.store(room - 1, Ordering::Release);
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(byte);
    }

    fn enable_tx_interrupt(&self) {
        self.tx_interrupt.store(true, Ordering::Release);
    }

    fn disable_tx_interrupt(&self) {
        self.tx_interrupt.store(false, Ordering::Release);
    }
}
