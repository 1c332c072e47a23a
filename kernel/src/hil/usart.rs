// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Interface for interrupt-driven, byte-at-a-time USART peripherals.
//!
//! This is the register-level contract the transport's interrupt service
//! routine needs: a status snapshot, the data register in both directions,
//! and the transmit-interrupt enable bit. Bring-up (clocks, baud rate,
//! interrupt controller) is chip specific and not part of this trait.

/// Snapshot of the status bits the service routine acts on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Status {
    /// A received byte is waiting in the data register.
    pub rx_ready: bool,
    /// The transmit data register can accept another byte.
    pub tx_ready: bool,
}

pub trait Usart {
    /// Read the status register.
    fn status(&self) -> Status;

    /// Read the data register. On most parts this clears `rx_ready`.
    fn read_data(&self) -> u8;

    /// Write a byte to the data register. Only valid while `tx_ready`.
    fn write_data(&self, byte: u8);

    /// Request an interrupt whenever the transmit register is empty.
    fn enable_tx_interrupt(&self);

    fn disable_tx_interrupt(&self);
}
