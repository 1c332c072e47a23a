// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Data structure for storing compile-time configuration options.
//!
//! Configuration is a typed `const` object rather than a set of Cargo
//! features: every code path stays type-checked even when disabled, and the
//! compiler folds the constants away after checking. Values that are not
//! booleans (buffer sizes, priorities, timeouts) can live here too.

/// Data structure holding compile-time configuration options.
///
/// To change the configuration, modify the relevant values in the `CONFIG`
/// constant object defined at the end of this file.
pub struct Config {
    /// Capacity, in bytes, of each port's outbound ring.
    pub tx_buffer_len: usize,

    /// NVIC priority programmed for every USART interrupt line.
    ///
    /// Only the upper four bits are implemented on STM32F1 parts, so values
    /// should be multiples of 16.
    pub usart_irq_priority: u8,

    /// How long the console task waits for input before polling again.
    pub console_poll_seconds: u32,

    /// Whether task-context transport calls emit `trace!` records.
    ///
    /// Interrupt context never logs regardless of this setting.
    pub trace_transport: bool,
}

/// A unique instance of `Config` where compile-time configuration options are
/// defined. This is the only location in the kernel where a Cargo feature
/// changes transport behaviour.
pub const CONFIG: Config = Config {
    tx_buffer_len: 64,
    usart_irq_priority: 0x40,
    console_poll_seconds: 1,
    trace_transport: cfg!(feature = "trace_transport"),
};
