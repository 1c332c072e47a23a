// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Interrupt-driven serial port with blocking task-side calls.
//!
//! Each `SerialPort` pairs one USART with an outbound [`FlowRing`] and an
//! inbound [`Mailbox`]. Tasks enqueue bytes with [`SerialPort::write`] and
//! friends, which suspend while the ring is full; the USART interrupt, routed
//! to [`InterruptService::service_interrupt`], moves bytes from the ring to
//! the data register and latches received bytes into the mailbox.
//!
//! Writers are serialised by an RTOS mutex, so at most one task per port is
//! ever the ring's producer. The interrupt side takes no lock: the producer
//! masks interrupts for its short cursor update instead.
//!
//! The receive path holds a single byte. A byte that is not read before the
//! next one arrives is lost; [`SerialPort::rx_overruns`] counts such losses.
//!
//! Setup
//! -----
//!
//! Bring-up happens once, before the port's interrupt line is enabled:
//!
//! ```rust,ignore
//! let rcc = stm32f1xx::rcc::Rcc::new();
//! let usart1 = stm32f1xx::usart::Usart::from_base(stm32f1xx::usart::USART1_BASE, &rcc);
//! usart1.configure(&stm32f1xx::rcc::ClockFrequencies::new(72_000_000), 115200);
//! let port: DefaultSerialPort<_, _> = SerialPort::new(&rtos, &usart1, 115200);
//! interrupt_table.register(usart1.device(), &port).unwrap();
//! ```

use core::fmt;

use kernel::collections::flow_ring::FlowRing;
use kernel::collections::mailbox::Mailbox;
use kernel::config::CONFIG;
use kernel::hil::usart::Usart;
use kernel::platform::rtos::{FlagId, MutexId, MutexSection, Rtos, Timeout};
use kernel::platform::InterruptService;
use kernel::ErrorCode;
use log::{info, trace};

/// Outbound ring size used by [`DefaultSerialPort`].
pub const TX_BUFFER_LEN: usize = CONFIG.tx_buffer_len;

pub type DefaultSerialPort<'a, R, U> = SerialPort<'a, R, U, TX_BUFFER_LEN>;

/// Byte-level view of a port, independent of its USART and ring size.
pub trait ByteTransport {
    /// Flag signalled each time a byte is latched for reading.
    fn rx_flag(&self) -> FlagId;

    /// Take the latched byte without waiting.
    fn take_received(&self) -> Option<u8>;

    /// Queue `bytes` for transmission, waiting for room as needed.
    fn transmit(&self, bytes: &[u8]) -> Result<(), ErrorCode>;
}

pub struct SerialPort<'a, R: Rtos, U: Usart, const N: usize> {
    rtos: &'a R,
    usart: &'a U,
    baud_rate: u32,
    tx: FlowRing<N>,
    rx: Mailbox,
    writers: MutexId,
}

impl<'a, R: Rtos, U: Usart, const N: usize> SerialPort<'a, R, U, N> {
    /// Create the state for a port whose USART is already configured.
    ///
    /// Must run before the USART interrupt line is enabled. Failing to
    /// create the RTOS objects is fatal: the port is never left half built.
    pub fn new(rtos: &'a R, usart: &'a U, baud_rate: u32) -> SerialPort<'a, R, U, N> {
        let writers = match rtos.create_mutex() {
            Ok(mutex) => mutex,
            Err(err) => panic!("serial port: cannot create writer mutex: {:?}", err),
        };
        let rx_ready = Self::create_flag(rtos, "receive");
        let tx_room = Self::create_flag(rtos, "transmit room");

        info!("serial port: {} baud, {} byte transmit ring", baud_rate, N);

        SerialPort {
            rtos,
            usart,
            baud_rate,
            tx: FlowRing::new(tx_room),
            rx: Mailbox::new(rx_ready),
            writers,
        }
    }

    fn create_flag(rtos: &R, what: &str) -> FlagId {
        match rtos.create_flag(true, false) {
            Ok(flag) => flag,
            Err(err) => panic!("serial port: cannot create {} flag: {:?}", what, err),
        }
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    pub fn tx_ring(&self) -> &FlowRing<N> {
        &self.tx
    }

    /// Received bytes lost because the previous one was never read.
    pub fn rx_overruns(&self) -> usize {
        self.rx.overruns()
    }

    /// Queue `bytes`, suspending for as long as it takes to find room.
    pub fn write(&self, bytes: &[u8]) -> Result<(), ErrorCode> {
        self.write_timeout(bytes, Timeout::Forever)
    }

    /// Queue `bytes`, giving up if any single wait for room exceeds
    /// `timeout`.
    ///
    /// On error the bytes queued before the failing one stay queued and are
    /// still transmitted.
    pub fn write_timeout(&self, bytes: &[u8], timeout: Timeout) -> Result<(), ErrorCode> {
        if CONFIG.trace_transport {
            trace!("serial port: write {} bytes", bytes.len());
        }

        let _section = MutexSection::enter(self.rtos, self.writers);
        for &byte in bytes {
            self.tx.put(self.rtos, byte, timeout)?;
            // The interrupt turns itself off whenever it empties the ring.
            self.usart.enable_tx_interrupt();
        }
        Ok(())
    }

    pub fn putc(&self, byte: u8) -> Result<(), ErrorCode> {
        self.write(&[byte])
    }

    pub fn puts(&self, s: &str) -> Result<(), ErrorCode> {
        self.write(s.as_bytes())
    }

    /// A `core::fmt::Write` adapter writing through this port.
    pub fn writer(&self) -> Writer<'_> {
        Writer::new(self)
    }

    /// Wait for the next received byte.
    ///
    /// An unbounded wait can only fail if the RTOS is misconfigured, which is
    /// treated as fatal.
    pub fn read(&self) -> u8 {
        match self.read_timeout(Timeout::Forever) {
            Ok(byte) => byte,
            Err(err) => panic!("serial port: receive wait failed: {:?}", err),
        }
    }

    pub fn read_timeout(&self, timeout: Timeout) -> Result<u8, ErrorCode> {
        let byte = self.rx.consume(self.rtos, timeout)?;
        if CONFIG.trace_transport {
            trace!("serial port: read {:#04x}", byte);
        }
        Ok(byte)
    }

    /// The body of the USART interrupt handler.
    fn service(&self) {
        let mut status = self.usart.status();
        let data = self.usart.read_data();

        if status.rx_ready {
            self.rx.publish(self.rtos, data);
        }

        while status.tx_ready {
            match self.tx.drain_one(self.rtos) {
                Some(byte) => {
                    self.usart.write_data(byte);
                    status = self.usart.status();
                }
                None => {
                    self.usart.disable_tx_interrupt();
                    break;
                }
            }
        }
    }
}

impl<R: Rtos, U: Usart, const N: usize> InterruptService for SerialPort<'_, R, U, N> {
    fn service_interrupt(&self) {
        self.rtos.enter_isr();
        self.service();
        self.rtos.exit_isr();
    }
}

impl<R: Rtos, U: Usart, const N: usize> ByteTransport for SerialPort<'_, R, U, N> {
    fn rx_flag(&self) -> FlagId {
        self.rx.ready_flag()
    }

    fn take_received(&self) -> Option<u8> {
        self.rx.take()
    }

    fn transmit(&self, bytes: &[u8]) -> Result<(), ErrorCode> {
        self.write(bytes)
    }
}

/// Formatted output through a [`ByteTransport`].
pub struct Writer<'p> {
    port: &'p dyn ByteTransport,
}

impl<'p> Writer<'p> {
    pub fn new(port: &'p dyn ByteTransport) -> Writer<'p> {
        Writer { port }
    }
}

impl fmt::Write for Writer<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.port.transmit(s.as_bytes()).map_err(|_| fmt::Error)
    }
}
