// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! The console task.
//!
//! Waits on the receive flags of the console port and of any watched
//! auxiliary ports. Bytes from the console port go to the [`CommandLine`];
//! activity on a watched port prints that port's notice on the console.
//!
//! The wait is bounded by `CONFIG.console_poll_seconds` so the task comes
//! back around periodically even when the lines are idle.

use core::fmt;

use kernel::config::CONFIG;
use kernel::platform::rtos::{FlagMask, Rtos, Timeout};
use kernel::ErrorCode;
use log::{debug, info};

use crate::serial_port::{ByteTransport, Writer};

/// Maximum number of auxiliary ports a console can watch.
pub const MAX_WATCHES: usize = 4;

/// The interactive command line driven by the console task.
pub trait CommandLine {
    /// Print the greeting. Called once, before the first byte is fed.
    fn banner(&mut self, out: &mut dyn fmt::Write) -> fmt::Result;

    /// Handle one byte typed on the console.
    fn feed(&mut self, byte: u8, out: &mut dyn fmt::Write) -> fmt::Result;
}

#[derive(Clone, Copy)]
struct Watch<'a> {
    port: &'a dyn ByteTransport,
    notice: &'static str,
}

pub struct Console<'a, R: Rtos, C: CommandLine> {
    rtos: &'a R,
    port: &'a dyn ByteTransport,
    cli: C,
    watches: [Option<Watch<'a>>; MAX_WATCHES],
    wait_set: FlagMask,
    poll: Timeout,
}

impl<'a, R: Rtos, C: CommandLine> Console<'a, R, C> {
    pub fn new(rtos: &'a R, port: &'a dyn ByteTransport, cli: C) -> Console<'a, R, C> {
        Console {
            rtos,
            port,
            cli,
            watches: [None; MAX_WATCHES],
            wait_set: port.rx_flag().mask(),
            poll: Timeout::from_seconds(rtos, CONFIG.console_poll_seconds),
        }
    }

    /// Print `notice` on the console whenever `port` receives a byte.
    ///
    /// Returns `INVAL` for a port that is already watched (or is the console
    /// itself) and `NOMEM` once `MAX_WATCHES` ports are watched.
    pub fn watch(
        &mut self,
        port: &'a dyn ByteTransport,
        notice: &'static str,
    ) -> Result<(), ErrorCode> {
        let flag = port.rx_flag();
        if self.wait_set.contains(flag) {
            return Err(ErrorCode::INVAL);
        }
        let slot = self
            .watches
            .iter_mut()
            .find(|watch| watch.is_none())
            .ok_or(ErrorCode::NOMEM)?;
        *slot = Some(Watch { port, notice });
        self.wait_set |= flag;
        Ok(())
    }

    pub fn command_line(&self) -> &C {
        &self.cli
    }

    pub fn banner(&mut self) {
        if self.cli.banner(&mut Writer::new(self.port)).is_err() {
            debug!("console: banner output failed");
        }
    }

    /// One pass of the task loop.
    ///
    /// A poll timeout is a normal outcome and returns `Ok`. Any other wait
    /// failure, or a failure writing a notice, is returned.
    pub fn step(&mut self) -> Result<(), ErrorCode> {
        match self.wait()? {
            Some(ready) => self.dispatch(ready),
            None => Ok(()),
        }
    }

    /// Wait for input on any watched port. `None` means the poll timed out.
    fn wait(&self) -> Result<Option<FlagMask>, ErrorCode> {
        match self.rtos.wait_any(self.wait_set, self.poll) {
            Ok(ready) => Ok(Some(ready)),
            Err(ErrorCode::TIMEOUT) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Handle the ports flagged in `ready`. Fails only if a notice cannot
    /// be written to the console.
    fn dispatch(&mut self, ready: FlagMask) -> Result<(), ErrorCode> {
        if ready.contains(self.port.rx_flag()) {
            if let Some(byte) = self.port.take_received() {
                if self.cli.feed(byte, &mut Writer::new(self.port)).is_err() {
                    debug!("console: command line output failed");
                }
            }
        }

        for watch in self.watches.iter().flatten() {
            if ready.contains(watch.port.rx_flag()) {
                // Only the arrival matters; clear it so it is not counted
                // as an overrun next time.
                let _ = watch.port.take_received();
                debug!("console: activity on watched port");
                self.port.transmit(watch.notice.as_bytes())?;
            }
        }
        Ok(())
    }

    /// Run the console task forever. A wait failure other than a poll
    /// timeout, or a notice that cannot be written, halts.
    pub fn run(mut self) -> ! {
        info!("console: started");
        self.banner();
        loop {
            let ready = match self.wait() {
                Ok(Some(ready)) => ready,
                Ok(None) => continue,
                Err(err) => panic!("console: wait failed: {:?}", err),
            };
            if let Err(err) = self.dispatch(ready) {
                panic!("console: notice write failed: {:?}", err);
            }
        }
    }
}
