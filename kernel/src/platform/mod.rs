// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Interfaces to the platform the transport runs on: the RTOS that owns the
//! tasks and the interrupt plumbing of the chip.

pub mod rtos;

/// Implemented by anything a chip interrupt vector can hand control to.
///
/// The chip's interrupt table holds `&dyn InterruptService` references and
/// calls [`service_interrupt`](InterruptService::service_interrupt) from
/// hardware-interrupt priority. Implementations must not block.
pub trait InterruptService {
    fn service_interrupt(&self);
}

/// Generic operations that clock-like things are expected to support.
pub trait ClockInterface {
    fn is_enabled(&self) -> bool;
    fn enable(&self);
    fn disable(&self);
}
