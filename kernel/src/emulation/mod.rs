// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Host models of the RTOS and of a USART, for tests.
//!
//! Tasks are host threads. "Interrupt context" is whatever runs inside
//! [`EmulatedRtos::interrupt`], which holds the same lock as
//! [`Rtos::atomic`](crate::platform::rtos::Rtos::atomic); a task that has
//! interrupts masked therefore excludes the emulated interrupt handler the
//! same way it would on a single core.
//!
//! Only built for `cfg(test)` and with the `emulation` feature.

mod rtos;
mod usart;

pub use self::rtos::EmulatedRtos;
pub use self::usart::EmulatedUsart;
