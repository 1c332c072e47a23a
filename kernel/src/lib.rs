// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Core serial transport kernel.
//!
//! The kernel crate holds the data structures shared between interrupt
//! context and RTOS tasks, the interfaces to the RTOS that schedules those
//! tasks, and the Hardware Interface Layer (HIL) that chips implement for
//! their serial peripherals.
//!
//! Most `unsafe` code is in this kernel crate.

#![warn(unreachable_pub)]
#![no_std]

#[cfg(any(test, feature = "emulation"))]
extern crate std;

pub mod collections;
pub mod config;
pub mod errorcode;
pub mod hil;
pub mod platform;
pub mod utilities;

#[cfg(any(test, feature = "emulation"))]
pub mod emulation;

pub use crate::errorcode::ErrorCode;
