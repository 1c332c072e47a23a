// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Peripheral implementations for the STM32F1xx family: the USARTs, the
//! clock-enable half of the RCC, and the NVIC lines the USARTs use.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod interrupt_table;
pub mod nvic;
pub mod rcc;
pub mod usart;
