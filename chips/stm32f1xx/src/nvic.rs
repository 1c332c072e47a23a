// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Cortex-M3 NVIC, limited to what the USART lines need.

use kernel::utilities::registers::interfaces::{Readable, Writeable};
use kernel::utilities::registers::{register_structs, ReadWrite};
use kernel::utilities::StaticRef;

pub const USART1: u32 = 37;
pub const USART2: u32 = 38;
pub const USART3: u32 = 39;
pub const UART4: u32 = 52;
pub const UART5: u32 = 53;

/// Interrupt lines the Cortex-M3 can implement.
const MAX_INTERRUPTS: u32 = 240;

register_structs! {
    /// NVIC Registers.
    pub NvicRegisters {
        (0x000 => _reserved0),
        /// Interrupt Set-Enable Registers
        (0x100 => iser: [ReadWrite<u32>; 8]),
        (0x120 => _reserved1),
        /// Interrupt Clear-Enable Registers
        (0x180 => icer: [ReadWrite<u32>; 8]),
        (0x1A0 => _reserved2),
        /// Interrupt Priority Registers, one byte per line
        (0x400 => ipr: [ReadWrite<u8>; 240]),
        (0x4F0 => @END),
    }
}

const NVIC_BASE: StaticRef<NvicRegisters> =
    unsafe { StaticRef::new(0xE000_E000 as *const NvicRegisters) };

pub struct Nvic {
    registers: StaticRef<NvicRegisters>,
}

impl Nvic {
    pub const fn new() -> Nvic {
        Nvic {
            registers: NVIC_BASE,
        }
    }

    pub const fn with_registers(registers: StaticRef<NvicRegisters>) -> Nvic {
        Nvic { registers }
    }

    fn check(irq: u32) -> (usize, u32) {
        assert!(irq < MAX_INTERRUPTS, "nvic: no interrupt line {}", irq);
        ((irq / 32) as usize, 1 << (irq % 32))
    }

    /// Set the raw 8-bit priority of `irq`. Lower is more urgent; the
    /// STM32F1 implements only the upper four bits.
    pub fn set_priority(&self, irq: u32, priority: u8) {
        Self::check(irq);
        self.registers.ipr[irq as usize].set(priority);
    }

    pub fn priority(&self, irq: u32) -> u8 {
        Self::check(irq);
        self.registers.ipr[irq as usize].get()
    }

    pub fn enable(&self, irq: u32) {
        let (bank, bit) = Self::check(irq);
        self.registers.iser[bank].set(bit);
    }

    pub fn disable(&self, irq: u32) {
        let (bank, bit) = Self::check(irq);
        self.registers.icer[bank].set(bit);
    }

    pub fn is_enabled(&self, irq: u32) -> bool {
        let (bank, bit) = Self::check(irq);
        self.registers.iser[bank].get() & bit != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_registers;

    #[test]
    fn enable_uses_set_register_bank() {
        let registers = test_registers::zeroed::<NvicRegisters>();
        let nvic = Nvic::with_registers(registers);

        // Host memory keeps only the last write, where ISER would OR it in.
        nvic.enable(USART1);
        assert_eq!(registers.iser[1].get(), 1 << 5);
        assert!(nvic.is_enabled(USART1));
        assert!(!nvic.is_enabled(USART2));

        nvic.enable(UART5);
        assert_eq!(registers.iser[1].get(), 1 << 21);
        assert!(nvic.is_enabled(UART5));
        assert_eq!(registers.iser[0].get(), 0);

        nvic.disable(UART5);
        assert_eq!(registers.icer[1].get(), 1 << 21);
    }

    #[test]
    fn priority_is_per_line() {
        let registers = test_registers::zeroed::<NvicRegisters>();
        let nvic = Nvic::with_registers(registers);

        nvic.set_priority(UART4, 0x40);
        assert_eq!(nvic.priority(UART4), 0x40);
        assert_eq!(nvic.priority(UART5), 0);
    }

    #[test]
    #[should_panic(expected = "no interrupt line")]
    fn out_of_range_line_panics() {
        let nvic = Nvic::with_registers(test_registers::zeroed::<NvicRegisters>());
        nvic.enable(MAX_INTERRUPTS);
    }
}
