// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Reset and clock control.
//!
//! Only the peripheral clock-enable registers are driven here. The clock
//! tree itself is set up by the board before any peripheral is touched; its
//! resulting frequencies are described by [`ClockFrequencies`].

use kernel::platform::ClockInterface;
use kernel::utilities::registers::interfaces::{ReadWriteable, Readable};
use kernel::utilities::registers::{register_bitfields, register_structs, Field, ReadWrite};
use kernel::utilities::StaticRef;

register_structs! {
    /// Reset and clock control
    pub RccRegisters {
        (0x00 => _reserved0),
        /// APB2 peripheral clock enable register
        (0x18 => apb2enr: ReadWrite<u32, APB2ENR::Register>),
        /// APB1 peripheral clock enable register
        (0x1C => apb1enr: ReadWrite<u32, APB1ENR::Register>),
        (0x20 => _reserved1),
        (0x28 => @END),
    }
}

register_bitfields![u32,
    APB2ENR [
        /// USART1 clock enable
        USART1EN OFFSET(14) NUMBITS(1) []
    ],
    APB1ENR [
        /// UART5 clock enable
        UART5EN OFFSET(20) NUMBITS(1) [],
        /// UART4 clock enable
        UART4EN OFFSET(19) NUMBITS(1) [],
        /// USART3 clock enable
        USART3EN OFFSET(18) NUMBITS(1) [],
        /// USART2 clock enable
        USART2EN OFFSET(17) NUMBITS(1) []
    ]
];

const RCC_BASE: StaticRef<RccRegisters> =
    unsafe { StaticRef::new(0x4002_1000 as *const RccRegisters) };

/// Frequencies of the clock tree as configured by the board.
///
/// The bus prescalers are fixed: APB2 runs at the system clock and APB1 at
/// half of it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockFrequencies {
    pub sysclk: u32,
}

impl ClockFrequencies {
    pub const fn new(sysclk: u32) -> ClockFrequencies {
        ClockFrequencies { sysclk }
    }

    pub const fn pclk1(&self) -> u32 {
        self.sysclk / 2
    }

    pub const fn pclk2(&self) -> u32 {
        self.sysclk
    }
}

pub struct Rcc {
    registers: StaticRef<RccRegisters>,
}

impl Rcc {
    pub const fn new() -> Rcc {
        Rcc {
            registers: RCC_BASE,
        }
    }

    /// An RCC whose registers live somewhere other than the usual address.
    pub const fn with_registers(registers: StaticRef<RccRegisters>) -> Rcc {
        Rcc { registers }
    }

    fn is_enabled_apb1(&self, field: Field<u32, APB1ENR::Register>) -> bool {
        self.registers.apb1enr.is_set(field)
    }

    fn set_apb1(&self, field: Field<u32, APB1ENR::Register>, on: bool) {
        self.registers.apb1enr.modify(field.val(u32::from(on)));
    }

    fn is_enabled_apb2(&self, field: Field<u32, APB2ENR::Register>) -> bool {
        self.registers.apb2enr.is_set(field)
    }

    fn set_apb2(&self, field: Field<u32, APB2ENR::Register>, on: bool) {
        self.registers.apb2enr.modify(field.val(u32::from(on)));
    }
}

/// Bus + Clock name for the peripherals
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeripheralClockType {
    APB1(PCLK1),
    APB2(PCLK2),
}

/// Peripherals clocked by PCLK1
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PCLK1 {
    USART2,
    USART3,
    UART4,
    UART5,
}

/// Peripherals clocked by PCLK2
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PCLK2 {
    USART1,
}

impl PCLK1 {
    fn enable_bit(self) -> Field<u32, APB1ENR::Register> {
        match self {
            PCLK1::USART2 => APB1ENR::USART2EN,
            PCLK1::USART3 => APB1ENR::USART3EN,
            PCLK1::UART4 => APB1ENR::UART4EN,
            PCLK1::UART5 => APB1ENR::UART5EN,
        }
    }
}

impl PCLK2 {
    fn enable_bit(self) -> Field<u32, APB2ENR::Register> {
        match self {
            PCLK2::USART1 => APB2ENR::USART1EN,
        }
    }
}

pub struct PeripheralClock<'a> {
    pub clock: PeripheralClockType,
    rcc: &'a Rcc,
}

impl<'a> PeripheralClock<'a> {
    pub const fn new(clock: PeripheralClockType, rcc: &'a Rcc) -> PeripheralClock<'a> {
        PeripheralClock { clock, rcc }
    }

    /// Frequency of the bus this peripheral sits on.
    pub fn frequency(&self, clocks: &ClockFrequencies) -> u32 {
        match self.clock {
            PeripheralClockType::APB1(_) => clocks.pclk1(),
            PeripheralClockType::APB2(_) => clocks.pclk2(),
        }
    }
}

impl ClockInterface for PeripheralClock<'_> {
    fn is_enabled(&self) -> bool {
        match self.clock {
            PeripheralClockType::APB1(v) => self.rcc.is_enabled_apb1(v.enable_bit()),
            PeripheralClockType::APB2(v) => self.rcc.is_enabled_apb2(v.enable_bit()),
        }
    }

    fn enable(&self) {
        match self.clock {
            PeripheralClockType::APB1(v) => self.rcc.set_apb1(v.enable_bit(), true),
            PeripheralClockType::APB2(v) => self.rcc.set_apb2(v.enable_bit(), true),
        }
    }

    fn disable(&self) {
        match self.clock {
            PeripheralClockType::APB1(v) => self.rcc.set_apb1(v.enable_bit(), false),
            PeripheralClockType::APB2(v) => self.rcc.set_apb2(v.enable_bit(), false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_registers;

    #[test]
    fn enable_sets_only_its_own_bit() {
        let registers = test_registers::zeroed::<RccRegisters>();
        let rcc = Rcc::with_registers(registers);
        let uart4 = PeripheralClock::new(PeripheralClockType::APB1(PCLK1::UART4), &rcc);
        let usart2 = PeripheralClock::new(PeripheralClockType::APB1(PCLK1::USART2), &rcc);

        uart4.enable();
        usart2.enable();
        assert_eq!(registers.apb1enr.get(), (1 << 19) | (1 << 17));
        assert_eq!(registers.apb2enr.get(), 0);

        uart4.disable();
        assert!(!uart4.is_enabled());
        assert!(usart2.is_enabled());
    }

    #[test]
    fn usart1_is_on_apb2() {
        let registers = test_registers::zeroed::<RccRegisters>();
        let rcc = Rcc::with_registers(registers);
        let usart1 = PeripheralClock::new(PeripheralClockType::APB2(PCLK2::USART1), &rcc);

        usart1.enable();
        assert_eq!(registers.apb2enr.get(), 1 << 14);
        assert_eq!(usart1.frequency(&ClockFrequencies::new(72_000_000)), 72_000_000);
    }

    #[test]
    fn apb1_runs_at_half_speed() {
        let clocks = ClockFrequencies::new(72_000_000);
        assert_eq!(clocks.pclk1(), 36_000_000);
        assert_eq!(clocks.pclk2(), 72_000_000);
    }
}
