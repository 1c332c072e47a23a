// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Universal synchronous/asynchronous receiver transmitter.
//!
//! The driver is register level only: it brings a port up in 8N1 mode with
//! the receive interrupt on and then exposes the status and data registers
//! through [`kernel::hil::usart::Usart`]. Buffering lives above it.

use kernel::hil::usart::{Status, Usart as UsartHil};
use kernel::platform::ClockInterface;
use kernel::utilities::registers::interfaces::{ReadWriteable, Readable, Writeable};
use kernel::utilities::registers::{register_bitfields, register_structs, ReadWrite};
use kernel::utilities::StaticRef;
use log::debug;

use crate::nvic;
use crate::rcc::{ClockFrequencies, PeripheralClock, PeripheralClockType, Rcc, PCLK1, PCLK2};

register_structs! {
    pub UsartRegisters {
        /// Status register
        (0x00 => sr: ReadWrite<u32, SR::Register>),
        /// Data register
        (0x04 => dr: ReadWrite<u32>),
        /// Baud rate register
        (0x08 => brr: ReadWrite<u32, BRR::Register>),
        /// Control register 1
        (0x0C => cr1: ReadWrite<u32, CR1::Register>),
        (0x10 => _reserved0),
        (0x1C => @END),
    }
}

register_bitfields![u32,
    SR [
        /// Transmit data register empty
        TXE OFFSET(7) NUMBITS(1) [],
        /// Read data register not empty
        RXNE OFFSET(5) NUMBITS(1) []
    ],
    BRR [
        /// Mantissa of USARTDIV
        DIV_Mantissa OFFSET(4) NUMBITS(12) [],
        /// Fraction of USARTDIV
        DIV_Fraction OFFSET(0) NUMBITS(4) []
    ],
    CR1 [
        /// USART enable
        UE OFFSET(13) NUMBITS(1) [],
        /// TXE interrupt enable
        TXEIE OFFSET(7) NUMBITS(1) [],
        /// RXNE interrupt enable
        RXNEIE OFFSET(5) NUMBITS(1) [],
        /// Transmitter enable
        TE OFFSET(3) NUMBITS(1) [],
        /// Receiver enable
        RE OFFSET(2) NUMBITS(1) []
    ]
];

/// USARTDIV limits: a 12-bit mantissa over a 4-bit fraction, and at least
/// one full bit period of 16 samples.
const MIN_DIVISOR: u32 = 16;
const MAX_DIVISOR: u32 = 0xFFFF;

pub const USART1_BASE: usize = 0x4001_3800;
pub const USART2_BASE: usize = 0x4000_4400;
pub const USART3_BASE: usize = 0x4000_4800;
pub const UART4_BASE: usize = 0x4000_4C00;
pub const UART5_BASE: usize = 0x4000_5000;

/// The USARTs this driver supports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Device {
    Usart1,
    Usart2,
    Usart3,
    Uart4,
    Uart5,
}

impl Device {
    pub const ALL: [Device; 5] = [
        Device::Usart1,
        Device::Usart2,
        Device::Usart3,
        Device::Uart4,
        Device::Uart5,
    ];

    /// Identify a device by its register base address.
    pub fn from_base(base: usize) -> Option<Device> {
        Device::ALL.into_iter().find(|device| device.base() == base)
    }

    pub const fn base(self) -> usize {
        match self {
            Device::Usart1 => USART1_BASE,
            Device::Usart2 => USART2_BASE,
            Device::Usart3 => USART3_BASE,
            Device::Uart4 => UART4_BASE,
            Device::Uart5 => UART5_BASE,
        }
    }

    pub const fn irq(self) -> u32 {
        match self {
            Device::Usart1 => nvic::USART1,
            Device::Usart2 => nvic::USART2,
            Device::Usart3 => nvic::USART3,
            Device::Uart4 => nvic::UART4,
            Device::Uart5 => nvic::UART5,
        }
    }

    pub const fn clock(self) -> PeripheralClockType {
        match self {
            Device::Usart1 => PeripheralClockType::APB2(PCLK2::USART1),
            Device::Usart2 => PeripheralClockType::APB1(PCLK1::USART2),
            Device::Usart3 => PeripheralClockType::APB1(PCLK1::USART3),
            Device::Uart4 => PeripheralClockType::APB1(PCLK1::UART4),
            Device::Uart5 => PeripheralClockType::APB1(PCLK1::UART5),
        }
    }
}

pub struct Usart<'a> {
    registers: StaticRef<UsartRegisters>,
    device: Device,
    clock: PeripheralClock<'a>,
}

impl<'a> Usart<'a> {
    /// The USART whose registers start at `base`.
    ///
    /// Panics if `base` is not one of the supported devices; there is no
    /// meaningful way to run a port on an unknown peripheral.
    pub fn from_base(base: usize, rcc: &'a Rcc) -> Usart<'a> {
        match Device::from_base(base) {
            Some(device) => Usart::new(device, rcc),
            None => panic!("usart: no supported USART at {:#010x}", base),
        }
    }

    pub fn new(device: Device, rcc: &'a Rcc) -> Usart<'a> {
        // SAFETY: `device.base()` is the fixed MMIO address of that USART.
        let registers = unsafe { StaticRef::new(device.base() as *const UsartRegisters) };
        Usart::with_registers(device, registers, rcc)
    }

    /// A USART of kind `device` whose registers live at `registers`.
    pub fn with_registers(
        device: Device,
        registers: StaticRef<UsartRegisters>,
        rcc: &'a Rcc,
    ) -> Usart<'a> {
        Usart {
            registers,
            device,
            clock: PeripheralClock::new(device.clock(), rcc),
        }
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn clock(&self) -> &PeripheralClock<'a> {
        &self.clock
    }

    /// Enable the peripheral clock, program the baud rate, and turn on the
    /// transmitter, the receiver and the receive interrupt.
    ///
    /// The NVIC line is left alone; it is enabled when the port is
    /// registered with the interrupt table.
    pub fn configure(&self, clocks: &ClockFrequencies, baud_rate: u32) {
        assert!(baud_rate != 0, "usart: baud rate must be non-zero");

        let divisor = self.clock.frequency(clocks) / baud_rate;
        assert!(
            (MIN_DIVISOR..=MAX_DIVISOR).contains(&divisor),
            "usart: {} baud needs divisor {}, outside the 16x oversampling range",
            baud_rate,
            divisor
        );

        self.clock.enable();
        self.registers.brr.write(
            BRR::DIV_Mantissa.val(divisor >> 4) + BRR::DIV_Fraction.val(divisor & 0xf),
        );
        self.registers
            .cr1
            .write(CR1::UE::SET + CR1::TE::SET + CR1::RE::SET + CR1::RXNEIE::SET);

        debug!("usart: {:?} at {} baud, divisor {:#x}", self.device, baud_rate, divisor);
    }

    /// The value last programmed into the baud rate register.
    pub fn divisor(&self) -> u32 {
        self.registers.brr.get()
    }
}

impl UsartHil for Usart<'_> {
    fn status(&self) -> Status {
        let sr = self.registers.sr.extract();
        Status {
            rx_ready: sr.is_set(SR::RXNE),
            tx_ready: sr.is_set(SR::TXE),
        }
    }

    fn read_data(&self) -> u8 {
        self.registers.dr.get() as u8
    }

    fn write_data(&self, byte: u8) {
        self.registers.dr.set(u32::from(byte));
    }

    fn enable_tx_interrupt(&self) {
        self.registers.cr1.modify(CR1::TXEIE::SET);
    }

    fn disable_tx_interrupt(&self) {
        self.registers.cr1.modify(CR1::TXEIE::CLEAR);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rcc::RccRegisters;
    use crate::test_registers;

    const SYSCLK: u32 = 72_000_000;

    fn rcc() -> Rcc {
        Rcc::with_registers(test_registers::zeroed::<RccRegisters>())
    }

    #[test]
    fn devices_resolve_from_base() {
        for device in Device::ALL {
            assert_eq!(Device::from_base(device.base()), Some(device));
        }
        assert_eq!(Device::from_base(0x4000_0000), None);
        assert_eq!(Device::Uart4.irq(), 52);
    }

    #[test]
    #[should_panic(expected = "no supported USART")]
    fn unsupported_base_panics() {
        let rcc = rcc();
        let _usart = Usart::from_base(0x4000_0000, &rcc);
    }

    #[test]
    fn apb2_divisor_uses_system_clock() {
        let rcc = rcc();
        let registers = test_registers::zeroed::<UsartRegisters>();
        let usart = Usart::with_registers(Device::Usart1, registers, &rcc);

        usart.configure(&ClockFrequencies::new(SYSCLK), 115_200);
        assert_eq!(usart.divisor(), SYSCLK / 115_200);
        assert!(usart.clock().is_enabled());
        assert!(registers.cr1.matches_all(
            CR1::UE::SET + CR1::TE::SET + CR1::RE::SET + CR1::RXNEIE::SET + CR1::TXEIE::CLEAR
        ));
    }

    #[test]
    fn apb1_divisor_uses_half_system_clock() {
        let rcc = rcc();
        let registers = test_registers::zeroed::<UsartRegisters>();
        let usart = Usart::with_registers(Device::Uart4, registers, &rcc);

        usart.configure(&ClockFrequencies::new(SYSCLK), 57_600);
        assert_eq!(usart.divisor(), SYSCLK / 2 / 57_600);
        assert_eq!(registers.brr.read(BRR::DIV_Mantissa), (SYSCLK / 2 / 57_600) >> 4);
        assert_eq!(registers.brr.read(BRR::DIV_Fraction), (SYSCLK / 2 / 57_600) & 0xf);
    }

    #[test]
    fn slowest_and_fastest_divisors_are_accepted() {
        let rcc = rcc();
        let registers = test_registers::zeroed::<UsartRegisters>();
        let usart = Usart::with_registers(Device::Usart1, registers, &rcc);

        // 72 MHz / 1100 baud = 65454 = 0xffae, just inside BRR.
        usart.configure(&ClockFrequencies::new(SYSCLK), 1100);
        assert_eq!(registers.brr.read(BRR::DIV_Mantissa), 0xffa);
        assert_eq!(registers.brr.read(BRR::DIV_Fraction), 0xe);
        usart.configure(&ClockFrequencies::new(SYSCLK), SYSCLK / 16);
        assert_eq!(usart.divisor(), 16);
    }

    #[test]
    #[should_panic(expected = "outside the 16x oversampling range")]
    fn baud_too_slow_for_mantissa_panics() {
        let rcc = rcc();
        let registers = test_registers::zeroed::<UsartRegisters>();
        let usart = Usart::with_registers(Device::Usart1, registers, &rcc);

        // 72 MHz / 1000 baud = 72000, which does not fit in BRR.
        usart.configure(&ClockFrequencies::new(SYSCLK), 1000);
    }

    #[test]
    #[should_panic(expected = "outside the 16x oversampling range")]
    fn baud_too_fast_for_clock_panics() {
        let rcc = rcc();
        let registers = test_registers::zeroed::<UsartRegisters>();
        let usart = Usart::with_registers(Device::Uart4, registers, &rcc);

        usart.configure(&ClockFrequencies::new(SYSCLK), 4_000_000);
    }

    #[test]
    fn status_and_data_registers() {
        let rcc = rcc();
        let registers = test_registers::zeroed::<UsartRegisters>();
        let usart = Usart::with_registers(Device::Usart2, registers, &rcc);

        assert_eq!(usart.status(), Status::default());
        registers.sr.write(SR::RXNE::SET + SR::TXE::SET);
        registers.dr.set(0x1a5);
        assert_eq!(
            usart.status(),
            Status {
                rx_ready: true,
                tx_ready: true
            }
        );
        assert_eq!(usart.read_data(), 0xa5);

        usart.write_data(b'!');
        assert_eq!(registers.dr.get(), u32::from(b'!'));
    }

    #[test]
    fn tx_interrupt_toggle_keeps_other_bits() {
        let rcc = rcc();
        let registers = test_registers::zeroed::<UsartRegisters>();
        let usart = Usart::with_registers(Device::Usart3, registers, &rcc);
        usart.configure(&ClockFrequencies::new(SYSCLK), 9600);

        usart.enable_tx_interrupt();
        assert!(registers.cr1.is_set(CR1::TXEIE));
        usart.disable_tx_interrupt();
        assert!(!registers.cr1.is_set(CR1::TXEIE));
        assert!(registers.cr1.is_set(CR1::UE));
        assert!(registers.cr1.is_set(CR1::RXNEIE));
    }
}
