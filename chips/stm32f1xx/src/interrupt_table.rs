// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2024.

//! Routes USART interrupt lines to the ports that service them.
//!
//! The board's vector stubs call [`InterruptTable::dispatch`] with the
//! active interrupt number. A port is registered once, after its state is
//! fully built; registering is what enables its NVIC line.

use core::cell::Cell;

use kernel::config::CONFIG;
use kernel::platform::InterruptService;
use kernel::ErrorCode;
use log::debug;

use crate::nvic::Nvic;
use crate::usart::Device;

pub struct InterruptTable<'a> {
    nvic: &'a Nvic,
    services: [Cell<Option<&'a dyn InterruptService>>; Device::ALL.len()],
}

impl<'a> InterruptTable<'a> {
    pub fn new(nvic: &'a Nvic) -> InterruptTable<'a> {
        InterruptTable {
            nvic,
            services: Default::default(),
        }
    }

    fn slot(device: Device) -> usize {
        device as usize
    }

    /// Route `device`'s interrupt to `service`, then set the line's
    /// priority and enable it.
    ///
    /// Returns `BUSY` if the device already has a service.
    pub fn register(
        &self,
        device: Device,
        service: &'a dyn InterruptService,
    ) -> Result<(), ErrorCode> {
        let slot = &self.services[Self::slot(device)];
        if slot.get().is_some() {
            return Err(ErrorCode::BUSY);
        }
        slot.set(Some(service));

        let irq = device.irq();
        self.nvic.set_priority(irq, CONFIG.usart_irq_priority);
        self.nvic.enable(irq);
        debug!("interrupt table: {:?} on line {}", device, irq);
        Ok(())
    }

    /// Service interrupt `irq`. Returns `false` if no registered device
    /// owns that line.
    pub fn dispatch(&self, irq: u32) -> bool {
        let service = Device::ALL
            .into_iter()
            .find(|device| device.irq() == irq)
            .and_then(|device| self.services[Self::slot(device)].get());
        match service {
            Some(service) => {
                service.service_interrupt();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use super::*;
    use crate::nvic::{self, NvicRegisters};
    use crate::test_registers;

    #[derive(Default)]
    struct Counter {
        calls: Cell<usize>,
    }

    impl InterruptService for Counter {
        fn service_interrupt(&self) {
            self.calls.set(self.calls.get() + 1);
        }
    }

    #[test]
    fn register_enables_line_with_configured_priority() {
        let nvic = Nvic::with_registers(test_registers::zeroed::<NvicRegisters>());
        let table = InterruptTable::new(&nvic);
        let gps = Counter::default();

        assert!(!nvic.is_enabled(nvic::UART4));
        table.register(Device::Uart4, &gps).unwrap();
        assert!(nvic.is_enabled(nvic::UART4));
        assert_eq!(nvic.priority(nvic::UART4), CONFIG.usart_irq_priority);
    }

    #[test]
    fn dispatch_reaches_only_the_owner() {
        let nvic = Nvic::with_registers(test_registers::zeroed::<NvicRegisters>());
        let table = InterruptTable::new(&nvic);
        let console = Counter::default();
        let gps = Counter::default();
        table.register(Device::Usart1, &console).unwrap();
        table.register(Device::Uart4, &gps).unwrap();

        assert!(table.dispatch(nvic::USART1));
        assert!(table.dispatch(nvic::USART1));
        assert!(table.dispatch(nvic::UART4));
        assert_eq!(console.calls.get(), 2);
        assert_eq!(gps.calls.get(), 1);

        assert!(!table.dispatch(nvic::USART2));
        assert!(!table.dispatch(0));
    }

    #[test]
    fn second_registration_is_refused() {
        let nvic = Nvic::with_registers(test_registers::zeroed::<NvicRegisters>());
        let table = InterruptTable::new(&nvic);
        let first = Counter::default();
        let second = Counter::default();

        table.register(Device::Usart2, &first).unwrap();
        assert_eq!(table.register(Device::Usart2, &second), Err(ErrorCode::BUSY));
        assert!(table.dispatch(nvic::USART2));
        assert_eq!(first.calls.get(), 1);
        assert_eq!(second.calls.get(), 0);
    }
}
