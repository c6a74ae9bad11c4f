//! Software-composed buses, for data lines that can't be claimed as one bus (e.g. pins spread
//! across chips or claimed by different parts of the program).
use crate::{GpioActiveLevel, GpioBus, GpioBusOutput, GpioError, GpioOutput, GpioPin, GpioResult};
use std::fmt::Debug;

pub struct SoftGpioBus<'a, const N: usize> {
    pins: [&'a mut dyn GpioPin; N],
}

impl<'a, const N: usize> SoftGpioBus<'a, N> {
    /// Composes a bus from individual pins. The first pin is the least significant bit.
    pub fn new(pins: [&'a mut dyn GpioPin; N]) -> Self {
        Self { pins }
    }
}

impl<const N: usize> Debug for SoftGpioBus<'_, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SoftGpioBus({:?})", self.pins)
    }
}

impl<const N: usize> GpioBus<N> for SoftGpioBus<'_, N> {
    fn as_output(&mut self) -> GpioResult<Box<dyn GpioBusOutput<N> + '_>> {
        let outputs = self
            .pins
            .iter_mut()
            .map(|pin| pin.as_output())
            .collect::<GpioResult<Vec<_>>>()?;
        let outputs = outputs
            .try_into()
            .map_err(|_| GpioError::Other("bus width mismatch".to_string()))?;
        Ok(Box::new(SoftGpioBusOutput { pins: outputs }))
    }

    fn supports_active_level(&self) -> bool {
        self.pins.iter().all(|pin| pin.supports_active_level())
    }

    fn active_level(&self) -> GpioActiveLevel {
        self.pins
            .first()
            .map(|pin| pin.active_level())
            .unwrap_or_default()
    }

    fn set_active_level(&mut self, level: GpioActiveLevel) -> GpioResult<()> {
        if !self.supports_active_level() {
            return Err(GpioError::NotSupported);
        }

        for pin in self.pins.iter_mut() {
            pin.set_active_level(level)?;
        }
        Ok(())
    }
}

struct SoftGpioBusOutput<'a, const N: usize> {
    pins: [Box<dyn GpioOutput + 'a>; N],
}

impl<const N: usize> Debug for SoftGpioBusOutput<'_, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SoftGpioBusOutput({:?})", self.pins)
    }
}

impl<const N: usize> GpioBusOutput<N> for SoftGpioBusOutput<'_, N> {
    fn write(&self, values: &[bool; N]) -> GpioResult<()> {
        for (pin, &value) in self.pins.iter().zip(values) {
            pin.write(value)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GpioDriver;
    use crate::sim::{SimEvent, SimGpioDriver};

    #[test]
    fn writes_each_pin_in_bus_order() {
        let gpio = SimGpioDriver::new(16);
        let mut d0 = gpio.get_pin(12).unwrap();
        let mut d1 = gpio.get_pin(3).unwrap();
        let mut bus = SoftGpioBus::new([&mut *d0, &mut *d1]);
        let out = bus.as_output().unwrap();
        out.write(&[false, true]).unwrap();

        assert_eq!(
            gpio.events(),
            vec![
                SimEvent::ConfigureOutput { pin: 12 },
                SimEvent::ConfigureOutput { pin: 3 },
                SimEvent::Write { pin: 12, level: false },
                SimEvent::Write { pin: 3, level: true },
            ]
        );
    }

    #[test]
    fn active_level_applies_to_every_pin() {
        let gpio = SimGpioDriver::new(4);
        let mut d0 = gpio.get_pin(0).unwrap();
        let mut d1 = gpio.get_pin(1).unwrap();
        let mut bus = SoftGpioBus::new([&mut *d0, &mut *d1]);
        assert!(bus.supports_active_level());
        bus.set_active_level(GpioActiveLevel::Low).unwrap();
        assert_eq!(bus.active_level(), GpioActiveLevel::Low);
        drop(bus);
        assert_eq!(d1.active_level(), GpioActiveLevel::Low);
    }
}
