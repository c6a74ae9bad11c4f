//! Simulated GPIO backend.
//!
//! Instead of touching hardware, every pin configuration, pin write and delay is appended to a
//! shared, ordered event log. The log can be replayed by
//! [Hd44780Model](crate::lcd::hd44780::sim::Hd44780Model) to see what a real controller would
//! have displayed.
use crate::claims::PinClaims;
use crate::delay::DelayNs;
use crate::{
    GpioActiveLevel, GpioBus, GpioBusOutput, GpioDriver, GpioOutput, GpioPin,
    GpioResult,
};
use log::trace;
use std::cell::RefCell;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// A single recorded operation.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SimEvent {
    /// The pin was switched to output mode.
    ConfigureOutput { pin: usize },
    /// The pin was driven to the given physical level (after applying the active level).
    Write { pin: usize, level: bool },
    /// The caller blocked for the given duration.
    Delay { ns: u64 },
}

type EventLog = Rc<RefCell<Vec<SimEvent>>>;

pub struct SimGpioDriver {
    pin_count: usize,
    log: EventLog,
    claims: PinClaims,
}

impl SimGpioDriver {
    /// Creates a simulated chip with `pin_count` lines.
    pub fn new(pin_count: usize) -> Self {
        SimGpioDriver {
            pin_count,
            log: Rc::new(RefCell::new(Vec::new())),
            claims: PinClaims::new(pin_count),
        }
    }

    /// Returns a delay that records into the same log as the pins.
    pub fn delay(&self) -> SimDelay {
        SimDelay {
            log: Rc::clone(&self.log),
        }
    }

    /// Returns a copy of everything recorded so far.
    pub fn events(&self) -> Vec<SimEvent> {
        self.log.borrow().clone()
    }

    /// Forgets everything recorded so far. Pin claims are kept.
    pub fn clear_events(&self) {
        self.log.borrow_mut().clear();
    }

    fn record(&self, event: SimEvent) {
        trace!("Sim: {:?}", event);
        self.log.borrow_mut().push(event);
    }
}

impl Debug for SimGpioDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimGpioDriver({})", self.pin_count)
    }
}

impl GpioDriver for SimGpioDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(self.pin_count)
    }

    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>> {
        self.claims.claim(&[index])?;

        Ok(Box::new(SimPin {
            driver: self,
            pin_index: index,
            active_level: GpioActiveLevel::High,
        }))
    }

    fn get_pin_bus<const N: usize>(
        &self,
        indices: [usize; N],
    ) -> GpioResult<Box<dyn GpioBus<N> + '_>> {
        self.claims.claim(&indices)?;

        Ok(Box::new(SimBus {
            driver: self,
            pin_indices: indices,
            active_level: GpioActiveLevel::High,
        }))
    }
}

struct SimPin<'a> {
    driver: &'a SimGpioDriver,
    pin_index: usize,
    active_level: GpioActiveLevel,
}

impl Debug for SimPin<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}]", self.driver, self.pin_index)
    }
}

impl GpioPin for SimPin<'_> {
    fn as_output(&mut self) -> GpioResult<Box<dyn GpioOutput + '_>> {
        self.driver.record(SimEvent::ConfigureOutput {
            pin: self.pin_index,
        });
        Ok(Box::new(SimOutput { pin: self }))
    }

    fn supports_active_level(&self) -> bool {
        true
    }

    fn active_level(&self) -> GpioActiveLevel {
        self.active_level
    }

    fn set_active_level(&mut self, level: GpioActiveLevel) -> GpioResult<()> {
        self.active_level = level;
        Ok(())
    }
}

impl Drop for SimPin<'_> {
    fn drop(&mut self) {
        self.driver.claims.release(&[self.pin_index]);
    }
}

struct SimOutput<'a> {
    pin: &'a SimPin<'a>,
}

impl Debug for SimOutput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[output]", self.pin)
    }
}

impl GpioOutput for SimOutput<'_> {
    fn write(&self, value: bool) -> GpioResult<()> {
        self.pin.driver.record(SimEvent::Write {
            pin: self.pin.pin_index,
            level: self.pin.active_level.get_state(value),
        });
        Ok(())
    }
}

struct SimBus<'a, const N: usize> {
    driver: &'a SimGpioDriver,
    pin_indices: [usize; N],
    active_level: GpioActiveLevel,
}

impl<const N: usize> Debug for SimBus<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}{:?}", self.driver, self.pin_indices)
    }
}

impl<const N: usize> GpioBus<N> for SimBus<'_, N> {
    fn as_output(&mut self) -> GpioResult<Box<dyn GpioBusOutput<N> + '_>> {
        for &pin in &self.pin_indices {
            self.driver.record(SimEvent::ConfigureOutput { pin });
        }
        Ok(Box::new(SimBusOutput { bus: self }))
    }

    fn supports_active_level(&self) -> bool {
        true
    }

    fn active_level(&self) -> GpioActiveLevel {
        self.active_level
    }

    fn set_active_level(&mut self, level: GpioActiveLevel) -> GpioResult<()> {
        self.active_level = level;
        Ok(())
    }
}

impl<const N: usize> Drop for SimBus<'_, N> {
    fn drop(&mut self) {
        self.driver.claims.release(&self.pin_indices);
    }
}

struct SimBusOutput<'a, const N: usize> {
    bus: &'a SimBus<'a, N>,
}

impl<const N: usize> Debug for SimBusOutput<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[output]", self.bus)
    }
}

impl<const N: usize> GpioBusOutput<N> for SimBusOutput<'_, N> {
    fn write(&self, values: &[bool; N]) -> GpioResult<()> {
        for (&pin, &value) in self.bus.pin_indices.iter().zip(values) {
            self.bus.driver.record(SimEvent::Write {
                pin,
                level: self.bus.active_level.get_state(value),
            });
        }
        Ok(())
    }
}

/// A [DelayNs] that records the requested duration into the simulated log instead of sleeping.
#[derive(Clone)]
pub struct SimDelay {
    log: EventLog,
}

impl Debug for SimDelay {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimDelay")
    }
}

impl SimDelay {
    fn record(&self, ns: u64) {
        self.log.borrow_mut().push(SimEvent::Delay { ns });
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.record(ns as u64);
    }

    fn delay_us(&mut self, us: u32) {
        self.record(us as u64 * 1_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.record(ms as u64 * 1_000_000);
    }
}
