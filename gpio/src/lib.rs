//! GPIO abstraction and HD44780 character LCD driver.
//!
//! The crate root defines the pin-level traits every backend implements ([GpioDriver], [GpioPin],
//! [GpioOutput], [GpioBus] and [GpioBusOutput]). Backends live in [raw] (memory-mapped registers),
//! [gpiod] (Linux character device) and [sim] (recording test double). The display driver in
//! [lcd::hd44780] only ever sees the traits.
mod claims;
pub mod delay;
pub mod gpiod;
pub mod lcd;
pub mod raw;
pub mod sim;
pub mod soft;

use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GpioError {
    #[error("pin already in use")]
    AlreadyInUse,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("the feature is not supported on this backend")]
    NotSupported,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
    #[error("error: {0}")]
    Other(String),
}

impl From<std::io::Error> for GpioError {
    fn from(err: std::io::Error) -> Self {
        GpioError::Io(err.kind())
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

pub trait GpioDriver: Debug {
    /// Gets the amount of GPIO pins available.
    fn count(&self) -> GpioResult<usize>;

    /// Claims the GPIO pin at the given index.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if the index is out of range.
    /// - `GpioError::AlreadyInUse` if the pin is already claimed. It's released when the returned pin is dropped.
    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>>;

    /// Claims the GPIO pins at the given indices as a single bus. The first index is the least
    /// significant bit.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if an index is out of range or appears more than once.
    /// - `GpioError::AlreadyInUse` if any of the pins is already claimed.
    ///
    /// On error, no pin is left claimed.
    fn get_pin_bus<const N: usize>(
        &self,
        indices: [usize; N],
    ) -> GpioResult<Box<dyn GpioBus<N> + '_>>;
}

/// Specifies the active level of the GPIO pin.
///
/// By default, the active level is high.
///
/// Might be software-implemented.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioActiveLevel {
    #[default]
    High,
    Low,
}

impl GpioActiveLevel {
    /// Gets the real state that will be outputted on the GPIO pin based on the active level and the value.
    pub fn get_state(&self, value: bool) -> bool {
        match self {
            GpioActiveLevel::High => value,
            GpioActiveLevel::Low => !value,
        }
    }
}

pub trait GpioPin: Debug {
    /// Sets the GPIO pin function to output, allowing writing its state.
    ///
    /// Configuring an already configured pin is allowed and has no further effect.
    fn as_output(&mut self) -> GpioResult<Box<dyn GpioOutput + '_>>;

    /// Gets whether the GPIO pin supports active level.
    fn supports_active_level(&self) -> bool {
        false
    }
    /// Gets the active level of the GPIO pin.
    fn active_level(&self) -> GpioActiveLevel {
        GpioActiveLevel::High
    }
    /// Sets the active level of the GPIO pin.
    ///
    /// # Errors
    /// - `GpioError::NotSupported` if the pin does not support active level.
    fn set_active_level(&mut self, _level: GpioActiveLevel) -> GpioResult<()> {
        Err(GpioError::NotSupported)
    }
    fn with_active_level(mut self, level: GpioActiveLevel) -> GpioResult<Self>
    where
        Self: Sized,
    {
        self.set_active_level(level)?;
        Ok(self)
    }
}

pub trait GpioOutput: Debug {
    /// Writes the state of the GPIO pin. The level is applied before this returns.
    fn write(&self, value: bool) -> GpioResult<()>;
}

pub trait GpioBus<const N: usize>: Debug {
    fn as_output(&mut self) -> GpioResult<Box<dyn GpioBusOutput<N> + '_>>;

    fn supports_active_level(&self) -> bool {
        false
    }
    fn active_level(&self) -> GpioActiveLevel {
        GpioActiveLevel::High
    }
    fn set_active_level(&mut self, _level: GpioActiveLevel) -> GpioResult<()> {
        Err(GpioError::NotSupported)
    }
}

pub trait GpioBusOutput<const N: usize>: Debug {
    fn write(&self, values: &[bool; N]) -> GpioResult<()>;
}

/// Splits `value` into `N` pin levels, LSb first.
pub(crate) fn bits_lsb_first<const N: usize>(value: u8) -> [bool; N] {
    let mut values = [false; N];
    for (i, bit) in values.iter_mut().enumerate() {
        *bit = (value >> i) & 1 != 0;
    }
    values
}

impl dyn GpioBusOutput<8> + '_ {
    /// Writes the values to the GPIO pins in the bus.
    /// The values are written as a byte, LSb first.
    pub fn write_byte(&self, value: u8) -> GpioResult<()> {
        self.write(&bits_lsb_first(value))
    }
}

impl dyn GpioBusOutput<4> + '_ {
    /// Writes the values to the GPIO pins in the bus.
    /// The values are written as a nibble, LSb first.
    pub fn write_nibble(&self, value: u8) -> GpioResult<()> {
        if value > 0b1111 {
            return Err(GpioError::InvalidArgument);
        }

        self.write(&bits_lsb_first(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Debug, Default)]
    struct LatchBus<const N: usize> {
        last: RefCell<Option<[bool; N]>>,
    }

    impl<const N: usize> GpioBusOutput<N> for LatchBus<N> {
        fn write(&self, values: &[bool; N]) -> GpioResult<()> {
            *self.last.borrow_mut() = Some(*values);
            Ok(())
        }
    }

    #[test]
    fn nibble_is_written_lsb_first() {
        let bus = LatchBus::<4>::default();
        let output: &dyn GpioBusOutput<4> = &bus;
        output.write_nibble(0b0110).unwrap();
        assert_eq!(*bus.last.borrow(), Some([false, true, true, false]));
    }

    #[test]
    fn nibble_rejects_wide_values() {
        let bus = LatchBus::<4>::default();
        let output: &dyn GpioBusOutput<4> = &bus;
        assert_eq!(output.write_nibble(0x10), Err(GpioError::InvalidArgument));
        assert_eq!(*bus.last.borrow(), None);
    }

    #[test]
    fn byte_is_written_lsb_first() {
        let bus = LatchBus::<8>::default();
        let output: &dyn GpioBusOutput<8> = &bus;
        output.write_byte(b'A').unwrap();
        assert_eq!(
            *bus.last.borrow(),
            Some([true, false, false, false, false, false, true, false])
        );
    }

    #[test]
    fn active_low_inverts() {
        assert!(GpioActiveLevel::Low.get_state(false));
        assert!(!GpioActiveLevel::Low.get_state(true));
        assert!(GpioActiveLevel::High.get_state(true));
    }
}
