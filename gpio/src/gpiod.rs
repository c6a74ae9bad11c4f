//! GPIO backend using the Linux GPIO character device (`/dev/gpiochipN`) through the gpiod library.
//!
//! Every claim, a single pin or a whole bus, turns into one line request when it's configured as
//! an output. A bus is then written with one `set_values` call, so all of its lines change at
//! the same moment; the register backend sets them one by one.
use crate::claims::PinClaims;
use crate::{
    GpioActiveLevel, GpioBus, GpioBusOutput, GpioDriver, GpioError, GpioOutput, GpioPin,
    GpioResult,
};
use gpiod::{Active, Chip, LineId, Lines, Options, Output, MAX_VALUES};
use log::debug;
use std::fmt::{Debug, Formatter};
use std::path::Path;

impl From<GpioActiveLevel> for Active {
    fn from(level: GpioActiveLevel) -> Self {
        match level {
            GpioActiveLevel::High => Active::High,
            GpioActiveLevel::Low => Active::Low,
        }
    }
}

/// The parameters of one `request_lines` call.
#[derive(Clone, Debug, Eq, PartialEq)]
struct OutputRequest {
    lines: Vec<LineId>,
    active: Active,
}

impl OutputRequest {
    /// # Errors
    /// `GpioError::InvalidArgument` if there are no lines, or more than the kernel takes in one
    /// request.
    fn new(indices: &[usize], active_level: GpioActiveLevel) -> GpioResult<Self> {
        if indices.is_empty() || indices.len() > MAX_VALUES {
            return Err(GpioError::InvalidArgument);
        }

        let lines = indices
            .iter()
            .map(|&index| LineId::try_from(index).map_err(|_| GpioError::InvalidArgument))
            .collect::<GpioResult<_>>()?;

        Ok(OutputRequest {
            lines,
            active: active_level.into(),
        })
    }

    /// Lines start out inactive.
    fn options(&self) -> Options<Output, &[LineId], &'static str> {
        Options::output(self.lines.as_slice())
            .consumer(env!("CARGO_PKG_NAME"))
            .active(self.active)
            .values(vec![false; self.lines.len()])
    }
}

pub struct GpiodDriver {
    chip: Chip,
    claims: PinClaims,
}

impl GpiodDriver {
    pub fn new(chip: Chip) -> Self {
        let claims = PinClaims::new(chip.num_lines() as usize);
        GpiodDriver { chip, claims }
    }

    /// Opens the chip at the given path, e.g. `/dev/gpiochip0`.
    pub fn open(path: impl AsRef<Path>) -> GpioResult<Self> {
        Ok(Self::new(Chip::new(path.as_ref())?))
    }

    fn claim<const N: usize>(&self, indices: [usize; N]) -> GpioResult<GpiodClaim<'_, N>> {
        self.claims.claim(&indices)?;
        Ok(GpiodClaim {
            driver: self,
            indices,
            active_level: GpioActiveLevel::High,
        })
    }
}

impl Debug for GpiodDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpiodDriver({})", self.chip.name())
    }
}

impl GpioDriver for GpiodDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(self.chip.num_lines() as usize)
    }

    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>> {
        Ok(Box::new(self.claim([index])?))
    }

    fn get_pin_bus<const N: usize>(
        &self,
        indices: [usize; N],
    ) -> GpioResult<Box<dyn GpioBus<N> + '_>> {
        Ok(Box::new(self.claim(indices)?))
    }
}

/// Claimed lines, not yet requested from the kernel. A pin is a claim of one line.
struct GpiodClaim<'a, const N: usize> {
    driver: &'a GpiodDriver,
    indices: [usize; N],
    active_level: GpioActiveLevel,
}

impl<const N: usize> GpiodClaim<'_, N> {
    fn request(&self) -> GpioResult<GpiodLines<'_, N>> {
        let request = OutputRequest::new(&self.indices, self.active_level)?;
        let lines = self.driver.chip.request_lines(request.options())?;
        debug!("{:?} requested as output", self);
        Ok(GpiodLines { claim: self, lines })
    }
}

impl<const N: usize> Debug for GpiodClaim<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}{:?}", self.driver, self.indices)
    }
}

impl<const N: usize> Drop for GpiodClaim<'_, N> {
    fn drop(&mut self) {
        self.driver.claims.release(&self.indices);
    }
}

impl GpioPin for GpiodClaim<'_, 1> {
    fn as_output(&mut self) -> GpioResult<Box<dyn GpioOutput + '_>> {
        Ok(Box::new(self.request()?))
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

impl<const N: usize> GpioBus<N> for GpiodClaim<'_, N> {
    fn as_output(&mut self) -> GpioResult<Box<dyn GpioBusOutput<N> + '_>> {
        Ok(Box::new(self.request()?))
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

/// Lines requested as outputs. The kernel releases them when this is dropped.
struct GpiodLines<'a, const N: usize> {
    claim: &'a GpiodClaim<'a, N>,
    lines: Lines<Output>,
}

impl<const N: usize> Debug for GpiodLines<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[output]", self.claim)
    }
}

impl GpioOutput for GpiodLines<'_, 1> {
    fn write(&self, value: bool) -> GpioResult<()> {
        self.lines.set_values([value])?;
        Ok(())
    }
}

impl<const N: usize> GpioBusOutput<N> for GpiodLines<'_, N> {
    fn write(&self, values: &[bool; N]) -> GpioResult<()> {
        self.lines.set_values(*values)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_keeps_the_bus_order() {
        let request = OutputRequest::new(&[26, 16, 20, 21], GpioActiveLevel::High).unwrap();
        assert_eq!(request.lines, vec![26, 16, 20, 21]);
        assert_eq!(request.active, Active::High);
    }

    #[test]
    fn request_carries_the_active_level() {
        let request = OutputRequest::new(&[4], GpioActiveLevel::Low).unwrap();
        assert_eq!(request.active, Active::Low);
    }

    #[test]
    fn request_size_is_bounded() {
        assert_eq!(
            OutputRequest::new(&[], GpioActiveLevel::High),
            Err(GpioError::InvalidArgument)
        );
        let too_many: Vec<usize> = (0..=MAX_VALUES).collect();
        assert_eq!(
            OutputRequest::new(&too_many, GpioActiveLevel::High),
            Err(GpioError::InvalidArgument)
        );
    }

    #[test]
    fn line_ids_must_fit() {
        assert_eq!(
            OutputRequest::new(&[usize::MAX], GpioActiveLevel::High),
            Err(GpioError::InvalidArgument)
        );
    }
}
