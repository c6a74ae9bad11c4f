//! Memory-mapped GPIO backend for BCM283x-based Raspberry Pi boards.
//!
//! Registers are accessed directly through `/dev/gpiomem` (no root required, the file already
//! starts at the GPIO block) or `/dev/mem` (root, the GPIO block has to be located by offset).
use crate::claims::PinClaims;
use crate::{
    GpioActiveLevel, GpioBus, GpioBusOutput, GpioDriver, GpioError, GpioOutput, GpioPin,
    GpioResult,
};
use log::trace;
use memmap2::{MmapOptions, MmapRaw};
use std::fmt::{Debug, Formatter};
use std::fs::OpenOptions;

/// Values of the 3-bit function select field in the GPFSELn registers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
enum PinFunction {
    Input = 0b000,
    Output = 0b001,
}

pub struct RawGpioDriver {
    mmap: MmapRaw,
    claims: PinClaims,
}

impl RawGpioDriver {
    // Peripheral base of the BCM2836/7; the BCM2835 has it at 0x20200000 and the BCM2711 at 0xFE200000.
    const GPIO_BASE: u64 = 0x3F200000;
    const BLOCK_LEN: usize = 4096;

    const PIN_COUNT: usize = 54;

    // Register offsets, in bytes from the start of the GPIO block.
    const GPFSEL0: usize = 0x00;
    const GPSET0: usize = 0x1C;
    const GPCLR0: usize = 0x28;

    fn create(path: &str, offset: u64) -> GpioResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        let mmap = MmapOptions::new()
            .offset(offset)
            .len(Self::BLOCK_LEN)
            .map_raw(&file)?;

        Ok(RawGpioDriver {
            mmap,
            claims: PinClaims::new(Self::PIN_COUNT),
        })
    }

    pub fn new_gpiomem() -> GpioResult<Self> {
        Self::create("/dev/gpiomem", 0)
    }

    pub fn new_mem() -> GpioResult<Self> {
        Self::create("/dev/mem", Self::GPIO_BASE)
    }

    fn register(&self, byte_offset: usize) -> *mut u32 {
        let base = self.mmap.as_mut_ptr() as *mut u32;
        // SAFETY: every offset passed in stays inside the mapped 4 KiB block.
        unsafe { base.add(byte_offset / 4) }
    }

    fn set_function(&self, pin_index: usize, function: PinFunction) -> GpioResult<()> {
        if pin_index >= Self::PIN_COUNT {
            return Err(GpioError::InvalidArgument);
        }

        let register_ptr = self.register(Self::GPFSEL0 + (pin_index / 10) * 4);
        let shift = (pin_index % 10) * 3;

        // SAFETY: aligned, mapped device register.
        let mut register_value = unsafe { register_ptr.read_volatile() };
        register_value &= !(0b111 << shift);
        register_value |= (function as u32) << shift;
        unsafe { register_ptr.write_volatile(register_value) };

        trace!("GPFSEL: pin {} -> {:?}", pin_index, function);

        Ok(())
    }

    fn set_level(&self, pin_index: usize, high: bool) -> GpioResult<()> {
        if pin_index >= Self::PIN_COUNT {
            return Err(GpioError::InvalidArgument);
        }

        // Writing a 1 to GPSETn/GPCLRn only affects that pin, so no read-modify-write is needed.
        let bank = if high { Self::GPSET0 } else { Self::GPCLR0 };
        let register_ptr = self.register(bank + (pin_index / 32) * 4);

        // SAFETY: aligned, mapped device register.
        unsafe { register_ptr.write_volatile(1 << (pin_index % 32)) };

        Ok(())
    }

    fn reset(&self, pin_index: usize) -> GpioResult<()> {
        self.set_function(pin_index, PinFunction::Input)?;
        self.set_level(pin_index, false)?;
        Ok(())
    }

    /// Claims the pins and resets them to low inputs. On error, none of them stays claimed.
    fn claim(&self, indices: &[usize]) -> GpioResult<()> {
        self.claims.claim(indices)?;

        for &index in indices {
            if let Err(err) = self.reset(index) {
                self.release(indices);
                return Err(err);
            }
        }
        Ok(())
    }

    fn release(&self, indices: &[usize]) {
        for &index in indices {
            _ = self.set_function(index, PinFunction::Input);
        }
        self.claims.release(indices);
    }
}

impl Debug for RawGpioDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawGpioDriver({:?})", self.mmap.as_ptr().addr())
    }
}

impl GpioDriver for RawGpioDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(Self::PIN_COUNT)
    }

    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>> {
        self.claim(&[index])?;

        Ok(Box::new(RawGpioPin {
            driver: self,
            pin_index: index,
            active_level: GpioActiveLevel::High,
        }))
    }

    fn get_pin_bus<const N: usize>(
        &self,
        indices: [usize; N],
    ) -> GpioResult<Box<dyn GpioBus<N> + '_>> {
        self.claim(&indices)?;

        Ok(Box::new(RawGpioBus {
            driver: self,
            pin_indices: indices,
            active_level: GpioActiveLevel::High,
        }))
    }
}

struct RawGpioPin<'a> {
    driver: &'a RawGpioDriver,
    pin_index: usize,
    active_level: GpioActiveLevel,
}

impl Debug for RawGpioPin<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}]", self.driver, self.pin_index)
    }
}

impl GpioPin for RawGpioPin<'_> {
    fn as_output(&mut self) -> GpioResult<Box<dyn GpioOutput + '_>> {
        self.driver
            .set_function(self.pin_index, PinFunction::Output)?;
        Ok(Box::new(RawGpioOutput { pin: self }))
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

impl Drop for RawGpioPin<'_> {
    fn drop(&mut self) {
        self.driver.release(&[self.pin_index]);
    }
}

struct RawGpioOutput<'a> {
    pin: &'a RawGpioPin<'a>,
}

impl Debug for RawGpioOutput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[output]", self.pin)
    }
}

impl GpioOutput for RawGpioOutput<'_> {
    fn write(&self, value: bool) -> GpioResult<()> {
        self.pin
            .driver
            .set_level(self.pin.pin_index, self.pin.active_level.get_state(value))
    }
}

struct RawGpioBus<'a, const N: usize> {
    driver: &'a RawGpioDriver,
    pin_indices: [usize; N],
    active_level: GpioActiveLevel,
}

impl<const N: usize> Debug for RawGpioBus<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}{:?}", self.driver, self.pin_indices)
    }
}

impl<const N: usize> GpioBus<N> for RawGpioBus<'_, N> {
    fn as_output(&mut self) -> GpioResult<Box<dyn GpioBusOutput<N> + '_>> {
        for &pin_index in &self.pin_indices {
            self.driver.set_function(pin_index, PinFunction::Output)?;
        }
        Ok(Box::new(RawGpioBusOutput { bus: self }))
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

impl<const N: usize> Drop for RawGpioBus<'_, N> {
    fn drop(&mut self) {
        self.driver.release(&self.pin_indices);
    }
}

struct RawGpioBusOutput<'a, const N: usize> {
    bus: &'a RawGpioBus<'a, N>,
}

impl<const N: usize> Debug for RawGpioBusOutput<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[output]", self.bus)
    }
}

impl<const N: usize> GpioBusOutput<N> for RawGpioBusOutput<'_, N> {
    fn write(&self, values: &[bool; N]) -> GpioResult<()> {
        for (&pin_index, &value) in self.bus.pin_indices.iter().zip(values) {
            self.bus
                .driver
                .set_level(pin_index, self.bus.active_level.get_state(value))?;
        }
        Ok(())
    }
}
