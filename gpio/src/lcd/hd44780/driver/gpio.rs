use crate::delay::DelayNs;
use crate::lcd::LcdGeometry;
use crate::lcd::hd44780::driver::{CursorDirection, HD44780Driver, is_slow_command};
use crate::{GpioBusOutput, GpioOutput, GpioResult};
use log::{debug, trace};
use std::fmt::Debug;

/// Minimum waits of the controller. All of them are lower bounds; waiting longer only costs time.
///
/// The defaults follow the HD44780U datasheet at 270 kHz with some margin, which also covers most
/// clones running slightly slower.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LcdTiming {
    /// Wait after power-up before the first instruction. The datasheet asks for at least 15 ms
    /// after VCC reaches 4.5 V, or 40 ms after it reaches 2.7 V.
    pub power_on_ms: u32,
    /// How long E is held high, and then low, around each latch (min. 450 ns high, 1 µs cycle).
    pub enable_pulse_ns: u32,
    /// Execution time of every instruction and data write but clear and home (min. 37 µs).
    pub command_us: u32,
    /// Execution time of clear display and return home (min. 1.52 ms).
    pub clear_us: u32,
}

impl LcdTiming {
    /// Wait after the first function set of the init sequence (min. 4.1 ms).
    pub const INIT_FIRST_WAIT_US: u32 = 4_500;
    /// Wait after the second function set of the init sequence (min. 100 µs).
    pub const INIT_SECOND_WAIT_US: u32 = 150;
}

impl Default for LcdTiming {
    fn default() -> Self {
        LcdTiming {
            power_on_ms: 50,
            enable_pulse_ns: 1_000,
            command_us: 50,
            clear_us: 2_000,
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub enum GpioHD44780Bus<'a> {
    Bus8Bit(&'a dyn GpioBusOutput<8>),
    Bus4Bit(&'a dyn GpioBusOutput<4>),
}

impl GpioHD44780Bus<'_> {
    pub fn is_8bit(&self) -> bool {
        matches!(self, GpioHD44780Bus::Bus8Bit(_))
    }

    pub fn is_4bit(&self) -> bool {
        matches!(self, GpioHD44780Bus::Bus4Bit(_))
    }
}

/// HD44780 driver bit-banging the parallel interface over GPIO pins.
///
/// The driver never reads from the display: if an RW pin is given, it's held low, otherwise RW has
/// to be wired to GND. Every write waits the worst-case execution time instead of polling the busy flag.
#[derive(Debug)]
pub struct GpioHD44780Driver<'a, D: DelayNs> {
    pin_e: &'a dyn GpioOutput,
    pin_rw: Option<&'a dyn GpioOutput>,
    pin_rs: &'a dyn GpioOutput,
    data_bus: GpioHD44780Bus<'a>,
    geometry: LcdGeometry,
    timing: LcdTiming,
    delay: D,
}

impl<'a, D: DelayNs> GpioHD44780Driver<'a, D> {
    /// Creates a driver using the upper four data lines (D4–D7) of the display.
    ///
    /// The bus pins have to be ordered D4 first. Defaults to a 16x2 display and datasheet timings.
    pub fn new_4bit(
        pin_e: &'a dyn GpioOutput,
        pin_rw: Option<&'a dyn GpioOutput>,
        pin_rs: &'a dyn GpioOutput,
        data_bus: &'a dyn GpioBusOutput<4>,
        delay: D,
    ) -> Self {
        Self::new(pin_e, pin_rw, pin_rs, GpioHD44780Bus::Bus4Bit(data_bus), delay)
    }

    /// Creates a driver using all eight data lines, D0 first.
    pub fn new_8bit(
        pin_e: &'a dyn GpioOutput,
        pin_rw: Option<&'a dyn GpioOutput>,
        pin_rs: &'a dyn GpioOutput,
        data_bus: &'a dyn GpioBusOutput<8>,
        delay: D,
    ) -> Self {
        Self::new(pin_e, pin_rw, pin_rs, GpioHD44780Bus::Bus8Bit(data_bus), delay)
    }

    fn new(
        pin_e: &'a dyn GpioOutput,
        pin_rw: Option<&'a dyn GpioOutput>,
        pin_rs: &'a dyn GpioOutput,
        data_bus: GpioHD44780Bus<'a>,
        delay: D,
    ) -> Self {
        GpioHD44780Driver {
            pin_e,
            pin_rw,
            pin_rs,
            data_bus,
            geometry: LcdGeometry::default(),
            timing: LcdTiming::default(),
            delay,
        }
    }

    pub fn with_geometry(mut self, geometry: LcdGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_timing(mut self, timing: LcdTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn timing(&self) -> LcdTiming {
        self.timing
    }

    fn pulse_e(&mut self) -> GpioResult<()> {
        self.pin_e.write(true)?;
        self.delay.delay_ns(self.timing.enable_pulse_ns);
        self.pin_e.write(false)?;
        self.delay.delay_ns(self.timing.enable_pulse_ns);
        Ok(())
    }

    fn select_register(&mut self, rs: bool) -> GpioResult<()> {
        self.pin_rs.write(rs)?;
        if let Some(rw) = self.pin_rw {
            rw.write(false)?;
        }
        Ok(())
    }

    /// Latches a whole byte: one pulse on an 8-bit bus, high nibble then low nibble on a 4-bit bus.
    fn send(&mut self, data: u8, rs: bool) -> GpioResult<()> {
        trace!("Sending data: {:08b}, RS: {}", data, rs);

        self.select_register(rs)?;

        match self.data_bus {
            GpioHD44780Bus::Bus8Bit(bus) => {
                bus.write_byte(data)?;
                self.pulse_e()?;
            }
            GpioHD44780Bus::Bus4Bit(bus) => {
                let high_nibble = (data >> 4) & 0x0F;
                let low_nibble = data & 0x0F;
                trace!("Writing HN: {:04b}", high_nibble);
                bus.write_nibble(high_nibble)?;
                self.pulse_e()?;
                trace!("Writing LN: {:04b}", low_nibble);
                bus.write_nibble(low_nibble)?;
                self.pulse_e()?;
            }
        }

        Ok(())
    }

    /// Latches a function set while the controller may still be in 8-bit mode. On a 4-bit bus only
    /// the high nibble is wired, so only that is sent, in a single pulse.
    fn send_interface(&mut self, command: u8) -> GpioResult<()> {
        trace!("Sending init: {:08b}", command);

        self.select_register(false)?;

        match self.data_bus {
            GpioHD44780Bus::Bus8Bit(bus) => bus.write_byte(command)?,
            GpioHD44780Bus::Bus4Bit(bus) => bus.write_nibble(command >> 4)?,
        }
        self.pulse_e()
    }
}

impl<D: DelayNs + Debug> HD44780Driver for GpioHD44780Driver<'_, D> {
    fn init(&mut self) -> GpioResult<()> {
        debug!(
            "Initializing {}x{} display on a {}-bit bus",
            self.geometry.columns,
            self.geometry.rows,
            if self.data_bus.is_8bit() { 8 } else { 4 }
        );

        self.pin_e.write(false)?;
        self.select_register(false)?;
        self.delay.delay_ms(self.timing.power_on_ms);

        // Synchronize: three 8-bit function sets get the controller into 8-bit mode from any state,
        // including halfway through a 4-bit byte.
        self.send_interface(0b00110000)?;
        self.delay.delay_us(LcdTiming::INIT_FIRST_WAIT_US);
        self.send_interface(0b00110000)?;
        self.delay.delay_us(LcdTiming::INIT_SECOND_WAIT_US);
        self.send_interface(0b00110000)?;
        self.delay.delay_us(self.timing.command_us);

        if self.data_bus.is_4bit() {
            self.send_interface(0b00100000)?;
            self.delay.delay_us(self.timing.command_us);
        }

        self.function_set(self.data_bus.is_8bit(), self.geometry.is_multiline(), false)?;
        self.set_display_control(true, false, false)?;
        self.clear_display()?;
        self.set_entry_mode(CursorDirection::Right, false)?;

        debug!("Display initialized");
        Ok(())
    }

    fn geometry(&self) -> LcdGeometry {
        self.geometry
    }

    fn send_command(&mut self, command: u8) -> GpioResult<()> {
        self.send(command, false)?;
        let wait = if is_slow_command(command) {
            self.timing.clear_us
        } else {
            self.timing.command_us
        };
        self.delay.delay_us(wait);
        Ok(())
    }

    fn send_data(&mut self, data: u8) -> GpioResult<()> {
        self.send(data, true)?;
        self.delay.delay_us(self.timing.command_us);
        Ok(())
    }
}
