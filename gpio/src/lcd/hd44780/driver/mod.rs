//! The HD44780 instruction set.
//!
//! Every instruction is a single byte sent with RS low; the highest set bit selects the instruction
//! and the bits below it are its flags. Characters are bytes sent with RS high, written to DDRAM
//! (or CGRAM) at the address counter, which then moves in the entry-mode direction.

mod gpio;

use crate::lcd::LcdGeometry;
use crate::{GpioError, GpioResult};
pub use gpio::*;
use std::fmt::Debug;

pub const CMD_CLEAR_DISPLAY: u8 = 0b00000001;
pub const CMD_RETURN_HOME: u8 = 0b00000010;
pub const CMD_ENTRY_MODE: u8 = 0b00000100;
pub const CMD_DISPLAY_CONTROL: u8 = 0b00001000;
pub const CMD_CURSOR_SHIFT: u8 = 0b00010000;
pub const CMD_FUNCTION_SET: u8 = 0b00100000;
pub const CMD_SET_CGRAM_ADDRESS: u8 = 0b01000000;
pub const CMD_SET_DDRAM_ADDRESS: u8 = 0b10000000;

/// Whether the instruction needs the long execution time (clear display and return home).
pub fn is_slow_command(command: u8) -> bool {
    command & !0b11 == 0 && command != 0
}

pub trait HD44780Driver: Debug {
    /// Initializes the HD44780 controller by instruction, as described in the datasheet (figures 23
    /// and 24), so it starts in a known state even if the power supply didn't trigger the internal reset.
    fn init(&mut self) -> GpioResult<()>;

    /// The geometry of the connected display.
    fn geometry(&self) -> LcdGeometry;

    /// Clears the display and sets the cursor to the home position.
    fn clear_display(&mut self) -> GpioResult<()> {
        self.send_command(CMD_CLEAR_DISPLAY)
    }

    /// Sets the cursor to the home position and undoes any display shift.
    fn return_home(&mut self) -> GpioResult<()> {
        self.send_command(CMD_RETURN_HOME)
    }

    /// Sets the display to the specified entry mode.
    fn set_entry_mode(&mut self, cursor_direction: CursorDirection, shift: bool) -> GpioResult<()> {
        let mut command = CMD_ENTRY_MODE;
        if cursor_direction == CursorDirection::Right {
            command |= 0b00000010;
        }
        if shift {
            command |= 0b00000001;
        }
        self.send_command(command)
    }

    /// Sets the display on/off, cursor on/off, and blinking on/off.
    fn set_display_control(
        &mut self,
        display_on: bool,
        cursor_on: bool,
        blink_on: bool,
    ) -> GpioResult<()> {
        let mut command = CMD_DISPLAY_CONTROL;
        if display_on {
            command |= 0b00000100;
        }
        if cursor_on {
            command |= 0b00000010;
        }
        if blink_on {
            command |= 0b00000001;
        }
        self.send_command(command)
    }

    /// Moves the cursor or shifts the display, without writing anything.
    fn cursor_shift(&mut self, display_shift: bool, direction: CursorDirection) -> GpioResult<()> {
        let mut command = CMD_CURSOR_SHIFT;
        if display_shift {
            command |= 0b00001000;
        }
        if direction == CursorDirection::Right {
            command |= 0b00000100;
        }
        self.send_command(command)
    }

    /// Sets the interface data length (8-bit when `data_length` is set), the number of display
    /// lines and the font (5x10 when `font` is set, only usable with a single line).
    fn function_set(&mut self, data_length: bool, two_lines: bool, font: bool) -> GpioResult<()> {
        let mut command = CMD_FUNCTION_SET;
        if data_length {
            command |= 0b00010000;
        }
        if two_lines {
            command |= 0b00001000;
        }
        if font {
            command |= 0b00000100;
        }
        self.send_command(command)
    }

    /// Sets the CGRAM address. Following data writes go to the character generator.
    fn set_cgram_address(&mut self, address: u8) -> GpioResult<()> {
        if address > 0b00111111 {
            return Err(GpioError::InvalidArgument);
        }
        self.send_command(CMD_SET_CGRAM_ADDRESS | address)
    }

    /// Sets the DDRAM address. Following data writes go to the display.
    fn set_ddram_address(&mut self, address: u8) -> GpioResult<()> {
        if address > 0b01111111 {
            return Err(GpioError::InvalidArgument);
        }
        self.send_command(CMD_SET_DDRAM_ADDRESS | address)
    }

    /// Defines one of the 8 custom 5x8 characters, displayed afterwards with character codes `0..8`.
    ///
    /// Each row uses the 5 lowest bits, MSb on the left. The last row is usually left blank for the cursor.
    /// The address counter is left pointing at CGRAM, so the cursor is moved home afterwards.
    fn define_char(&mut self, slot: u8, rows: [u8; 8]) -> GpioResult<()> {
        if slot > 7 {
            return Err(GpioError::InvalidArgument);
        }
        self.set_cgram_address(slot << 3)?;
        for row in rows {
            self.send_data(row & 0b11111)?;
        }
        self.set_ddram_address(0)
    }

    // Low-level commands
    // These raw commands are used by the high-level functions above.
    // They are not meant to be used directly, but implemented by the driver implementation.

    /// Sends a command to the HD44780 controller and waits for it to execute.
    /// Sets the RS pin to 0 (command).
    fn send_command(&mut self, command: u8) -> GpioResult<()>;

    /// Sends data to the HD44780 controller and waits for it to be written.
    /// Sets the RS pin to 1 (data).
    fn send_data(&mut self, data: u8) -> GpioResult<()>;
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CursorDirection {
    /// Moves the cursor to the left after writing data.
    Left,
    /// Moves the cursor to the right after writing data.
    Right,
}
