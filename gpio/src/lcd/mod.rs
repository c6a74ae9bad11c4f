//! Character LCD drivers.
//!
//! [hd44780] holds the controller driver itself. This module holds what's common to any character
//! display built around it: the display geometry and the [CharacterLcd] operations used by
//! applications.
pub mod hd44780;

use crate::GpioResult;
use hd44780::driver::HD44780Driver;
use log::warn;

/// Number of visible rows and columns of a character display.
///
/// The controller always has 80 bytes of DDRAM split into two 40-byte lines at `0x00` and `0x40`.
/// Four-row modules fold each of those lines in half, so rows 2 and 3 continue rows 0 and 1
/// right after the last visible column.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LcdGeometry {
    pub columns: u8,
    pub rows: u8,
}

impl LcdGeometry {
    pub const LCD_8X2: LcdGeometry = LcdGeometry::new(8, 2);
    pub const LCD_16X2: LcdGeometry = LcdGeometry::new(16, 2);
    pub const LCD_16X4: LcdGeometry = LcdGeometry::new(16, 4);
    pub const LCD_20X2: LcdGeometry = LcdGeometry::new(20, 2);
    pub const LCD_20X4: LcdGeometry = LcdGeometry::new(20, 4);
    pub const LCD_40X2: LcdGeometry = LcdGeometry::new(40, 2);

    pub const fn new(columns: u8, rows: u8) -> Self {
        LcdGeometry { columns, rows }
    }

    /// DDRAM address of the first cell of each row.
    ///
    /// Like [address](Self::address), this doesn't validate: offsets past `0xFF` wrap around.
    pub const fn row_offsets(&self) -> [u8; 4] {
        [0x00, 0x40, self.columns, self.columns.wrapping_add(0x40)]
    }

    /// DDRAM address of the given cell.
    ///
    /// Nothing is validated: rows wrap around the 4-entry offset table, and the result is
    /// truncated to the 7 address bits the controller has.
    pub fn address(&self, row: usize, column: usize) -> u8 {
        let offsets = self.row_offsets();
        let base = offsets[row % offsets.len()] as usize;
        (base.wrapping_add(column) & 0x7F) as u8
    }

    /// Whether the display needs the controller's two-line mode.
    pub fn is_multiline(&self) -> bool {
        self.rows > 1
    }
}

impl Default for LcdGeometry {
    fn default() -> Self {
        Self::LCD_16X2
    }
}

/// The operations an application uses to put text on a character display.
///
/// Implemented for every [HD44780Driver]. None of these check the text or the position against the
/// geometry: writing past the end of a row continues wherever the controller's address counter goes.
pub trait CharacterLcd {
    /// Runs the power-on initialization sequence. Has to be called once, before anything else.
    ///
    /// Leaves the display on, blank, with the cursor at home.
    fn initialize(&mut self) -> GpioResult<()>;

    /// Writes the text starting at the current cursor position.
    ///
    /// Characters outside ASCII can't be mapped to the controller's ROM and are shown as `?`.
    fn display_string(&mut self, text: &str) -> GpioResult<()>;

    /// Moves the cursor to the given cell with a single set-DDRAM-address command.
    fn move_cursor(&mut self, row: usize, column: usize) -> GpioResult<()>;

    /// Blanks every cell and moves the cursor home.
    fn clear_screen(&mut self) -> GpioResult<()>;
}

impl<T: ?Sized + HD44780Driver> CharacterLcd for T {
    fn initialize(&mut self) -> GpioResult<()> {
        self.init()
    }

    fn display_string(&mut self, text: &str) -> GpioResult<()> {
        for c in text.chars() {
            if c.is_ascii() {
                self.send_data(c as u8)?;
            } else {
                warn!("Non-ASCII character: {}", c);
                self.send_data(b'?')?
            }
        }
        Ok(())
    }

    fn move_cursor(&mut self, row: usize, column: usize) -> GpioResult<()> {
        let address = self.geometry().address(row, column);
        self.set_ddram_address(address)
    }

    fn clear_screen(&mut self) -> GpioResult<()> {
        self.clear_display()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_offsets_follow_the_controller_layout() {
        assert_eq!(&LcdGeometry::LCD_16X2.row_offsets()[..2], &[0x00, 0x40]);
        assert_eq!(LcdGeometry::LCD_16X4.row_offsets(), [0x00, 0x40, 0x10, 0x50]);
        assert_eq!(LcdGeometry::LCD_20X4.row_offsets(), [0x00, 0x40, 0x14, 0x54]);
    }

    #[test]
    fn address_adds_column_to_row_base() {
        let geometry = LcdGeometry::LCD_20X4;
        assert_eq!(geometry.address(0, 0), 0x00);
        assert_eq!(geometry.address(1, 5), 0x45);
        assert_eq!(geometry.address(3, 19), 0x67);
    }

    #[test]
    fn address_does_not_validate() {
        let geometry = LcdGeometry::LCD_16X2;
        // Row 4 wraps to row 0; column 200 runs off the end of the address space.
        assert_eq!(geometry.address(4, 1), 0x01);
        assert_eq!(geometry.address(1, 200), ((0x40 + 200) & 0x7F) as u8);
    }

    #[test]
    fn oversized_geometry_wraps_instead_of_overflowing() {
        let geometry = LcdGeometry::new(200, 4);
        assert_eq!(geometry.row_offsets(), [0x00, 0x40, 200, 8]);
        assert_eq!(geometry.address(0, 0), 0x00);
        assert_eq!(geometry.address(3, 1), 0x09);
    }
}
