//! HD44780 LCD module.
//!
//! [driver::HD44780Driver] is the controller's instruction set, [driver::GpioHD44780Driver] speaks it
//! over GPIO pins in either 4-bit or 8-bit mode, and [sim::Hd44780Model] plays the controller's part
//! against a recorded [crate::sim] log.
//!
//! # Sources
//!
//! - Hitachi, “HD44780U (LCD-II) Dot Matrix Liquid Crystal Display Controller/Driver,” ADE-207-272(Z), 1998.
pub mod driver;
pub mod sim;
