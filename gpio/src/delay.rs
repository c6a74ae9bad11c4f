//! Blocking delays for drivers running on a hosted OS.
//!
//! Drivers take any [DelayNs] implementation, so the same code runs with [StdDelay] on a Raspberry Pi
//! and with [crate::sim::SimDelay] in tests.
pub use embedded_hal::delay::DelayNs;
use std::thread::sleep;
use std::time::Duration;

/// A [DelayNs] backed by [std::thread::sleep].
///
/// The OS may oversleep, never undersleep, which is fine for LCD timings since they're all minimums.
#[derive(Debug, Default, Copy, Clone)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        sleep(Duration::from_nanos(ns as u64));
    }

    fn delay_us(&mut self, us: u32) {
        sleep(Duration::from_micros(us as u64));
    }

    fn delay_ms(&mut self, ms: u32) {
        sleep(Duration::from_millis(ms as u64));
    }
}
