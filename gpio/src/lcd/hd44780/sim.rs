//! A model of the HD44780 controller, driven by a [SimEvent] log.
//!
//! The model only sees what a real controller would: pin levels at the falling edge of E. From
//! those it rebuilds the instruction stream, including the switch from the 8-bit power-on
//! interface to 4-bit mode, and keeps its own DDRAM, CGRAM and address counter.
use crate::lcd::LcdGeometry;
use crate::sim::SimEvent;
use std::collections::HashMap;

/// Which simulated pins the display is connected to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LcdWiring {
    pub e: usize,
    pub rs: usize,
    pub rw: Option<usize>,
    /// D0–D7 for an 8-bit bus, D4–D7 for a 4-bit bus, LSb first.
    pub data: Vec<usize>,
}

impl LcdWiring {
    pub fn is_4bit(&self) -> bool {
        self.data.len() == 4
    }
}

/// One falling edge of E: what the controller latched and how long the host waited afterwards,
/// up to the rising edge of the next enable pulse.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Latch {
    pub rs: bool,
    /// The value on the wired data lines; a nibble on a 4-bit bus.
    pub value: u8,
    pub wait_after_ns: u64,
}

/// Extracts every latch from the log, in order.
///
/// Also returns how long the host waited before the first enable pulse. Time spent with E high
/// belongs to the pulse itself and isn't counted as a wait. Latches with RW high would be reads
/// and are skipped.
pub fn decode_latches(events: &[SimEvent], wiring: &LcdWiring) -> (u64, Vec<Latch>) {
    let mut levels: HashMap<usize, bool> = HashMap::new();
    let mut leading_wait_ns = 0;
    let mut latches: Vec<Latch> = Vec::new();

    for event in events {
        match *event {
            SimEvent::ConfigureOutput { .. } => {}
            SimEvent::Delay { .. } if levels.get(&wiring.e).copied().unwrap_or(false) => {}
            SimEvent::Delay { ns } => match latches.last_mut() {
                Some(latch) => latch.wait_after_ns += ns,
                None => leading_wait_ns += ns,
            },
            SimEvent::Write { pin, level } => {
                let previous = levels.insert(pin, level).unwrap_or(false);
                if pin != wiring.e || !previous || level {
                    continue;
                }

                let level_of = |pin: usize| levels.get(&pin).copied().unwrap_or(false);
                if wiring.rw.is_some_and(|rw| level_of(rw)) {
                    continue;
                }

                let value = wiring
                    .data
                    .iter()
                    .enumerate()
                    .filter(|&(_, &pin)| level_of(pin))
                    .fold(0u8, |value, (bit, _)| value | (1 << bit));

                latches.push(Latch {
                    rs: level_of(wiring.rs),
                    value,
                    wait_after_ns: 0,
                });
            }
        }
    }

    (leading_wait_ns, latches)
}

/// An instruction or data byte as the controller executed it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Transaction {
    pub rs: bool,
    pub byte: u8,
    /// Whether it arrived as two nibbles.
    pub split: bool,
    /// Wait after the last latch of the byte.
    pub wait_after_ns: u64,
}

#[derive(Clone, Debug)]
pub struct Hd44780Model {
    wiring: LcdWiring,
    eight_bit: bool,
    pending_nibble: Option<u8>,
    two_lines: bool,
    display_on: bool,
    cursor_on: bool,
    blink_on: bool,
    increment: bool,
    ddram: [u8; 128],
    cgram: [u8; 64],
    address: u8,
    cgram_address: Option<u8>,
    leading_wait_ns: u64,
    latches: Vec<Latch>,
    transactions: Vec<Transaction>,
}

impl Hd44780Model {
    /// A controller right after the internal power-on reset.
    pub fn new(wiring: LcdWiring) -> Self {
        Hd44780Model {
            wiring,
            eight_bit: true,
            pending_nibble: None,
            two_lines: false,
            display_on: false,
            cursor_on: false,
            blink_on: false,
            increment: true,
            ddram: [b' '; 128],
            cgram: [0; 64],
            address: 0,
            cgram_address: None,
            leading_wait_ns: 0,
            latches: Vec::new(),
            transactions: Vec::new(),
        }
    }

    /// Feeds the whole log to a freshly reset controller.
    pub fn replay(wiring: LcdWiring, events: &[SimEvent]) -> Self {
        let (leading_wait_ns, latches) = decode_latches(events, &wiring);
        let mut model = Self::new(wiring);
        model.leading_wait_ns = leading_wait_ns;
        for latch in latches {
            model.latch(latch);
        }
        model
    }

    fn latch(&mut self, latch: Latch) {
        self.latches.push(latch);

        let (byte, split) = if !self.wiring.is_4bit() {
            (latch.value, false)
        } else if self.eight_bit {
            // D0–D3 aren't connected and read as low.
            (latch.value << 4, false)
        } else {
            match self.pending_nibble.take() {
                None => {
                    self.pending_nibble = Some(latch.value);
                    return;
                }
                Some(high) => ((high << 4) | latch.value, true),
            }
        };

        self.transactions.push(Transaction {
            rs: latch.rs,
            byte,
            split,
            wait_after_ns: latch.wait_after_ns,
        });

        if latch.rs {
            self.write_data(byte);
        } else {
            self.execute(byte);
        }
    }

    fn execute(&mut self, command: u8) {
        if command & 0x80 != 0 {
            self.address = command & 0x7F;
            self.cgram_address = None;
        } else if command & 0x40 != 0 {
            self.cgram_address = Some(command & 0x3F);
        } else if command & 0x20 != 0 {
            self.eight_bit = command & 0x10 != 0;
            self.two_lines = command & 0x08 != 0;
        } else if command & 0x10 != 0 {
            // Display shifts aren't modeled; cursor moves are.
            if command & 0x08 == 0 {
                self.step_address(command & 0x04 != 0);
            }
        } else if command & 0x08 != 0 {
            self.display_on = command & 0x04 != 0;
            self.cursor_on = command & 0x02 != 0;
            self.blink_on = command & 0x01 != 0;
        } else if command & 0x04 != 0 {
            self.increment = command & 0x02 != 0;
        } else if command & 0x02 != 0 {
            self.address = 0;
            self.cgram_address = None;
        } else if command & 0x01 != 0 {
            self.ddram = [b' '; 128];
            self.address = 0;
            self.increment = true;
            self.cgram_address = None;
        }
    }

    fn write_data(&mut self, data: u8) {
        match self.cgram_address {
            Some(address) => {
                self.cgram[address as usize] = data;
                let next = if self.increment {
                    address.wrapping_add(1)
                } else {
                    address.wrapping_sub(1)
                };
                self.cgram_address = Some(next & 0x3F);
            }
            None => {
                self.ddram[self.address as usize] = data;
                self.step_address(self.increment);
            }
        }
    }

    /// Moves the address counter the way the controller does: in two-line mode the lines are
    /// `0x00..=0x27` and `0x40..=0x67` and each one continues into the other.
    fn step_address(&mut self, forward: bool) {
        self.address = if self.two_lines {
            match (self.address, forward) {
                (0x27, true) => 0x40,
                (0x67, true) => 0x00,
                (0x00, false) => 0x67,
                (0x40, false) => 0x27,
                (address, true) => (address + 1) & 0x7F,
                (address, false) => address.wrapping_sub(1) & 0x7F,
            }
        } else {
            match (self.address, forward) {
                (0x4F, true) => 0x00,
                (0x00, false) => 0x4F,
                (address, true) => (address + 1) & 0x7F,
                (address, false) => address.wrapping_sub(1) & 0x7F,
            }
        };
    }

    /// Every latch seen, in order.
    pub fn latches(&self) -> &[Latch] {
        &self.latches
    }

    /// Every complete instruction or data byte, in order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Host wait before the first latch.
    pub fn leading_wait_ns(&self) -> u64 {
        self.leading_wait_ns
    }

    pub fn is_4bit_mode(&self) -> bool {
        !self.eight_bit
    }

    pub fn is_two_line(&self) -> bool {
        self.two_lines
    }

    /// Display, cursor and blink flags.
    pub fn display_control(&self) -> (bool, bool, bool) {
        (self.display_on, self.cursor_on, self.blink_on)
    }

    pub fn is_incrementing(&self) -> bool {
        self.increment
    }

    /// Whether a nibble is waiting for its other half.
    pub fn has_pending_nibble(&self) -> bool {
        self.pending_nibble.is_some()
    }

    /// The DDRAM address counter.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// The visible cell the address counter points at, if any.
    pub fn cursor(&self, geometry: LcdGeometry) -> Option<(usize, usize)> {
        let offsets = geometry.row_offsets();
        offsets.into_iter().take(geometry.rows as usize).enumerate().find_map(|(row, base)| {
            let offset = self.address.wrapping_sub(base);
            (self.address >= base && offset < geometry.columns).then_some((row, offset as usize))
        })
    }

    pub fn ddram(&self) -> &[u8; 128] {
        &self.ddram
    }

    pub fn cgram(&self) -> &[u8; 64] {
        &self.cgram
    }

    /// The visible text of a row, or `None` if the geometry has no such row or it doesn't fit in
    /// DDRAM.
    pub fn row_text(&self, geometry: LcdGeometry, row: usize) -> Option<String> {
        if row >= geometry.rows as usize {
            return None;
        }
        let base = *geometry.row_offsets().get(row)? as usize;
        let cells = self.ddram.get(base..base + geometry.columns as usize)?;
        Some(cells.iter().map(|&b| b as char).collect())
    }

    /// Whether every DDRAM cell is blank.
    pub fn is_blank(&self) -> bool {
        self.ddram.iter().all(|&b| b == b' ')
    }
}
