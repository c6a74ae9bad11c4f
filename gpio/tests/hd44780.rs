use charlcd_gpio::lcd::hd44780::driver::{GpioHD44780Driver, HD44780Driver, LcdTiming};
use charlcd_gpio::lcd::hd44780::sim::{Hd44780Model, LcdWiring, Transaction};
use charlcd_gpio::lcd::{CharacterLcd, LcdGeometry};
use charlcd_gpio::sim::{SimEvent, SimGpioDriver};
use charlcd_gpio::soft::SoftGpioBus;
use charlcd_gpio::{GpioBus, GpioDriver, GpioPin};

const PIN_E: usize = 17;
const PIN_RW: usize = 27;
const PIN_RS: usize = 22;
const PINS_DATA_4BIT: [usize; 4] = [26, 16, 20, 21];
const PINS_DATA_8BIT: [usize; 8] = [2, 3, 4, 5, 6, 7, 8, 9];

fn wiring_4bit() -> LcdWiring {
    LcdWiring {
        e: PIN_E,
        rs: PIN_RS,
        rw: Some(PIN_RW),
        data: PINS_DATA_4BIT.to_vec(),
    }
}

fn wiring_8bit() -> LcdWiring {
    LcdWiring {
        e: PIN_E,
        rs: PIN_RS,
        rw: None,
        data: PINS_DATA_8BIT.to_vec(),
    }
}

/// Runs `f` against a 4-bit driver on a fresh simulated chip and returns everything it recorded.
fn run_4bit(geometry: LcdGeometry, f: impl FnOnce(&mut dyn HD44780Driver)) -> Vec<SimEvent> {
    let gpio = SimGpioDriver::new(32);
    let mut pin_e = gpio.get_pin(PIN_E).unwrap();
    let mut pin_rw = gpio.get_pin(PIN_RW).unwrap();
    let mut pin_rs = gpio.get_pin(PIN_RS).unwrap();
    let pin_e_out = pin_e.as_output().unwrap();
    let pin_rw_out = pin_rw.as_output().unwrap();
    let pin_rs_out = pin_rs.as_output().unwrap();
    let mut data_bus = gpio.get_pin_bus(PINS_DATA_4BIT).unwrap();
    let data_out = data_bus.as_output().unwrap();

    let mut lcd = GpioHD44780Driver::new_4bit(
        &*pin_e_out,
        Some(&*pin_rw_out),
        &*pin_rs_out,
        &*data_out,
        gpio.delay(),
    )
    .with_geometry(geometry);

    f(&mut lcd);
    gpio.events()
}

/// Same as [run_4bit], but with an 8-bit bus composed from individually claimed pins.
fn run_8bit(geometry: LcdGeometry, f: impl FnOnce(&mut dyn HD44780Driver)) -> Vec<SimEvent> {
    let gpio = SimGpioDriver::new(32);
    let mut pin_e = gpio.get_pin(PIN_E).unwrap();
    let mut pin_rs = gpio.get_pin(PIN_RS).unwrap();
    let pin_e_out = pin_e.as_output().unwrap();
    let pin_rs_out = pin_rs.as_output().unwrap();

    let mut data_pins = PINS_DATA_8BIT.map(|index| gpio.get_pin(index).unwrap());
    let mut data_bus =
        SoftGpioBus::new(data_pins.each_mut().map(|pin| -> &mut dyn GpioPin { &mut **pin }));
    let data_out = data_bus.as_output().unwrap();

    let mut lcd =
        GpioHD44780Driver::new_8bit(&*pin_e_out, None, &*pin_rs_out, &*data_out, gpio.delay())
            .with_geometry(geometry);

    f(&mut lcd);
    gpio.events()
}

fn init(lcd: &mut dyn HD44780Driver) {
    lcd.initialize().unwrap();
}

/// Transactions recorded after the init sequence.
fn after_init(wiring: LcdWiring, events: &[SimEvent], init_events: &[SimEvent]) -> Vec<Transaction> {
    let skip = Hd44780Model::replay(wiring.clone(), init_events)
        .transactions()
        .len();
    Hd44780Model::replay(wiring, events).transactions()[skip..].to_vec()
}

fn command(byte: u8) -> (bool, u8) {
    (false, byte)
}

fn data(byte: u8) -> (bool, u8) {
    (true, byte)
}

fn kinds(transactions: &[Transaction]) -> Vec<(bool, u8)> {
    transactions.iter().map(|t| (t.rs, t.byte)).collect()
}

#[test]
fn init_is_deterministic() {
    let first = run_4bit(LcdGeometry::LCD_16X2, init);
    let second = run_4bit(LcdGeometry::LCD_16X2, init);
    assert!(!first.is_empty());
    assert_eq!(first, second);

    let first = run_8bit(LcdGeometry::LCD_20X4, init);
    let second = run_8bit(LcdGeometry::LCD_20X4, init);
    assert_eq!(first, second);
}

#[test]
fn init_4bit_follows_the_datasheet_sequence() {
    let events = run_4bit(LcdGeometry::LCD_16X2, init);
    let model = Hd44780Model::replay(wiring_4bit(), &events);

    assert!(model.leading_wait_ns() >= 15_000_000);

    let latches = model.latches();
    let interface: Vec<u8> = latches[..4].iter().map(|l| l.value).collect();
    assert_eq!(interface, vec![0x3, 0x3, 0x3, 0x2]);
    assert!(latches[0].wait_after_ns >= 4_100_000);
    assert!(latches[1].wait_after_ns >= 100_000);

    assert_eq!(
        kinds(model.transactions()),
        vec![
            command(0x30),
            command(0x30),
            command(0x30),
            command(0x20),
            command(0x28),
            command(0x0C),
            command(0x01),
            command(0x06),
        ]
    );

    assert!(model.is_4bit_mode());
    assert!(model.is_two_line());
    assert_eq!(model.display_control(), (true, false, false));
    assert!(model.is_incrementing());
    assert!(model.is_blank());
    assert_eq!(model.cursor(LcdGeometry::LCD_16X2), Some((0, 0)));
    assert!(!model.has_pending_nibble());
}

#[test]
fn init_8bit_uses_full_bytes() {
    let events = run_8bit(LcdGeometry::LCD_20X4, init);
    let model = Hd44780Model::replay(wiring_8bit(), &events);

    assert_eq!(
        kinds(model.transactions()),
        vec![
            command(0x30),
            command(0x30),
            command(0x30),
            command(0x38),
            command(0x0C),
            command(0x01),
            command(0x06),
        ]
    );
    assert_eq!(model.latches().len(), model.transactions().len());
    assert!(!model.is_4bit_mode());
}

#[test]
fn single_line_display_is_initialized_in_one_line_mode() {
    let events = run_4bit(LcdGeometry::new(16, 1), init);
    let model = Hd44780Model::replay(wiring_4bit(), &events);
    assert!(!model.is_two_line());
    assert!(kinds(model.transactions()).contains(&command(0x20)));
}

#[test]
fn string_reads_back_from_ddram() {
    let geometry = LcdGeometry::LCD_16X2;
    for text in ["", "A", "Hello, World!", "0123456789ABCDEF", "~!@#$%^&*()_+{}|"] {
        let events = run_4bit(geometry, |lcd| {
            lcd.initialize().unwrap();
            lcd.display_string(text).unwrap();
        });
        let model = Hd44780Model::replay(wiring_4bit(), &events);

        let row = model.row_text(geometry, 0).unwrap();
        assert_eq!(&row[..text.len()], text);
        assert!(row[text.len()..].chars().all(|c| c == ' '));
        assert_eq!(model.address() as usize, text.len());
    }
}

#[test]
fn string_starts_at_the_cursor() {
    let geometry = LcdGeometry::LCD_16X2;
    let events = run_4bit(geometry, |lcd| {
        lcd.initialize().unwrap();
        lcd.move_cursor(1, 3).unwrap();
        lcd.display_string("abc").unwrap();
    });
    let model = Hd44780Model::replay(wiring_4bit(), &events);

    assert_eq!(model.row_text(geometry, 1).unwrap(), format!("{:<16}", "   abc"));
    assert_eq!(model.cursor(geometry), Some((1, 6)));
}

#[test]
fn string_on_8bit_bus_reads_back() {
    let geometry = LcdGeometry::LCD_20X4;
    let events = run_8bit(geometry, |lcd| {
        lcd.initialize().unwrap();
        lcd.move_cursor(3, 0).unwrap();
        lcd.display_string("Fourth row").unwrap();
    });
    let model = Hd44780Model::replay(wiring_8bit(), &events);

    assert_eq!(model.row_text(geometry, 3).unwrap(), format!("{:<20}", "Fourth row"));
    assert_eq!(model.cursor(geometry), Some((3, 10)));
}

#[test]
fn non_ascii_is_replaced() {
    let geometry = LcdGeometry::LCD_16X2;
    let events = run_4bit(geometry, |lcd| {
        lcd.initialize().unwrap();
        lcd.display_string("zł").unwrap();
    });
    let model = Hd44780Model::replay(wiring_4bit(), &events);
    assert!(model.row_text(geometry, 0).unwrap().starts_with("z? "));
}

#[test]
fn move_cursor_sends_one_address_command() {
    for geometry in [LcdGeometry::LCD_16X2, LcdGeometry::LCD_20X4] {
        let offsets = geometry.row_offsets();
        let mut cells = Vec::new();
        for row in 0..geometry.rows as usize {
            for column in 0..geometry.columns as usize {
                cells.push((row, column));
            }
        }

        let init_events = run_4bit(geometry, init);
        let events = run_4bit(geometry, |lcd| {
            lcd.initialize().unwrap();
            for &(row, column) in &cells {
                lcd.move_cursor(row, column).unwrap();
            }
        });

        let transactions = after_init(wiring_4bit(), &events, &init_events);
        assert_eq!(transactions.len(), cells.len());
        for (transaction, &(row, column)) in transactions.iter().zip(&cells) {
            let address = offsets[row] + column as u8;
            assert_eq!(
                (transaction.rs, transaction.byte),
                command(0x80 | address),
                "row {row}, column {column}"
            );
        }
    }
}

#[test]
fn move_cursor_out_of_range_is_not_an_error() {
    let events = run_4bit(LcdGeometry::LCD_16X2, |lcd| {
        lcd.initialize().unwrap();
        lcd.move_cursor(7, 90).unwrap();
    });
    let model = Hd44780Model::replay(wiring_4bit(), &events);
    let last = model.transactions().last().unwrap();
    assert_eq!(last.byte, 0x80 | LcdGeometry::LCD_16X2.address(7, 90));
}

#[test]
fn clear_twice_is_idempotent() {
    let geometry = LcdGeometry::LCD_16X2;
    let minimum_clear_ns = 1_520_000;

    let once = run_4bit(geometry, |lcd| {
        lcd.initialize().unwrap();
        lcd.move_cursor(1, 4).unwrap();
        lcd.display_string("xyz").unwrap();
        lcd.clear_screen().unwrap();
    });
    let model = Hd44780Model::replay(wiring_4bit(), &once);
    assert!(model.is_blank());
    assert_eq!(model.cursor(geometry), Some((0, 0)));

    let twice = run_4bit(geometry, |lcd| {
        lcd.initialize().unwrap();
        lcd.move_cursor(1, 4).unwrap();
        lcd.display_string("xyz").unwrap();
        lcd.clear_screen().unwrap();
        lcd.clear_screen().unwrap();
    });
    let model = Hd44780Model::replay(wiring_4bit(), &twice);
    assert!(model.is_blank());
    assert_eq!(model.cursor(geometry), Some((0, 0)));

    let transactions = model.transactions();
    let clears = &transactions[transactions.len() - 2..];
    assert_eq!(clears[0].rs, clears[1].rs);
    assert_eq!(clears[0].byte, clears[1].byte);
    assert_eq!(clears[0].byte, 0x01);
    for clear in clears {
        assert!(!clear.rs);
        assert!(clear.wait_after_ns >= minimum_clear_ns);
    }
}

#[test]
fn calls_are_sent_in_order() {
    let geometry = LcdGeometry::LCD_16X2;
    let init_events = run_4bit(geometry, init);
    let events = run_4bit(geometry, |lcd| {
        lcd.initialize().unwrap();
        lcd.display_string("A").unwrap();
        lcd.move_cursor(1, 0).unwrap();
        lcd.display_string("B").unwrap();
    });

    let transactions = after_init(wiring_4bit(), &events, &init_events);
    assert_eq!(
        kinds(&transactions),
        vec![data(b'A'), command(0xC0), data(b'B')]
    );

    let model = Hd44780Model::replay(wiring_4bit(), &events);
    assert!(model.row_text(geometry, 0).unwrap().starts_with("A "));
    assert!(model.row_text(geometry, 1).unwrap().starts_with("B "));
}

#[test]
fn bytes_are_split_high_nibble_first() {
    let geometry = LcdGeometry::LCD_16X2;
    let init_events = run_4bit(geometry, init);
    let events = run_4bit(geometry, |lcd| {
        lcd.initialize().unwrap();
        lcd.display_string("A").unwrap();
        lcd.move_cursor(1, 2).unwrap();
        lcd.clear_screen().unwrap();
    });

    let init_latches = Hd44780Model::replay(wiring_4bit(), &init_events)
        .latches()
        .len();
    let model = Hd44780Model::replay(wiring_4bit(), &events);
    let latches = &model.latches()[init_latches..];
    let transactions = after_init(wiring_4bit(), &events, &init_events);

    assert_eq!(latches.len(), 2 * transactions.len());
    assert!(transactions.iter().all(|t| t.split));

    let nibbles: Vec<(bool, u8)> = latches.iter().map(|l| (l.rs, l.value)).collect();
    assert_eq!(
        nibbles,
        vec![
            (true, 0x4),
            (true, 0x1),
            (false, 0xC),
            (false, 0x2),
            (false, 0x0),
            (false, 0x1),
        ]
    );
}

#[test]
fn every_write_waits_the_execution_time() {
    let timing = LcdTiming::default();
    let events = run_4bit(LcdGeometry::LCD_16X2, |lcd| {
        lcd.initialize().unwrap();
        lcd.display_string("timing").unwrap();
        lcd.return_home().unwrap();
    });
    let model = Hd44780Model::replay(wiring_4bit(), &events);

    for transaction in model.transactions() {
        assert!(transaction.wait_after_ns >= 37_000, "{transaction:?}");
        if !transaction.rs && matches!(transaction.byte, 0x01..=0x03) {
            assert!(transaction.wait_after_ns >= timing.clear_us as u64 * 1_000);
        }
    }
}

#[test]
fn rw_is_held_low() {
    let events = run_4bit(LcdGeometry::LCD_16X2, |lcd| {
        lcd.initialize().unwrap();
        lcd.display_string("rw").unwrap();
    });
    let rw_levels: Vec<bool> = events
        .iter()
        .filter_map(|event| match *event {
            SimEvent::Write { pin, level } if pin == PIN_RW => Some(level),
            _ => None,
        })
        .collect();
    assert!(!rw_levels.is_empty());
    assert!(rw_levels.iter().all(|&level| !level));
}

#[test]
fn custom_characters_go_to_cgram() {
    let geometry = LcdGeometry::LCD_16X2;
    let heart = [0b00000, 0b01010, 0b11111, 0b11111, 0b01110, 0b00100, 0b00000, 0b00000];
    let events = run_4bit(geometry, |lcd| {
        lcd.initialize().unwrap();
        lcd.define_char(1, heart).unwrap();
        lcd.display_string("\u{1}").unwrap();
    });
    let model = Hd44780Model::replay(wiring_4bit(), &events);

    assert_eq!(&model.cgram()[8..16], &heart);
    assert_eq!(model.ddram()[0], 1);
    assert_eq!(model.cursor(geometry), Some((0, 1)));
}

#[test]
fn custom_character_slot_is_checked() {
    run_4bit(LcdGeometry::LCD_16X2, |lcd| {
        assert!(lcd.define_char(8, [0; 8]).is_err());
    });
}
