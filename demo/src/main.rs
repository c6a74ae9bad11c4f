mod config;

use crate::config::{Backend, Config};
use charlcd_gpio::delay::{DelayNs, StdDelay};
use charlcd_gpio::gpiod::GpiodDriver;
use charlcd_gpio::lcd::CharacterLcd;
use charlcd_gpio::lcd::hd44780::driver::{GpioHD44780Driver, HD44780Driver};
use charlcd_gpio::lcd::hd44780::sim::Hd44780Model;
use charlcd_gpio::raw::RawGpioDriver;
use charlcd_gpio::sim::SimGpioDriver;
use charlcd_gpio::{GpioDriver, GpioResult};
use dotenv::dotenv;
use eyre::bail;
use log::{debug, info};
use std::fmt::Debug;
use std::thread;
use sysinfo::System;

/// Pins available on the simulated chip.
const SIM_PIN_COUNT: usize = 64;

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    dotenv().ok();
    pretty_env_logger::init();

    const UNKNOWN_STR: &str = "???";

    info!(
        "Hello, {}!",
        System::name().as_deref().unwrap_or(UNKNOWN_STR)
    );
    info!(
        "System ver {} kernel ver {}",
        System::long_os_version().as_deref().unwrap_or(UNKNOWN_STR),
        System::kernel_version().as_deref().unwrap_or(UNKNOWN_STR),
    );
    info!(
        "Hostname {}",
        System::host_name().as_deref().unwrap_or(UNKNOWN_STR)
    );
    info!("Architecture {}", System::cpu_arch());

    debug!("Trying to load config...");
    let config = Config::load()?;

    info!(
        "LCD @ E: {}, RW: {:?}, RS: {}, Data: {:?}",
        config.pins.e, config.pins.rw, config.pins.rs, config.pins.data
    );
    info!(
        "{}x{} display via {:?} backend",
        config.columns, config.rows, config.backend
    );

    match config.backend {
        Backend::Sim => {
            let gpio = SimGpioDriver::new(SIM_PIN_COUNT);
            debug!("{:?} initialized.", gpio);
            run(&gpio, &config, gpio.delay(), &mut gpio.delay())?;

            let model = Hd44780Model::replay(config.wiring(), &gpio.events());
            let geometry = config.geometry();
            info!(
                "Simulated display after {} transactions:",
                model.transactions().len()
            );
            for row in 0..geometry.rows as usize {
                info!("|{}|", model.row_text(geometry, row).unwrap_or_default());
            }
            Ok(())
        }
        Backend::RawGpiomem => {
            let gpio = RawGpioDriver::new_gpiomem()?;
            debug!("{:?} initialized.", gpio);
            run(&gpio, &config, StdDelay, &mut StdDelay)?;
            idle()
        }
        Backend::RawMem => {
            let gpio = RawGpioDriver::new_mem()?;
            debug!("{:?} initialized.", gpio);
            run(&gpio, &config, StdDelay, &mut StdDelay)?;
            idle()
        }
        Backend::Gpiod => {
            let gpio = GpiodDriver::open(&config.gpiod_chip)?;
            debug!("{:?} initialized.", gpio);
            run(&gpio, &config, StdDelay, &mut StdDelay)?;
            idle()
        }
    }
}

/// Keeps the pins claimed, so the display keeps showing the last text.
fn idle() -> ! {
    info!("Demo finished.");
    loop {
        thread::park();
    }
}

/// Claims the pins named in the config and runs the demo on them.
fn run<G: GpioDriver, D: DelayNs + Debug>(
    gpio: &G,
    config: &Config,
    lcd_delay: D,
    pause: &mut impl DelayNs,
) -> eyre::Result<()> {
    let pins = &config.pins;

    debug!("Initializing LCD driver...");
    let mut pin_e = gpio.get_pin(pins.e)?;
    let pin_e_out = pin_e.as_output()?;
    let mut pin_rs = gpio.get_pin(pins.rs)?;
    let pin_rs_out = pin_rs.as_output()?;
    let mut pin_rw = pins.rw.map(|index| gpio.get_pin(index)).transpose()?;
    let pin_rw_out = match pin_rw.as_mut() {
        Some(pin) => Some(pin.as_output()?),
        None => None,
    };

    match *pins.data.as_slice() {
        [d4, d5, d6, d7] => {
            let mut data_bus = gpio.get_pin_bus([d4, d5, d6, d7])?;
            let data_out = data_bus.as_output()?;
            let mut lcd = GpioHD44780Driver::new_4bit(
                &*pin_e_out,
                pin_rw_out.as_deref(),
                &*pin_rs_out,
                &*data_out,
                lcd_delay,
            )
            .with_geometry(config.geometry())
            .with_timing(config.timing());
            debug!("{:?} initialized.", lcd);
            run_script(&mut lcd, pause, config.step_pause_ms)?;
        }
        [d0, d1, d2, d3, d4, d5, d6, d7] => {
            let mut data_bus = gpio.get_pin_bus([d0, d1, d2, d3, d4, d5, d6, d7])?;
            let data_out = data_bus.as_output()?;
            let mut lcd = GpioHD44780Driver::new_8bit(
                &*pin_e_out,
                pin_rw_out.as_deref(),
                &*pin_rs_out,
                &*data_out,
                lcd_delay,
            )
            .with_geometry(config.geometry())
            .with_timing(config.timing());
            debug!("{:?} initialized.", lcd);
            run_script(&mut lcd, pause, config.step_pause_ms)?;
        }
        _ => bail!("Invalid number of data pins: {}", pins.data.len()),
    }

    Ok(())
}

fn run_script(
    lcd: &mut impl HD44780Driver,
    pause: &mut impl DelayNs,
    pause_ms: u32,
) -> GpioResult<()> {
    lcd.initialize()?;
    lcd.display_string("Hello, World!")?;

    pause.delay_ms(pause_ms);
    info!("Writing the second line...");
    lcd.move_cursor(1, 0)?;
    lcd.display_string("Test 2nd Line")?;

    pause.delay_ms(pause_ms);
    info!("Clearing...");
    lcd.clear_screen()?;
    lcd.display_string("Cleared!")?;

    Ok(())
}
