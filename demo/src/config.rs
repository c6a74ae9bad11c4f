use charlcd_gpio::lcd::LcdGeometry;
use charlcd_gpio::lcd::hd44780::driver::LcdTiming;
use charlcd_gpio::lcd::hd44780::sim::LcdWiring;
use eyre::{bail, WrapErr};
use serde::{Deserialize, Serialize};
use std::env::var_os;
use std::ffi::OsStr;
use std::path::Path;

/// Which GPIO backend drives the display.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Memory-mapped registers through `/dev/gpiomem`.
    RawGpiomem,
    /// Memory-mapped registers through `/dev/mem` (needs root).
    RawMem,
    /// The Linux GPIO character device.
    Gpiod,
    /// No hardware; the display is modeled and its contents logged.
    #[default]
    Sim,
}

#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
#[serde(default)]
pub struct PinConfig {
    pub e: usize,
    pub rs: usize,
    pub rw: Option<usize>,
    /// D4–D7 or D0–D7, LSb first.
    pub data: Vec<usize>,
}

impl Default for PinConfig {
    fn default() -> Self {
        PinConfig {
            e: 17,
            rs: 22,
            rw: Some(27),
            data: vec![26, 16, 20, 21],
        }
    }
}

/// Overrides for [LcdTiming]; missing values keep the datasheet defaults.
#[derive(Serialize, Deserialize, Debug, Clone, Default, Eq, PartialEq)]
#[serde(default)]
pub struct TimingConfig {
    pub power_on_ms: Option<u32>,
    pub enable_pulse_ns: Option<u32>,
    pub command_us: Option<u32>,
    pub clear_us: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    pub gpiod_chip: String,
    pub pins: PinConfig,
    pub columns: u8,
    pub rows: u8,
    pub timing: TimingConfig,
    /// Pause between the demo steps.
    pub step_pause_ms: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            backend: Backend::default(),
            gpiod_chip: "/dev/gpiochip0".to_string(),
            pins: PinConfig::default(),
            columns: 16,
            rows: 2,
            timing: TimingConfig::default(),
            step_pause_ms: 1000,
        }
    }
}

impl Config {
    /// Loads the config from the file named by `CHARLCD_CONFIG_FILE` (`charlcd.json` by default),
    /// or falls back to the defaults if there's no such file.
    pub fn load() -> eyre::Result<Self> {
        let config_str = var_os("CHARLCD_CONFIG_FILE");
        let config_str: &OsStr = config_str.as_deref().unwrap_or(OsStr::new("charlcd.json"));
        let config_path = Path::new(config_str);

        let config = if config_path.exists() {
            let file = std::fs::File::open(config_path)?;
            let reader = std::io::BufReader::new(file);
            serde_json::from_reader(reader)
                .wrap_err_with(|| format!("Invalid config in {}", config_path.display()))?
        } else {
            Config::default()
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        if !matches!(self.pins.data.len(), 4 | 8) {
            bail!(
                "Expected 4 or 8 data pins, got {}",
                self.pins.data.len()
            );
        }
        let pins = [self.pins.e, self.pins.rs]
            .into_iter()
            .chain(self.pins.rw)
            .chain(self.pins.data.iter().copied())
            .collect::<Vec<_>>();
        if let Some(pin) = pins
            .iter()
            .enumerate()
            .find_map(|(i, pin)| pins[..i].contains(pin).then_some(pin))
        {
            bail!("Pin {} is assigned more than once", pin);
        }
        if !(1..=4).contains(&self.rows) {
            bail!("Unsupported number of rows: {}", self.rows);
        }
        if !(1..=40).contains(&self.columns) || self.columns as usize * self.rows as usize > 80 {
            bail!(
                "Unsupported geometry: {}x{}",
                self.columns,
                self.rows
            );
        }
        Ok(())
    }

    pub fn geometry(&self) -> LcdGeometry {
        LcdGeometry::new(self.columns, self.rows)
    }

    pub fn timing(&self) -> LcdTiming {
        let defaults = LcdTiming::default();
        LcdTiming {
            power_on_ms: self.timing.power_on_ms.unwrap_or(defaults.power_on_ms),
            enable_pulse_ns: self
                .timing
                .enable_pulse_ns
                .unwrap_or(defaults.enable_pulse_ns),
            command_us: self.timing.command_us.unwrap_or(defaults.command_us),
            clear_us: self.timing.clear_us.unwrap_or(defaults.clear_us),
        }
    }

    pub fn wiring(&self) -> LcdWiring {
        LcdWiring {
            e: self.pins.e,
            rs: self.pins.rs,
            rw: self.pins.rw,
            data: self.pins.data.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "backend": "gpiod", "rows": 4, "columns": 20 }"#).unwrap();
        assert_eq!(config.backend, Backend::Gpiod);
        assert_eq!(config.geometry(), LcdGeometry::LCD_20X4);
        assert_eq!(config.pins, PinConfig::default());
        assert_eq!(config.step_pause_ms, 1000);
        config.validate().unwrap();
    }

    #[test]
    fn timing_overrides_apply_one_by_one() {
        let config: Config =
            serde_json::from_str(r#"{ "timing": { "clear_us": 3000 } }"#).unwrap();
        let timing = config.timing();
        assert_eq!(timing.clear_us, 3000);
        assert_eq!(timing.command_us, LcdTiming::default().command_us);
    }

    #[test]
    fn rejects_odd_bus_widths() {
        let mut config = Config::default();
        config.pins.data = vec![1, 2, 3, 4, 5];
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_shared_pins() {
        let mut config = Config::default();
        config.pins.data = vec![26, 16, 20, 17];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.pins.rw = Some(config.pins.rs);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.pins.data = vec![26, 26, 20, 21];
        assert!(config.validate().is_err());
    }

    #[test]
    fn unwired_rw_is_not_a_conflict() {
        let mut config = Config::default();
        config.pins.rw = None;
        config.validate().unwrap();
    }

    #[test]
    fn rejects_geometry_without_row_table() {
        let mut config = Config::default();
        config.rows = 5;
        assert!(config.validate().is_err());
        config.rows = 4;
        config.columns = 40;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_backend_is_an_error() {
        assert!(serde_json::from_str::<Config>(r#"{ "backend": "spi" }"#).is_err());
    }

    #[test]
    fn wiring_matches_pins() {
        let config = Config::default();
        let wiring = config.wiring();
        assert_eq!(wiring.e, 17);
        assert_eq!(wiring.rw, Some(27));
        assert!(wiring.is_4bit());
    }
}
