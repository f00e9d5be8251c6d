//! Sampler settings, read from `ADS1X15_*` environment variables.
//!
//! | variable              | default      |
//! |-----------------------|--------------|
//! | `ADS1X15_I2C_BUS`     | `/dev/i2c-1` |
//! | `ADS1X15_ADDRESS`     | `0x48`       |
//! | `ADS1X15_VARIANT`     | `ads1115`    |
//! | `ADS1X15_CHANNELS`    | `0,1,2,3`    |
//! | `ADS1X15_GAIN`        | `1`          |
//! | `ADS1X15_DATA_RATE`   | variant default |
//! | `ADS1X15_INTERVAL_MS` | `1000`       |

use std::env;
use std::error::Error;
use std::time::Duration;

use ads1x15::{Gain, Input, Variant, DEFAULT_ADDRESS};

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    /// I2C character device, e.g. `/dev/i2c-1`.
    pub i2c_bus: String,
    pub address: u8,
    pub variant: Variant,
    /// Single-ended channels polled each tick.
    pub channels: Vec<u8>,
    pub gain: Gain,
    /// `None` uses the variant default.
    pub data_rate: Option<u16>,
    pub interval: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            i2c_bus: "/dev/i2c-1".to_string(),
            address: DEFAULT_ADDRESS,
            variant: Variant::Ads1115,
            channels: vec![0, 1, 2, 3],
            gain: Gain::One,
            data_rate: None,
            interval: Duration::from_millis(1000),
        }
    }
}

impl SamplerConfig {
    pub fn from_env() -> Result<Self, Box<dyn Error>> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup. Missing keys keep their defaults,
    /// present but invalid ones are an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Box<dyn Error>> {
        let mut config = Self::default();

        if let Some(bus) = lookup("ADS1X15_I2C_BUS") {
            config.i2c_bus = bus;
        }
        if let Some(address) = lookup("ADS1X15_ADDRESS") {
            config.address = parse_address(&address)?;
        }
        if let Some(variant) = lookup("ADS1X15_VARIANT") {
            config.variant = parse_variant(&variant)?;
        }
        if let Some(channels) = lookup("ADS1X15_CHANNELS") {
            config.channels = parse_channels(&channels)?;
        }
        if let Some(gain) = lookup("ADS1X15_GAIN") {
            config.gain = gain.parse()?;
        }
        if let Some(rate) = lookup("ADS1X15_DATA_RATE") {
            let rate: u16 = rate.trim().parse().map_err(|e| format!("ADS1X15_DATA_RATE {rate:?}: {e}"))?;
            config.variant.rate_code(rate)?;
            config.data_rate = Some(rate);
        }
        if let Some(interval) = lookup("ADS1X15_INTERVAL_MS") {
            let ms: u64 = interval.trim().parse().map_err(|e| format!("ADS1X15_INTERVAL_MS {interval:?}: {e}"))?;
            if ms == 0 {
                return Err("ADS1X15_INTERVAL_MS must be greater than zero".into());
            }
            config.interval = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

fn parse_address(s: &str) -> Result<u8, Box<dyn Error>> {
    let s = s.trim();
    let address = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    }
    .map_err(|e| format!("ADS1X15_ADDRESS {s:?}: {e}"))?;
    if address > 0x7F {
        return Err(format!("ADS1X15_ADDRESS {address:#04x} is not a 7-bit address").into());
    }
    Ok(address)
}

fn parse_variant(s: &str) -> Result<Variant, Box<dyn Error>> {
    match s.trim().to_ascii_lowercase().as_str() {
        "ads1015" => Ok(Variant::Ads1015),
        "ads1115" => Ok(Variant::Ads1115),
        other => Err(format!("ADS1X15_VARIANT must be ads1015 or ads1115 (got {other:?})").into()),
    }
}

fn parse_channels(s: &str) -> Result<Vec<u8>, Box<dyn Error>> {
    let mut channels = Vec::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let channel: u8 = part.parse().map_err(|e| format!("ADS1X15_CHANNELS {part:?}: {e}"))?;
        Input::SingleEnded(channel).selector()?;
        if !channels.contains(&channel) {
            channels.push(channel);
        }
    }
    if channels.is_empty() {
        return Err("ADS1X15_CHANNELS must name at least one channel".into());
    }
    Ok(channels)
}
