//! Register map and the pure transforms between symbolic settings and register words.
//!
//! Nothing in this module touches the bus: [`encode_config`] packs a configuration
//! word, [`Variant::decode`] unpacks a conversion result, and [`resolve_rate_code`]
//! maps a sample rate onto the variant's data-rate field.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default 7-bit I2C address (ADDR pin tied to GND).
pub const DEFAULT_ADDRESS: u8 = 0x48;

/// Config word that halts continuous conversion: single-shot mode, powered down.
pub const POWER_DOWN_CONFIG: u16 = 0x8583;

/// Margin added to the nominal conversion period before the result is read back.
pub const CONVERSION_MARGIN_US: u32 = 100;

const OS_SINGLE: u16 = 0x8000;
const MUX_OFFSET: u16 = 12;
const COMP_WINDOW: u16 = 0x0010;
const COMP_ACTIVE_HIGH: u16 = 0x0008;
const COMP_LATCHING: u16 = 0x0004;
const COMP_QUE_DISABLE: u16 = 0x0003;

// (samples per second, DR field)
const ADS1015_DATA_RATES: [(u16, u16); 7] = [
    (128, 0x0000),
    (250, 0x0020),
    (490, 0x0040),
    (920, 0x0060),
    (1600, 0x0080),
    (2400, 0x00A0),
    (3300, 0x00C0),
];

const ADS1115_DATA_RATES: [(u16, u16); 8] = [
    (8, 0x0000),
    (16, 0x0020),
    (32, 0x0040),
    (64, 0x0060),
    (128, 0x0080),
    (250, 0x00A0),
    (475, 0x00C0),
    (860, 0x00E0),
];

/// A setting rejected before anything is written to the device.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidParameter {
    #[error("gain must be one of 2/3, 1, 2, 4, 8, 16 (got {0})")]
    Gain(String),
    #[error("channel must be within 0-3 (got {0})")]
    Channel(u8),
    #[error("differential pair must be within 0-3 (got {0})")]
    DifferentialPair(u8),
    #[error("{variant} does not support a data rate of {rate} SPS")]
    DataRate { variant: Variant, rate: u16 },
    #[error("comparator queue length must be 1, 2 or 4 readings (got {0})")]
    QueueLength(u8),
}

/// Register pointers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Register {
    Conversion = 0x00,
    Config = 0x01,
    LowThreshold = 0x02,
    HighThreshold = 0x03,
}

/// Chip variant. Fixes the sample width, the data-rate table and the
/// alignment of the conversion register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variant {
    /// 12-bit, 128 to 3300 SPS.
    Ads1015,
    /// 16-bit, 8 to 860 SPS.
    Ads1115,
}

impl Variant {
    /// Sample width in bits.
    pub const fn bits(self) -> u32 {
        match self {
            Variant::Ads1015 => 12,
            Variant::Ads1115 => 16,
        }
    }

    /// Data rate used when the caller does not ask for one (power-on DR field).
    pub const fn default_rate(self) -> u16 {
        match self {
            Variant::Ads1015 => 1600,
            Variant::Ads1115 => 128,
        }
    }

    /// Supported `(samples per second, DR field)` pairs.
    pub fn data_rates(self) -> &'static [(u16, u16)] {
        match self {
            Variant::Ads1015 => &ADS1015_DATA_RATES,
            Variant::Ads1115 => &ADS1115_DATA_RATES,
        }
    }

    /// DR field for an exact supported rate. No rounding to the nearest rate.
    pub fn rate_code(self, rate: u16) -> Result<u16, InvalidParameter> {
        self.data_rates()
            .iter()
            .find(|&&(sps, _)| sps == rate)
            .map(|&(_, code)| code)
            .ok_or(InvalidParameter::DataRate { variant: self, rate })
    }

    /// Decode the conversion register bytes into a signed count.
    ///
    /// The ADS1015 left-aligns its 12-bit result and pads the low nibble, so
    /// the word is shifted right arithmetically to drop the padding while
    /// keeping the sign. The ADS1115 result fills all 16 bits.
    pub const fn decode(self, high: u8, low: u8) -> i16 {
        let word = i16::from_be_bytes([high, low]);
        match self {
            Variant::Ads1015 => word >> 4,
            Variant::Ads1115 => word,
        }
    }

    /// Volts for a single-ended count read with `gain`.
    pub fn single_ended_volts(self, raw: i16, gain: Gain) -> f32 {
        let full_count = (1i32 << (self.bits() - 1)) - 1;
        f32::from(raw) * (gain.full_scale() / full_count as f32)
    }

    /// Volts for a differential count read with `gain`.
    ///
    /// Scaled against the whole bipolar count range, one bit wider than the
    /// single-ended scale.
    pub fn differential_volts(self, raw: i16, gain: Gain) -> f32 {
        let full_count = (1i32 << self.bits()) - 1;
        f32::from(raw) * (gain.full_scale() / full_count as f32)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Ads1015 => f.write_str("ADS1015"),
            Variant::Ads1115 => f.write_str("ADS1115"),
        }
    }
}

/// PGA gain settings. The discriminant is the PGA field (bits 11-9).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Gain {
    /// ±6.144 V
    TwoThirds = 0x0000,
    /// ±4.096 V
    #[default]
    One = 0x0200,
    /// ±2.048 V
    Two = 0x0400,
    /// ±1.024 V
    Four = 0x0600,
    /// ±0.512 V
    Eight = 0x0800,
    /// ±0.256 V
    Sixteen = 0x0A00,
}

impl Gain {
    pub const ALL: [Gain; 6] = [
        Gain::TwoThirds,
        Gain::One,
        Gain::Two,
        Gain::Four,
        Gain::Eight,
        Gain::Sixteen,
    ];

    /// PGA field, already shifted into place.
    pub const fn bits(self) -> u16 {
        self as u16
    }

    /// Full-scale input range in volts.
    pub const fn full_scale(self) -> f32 {
        match self {
            Gain::TwoThirds => 6.144,
            Gain::One => 4.096,
            Gain::Two => 2.048,
            Gain::Four => 1.024,
            Gain::Eight => 0.512,
            Gain::Sixteen => 0.256,
        }
    }

    fn factor(self) -> f32 {
        match self {
            Gain::TwoThirds => 2.0 / 3.0,
            Gain::One => 1.0,
            Gain::Two => 2.0,
            Gain::Four => 4.0,
            Gain::Eight => 8.0,
            Gain::Sixteen => 16.0,
        }
    }
}

impl TryFrom<f32> for Gain {
    type Error = InvalidParameter;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Gain::ALL
            .into_iter()
            .find(|gain| (gain.factor() - value).abs() < 1e-6)
            .ok_or_else(|| InvalidParameter::Gain(value.to_string()))
    }
}

impl FromStr for Gain {
    type Err = InvalidParameter;

    /// Accepts `2/3` as well as plain numbers.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "2/3" {
            return Ok(Gain::TwoThirds);
        }
        let value: f32 = s.parse().map_err(|_| InvalidParameter::Gain(s.to_string()))?;
        Gain::try_from(value)
    }
}

/// Conversion mode (bit 8).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Continuous = 0x0000,
    SingleShot = 0x0100,
}

/// Multiplexer input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Input {
    /// AINx against GND, `x` in 0-3.
    SingleEnded(u8),
    /// Differential pair:
    ///
    /// | pair | measures    |
    /// |------|-------------|
    /// | 0    | AIN0 - AIN1 |
    /// | 1    | AIN0 - AIN3 |
    /// | 2    | AIN1 - AIN3 |
    /// | 3    | AIN2 - AIN3 |
    Differential(u8),
}

impl Input {
    /// MUX field value (unshifted).
    pub fn selector(self) -> Result<u8, InvalidParameter> {
        match self {
            Input::SingleEnded(channel @ 0..=3) => Ok(channel | 0x04),
            Input::SingleEnded(channel) => Err(InvalidParameter::Channel(channel)),
            Input::Differential(pair @ 0..=3) => Ok(pair),
            Input::Differential(pair) => Err(InvalidParameter::DifferentialPair(pair)),
        }
    }
}

/// Number of out-of-range conversions before ALERT/RDY asserts (COMP_QUE).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum QueueLength {
    #[default]
    One = 0b00,
    Two = 0b01,
    Four = 0b10,
}

impl TryFrom<u8> for QueueLength {
    type Error = InvalidParameter;

    fn try_from(readings: u8) -> Result<Self, Self::Error> {
        match readings {
            1 => Ok(QueueLength::One),
            2 => Ok(QueueLength::Two),
            4 => Ok(QueueLength::Four),
            other => Err(InvalidParameter::QueueLength(other)),
        }
    }
}

/// Comparator settings. Defaults to a traditional, active-low, non-latching
/// comparator that asserts after one reading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComparatorConfig {
    /// Raw value written to the Hi_thresh register.
    pub high_threshold: i16,
    /// Raw value written to the Lo_thresh register.
    pub low_threshold: i16,
    pub active_low: bool,
    pub traditional: bool,
    pub latching: bool,
    pub queue: QueueLength,
}

impl ComparatorConfig {
    pub fn new(high_threshold: i16, low_threshold: i16) -> Self {
        Self {
            high_threshold,
            low_threshold,
            active_low: true,
            traditional: true,
            latching: false,
            queue: QueueLength::One,
        }
    }

    pub fn active_high(mut self) -> Self {
        self.active_low = false;
        self
    }

    /// Window comparator instead of the traditional hysteresis comparator.
    pub fn window(mut self) -> Self {
        self.traditional = false;
        self
    }

    pub fn latched(mut self) -> Self {
        self.latching = true;
        self
    }

    /// Assert after 1, 2 or 4 consecutive out-of-range readings.
    pub fn num_readings(mut self, readings: u8) -> Result<Self, InvalidParameter> {
        self.queue = QueueLength::try_from(readings)?;
        Ok(self)
    }

    fn bits(&self) -> u16 {
        let mut bits = self.queue as u16;
        if !self.traditional {
            bits |= COMP_WINDOW;
        }
        if !self.active_low {
            bits |= COMP_ACTIVE_HIGH;
        }
        if self.latching {
            bits |= COMP_LATCHING;
        }
        bits
    }
}

/// Look up the DR field for `rate`, falling back to the variant default.
/// Returns the rate actually used together with its field.
pub fn resolve_rate_code(variant: Variant, rate: Option<u16>) -> Result<(u16, u16), InvalidParameter> {
    let rate = rate.unwrap_or_else(|| variant.default_rate());
    Ok((rate, variant.rate_code(rate)?))
}

/// Pack a configuration word. The start-conversion bit is always set and the
/// comparator is disabled unless `comparator` is given.
pub fn encode_config(
    selector: u8,
    gain: Gain,
    mode: Mode,
    rate_code: u16,
    comparator: Option<&ComparatorConfig>,
) -> u16 {
    let mut config = OS_SINGLE;
    config |= u16::from(selector & 0x07) << MUX_OFFSET;
    config |= gain.bits();
    config |= mode as u16;
    config |= rate_code & 0x00E0;
    config |= match comparator {
        Some(comparator) => comparator.bits(),
        None => COMP_QUE_DISABLE,
    };
    config
}

/// Signed count from the two conversion register bytes, MSB first.
pub fn decode_conversion(high: u8, low: u8, variant: Variant) -> i16 {
    variant.decode(high, low)
}

/// Microseconds to wait after starting a conversion at `rate` SPS.
pub fn conversion_delay_us(rate: u16) -> u32 {
    1_000_000u32.div_ceil(u32::from(rate)) + CONVERSION_MARGIN_US
}
