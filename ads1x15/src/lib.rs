//! ADS1015/ADS1115 ADC driver for Linux using linux_embedded_hal and embedded-hal.
//!
//! Every acquisition is a blocking, polled sequence: write the config register,
//! wait one conversion period plus a small margin, then read the conversion
//! register back with a pointer write and a repeated-start read.
//!
//! ```no_run
//! use ads1x15::{Ads1x15, Gain};
//! use linux_embedded_hal::{Delay, I2cdev};
//!
//! let i2c = I2cdev::new("/dev/i2c-1")?;
//! let mut adc = Ads1x15::new_ads1115(i2c, Delay);
//! let volts = adc.read_single_volts(0, Gain::One, None)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The driver needs exclusive use of its bus handle for a whole acquisition.
//! When several threads share one device, put the driver behind a single lock.

pub mod registers;

pub use registers::{
    conversion_delay_us, decode_conversion, encode_config, resolve_rate_code, ComparatorConfig, Gain,
    Input, InvalidParameter, Mode, QueueLength, Register, Variant, DEFAULT_ADDRESS, POWER_DOWN_CONFIG,
};

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use thiserror::Error;
use tracing::{debug, trace};

/// Errors for the ADS1x15 driver.
#[derive(Error, Debug)]
pub enum Error<E: std::error::Error + 'static> {
    #[error("I2C bus error: {0}")]
    I2c(#[source] E),
    #[error(transparent)]
    InvalidParameter(#[from] InvalidParameter),
}

/// ADS1x15 driver struct.
pub struct Ads1x15<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    variant: Variant,
}

impl<I2C, D> Ads1x15<I2C, D> {
    pub fn new(i2c: I2C, delay: D, variant: Variant, address: u8) -> Self {
        Ads1x15 { i2c, delay, address, variant }
    }

    /// 12-bit ADS1015 at the default address.
    pub fn new_ads1015(i2c: I2C, delay: D) -> Self {
        Self::new(i2c, delay, Variant::Ads1015, DEFAULT_ADDRESS)
    }

    /// 16-bit ADS1115 at the default address.
    pub fn new_ads1115(i2c: I2C, delay: D) -> Self {
        Self::new(i2c, delay, Variant::Ads1115, DEFAULT_ADDRESS)
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Give back the bus and delay handles.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }
}

impl<I2C, D, E> Ads1x15<I2C, D>
where
    I2C: I2c<Error = E>,
    E: std::error::Error + 'static,
    D: DelayNs,
{
    /// Single-shot conversion of AIN`channel` against GND.
    ///
    /// `rate` is in samples per second and must be one the variant supports;
    /// `None` picks the variant default.
    pub fn read_single(&mut self, channel: u8, gain: Gain, rate: Option<u16>) -> Result<i16, Error<E>> {
        self.acquire(Input::SingleEnded(channel), gain, rate, Mode::SingleShot, None)
    }

    /// [`read_single`](Self::read_single) scaled to volts with the same gain.
    pub fn read_single_volts(&mut self, channel: u8, gain: Gain, rate: Option<u16>) -> Result<f32, Error<E>> {
        let raw = self.read_single(channel, gain, rate)?;
        Ok(self.variant.single_ended_volts(raw, gain))
    }

    /// Single-shot differential conversion. See [`Input::Differential`] for the pairs.
    pub fn read_differential(&mut self, pair: u8, gain: Gain, rate: Option<u16>) -> Result<i16, Error<E>> {
        self.acquire(Input::Differential(pair), gain, rate, Mode::SingleShot, None)
    }

    /// [`read_differential`](Self::read_differential) scaled to volts with the same gain.
    pub fn read_differential_volts(&mut self, pair: u8, gain: Gain, rate: Option<u16>) -> Result<f32, Error<E>> {
        let raw = self.read_differential(pair, gain, rate)?;
        Ok(self.variant.differential_volts(raw, gain))
    }

    /// Switch to continuous conversion and return the first result.
    /// Later results come from [`fetch_last_result`](Self::fetch_last_result).
    pub fn start_continuous(&mut self, input: Input, gain: Gain, rate: Option<u16>) -> Result<i16, Error<E>> {
        self.acquire(input, gain, rate, Mode::Continuous, None)
    }

    /// Like [`start_continuous`](Self::start_continuous), with the threshold
    /// registers written and the comparator enabled.
    pub fn start_comparator(
        &mut self,
        input: Input,
        comparator: &ComparatorConfig,
        gain: Gain,
        rate: Option<u16>,
    ) -> Result<i16, Error<E>> {
        self.acquire(input, gain, rate, Mode::Continuous, Some(comparator))
    }

    /// Power the converter down, ending continuous conversion.
    pub fn stop_continuous(&mut self) -> Result<(), Error<E>> {
        self.write_register(Register::Config, POWER_DOWN_CONFIG)
    }

    /// Read the conversion register as it stands. A conversion must already
    /// have been started.
    pub fn fetch_last_result(&mut self) -> Result<i16, Error<E>> {
        self.read_conversion()
    }

    /// Configure, wait for the conversion, read it back.
    fn acquire(
        &mut self,
        input: Input,
        gain: Gain,
        rate: Option<u16>,
        mode: Mode,
        comparator: Option<&ComparatorConfig>,
    ) -> Result<i16, Error<E>> {
        let selector = input.selector()?;
        let (rate, rate_code) = resolve_rate_code(self.variant, rate)?;
        let config = encode_config(selector, gain, mode, rate_code, comparator);

        if let Some(comparator) = comparator {
            self.write_register(Register::HighThreshold, comparator.high_threshold as u16)?;
            self.write_register(Register::LowThreshold, comparator.low_threshold as u16)?;
        }
        self.write_register(Register::Config, config)?;

        let wait_us = conversion_delay_us(rate);
        debug!("{:?} at {} SPS, waiting {} us", input, rate, wait_us);
        self.delay.delay_us(wait_us);

        self.read_conversion()
    }

    fn write_register(&mut self, register: Register, value: u16) -> Result<(), Error<E>> {
        let [high, low] = value.to_be_bytes();
        trace!("write {:?} = {:#06x}", register, value);
        self.i2c
            .write(self.address, &[register as u8, high, low])
            .map_err(Error::I2c)
    }

    fn read_conversion(&mut self) -> Result<i16, Error<E>> {
        let mut buf = [0u8; 2];
        // Pointer write and read share one transaction (repeated start).
        self.i2c
            .write_read(self.address, &[Register::Conversion as u8], &mut buf)
            .map_err(Error::I2c)?;
        let raw = self.variant.decode(buf[0], buf[1]);
        trace!("read {:?} = {:02x?} -> {}", Register::Conversion, buf, raw);
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};
    use std::fmt;
    use test_log::test;

    #[derive(Debug)]
    struct MockError;

    impl fmt::Display for MockError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("mock bus failure")
        }
    }

    impl std::error::Error for MockError {}

    impl embedded_hal::i2c::Error for MockError {
        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Write(Vec<u8>),
        Read(usize),
    }

    /// Records every transaction and answers reads with `conversion`.
    #[derive(Default)]
    struct MockI2c {
        transactions: Vec<(u8, Vec<Op>)>,
        conversion: [u8; 2],
        fail: bool,
    }

    impl MockI2c {
        fn answering(conversion: [u8; 2]) -> Self {
            MockI2c { conversion, ..Default::default() }
        }
    }

    impl ErrorType for MockI2c {
        type Error = MockError;
    }

    impl I2c for MockI2c {
        fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), MockError> {
            if self.fail {
                return Err(MockError);
            }
            let mut ops = Vec::new();
            for operation in operations.iter_mut() {
                match operation {
                    Operation::Write(bytes) => ops.push(Op::Write(bytes.to_vec())),
                    Operation::Read(buffer) => {
                        let len = buffer.len();
                        buffer.copy_from_slice(&self.conversion[..len]);
                        ops.push(Op::Read(len));
                    }
                }
            }
            self.transactions.push((address, ops));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingDelay {
        waited_ns: u64,
    }

    impl DelayNs for RecordingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.waited_ns += u64::from(ns);
        }
    }

    fn config_write(word: u16) -> (u8, Vec<Op>) {
        let [high, low] = word.to_be_bytes();
        (DEFAULT_ADDRESS, vec![Op::Write(vec![0x01, high, low])])
    }

    fn conversion_read() -> (u8, Vec<Op>) {
        (DEFAULT_ADDRESS, vec![Op::Write(vec![0x00]), Op::Read(2)])
    }

    #[test]
    fn single_read_sequence() {
        let mut adc = Ads1x15::new_ads1015(MockI2c::answering([0x7F, 0xF0]), RecordingDelay::default());

        assert_eq!(adc.read_single(0, Gain::One, None).unwrap(), 2047);

        let (i2c, delay) = adc.release();
        assert_eq!(i2c.transactions, vec![config_write(0xC383), conversion_read()]);
        assert_eq!(delay.waited_ns, 725_000);
    }

    #[test]
    fn single_read_volts() {
        let mut adc = Ads1x15::new_ads1015(MockI2c::answering([0x7F, 0xF0]), RecordingDelay::default());
        let volts = adc.read_single_volts(0, Gain::One, None).unwrap();
        assert!((volts - 4.096).abs() < 1e-5, "got {volts}");
    }

    #[test]
    fn differential_read_sequence() {
        let mut adc = Ads1x15::new_ads1115(MockI2c::answering([0x80, 0x00]), RecordingDelay::default());

        assert_eq!(adc.read_differential(3, Gain::One, None).unwrap(), -32768);

        let (i2c, delay) = adc.release();
        // AIN2 - AIN3, 128 SPS
        assert_eq!(i2c.transactions, vec![config_write(0xB383), conversion_read()]);
        assert_eq!(delay.waited_ns, 7_913_000);
    }

    #[test]
    fn differential_volts_use_full_range() {
        let mut adc = Ads1x15::new_ads1115(MockI2c::answering([0x7F, 0xFF]), RecordingDelay::default());
        let volts = adc.read_differential_volts(0, Gain::Four, Some(860)).unwrap();
        let expected = 32767.0 * 1.024 / 65535.0;
        assert!((volts - expected).abs() < 1e-5, "got {volts}");
    }

    #[test]
    fn continuous_clears_mode_bit() {
        let mut adc = Ads1x15::new_ads1115(MockI2c::answering([0x01, 0x00]), RecordingDelay::default());

        assert_eq!(adc.start_continuous(Input::SingleEnded(1), Gain::Two, Some(860)).unwrap(), 256);
        assert_eq!(adc.fetch_last_result().unwrap(), 256);

        let (i2c, delay) = adc.release();
        assert_eq!(
            i2c.transactions,
            vec![config_write(0xD4E3), conversion_read(), conversion_read()]
        );
        assert_eq!(delay.waited_ns, 1_263_000);
    }

    #[test]
    fn comparator_writes_thresholds_first() {
        let comparator = ComparatorConfig::new(1000, -1000)
            .window()
            .active_high()
            .latched()
            .num_readings(4)
            .unwrap();
        let mut adc = Ads1x15::new_ads1015(MockI2c::answering([0x10, 0x00]), RecordingDelay::default());

        assert_eq!(adc.start_comparator(Input::SingleEnded(2), &comparator, Gain::One, None).unwrap(), 256);

        let (i2c, _) = adc.release();
        assert_eq!(
            i2c.transactions,
            vec![
                (DEFAULT_ADDRESS, vec![Op::Write(vec![0x03, 0x03, 0xE8])]),
                (DEFAULT_ADDRESS, vec![Op::Write(vec![0x02, 0xFC, 0x18])]),
                config_write(0xE29E),
                conversion_read(),
            ]
        );
    }

    #[test]
    fn comparator_queue_lengths() {
        for (readings, bits) in [(1, 0b00), (2, 0b01), (4, 0b10)] {
            let comparator = ComparatorConfig::new(0, 0).num_readings(readings).unwrap();
            let mut adc = Ads1x15::new_ads1115(MockI2c::default(), RecordingDelay::default());
            adc.start_comparator(Input::Differential(0), &comparator, Gain::One, None).unwrap();

            let (i2c, _) = adc.release();
            let Op::Write(bytes) = &i2c.transactions[2].1[0] else {
                panic!("expected config write");
            };
            assert_eq!(bytes[2] & 0x03, bits);
        }
        assert!(ComparatorConfig::new(0, 0).num_readings(3).is_err());
    }

    #[test]
    fn stop_writes_power_down() {
        let mut adc = Ads1x15::new_ads1115(MockI2c::default(), RecordingDelay::default());
        adc.stop_continuous().unwrap();

        let (i2c, delay) = adc.release();
        assert_eq!(i2c.transactions, vec![(DEFAULT_ADDRESS, vec![Op::Write(vec![0x01, 0x85, 0x83])])]);
        assert_eq!(delay.waited_ns, 0);
    }

    #[test]
    fn invalid_parameters_never_reach_bus() {
        let mut adc = Ads1x15::new_ads1015(MockI2c::default(), RecordingDelay::default());

        assert!(matches!(
            adc.read_single(4, Gain::One, None),
            Err(Error::InvalidParameter(InvalidParameter::Channel(4)))
        ));
        assert!(matches!(
            adc.read_differential(9, Gain::One, None),
            Err(Error::InvalidParameter(InvalidParameter::DifferentialPair(9)))
        ));
        assert!(matches!(
            adc.read_single(0, Gain::One, Some(1000)),
            Err(Error::InvalidParameter(InvalidParameter::DataRate { rate: 1000, .. }))
        ));

        let (i2c, delay) = adc.release();
        assert!(i2c.transactions.is_empty());
        assert_eq!(delay.waited_ns, 0);
    }

    #[test]
    fn bus_errors_propagate() {
        let i2c = MockI2c { fail: true, ..Default::default() };
        let mut adc = Ads1x15::new(i2c, RecordingDelay::default(), Variant::Ads1115, 0x49);

        let err = adc.read_single(0, Gain::One, None).unwrap_err();
        assert!(matches!(err, Error::I2c(MockError)));
        assert_eq!(err.to_string(), "I2C bus error: mock bus failure");
        assert!(matches!(adc.fetch_last_result(), Err(Error::I2c(_))));

        let (_, delay) = adc.release();
        assert_eq!(delay.waited_ns, 0);
    }

    #[test]
    fn custom_address_is_used() {
        let mut adc = Ads1x15::new(MockI2c::default(), RecordingDelay::default(), Variant::Ads1015, 0x4B);
        assert_eq!(adc.address(), 0x4B);
        assert_eq!(adc.variant(), Variant::Ads1015);
        adc.read_single(3, Gain::Sixteen, Some(3300)).unwrap();

        let (i2c, _) = adc.release();
        assert!(i2c.transactions.iter().all(|(address, _)| *address == 0x4B));
    }
}
