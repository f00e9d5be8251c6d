//! Wrapper that polls a shared ADS1x15 driver over a fixed set of channels.

use std::sync::{Arc, Mutex, PoisonError};

use ads1x15::{Ads1x15, Gain};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use tracing::warn;

use crate::config::SamplerConfig;

/// One single-ended conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelReading {
    pub channel: u8,
    pub raw: i16,
    pub volts: f32,
}

/// Polls the configured channels of one converter.
///
/// The driver sits behind a mutex so other users of the same device can
/// share it through [`AdcSampler::handle`]; each call to
/// [`AdcSampler::measure`] holds the lock for the whole sweep.
pub struct AdcSampler<I2C, D> {
    adc: Arc<Mutex<Ads1x15<I2C, D>>>,
    channels: Vec<u8>,
    gain: Gain,
    data_rate: Option<u16>,
}

impl<I2C, D, E> AdcSampler<I2C, D>
where
    I2C: I2c<Error = E>,
    E: std::error::Error + 'static,
    D: DelayNs,
{
    pub fn new(adc: Ads1x15<I2C, D>, config: &SamplerConfig) -> Self {
        Self {
            adc: Arc::new(Mutex::new(adc)),
            channels: config.channels.clone(),
            gain: config.gain,
            data_rate: config.data_rate,
        }
    }

    /// Shared handle to the underlying driver.
    pub fn handle(&self) -> Arc<Mutex<Ads1x15<I2C, D>>> {
        Arc::clone(&self.adc)
    }

    /// Read every configured channel once. Channels that fail are logged and
    /// left out of the result.
    pub fn measure(&self) -> Vec<ChannelReading> {
        let mut adc = self.adc.lock().unwrap_or_else(PoisonError::into_inner);
        let variant = adc.variant();

        self.channels
            .iter()
            .filter_map(|&channel| {
                adc.read_single(channel, self.gain, self.data_rate)
                    .map(|raw| ChannelReading {
                        channel,
                        raw,
                        volts: variant.single_ended_volts(raw, self.gain),
                    })
                    .map_err(|e| warn!("ADS1x15 channel {channel} read error: {e}"))
                    .ok()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ads1x15::Variant;
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};
    use std::fmt;
    use test_log::test;

    #[derive(Debug)]
    struct NoAck;

    impl fmt::Display for NoAck {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("no acknowledge")
        }
    }

    impl std::error::Error for NoAck {}

    impl embedded_hal::i2c::Error for NoAck {
        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    /// Answers each conversion read with `0x1000 * (channel + 1)` and refuses
    /// to start conversions on `dead_channel`.
    struct FakeAdc {
        mux: u8,
        dead_channel: Option<u8>,
    }

    impl ErrorType for FakeAdc {
        type Error = NoAck;
    }

    impl I2c for FakeAdc {
        fn transaction(&mut self, _address: u8, operations: &mut [Operation<'_>]) -> Result<(), NoAck> {
            for operation in operations.iter_mut() {
                match operation {
                    Operation::Write([0x01, high, _]) => {
                        let channel = (*high >> 4) & 0x03;
                        if Some(channel) == self.dead_channel {
                            return Err(NoAck);
                        }
                        self.mux = channel;
                    }
                    Operation::Write(_) => {}
                    Operation::Read(buffer) => {
                        buffer.copy_from_slice(&[0x10 * (self.mux + 1), 0x00]);
                    }
                }
            }
            Ok(())
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    fn sampler(dead_channel: Option<u8>, channels: Vec<u8>) -> AdcSampler<FakeAdc, NoDelay> {
        let adc = Ads1x15::new_ads1115(FakeAdc { mux: 0, dead_channel }, NoDelay);
        let config = SamplerConfig { channels, ..SamplerConfig::default() };
        AdcSampler::new(adc, &config)
    }

    #[test]
    fn reads_each_channel() {
        let readings = sampler(None, vec![0, 2]).measure();

        assert_eq!(readings.len(), 2);
        assert_eq!((readings[0].channel, readings[0].raw), (0, 0x1000));
        assert_eq!((readings[1].channel, readings[1].raw), (2, 0x3000));
        let expected = Variant::Ads1115.single_ended_volts(0x3000, Gain::One);
        assert!((readings[1].volts - expected).abs() < 1e-6);
    }

    #[test]
    fn failing_channel_is_skipped() {
        let readings = sampler(Some(1), vec![0, 1, 3]).measure();

        let channels: Vec<u8> = readings.iter().map(|r| r.channel).collect();
        assert_eq!(channels, vec![0, 3]);
    }

    #[test]
    fn handle_shares_the_driver() {
        let sampler = sampler(None, vec![1]);
        let handle = sampler.handle();

        let raw = handle.lock().unwrap().fetch_last_result().unwrap();
        assert_eq!(raw, 0x1000);
        assert_eq!(sampler.measure()[0].raw, 0x2000);
        assert_eq!(Arc::strong_count(&handle), 2);
    }
}
