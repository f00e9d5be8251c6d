use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use ads1x15::Ads1x15;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use linux_embedded_hal::{Delay, I2cdev};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use config::SamplerConfig;
pub use sensor::{AdcSampler, ChannelReading};

pub mod config;
pub mod sensor;

/// Open the bus, then poll the configured channels until Ctrl-C.
pub async fn run_sampler(config: SamplerConfig) -> Result<(), Box<dyn Error>> {
    let cancel = CancellationToken::new();
    let cloned_cancel = cancel.clone();

    // Spawn shutdown signal handler
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Could not listen for shutdown signal: {e}");
            return;
        }
        info!("Shutdown signal received.");
        cancel.cancel();
    });

    let i2c = I2cdev::new(&config.i2c_bus)?;
    let adc = Ads1x15::new(i2c, Delay, config.variant, config.address);
    let sampler = Arc::new(AdcSampler::new(adc, &config));
    info!(
        "{} at {:#04x} on {} initialized, channels {:?}, gain {:?}.",
        config.variant, config.address, config.i2c_bus, config.channels, config.gain
    );

    tokio::select! {
        _ = poll_channels(sampler, config.interval) => {
            info!("Sampling stopped.");
        },
        _ = cloned_cancel.cancelled() => {
            info!("Received shutdown signal.");
        }
    }

    info!("Sampler stopped.");
    Ok(())
}

async fn poll_channels<I2C, D, E>(sampler: Arc<AdcSampler<I2C, D>>, period: Duration)
where
    I2C: I2c<Error = E> + Send + 'static,
    E: std::error::Error + 'static,
    D: DelayNs + Send + 'static,
{
    let mut interval = tokio::time::interval(period);

    loop {
        interval.tick().await;
        // Conversions block for the sample period, keep them off the runtime threads.
        let task_sampler = Arc::clone(&sampler);
        match tokio::task::spawn_blocking(move || task_sampler.measure()).await {
            Ok(readings) => {
                for reading in readings {
                    info!(
                        channel = reading.channel,
                        raw = reading.raw,
                        volts = reading.volts,
                        "sample"
                    );
                }
            }
            Err(e) => warn!("Sampling task failed: {e}"),
        }
    }
}
