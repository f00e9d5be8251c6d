use ads1x15::{Ads1x15, Gain, Input};
use linux_embedded_hal::{Delay, I2cdev};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let i2c = I2cdev::new("/dev/i2c-1")?;
    let mut adc = Ads1x15::new_ads1115(i2c, Delay);

    let volts = adc.read_single_volts(3, Gain::One, None)?;
    println!("AIN3: {:.3} V", volts);

    let diff = adc.read_differential_volts(0, Gain::Four, Some(250))?;
    println!("AIN0-AIN1: {:.4} V", diff);

    // Continuous mode: first result comes back with the start call.
    let first = adc.start_continuous(Input::SingleEnded(0), Gain::TwoThirds, Some(860))?;
    println!("AIN0 continuous: {}", first);
    for _ in 0..5 {
        std::thread::sleep(std::time::Duration::from_millis(10));
        let raw = adc.fetch_last_result()?;
        println!("AIN0 continuous: {} ({:.3} V)", raw, adc.variant().single_ended_volts(raw, Gain::TwoThirds));
    }
    adc.stop_continuous()?;
    Ok(())
}
