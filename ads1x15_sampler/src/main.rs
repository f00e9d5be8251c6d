use ads1x15_sampler::{run_sampler, SamplerConfig};


#[tokio::main]
async fn main() {
    // construct a subscriber that prints formatted traces to stdout
    let subscriber = tracing_subscriber::FmtSubscriber::new();
    // use that subscriber to process traces emitted after this point
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set global tracing subscriber.");

    let config = SamplerConfig::from_env().expect("Invalid ADS1X15_* configuration");

    run_sampler(config)
        .await
        .expect("Failed to start ADC sampler");
}
