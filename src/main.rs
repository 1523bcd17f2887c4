use anyhow::Context;
use parking_lot::Mutex;
use printbridge::{init_logging, BridgeConfig, BUILD_DATE, VERSION};
use printbridge_communication::{MarlinDriver, StatusAssembler};
use printbridge_core::CancelToken;
use printbridge_telemetry::TelemetryPublisher;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;
    tracing::info!("printbridge {} (built {})", VERSION, BUILD_DATE);

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("printbridge.json"));
    let config = BridgeConfig::load(&config_path)?;

    // Broker first: no point resetting the printer's serial stack if
    // the telemetry side is down.
    let publisher = TelemetryPublisher::connect(&config.mqtt)
        .await
        .context("MQTT startup failed")?;

    let params = config.printer.connection_params();
    let driver_config = config.printer.driver_config();
    let driver = tokio::task::spawn_blocking(move || {
        let mut driver = MarlinDriver::new(driver_config);
        driver.connect(&params).map(|_| driver)
    })
    .await?
    .context("Printer startup failed")?;

    let driver = Arc::new(Mutex::new(driver));
    let assembler = StatusAssembler::new(driver.clone());

    let mut ticker = tokio::time::interval(Duration::from_millis(config.poll_interval_ms.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    tracing::info!("Starting update loop");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                let assembler = assembler.clone();
                match tokio::task::spawn_blocking(move || assembler.snapshot()).await? {
                    Ok(snapshot) => {
                        if let Err(e) = publisher.publish(&snapshot).await {
                            tracing::error!("Publish failed, skipping cycle: {}", e);
                        }
                    }
                    Err(e) => tracing::warn!("Status unavailable, skipping cycle: {}", e),
                }
            }
        }
    }

    tracing::info!("SIGINT. Gracefully shutting down (interrupt again to force)");
    let cancel = CancelToken::new();
    let shutdown_cancel = cancel.clone();
    let shutdown_driver = driver.clone();
    let shutdown =
        tokio::task::spawn_blocking(move || shutdown_driver.lock().shutdown(&shutdown_cancel));

    tokio::select! {
        result = shutdown => {
            result??;
            tracing::info!("Done");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::error!("SIGINT. Hard shutdown");
            cancel.cancel();
            std::process::exit(1);
        }
    }

    Ok(())
}
