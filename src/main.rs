mod config;
mod device;
mod handlers;
mod registry;

use std::sync::Arc;
use std::time::Duration;

use config::{DeviceConfig, PluginConfig};
use handlers::ChassisLedHandler;
use registry::HandlerRegistry;

use bmclink_protocol::{CommandClient, TcpTransport};

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = PluginConfig {
        devices: vec![DeviceConfig {
            id: "rack1-bmc-led".into(),
            address: "127.0.0.1:623".into(),
            ..Default::default()
        }],
        ..Default::default()
    };

    info!("bmclink starting: {} device(s)", config.devices.len());

    let transport = Arc::new(TcpTransport::new());
    let client = Arc::new(
        CommandClient::new(transport).with_request_timeout(config.request_timeout),
    );

    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(ChassisLedHandler::new(client)));
    let registry = Arc::new(registry);
    info!("registered {} handler(s)", registry.len());

    // One poll task per device; devices share no mutable state, so they
    // poll in parallel
    let mut poll_tasks = Vec::new();
    for device_config in &config.devices {
        let device = device_config.to_device();
        let handler = match registry.lookup(&device.device_type, &device.model) {
            Some(handler) => handler,
            None => {
                warn!(
                    "no handler for device {} (type={}, model={})",
                    device.id, device.device_type, device.model
                );
                continue;
            }
        };

        info!("polling device {} at {}", device.id, device.data.address);
        let poll_interval = config.poll_interval;

        poll_tasks.push(tokio::spawn(async move {
            poll_device(handler, device, poll_interval).await;
        }));
    }

    // Run until interrupted
    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    for task in &poll_tasks {
        task.abort();
    }
    let _ = futures::future::join_all(poll_tasks).await;

    Ok(())
}

/// Periodically read one device and report its readings
async fn poll_device(
    handler: Arc<dyn device::DeviceHandler>,
    device: device::Device,
    poll_interval: Duration,
) {
    let mut ticker = tokio::time::interval(poll_interval);

    loop {
        ticker.tick().await;

        match handler.read(&device).await {
            Ok(readings) => {
                for reading in readings {
                    info!(
                        "[READ] {} {}={}",
                        device.id, reading.reading_type, reading.value
                    );
                }
            }
            Err(e) => {
                error!("[READ] {} failed: {}", device.id, e);
            }
        }
    }
}
