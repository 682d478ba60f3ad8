use anyhow::Context;
use arm_controller::actuator::{ActuatorRegistry, SimPin};
use arm_controller::command::{DispatchSettings, Dispatcher};
use arm_controller::config::{ControllerConfig, LISTEN_ENV};
use arm_controller::session;
use std::sync::Arc;
use tokio::net::TcpListener;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = ControllerConfig::default()
        .with_listen_override(std::env::var(LISTEN_ENV).ok(), std::env::args().nth(1));

    info!("Arm controller starting");
    info!(
        "  Actuator 1: coils {:?}, enable {}",
        config.actuator1.coils, config.actuator1.enable
    );
    info!(
        "  Actuator 2: coils {:?}, enable {}",
        config.actuator2.coils, config.actuator2.enable
    );
    info!("  Step delay: {:?}", config.step_delay);

    let registry = Arc::new(
        ActuatorRegistry::from_config(&config, SimPin::new)
            .context("failed to initialise actuators")?,
    );
    let dispatcher = Arc::new(Dispatcher::new(
        registry.clone(),
        DispatchSettings::from(&config),
    ));

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!("Listening for commands on {}", config.listen_addr);

    tokio::select! {
        _ = session::serve(listener, dispatcher) => {}
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!("Failed to wait for shutdown signal: {}", e);
            }
            info!("Shutting down...");
        }
    }

    registry.shutdown().await;
    Ok(())
}
