mod client;

use anyhow::Result;
use armctl_shared::{Ack, Direction, PatternName, Target};
use client::{SenderConfig, SignalSender};
use std::time::Duration;
use tokio::time::sleep;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let mut config = SenderConfig::default();
    if let Some(target) = std::env::args().nth(1) {
        config.target = target;
    }
    info!("Sending commands to motor controller at {}", config.target);

    let mut sender = SignalSender::connect(&config).await?;

    let outcome = tokio::select! {
        result = run_demo(&mut sender) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted by user");
            Err(anyhow::anyhow!("interrupted"))
        }
    };

    if let Err(e) = outcome {
        error!("Demo aborted: {:#}", e);
        // The demo connection may be mid-command; use a fresh one to halt the motors
        make_safe(&config).await;
    }

    Ok(())
}

/// The standard demonstration sequence
async fn run_demo(sender: &mut SignalSender) -> Result<()> {
    info!("Enabling motors...");
    report("Enable both", sender.enable(Target::Both).await?);
    sleep(Duration::from_secs(1)).await;

    info!("Running default pattern...");
    report("Default pattern", sender.run_pattern(PatternName::Default).await?);
    sleep(Duration::from_secs(3)).await;

    info!("Rotating motor 1...");
    report(
        "Motor 1 rotation",
        sender.rotate(Target::Actuator1, 90.0, Direction::Clockwise).await?,
    );
    sleep(Duration::from_secs(2)).await;

    info!("Rotating motor 2...");
    report(
        "Motor 2 rotation",
        sender
            .rotate(Target::Actuator2, 90.0, Direction::CounterClockwise)
            .await?,
    );
    sleep(Duration::from_secs(2)).await;

    info!("Running alternate pattern...");
    report("Alternate pattern", sender.run_pattern(PatternName::Alternate).await?);
    sleep(Duration::from_secs(2)).await;

    info!("Disabling motors...");
    report("Disable both", sender.disable(Target::Both).await?);

    if let Ack::Ok { actuators } = sender.status().await? {
        for actuator in actuators {
            info!(
                "  Motor {}: {:?}, phase counter {}",
                actuator.id, actuator.power, actuator.phase_counter
            );
        }
    }

    Ok(())
}

async fn make_safe(config: &SenderConfig) {
    let mut sender = match SignalSender::connect(config).await {
        Ok(sender) => sender,
        Err(e) => {
            error!("Could not reach controller to disable motors: {:#}", e);
            return;
        }
    };

    if let Err(e) = sender.stop().await {
        error!("Failed to send stop: {:#}", e);
    }
    match sender.disable(Target::Both).await {
        Ok(ack) => report("Disable both", ack),
        Err(e) => error!("Failed to disable motors: {:#}", e),
    }
}

fn report(what: &str, ack: Ack) {
    match ack {
        Ack::Ok { .. } => info!("{} succeeded", what),
        Ack::Error { kind, message } => error!("{} failed ({:?}): {}", what, kind, message),
    }
}
