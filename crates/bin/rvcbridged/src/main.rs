//! # rvcbridged — rvcbridge daemon
//!
//! Composition root that wires the bus, the broker and the pipelines
//! together and runs them.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Load the RV-C spec registry and the entity mapping index, once,
//!   before anything starts
//! - Spawn the three activities: RX (SLCAN → decode → project →
//!   publish), command ingress (MQTT → candidate queue), and command
//!   egress (validate → encode → rate-limit → transmit, single FIFO
//!   worker)
//! - Handle graceful shutdown (SIGTERM/SIGINT), cancelling pending
//!   frame delays
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;
mod loader;

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

use rvcbridge_adapter_mqtt::MqttBridge;
use rvcbridge_adapter_slcan::SlcanClient;
use rvcbridge_app::event_bus::InProcessEventBus;
use rvcbridge_app::services::command_pipeline::CommandPipeline;
use rvcbridge_app::services::rate_limiter::RateLimiter;
use rvcbridge_app::services::rx_pipeline::RxPipeline;
use rvcbridge_app::services::transmitter::FrameTransmitter;
use rvcbridge_app::services::validator::CommandValidator;
use rvcbridge_domain::encode::CommandEncoder;

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Configuration
    let config = Config::load()?;

    // Logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    tracing::info!("configuration loaded");

    // Declarative inputs, loaded once for the process lifetime.
    let registry = Arc::new(loader::load_spec(&config.spec_file.spec)?);
    tracing::info!(
        path = %config.spec_file.spec,
        dgns = registry.dgn_count(),
        "spec registry ready"
    );

    let index = Arc::new(loader::load_mapping(&config.spec_file.mapping)?);
    tracing::info!(
        path = %config.spec_file.mapping,
        entities = index.len(),
        "entity mapping ready"
    );

    // Shared infrastructure
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let bus = Arc::new(InProcessEventBus::new(256));
    let slcan = Arc::new(SlcanClient::new(config.can.clone()));

    let (frame_tx, frame_rx) = mpsc::channel(256);
    let (command_tx, command_rx) = mpsc::channel(64);

    // RX activity: SLCAN lines → decode → project → publish.
    let rx_pipeline = Arc::new(RxPipeline::new(
        Arc::clone(&registry),
        Arc::clone(&index),
        Arc::clone(&bus),
    ));
    let rx_task = tokio::spawn({
        let rx_pipeline = Arc::clone(&rx_pipeline);
        async move { rx_pipeline.run(frame_rx).await }
    });
    let slcan_task = tokio::spawn({
        let slcan = Arc::clone(&slcan);
        let shutdown = shutdown_rx.clone();
        async move { slcan.run(frame_tx, shutdown).await }
    });

    // Command egress: single FIFO worker.
    let pipeline = Arc::new(CommandPipeline::new(
        Arc::clone(&index),
        CommandValidator::new(Arc::clone(&index), config.command.policy()),
        RateLimiter::new(
            config.command.global_rate,
            config.command.entity_rate,
            config.command.cooldown(),
        ),
        CommandEncoder::new(config.command.source_address),
        FrameTransmitter::new(
            Arc::clone(&slcan),
            config.command.retry_count,
            config.command.retry_delay(),
            shutdown_rx.clone(),
        ),
        Arc::clone(&bus),
    ));
    let egress_task = tokio::spawn({
        let pipeline = Arc::clone(&pipeline);
        async move { pipeline.run(command_rx).await }
    });

    // Command ingress + event egress toward the broker.
    let mqtt = Arc::new(MqttBridge::new(config.mqtt.clone(), Arc::clone(&index)));
    let mqtt_task = tokio::spawn({
        let mqtt = Arc::clone(&mqtt);
        let shutdown = shutdown_rx.clone();
        let events = bus.subscribe();
        async move {
            if let Err(err) = mqtt.run(command_tx, events, shutdown).await {
                tracing::error!(error = %err, "MQTT bridge failed");
            }
        }
    });

    tracing::info!("rvcbridged running");

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    // Give the activities a moment to drain and say goodbye.
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        let _ = mqtt_task.await;
        let _ = slcan_task.await;
        let _ = egress_task.await;
        rx_task.abort();
    })
    .await;

    tracing::info!("shutdown complete");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl-C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
