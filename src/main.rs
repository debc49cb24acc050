//! hearth-realtime relay server entry point.
//!
//! Starts the Axum HTTP server with the `/ws` relay and REST endpoints.

use hearth_realtime::app::build_app;
use hearth_realtime::app_state::AppState;
use hearth_realtime::config::GatewayConfig;
use hearth_realtime::domain::RelayBus;
use hearth_realtime::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    // Load configuration
    let config = GatewayConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, "starting hearth-realtime");

    let state = AppState {
        bus: RelayBus::new(config.event_bus_capacity),
        auth_timeout: config.auth_timeout,
    };
    let app = build_app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
