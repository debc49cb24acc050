//! hearth-listen: connects to the relay as `REALTIME_USER_ID` and logs
//! every inbound envelope until interrupted.

use hearth_realtime::client::{ConnectionState, RealtimeClient};
use hearth_realtime::config::ClientConfig;
use hearth_realtime::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    let config = ClientConfig::from_env();
    let user = std::env::var("REALTIME_USER_ID").unwrap_or_default();

    let client = RealtimeClient::new(&config)?;
    let _listener = client.on_message(|envelope| {
        tracing::info!(kind = envelope.kind(), body = %envelope.to_value(), "inbound envelope");
        Ok(())
    });

    let mut status = client.subscribe_status();
    client.connect(user)?;
    tracing::info!(endpoint = client.endpoint(), "connecting");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = *status.borrow_and_update();
                tracing::info!(state = %snapshot.state, attempts = snapshot.reconnect_attempts, "status");
                if snapshot.exhausted && snapshot.state == ConnectionState::Disconnected {
                    tracing::error!("relay unreachable; giving up");
                    break;
                }
            }
        }
    }

    client.disconnect().await;
    Ok(())
}
