//! # printbridge Telemetry
//!
//! Publishes status snapshots to an MQTT broker. The contract is
//! fire-and-forget: a broker that is unreachable at startup is fatal,
//! but once the bridge is running, publish failures are the caller's
//! to log and skip. The printer side never waits on the bus.

use printbridge_core::StatusSnapshot;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// MQTT connection and topic settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Broker hostname or address
    pub host: String,
    /// Broker port
    pub port: u16,
    /// Client identifier presented to the broker
    pub client_id: String,
    /// Topic the snapshots are published on
    pub topic: String,
    /// Optional credentials; both must be present to be used
    pub username: Option<String>,
    pub password: Option<String>,
    /// Keep-alive interval in seconds
    pub keep_alive_secs: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "printbridge".to_string(),
            topic: "printbridge/status".to_string(),
            username: None,
            password: None,
            keep_alive_secs: 30,
        }
    }
}

/// Telemetry transport error type
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The broker connection failed or was lost during the handshake.
    #[error("MQTT connection failed: {0}")]
    Broker(#[from] rumqttc::ConnectionError),

    /// The broker answered the handshake with a non-success code.
    #[error("MQTT broker rejected the connection: {code}")]
    Rejected {
        /// The CONNACK return code, as reported by the broker.
        code: String,
    },

    /// The client request could not be queued.
    #[error("MQTT publish failed: {0}")]
    Client(#[from] rumqttc::ClientError),

    /// The snapshot could not be serialized to JSON.
    #[error("Snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Fire-and-forget snapshot publisher over MQTT
pub struct TelemetryPublisher {
    client: AsyncClient,
    topic: String,
}

impl TelemetryPublisher {
    /// Connect to the broker and start the background event loop
    ///
    /// Blocks until the broker acknowledges the connection; a failure
    /// here is fatal to bridge startup. After that the event loop runs
    /// in a spawned task and connection troubles are only logged.
    pub async fn connect(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, mut event_loop) = AsyncClient::new(options, 16);

        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code != ConnectReturnCode::Success {
                        return Err(TelemetryError::Rejected {
                            code: format!("{:?}", ack.code),
                        });
                    }
                    tracing::info!(host = %config.host, port = config.port, "Connected to MQTT broker");
                    break;
                }
                Ok(_) => {}
                Err(e) => return Err(e.into()),
            }
        }

        tokio::spawn(async move {
            loop {
                if let Err(e) = event_loop.poll().await {
                    tracing::warn!("MQTT connection error: {}", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        });

        Ok(Self {
            client,
            topic: config.topic.clone(),
        })
    }

    /// Publish one snapshot as JSON at QoS 0
    pub async fn publish(&self, snapshot: &StatusSnapshot) -> Result<(), TelemetryError> {
        let payload = serde_json::to_vec(snapshot)?;
        self.client
            .publish(self.topic.as_str(), QoS::AtMostOnce, false, payload)
            .await?;
        tracing::debug!(topic = %self.topic, "Published status snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_to_anonymous_local_broker() {
        let config = TelemetryConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 1883);
        assert!(config.username.is_none());
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let config: TelemetryConfig =
            serde_json::from_str(r#"{"host": "broker.lan", "topic": "workshop/printer"}"#).unwrap();
        assert_eq!(config.host, "broker.lan");
        assert_eq!(config.topic, "workshop/printer");
        assert_eq!(config.port, 1883);
        assert_eq!(config.keep_alive_secs, 30);
    }
}
