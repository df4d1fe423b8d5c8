//! Client metrics definitions
//!
//! OpenTelemetry instruments describing one DDP client. They are only
//! created when observability is enabled through
//! `ClientBuilder::with_observability()`; otherwise the client records
//! nothing.
//!
//! # Metrics Collected
//!
//! - **connection.state**: current [`ConnectionState`] (gauge)
//! - **frames.sent**: outbound frames, by `msg` kind (counter)
//! - **events.received**: inbound events, by event kind (counter)
//! - **errors.total**: transport and lifecycle errors, by type (counter)
//! - **reconnection.attempts** / **reconnection.success** (counters)

use crate::connection::ConnectionState;
use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Meter},
    KeyValue,
};

/// Client metrics for monitoring
pub struct ClientMetrics {
    /// Connection state (0=disconnected, 1=connecting, 2=connected, 3=closed)
    pub connection_state: Gauge<i64>,
    pub frames_sent: Counter<u64>,
    pub events_received: Counter<u64>,
    pub errors_total: Counter<u64>,
    pub reconnection_attempts: Counter<u64>,
    pub reconnection_success: Counter<u64>,
}

impl ClientMetrics {
    /// Create metrics on the global meter named after the service
    pub fn new(service_name: impl Into<String>) -> Self {
        let name: &'static str = Box::leak(service_name.into().into_boxed_str());
        let meter = global::meter(name);
        Self::new_with_meter(&meter)
    }

    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            connection_state: meter
                .i64_gauge("ddp.client.connection.state")
                .with_description("Connection state (0=disconnected, 1=connecting, 2=connected, 3=closed)")
                .build(),
            frames_sent: meter
                .u64_counter("ddp.client.frames.sent")
                .with_description("Outbound frames written, by msg kind")
                .build(),
            events_received: meter
                .u64_counter("ddp.client.events.received")
                .with_description("Inbound events delivered to observers, by kind")
                .build(),
            errors_total: meter
                .u64_counter("ddp.client.errors.total")
                .with_description("Total number of errors encountered")
                .build(),
            reconnection_attempts: meter
                .u64_counter("ddp.client.reconnection.attempts")
                .with_description("Total number of reconnection attempts")
                .build(),
            reconnection_success: meter
                .u64_counter("ddp.client.reconnection.success")
                .with_description("Total number of successful reconnections")
                .build(),
        }
    }

    pub fn update_connection_state(&self, state: ConnectionState) {
        self.connection_state.record(state.as_metric(), &[]);
    }

    pub fn record_frame(&self, kind: &str) {
        self.frames_sent
            .add(1, &[KeyValue::new("msg", kind.to_string())]);
    }

    pub fn record_event(&self, kind: &'static str) {
        self.events_received.add(1, &[KeyValue::new("kind", kind)]);
    }

    pub fn record_error(&self, error_type: &'static str) {
        self.errors_total
            .add(1, &[KeyValue::new("error_type", error_type)]);
    }

    pub fn record_reconnection_attempt(&self) {
        self.reconnection_attempts.add(1, &[]);
    }

    pub fn record_reconnection_success(&self) {
        self.reconnection_success.add(1, &[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = ClientMetrics::new("ddp-test-client");

        // Without a configured provider these are no-ops; they must not panic
        metrics.update_connection_state(ConnectionState::Connected);
        metrics.record_frame("method");
        metrics.record_event("raw_message");
        metrics.record_error("websocket");
        metrics.record_reconnection_attempt();
        metrics.record_reconnection_success();
    }

    #[test]
    fn test_every_state_has_a_gauge_value() {
        let metrics = ClientMetrics::new("ddp-test-states");
        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Closed,
        ] {
            metrics.update_connection_state(state);
        }
    }
}
