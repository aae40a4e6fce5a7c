//! Server configuration.

use replica_protocol::PROTOCOL_VERSION;

/// Configuration for the replication server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Protocol version clients must present when requesting data.
    pub protocol_version: u16,
    /// Largest accepted client payload, in bytes.
    pub max_incoming_message_bytes: usize,
    /// Largest accepted argument count of a client custom message.
    pub max_custom_args: usize,
    /// Whether custom messages sent over the unreliable channel are delivered.
    pub accept_unreliable_client_events: bool,
}

impl ServerConfig {
    /// Creates a configuration with default limits.
    pub fn new() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            max_incoming_message_bytes: 64 * 1024,
            max_custom_args: 32,
            accept_unreliable_client_events: true,
        }
    }

    /// Sets the expected protocol version.
    pub fn with_protocol_version(mut self, version: u16) -> Self {
        self.protocol_version = version;
        self
    }

    /// Sets the largest accepted client payload.
    pub fn with_max_incoming_message_bytes(mut self, bytes: usize) -> Self {
        self.max_incoming_message_bytes = bytes;
        self
    }

    /// Sets the largest accepted custom message argument count.
    pub fn with_max_custom_args(mut self, count: usize) -> Self {
        self.max_custom_args = count;
        self
    }

    /// Sets whether unreliable client events are delivered.
    pub fn with_unreliable_client_events(mut self, accept: bool) -> Self {
        self.accept_unreliable_client_events = accept;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.protocol_version, PROTOCOL_VERSION);
        assert_eq!(config.max_incoming_message_bytes, 64 * 1024);
        assert!(config.accept_unreliable_client_events);
    }

    #[test]
    fn config_builder() {
        let config = ServerConfig::new()
            .with_protocol_version(7)
            .with_max_incoming_message_bytes(512)
            .with_max_custom_args(4)
            .with_unreliable_client_events(false);

        assert_eq!(config.protocol_version, 7);
        assert_eq!(config.max_incoming_message_bytes, 512);
        assert_eq!(config.max_custom_args, 4);
        assert!(!config.accept_unreliable_client_events);
    }
}
