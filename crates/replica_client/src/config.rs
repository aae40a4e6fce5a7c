//! Configuration for the replica client.

use replica_protocol::PROTOCOL_VERSION;

/// Configuration for a replica client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Protocol version presented to the server.
    pub protocol_version: u16,
    /// Largest accepted server payload, in bytes.
    pub max_message_size: usize,
}

impl ClientConfig {
    /// Creates a configuration with default limits.
    pub fn new() -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            max_message_size: 16 * 1024 * 1024,
        }
    }

    /// Sets the protocol version.
    pub fn with_protocol_version(mut self, version: u16) -> Self {
        self.protocol_version = version;
        self
    }

    /// Sets the largest accepted server payload.
    pub fn with_max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_config_builder() {
        let config = ClientConfig::new()
            .with_protocol_version(3)
            .with_max_message_size(1024);
        assert_eq!(config.protocol_version, 3);
        assert_eq!(config.max_message_size, 1024);
        assert_eq!(ClientConfig::default().protocol_version, PROTOCOL_VERSION);
    }
}
