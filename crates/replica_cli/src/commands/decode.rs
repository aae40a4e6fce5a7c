//! Decode command implementation.

use super::{describe, to_json, CliError, Format};
use replica_protocol::ReplicaMessage;
use replica_testkit::hex_decode;

/// Runs the decode command on a hex-encoded payload.
pub fn run(hex: &str, format: Format) -> Result<(), CliError> {
    let message = decode_hex(hex)?;
    tracing::debug!(kind = message.kind(), "payload decoded");
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&to_json(&message)?)?),
        Format::Text => println!("{}", describe(&message)),
    }
    Ok(())
}

/// Decodes a hex-encoded wire payload.
pub fn decode_hex(hex: &str) -> Result<ReplicaMessage, CliError> {
    let bytes = hex_decode(hex).ok_or(CliError::InvalidHex)?;
    Ok(ReplicaMessage::decode(&bytes)?)
}
