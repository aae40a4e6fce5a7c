//! Vectors command implementation.

use super::CliError;
use replica_testkit::{all_vectors_json, message_vectors};

/// Prints the wire-format test vectors.
pub fn run(json: bool) -> Result<(), CliError> {
    if json {
        println!("{}", all_vectors_json());
        return Ok(());
    }
    for vector in message_vectors() {
        let message = super::decode::decode_hex(&vector.input_hex)?;
        println!("{:<24} {}", vector.id, super::describe(&message));
    }
    Ok(())
}
