//! CLI command implementations.

pub mod decode;
pub mod simulate;
pub mod vectors;

use replica_codec::{CodecError, Value};
use replica_protocol::ReplicaMessage;
use thiserror::Error;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Input was not valid hexadecimal.
    #[error("invalid hex input")]
    InvalidHex,

    /// Payload could not be decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Output could not be rendered as JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A scripted replication step failed.
    #[error("simulation failed: {0}")]
    Simulation(String),
}

/// Output format shared by commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    /// Human-readable lines.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// One-line description of a message.
pub fn describe(message: &ReplicaMessage) -> String {
    match message {
        ReplicaMessage::RequestData { protocol_version } => {
            format!("request_data version={protocol_version}")
        }
        ReplicaMessage::Create(create) => format!(
            "create id={} token={} parent={} lib={} data={}",
            create.id,
            create.token,
            create.parent.map_or_else(|| "-".to_string(), |p| p.to_string()),
            create.write_lib.as_deref().unwrap_or("-"),
            render(&create.data),
        ),
        ReplicaMessage::Set { id, path, value } => {
            format!("set id={id} path={path} value={}", render(value))
        }
        ReplicaMessage::SetValues { id, path, values } => {
            let values: Vec<String> = values
                .iter()
                .map(|(k, v)| format!("{k}={}", render(v)))
                .collect();
            format!("set_values id={id} path={path} values=[{}]", values.join(", "))
        }
        ReplicaMessage::TableInsert {
            id,
            path,
            value,
            index,
        } => format!(
            "table_insert id={id} path={path} index={index} value={}",
            render(value)
        ),
        ReplicaMessage::TableRemove { id, path, index } => {
            format!("table_remove id={id} path={path} index={index}")
        }
        ReplicaMessage::Write { id, mutator, args } => {
            format!("write id={id} mutator={mutator} args={}", render_all(args))
        }
        ReplicaMessage::Reparent { id, parent } => format!(
            "reparent id={id} parent={}",
            parent.map_or_else(|| "-".to_string(), |p| p.to_string())
        ),
        ReplicaMessage::Destroy { id } => format!("destroy id={id}"),
        ReplicaMessage::Custom { id, args } => {
            format!("custom id={id} args={}", render_all(args))
        }
    }
}

/// JSON form of a message: its wire document.
pub fn to_json(message: &ReplicaMessage) -> Result<serde_json::Value, CliError> {
    Ok(serde_json::to_value(message.to_value()?)?)
}

fn render(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("{value:?}"))
}

fn render_all(values: &[Value]) -> String {
    let rendered: Vec<String> = values.iter().map(render).collect();
    format!("[{}]", rendered.join(", "))
}
