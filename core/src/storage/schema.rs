use crate::models::FavoriteItem;
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Version written by [`encode`]
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    items: &'a [FavoriteItem],
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    items: Vec<Value>,
}

/// Result of decoding a stored payload
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Payload in the current envelope format
    Current(Vec<FavoriteItem>),
    /// Unversioned array written by older clients
    Legacy(Vec<FavoriteItem>),
    /// Envelope with a version this build does not understand
    UnsupportedVersion(u32),
    /// Not a favorites payload at all
    Corrupt(String),
}

/// Serialize a collection into the current envelope format
pub fn encode(items: &[FavoriteItem]) -> Result<String> {
    let envelope = EnvelopeRef {
        version: SCHEMA_VERSION,
        items,
    };
    Ok(serde_json::to_string(&envelope)?)
}

pub fn decode(payload: &str) -> Decoded {
    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => return Decoded::Corrupt(e.to_string()),
    };

    match value {
        Value::Array(items) => Decoded::Legacy(collect_items(items)),
        Value::Object(_) => match serde_json::from_value::<Envelope>(value) {
            Ok(envelope) if envelope.version == SCHEMA_VERSION => {
                Decoded::Current(collect_items(envelope.items))
            }
            Ok(envelope) => Decoded::UnsupportedVersion(envelope.version),
            Err(e) => Decoded::Corrupt(e.to_string()),
        },
        other => Decoded::Corrupt(format!("unexpected top-level JSON value: {}", kind(&other))),
    }
}

/// Keep valid entries, first occurrence of each id wins
fn collect_items(values: Vec<Value>) -> Vec<FavoriteItem> {
    let mut seen = HashSet::new();
    let mut items = Vec::with_capacity(values.len());

    for (index, value) in values.into_iter().enumerate() {
        let item = match serde_json::from_value::<FavoriteItem>(value) {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!(index, error = %e, "Skipping unreadable stored favorite");
                continue;
            }
        };
        if let Err(e) = item.validate() {
            tracing::warn!(index, error = %e, "Skipping invalid stored favorite");
            continue;
        }
        if !seen.insert(item.id.clone()) {
            tracing::warn!(id = %item.id, "Dropping duplicate stored favorite");
            continue;
        }
        items.push(item);
    }

    items
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
