//! JSON codec for session records.
//!
//! Stored records are loosely typed: older writers emitted `content` as a list
//! of typed blocks instead of a plain string, and role strings are not
//! guaranteed to be one we know. Decoding accepts both shapes; encoding always
//! produces the canonical flat form.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::message::{Content, ContentBlock, Message, Role, SessionRecord, DEFAULT_MODEL};

/// The stored bytes are not a well-formed session record.
#[derive(Debug, Error)]
#[error("malformed session record")]
pub struct DecodeError(#[from] serde_json::Error);

#[derive(Debug, Deserialize)]
struct StoredRecord {
    #[serde(default)]
    messages: Option<Vec<StoredMessage>>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StoredMessage {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Value,
}

#[derive(Debug, Serialize)]
struct CanonicalRecord<'a> {
    messages: &'a [Message],
    model: &'a str,
}

/// Interpret a raw `content` value.
fn parse_content(raw: Value) -> Content {
    match raw {
        Value::String(text) => Content::PlainText(text),
        Value::Array(items) => Content::Blocks(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(mut map) => Some(ContentBlock {
                        kind: map
                            .get("type")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        text: match map.remove("text") {
                            Some(Value::String(text)) => Some(text),
                            _ => None,
                        },
                    }),
                    _ => None,
                })
                .collect(),
        ),
        _ => Content::PlainText(String::new()),
    }
}

/// Parse a stored record.
pub fn decode(bytes: &[u8]) -> Result<SessionRecord, DecodeError> {
    let stored: StoredRecord = serde_json::from_slice(bytes)?;

    let messages = stored
        .messages
        .unwrap_or_default()
        .into_iter()
        .map(|m| Message {
            role: Role::parse_lenient(m.role.as_deref().unwrap_or_default()),
            content: parse_content(m.content).flatten(),
        })
        .collect();

    Ok(SessionRecord {
        messages,
        model: stored.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
    })
}

/// Serialize a record into its canonical form.
pub fn encode(record: &SessionRecord) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&CanonicalRecord {
        messages: &record.messages,
        model: &record.model,
    })
}
