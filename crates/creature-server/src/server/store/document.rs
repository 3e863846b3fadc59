//! Mapping from stored documents to [`Creature`] messages.
//!
//! Documents are schemaless, so every field is optional:
//!
//! - `id` comes from `_id` (a string, an extended-JSON `{"$oid": ..}`, or a
//!   number), falling back to `id`.
//! - `name` comes from `name`, falling back to `title`.
//! - `channel_offset` and `audio_channel` must be non-negative integers that
//!   fit in a `u32`; anything else reads as 0.
//! - `notes` comes from `notes`.

use super::Document;
use creature_core::proto::Creature;
use serde_json::Value;

pub fn creature_from_document(document: &Document) -> Creature {
    Creature {
        id: document_id(document).unwrap_or_default(),
        name: string_field(document, "name")
            .or_else(|| string_field(document, "title"))
            .unwrap_or_default(),
        channel_offset: u32_field(document, "channel_offset"),
        audio_channel: u32_field(document, "audio_channel"),
        notes: string_field(document, "notes").unwrap_or_default(),
    }
}

fn document_id(document: &Document) -> Option<String> {
    let id = document.get("_id").or_else(|| document.get("id"))?;
    match id {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        Value::Object(id) => id.get("$oid").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn string_field(document: &Document, field: &str) -> Option<String> {
    document
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn u32_field(document: &Document, field: &str) -> u32 {
    document
        .get(field)
        .and_then(Value::as_u64)
        .and_then(|value| u32::try_from(value).ok())
        .unwrap_or_default()
}
