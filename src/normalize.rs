//! Map heterogeneous upstream payloads into [`Section`] and [`MediaItem`].
//!
//! The media server and the analytics service describe the same things with
//! different field names (`key` vs `section_id`, `addedAt` vs `added_at`,
//! numbers sometimes encoded as strings). All of that is resolved here so the
//! rest of the crate works with one schema.

use anyhow::{anyhow, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::models::{MediaItem, MediaKind, Section};

/// First present, non-null field among `names`.
fn field<'a>(obj: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|n| obj.get(*n))
        .find(|v| !v.is_null())
}

fn string_field(obj: &Value, names: &[&str]) -> Option<String> {
    match field(obj, names)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn int_field(obj: &Value, names: &[&str]) -> Option<i64> {
    match field(obj, names)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn timestamp_field(obj: &Value, names: &[&str]) -> Option<DateTime<Utc>> {
    match field(obj, names)? {
        Value::String(s) => {
            if let Ok(secs) = s.trim().parse::<i64>() {
                return Utc.timestamp_opt(secs, 0).single();
            }
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        }
        Value::Number(n) => n.as_i64().and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        _ => None,
    }
}

/// Unwrap `{"MediaContainer": {<list_key>: [...]}}`, `{"response": {"data":
/// [...]}}`, `{"response": {"data": {<list_key>: [...]}}}` or a bare array
/// into a list of records.
pub fn records<'a>(payload: &'a Value, list_keys: &[&str]) -> Vec<&'a Value> {
    if let Value::Array(items) = payload {
        return items.iter().collect();
    }
    let container = payload
        .get("MediaContainer")
        .or_else(|| payload.get("response"))
        .unwrap_or(payload);
    for key in list_keys {
        match container.get(*key) {
            Some(Value::Array(items)) => return items.iter().collect(),
            Some(inner @ Value::Object(_)) => {
                if let Some(Value::Array(items)) =
                    list_keys.iter().find_map(|k| inner.get(*k))
                {
                    return items.iter().collect();
                }
            }
            _ => {}
        }
    }
    Vec::new()
}

pub fn section(raw: &Value) -> Result<Section> {
    let id = string_field(raw, &["key", "section_id", "id"])
        .ok_or_else(|| anyhow!("section record has no id"))?;
    let name = string_field(raw, &["title", "section_name", "name"]).unwrap_or_else(|| id.clone());
    let kind = string_field(raw, &["type", "section_type", "mediaKind"])
        .map(|k| MediaKind::parse(&k))
        .unwrap_or(MediaKind::Unknown);
    let item_count = int_field(raw, &["count", "totalSize", "item_count", "size"]).unwrap_or(0);

    Ok(Section {
        id,
        name,
        media_kind: kind,
        item_count,
    })
}

pub fn sections(payload: &Value) -> Vec<Section> {
    records(payload, &["Directory", "data", "sections"])
        .into_iter()
        .filter_map(|raw| match section(raw) {
            Ok(s) => Some(s),
            Err(e) => {
                tracing::warn!("Skipping malformed section record: {}", e);
                None
            }
        })
        .collect()
}

/// Normalize one item record.
///
/// `fallback_section` is used when the record does not carry its own section
/// id (the recently-added endpoint often omits it).
pub fn media_item(raw: &Value, fallback_section: Option<&str>, complete: bool) -> Result<MediaItem> {
    let rating_key = string_field(raw, &["ratingKey", "rating_key", "id"])
        .ok_or_else(|| anyhow!("item record has no rating key"))?;
    let title = string_field(raw, &["title", "full_title", "name"]).unwrap_or_default();
    let subtitle = string_field(raw, &["grandparentTitle", "parentTitle", "grandparent_title"]);
    let media_type = string_field(raw, &["type", "media_type"]).unwrap_or_else(|| "unknown".to_string());
    let section_id = string_field(raw, &["librarySectionID", "section_id", "sectionId"])
        .or_else(|| fallback_section.map(str::to_string))
        .ok_or_else(|| anyhow!("item {} has no section id", rating_key))?;
    let added_at = timestamp_field(raw, &["addedAt", "added_at"])
        .ok_or_else(|| anyhow!("item {} has no added timestamp", rating_key))?;
    let thumb = string_field(raw, &["thumb", "grandparentThumb", "parentThumb"]);
    let summary = string_field(raw, &["summary"]);
    let year = int_field(raw, &["year"]).and_then(|y| i32::try_from(y).ok());
    let duration_ms = int_field(raw, &["duration"]);

    Ok(MediaItem {
        rating_key,
        title,
        subtitle,
        media_type,
        section_id,
        added_at,
        metadata_complete: complete,
        poster_ref: None,
        thumb,
        summary,
        year,
        duration_ms,
    })
}

/// Normalize a recently-added listing into stubs, newest first.
pub fn stubs(payload: &Value, section_id: &str) -> Vec<MediaItem> {
    let mut items: Vec<MediaItem> = records(payload, &["Metadata", "data", "recently_added"])
        .into_iter()
        .filter_map(|raw| match media_item(raw, Some(section_id), false) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!("Skipping malformed item in section {}: {}", section_id, e);
                None
            }
        })
        .collect();
    items.sort_by(|a, b| b.added_at.cmp(&a.added_at));
    items
}
