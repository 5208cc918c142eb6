//! JSON representation of watermark specs and template collections
//!
//! Decoding is lenient: each field that is missing, has the wrong type or is
//! out of range falls back to the corresponding field of a default spec,
//! and unknown keys are ignored. A damaged template therefore degrades
//! field by field instead of failing the whole load.

use crate::error::{Result, WatermarkError};
use crate::models::{Position, Rgb, WatermarkSpec, MAX_FONT_SIZE, MAX_OPACITY, ROTATION_RANGE};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Serialize a spec to its JSON object form
pub fn encode_spec(spec: &WatermarkSpec) -> Result<Value> {
    Ok(serde_json::to_value(spec)?)
}

/// Decode a spec, substituting `default`'s field wherever a field is unusable
pub fn decode_spec(value: &Value, default: &WatermarkSpec) -> WatermarkSpec {
    let Some(object) = value.as_object() else {
        debug!("Template record is not an object, using defaults");
        return default.clone();
    };

    let text = object
        .get("text")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| default.text.clone());

    let font_size_px = integer(object, "font_size")
        .and_then(|size| u32::try_from(size).ok())
        .filter(|size| (1..=MAX_FONT_SIZE).contains(size))
        .unwrap_or(default.font_size_px);

    let color = object
        .get("font_color")
        .and_then(decode_color)
        .unwrap_or(default.color);

    let opacity_pct = integer(object, "opacity")
        .filter(|opacity| (0..=i64::from(MAX_OPACITY)).contains(opacity))
        .map(|opacity| opacity as u8)
        .unwrap_or(default.opacity_pct);

    let position = object
        .get("position")
        .and_then(decode_position)
        .unwrap_or(default.position);

    let (min_rotation, max_rotation) = ROTATION_RANGE;
    let rotation_deg = integer(object, "rotation")
        .filter(|deg| (i64::from(min_rotation)..=i64::from(max_rotation)).contains(deg))
        .map(|deg| deg as i32)
        .unwrap_or(default.rotation_deg);

    WatermarkSpec {
        text,
        font_size_px,
        color,
        opacity_pct,
        position,
        rotation_deg,
    }
}

/// Serialize a name → spec collection as one JSON object
pub fn encode_templates(templates: &BTreeMap<String, WatermarkSpec>) -> Result<Value> {
    let mut object = Map::new();
    for (name, spec) in templates {
        object.insert(name.clone(), encode_spec(spec)?);
    }
    Ok(Value::Object(object))
}

/// Decode a name → spec collection; fails only if the root is not an object
pub fn decode_templates(
    value: &Value,
    default: &WatermarkSpec,
) -> Result<BTreeMap<String, WatermarkSpec>> {
    let object = value.as_object().ok_or_else(|| WatermarkError::Persistence {
        message: "Template collection must be a JSON object".to_string(),
    })?;

    Ok(object
        .iter()
        .map(|(name, record)| (name.clone(), decode_spec(record, default)))
        .collect())
}

/// Integer field, accepting whole-number floats such as `24.0`
fn integer(object: &Map<String, Value>, key: &str) -> Option<i64> {
    let value = object.get(key)?;
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < 1e12)
            .map(|f| f as i64)
    })
}

fn decode_color(value: &Value) -> Option<Rgb> {
    if let Some(hex) = value.as_str() {
        return hex.parse().ok();
    }
    let items = value.as_array()?;
    if items.len() != 3 {
        return None;
    }
    let mut channels = [0u8; 3];
    for (channel, item) in channels.iter_mut().zip(items) {
        *channel = u8::try_from(item.as_u64()?).ok()?;
    }
    Some(Rgb(channels))
}

fn decode_position(value: &Value) -> Option<Position> {
    let items = value.as_array()?;
    if items.len() != 2 {
        return None;
    }
    let x = i32::try_from(items[0].as_i64()?).ok()?;
    let y = i32::try_from(items[1].as_i64()?).ok()?;
    Some(Position::new(x, y))
}
