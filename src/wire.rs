// src/wire.rs - Remote pad touch messages, validated at the boundary
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::hud::TouchSample;

pub const WIRE_VERSION: u16 = 1;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message is not a JSON object")]
    NotAnObject,

    #[error("unsupported message version {0}")]
    UnsupportedVersion(u64),

    #[error("unknown message kind '{0}'")]
    UnknownKind(String),

    #[error("field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Versioned envelope: `{"v":1,"kind":"pad-coordinates","x":..,"y":..,"t":..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PadMessage {
    pub v: u16,
    #[serde(flatten)]
    pub payload: PadPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PadPayload {
    PadCoordinates { x: f64, y: f64, t: f64 },
}

impl PadMessage {
    pub fn touch(sample: &TouchSample) -> Self {
        Self {
            v: WIRE_VERSION,
            payload: PadPayload::PadCoordinates {
                x: sample.u,
                y: sample.v,
                t: sample.timestamp,
            },
        }
    }

    pub fn encode(&self) -> Result<String, WireError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Decodes either the versioned envelope or the legacy bare `{x, y, t}` map,
/// whose values may be numbers or numeric strings.
///
/// Out-of-range coordinates pass through; they are clamped where used.
pub fn decode_touch(text: &str) -> Result<TouchSample, WireError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(map) = value else {
        return Err(WireError::NotAnObject);
    };

    if let Some(version) = map.get("v") {
        let version = version.as_u64().ok_or(WireError::InvalidField {
            field: "v",
            reason: "expected an unsigned integer".to_string(),
        })?;
        if version != WIRE_VERSION as u64 {
            return Err(WireError::UnsupportedVersion(version));
        }
        match map.get("kind").and_then(Value::as_str) {
            Some("pad-coordinates") => {}
            Some(other) => return Err(WireError::UnknownKind(other.to_string())),
            None => {
                return Err(WireError::InvalidField {
                    field: "kind",
                    reason: "missing".to_string(),
                })
            }
        }
    }

    Ok(TouchSample {
        u: number_field(&map, "x")?,
        v: number_field(&map, "y")?,
        timestamp: number_field(&map, "t")?,
    })
}

fn number_field(map: &Map<String, Value>, field: &'static str) -> Result<f64, WireError> {
    let invalid = |reason: &str| WireError::InvalidField {
        field,
        reason: reason.to_string(),
    };
    let number = match map.get(field) {
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| invalid("not representable as f64"))?,
        Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|_| invalid("not a number"))?,
        Some(_) => return Err(invalid("expected a number")),
        None => return Err(invalid("missing")),
    };
    if !number.is_finite() {
        return Err(invalid("not finite"));
    }
    Ok(number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versioned_message_decodes() {
        let raw = r#"{"v":1,"kind":"pad-coordinates","x":0.25,"y":0.75,"t":1700000000.5}"#;
        let sample = decode_touch(raw).unwrap();
        assert_eq!(sample.u, 0.25);
        assert_eq!(sample.v, 0.75);
        assert_eq!(sample.timestamp, 1_700_000_000.5);
    }

    #[test]
    fn encode_then_decode_keeps_values() {
        let sample = TouchSample::new(0.1, 0.9, 42.0);
        let text = PadMessage::touch(&sample).encode().unwrap();
        assert!(text.contains(r#""kind":"pad-coordinates""#));
        assert_eq!(decode_touch(&text).unwrap(), sample);
    }

    #[test]
    fn legacy_string_values_are_accepted() {
        let sample = decode_touch(r#"{"x":"0.5","y":"1.5","t":"12.0"}"#).unwrap();
        assert_eq!(sample.u, 0.5);
        // out of range is kept; the HUD clamps it
        assert_eq!(sample.v, 1.5);
    }

    #[test]
    fn bad_messages_are_rejected() {
        assert!(matches!(decode_touch("[1,2]"), Err(WireError::NotAnObject)));
        assert!(matches!(
            decode_touch(r#"{"v":2,"kind":"pad-coordinates","x":0,"y":0,"t":0}"#),
            Err(WireError::UnsupportedVersion(2))
        ));
        assert!(matches!(
            decode_touch(r#"{"v":1,"kind":"core-motion","x":0,"y":0,"t":0}"#),
            Err(WireError::UnknownKind(_))
        ));
        assert!(matches!(
            decode_touch(r#"{"x":0.5,"t":1}"#),
            Err(WireError::InvalidField { field: "y", .. })
        ));
        assert!(matches!(
            decode_touch(r#"{"x":"NaN","y":0.5,"t":1}"#),
            Err(WireError::InvalidField { field: "x", .. })
        ));
        assert!(matches!(decode_touch("{nope"), Err(WireError::Json(_))));
    }
}
