//! Signaling frame layout
//!
//! Every websocket text frame is `<name>;<payload>`. The name never contains
//! the separator, so a frame is split at its first `;` and the payload may
//! contain any number of further separators.

use serde::Serialize;
use voice_core::Error;

pub const SEPARATOR: char = ';';

/// Outbound payload: raw text is sent verbatim, anything else as JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Json(serde_json::Value),
}

impl Payload {
    /// Serialize any value as a JSON payload
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, Error> {
        Ok(Payload::Json(serde_json::to_value(value)?))
    }

    pub fn into_text(self) -> Result<String, Error> {
        match self {
            Payload::Text(text) => Ok(text),
            Payload::Json(value) => Ok(serde_json::to_string(&value)?),
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Json(value)
    }
}

/// Reject packet names that would corrupt the frame layout
pub fn validate_name(name: &str) -> Result<(), Error> {
    if name.contains(SEPARATOR) {
        return Err(Error::Framing(format!(
            "packet name '{}' may not contain '{}'",
            name, SEPARATOR
        )));
    }
    Ok(())
}

pub fn encode_frame(name: &str, payload: &str) -> Result<String, Error> {
    validate_name(name)?;
    let mut frame = String::with_capacity(name.len() + 1 + payload.len());
    frame.push_str(name);
    frame.push(SEPARATOR);
    frame.push_str(payload);
    Ok(frame)
}

/// Split a frame into `(name, payload)` at the first separator
pub fn split_frame(frame: &str) -> Result<(&str, &str), Error> {
    frame
        .split_once(SEPARATOR)
        .ok_or_else(|| Error::Framing(format!("frame has no '{}' separator", SEPARATOR)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_at_first_separator() {
        let (name, payload) = split_frame("handIce;{\"candidate\":\"a;b\"}").unwrap();
        assert_eq!(name, "handIce");
        assert_eq!(payload, "{\"candidate\":\"a;b\"}");

        let (name, payload) = split_frame("requestOffer;").unwrap();
        assert_eq!(name, "requestOffer");
        assert_eq!(payload, "");
    }

    #[test]
    fn missing_separator_is_a_framing_error() {
        assert!(matches!(split_frame("keepAlive"), Err(Error::Framing(_))));
    }

    #[test]
    fn encode_rejects_separator_in_name() {
        assert_eq!(encode_frame("a", "b").unwrap(), "a;b");
        assert!(matches!(encode_frame("a;b", "c"), Err(Error::Framing(_))));
    }

    #[test]
    fn payload_text_and_json() {
        assert_eq!(Payload::from("raw").into_text().unwrap(), "raw");
        let json = Payload::json(&serde_json::json!({"playerID": "p1"})).unwrap();
        assert_eq!(json.into_text().unwrap(), r#"{"playerID":"p1"}"#);
    }
}
