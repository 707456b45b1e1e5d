//! The `Message` record and its JSON codec.
//!
//! A `Message` is immutable once constructed — every field is private and
//! there is no setter. The four required flags (`ABORT`, `QDM`, `STAB`,
//! `LAUNCH`) are normalized to `0`/`1` at construction time; booleans are
//! coerced, anything else is a [`ComsError::Type`].

mod error;

use std::fmt;

pub use error::ComsError;
use serde::Serialize;
use serde_json::{Map, Value};

/// A keyed telemetry/command payload. `None` means the field was absent.
pub type DataMap = Map<String, Value>;

/// An immutable command/telemetry record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    #[serde(rename = "ABORT")]
    abort: u8,
    #[serde(rename = "QDM")]
    qdm: u8,
    #[serde(rename = "STAB")]
    stab: u8,
    #[serde(rename = "LAUNCH")]
    launch: u8,
    #[serde(rename = "ARMED")]
    armed: Option<u8>,
    #[serde(rename = "DATA")]
    data: Option<DataMap>,
}

/// Builder-style constructor arguments, since every field but the four
/// required flags is optional.
#[derive(Debug, Clone, Default)]
pub struct MessageFields {
    pub abort: bool,
    pub qdm: bool,
    pub stab: bool,
    pub launch: bool,
    pub armed: Option<bool>,
    pub data: Option<DataMap>,
}

impl Message {
    /// Construct directly from already-validated flags. Infallible: use
    /// [`Message::from_dict`] or [`Message::from_string`] when the inputs
    /// come from an untrusted source.
    pub fn new(fields: MessageFields) -> Self {
        Message {
            abort: fields.abort as u8,
            qdm: fields.qdm as u8,
            stab: fields.stab as u8,
            launch: fields.launch as u8,
            armed: fields.armed.map(|b| b as u8),
            data: fields.data,
        }
    }

    /// Build a `Message` from a parsed JSON object.
    ///
    /// Booleans in the four required fields are coerced to `0`/`1`; any
    /// other non-integer value is a [`ComsError::Type`]. A missing required
    /// field, or a `DATA` that is neither an object nor absent, is a
    /// [`ComsError::Parse`].
    pub fn from_dict(map: Map<String, Value>) -> Result<Self, ComsError> {
        let abort = required_flag(&map, "ABORT")?;
        let qdm = required_flag(&map, "QDM")?;
        let stab = required_flag(&map, "STAB")?;
        let launch = required_flag(&map, "LAUNCH")?;
        let armed = optional_flag(&map, "ARMED")?;
        let data = match map.get("DATA") {
            None | Some(Value::Null) => None,
            Some(Value::Object(obj)) => Some(obj.clone()),
            Some(other) => {
                return Err(ComsError::parse(format!(
                    "DATA must be an object or absent, got: {other}"
                )));
            }
        };

        Ok(Message {
            abort,
            qdm,
            stab,
            launch,
            armed,
            data,
        })
    }

    /// Parse a JSON string into a `Message`. A JSON syntax
    /// error or a non-object top level is a [`ComsError::Parse`]; a field
    /// coercion failure is a [`ComsError::Type`].
    pub fn from_string(s: &str) -> Result<Self, ComsError> {
        let value: Value = serde_json::from_str(s).map_err(ComsError::parse)?;
        match value {
            Value::Object(map) => Message::from_dict(map),
            other => Err(ComsError::parse(format!(
                "expected a JSON object, got: {other}"
            ))),
        }
    }

    /// The four required flags and `ARMED`, normalized to `0`/`1`.
    pub fn abort(&self) -> u8 {
        self.abort
    }
    pub fn qdm(&self) -> u8 {
        self.qdm
    }
    pub fn stab(&self) -> u8 {
        self.stab
    }
    pub fn launch(&self) -> u8 {
        self.launch
    }
    pub fn armed(&self) -> Option<u8> {
        self.armed
    }
    pub fn data(&self) -> Option<&DataMap> {
        self.data.as_ref()
    }

    /// Look up a field by its wire name, e.g. `msg.get("STAB")`, for callers
    /// that want to treat a message generically.
    pub fn get(&self, field: &str) -> Option<Value> {
        match field {
            "ABORT" => Some(Value::from(self.abort)),
            "QDM" => Some(Value::from(self.qdm)),
            "STAB" => Some(Value::from(self.stab)),
            "LAUNCH" => Some(Value::from(self.launch)),
            "ARMED" => Some(self.armed.map_or(Value::Null, Value::from)),
            "DATA" => Some(self.data.clone().map_or(Value::Null, Value::Object)),
            _ => None,
        }
    }
}

impl fmt::Display for Message {
    /// JSON encoding with the wire field names, including absent optional
    /// fields as `null`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&encoded)
    }
}

fn required_flag(map: &Map<String, Value>, key: &str) -> Result<u8, ComsError> {
    match map.get(key) {
        None => Err(ComsError::parse(format!("missing required field: {key}"))),
        Some(v) => coerce_flag(v, key),
    }
}

fn optional_flag(map: &Map<String, Value>, key: &str) -> Result<Option<u8>, ComsError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => coerce_flag(v, key).map(Some),
    }
}

fn coerce_flag(v: &Value, key: &str) -> Result<u8, ComsError> {
    match v {
        Value::Bool(b) => Ok(*b as u8),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Ok(0),
            Some(1) => Ok(1),
            _ => Err(ComsError::type_err(format!(
                "{key} must be 0, 1, or a boolean, got: {n}"
            ))),
        },
        other => Err(ComsError::type_err(format!(
            "{key} must be either a boolean or an int, got: {other}"
        ))),
    }
}

/// Anything [`construct_message`] knows how to turn into a [`Message`].
pub enum ComsInput {
    Message(Message),
    Json(String),
    Map(Map<String, Value>),
}

impl From<Message> for ComsInput {
    fn from(m: Message) -> Self {
        ComsInput::Message(m)
    }
}

impl From<String> for ComsInput {
    fn from(s: String) -> Self {
        ComsInput::Json(s)
    }
}

impl From<&str> for ComsInput {
    fn from(s: &str) -> Self {
        ComsInput::Json(s.to_owned())
    }
}

impl From<Map<String, Value>> for ComsInput {
    fn from(m: Map<String, Value>) -> Self {
        ComsInput::Map(m)
    }
}

/// Dispatches to the correct constructor for whatever was handed in.
pub fn construct_message(input: impl Into<ComsInput>) -> Result<Message, ComsError> {
    match input.into() {
        ComsInput::Message(m) => Ok(m),
        ComsInput::Json(s) => Message::from_string(&s),
        ComsInput::Map(m) => Message::from_dict(m),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r##"{"ABORT":0,"QDM":0,"STAB":1,"LAUNCH":1,"ARMED":1,"DATA":{"msg":"#1"}}"##
    }

    #[test]
    fn round_trip_preserves_fields() {
        let m = Message::from_string(sample_json()).unwrap();
        let back = Message::from_string(&m.to_string()).unwrap();
        assert_eq!(m, back);
    }

    #[test]
    fn booleans_coerce_to_integers() {
        let json = r#"{"ABORT":true,"QDM":false,"STAB":true,"LAUNCH":false}"#;
        let m = Message::from_string(json).unwrap();
        assert_eq!(m.abort(), 1);
        assert_eq!(m.qdm(), 0);
        assert_eq!(m.stab(), 1);
        assert_eq!(m.launch(), 0);
    }

    #[test]
    fn missing_required_field_is_parse_error() {
        let json = r#"{"QDM":0,"STAB":0,"LAUNCH":0}"#;
        let err = Message::from_string(json).unwrap_err();
        assert!(matches!(err, ComsError::Parse(_)));
    }

    #[test]
    fn non_integer_flag_is_type_error() {
        let json = r#"{"ABORT":"yes","QDM":0,"STAB":0,"LAUNCH":0}"#;
        let err = Message::from_string(json).unwrap_err();
        assert!(matches!(err, ComsError::Type(_)));
    }

    #[test]
    fn out_of_range_integer_flag_is_type_error() {
        let json = r#"{"ABORT":2,"QDM":0,"STAB":0,"LAUNCH":0}"#;
        let err = Message::from_string(json).unwrap_err();
        assert!(matches!(err, ComsError::Type(_)));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let err = Message::from_string("{not json").unwrap_err();
        assert!(matches!(err, ComsError::Parse(_)));
    }

    #[test]
    fn non_object_data_is_rejected() {
        let json = r#"{"ABORT":0,"QDM":0,"STAB":0,"LAUNCH":0,"DATA":"nope"}"#;
        let err = Message::from_string(json).unwrap_err();
        assert!(matches!(err, ComsError::Parse(_)));
    }

    #[test]
    fn absent_optional_fields_serialize_as_null() {
        let m = Message::new(MessageFields::default());
        let s = m.to_string();
        assert!(s.contains("\"ARMED\":null"));
        assert!(s.contains("\"DATA\":null"));
    }

    #[test]
    fn construct_message_dispatches_on_input_kind() {
        let from_msg = construct_message(Message::new(MessageFields::default())).unwrap();
        let from_str = construct_message(sample_json()).unwrap();
        let map = serde_json::from_str::<Value>(sample_json())
            .unwrap()
            .as_object()
            .unwrap()
            .clone();
        let from_map = construct_message(map).unwrap();
        assert_eq!(from_msg.armed(), None);
        assert_eq!(from_str.armed(), Some(1));
        assert_eq!(from_map.armed(), Some(1));
    }

    #[test]
    fn get_reads_fields_by_wire_name() {
        let m = Message::from_string(sample_json()).unwrap();
        assert_eq!(m.get("STAB"), Some(Value::from(1)));
        assert_eq!(m.get("NOPE"), None);
    }
}
