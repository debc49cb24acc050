//! The wire envelope: a `type` discriminant plus open-ended named fields.
//!
//! Every frame on the transport is one JSON object with a mandatory string
//! field `type`. [`Envelope`] keeps the discriminant and the remaining
//! fields exactly as received, so unknown kinds pass through untouched.
//! [`Envelope::payload`] gives the closed, typed view over the kinds the
//! application knows about.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::UserId;
use super::payload::{AuthFrame, ChatMessage, ErrorFrame, Notification, Payload};
use crate::error::DecodeError;

/// Discriminant of the authentication handshake frame.
pub const AUTH: &str = "auth";
/// Discriminant of a direct chat message.
pub const MESSAGE: &str = "message";
/// Discriminant of a notification.
pub const NOTIFICATION: &str = "notification";
/// Discriminant of a server-side error report.
pub const ERROR: &str = "error";

/// Immutable, tagged unit of exchange across the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl Envelope {
    /// Creates an envelope from a discriminant and its fields.
    ///
    /// A stray `type` key inside `fields` is discarded; the discriminant
    /// always comes from `kind`.
    #[must_use]
    pub fn new(kind: impl Into<String>, mut fields: Map<String, Value>) -> Self {
        fields.remove("type");
        Self {
            kind: kind.into(),
            fields,
        }
    }

    /// Creates an envelope by serializing a typed payload into its fields.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if `payload` does not serialize to a JSON
    /// object.
    pub fn from_payload<T: Serialize>(
        kind: impl Into<String>,
        payload: &T,
    ) -> Result<Self, DecodeError> {
        let value = serde_json::to_value(payload)?;
        let fields = serde_json::from_value::<Map<String, Value>>(value)?;
        Ok(Self::new(kind, fields))
    }

    /// The handshake envelope asserting `user`.
    #[must_use]
    pub fn auth(user: &UserId) -> Self {
        let mut fields = Map::new();
        fields.insert("userId".to_string(), Value::String(user.to_string()));
        Self::new(AUTH, fields)
    }

    /// An `error` envelope carrying a numeric code and message.
    #[must_use]
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("code".to_string(), Value::from(code));
        fields.insert("message".to_string(), Value::String(message.into()));
        Self::new(ERROR, fields)
    }

    /// Decodes one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] for invalid JSON, a non-object frame, or a
    /// missing or non-string `type`.
    pub fn decode(frame: &str) -> Result<Self, DecodeError> {
        Ok(serde_json::from_str(frame)?)
    }

    /// Serializes the envelope into a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if a field value cannot be serialized.
    pub fn encode(&self) -> Result<String, DecodeError> {
        Ok(serde_json::to_string(self)?)
    }

    /// The `type` discriminant.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Fields other than `type`.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Looks up a single field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// The full JSON object, discriminant included.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut object = self.fields.clone();
        object.insert("type".to_string(), Value::String(self.kind.clone()));
        Value::Object(object)
    }

    /// Decodes the fields into a typed payload.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if the fields do not match `T`.
    pub fn fields_as<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        Ok(serde_json::from_value(Value::Object(self.fields.clone()))?)
    }

    /// Typed view of the envelope.
    ///
    /// Unknown kinds yield [`Payload::Other`] rather than an error.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if a known kind carries fields that do not
    /// match its schema.
    pub fn payload(&self) -> Result<Payload, DecodeError> {
        Ok(match self.kind.as_str() {
            AUTH => Payload::Auth(self.fields_as::<AuthFrame>()?),
            MESSAGE => Payload::Message(self.fields_as::<ChatMessage>()?),
            NOTIFICATION => Payload::Notification(self.fields_as::<Notification>()?),
            ERROR => Payload::Error(self.fields_as::<ErrorFrame>()?),
            _ => Payload::Other,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decode_keeps_unknown_kind_verbatim() {
        let Ok(env) = Envelope::decode(r#"{"type":"custom_thing","x":1}"#) else {
            panic!("expected valid frame");
        };
        assert_eq!(env.kind(), "custom_thing");
        assert_eq!(env.field("x"), Some(&json!(1)));
        assert_eq!(env.to_value(), json!({"type": "custom_thing", "x": 1}));
        assert!(matches!(env.payload(), Ok(Payload::Other)));
    }

    #[test]
    fn decode_rejects_malformed_frames() {
        assert!(Envelope::decode("not json").is_err());
        assert!(Envelope::decode("[1,2,3]").is_err());
        assert!(Envelope::decode(r#"{"x":1}"#).is_err());
        assert!(Envelope::decode(r#"{"type":7}"#).is_err());
    }

    #[test]
    fn auth_envelope_shape() {
        let Ok(user) = UserId::new("alice") else {
            panic!("expected valid id");
        };
        let env = Envelope::auth(&user);
        assert_eq!(env.to_value(), json!({"type": "auth", "userId": "alice"}));
        let Ok(Payload::Auth(frame)) = env.payload() else {
            panic!("expected auth payload");
        };
        assert_eq!(frame.user_id, user);
    }

    #[test]
    fn new_discards_stray_type_field() {
        let mut fields = Map::new();
        fields.insert("type".to_string(), json!("spoofed"));
        fields.insert("a".to_string(), json!(true));
        let env = Envelope::new("custom", fields);
        let Ok(text) = env.encode() else {
            panic!("encode failed");
        };
        let Ok(back) = Envelope::decode(&text) else {
            panic!("decode failed");
        };
        assert_eq!(back.kind(), "custom");
        assert_eq!(back.fields().len(), 1);
    }

    #[test]
    fn known_kind_with_bad_fields_fails_typed_view() {
        let Ok(env) = Envelope::decode(r#"{"type":"message","content":"hi"}"#) else {
            panic!("expected valid frame");
        };
        assert!(env.payload().is_err());
    }

    #[test]
    fn error_envelope_shape() {
        let env = Envelope::error(404, "unknown type");
        let Ok(Payload::Error(frame)) = env.payload() else {
            panic!("expected error payload");
        };
        assert_eq!(frame.code, 404);
        assert_eq!(frame.message, "unknown type");
    }
}
