//! Codecs: turning frames into bytes and back.
//!
//! [`Codec`] is the low-level strategy (how any serde value becomes bytes).
//! [`MessageCodec`] sits on top of it and speaks in terms of the session
//! protocol: it encodes queries after validating their payload against the
//! command schema, and classifies inbound frames as events or responses.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    Command, CorrelationId, Frame, Inbound, ProtocolError, Query,
    QueryResponse, UnsolicitedEvent,
};

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because the codec lives inside the session
/// worker task for the whole life of the client.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use hearth_protocol::{Codec, CorrelationId, Frame, JsonCodec};
///
/// let codec = JsonCodec;
/// let frame = Frame::failure(CorrelationId::from_raw("q1"), "bad password");
///
/// let bytes = codec.encode(&frame).unwrap();
/// let decoded: Frame = codec.decode(&bytes).unwrap();
/// assert_eq!(frame, decoded);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

// ---------------------------------------------------------------------------
// MessageCodec
// ---------------------------------------------------------------------------

/// Error text used when the service reports failure without saying why.
pub const UNSPECIFIED_REMOTE_ERROR: &str = "unspecified remote error";

/// Encodes queries and decodes inbound frames for the session protocol.
#[derive(Debug, Clone, Default)]
pub struct MessageCodec<C: Codec = JsonCodec> {
    codec: C,
}

impl<C: Codec> MessageCodec<C> {
    pub fn new(codec: C) -> Self {
        Self { codec }
    }

    /// Encodes a query frame after validating `payload` against the
    /// command's request schema.
    ///
    /// # Errors
    /// `InvalidPayload` if the payload has the wrong shape, `Encode` if
    /// serialization fails.
    pub fn encode_query(
        &self,
        command: Command,
        id: &CorrelationId,
        payload: &Value,
    ) -> Result<Vec<u8>, ProtocolError> {
        command.validate_request(payload)?;
        self.codec.encode(&Frame::Query {
            command: command.wire_name().to_string(),
            id: id.clone(),
            payload: payload.clone(),
        })
    }

    /// Encodes a typed query.
    pub fn encode_typed<Q: Query>(
        &self,
        id: &CorrelationId,
        request: &Q,
    ) -> Result<Vec<u8>, ProtocolError> {
        let payload = serde_json::to_value(request).map_err(ProtocolError::Encode)?;
        self.encode_query(Q::COMMAND, id, &payload)
    }

    /// Encodes any frame as-is. Used by services and test doubles.
    pub fn encode_frame(&self, frame: &Frame) -> Result<Vec<u8>, ProtocolError> {
        self.codec.encode(frame)
    }

    /// Classifies an inbound frame.
    ///
    /// # Errors
    /// `Decode` for bytes that are not a frame, `InvalidMessage` for a
    /// frame that only makes sense in the other direction (a query).
    pub fn decode(&self, data: &[u8]) -> Result<Inbound, ProtocolError> {
        match self.codec.decode::<Frame>(data)? {
            Frame::Event {
                event_type,
                payload,
            } => Ok(Inbound::Event(UnsolicitedEvent {
                event_type,
                payload,
            })),
            Frame::Response {
                id,
                success,
                payload,
                error,
            } => {
                let outcome = if success {
                    Ok(payload.unwrap_or(Value::Null))
                } else {
                    Err(error.unwrap_or_else(|| UNSPECIFIED_REMOTE_ERROR.to_string()))
                };
                Ok(Inbound::Response(QueryResponse { id, outcome }))
            }
            Frame::Query { command, .. } => Err(ProtocolError::InvalidMessage(
                format!("unexpected inbound query {command}"),
            )),
        }
    }

    /// Decodes a frame without classifying it. Used by services and test
    /// doubles to read what the client sent.
    pub fn decode_frame(&self, data: &[u8]) -> Result<Frame, ProtocolError> {
        self.codec.decode(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GetUserInfoRequest;
    use serde_json::json;

    fn codec() -> MessageCodec {
        MessageCodec::default()
    }

    #[test]
    fn test_query_then_synthetic_response_keeps_id_and_payload() {
        let codec = codec();
        let id = CorrelationId::generate();
        let bytes = codec
            .encode_query(Command::GetUserInfo, &id, &json!({ "UserName": "" }))
            .unwrap();

        // Play the service: read the query, answer under the same id.
        let Frame::Query { id: seen, command, .. } = codec.decode_frame(&bytes).unwrap() else {
            panic!("expected a query frame");
        };
        assert_eq!(command, "GETUSERINFO");
        let answer = json!({ "RemoteUser": { "Mail": "a@b.com" } });
        let reply = codec.encode_frame(&Frame::success(seen, answer.clone())).unwrap();

        match codec.decode(&reply).unwrap() {
            Inbound::Response(resp) => {
                assert_eq!(resp.id, id);
                assert_eq!(resp.outcome, Ok(answer));
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn test_encode_query_rejects_invalid_payload() {
        let err = codec()
            .encode_query(Command::Login, &CorrelationId::generate(), &json!({}))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayload { command: "LOGIN", .. }));
    }

    #[test]
    fn test_encode_typed_uses_command_wire_name() {
        let codec = codec();
        let bytes = codec
            .encode_typed(&CorrelationId::from_raw("t1"), &GetUserInfoRequest::default())
            .unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["command"], "GETUSERINFO");
        assert_eq!(value["id"], "t1");
    }

    #[test]
    fn test_decode_failure_response_without_error_text() {
        let raw = br#"{"kind":"Response","id":"x","success":false}"#;
        match codec().decode(raw).unwrap() {
            Inbound::Response(resp) => {
                assert_eq!(resp.outcome, Err(UNSPECIFIED_REMOTE_ERROR.to_string()));
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_success_without_payload_is_null() {
        let raw = br#"{"kind":"Response","id":"x","success":true}"#;
        match codec().decode(raw).unwrap() {
            Inbound::Response(resp) => assert_eq!(resp.outcome, Ok(Value::Null)),
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_event() {
        let raw = br#"{"kind":"Event","event_type":"ServerNotice","payload":{"Text":"maintenance"}}"#;
        assert_eq!(
            codec().decode(raw).unwrap(),
            Inbound::Event(UnsolicitedEvent {
                event_type: "ServerNotice".into(),
                payload: json!({ "Text": "maintenance" }),
            })
        );
    }

    #[test]
    fn test_decode_garbage_is_decode_error() {
        assert!(matches!(
            codec().decode(b"not json at all"),
            Err(ProtocolError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_inbound_query_is_invalid() {
        let raw = br#"{"kind":"Query","command":"LOGIN","id":"x","payload":{}}"#;
        assert!(matches!(
            codec().decode(raw),
            Err(ProtocolError::InvalidMessage(_))
        ));
    }
}
