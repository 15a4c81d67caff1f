use serde::Serialize;
use serde_json::value::RawValue;
use serde_json::Value;

/// Structured control message extracted from an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlFrame {
    /// Subscribe the session to a room, replacing any prior one.
    Join { id: String },
}

/// Decode an inbound control frame.
///
/// Clients behind some proxies deliver the JSON payload re-encoded as a JSON
/// string; one extra layer is unwrapped before the final decode. Anything
/// unparseable, unrecognized, or missing a string `action`/`id` yields `None`
/// and the caller keeps the connection open.
pub fn decode_control(raw: &str) -> Option<ControlFrame> {
    let trimmed = raw.trim();
    let value: Value = serde_json::from_str(trimmed).ok()?;

    let value = match value {
        Value::String(inner) => serde_json::from_str(&inner).ok()?,
        other => other,
    };

    let action = value.get("action")?.as_str()?;
    let id = value.get("id")?.as_str()?;

    match action {
        "join" => Some(ControlFrame::Join { id: id.to_string() }),
        _ => None,
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    event: &'static str,
    message: &'a RawValue,
}

/// Serialize the outbound `newMessage` envelope around an already-serialized
/// message payload. Valid JSON is embedded verbatim; anything else is carried
/// as a JSON string. The payload is never re-validated beyond that.
pub fn new_message_envelope(payload: &str) -> String {
    match serde_json::from_str::<&RawValue>(payload.trim()) {
        Ok(raw) => {
            let envelope = Envelope {
                event: "newMessage",
                message: raw,
            };
            serde_json::to_string(&envelope).unwrap_or_else(|_| string_envelope(payload))
        }
        Err(_) => string_envelope(payload),
    }
}

fn string_envelope(payload: &str) -> String {
    serde_json::json!({ "event": "newMessage", "message": payload }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_join_frame() {
        let frame = decode_control(r#"{"action":"join","id":"conv-1"}"#);
        assert_eq!(frame, Some(ControlFrame::Join { id: "conv-1".into() }));
    }

    #[test]
    fn double_encoded_frame_decodes_like_single_encoded() {
        let single = r#"{"action":"join","id":"conv-2"}"#;
        let double = serde_json::to_string(single).unwrap();

        assert_eq!(decode_control(single), decode_control(&double));
        assert_eq!(
            decode_control(&double),
            Some(ControlFrame::Join { id: "conv-2".into() })
        );
    }

    #[test]
    fn tolerates_surrounding_whitespace() {
        let frame = decode_control("  {\"action\":\"join\",\"id\":\"conv-3\"}\n");
        assert_eq!(frame, Some(ControlFrame::Join { id: "conv-3".into() }));
    }

    #[test]
    fn garbage_is_dropped() {
        assert_eq!(decode_control("not json at all"), None);
        assert_eq!(decode_control(""), None);
        assert_eq!(decode_control("\"still a string\""), None);
    }

    #[test]
    fn missing_or_non_string_fields_are_noops() {
        assert_eq!(decode_control(r#"{"action":"join"}"#), None);
        assert_eq!(decode_control(r#"{"id":"conv-1"}"#), None);
        assert_eq!(decode_control(r#"{"action":"join","id":42}"#), None);
        assert_eq!(decode_control(r#"{"action":7,"id":"conv-1"}"#), None);
    }

    #[test]
    fn unrecognized_action_is_a_noop() {
        assert_eq!(decode_control(r#"{"action":"leave","id":"conv-1"}"#), None);
    }

    #[test]
    fn envelope_embeds_json_payload_verbatim() {
        let payload = r#"{"id":"m1","content":"hi"}"#;
        let envelope = new_message_envelope(payload);
        let parsed: serde_json::Value = serde_json::from_str(&envelope).unwrap();

        assert_eq!(parsed["event"], "newMessage");
        assert_eq!(parsed["message"]["content"], "hi");
    }

    #[test]
    fn envelope_string_wraps_non_json_payload() {
        let envelope = new_message_envelope("plain text");
        let parsed: serde_json::Value = serde_json::from_str(&envelope).unwrap();

        assert_eq!(parsed["message"], "plain text");
    }
}
