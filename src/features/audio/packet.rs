//! Gateway packets exchanged with the audio client
//!
//! Inbound voice dispatches are relayed as-is; outbound op 4 packets ask the
//! gateway to move the bot in or out of a voice channel.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use serenity::model::voice::VoiceState;

pub const VOICE_STATE_UPDATE: &str = "VOICE_STATE_UPDATE";
pub const VOICE_SERVER_UPDATE: &str = "VOICE_SERVER_UPDATE";

/// Gateway opcode for a dispatch event
pub const OP_DISPATCH: u8 = 0;
/// Gateway opcode for a voice state update request
pub const OP_VOICE_STATE: u8 = 4;

/// Raw gateway payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayPacket {
    pub op: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
    pub d: Value,
}

impl GatewayPacket {
    pub fn dispatch(kind: impl Into<String>, data: Value) -> Self {
        Self {
            op: OP_DISPATCH,
            t: Some(kind.into()),
            d: data,
        }
    }

    /// Rebuild a VOICE_STATE_UPDATE dispatch from serenity's decoded state
    pub fn voice_state(guild_id: u64, state: &VoiceState) -> serde_json::Result<Self> {
        let mut data = serde_json::to_value(state)?;
        if let Some(fields) = data.as_object_mut() {
            fields.insert("guild_id".to_string(), json!(guild_id.to_string()));
        }
        Ok(Self::dispatch(VOICE_STATE_UPDATE, data))
    }

    /// VOICE_SERVER_UPDATE dispatch; a `None` endpoint means the voice server is going away
    pub fn voice_server(guild_id: u64, endpoint: Option<&str>, token: &str) -> Self {
        Self::dispatch(
            VOICE_SERVER_UPDATE,
            json!({
                "guild_id": guild_id.to_string(),
                "endpoint": endpoint,
                "token": token,
            }),
        )
    }

    /// Op 4 request; `channel_id: None` leaves the current voice channel
    pub fn voice_join(guild_id: u64, channel_id: Option<u64>, self_mute: bool, self_deaf: bool) -> Self {
        Self {
            op: OP_VOICE_STATE,
            t: None,
            d: json!({
                "guild_id": guild_id.to_string(),
                "channel_id": channel_id.map(|c| c.to_string()),
                "self_mute": self_mute,
                "self_deaf": self_deaf,
            }),
        }
    }

    pub fn kind(&self) -> Option<&str> {
        self.t.as_deref()
    }

    pub fn guild_id(&self) -> Option<u64> {
        snowflake(&self.d, "guild_id")
    }
}

/// Read a snowflake that may be encoded as a string or a number
pub fn snowflake(data: &Value, field: &str) -> Option<u64> {
    match data.get(field)? {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_join_packet_shape() {
        let packet = GatewayPacket::voice_join(42, Some(7), false, true);
        let encoded = serde_json::to_value(&packet).unwrap();

        assert_eq!(encoded["op"], 4);
        assert!(encoded.get("t").is_none());
        assert_eq!(encoded["d"]["guild_id"], "42");
        assert_eq!(encoded["d"]["channel_id"], "7");
        assert_eq!(encoded["d"]["self_deaf"], true);
        assert_eq!(packet.guild_id(), Some(42));
    }

    #[test]
    fn test_voice_leave_has_null_channel() {
        let packet = GatewayPacket::voice_join(42, None, false, false);
        assert!(packet.d["channel_id"].is_null());
    }

    #[test]
    fn test_voice_server_packet_shape() {
        let packet = GatewayPacket::voice_server(9, Some("us.example:443"), "abc");
        assert_eq!(packet.kind(), Some(VOICE_SERVER_UPDATE));
        assert_eq!(packet.guild_id(), Some(9));
        assert_eq!(packet.d["endpoint"], "us.example:443");

        let gone = GatewayPacket::voice_server(9, None, "abc");
        assert!(gone.d["endpoint"].is_null());
    }

    #[test]
    fn test_snowflake_accepts_strings_and_numbers() {
        let data = json!({"a": "123", "b": 456, "c": null});
        assert_eq!(snowflake(&data, "a"), Some(123));
        assert_eq!(snowflake(&data, "b"), Some(456));
        assert_eq!(snowflake(&data, "c"), None);
        assert_eq!(snowflake(&data, "missing"), None);
    }

    #[test]
    fn test_dispatch_from_raw_json() {
        let raw = r#"{"op":0,"t":"VOICE_SERVER_UPDATE","d":{"guild_id":"9","token":"abc","endpoint":"us.example:443"}}"#;
        let packet: GatewayPacket = serde_json::from_str(raw).unwrap();
        assert_eq!(packet.kind(), Some(VOICE_SERVER_UPDATE));
        assert_eq!(packet.guild_id(), Some(9));
    }
}
