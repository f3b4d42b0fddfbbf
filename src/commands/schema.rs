//! Structured command schemas as sent to the platform's command registry

use serde::{Serialize, Serializer};

/// Channel type codes accepted by a voice channel option (voice, stage)
pub const VOICE_CHANNEL_TYPES: &[u8] = &[2, 13];

/// Application command option type codes
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Channel = 7,
}

impl Serialize for OptionKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOptionSchema {
    #[serde(rename = "type")]
    pub kind: OptionKind,
    pub name: String,
    pub description: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub channel_types: Vec<u8>,
}

impl CommandOptionSchema {
    /// Optional channel picker restricted to `channel_types`
    pub fn channel(name: impl Into<String>, description: impl Into<String>, channel_types: &[u8]) -> Self {
        Self {
            kind: OptionKind::Channel,
            name: name.into(),
            description: description.into(),
            required: false,
            channel_types: channel_types.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSchema {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<CommandOptionSchema>,
}

impl CommandSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            options: Vec::new(),
        }
    }

    pub fn option(mut self, option: CommandOptionSchema) -> Self {
        self.options.push(option);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_serializes_to_registry_shape() {
        let schema = CommandSchema::new("join", "Join a voice channel").option(
            CommandOptionSchema::channel("channel", "Voice channel", VOICE_CHANNEL_TYPES),
        );

        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(value["name"], "join");
        assert_eq!(value["options"][0]["type"], 7);
        assert_eq!(value["options"][0]["required"], false);
        assert_eq!(value["options"][0]["channel_types"], serde_json::json!([2, 13]));
    }

    #[test]
    fn test_empty_options_omitted() {
        let value = serde_json::to_value(CommandSchema::new("ping", "Pong")).unwrap();
        assert!(value.get("options").is_none());
    }
}
