/// WebSocket message types for the Gemini Live `BidiGenerateContent` API
///
/// Every frame is a JSON object with exactly one top-level key naming the
/// message kind (`setup`, `realtimeInput`, `setupComplete`, `serverContent`,
/// `goAway`). Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

// ============================================================================
// Shared payloads
// ============================================================================

/// A base64 media payload tagged with its MIME type
///
/// # Example
/// ```
/// use recyclens_lib::network::messages::MediaBlob;
///
/// let blob = MediaBlob::new("image/jpeg", "/9j/4AAQ");
/// let json = serde_json::to_string(&blob).unwrap();
/// assert_eq!(json, r#"{"mimeType":"image/jpeg","data":"/9j/4AAQ"}"#);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaBlob {
    /// MIME type, e.g. `audio/pcm;rate=16000` or `image/jpeg`
    pub mime_type: String,

    /// Base64-encoded bytes
    pub data: String,
}

impl MediaBlob {
    /// Create a new media blob
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Whether this blob carries audio
    pub fn is_audio(&self) -> bool {
        self.mime_type.starts_with("audio/")
    }
}

/// One part of a content turn: text or inline media
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<MediaBlob>,
}

impl Part {
    /// A text-only part
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }
}

/// An ordered list of parts
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

// ============================================================================
// Client -> Server Messages
// ============================================================================

/// Modalities the model may answer with
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Modality {
    Audio,
    Text,
}

/// Prebuilt voice selection
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

/// Generation settings sent once at setup
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<Modality>,
    pub speech_config: SpeechConfig,
}

/// First message of every session; fixes model, voice and prompt
///
/// # Example
/// ```
/// use recyclens_lib::network::messages::{ClientMessage, SetupMessage};
///
/// let setup = SetupMessage::new("gemini-2.5-flash-native-audio-preview-09-2025", "Kore", "Be brief.");
/// let json = serde_json::to_string(&ClientMessage::Setup(setup)).unwrap();
///
/// assert!(json.starts_with(r#"{"setup":{"model":"models/gemini-2.5"#));
/// assert!(json.contains(r#""responseModalities":["AUDIO"]"#));
/// assert!(json.contains(r#""voiceName":"Kore""#));
/// ```
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SetupMessage {
    /// Fully qualified model resource name (`models/...`)
    pub model: String,

    pub generation_config: GenerationConfig,

    pub system_instruction: Content,
}

impl SetupMessage {
    /// Build an audio-only setup for `model` speaking with `voice_name`
    ///
    /// A bare model id is qualified with the `models/` prefix.
    pub fn new(
        model: impl Into<String>,
        voice_name: impl Into<String>,
        system_instruction: impl Into<String>,
    ) -> Self {
        let model = model.into();
        let model = if model.starts_with("models/") {
            model
        } else {
            format!("models/{}", model)
        };

        Self {
            model,
            generation_config: GenerationConfig {
                response_modalities: vec![Modality::Audio],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: voice_name.into(),
                        },
                    },
                },
            },
            system_instruction: Content {
                parts: vec![Part::text(system_instruction)],
            },
        }
    }

    /// The configured voice
    pub fn voice_name(&self) -> &str {
        &self
            .generation_config
            .speech_config
            .voice_config
            .prebuilt_voice_config
            .voice_name
    }
}

/// Streamed media input
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<MediaBlob>,
}

/// Union type for all client messages
///
/// Serialized externally tagged, so each variant becomes the single
/// top-level key of the frame.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    /// Session setup, sent once right after the socket opens
    Setup(SetupMessage),
    /// Microphone audio or a camera frame
    RealtimeInput(RealtimeInput),
}

impl ClientMessage {
    /// Wrap one media blob as a realtime input message
    pub fn media(blob: MediaBlob) -> Self {
        ClientMessage::RealtimeInput(RealtimeInput {
            media_chunks: vec![blob],
        })
    }

    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Setup(_) => "setup",
            ClientMessage::RealtimeInput(_) => "realtimeInput",
        }
    }
}

// ============================================================================
// Server -> Client Messages
// ============================================================================

/// Acknowledgement of the setup message
#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
pub struct SetupComplete {}

/// Model output for the current turn
#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub model_turn: Option<Content>,

    /// The model finished its turn
    #[serde(default)]
    pub turn_complete: bool,

    /// The user barged in and the model stopped generating
    #[serde(default)]
    pub interrupted: bool,
}

/// Notice that the server will close the connection soon
#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GoAway {
    #[serde(default)]
    pub time_left: Option<String>,
}

/// Messages received from the server
///
/// Unknown keys (usage metadata, transcriptions) are ignored.
#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    pub setup_complete: Option<SetupComplete>,

    #[serde(default)]
    pub server_content: Option<ServerContent>,

    #[serde(default)]
    pub go_away: Option<GoAway>,
}

impl ServerMessage {
    /// Check if this acknowledges the setup
    pub fn is_setup_complete(&self) -> bool {
        self.setup_complete.is_some()
    }

    /// Base64 audio payloads in this message, in part order
    pub fn audio_payloads(&self) -> impl Iterator<Item = &str> {
        self.server_content
            .iter()
            .filter_map(|content| content.model_turn.as_ref())
            .flat_map(|turn| turn.parts.iter())
            .filter_map(|part| part.inline_data.as_ref())
            .filter(|blob| blob.is_audio())
            .map(|blob| blob.data.as_str())
    }

    /// Check if the model finished its turn
    pub fn is_turn_complete(&self) -> bool {
        self.server_content
            .as_ref()
            .is_some_and(|content| content.turn_complete)
    }

    /// Check if the model was interrupted
    pub fn is_interrupted(&self) -> bool {
        self.server_content
            .as_ref()
            .is_some_and(|content| content.interrupted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_message_serialization() {
        let setup = SetupMessage::new("gemini-test", "Kore", "You are RecycLens.");
        let json = serde_json::to_value(ClientMessage::Setup(setup)).unwrap();

        let setup = &json["setup"];
        assert_eq!(setup["model"], "models/gemini-test");
        assert_eq!(
            setup["generationConfig"]["responseModalities"],
            serde_json::json!(["AUDIO"])
        );
        assert_eq!(
            setup["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]
                ["voiceName"],
            "Kore"
        );
        assert_eq!(
            setup["systemInstruction"]["parts"][0]["text"],
            "You are RecycLens."
        );
        // Text parts carry no inlineData key
        assert!(setup["systemInstruction"]["parts"][0].get("inlineData").is_none());
    }

    #[test]
    fn test_setup_keeps_qualified_model() {
        let setup = SetupMessage::new("models/gemini-test", "Puck", "");
        assert_eq!(setup.model, "models/gemini-test");
        assert_eq!(setup.voice_name(), "Puck");
    }

    #[test]
    fn test_realtime_input_serialization() {
        let msg = ClientMessage::media(MediaBlob::new("audio/pcm;rate=16000", "AAA="));
        let json = serde_json::to_string(&msg).unwrap();

        assert_eq!(
            json,
            r#"{"realtimeInput":{"mediaChunks":[{"mimeType":"audio/pcm;rate=16000","data":"AAA="}]}}"#
        );
        assert_eq!(msg.kind(), "realtimeInput");
    }

    #[test]
    fn test_server_message_setup_complete() {
        let msg: ServerMessage = serde_json::from_str(r#"{"setupComplete": {}}"#).unwrap();

        assert!(msg.is_setup_complete());
        assert_eq!(msg.audio_payloads().count(), 0);
    }

    #[test]
    fn test_server_message_audio_parts() {
        let json = r#"{
            "serverContent": {
                "modelTurn": {
                    "parts": [
                        {"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "AAAA"}},
                        {"text": "thinking"},
                        {"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "BBBB"}}
                    ]
                }
            }
        }"#;

        let msg: ServerMessage = serde_json::from_str(json).unwrap();

        assert!(!msg.is_setup_complete());
        assert_eq!(msg.audio_payloads().collect::<Vec<_>>(), vec!["AAAA", "BBBB"]);
        assert!(!msg.is_turn_complete());
    }

    #[test]
    fn test_server_message_turn_flags() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"serverContent": {"turnComplete": true}}"#).unwrap();
        assert!(msg.is_turn_complete());
        assert!(!msg.is_interrupted());

        let msg: ServerMessage =
            serde_json::from_str(r#"{"serverContent": {"interrupted": true}}"#).unwrap();
        assert!(msg.is_interrupted());
    }

    #[test]
    fn test_server_message_go_away() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"goAway": {"timeLeft": "10s"}}"#).unwrap();

        assert_eq!(msg.go_away.unwrap().time_left.as_deref(), Some("10s"));
    }

    #[test]
    fn test_server_message_ignores_unknown_fields() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"usageMetadata": {"totalTokenCount": 12}}"#).unwrap();

        assert_eq!(msg, ServerMessage::default());
    }
}
