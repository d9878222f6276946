//! The draft outgoing response a turn hands to downstream delivery.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Document,
}

/// A file produced by a tool, delivered after the main reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn image(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            kind: AttachmentKind::Image,
            filename: filename.into(),
            mime_type: None,
            caption: None,
            data,
        }
    }

    pub fn document(filename: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            kind: AttachmentKind::Document,
            filename: filename.into(),
            mime_type: None,
            caption: None,
            data,
        }
    }
}

/// What the channel layer should send back to the user.
///
/// The turn loop only fills in attachments; text and voice hints come from
/// upstream and downstream collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default)]
    pub voice_requested: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_text: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,

    /// Routing must not append its own assistant message; the turn loop
    /// owns raw history.
    #[serde(default = "default_true")]
    pub skip_assistant_history: bool,
}

fn default_true() -> bool {
    true
}

impl Default for OutgoingResponse {
    fn default() -> Self {
        Self {
            text: None,
            voice_requested: false,
            voice_text: None,
            attachments: Vec::new(),
            skip_assistant_history: true,
        }
    }
}

impl OutgoingResponse {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn voice_only(voice_text: impl Into<String>) -> Self {
        Self {
            voice_requested: true,
            voice_text: Some(voice_text.into()),
            ..Self::default()
        }
    }

    /// Voice delivery is requested or explicit voice text is present.
    pub fn wants_voice(&self) -> bool {
        self.voice_requested || self.voice_text.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}
