//! Same-document broadcast messages between content script and web app.

use serde::{Deserialize, Serialize};

use crate::element::ElementInfo;
use crate::mode::EditorMode;

/// Source tag on posts made by the content script.
pub const EXTENSION_SOURCE: &str = "waymark-extension";

/// Source tag on posts made by the hosted web application.
pub const APP_SOURCE: &str = "waymark-app";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum PageMessage {
    Ping,
    Pong { version: String },
    GetStatus,
    StatusResponse {
        mode: EditorMode,
        version: String,
    },
    CaptureScreenshot,
    ScreenshotCaptured {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data_url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    ExtensionReady { version: String },
    StartPicker,
    PickerStarted,
    ElementSelected { element: ElementInfo },
    PickerClosed,
}

/// Payload of a post: the message with its own copy of the source tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageData {
    pub source: String,
    #[serde(flatten)]
    pub message: PageMessage,
}

/// A same-document post. Any script on the page can post, so both tags are
/// checked before a receiver acts on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagePost {
    pub source: String,
    pub data: PageData,
}

impl PagePost {
    pub fn new(source: impl Into<String>, message: PageMessage) -> Self {
        let source = source.into();
        Self {
            data: PageData {
                source: source.clone(),
                message,
            },
            source,
        }
    }

    /// Message if both the envelope and payload tags equal `expected`.
    pub fn accept(&self, expected: &str) -> Option<&PageMessage> {
        (self.source == expected && self.data.source == expected).then_some(&self.data.message)
    }
}
