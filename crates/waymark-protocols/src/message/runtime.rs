//! Runtime (extension-internal) messages.

use serde::{Deserialize, Serialize};

use super::TabId;
use crate::element::ElementInfo;
use crate::guidance::Tour;

/// Execution context a runtime message originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    Popup,
    ContentScript,
    Background,
    WebApp,
}

/// Runtime message. Adding a variant forces every receiver's `match` to
/// account for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum RuntimeMessage {
    SetApiToken { token: String },
    SetApiUrl { url: String },
    GetConfig,
    FetchTours { url: String },
    FetchTooltips {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lang: Option<String>,
    },
    FetchBanners { url: String },
    ValidateToken {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
    StartPicker {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tab_id: Option<TabId>,
    },
    ElementSelected { element: ElementInfo },
    PickerClosed,
    GetActiveTab,
    SetCurrentTour { tour: Tour },
    StartTour {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tour: Option<Tour>,
    },
    NextStep,
    PrevStep,
    CloseEditor,
    OpenEditor,
    GetStatus,
    CaptureScreenshot,
}

impl RuntimeMessage {
    /// Wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeMessage::SetApiToken { .. } => "SET_API_TOKEN",
            RuntimeMessage::SetApiUrl { .. } => "SET_API_URL",
            RuntimeMessage::GetConfig => "GET_CONFIG",
            RuntimeMessage::FetchTours { .. } => "FETCH_TOURS",
            RuntimeMessage::FetchTooltips { .. } => "FETCH_TOOLTIPS",
            RuntimeMessage::FetchBanners { .. } => "FETCH_BANNERS",
            RuntimeMessage::ValidateToken { .. } => "VALIDATE_TOKEN",
            RuntimeMessage::StartPicker { .. } => "START_PICKER",
            RuntimeMessage::ElementSelected { .. } => "ELEMENT_SELECTED",
            RuntimeMessage::PickerClosed => "PICKER_CLOSED",
            RuntimeMessage::GetActiveTab => "GET_ACTIVE_TAB",
            RuntimeMessage::SetCurrentTour { .. } => "SET_CURRENT_TOUR",
            RuntimeMessage::StartTour { .. } => "START_TOUR",
            RuntimeMessage::NextStep => "NEXT_STEP",
            RuntimeMessage::PrevStep => "PREV_STEP",
            RuntimeMessage::CloseEditor => "CLOSE_EDITOR",
            RuntimeMessage::OpenEditor => "OPEN_EDITOR",
            RuntimeMessage::GetStatus => "GET_STATUS",
            RuntimeMessage::CaptureScreenshot => "CAPTURE_SCREENSHOT",
        }
    }
}

/// A runtime message plus its routing metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub source: Source,
    /// Tab of the sending content script, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<TabId>,
    pub message: RuntimeMessage,
}

impl Envelope {
    pub fn new(source: Source, message: RuntimeMessage) -> Self {
        Self {
            source,
            tab_id: None,
            message,
        }
    }

    /// Envelope sent by the content script of `tab_id`.
    pub fn from_tab(tab_id: TabId, message: RuntimeMessage) -> Self {
        Self {
            source: Source::ContentScript,
            tab_id: Some(tab_id),
            message,
        }
    }
}
