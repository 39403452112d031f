//! Externally initiated requests from the hosted origin.

use serde::{Deserialize, Serialize};

use super::TabId;

/// The small set of requests an allow-listed origin may make.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ExternalMessage {
    Ping,
    StartPicker {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tab_id: Option<TabId>,
    },
}

/// External message with the sender's origin as reported by the browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalRequest {
    pub origin: String,
    pub message: ExternalMessage,
}
