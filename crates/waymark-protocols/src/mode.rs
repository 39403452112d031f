//! Editor mode.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Mode of a content script. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorMode {
    #[default]
    Idle,
    Picking,
    Editing,
    Viewing,
}

impl EditorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditorMode::Idle => "idle",
            EditorMode::Picking => "picking",
            EditorMode::Editing => "editing",
            EditorMode::Viewing => "viewing",
        }
    }

    /// Whether `self -> to` is a legal transition.
    pub fn can_transition_to(&self, to: EditorMode) -> bool {
        matches!(
            (self, to),
            (EditorMode::Idle, EditorMode::Picking)
                | (EditorMode::Picking, EditorMode::Editing)
                | (EditorMode::Picking, EditorMode::Idle)
                | (EditorMode::Idle, EditorMode::Viewing)
                | (EditorMode::Editing, EditorMode::Viewing)
                | (EditorMode::Viewing, EditorMode::Idle)
                | (EditorMode::Editing, EditorMode::Idle)
        )
    }
}

impl fmt::Display for EditorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
