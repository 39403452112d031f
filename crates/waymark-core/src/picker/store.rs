//! The content script's mode store.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use waymark_protocols::{EditorMode, ElementInfo, TransitionError};

/// Store shared by the picker, the tour player and the content script.
pub type SharedStore = Arc<Mutex<EditorStore>>;

/// Single owner of a tab's [`EditorMode`] and the element picked in it.
#[derive(Debug, Default)]
pub struct EditorStore {
    mode: EditorMode,
    selected: Option<ElementInfo>,
}

impl EditorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStore {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    /// Element captured by the last pick, while editing or viewing.
    pub fn selected(&self) -> Option<&ElementInfo> {
        self.selected.as_ref()
    }

    /// Move to `to`. Entering `idle` discards the selection.
    pub fn transition(&mut self, to: EditorMode) -> Result<EditorMode, TransitionError> {
        let from = self.mode;
        if !from.can_transition_to(to) {
            return Err(TransitionError { from, to });
        }
        self.mode = to;
        if to == EditorMode::Idle {
            self.selected = None;
        }
        debug!("Editor mode {} -> {}", from, to);
        Ok(from)
    }

    /// Complete a pick: `picking -> editing`, keeping `element`.
    pub fn select(&mut self, element: ElementInfo) -> Result<(), TransitionError> {
        self.transition(EditorMode::Editing)?;
        self.selected = Some(element);
        Ok(())
    }

    /// Force `idle` regardless of the current mode. Used on navigation.
    pub fn reset(&mut self) -> EditorMode {
        let from = self.mode;
        self.mode = EditorMode::Idle;
        self.selected = None;
        from
    }
}

#[cfg(test)]
mod tests {
    use waymark_protocols::Rect;

    use super::*;

    fn info() -> ElementInfo {
        ElementInfo {
            selector: "#save".to_string(),
            rect: Rect::default(),
            captured_text: "Save".to_string(),
            tag_name: "button".to_string(),
        }
    }

    #[test]
    fn test_pick_flow() {
        let mut store = EditorStore::new();
        assert_eq!(store.transition(EditorMode::Picking), Ok(EditorMode::Idle));
        store.select(info()).unwrap();
        assert_eq!(store.mode(), EditorMode::Editing);
        assert_eq!(store.selected().map(|e| e.selector.as_str()), Some("#save"));
    }

    #[test]
    fn test_select_requires_picking() {
        let mut store = EditorStore::new();
        let err = store.select(info()).unwrap_err();
        assert_eq!(err.from, EditorMode::Idle);
        assert_eq!(err.to, EditorMode::Editing);
        assert!(store.selected().is_none());
    }

    #[test]
    fn test_idle_discards_selection() {
        let mut store = EditorStore::new();
        store.transition(EditorMode::Picking).unwrap();
        store.select(info()).unwrap();
        store.transition(EditorMode::Idle).unwrap();
        assert!(store.selected().is_none());
    }

    #[test]
    fn test_viewing_keeps_selection() {
        let mut store = EditorStore::new();
        store.transition(EditorMode::Picking).unwrap();
        store.select(info()).unwrap();
        store.transition(EditorMode::Viewing).unwrap();
        assert!(store.selected().is_some());
    }

    #[test]
    fn test_reset_from_any_mode() {
        let mut store = EditorStore::new();
        store.transition(EditorMode::Viewing).unwrap();
        assert_eq!(store.reset(), EditorMode::Viewing);
        assert_eq!(store.mode(), EditorMode::Idle);
    }
}
