//! Editor mode transition errors.

use thiserror::Error;

use crate::mode::EditorMode;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot move from {from} to {to}")]
pub struct TransitionError {
    pub from: EditorMode,
    pub to: EditorMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = TransitionError {
            from: EditorMode::Viewing,
            to: EditorMode::Picking,
        };
        assert_eq!(err.to_string(), "Cannot move from viewing to picking");
    }
}
