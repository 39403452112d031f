//! Message bus errors.

use thiserror::Error;

use crate::message::TabId;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("No reply within {0} ms")]
    Timeout(u64),

    #[error("Channel closed before a reply was sent")]
    ChannelClosed,

    #[error("Message rejected: {0}")]
    Rejected(String),

    #[error("Tab not found: {0}")]
    TabNotFound(TabId),

    #[error("No live receiver in tab {0}")]
    NoReceiver(TabId),

    #[error("Injection into tab {tab_id} failed: {reason}")]
    InjectionFailed { tab_id: TabId, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
