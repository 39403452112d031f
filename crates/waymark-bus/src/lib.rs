//! # Waymark Bus
//!
//! Message passing between the extension's contexts.
//!
//! - [`runtime`] - request/response channel with per-request reply slots
//! - [`page`] - same-document broadcast filtered by source tag
//! - [`external`] - allow-listed channel for hosted origins
//! - [`background`] - the long-lived service behind every request
//! - [`content`] - the per-tab script hosting the picker and tours
//! - [`extension`] - wiring for a whole extension instance

pub mod background;
pub mod content;
pub mod extension;
pub mod external;
pub mod page;
pub mod runtime;
pub mod tabs;

pub use background::{Background, PickerToken, TabCapture};
pub use content::{ContentScript, ContentSettings};
pub use extension::Extension;
pub use page::{PagePort, PageSubscriber};
pub use runtime::{runtime_channel, Responder, RuntimeClient, RuntimePort, RuntimeRequest};
pub use tabs::{PageRelayInjector, ScriptInjector, TabHandle, TabRegistry};

/// Extension version reported on the page and the external channel.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
