//! # Waymark Protocols
//!
//! Wire types shared by every Waymark execution context: the background
//! process, per-tab content scripts, the popup and the hosted web application.
//! Contains only data definitions, no behaviour beyond (de)serialization.
//!
//! ## Contents
//!
//! - [`ElementInfo`] / [`Rect`] - what a pick produces
//! - [`EditorMode`] - the content script's mutually exclusive mode
//! - [`Tour`], [`Tooltip`], [`Banner`] - guidance definitions (read-only here)
//! - [`RuntimeMessage`], [`PageMessage`], [`ExternalMessage`] - message taxonomy
//! - [`Response`] - the structured `{success, data, error}` reply

pub mod element;
pub mod error;
pub mod guidance;
pub mod message;
pub mod mode;

pub use element::{ElementInfo, Rect};
pub use error::{ApiError, BusError, TransitionError};
pub use guidance::{Banner, BannerPosition, Guidance, Placement, Tooltip, TooltipTrigger, Tour, TourStep};
pub use message::*;
pub use mode::EditorMode;
