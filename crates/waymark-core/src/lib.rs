//! # Waymark Core
//!
//! Element targeting for Waymark. Every piece here works against the
//! in-memory [`dom`] model that each tab's contexts share a view of.
//!
//! - [`synthesizer`] - node to selector, never failing
//! - [`locator`] - selector to node, waiting boundedly for it to appear
//! - [`url_pattern`] - the single URL matching rule set
//! - [`picker`] - the picking state machine and the mode store
//! - [`render`] - the style-isolated render target contract
//! - [`tour`] - sequential tour playback

pub mod dom;
pub mod locator;
pub mod picker;
pub mod render;
pub mod synthesizer;
pub mod tour;
pub mod url_pattern;

pub use dom::{Document, NodeId, SharedDocument};
pub use locator::Locator;
pub use picker::{EditorStore, Picker, PickerEvent, SharedStore};
pub use render::{RenderTarget, ShadowOverlay, OVERLAY_ATTR};
pub use synthesizer::synthesize;
pub use tour::{StepStatus, TourPlayer};
pub use url_pattern::{filter_for_url, matches, UrlPattern};
