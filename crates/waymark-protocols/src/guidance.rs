//! Guidance definitions as served by the collaborator API.
//!
//! These are consumed read-only: Waymark never authors or stores them, it only
//! decides where (and whether) to render them.

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Common view over every guidance definition.
pub trait Guidance {
    /// Declared URL pattern the definition applies to.
    fn url_pattern(&self) -> &str;

    /// Whether the definition is switched on.
    fn is_active(&self) -> bool;
}

/// Placement hint relative to the anchor element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    Top,
    #[default]
    Bottom,
    Left,
    Right,
    Auto,
}

/// A guided tour: an ordered sequence of steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub url_pattern: String,
    /// Steps in display order. Order is significant and never re-sorted.
    #[serde(default)]
    pub steps: Vec<TourStep>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Start automatically once the page's guidance is loaded.
    #[serde(default)]
    pub auto_start: bool,
}

/// A single tour step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub selector: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub placement: Placement,
}

/// When a tooltip is revealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TooltipTrigger {
    #[default]
    Hover,
    Click,
    Always,
}

/// A tooltip anchored to one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tooltip {
    pub id: String,
    pub url_pattern: String,
    pub selector: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub placement: Placement,
    #[serde(default)]
    pub trigger: TooltipTrigger,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Edge of the viewport a banner is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BannerPosition {
    #[default]
    Top,
    Bottom,
}

/// A page-wide banner. Not anchored to any element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    pub id: String,
    pub url_pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub position: BannerPosition,
    #[serde(default = "default_true")]
    pub dismissible: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

macro_rules! impl_guidance {
    ($($ty:ty),*) => {
        $(impl Guidance for $ty {
            fn url_pattern(&self) -> &str {
                &self.url_pattern
            }

            fn is_active(&self) -> bool {
                self.is_active
            }
        })*
    };
}

impl_guidance!(Tour, Tooltip, Banner);
