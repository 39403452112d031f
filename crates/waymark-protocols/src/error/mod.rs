//! Error types for the Waymark protocol layer.

mod api;
mod bus;
mod transition;

pub use api::*;
pub use bus::*;
pub use transition::*;
