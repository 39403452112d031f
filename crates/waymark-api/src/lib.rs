//! # Waymark API
//!
//! Read-only client for the collaborator API that stores guidance
//! definitions. Requests are bearer-authenticated and keyed by the page URL.
//! The API's own URL filtering is not trusted; callers re-check every
//! definition's pattern before rendering.

mod client;

pub use client::GuidanceApi;
