//! Allow-listed inbound channel for externally hosted origins.
//!
//! Narrower than the runtime channel: only [`ExternalMessage`]s are
//! accepted, and only from configured origins. Anything else is ignored.

use tracing::debug;
use waymark_core::url_pattern;
use waymark_protocols::{ExternalMessage, ExternalRequest};

/// Whether `origin` is on the allow-list. Entries are URL patterns, so
/// `https://*.example.com` admits every subdomain.
pub fn origin_allowed(allowed: &[String], origin: &str) -> bool {
    let origin = origin.trim();
    !origin.is_empty()
        && origin != "null"
        && allowed.iter().any(|pattern| url_pattern::matches(pattern, origin))
}

/// Admit `request` if its origin is allowed.
pub fn admit(allowed: &[String], request: ExternalRequest) -> Option<ExternalMessage> {
    if origin_allowed(allowed, &request.origin) {
        Some(request.message)
    } else {
        debug!("Ignoring external message from origin '{}'", request.origin);
        None
    }
}
