//! Message taxonomy.
//!
//! Three channel families exist, each with its own message enum:
//!
//! - [`RuntimeMessage`]: one-shot request/response between extension contexts
//!   (popup, background, content script), wrapped in an [`Envelope`].
//! - [`PageMessage`]: same-document broadcast between a content script and the
//!   hosted web application, wrapped in a [`PagePost`] carrying source tags.
//! - [`ExternalMessage`]: the narrow allow-listed inbound channel from the
//!   hosted origin to the background process.

mod external;
mod page;
mod response;
mod runtime;

pub use external::{ExternalMessage, ExternalRequest};
pub use page::{PageData, PageMessage, PagePost, APP_SOURCE, EXTENSION_SOURCE};
pub use response::Response;
pub use runtime::{Envelope, RuntimeMessage, Source};

/// Browser tab identifier.
pub type TabId = u32;

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
