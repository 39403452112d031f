//! Element location.
//!
//! Resolves a selector against a document that may not contain the target
//! yet. An immediate query is tried first; otherwise the locator watches
//! subtree mutations and re-queries on each one until the target appears or
//! the timeout elapses.
//!
//! Cancellation is by drop: the mutation observer lives inside the returned
//! future, so dropping the future disconnects it on the spot.

use std::time::Duration;

use tracing::{debug, warn};

use crate::dom::{NodeId, Selector, SharedDocument};

/// Default wait for a selector to appear.
pub const DEFAULT_LOCATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolves selectors against one document.
#[derive(Clone)]
pub struct Locator {
    document: SharedDocument,
    timeout: Duration,
}

impl Locator {
    pub fn new(document: SharedDocument) -> Self {
        Self::with_timeout(document, DEFAULT_LOCATE_TIMEOUT)
    }

    pub fn with_timeout(document: SharedDocument, timeout: Duration) -> Self {
        Self { document, timeout }
    }

    pub fn document(&self) -> &SharedDocument {
        &self.document
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Immediate lookup. Invalid selectors resolve to `None`.
    pub fn find_now(&self, selector: &str) -> Option<NodeId> {
        let parsed = Selector::parse(selector).ok()?;
        self.document.read().query_first(&parsed)
    }

    /// Locate with the configured timeout.
    pub async fn locate(&self, selector: &str) -> Option<NodeId> {
        self.locate_within(selector, self.timeout).await
    }

    /// Locate `selector`, waiting at most `timeout` for it to appear.
    ///
    /// Returns `None` when the selector is invalid or the timeout fires.
    pub async fn locate_within(&self, selector: &str, timeout: Duration) -> Option<NodeId> {
        let parsed = match Selector::parse(selector) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Cannot locate invalid selector '{}': {}", selector, e);
                return None;
            }
        };

        if let Some(node) = self.document.read().query_first(&parsed) {
            return Some(node);
        }

        let mut observer = self.document.observe();
        // The target may have appeared between the first query and subscribing.
        if let Some(node) = self.document.read().query_first(&parsed) {
            return Some(node);
        }

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    debug!("Selector '{}' not found within {:?}", selector, timeout);
                    return None;
                }
                record = observer.recv() => {
                    if record.is_none() {
                        return None;
                    }
                    if let Some(node) = self.document.read().query_first(&parsed) {
                        return Some(node);
                    }
                }
            }
        }
    }
}
