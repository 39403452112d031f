//! Same-document broadcast between the content script and the web app.
//!
//! Anything on the page can post to this port, so receivers filter by the
//! fixed source tag and silently drop everything else.

use tokio::sync::broadcast;
use tracing::{debug, warn};
use waymark_protocols::{PageMessage, PagePost};

const PAGE_CAPACITY: usize = 64;

/// A document's message port. Cloning shares the port.
#[derive(Debug, Clone)]
pub struct PagePort {
    tx: broadcast::Sender<PagePost>,
}

impl Default for PagePort {
    fn default() -> Self {
        Self::new()
    }
}

impl PagePort {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(PAGE_CAPACITY);
        Self { tx }
    }

    /// Post a raw envelope. Returns how many listeners saw it.
    pub fn post(&self, post: PagePost) -> usize {
        self.tx.send(post).unwrap_or(0)
    }

    /// Post `message` tagged with `source` on both the envelope and payload.
    pub fn post_message(&self, source: &str, message: PageMessage) -> usize {
        self.post(PagePost::new(source, message))
    }

    /// Listen for messages tagged with `expected`.
    pub fn subscribe(&self, expected: impl Into<String>) -> PageSubscriber {
        PageSubscriber {
            rx: self.tx.subscribe(),
            expected: expected.into(),
        }
    }
}

/// Filtered listener on a [`PagePort`].
pub struct PageSubscriber {
    rx: broadcast::Receiver<PagePost>,
    expected: String,
}

impl PageSubscriber {
    /// Next message carrying the expected source tag. `None` once the port
    /// is gone.
    pub async fn recv(&mut self) -> Option<PageMessage> {
        loop {
            match self.rx.recv().await {
                Ok(post) => {
                    if let Some(message) = self.admit(post) {
                        return Some(message);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Page listener lagged, {} messages dropped", n);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next already-queued message carrying the expected tag, if any.
    pub fn try_recv(&mut self) -> Option<PageMessage> {
        loop {
            match self.rx.try_recv() {
                Ok(post) => {
                    if let Some(message) = self.admit(post) {
                        return Some(message);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Page listener lagged, {} messages dropped", n);
                }
                Err(_) => return None,
            }
        }
    }

    fn admit(&self, post: PagePost) -> Option<PageMessage> {
        match post.accept(&self.expected) {
            Some(message) => Some(message.clone()),
            None => {
                debug!(
                    "Ignoring page message from '{}' (expected '{}')",
                    post.source, self.expected
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use waymark_protocols::{PageData, APP_SOURCE, EXTENSION_SOURCE};

    use super::*;

    #[tokio::test]
    async fn test_foreign_sources_are_dropped() {
        let port = PagePort::new();
        let mut sub = port.subscribe(APP_SOURCE);

        port.post_message("some-analytics-script", PageMessage::Ping);
        port.post_message(EXTENSION_SOURCE, PageMessage::Ping);
        port.post_message(APP_SOURCE, PageMessage::GetStatus);

        assert_eq!(sub.recv().await, Some(PageMessage::GetStatus));
        assert_eq!(sub.try_recv(), None);
    }

    #[tokio::test]
    async fn test_mismatched_inner_tag_dropped() {
        let port = PagePort::new();
        let mut sub = port.subscribe(APP_SOURCE);
        port.post(PagePost {
            source: APP_SOURCE.to_string(),
            data: PageData {
                source: "spoofed".to_string(),
                message: PageMessage::StartPicker,
            },
        });
        assert_eq!(sub.try_recv(), None);
    }

    #[test]
    fn test_post_without_listeners() {
        let port = PagePort::new();
        assert_eq!(port.post_message(EXTENSION_SOURCE, PageMessage::PickerClosed), 0);
    }

    #[tokio::test]
    async fn test_every_subscriber_sees_posts() {
        let port = PagePort::new();
        let mut a = port.subscribe(EXTENSION_SOURCE);
        let mut b = port.subscribe(EXTENSION_SOURCE);
        assert_eq!(port.post_message(EXTENSION_SOURCE, PageMessage::PickerStarted), 2);
        assert_eq!(a.recv().await, Some(PageMessage::PickerStarted));
        assert_eq!(b.recv().await, Some(PageMessage::PickerStarted));
    }
}
