//! Tab registry and the injection fallback.

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info};
use waymark_protocols::{BusError, PagePost, TabId};

use crate::page::PagePort;
use crate::runtime::RuntimePort;

/// What the background knows about one tab.
#[derive(Debug, Clone)]
pub struct TabHandle {
    pub url: String,
    /// Runtime port of the tab's content script, when one is live.
    pub content: Option<RuntimePort>,
    /// The tab document's message port.
    pub page: PagePort,
    /// Pages the browser forbids scripting (stores, settings pages).
    pub restricted: bool,
}

impl TabHandle {
    pub fn new(url: impl Into<String>, page: PagePort) -> Self {
        Self {
            url: url.into(),
            content: None,
            page,
            restricted: false,
        }
    }

    /// Live content-script port, if any.
    pub fn live_content(&self) -> Option<&RuntimePort> {
        self.content.as_ref().filter(|p| !p.is_closed())
    }
}

/// Runs a minimal relay inside a tab that re-posts a payload as a
/// same-document message.
pub trait ScriptInjector: Send + Sync {
    fn inject_relay(&self, tab_id: TabId, tab: &TabHandle, post: PagePost) -> Result<(), BusError>;
}

/// Default injector: posts straight onto the tab's page port.
#[derive(Debug, Default)]
pub struct PageRelayInjector;

impl ScriptInjector for PageRelayInjector {
    fn inject_relay(&self, tab_id: TabId, tab: &TabHandle, post: PagePost) -> Result<(), BusError> {
        if tab.restricted {
            return Err(BusError::InjectionFailed {
                tab_id,
                reason: "scripting is not allowed on this page".to_string(),
            });
        }
        let seen = tab.page.post(post);
        debug!("Relay injected into tab {} ({} listeners)", tab_id, seen);
        Ok(())
    }
}

/// Open tabs keyed by id, plus the focused one.
#[derive(Default)]
pub struct TabRegistry {
    tabs: DashMap<TabId, TabHandle>,
    active: RwLock<Option<TabId>>,
}

impl TabRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, tab_id: TabId, handle: TabHandle) {
        info!("Tab {} opened at {}", tab_id, handle.url);
        self.tabs.insert(tab_id, handle);
    }

    pub fn close(&self, tab_id: TabId) -> Option<TabHandle> {
        let mut active = self.active.write();
        if *active == Some(tab_id) {
            *active = None;
        }
        self.tabs.remove(&tab_id).map(|(_, h)| h)
    }

    pub fn get(&self, tab_id: TabId) -> Option<TabHandle> {
        self.tabs.get(&tab_id).map(|h| h.clone())
    }

    pub fn contains(&self, tab_id: TabId) -> bool {
        self.tabs.contains_key(&tab_id)
    }

    pub fn attach_content(&self, tab_id: TabId, port: RuntimePort) -> Result<(), BusError> {
        let mut tab = self.tabs.get_mut(&tab_id).ok_or(BusError::TabNotFound(tab_id))?;
        tab.content = Some(port);
        Ok(())
    }

    pub fn detach_content(&self, tab_id: TabId) {
        if let Some(mut tab) = self.tabs.get_mut(&tab_id) {
            tab.content = None;
        }
    }

    pub fn set_url(&self, tab_id: TabId, url: impl Into<String>) -> Result<(), BusError> {
        let mut tab = self.tabs.get_mut(&tab_id).ok_or(BusError::TabNotFound(tab_id))?;
        tab.url = url.into();
        Ok(())
    }

    pub fn set_restricted(&self, tab_id: TabId, restricted: bool) {
        if let Some(mut tab) = self.tabs.get_mut(&tab_id) {
            tab.restricted = restricted;
        }
    }

    pub fn set_active(&self, tab_id: TabId) -> Result<(), BusError> {
        if !self.contains(tab_id) {
            return Err(BusError::TabNotFound(tab_id));
        }
        *self.active.write() = Some(tab_id);
        Ok(())
    }

    pub fn active(&self) -> Option<TabId> {
        *self.active.read()
    }

    /// Snapshot of `(id, url)` pairs, sorted by id.
    pub fn list(&self) -> Vec<(TabId, String)> {
        let mut tabs: Vec<(TabId, String)> = self
            .tabs
            .iter()
            .map(|entry| (*entry.key(), entry.value().url.clone()))
            .collect();
        tabs.sort_by_key(|(id, _)| *id);
        tabs
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use waymark_protocols::{PageMessage, EXTENSION_SOURCE};

    use super::*;
    use crate::runtime::runtime_channel;

    #[test]
    fn test_open_close_and_active() {
        let tabs = TabRegistry::new();
        tabs.open(1, TabHandle::new("https://a.example/", PagePort::new()));
        tabs.open(2, TabHandle::new("https://b.example/", PagePort::new()));
        tabs.set_active(2).unwrap();
        assert_eq!(tabs.active(), Some(2));
        assert_eq!(tabs.len(), 2);

        tabs.close(2);
        assert_eq!(tabs.active(), None);
        assert!(matches!(tabs.set_active(2), Err(BusError::TabNotFound(2))));
        assert_eq!(tabs.list(), vec![(1, "https://a.example/".to_string())]);
    }

    #[test]
    fn test_live_content_ignores_closed_port() {
        let tabs = TabRegistry::new();
        tabs.open(1, TabHandle::new("https://a.example/", PagePort::new()));
        assert!(tabs.get(1).unwrap().live_content().is_none());

        let (port, rx) = runtime_channel();
        tabs.attach_content(1, port).unwrap();
        assert!(tabs.get(1).unwrap().live_content().is_some());

        drop(rx);
        assert!(tabs.get(1).unwrap().live_content().is_none());
    }

    #[tokio::test]
    async fn test_relay_posts_to_page() {
        let page = PagePort::new();
        let mut sub = page.subscribe(EXTENSION_SOURCE);
        let tab = TabHandle::new("https://app.example/", page);

        PageRelayInjector
            .inject_relay(3, &tab, PagePost::new(EXTENSION_SOURCE, PageMessage::PickerClosed))
            .unwrap();
        assert_eq!(sub.recv().await, Some(PageMessage::PickerClosed));
    }

    #[test]
    fn test_relay_refused_on_restricted_tab() {
        let mut tab = TabHandle::new("chrome://settings", PagePort::new());
        tab.restricted = true;
        let err = PageRelayInjector
            .inject_relay(4, &tab, PagePost::new(EXTENSION_SOURCE, PageMessage::PickerClosed))
            .unwrap_err();
        assert!(matches!(err, BusError::InjectionFailed { tab_id: 4, .. }));
    }
}
