//! Wires a background, its tabs and their content scripts together.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use waymark_config::ConfigStore;
use waymark_core::SharedDocument;
use waymark_protocols::{Source, TabId};

use crate::background::Background;
use crate::content::{ContentScript, ContentSettings};
use crate::page::PagePort;
use crate::runtime::{runtime_channel, RuntimeClient, RuntimePort};
use crate::tabs::{TabHandle, TabRegistry};

/// A running extension: one background plus a content script per
/// scriptable tab.
pub struct Extension {
    background: Arc<Background>,
    port: RuntimePort,
    settings: ContentSettings,
    contents: DashMap<TabId, Arc<ContentScript>>,
    serve: JoinHandle<()>,
}

impl Extension {
    /// Start a background on `config` with an empty tab registry.
    pub fn start(config: Arc<ConfigStore>) -> Self {
        Self::with_background(Background::new(config, Arc::new(TabRegistry::new())))
    }

    pub fn with_background(background: Background) -> Self {
        let settings = ContentSettings::from_config(&background.config().snapshot());
        let background = Arc::new(background);
        let (port, requests) = runtime_channel();
        let serve = Arc::clone(&background).serve(requests);
        info!("Extension started");
        Self {
            background,
            port,
            settings,
            contents: DashMap::new(),
            serve,
        }
    }

    pub fn background(&self) -> &Arc<Background> {
        &self.background
    }

    /// A runtime client talking to the background as `source`.
    pub fn client(&self, source: Source) -> RuntimeClient {
        RuntimeClient::new(self.port.clone(), source, self.settings.request_timeout)
    }

    /// The popup's view of the background.
    pub fn popup(&self) -> RuntimeClient {
        self.client(Source::Popup)
    }

    /// Open a tab on `document`, inject its content script and focus it.
    pub fn open_tab(&self, tab_id: TabId, url: &str, document: SharedDocument) -> Arc<ContentScript> {
        let page = self.open_bare_tab(tab_id, url);
        let (script, port) = ContentScript::mount(
            tab_id,
            url,
            document,
            page,
            self.port.clone(),
            self.settings.clone(),
        );
        if let Err(e) = self.background.tabs().attach_content(tab_id, port) {
            debug!("Could not attach content script: {}", e);
        }
        self.contents.insert(tab_id, Arc::clone(&script));
        script
    }

    /// Open a tab without a content script, the way tabs that were open
    /// before the extension loaded look. Returns the tab's page port.
    pub fn open_bare_tab(&self, tab_id: TabId, url: &str) -> PagePort {
        let page = PagePort::new();
        let tabs = self.background.tabs();
        tabs.open(tab_id, TabHandle::new(url, page.clone()));
        if let Err(e) = tabs.set_active(tab_id) {
            debug!("Could not focus tab: {}", e);
        }
        page
    }

    pub fn content(&self, tab_id: TabId) -> Option<Arc<ContentScript>> {
        self.contents.get(&tab_id).map(|c| Arc::clone(c.value()))
    }

    /// Navigate a tab: reset its content script and load the new page's
    /// guidance.
    pub async fn navigate(&self, tab_id: TabId, url: &str) -> Option<JoinHandle<()>> {
        self.background.on_tab_navigated(tab_id, url);
        let script = self.content(tab_id)?;
        script.navigate(url).await;
        Some(script.load_guidance())
    }

    pub fn close_tab(&self, tab_id: TabId) {
        if let Some((_, script)) = self.contents.remove(&tab_id) {
            script.unmount();
        }
        self.background.on_tab_closed(tab_id);
    }
}

impl Drop for Extension {
    fn drop(&mut self) {
        for entry in self.contents.iter() {
            entry.value().unmount();
        }
        self.serve.abort();
    }
}
