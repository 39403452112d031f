//! The background service.
//!
//! Long-lived and page-independent: owns configuration, talks to the
//! guidance API, tracks tabs and which of them is picking, and relays picker
//! results to every tab hosting the web application.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;
use waymark_api::GuidanceApi;
use waymark_config::ConfigStore;
use waymark_core::{filter_for_url, url_pattern};
use waymark_protocols::{
    ApiError, BusError, ElementInfo, Envelope, ExternalMessage, ExternalRequest, PageMessage,
    PagePost, Response, RuntimeMessage, Source, TabId, Tour, EXTENSION_SOURCE,
};

use crate::external;
use crate::runtime::RuntimeRequest;
use crate::tabs::{PageRelayInjector, ScriptInjector, TabHandle, TabRegistry};

/// Captures the visible part of a tab as a data URL.
pub trait TabCapture: Send + Sync {
    fn capture_visible(&self, tab_id: TabId) -> Result<String, BusError>;
}

/// Proof that a tab's picker session belongs to one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PickerToken(Uuid);

impl PickerToken {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Picker outcome relayed to web-app tabs.
#[derive(Debug, Clone)]
enum Relay {
    Selected(ElementInfo),
    Closed,
}

impl Relay {
    fn runtime(&self) -> RuntimeMessage {
        match self {
            Relay::Selected(element) => RuntimeMessage::ElementSelected {
                element: element.clone(),
            },
            Relay::Closed => RuntimeMessage::PickerClosed,
        }
    }

    fn page(&self) -> PageMessage {
        match self {
            Relay::Selected(element) => PageMessage::ElementSelected {
                element: element.clone(),
            },
            Relay::Closed => PageMessage::PickerClosed,
        }
    }
}

pub struct Background {
    config: Arc<ConfigStore>,
    tabs: Arc<TabRegistry>,
    injector: Arc<dyn ScriptInjector>,
    capture: Option<Arc<dyn TabCapture>>,
    pickers: DashMap<TabId, PickerToken>,
    current_tour: Mutex<Option<Tour>>,
}

impl Background {
    pub fn new(config: Arc<ConfigStore>, tabs: Arc<TabRegistry>) -> Self {
        Self {
            config,
            tabs,
            injector: Arc::new(PageRelayInjector),
            capture: None,
            pickers: DashMap::new(),
            current_tour: Mutex::new(None),
        }
    }

    pub fn with_injector(mut self, injector: Arc<dyn ScriptInjector>) -> Self {
        self.injector = injector;
        self
    }

    pub fn with_capture(mut self, capture: Arc<dyn TabCapture>) -> Self {
        self.capture = Some(capture);
        self
    }

    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    pub fn tabs(&self) -> &Arc<TabRegistry> {
        &self.tabs
    }

    /// Whether `tab_id` currently holds a picker token.
    pub fn is_picking(&self, tab_id: TabId) -> bool {
        self.pickers.contains_key(&tab_id)
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.config.snapshot().bus.request_timeout_ms)
    }

    /// Serve runtime requests until every sender is gone. Each request is
    /// answered from its own task, so slow handlers never block the queue.
    pub fn serve(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<RuntimeRequest>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                let background = Arc::clone(&self);
                tokio::spawn(async move {
                    let RuntimeRequest { envelope, responder } = request;
                    if let Some(response) = background.handle(envelope).await {
                        if !responder.send(response) {
                            debug!("Caller gave up before the reply");
                        }
                    }
                });
            }
            debug!("Background runtime channel closed");
        })
    }

    /// Handle one runtime message. `None` means the message was ignored.
    pub async fn handle(&self, envelope: Envelope) -> Option<Response> {
        if envelope.source == Source::Background {
            debug!("Ignoring {} from background source", envelope.message.kind());
            return None;
        }
        debug!("Background handling {} from {:?}", envelope.message.kind(), envelope.source);

        let sender_tab = envelope.tab_id;
        let response = match envelope.message {
            RuntimeMessage::SetApiToken { token } => match self.config.set_api_token(token) {
                Ok(()) => Response::ok(),
                Err(e) => Response::failure(e.to_string()),
            },
            RuntimeMessage::SetApiUrl { url } => match self.config.set_api_url(url) {
                Ok(()) => Response::ok(),
                Err(e) => Response::failure(e.to_string()),
            },
            RuntimeMessage::GetConfig => {
                let config = self.config.snapshot();
                Response::ok_with(json!({
                    "apiUrl": config.api.base_url,
                    "hasToken": config.api.token.is_some(),
                    "lang": config.api.lang,
                }))
            }
            RuntimeMessage::FetchTours { url } => self.fetch_tours(&url).await,
            RuntimeMessage::FetchTooltips { url, lang } => self.fetch_tooltips(&url, lang).await,
            RuntimeMessage::FetchBanners { url } => self.fetch_banners(&url).await,
            RuntimeMessage::ValidateToken { token } => self.validate_token(token).await,
            RuntimeMessage::StartPicker { tab_id } => match tab_id.or(sender_tab).or(self.tabs.active()) {
                Some(tab_id) => self.start_picker(tab_id).await,
                None => Response::failure("No active tab"),
            },
            RuntimeMessage::ElementSelected { element } => {
                self.release_picker(sender_tab);
                self.broadcast_to_web_apps(Relay::Selected(element)).await;
                Response::ok()
            }
            RuntimeMessage::PickerClosed => {
                self.release_picker(sender_tab);
                self.broadcast_to_web_apps(Relay::Closed).await;
                Response::ok()
            }
            RuntimeMessage::GetActiveTab => match self.tabs.active().and_then(|id| self.tabs.get(id).map(|t| (id, t))) {
                Some((id, tab)) => Response::ok_with(json!({ "tabId": id, "url": tab.url })),
                None => Response::failure("No active tab"),
            },
            RuntimeMessage::SetCurrentTour { tour } => {
                info!("Current tour set to '{}'", tour.id);
                *self.current_tour.lock() = Some(tour);
                Response::ok()
            }
            RuntimeMessage::StartTour { tour } => {
                let tour = tour.or_else(|| self.current_tour.lock().clone());
                match tour {
                    Some(tour) => {
                        self.forward(sender_tab, RuntimeMessage::StartTour { tour: Some(tour) })
                            .await
                    }
                    None => Response::failure("No tour selected"),
                }
            }
            message @ (RuntimeMessage::NextStep
            | RuntimeMessage::PrevStep
            | RuntimeMessage::CloseEditor
            | RuntimeMessage::OpenEditor
            | RuntimeMessage::GetStatus) => self.forward(sender_tab, message).await,
            RuntimeMessage::CaptureScreenshot => self.capture_screenshot(sender_tab),
        };
        Some(response)
    }

    /// Handle a message from an external origin. Unknown origins are ignored.
    pub async fn handle_external(&self, request: ExternalRequest) -> Option<Response> {
        let allowed = self.config.snapshot().bus.allowed_external_origins;
        let message = external::admit(&allowed, request)?;
        let response = match message {
            ExternalMessage::Ping => Response::ok_with(json!({ "version": crate::VERSION })),
            ExternalMessage::StartPicker { tab_id } => match tab_id.or(self.tabs.active()) {
                Some(tab_id) => self.start_picker(tab_id).await,
                None => Response::failure("No active tab"),
            },
        };
        Some(response)
    }

    fn api(&self) -> Result<GuidanceApi, ApiError> {
        GuidanceApi::from_config(&self.config.snapshot().api)
    }

    async fn fetch_tours(&self, url: &str) -> Response {
        let result = match self.api() {
            Ok(api) => api.fetch_tours(url).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(tours) => Response::ok_with(filter_for_url(&tours, url)),
            Err(e) => api_failure("tours", e),
        }
    }

    async fn fetch_tooltips(&self, url: &str, lang: Option<String>) -> Response {
        let lang = lang.unwrap_or_else(|| self.config.snapshot().api.lang);
        let result = match self.api() {
            Ok(api) => api.fetch_tooltips(url, &lang).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(tooltips) => Response::ok_with(filter_for_url(&tooltips, url)),
            Err(e) => api_failure("tooltips", e),
        }
    }

    async fn fetch_banners(&self, url: &str) -> Response {
        let result = match self.api() {
            Ok(api) => api.fetch_banners(url).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(banners) => Response::ok_with(filter_for_url(&banners, url)),
            Err(e) => api_failure("banners", e),
        }
    }

    async fn validate_token(&self, token: Option<String>) -> Response {
        let result = match self.api() {
            Ok(api) => api.validate_token(token.as_deref()).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(valid) => Response::ok_with(json!({ "valid": valid })),
            Err(e) => api_failure("token validation", e),
        }
    }

    /// Claim the tab's picker and ask its content script to start.
    async fn start_picker(&self, tab_id: TabId) -> Response {
        let Some(tab) = self.tabs.get(tab_id) else {
            return Response::failure(BusError::TabNotFound(tab_id).to_string());
        };

        let token = PickerToken::new();
        match self.pickers.entry(tab_id) {
            Entry::Occupied(_) => {
                warn!("Rejecting second picker request for tab {}", tab_id);
                return Response::failure(format!("Picker already active in tab {}", tab_id));
            }
            Entry::Vacant(slot) => {
                slot.insert(token);
            }
        }

        let Some(port) = tab.live_content() else {
            self.release_token(tab_id, token);
            return Response::failure(BusError::NoReceiver(tab_id).to_string());
        };
        let envelope = Envelope::new(Source::Background, RuntimeMessage::StartPicker { tab_id: Some(tab_id) });
        match port.request(envelope, self.request_timeout()).await {
            Ok(response) if response.success => {
                info!("Picker started in tab {}", tab_id);
                Response::ok_with(json!({ "tabId": tab_id }))
            }
            Ok(response) => {
                self.release_token(tab_id, token);
                response
            }
            Err(e) => {
                self.release_token(tab_id, token);
                warn!("Could not start picker in tab {}: {}", tab_id, e);
                Response::failure(e.to_string())
            }
        }
    }

    /// Release `token` only if it is still the one held for the tab.
    fn release_token(&self, tab_id: TabId, token: PickerToken) {
        self.pickers.remove_if(&tab_id, |_, held| *held == token);
    }

    fn release_picker(&self, tab_id: Option<TabId>) {
        if let Some(tab_id) = tab_id {
            if self.pickers.remove(&tab_id).is_some() {
                debug!("Picker token for tab {} released", tab_id);
            }
        }
    }

    /// Tab navigated: its content script restarts, so any pick is over.
    pub fn on_tab_navigated(&self, tab_id: TabId, url: &str) {
        self.release_picker(Some(tab_id));
        if let Err(e) = self.tabs.set_url(tab_id, url) {
            debug!("Navigation for unknown tab: {}", e);
        }
    }

    pub fn on_tab_closed(&self, tab_id: TabId) {
        self.release_picker(Some(tab_id));
        self.tabs.close(tab_id);
    }

    /// Forward a message to the content script of `tab_id` (or the active
    /// tab) and hand back its reply.
    async fn forward(&self, tab_id: Option<TabId>, message: RuntimeMessage) -> Response {
        let Some(tab_id) = tab_id.or(self.tabs.active()) else {
            return Response::failure("No active tab");
        };
        let Some(port) = self.tabs.get(tab_id).and_then(|t| t.live_content().cloned()) else {
            return Response::failure(BusError::NoReceiver(tab_id).to_string());
        };
        let kind = message.kind();
        match port
            .request(Envelope::new(Source::Background, message), self.request_timeout())
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("{} to tab {} failed: {}", kind, tab_id, e);
                Response::failure(e.to_string())
            }
        }
    }

    fn capture_screenshot(&self, tab_id: Option<TabId>) -> Response {
        let Some(capture) = &self.capture else {
            return Response::failure("Screenshot capture is not available");
        };
        let Some(tab_id) = tab_id.or(self.tabs.active()) else {
            return Response::failure("No active tab");
        };
        match capture.capture_visible(tab_id) {
            Ok(data_url) => Response::ok_with(json!({ "dataUrl": data_url })),
            Err(e) => Response::failure(e.to_string()),
        }
    }

    /// Deliver a picker outcome to every tab hosting the web app.
    async fn broadcast_to_web_apps(&self, relay: Relay) {
        let patterns = self.config.snapshot().bus.web_app_urls;
        let targets: Vec<(TabId, String)> = self
            .tabs
            .list()
            .into_iter()
            .filter(|(_, url)| patterns.is_empty() || patterns.iter().any(|p| url_pattern::matches(p, url)))
            .collect();

        for (tab_id, _) in targets {
            if let Some(tab) = self.tabs.get(tab_id) {
                self.deliver(tab_id, &tab, &relay).await;
            }
        }
    }

    /// Direct delivery to the content script, then one injection attempt.
    /// Failure of both is logged and dropped.
    async fn deliver(&self, tab_id: TabId, tab: &TabHandle, relay: &Relay) {
        if let Some(port) = tab.live_content() {
            let envelope = Envelope::new(Source::Background, relay.runtime());
            match port.request(envelope, self.request_timeout()).await {
                Ok(response) if response.success => return,
                Ok(response) => debug!(
                    "Tab {} refused relay: {}",
                    tab_id,
                    response.error.unwrap_or_default()
                ),
                Err(e) => debug!("Direct delivery to tab {} failed: {}", tab_id, e),
            }
        }

        let post = PagePost::new(EXTENSION_SOURCE, relay.page());
        if let Err(e) = self.injector.inject_relay(tab_id, tab, post) {
            warn!("Dropping picker relay for tab {}: {}", tab_id, e);
        }
    }
}

fn api_failure(what: &str, error: ApiError) -> Response {
    if error.is_auth_failure() {
        warn!("Fetching {} was rejected: {}", what, error);
    } else {
        warn!("Fetching {} failed: {}", what, error);
    }
    Response::failure(error.to_string())
}

#[cfg(test)]
#[path = "background_tests.rs"]
mod tests;
