//! The per-tab content script.
//!
//! Hosts the picker, the tour player and the overlay for one document. It
//! answers the background and the popup on its runtime channel, and the web
//! app on the page port. Everything page-scoped is torn down on navigation.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use waymark_config::ExtensionConfig;
use waymark_core::{
    filter_for_url, EditorStore, Locator, Picker, PickerEvent, RenderTarget, ShadowOverlay,
    SharedDocument, SharedStore, StepStatus, TourPlayer,
};
use waymark_protocols::{
    Banner, EditorMode, ElementInfo, Envelope, PageMessage, Response, RuntimeMessage, Source, TabId,
    Tooltip, Tour, APP_SOURCE, EXTENSION_SOURCE,
};

use crate::page::{PagePort, PageSubscriber};
use crate::runtime::{runtime_channel, RuntimeClient, RuntimePort, RuntimeRequest};

/// Timeouts a content script runs with.
#[derive(Debug, Clone)]
pub struct ContentSettings {
    pub request_timeout: Duration,
    pub locate_timeout: Duration,
}

impl Default for ContentSettings {
    fn default() -> Self {
        Self::from_config(&ExtensionConfig::default())
    }
}

impl ContentSettings {
    pub fn from_config(config: &ExtensionConfig) -> Self {
        Self {
            request_timeout: Duration::from_millis(config.bus.request_timeout_ms),
            locate_timeout: Duration::from_millis(config.locator.timeout_ms),
        }
    }
}

pub struct ContentScript {
    tab_id: TabId,
    url: RwLock<String>,
    document: SharedDocument,
    store: SharedStore,
    overlay: Arc<ShadowOverlay>,
    picker: Picker,
    locator: Locator,
    player: tokio::sync::Mutex<TourPlayer>,
    page: PagePort,
    background: RuntimeClient,
    /// Same channel, stamped as the web app it acts for.
    web_app: RuntimeClient,
    current_tour: Mutex<Option<Tour>>,
    /// Cancelled when playback is closed, so a step still waiting on its
    /// anchor lets go of the player.
    tour_cancel: Mutex<CancellationToken>,
    shutdown: CancellationToken,
    /// Child of `shutdown`, replaced on every navigation.
    page_tasks: Mutex<CancellationToken>,
}

impl ContentScript {
    /// Inject into `document`: mount the overlay, start the listeners and
    /// announce readiness on the page. Returns the script and the port the
    /// background reaches it on.
    pub fn mount(
        tab_id: TabId,
        url: impl Into<String>,
        document: SharedDocument,
        page: PagePort,
        background: RuntimePort,
        settings: ContentSettings,
    ) -> (Arc<Self>, RuntimePort) {
        let url = url.into();
        let store = EditorStore::shared();
        let overlay = Arc::new(ShadowOverlay::mount(document.clone()));
        let render: Arc<dyn RenderTarget> = overlay.clone();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let picker = Picker::new(document.clone(), store.clone(), render.clone(), events_tx);
        let locator = Locator::with_timeout(document.clone(), settings.locate_timeout);
        let player = TourPlayer::new(locator.clone(), render, store.clone());
        let shutdown = CancellationToken::new();

        let script = Arc::new(Self {
            tab_id,
            url: RwLock::new(url),
            document,
            store,
            overlay,
            picker,
            locator,
            player: tokio::sync::Mutex::new(player),
            page: page.clone(),
            background: RuntimeClient::new(background.clone(), Source::ContentScript, settings.request_timeout)
                .for_tab(tab_id),
            web_app: RuntimeClient::new(background, Source::WebApp, settings.request_timeout).for_tab(tab_id),
            current_tour: Mutex::new(None),
            tour_cancel: Mutex::new(shutdown.child_token()),
            page_tasks: Mutex::new(shutdown.child_token()),
            shutdown,
        });

        let (port, requests) = runtime_channel();
        Arc::clone(&script).spawn_runtime_loop(requests);
        Arc::clone(&script).spawn_picker_pump(events_rx);
        Arc::clone(&script).spawn_page_listener(page.subscribe(APP_SOURCE));

        page.post_message(EXTENSION_SOURCE, PageMessage::ExtensionReady {
            version: crate::VERSION.to_string(),
        });
        info!("Content script mounted in tab {}", tab_id);
        (script, port)
    }

    pub fn tab_id(&self) -> TabId {
        self.tab_id
    }

    pub fn url(&self) -> String {
        self.url.read().clone()
    }

    pub fn mode(&self) -> EditorMode {
        self.store.lock().mode()
    }

    pub fn selected(&self) -> Option<ElementInfo> {
        self.store.lock().selected().cloned()
    }

    pub fn document(&self) -> &SharedDocument {
        &self.document
    }

    pub fn overlay(&self) -> &Arc<ShadowOverlay> {
        &self.overlay
    }

    pub fn page(&self) -> &PagePort {
        &self.page
    }

    fn spawn_runtime_loop(self: Arc<Self>, mut requests: mpsc::UnboundedReceiver<RuntimeRequest>) {
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            loop {
                let request = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    request = requests.recv() => request,
                };
                let Some(RuntimeRequest { envelope, responder }) = request else {
                    break;
                };
                let script = Arc::clone(&self);
                tokio::spawn(async move {
                    if let Some(response) = script.handle(envelope).await {
                        if !responder.send(response) {
                            debug!("Caller gave up before the reply");
                        }
                    }
                });
            }
            debug!("Content runtime loop for tab {} stopped", self.tab_id);
        });
    }

    fn spawn_picker_pump(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<PickerEvent>) {
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    event = events.recv() => event,
                };
                let Some(event) = event else { break };
                let message = match event {
                    PickerEvent::Selected(element) => RuntimeMessage::ElementSelected { element },
                    PickerEvent::Cancelled => RuntimeMessage::PickerClosed,
                };
                let kind = message.kind();
                match self.background.send(message).await {
                    Ok(response) if response.success => debug!("{} delivered", kind),
                    Ok(response) => warn!("{} refused: {}", kind, response.error.unwrap_or_default()),
                    Err(e) => warn!("{} not delivered: {}", kind, e),
                }
            }
        });
    }

    fn spawn_page_listener(self: Arc<Self>, mut page: PageSubscriber) {
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    message = page.recv() => message,
                };
                let Some(message) = message else { break };
                self.handle_page(message).await;
            }
        });
    }

    /// Handle one runtime message. Only the background and the popup may
    /// drive a content script; anything else is ignored.
    pub async fn handle(&self, envelope: Envelope) -> Option<Response> {
        if !matches!(envelope.source, Source::Background | Source::Popup) {
            debug!("Ignoring {} from {:?}", envelope.message.kind(), envelope.source);
            return None;
        }

        let source = envelope.source;
        let response = match envelope.message {
            RuntimeMessage::StartPicker { .. } if source != Source::Background => {
                Response::failure("START_PICKER must go through the background")
            }
            RuntimeMessage::StartPicker { .. } => match self.picker.start() {
                Ok(()) => {
                    self.page.post_message(EXTENSION_SOURCE, PageMessage::PickerStarted);
                    Response::ok()
                }
                Err(e) => Response::failure(e.to_string()),
            },
            RuntimeMessage::ElementSelected { element } => {
                self.page
                    .post_message(EXTENSION_SOURCE, PageMessage::ElementSelected { element });
                Response::ok()
            }
            RuntimeMessage::PickerClosed => {
                self.page.post_message(EXTENSION_SOURCE, PageMessage::PickerClosed);
                Response::ok()
            }
            RuntimeMessage::SetCurrentTour { tour } => {
                *self.current_tour.lock() = Some(tour);
                Response::ok()
            }
            RuntimeMessage::StartTour { tour } => self.start_tour(tour).await,
            RuntimeMessage::NextStep => self.step(true).await,
            RuntimeMessage::PrevStep => self.step(false).await,
            RuntimeMessage::CloseEditor => {
                self.close_editor().await;
                Response::ok()
            }
            RuntimeMessage::OpenEditor => match self.selected() {
                Some(element) => {
                    self.overlay.show_editor(&element);
                    Response::ok()
                }
                None => Response::failure("No element selected"),
            },
            RuntimeMessage::GetStatus => Response::ok_with(json!({
                "tabId": self.tab_id,
                "url": self.url(),
                "mode": self.mode(),
                "selected": self.selected(),
            })),
            message @ (RuntimeMessage::SetApiToken { .. }
            | RuntimeMessage::SetApiUrl { .. }
            | RuntimeMessage::GetConfig
            | RuntimeMessage::FetchTours { .. }
            | RuntimeMessage::FetchTooltips { .. }
            | RuntimeMessage::FetchBanners { .. }
            | RuntimeMessage::ValidateToken { .. }
            | RuntimeMessage::GetActiveTab
            | RuntimeMessage::CaptureScreenshot) => {
                Response::failure(format!("{} is handled by the background", message.kind()))
            }
        };
        Some(response)
    }

    async fn handle_page(&self, message: PageMessage) {
        match message {
            PageMessage::Ping => {
                self.page.post_message(EXTENSION_SOURCE, PageMessage::Pong {
                    version: crate::VERSION.to_string(),
                });
            }
            PageMessage::GetStatus => {
                self.page.post_message(EXTENSION_SOURCE, PageMessage::StatusResponse {
                    mode: self.mode(),
                    version: crate::VERSION.to_string(),
                });
            }
            PageMessage::StartPicker => {
                let message = RuntimeMessage::StartPicker { tab_id: Some(self.tab_id) };
                match self.web_app.send(message).await {
                    Ok(response) if response.success => {}
                    Ok(response) => warn!(
                        "Picker request from page refused: {}",
                        response.error.unwrap_or_default()
                    ),
                    Err(e) => warn!("Picker request from page failed: {}", e),
                }
            }
            PageMessage::CaptureScreenshot => {
                let reply = match self.background.send(RuntimeMessage::CaptureScreenshot).await {
                    Ok(response) if response.success => PageMessage::ScreenshotCaptured {
                        data_url: response
                            .data
                            .as_ref()
                            .and_then(|d| d["dataUrl"].as_str())
                            .map(str::to_string),
                        error: None,
                    },
                    Ok(response) => PageMessage::ScreenshotCaptured {
                        data_url: None,
                        error: response.error,
                    },
                    Err(e) => PageMessage::ScreenshotCaptured {
                        data_url: None,
                        error: Some(e.to_string()),
                    },
                };
                self.page.post_message(EXTENSION_SOURCE, reply);
            }
            other @ (PageMessage::Pong { .. }
            | PageMessage::StatusResponse { .. }
            | PageMessage::ScreenshotCaptured { .. }
            | PageMessage::ExtensionReady { .. }
            | PageMessage::PickerStarted
            | PageMessage::ElementSelected { .. }
            | PageMessage::PickerClosed) => {
                debug!("Ignoring extension-bound page message {:?}", other);
            }
        }
    }

    async fn start_tour(&self, tour: Option<Tour>) -> Response {
        let Some(tour) = tour.or_else(|| self.current_tour.lock().clone()) else {
            return Response::failure("No tour selected");
        };
        let cancel = self.tour_cancel.lock().clone();
        let started = tokio::select! {
            _ = cancel.cancelled() => None,
            started = async { self.player.lock().await.start(tour).await } => Some(started),
        };
        match started {
            Some(Ok(status)) => status_response(status),
            Some(Err(e)) => Response::failure(e.to_string()),
            None => Response::failure("Tour closed"),
        }
    }

    async fn step(&self, forward: bool) -> Response {
        let cancel = self.tour_cancel.lock().clone();
        let status = tokio::select! {
            _ = cancel.cancelled() => None,
            status = async {
                let mut player = self.player.lock().await;
                if forward {
                    player.next().await
                } else {
                    player.previous().await
                }
            } => Some(status),
        };
        match status {
            Some(status) => status_response(status),
            None => Response::failure("Tour closed"),
        }
    }

    /// Abandon any step still being shown, then stop playback.
    async fn close_tour(&self) {
        {
            let mut cancel = self.tour_cancel.lock();
            cancel.cancel();
            *cancel = self.shutdown.child_token();
        }
        self.player.lock().await.close();
    }

    /// Leave whatever mode the tab is in.
    async fn close_editor(&self) {
        match self.mode() {
            EditorMode::Picking => {
                if let Err(e) = self.picker.cancel() {
                    debug!("Picker already stopped: {}", e);
                }
            }
            EditorMode::Viewing => self.close_tour().await,
            EditorMode::Editing => {
                self.overlay.hide_editor();
                let _ = self.store.lock().transition(EditorMode::Idle);
            }
            EditorMode::Idle => {}
        }
    }

    /// The page went away: cancel page work, drop listeners and overlay
    /// parts, and return to `idle`.
    pub async fn navigate(&self, url: impl Into<String>) {
        let url = url.into();
        {
            let mut tasks = self.page_tasks.lock();
            tasks.cancel();
            *tasks = self.shutdown.child_token();
        }
        self.picker.shutdown();
        self.close_tour().await;
        self.overlay.teardown();
        self.store.lock().reset();
        info!("Tab {} navigated to {}", self.tab_id, url);
        *self.url.write() = url;
    }

    /// Fetch and render the current page's guidance. Cancelled by the next
    /// navigation, which also abandons any pending element lookups.
    pub fn load_guidance(self: &Arc<Self>) -> JoinHandle<()> {
        let token = self.page_tasks.lock().clone();
        let script = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => debug!("Guidance load for tab {} cancelled", script.tab_id),
                _ = script.render_guidance() => {}
            }
        })
    }

    async fn render_guidance(&self) {
        let url = self.url();

        if let Some(banners) = self.fetch::<Vec<Banner>>(RuntimeMessage::FetchBanners { url: url.clone() }).await {
            for banner in filter_for_url(&banners, &url) {
                self.overlay.render_banner(&banner);
            }
        }

        let tooltips = self
            .fetch::<Vec<Tooltip>>(RuntimeMessage::FetchTooltips {
                url: url.clone(),
                lang: None,
            })
            .await
            .unwrap_or_default();
        let anchored = join_all(filter_for_url(&tooltips, &url).into_iter().map(|tooltip| async move {
            let node = self.locator.locate(&tooltip.selector).await?;
            let rect = self.document.read().bounding_client_rect(node);
            self.overlay.render_tooltip(&tooltip, rect);
            Some(())
        }))
        .await;
        debug!(
            "Rendered {}/{} tooltips in tab {}",
            anchored.iter().flatten().count(),
            anchored.len(),
            self.tab_id
        );

        let tours = self
            .fetch::<Vec<Tour>>(RuntimeMessage::FetchTours { url: url.clone() })
            .await
            .unwrap_or_default();
        if let Some(tour) = filter_for_url(&tours, &url).into_iter().find(|t| t.auto_start) {
            if self.mode() == EditorMode::Idle {
                let response = self.start_tour(Some(tour)).await;
                if !response.success {
                    warn!("Auto-start failed: {}", response.error.unwrap_or_default());
                }
            }
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, message: RuntimeMessage) -> Option<T> {
        let kind = message.kind();
        match self.background.send(message).await {
            Ok(response) if response.success => response.data_as(),
            Ok(response) => {
                warn!("{} failed: {}", kind, response.error.unwrap_or_default());
                None
            }
            Err(e) => {
                warn!("{} failed: {}", kind, e);
                None
            }
        }
    }

    /// Remove the script from its document for good.
    pub fn unmount(&self) {
        self.shutdown.cancel();
        self.picker.shutdown();
        self.overlay.unmount();
        info!("Content script unmounted from tab {}", self.tab_id);
    }
}

fn status_response(status: StepStatus) -> Response {
    match status {
        StepStatus::Shown { index, anchored } => {
            Response::ok_with(json!({ "index": index, "anchored": anchored, "finished": false }))
        }
        StepStatus::Finished => Response::ok_with(json!({ "finished": true })),
    }
}

#[cfg(test)]
#[path = "content_tests.rs"]
mod tests;
