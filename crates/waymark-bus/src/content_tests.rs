use std::time::Duration;

use serde_json::Value;
use waymark_core::NodeId;
use waymark_protocols::Rect;

use super::*;

type Seen = Arc<Mutex<Vec<Envelope>>>;

/// A background stand-in: records every envelope and answers with `reply`.
fn fake_background(reply: impl Fn(&RuntimeMessage) -> Response + Send + 'static) -> (RuntimePort, Seen) {
    let (port, mut rx) = runtime_channel();
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            let response = reply(&request.envelope.message);
            log.lock().push(request.envelope);
            request.responder.send(response);
        }
    });
    (port, seen)
}

fn settings() -> ContentSettings {
    ContentSettings {
        request_timeout: Duration::from_secs(1),
        locate_timeout: Duration::from_millis(200),
    }
}

fn save_button(doc: &SharedDocument) -> NodeId {
    let button = doc.create_element("button");
    doc.set_attribute(button, "id", "save");
    doc.set_text(button, "Save");
    doc.set_rect(button, Rect::new(10.0, 20.0, 80.0, 30.0));
    doc.append_child(doc.body(), button);
    button
}

fn mount(background: RuntimePort) -> (Arc<ContentScript>, RuntimePort, PagePort) {
    let page = PagePort::new();
    let (script, port) = ContentScript::mount(
        5,
        "https://shop.example/cart",
        SharedDocument::default(),
        page.clone(),
        background,
        settings(),
    );
    (script, port, page)
}

fn from_background(message: RuntimeMessage) -> Envelope {
    Envelope::new(Source::Background, message)
}

fn tour(auto_start: bool) -> Tour {
    serde_json::from_value(json!({
        "id": "checkout",
        "urlPattern": "/cart",
        "autoStart": auto_start,
        "steps": [
            { "selector": "#save", "title": "Save", "content": "Keep your cart" },
            { "selector": "#missing", "title": "Pay" }
        ]
    }))
    .unwrap()
}

async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

async fn next_page_message(sub: &mut PageSubscriber) -> PageMessage {
    tokio::time::timeout(Duration::from_secs(1), sub.recv())
        .await
        .expect("page message")
        .expect("page port open")
}

#[tokio::test]
async fn test_mount_announces_readiness() {
    let page = PagePort::new();
    let mut sub = page.subscribe(EXTENSION_SOURCE);
    let (background, _) = fake_background(|_| Response::ok());
    let (script, _port) = ContentScript::mount(1, "https://a.example/", SharedDocument::default(), page, background, settings());

    assert_eq!(
        next_page_message(&mut sub).await,
        PageMessage::ExtensionReady {
            version: crate::VERSION.to_string()
        }
    );
    assert_eq!(script.mode(), EditorMode::Idle);
    assert!(script.document().read().is_connected(script.overlay().host()));
}

#[tokio::test]
async fn test_only_background_and_popup_are_served() {
    let (background, _) = fake_background(|_| Response::ok());
    let (script, _, _) = mount(background);

    for source in [Source::WebApp, Source::ContentScript] {
        let envelope = Envelope::new(source, RuntimeMessage::StartPicker { tab_id: None });
        assert!(script.handle(envelope).await.is_none());
    }
    assert_eq!(script.mode(), EditorMode::Idle);

    let popup = Envelope::new(Source::Popup, RuntimeMessage::GetStatus);
    let response = script.handle(popup).await.unwrap();
    assert_eq!(response.data.unwrap()["mode"], "idle");
}

#[tokio::test]
async fn test_start_picker_announces_and_rejects_repeat() {
    let (background, _) = fake_background(|_| Response::ok());
    let (script, _, page) = mount(background);
    let mut sub = page.subscribe(EXTENSION_SOURCE);

    let response = script
        .handle(from_background(RuntimeMessage::StartPicker { tab_id: Some(5) }))
        .await
        .unwrap();
    assert!(response.success);
    assert_eq!(script.mode(), EditorMode::Picking);
    assert_eq!(next_page_message(&mut sub).await, PageMessage::PickerStarted);

    let response = script
        .handle(from_background(RuntimeMessage::StartPicker { tab_id: Some(5) }))
        .await
        .unwrap();
    assert!(!response.success);
    assert_eq!(sub.try_recv(), None);
}

#[tokio::test]
async fn test_popup_cannot_start_picker_directly() {
    let (background, _) = fake_background(|_| Response::ok());
    let (script, _, page) = mount(background);
    let mut sub = page.subscribe(EXTENSION_SOURCE);

    let popup = Envelope::new(Source::Popup, RuntimeMessage::StartPicker { tab_id: Some(5) });
    let response = script.handle(popup).await.unwrap();
    assert_eq!(
        response.error.as_deref(),
        Some("START_PICKER must go through the background")
    );
    assert_eq!(script.mode(), EditorMode::Idle);
    assert_eq!(sub.try_recv(), None);
}

#[tokio::test]
async fn test_click_reports_selection_to_background_only() {
    let (background, seen) = fake_background(|_| Response::ok());
    let (script, _, page) = mount(background);
    let button = save_button(script.document());
    script
        .handle(from_background(RuntimeMessage::StartPicker { tab_id: None }))
        .await
        .unwrap();
    let mut sub = page.subscribe(EXTENSION_SOURCE);

    let event = script.document().click(button);
    assert!(event.default_prevented());
    assert_eq!(script.mode(), EditorMode::Editing);

    wait_until(|| !seen.lock().is_empty()).await;
    let envelope = seen.lock()[0].clone();
    assert_eq!(envelope.source, Source::ContentScript);
    assert_eq!(envelope.tab_id, Some(5));
    match envelope.message {
        RuntimeMessage::ElementSelected { element } => {
            assert_eq!(element.selector, "#save");
            assert_eq!(element.captured_text, "Save");
        }
        other => panic!("unexpected {:?}", other),
    }
    // The page only hears about it through the background's broadcast.
    assert_eq!(sub.try_recv(), None);
    assert_eq!(script.overlay().state().editor.map(|e| e.selector), Some("#save".to_string()));
}

#[tokio::test]
async fn test_escape_reports_picker_closed() {
    let (background, seen) = fake_background(|_| Response::ok());
    let (script, _, _) = mount(background);
    script
        .handle(from_background(RuntimeMessage::StartPicker { tab_id: None }))
        .await
        .unwrap();

    script.document().key_down("Escape");
    assert_eq!(script.mode(), EditorMode::Idle);
    wait_until(|| !seen.lock().is_empty()).await;
    assert_eq!(seen.lock()[0].message, RuntimeMessage::PickerClosed);
}

#[tokio::test]
async fn test_relays_broadcasts_to_page() {
    let (background, _) = fake_background(|_| Response::ok());
    let (script, _, page) = mount(background);
    let mut sub = page.subscribe(EXTENSION_SOURCE);
    let element = ElementInfo {
        selector: "#save".to_string(),
        rect: Rect::default(),
        captured_text: "Save".to_string(),
        tag_name: "button".to_string(),
    };

    script
        .handle(from_background(RuntimeMessage::ElementSelected { element: element.clone() }))
        .await
        .unwrap();
    script
        .handle(from_background(RuntimeMessage::PickerClosed))
        .await
        .unwrap();

    assert_eq!(next_page_message(&mut sub).await, PageMessage::ElementSelected { element });
    assert_eq!(next_page_message(&mut sub).await, PageMessage::PickerClosed);
}

#[tokio::test]
async fn test_background_messages_are_refused() {
    let (background, _) = fake_background(|_| Response::ok());
    let (script, _, _) = mount(background);
    let response = script
        .handle(from_background(RuntimeMessage::FetchTours {
            url: "https://a.example/".to_string(),
        }))
        .await
        .unwrap();
    assert!(!response.success);
    assert!(response.error.unwrap().contains("FETCH_TOURS"));
}

#[tokio::test]
async fn test_page_ping_and_status() {
    let (background, _) = fake_background(|_| Response::ok());
    let (_script, _, page) = mount(background);
    let mut sub = page.subscribe(EXTENSION_SOURCE);

    page.post_message(APP_SOURCE, PageMessage::Ping);
    assert_eq!(
        next_page_message(&mut sub).await,
        PageMessage::Pong {
            version: crate::VERSION.to_string()
        }
    );

    page.post_message(APP_SOURCE, PageMessage::GetStatus);
    assert_eq!(
        next_page_message(&mut sub).await,
        PageMessage::StatusResponse {
            mode: EditorMode::Idle,
            version: crate::VERSION.to_string()
        }
    );
}

#[tokio::test]
async fn test_page_messages_from_other_sources_ignored() {
    let (background, seen) = fake_background(|_| Response::ok());
    let (_script, _, page) = mount(background);

    page.post_message("some-widget", PageMessage::StartPicker);
    page.post_message(EXTENSION_SOURCE, PageMessage::StartPicker);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(seen.lock().is_empty());
}

#[tokio::test]
async fn test_page_start_picker_goes_through_background() {
    let (background, seen) = fake_background(|_| Response::ok());
    let (_script, _, page) = mount(background);

    page.post_message(APP_SOURCE, PageMessage::StartPicker);
    wait_until(|| !seen.lock().is_empty()).await;

    let envelope = seen.lock()[0].clone();
    assert_eq!(envelope.source, Source::WebApp);
    assert_eq!(envelope.tab_id, Some(5));
    assert_eq!(envelope.message, RuntimeMessage::StartPicker { tab_id: Some(5) });
}

#[tokio::test]
async fn test_page_screenshot_round_trip() {
    let (background, _) = fake_background(|message| match message {
        RuntimeMessage::CaptureScreenshot => Response::ok_with(json!({ "dataUrl": "data:image/png;base64,AAAA" })),
        _ => Response::failure("unexpected"),
    });
    let (_script, _, page) = mount(background);
    let mut sub = page.subscribe(EXTENSION_SOURCE);

    page.post_message(APP_SOURCE, PageMessage::CaptureScreenshot);
    assert_eq!(
        next_page_message(&mut sub).await,
        PageMessage::ScreenshotCaptured {
            data_url: Some("data:image/png;base64,AAAA".to_string()),
            error: None,
        }
    );
}

#[tokio::test]
async fn test_tour_playback_and_close() {
    let (background, _) = fake_background(|_| Response::ok());
    let (script, _, _) = mount(background);
    save_button(script.document());

    let response = script
        .handle(from_background(RuntimeMessage::StartTour { tour: Some(tour(false)) }))
        .await
        .unwrap();
    let data: Value = response.data.unwrap();
    assert_eq!(data["index"], 0);
    assert_eq!(data["anchored"], true);
    assert_eq!(script.mode(), EditorMode::Viewing);

    let response = script.handle(from_background(RuntimeMessage::NextStep)).await.unwrap();
    let data: Value = response.data.unwrap();
    assert_eq!(data["index"], 1);
    assert_eq!(data["anchored"], false);

    script.handle(from_background(RuntimeMessage::CloseEditor)).await.unwrap();
    assert_eq!(script.mode(), EditorMode::Idle);
    assert!(script.overlay().state().step.is_none());
}

fn mount_slow(background: RuntimePort) -> Arc<ContentScript> {
    let slow = ContentSettings {
        request_timeout: Duration::from_secs(1),
        locate_timeout: Duration::from_secs(30),
    };
    let (script, _port) = ContentScript::mount(
        7,
        "https://shop.example/cart",
        SharedDocument::default(),
        PagePort::new(),
        background,
        slow,
    );
    script
}

#[tokio::test]
async fn test_close_editor_while_step_waits_for_anchor() {
    let (background, _) = fake_background(|_| Response::ok());
    let script = mount_slow(background);
    save_button(script.document());
    script
        .handle(from_background(RuntimeMessage::StartTour { tour: Some(tour(false)) }))
        .await
        .unwrap();

    let pending = tokio::spawn({
        let script = Arc::clone(&script);
        async move { script.handle(from_background(RuntimeMessage::NextStep)).await }
    });
    wait_until(|| script.document().observer_count() == 1).await;

    let closed = tokio::time::timeout(
        Duration::from_secs(1),
        script.handle(from_background(RuntimeMessage::CloseEditor)),
    )
    .await
    .expect("close does not wait for the lookup");
    assert!(closed.unwrap().success);
    assert_eq!(script.mode(), EditorMode::Idle);
    assert!(script.overlay().state().step.is_none());
    assert_eq!(script.document().observer_count(), 0);

    let response = pending.await.unwrap().unwrap();
    assert_eq!(response.error.as_deref(), Some("Tour closed"));

    // Playback can start again afterwards.
    let response = script
        .handle(from_background(RuntimeMessage::StartTour { tour: Some(tour(false)) }))
        .await
        .unwrap();
    assert!(response.success);
}

#[tokio::test]
async fn test_navigate_while_step_waits_for_anchor() {
    let (background, _) = fake_background(|_| Response::ok());
    let script = mount_slow(background);
    save_button(script.document());
    script
        .handle(from_background(RuntimeMessage::StartTour { tour: Some(tour(false)) }))
        .await
        .unwrap();

    let pending = tokio::spawn({
        let script = Arc::clone(&script);
        async move { script.handle(from_background(RuntimeMessage::NextStep)).await }
    });
    wait_until(|| script.document().observer_count() == 1).await;

    tokio::time::timeout(Duration::from_secs(1), script.navigate("https://shop.example/done"))
        .await
        .expect("navigation does not wait for the lookup");
    assert_eq!(script.mode(), EditorMode::Idle);
    assert_eq!(script.url(), "https://shop.example/done");
    assert_eq!(script.document().observer_count(), 0);
    assert!(!pending.await.unwrap().unwrap().success);
}

#[tokio::test]
async fn test_start_tour_uses_current_tour() {
    let (background, _) = fake_background(|_| Response::ok());
    let (script, _, _) = mount(background);

    let response = script
        .handle(from_background(RuntimeMessage::StartTour { tour: None }))
        .await
        .unwrap();
    assert_eq!(response.error.as_deref(), Some("No tour selected"));

    script
        .handle(from_background(RuntimeMessage::SetCurrentTour { tour: tour(false) }))
        .await
        .unwrap();
    let response = script
        .handle(from_background(RuntimeMessage::StartTour { tour: None }))
        .await
        .unwrap();
    assert!(response.success);
    assert_eq!(script.mode(), EditorMode::Viewing);
}

#[tokio::test]
async fn test_open_editor_needs_selection() {
    let (background, _) = fake_background(|_| Response::ok());
    let (script, _, _) = mount(background);
    let response = script.handle(from_background(RuntimeMessage::OpenEditor)).await.unwrap();
    assert_eq!(response.error.as_deref(), Some("No element selected"));
}

#[tokio::test]
async fn test_navigation_resets_to_idle() {
    let (background, _) = fake_background(|_| Response::ok());
    let (script, _, _) = mount(background);
    script
        .handle(from_background(RuntimeMessage::StartPicker { tab_id: None }))
        .await
        .unwrap();
    assert_eq!(script.mode(), EditorMode::Picking);

    script.navigate("https://shop.example/checkout").await;
    assert_eq!(script.mode(), EditorMode::Idle);
    assert_eq!(script.url(), "https://shop.example/checkout");
    assert!(!script.overlay().state().pointer_passthrough);
    assert!(script.overlay().state().highlight.is_none());

    // The picker can be started again on the new page.
    let response = script
        .handle(from_background(RuntimeMessage::StartPicker { tab_id: None }))
        .await
        .unwrap();
    assert!(response.success);
}

fn guidance_replies(message: &RuntimeMessage) -> Response {
    match message {
        RuntimeMessage::FetchBanners { .. } => Response::ok_with(json!([
            { "id": "b1", "urlPattern": "/cart", "content": "Sale" },
            { "id": "b2", "urlPattern": "/admin", "content": "Hidden" }
        ])),
        RuntimeMessage::FetchTooltips { .. } => Response::ok_with(json!([
            { "id": "t1", "urlPattern": "*", "selector": "#save", "content": "Saves" },
            { "id": "t2", "urlPattern": "*", "selector": "#later", "content": "Appears later" }
        ])),
        RuntimeMessage::FetchTours { .. } => Response::ok_with(vec![tour(true)]),
        _ => Response::failure("unexpected"),
    }
}

#[tokio::test]
async fn test_load_guidance_renders_matching_items() {
    let (background, _) = fake_background(guidance_replies);
    let (script, _, _) = mount(background);
    save_button(script.document());

    script.load_guidance().await.unwrap();

    let state = script.overlay().state();
    assert_eq!(state.banners, vec!["b1".to_string()]);
    assert_eq!(state.tooltips.len(), 1);
    assert_eq!(state.tooltips[0].0, "t1");
    assert_eq!(script.mode(), EditorMode::Viewing);
    assert_eq!(state.step.map(|s| s.index), Some(0));
}

#[tokio::test]
async fn test_navigation_cancels_pending_lookups() {
    let (background, _) = fake_background(|message| match message {
        RuntimeMessage::FetchTooltips { .. } => Response::ok_with(json!([
            { "id": "t2", "urlPattern": "*", "selector": "#later" }
        ])),
        _ => Response::ok_with(Vec::<Value>::new()),
    });
    let page = PagePort::new();
    let slow = ContentSettings {
        request_timeout: Duration::from_secs(1),
        locate_timeout: Duration::from_secs(30),
    };
    let (script, _port) =
        ContentScript::mount(6, "https://shop.example/", SharedDocument::default(), page, background, slow);

    let load = script.load_guidance();
    wait_until(|| script.document().observer_count() == 1).await;

    script.navigate("https://shop.example/next").await;
    load.await.unwrap();
    assert_eq!(script.document().observer_count(), 0);
}

#[tokio::test]
async fn test_unmount_closes_runtime_port() {
    let (background, _) = fake_background(|_| Response::ok());
    let (script, port, _) = mount(background);
    let host = script.overlay().host();

    script.unmount();
    wait_until(|| port.is_closed()).await;
    assert!(!script.document().read().is_connected(host));
}
