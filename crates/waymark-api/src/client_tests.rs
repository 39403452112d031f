use super::*;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

fn api(server: &MockServer, token: Option<&str>) -> GuidanceApi {
    GuidanceApi::new(
        format!("{}/", server.uri()),
        token.map(str::to_string),
        Duration::from_secs(5),
    )
    .unwrap()
}

#[test]
fn test_from_config_trims_base_url() {
    let config = ApiConfig {
        base_url: "https://guidance.example.com/api/".to_string(),
        ..ApiConfig::default()
    };
    let api = GuidanceApi::from_config(&config).unwrap();
    assert_eq!(api.base_url(), "https://guidance.example.com/api");
}

#[tokio::test]
async fn test_fetch_tours_sends_bearer_and_url() {
    let server = MockServer::start().await;
    let body = serde_json::json!([
        {"id": "t1", "urlPattern": "/teams/*", "steps": [{"selector": "#save"}]}
    ]);

    Mock::given(matchers::method("GET"))
        .and(matchers::path("/tours"))
        .and(matchers::query_param("url", "https://app.example.com/teams/1"))
        .and(matchers::header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .expect(1)
        .mount(&server)
        .await;

    let tours = api(&server, Some("secret"))
        .fetch_tours("https://app.example.com/teams/1")
        .await
        .unwrap();
    assert_eq!(tours.len(), 1);
    assert_eq!(tours[0].steps[0].selector, "#save");
}

#[tokio::test]
async fn test_fetch_tooltips_wrapped_body_and_lang() {
    let server = MockServer::start().await;
    let body = serde_json::json!({
        "data": [{"id": "tt", "urlPattern": "*", "selector": "#help", "content": "Aide"}]
    });

    Mock::given(matchers::method("GET"))
        .and(matchers::path("/tooltips"))
        .and(matchers::query_param("lang", "fr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .expect(1)
        .mount(&server)
        .await;

    let tooltips = api(&server, Some("secret"))
        .fetch_tooltips("https://x.example/", "fr")
        .await
        .unwrap();
    assert_eq!(tooltips[0].content, "Aide");
}

#[tokio::test]
async fn test_fetch_banners_empty() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/banners"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .expect(1)
        .mount(&server)
        .await;

    let banners = api(&server, Some("secret"))
        .fetch_banners("https://x.example/")
        .await
        .unwrap();
    assert!(banners.is_empty());
}

#[tokio::test]
async fn test_unauthorized_maps_to_auth_failure() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/tours"))
        .respond_with(
            ResponseTemplate::new(401).set_body_string(r#"{"error": "Invalid token"}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = api(&server, Some("stale"))
        .fetch_tours("https://x.example/")
        .await
        .unwrap_err();
    assert!(err.is_auth_failure());
    assert!(err.to_string().contains("Invalid token"));
}

#[tokio::test]
async fn test_server_error_keeps_status() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/banners"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .expect(1)
        .mount(&server)
        .await;

    let err = api(&server, Some("secret"))
        .fetch_banners("https://x.example/")
        .await
        .unwrap_err();
    match err {
        ApiError::Status { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "Internal Server Error");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/tours"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"tours": 3}"#))
        .mount(&server)
        .await;

    let err = api(&server, Some("secret"))
        .fetch_tours("https://x.example/")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_missing_token_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(matchers::any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = api(&server, None).fetch_tours("https://x.example/").await.unwrap_err();
    assert!(matches!(err, ApiError::NotConfigured(_)));
}

#[tokio::test]
async fn test_validate_token() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/auth/validate"))
        .and(matchers::header("authorization", "Bearer good"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/auth/validate"))
        .and(matchers::header("authorization", "Bearer bad"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let api = api(&server, Some("good"));
    assert!(api.validate_token(None).await.unwrap());
    assert!(!api.validate_token(Some("bad")).await.unwrap());
}
