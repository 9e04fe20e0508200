//! End-to-end cycles: Reddit listing, dedup store, and Graph targets all
//! served by one mock server

use libreposter::config::{Config, Credentials, Settings, StoreKind};
use libreposter::{CycleOutcome, Driver};
use secrecy::SecretString;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer, dir: &TempDir, store: StoreKind) -> Config {
    let mut settings = Settings::default();
    settings.feed.auth_base = server.uri();
    settings.feed.api_base = server.uri();
    settings.feed.allowed_extensions = vec![".jpg".to_string(), ".png".to_string()];
    settings.dedup.store = store;
    settings.dedup.log_path = dir.path().join("published.log").display().to_string();
    settings.publish.graph_base = server.uri();
    settings.publish.story = false;
    settings.publish.settle_delay = "0s".to_string();
    settings.publish.request_timeout = "5s".to_string();

    Config {
        credentials: Credentials {
            reddit_client_id: "client".to_string(),
            reddit_client_secret: SecretString::from("secret".to_string()),
            fb_access_token: SecretString::from("fb-token".to_string()),
            fb_page_id: "1000".to_string(),
            ig_account_id: Some("2000".to_string()),
        },
        settings,
    }
}

async fn mount_reddit(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .and(header_exists("authorization"))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "reddit-token", "token_type": "bearer"})),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/r/ProgrammerHumor/hot"))
        .and(header("authorization", "Bearer reddit-token"))
        .and(query_param("limit", "25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "Listing",
            "data": {"children": [
                {"kind": "t3", "data": {"url": "http://x/a.gif", "title": "T1"}},
                {"kind": "t3", "data": {"url": "http://x/b.jpg", "title": "T2"}},
                {"kind": "t3", "data": {"url": "http://x/c.png", "title": "T3"}}
            ]}
        })))
        .mount(server)
        .await;
}

async fn mount_graph_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/1000/photos"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "555", "post_id": "1000_555"})),
        )
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2000/media"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "container-1"})))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2000/media_publish"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "media-1"})))
        .mount(server)
        .await;
}

fn published_url(outcome: &CycleOutcome) -> &str {
    match outcome {
        CycleOutcome::Published { item, .. } => &item.url,
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn test_local_store_cycles_walk_down_the_listing() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_reddit(&server).await;
    mount_graph_ok(&server).await;

    let driver = Driver::from_config(&config(&server, &dir, StoreKind::Local)).unwrap();

    let first = driver.run_once().await;
    assert!(first.is_success());
    assert_eq!(published_url(&first), "http://x/b.jpg");
    if let CycleOutcome::Published { result, .. } = &first {
        assert_eq!(result.get("facebook"), Some(Some("1000_555")));
        assert_eq!(result.get("instagram"), Some(Some("media-1")));
        assert!(!result.contains("facebook_story"));
    }

    let second = driver.run_once().await;
    assert_eq!(published_url(&second), "http://x/c.png");

    assert_eq!(driver.run_once().await, CycleOutcome::NoCandidate);

    let log = std::fs::read_to_string(dir.path().join("published.log")).unwrap();
    assert_eq!(log, "http://x/b.jpg\nhttp://x/c.png\n");
}

#[tokio::test]
async fn test_remote_store_skips_titles_already_on_the_page() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_reddit(&server).await;
    mount_graph_ok(&server).await;
    Mock::given(method("GET"))
        .and(path("/1000/feed"))
        .and(query_param("fields", "message"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [
            {"id": "1000_1", "message": "T2"}
        ]})))
        .mount(&server)
        .await;

    let driver = Driver::from_config(&config(&server, &dir, StoreKind::Remote)).unwrap();
    let outcome = driver.run_once().await;

    assert!(outcome.is_success());
    if let CycleOutcome::Published { item, .. } = &outcome {
        assert_eq!(item.title, "T3");
    }
    assert!(!dir.path().join("published.log").exists());
}

#[tokio::test]
async fn test_unreachable_history_skips_cycle() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_reddit(&server).await;
    Mock::given(method("GET"))
        .and(path("/1000/feed"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/1000/photos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "555"})))
        .expect(0)
        .mount(&server)
        .await;

    let driver = Driver::from_config(&config(&server, &dir, StoreKind::Remote)).unwrap();
    let outcome = driver.run_once().await;

    assert!(matches!(outcome, CycleOutcome::StoreUnavailable { .. }));
}

#[tokio::test]
async fn test_rejected_feed_credentials_mean_no_candidate() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/1000/photos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "555"})))
        .expect(0)
        .mount(&server)
        .await;

    let driver = Driver::from_config(&config(&server, &dir, StoreKind::Local)).unwrap();

    assert_eq!(driver.run_once().await, CycleOutcome::NoCandidate);
    assert!(!dir.path().join("published.log").exists());
}

#[tokio::test]
async fn test_primary_failure_is_reported_and_item_spent() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_reddit(&server).await;
    Mock::given(method("POST"))
        .and(path("/1000/photos"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"message": "Error validating access token", "code": 190}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2000/media"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "c"})))
        .expect(0)
        .mount(&server)
        .await;

    let driver = Driver::from_config(&config(&server, &dir, StoreKind::Local)).unwrap();
    let outcome = driver.run_once().await;

    assert!(!outcome.is_success());
    if let CycleOutcome::Published { result, .. } = &outcome {
        assert_eq!(result.len(), 1);
        assert_eq!(result.get("facebook"), Some(None));
    }

    // The next cycle moves on to the following item
    assert_eq!(published_url(&driver.run_once().await), "http://x/c.png");
}

#[test]
fn test_instagram_enabled_without_account_is_config_error() {
    let server_uri = "http://127.0.0.1:9";
    let mut settings = Settings::default();
    settings.publish.graph_base = server_uri.to_string();

    let config = Config {
        credentials: Credentials {
            reddit_client_id: "client".to_string(),
            reddit_client_secret: SecretString::from("secret".to_string()),
            fb_access_token: SecretString::from("fb-token".to_string()),
            fb_page_id: "1000".to_string(),
            ig_account_id: None,
        },
        settings,
    };

    let err = match Driver::from_config(&config) {
        Ok(_) => panic!("expected a configuration error"),
        Err(e) => e,
    };
    assert_eq!(err.exit_code(), 2);
    assert!(err.to_string().contains("IG_ACCOUNT_ID"));
}
