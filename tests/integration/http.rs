//! `HttpFetcher` against a local mock server.

use selfswap::core::SelfswapError;
use selfswap::fetch::HttpFetcher;
use selfswap::manifest::resolve_manifest;
use selfswap::platform::Platform;
use selfswap::test_utils::{compress, fake_executable};
use selfswap::updater::{UpdateStatus, Updater};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RELEASE: &[u8] = b"binary served over http";

async fn release_server() -> MockServer {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/myapp/linux-amd64.json"))
        .and(header_regex("user-agent", "^selfswap/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"Version":"1.2.0"}"#))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/myapp/1.2.0/linux-amd64.zst"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(compress(RELEASE)))
        .expect(1)
        .mount(&mock_server)
        .await;

    mock_server
}

#[tokio::test(flavor = "multi_thread")]
async fn test_update_over_http() {
    let mock_server = release_server().await;
    let temp_dir = TempDir::new().unwrap();
    let exe = fake_executable(temp_dir.path(), "myapp", b"old");
    let base_url = format!("{}/", mock_server.uri());

    // The blocking client must be built and dropped off the async runtime
    let exe_for_task = exe.clone();
    let status = tokio::task::spawn_blocking(move || {
        let mut updater = Updater::builder("1.1.0", base_url, "myapp")
            .platform(Platform::new("linux", "amd64"))
            .fetcher(HttpFetcher::new().timeout(Duration::from_secs(10)))
            .executable_path(exe_for_task)
            .build();
        updater.run_in_background()
    })
    .await
    .unwrap()
    .unwrap();

    assert!(matches!(status, UpdateStatus::Updated { ref to, .. } if to == "1.2.0"));
    assert_eq!(std::fs::read(&exe).unwrap(), RELEASE);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_manifest_is_http_status() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    let base_url = mock_server.uri();

    let err = tokio::task::spawn_blocking(move || {
        resolve_manifest(&HttpFetcher::new(), &base_url, "myapp", &Platform::new("linux", "amd64"))
    })
    .await
    .unwrap()
    .unwrap_err();

    match err {
        SelfswapError::HttpStatus {
            url,
            status,
        } => {
            assert_eq!(status, 404);
            assert!(url.ends_with("/myapp/linux-amd64.json"));
        }
        other => panic!("expected HttpStatus, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_slow_server_hits_timeout() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"Version":"1.2.0"}"#)
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&mock_server)
        .await;
    let base_url = mock_server.uri();

    let err = tokio::task::spawn_blocking(move || {
        let fetcher = HttpFetcher::new().timeout(Duration::from_millis(200));
        resolve_manifest(&fetcher, &base_url, "myapp", &Platform::new("linux", "amd64"))
    })
    .await
    .unwrap()
    .unwrap_err();

    assert!(matches!(err, SelfswapError::Fetch { .. }), "got {err:?}");
}
