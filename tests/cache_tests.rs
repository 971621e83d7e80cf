use std::fs::File;
use std::time::{Duration, SystemTime};

use submerge::utils::cache::{CacheState, RetrievalCache};
use submerge::utils::http::FetchError;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HOUR: Duration = Duration::from_secs(3600);

fn set_mtime(cache: &RetrievalCache, url: &str, time: SystemTime) {
    let file = File::options()
        .write(true)
        .open(cache.cache_path(url))
        .unwrap();
    file.set_modified(time).unwrap();
}

async fn serve(body: &'static str, expected_calls: u64) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sub"))
        .and(header_exists("user-agent"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(expected_calls)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_fetch_within_ttl_uses_cache() {
    let server = serve("proxies: []", 1).await;
    let dir = tempfile::tempdir().unwrap();
    let cache = RetrievalCache::new(dir.path().join("nested")).unwrap();
    let url = format!("{}/sub", server.uri());

    let first = cache.retrieve(&url, HOUR).await.unwrap();
    let second = cache.retrieve(&url, HOUR).await.unwrap();

    assert_eq!(first, b"proxies: []");
    assert_eq!(first, second);
    assert_eq!(cache.state(&url, HOUR).await, CacheState::Fresh);
}

#[tokio::test]
async fn test_fetch_after_ttl_refetches() {
    let server = serve("fresh", 2).await;
    let dir = tempfile::tempdir().unwrap();
    let cache = RetrievalCache::new(dir.path()).unwrap();
    let url = format!("{}/sub", server.uri());

    cache.retrieve(&url, HOUR).await.unwrap();
    set_mtime(&cache, &url, SystemTime::now() - 2 * HOUR);
    assert_eq!(cache.state(&url, HOUR).await, CacheState::Expired);

    let body = cache.retrieve(&url, HOUR).await.unwrap();
    assert_eq!(body, b"fresh");
    assert_eq!(cache.state(&url, HOUR).await, CacheState::Fresh);
}

#[tokio::test]
async fn test_future_timestamp_served_without_fetch() {
    let server = serve("original", 1).await;
    let dir = tempfile::tempdir().unwrap();
    let cache = RetrievalCache::new(dir.path()).unwrap();
    let url = format!("{}/sub", server.uri());

    cache.retrieve(&url, HOUR).await.unwrap();
    std::fs::write(cache.cache_path(&url), b"stale but present").unwrap();
    set_mtime(&cache, &url, SystemTime::now() + 24 * HOUR);

    let body = cache.retrieve(&url, Duration::ZERO).await.unwrap();
    assert_eq!(body, b"stale but present");
    assert_eq!(cache.state(&url, HOUR).await, CacheState::FromFuture);
}

#[tokio::test]
async fn test_non_success_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let cache = RetrievalCache::new(dir.path()).unwrap();
    let url = format!("{}/sub", server.uri());

    let err = cache.retrieve(&url, HOUR).await.unwrap_err();
    assert!(matches!(err, FetchError::Status { status, .. } if status.as_u16() == 503));
    assert!(!cache.cache_path(&url).exists());
}

#[tokio::test]
async fn test_cache_files_are_keyed_by_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(200).set_body_string("a"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(200).set_body_string("b"))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let cache = RetrievalCache::new(dir.path()).unwrap();

    let a = format!("{}/a", server.uri());
    let b = format!("{}/b", server.uri());
    assert_eq!(cache.retrieve(&a, HOUR).await.unwrap(), b"a");
    assert_eq!(cache.retrieve(&b, HOUR).await.unwrap(), b"b");
    assert_ne!(cache.cache_path(&a), cache.cache_path(&b));
    assert_eq!(std::fs::read(cache.cache_path(&a)).unwrap(), b"a");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
}
