//! Provider adapters and health probes against a mock upstream.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dracin::config::{builtin_providers, Config, ProviderConfig};
use dracin::governor::Governor;
use dracin::providers::{
    probe, probe_all, record_probes, AdapterRegistry, ProviderAdapter, ProxyParams,
};
use dracin::store::{MemoryStore, StoredConfig};
use dracin_common::ids;

fn registry(config: &Config) -> AdapterRegistry {
    let governor = Governor::new(config.governor.clone()).expect("governor");
    AdapterRegistry::new(config, governor)
}

async fn adapter(server: &MockServer, id: &str) -> Arc<dyn ProviderAdapter> {
    let config = common::test_config(&server.uri());
    registry(&config).create_adapter(id).expect("adapter")
}

fn production_adapter(id: &str) -> Arc<dyn ProviderAdapter> {
    registry(&Config::default()).create_adapter(id).expect("adapter")
}

fn dramas(n: usize) -> serde_json::Value {
    let items: Vec<_> = (1..=n)
        .map(|i| json!({"bookId": i.to_string(), "bookName": format!("Drama {}", i)}))
        .collect();
    json!({ "data": items })
}

// ----------------------------------------------------------------------------
// Sansekai
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_sansekai_home_is_paged_locally() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/trending"))
        .respond_with(ResponseTemplate::new(200).set_body_json(dramas(3)))
        .mount(&server)
        .await;

    let adapter = adapter(&server, ids::PRIMARY).await;

    let first = adapter.get_home(1, 2).await.unwrap();
    assert_eq!(first.items.len(), 2);
    assert!(first.pagination.has_more);
    assert_eq!(first.pagination.total, Some(3));

    let second = adapter.get_home(2, 2).await.unwrap();
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].book_id, "3");
    assert!(!second.pagination.has_more);
}

#[tokio::test]
async fn test_sansekai_far_page_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/trending"))
        .respond_with(ResponseTemplate::new(200).set_body_json(dramas(3)))
        .mount(&server)
        .await;

    let adapter = adapter(&server, ids::PRIMARY).await;

    for (page, size) in [(300_000_000, 20), (u32::MAX, u32::MAX)] {
        let far = adapter.get_home(page, size).await.unwrap();
        assert!(far.items.is_empty());
        assert!(!far.pagination.has_more);
        assert_eq!(far.pagination.total, Some(3));
    }
}

#[tokio::test]
async fn test_sansekai_detail_falls_back_to_search() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/detail"))
        .and(query_param("bookId", "41000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("query", "41000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"bookId": "99", "bookName": "Other"},
            {"bookId": "41000", "bookName": "The Heiress Returns"}
        ])))
        .mount(&server)
        .await;

    let drama = adapter(&server, ids::PRIMARY)
        .await
        .get_detail("41000")
        .await
        .unwrap();
    assert_eq!(drama.book_id, "41000");
    assert_eq!(drama.book_name, "The Heiress Returns");
}

#[tokio::test]
async fn test_detail_degrades_to_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let drama = adapter(&server, ids::PRIMARY)
        .await
        .get_detail("77")
        .await
        .unwrap();
    assert_eq!(drama.book_id, "77");
    assert_eq!(drama.book_name, "Drama 77");
}

#[tokio::test]
async fn test_sansekai_stream_comes_from_episode_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/allepisode"))
        .and(query_param("bookId", "B1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"chapterId": "c1", "chapterIndex": 1, "videoUrl": "https://v.example/c1.mp4", "quality": 720},
            {"chapterId": "c2", "chapterIndex": 2, "qualities": [
                {"quality": 540, "videoUrl": "https://v.example/c2_540.mp4"},
                {"quality": 1080, "videoUrl": "https://v.example/c2_1080.mp4"}
            ]}
        ])))
        .mount(&server)
        .await;

    let adapter = adapter(&server, ids::PRIMARY).await;
    let options = adapter.get_stream("B1", "c2").await.unwrap();

    assert_eq!(options.len(), 2);
    assert_eq!(options[0].quality, 1080);
    assert!(options[0].is_default);
    assert!(!options[1].is_default);

    assert!(adapter.get_stream("B1", "missing").await.unwrap().is_empty());
}

// ----------------------------------------------------------------------------
// Gimita
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_gimita_addresses_operations_by_action() {
    let server = MockServer::start().await;
    let mut body = dramas(5);
    body["total"] = json!(40);
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("action", "home"))
        .and(query_param("page", "2"))
        .and(query_param("size", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let page = adapter(&server, ids::SECONDARY)
        .await
        .get_home(2, 5)
        .await
        .unwrap();
    assert_eq!(page.items.len(), 5);
    assert_eq!(page.pagination.page, 2);
    assert_eq!(page.pagination.total, Some(40));
}

#[tokio::test]
async fn test_gimita_stream_falls_back_to_stream_action() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("action", "chapters"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"chapterId": "c1", "chapterIndex": 1}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("action", "stream"))
        .and(query_param("chapter_id", "c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"qualities": [
                {"quality": 540, "videoUrl": "//v.example/540.mp4"},
                {"quality": 1080, "videoUrl": "https://v.example/1080.mp4"}
            ]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let options = adapter(&server, ids::SECONDARY)
        .await
        .get_stream("B1", "c1")
        .await
        .unwrap();

    assert_eq!(options[0].video_url, "https://v.example/1080.mp4");
    assert_eq!(options[1].video_url, "https://v.example/540.mp4");
}

// ----------------------------------------------------------------------------
// Dramabos
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_dramabos_search_failure_is_an_empty_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/love/1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let page = adapter(&server, ids::BACKUP1)
        .await
        .search("love", 1)
        .await
        .unwrap();
    assert!(page.is_empty());
    assert!(!page.pagination.has_more);
}

#[tokio::test]
async fn test_dramabos_explicit_pagination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/foryou/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"list": [{"bookId": "1", "bookName": "One"}], "isMore": true, "total": 90}
        })))
        .mount(&server)
        .await;

    let page = adapter(&server, ids::BACKUP1)
        .await
        .get_home(1, 20)
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert!(page.pagination.has_more);
    assert_eq!(page.pagination.total, Some(90));
}

#[tokio::test]
async fn test_dramabos_categories() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/classify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"classifyId": "3", "classifyName": "Romance"},
                {"classifyName": "No id"}
            ]
        })))
        .mount(&server)
        .await;

    let categories = adapter(&server, ids::BACKUP1)
        .await
        .get_categories()
        .await
        .unwrap();
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0].id, "3");
    assert_eq!(categories[0].name, "Romance");
}

#[tokio::test]
async fn test_dramabos_missing_chapters_are_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let adapter = adapter(&server, ids::BACKUP1).await;
    assert!(adapter.get_episodes("B1").await.unwrap().is_empty());
    assert!(adapter.get_stream("B1", "c1").await.unwrap().is_empty());
}

// ----------------------------------------------------------------------------
// Paxsenix
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_paxsenix_pagination_from_info() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/home"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"bookId": "1", "bookName": "One"}, {"bookId": "2", "bookName": "Two"}],
            "info": {"pagination": {"page": 1, "size": 2, "totalPages": 3, "total": 6}}
        })))
        .mount(&server)
        .await;

    let page = adapter(&server, ids::BACKUP2)
        .await
        .get_home(1, 2)
        .await
        .unwrap();
    assert_eq!(page.items.len(), 2);
    assert!(page.pagination.has_more);
    assert_eq!(page.pagination.total, Some(6));
}

#[tokio::test]
async fn test_paxsenix_detail_from_nested_book() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/detail/B7/v2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"book": {"bookName": "Moonlit Vows", "chapterCount": 80}}
        })))
        .mount(&server)
        .await;

    let drama = adapter(&server, ids::BACKUP2)
        .await
        .get_detail("B7")
        .await
        .unwrap();
    assert_eq!(drama.book_id, "B7");
    assert_eq!(drama.book_name, "Moonlit Vows");
    assert_eq!(drama.chapter_count, Some(80));
}

#[tokio::test]
async fn test_adapter_health_check_uses_home() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/home"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    assert!(!adapter(&server, ids::BACKUP2).await.health_check().await);
}

// ----------------------------------------------------------------------------
// Raw proxy URLs
// ----------------------------------------------------------------------------

#[test]
fn test_resolve_url_per_provider() {
    let episodes = ProxyParams {
        book_id: Some("41000".into()),
        ..ProxyParams::default()
    };
    assert_eq!(
        production_adapter(ids::PRIMARY)
            .resolve_url("allepisode", &episodes)
            .unwrap(),
        "https://api.sansekai.my.id/api/dramabox/allepisode?bookId=41000"
    );
    assert_eq!(
        production_adapter(ids::BACKUP2)
            .resolve_url("detail", &episodes)
            .unwrap(),
        "https://kdjekek-usieke-owjejxkek-iwjwjxkod.vercel.app/api/detail/41000/v2"
    );

    let search = ProxyParams {
        keyword: Some("love story".into()),
        page: Some(2),
        ..ProxyParams::default()
    };
    assert_eq!(
        production_adapter(ids::SECONDARY)
            .resolve_url("search", &search)
            .unwrap(),
        "https://api.gimita.id/api/search/dramabox?action=search&query=love+story&page=2"
    );
    assert_eq!(
        production_adapter(ids::BACKUP1)
            .resolve_url("search", &search)
            .unwrap(),
        "https://dramabos.asia/api/dramabox/search/love%20story/2"
    );
}

#[test]
fn test_gimita_vip_is_not_paginated() {
    let params = ProxyParams {
        page: Some(3),
        size: Some(10),
        ..ProxyParams::default()
    };
    assert_eq!(
        production_adapter(ids::SECONDARY)
            .resolve_url("vip", &params)
            .unwrap(),
        "https://api.gimita.id/api/search/dramabox?action=vip"
    );
}

#[test]
fn test_unknown_actions_pass_through() {
    let params = ProxyParams {
        extra: vec![("lang".into(), "id".into())],
        ..ProxyParams::default()
    };
    assert_eq!(
        production_adapter(ids::PRIMARY)
            .resolve_url("foryou", &params)
            .unwrap(),
        "https://api.sansekai.my.id/api/dramabox/foryou?lang=id"
    );
}

// ----------------------------------------------------------------------------
// Health probes
// ----------------------------------------------------------------------------

fn probed(id: &str, base_url: &str) -> ProviderConfig {
    let mut provider = builtin_providers()
        .into_iter()
        .find(|p| p.id == id)
        .expect("builtin provider");
    provider.base_url = base_url.to_string();
    provider
}

#[tokio::test]
async fn test_probe_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/trending"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/home"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let providers = [
        probed(ids::PRIMARY, &server.uri()),
        probed(ids::BACKUP2, &server.uri()),
    ];
    let results = probe_all(&client, &providers).await;

    assert_eq!(results[0].provider_id, ids::PRIMARY);
    assert!(results[0].healthy);
    assert_eq!(results[0].status, "HTTP 200");
    assert!(!results[1].healthy);
    assert_eq!(results[1].status, "HTTP 503");
}

#[tokio::test]
async fn test_probe_timeout_and_connection_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let mut slow = probed(ids::PRIMARY, &server.uri());
    slow.health_check.timeout_ms = 50;
    let result = probe(&client, &slow).await;
    assert!(!result.healthy);
    assert_eq!(result.status, "Timeout");

    let unreachable = probed(ids::PRIMARY, "http://127.0.0.1:1");
    let result = probe(&client, &unreachable).await;
    assert!(!result.healthy);
    assert_eq!(result.status, "Connection failed");
}

#[tokio::test]
async fn test_probe_results_update_usage_stats() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/trending"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let providers = [
        probed(ids::PRIMARY, &server.uri()),
        probed(ids::BACKUP1, "http://127.0.0.1:1"),
    ];
    let results = probe_all(&client, &providers).await;

    let store = MemoryStore::new();
    record_probes(&store, &results).await.unwrap();

    let stored = StoredConfig::load(&store).await.unwrap();
    let primary = &stored.api_stats[ids::PRIMARY];
    assert_eq!(primary.success_count, 1);
    assert_eq!(primary.error_count, 0);
    assert!(primary.last_health_check.is_some());

    let backup = &stored.api_stats[ids::BACKUP1];
    assert_eq!(backup.success_count, 0);
    assert_eq!(backup.error_count, 1);
}
