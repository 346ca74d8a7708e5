//! Integration tests for the pipeline
//!
//! These tests use wiremock to create mock upstream servers and test
//! discovery, hydration and refresh end-to-end.

use catalog_etl::config::Config;
use catalog_etl::crawler::{FetchError, HydrateError, RateLimiter};
use catalog_etl::storage::{
    lock_storage, open_storage, AnimeRecord, SharedStorage, SqliteStorage, Storage,
};
use catalog_etl::{EntityKind, EtlError, Pipeline};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Answers `/{endpoint}/{id}/full` with a minimal payload for that id
///
/// Ids listed in `missing` get a 404 instead.
struct DetailResponder {
    missing: Vec<i64>,
}

impl DetailResponder {
    fn all() -> Self {
        Self {
            missing: Vec::new(),
        }
    }
}

impl Respond for DetailResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let id: i64 = request
            .url
            .path_segments()
            .and_then(|mut segments| segments.nth(1))
            .and_then(|segment| segment.parse().ok())
            .unwrap_or(0);

        if self.missing.contains(&id) {
            return ResponseTemplate::new(404).set_body_string("Resource does not exist");
        }

        ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "mal_id": id,
                "title": format!("Title {}", id),
                "favorites": id * 10
            }
        }))
    }
}

/// Creates a test configuration pointed at the mock server
fn create_test_config(base_url: &str) -> Config {
    let mut config = Config::default();
    config.upstream.base_url = base_url.to_string();
    config.retry.rate_limited_backoff_ms = 1;
    config.retry.server_error_backoff_ms = 1;
    config.retry.jitter_ms = 0;
    config
}

fn create_pipeline(server: &MockServer, storage: SharedStorage) -> Pipeline {
    let config = create_test_config(&server.uri());
    Pipeline::with_limiter(&config, storage, Arc::new(RateLimiter::unlimited()))
        .expect("Failed to build pipeline")
}

fn memory_storage() -> SharedStorage {
    SqliteStorage::new_in_memory()
        .expect("Failed to open in-memory database")
        .into_shared()
}

fn catalog_page(ids: &[i64], page: u32, has_next_page: bool) -> ResponseTemplate {
    let data: Vec<_> = ids.iter().map(|id| json!({ "mal_id": id })).collect();
    ResponseTemplate::new(200).set_body_json(json!({
        "pagination": {
            "current_page": page,
            "has_next_page": has_next_page,
            "last_visible_page": 2
        },
        "data": data
    }))
}

async fn mount_catalog_page(
    server: &MockServer,
    endpoint: &str,
    page: u32,
    ids: &[i64],
    has_next_page: bool,
) {
    Mock::given(method("GET"))
        .and(path(format!("/{}", endpoint)))
        .and(query_param("page", page.to_string()))
        .respond_with(catalog_page(ids, page, has_next_page))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_details(server: &MockServer, endpoint: &str, responder: DetailResponder) {
    Mock::given(method("GET"))
        .and(path_regex(format!(r"^/{}/\d+/full$", endpoint)))
        .respond_with(responder)
        .mount(server)
        .await;
}

fn anime_record(mal_id: i64) -> AnimeRecord {
    AnimeRecord {
        mal_id,
        title: format!("Seeded {}", mal_id),
        title_english: None,
        title_japanese: None,
        url: None,
        images: json!({}),
        synopsis: None,
        episodes: None,
        status: None,
        anime_type: None,
        source: None,
        rating: None,
        score: None,
        rank: None,
        popularity: None,
        favorites: 0,
        genres: vec![],
        studios: vec![],
        season: None,
        year: None,
        duration: None,
        raw: json!({ "mal_id": mal_id }),
    }
}

/// Ids requested from the detail endpoint, sorted
async fn requested_detail_ids(server: &MockServer) -> Vec<i64> {
    let mut ids: Vec<i64> = server
        .received_requests()
        .await
        .expect("Request recording is enabled")
        .iter()
        .filter(|request| request.url.path().ends_with("/full"))
        .filter_map(|request| {
            request
                .url
                .path_segments()
                .and_then(|mut segments| segments.nth(1))
                .and_then(|segment| segment.parse().ok())
        })
        .collect();
    ids.sort_unstable();
    ids
}

#[tokio::test]
async fn test_two_page_discovery() {
    let server = MockServer::start().await;
    mount_catalog_page(&server, "anime", 1, &[10, 20, 30], true).await;
    mount_catalog_page(&server, "anime", 2, &[40], false).await;
    mount_details(&server, "anime", DetailResponder::all()).await;

    let storage = memory_storage();
    let pipeline = create_pipeline(&server, storage.clone());

    let report = pipeline.crawl(EntityKind::Anime).await.unwrap();

    assert_eq!(report.start_page, 1);
    assert_eq!(report.last_page, 2);
    assert_eq!(report.pages, 2);
    assert_eq!(report.ids_discovered, 4);

    let storage = lock_storage(&storage).unwrap();
    let cursor = storage.get_cursor(EntityKind::Anime).unwrap().unwrap();
    assert_eq!(cursor.key, "last_anime_page");
    assert_eq!(cursor.page(), Some(2));

    assert_eq!(storage.count_entities(EntityKind::Anime).unwrap(), 4);
    for id in [10, 20, 30, 40] {
        let entity = storage.get_entity(EntityKind::Anime, id).unwrap().unwrap();
        assert_eq!(entity.display_name, format!("Title {}", id));
        assert_eq!(entity.favorites, id * 10);
    }
}

#[tokio::test]
async fn test_resume_from_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/manga"))
        .and(query_param("page", "1"))
        .respond_with(catalog_page(&[1], 1, true))
        .expect(0)
        .mount(&server)
        .await;
    mount_catalog_page(&server, "manga", 7, &[70, 71], false).await;
    mount_details(&server, "manga", DetailResponder::all()).await;

    let storage = memory_storage();
    lock_storage(&storage)
        .unwrap()
        .set_cursor(EntityKind::Manga, 7)
        .unwrap();
    let pipeline = create_pipeline(&server, storage.clone());

    let report = pipeline.crawl(EntityKind::Manga).await.unwrap();

    assert_eq!(report.start_page, 7);
    assert_eq!(report.last_page, 7);
    assert_eq!(requested_detail_ids(&server).await, vec![70, 71]);
    assert_eq!(
        lock_storage(&storage)
            .unwrap()
            .count_entities(EntityKind::Manga)
            .unwrap(),
        2
    );
}

#[tokio::test]
async fn test_cursor_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");

    let server = MockServer::start().await;
    mount_catalog_page(&server, "characters", 1, &[], true).await;
    mount_catalog_page(&server, "characters", 2, &[], false).await;

    {
        let storage = open_storage(&db_path).unwrap().into_shared();
        let pipeline = create_pipeline(&server, storage);
        pipeline.crawl(EntityKind::Character).await.unwrap();
    }

    let storage = open_storage(&db_path).unwrap();
    let cursor = storage.get_cursor(EntityKind::Character).unwrap().unwrap();
    assert_eq!(cursor.key, "last_character_page");
    assert_eq!(cursor.page(), Some(2));
}

#[tokio::test]
async fn test_character_hydration_is_idempotent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/characters/5/full"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "mal_id": 5,
                "name": "Spike Spiegel",
                "nicknames": ["Swimming Bird"],
                "anime": [{
                    "role": "Main",
                    "anime": {
                        "mal_id": 99,
                        "url": "https://myanimelist.net/anime/99",
                        "images": {"jpg": {"image_url": "https://cdn.example/99.jpg"}},
                        "title": "Cowboy Bebop"
                    }
                }],
                "manga": []
            }
        })))
        .expect(2)
        .mount(&server)
        .await;

    let storage = memory_storage();
    let pipeline = create_pipeline(&server, storage.clone());

    pipeline.hydrate(EntityKind::Character, 5).await.unwrap();
    pipeline.hydrate(EntityKind::Character, 5).await.unwrap();

    let storage = lock_storage(&storage).unwrap();
    assert_eq!(storage.count_entities(EntityKind::Character).unwrap(), 1);
    assert_eq!(storage.count_entities(EntityKind::Anime).unwrap(), 1);
    assert_eq!(storage.count_appearances(EntityKind::Anime).unwrap(), 1);
    assert_eq!(storage.count_appearances(EntityKind::Manga).unwrap(), 0);

    let stub = storage.get_entity(EntityKind::Anime, 99).unwrap().unwrap();
    assert_eq!(stub.display_name, "Cowboy Bebop");

    let appearances = storage.get_appearances(5).unwrap();
    assert_eq!(appearances.len(), 1);
    assert_eq!(appearances[0].work_id, 99);
    assert_eq!(appearances[0].role, "Main");
}

#[tokio::test]
async fn test_stub_keeps_full_hydration() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/anime/99/full"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"mal_id": 99, "title": "Cowboy Bebop", "favorites": 500, "episodes": 26}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/characters/5/full"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "mal_id": 5,
                "name": "Spike Spiegel",
                "anime": [{"role": "Main", "anime": {"mal_id": 99, "title": "Cowboy Bebop"}}]
            }
        })))
        .mount(&server)
        .await;

    let storage = memory_storage();
    let pipeline = create_pipeline(&server, storage.clone());

    pipeline.hydrate(EntityKind::Anime, 99).await.unwrap();
    pipeline.hydrate(EntityKind::Character, 5).await.unwrap();

    let storage = lock_storage(&storage).unwrap();
    let anime = storage.get_entity(EntityKind::Anime, 99).unwrap().unwrap();
    assert_eq!(anime.favorites, 500);
    assert_eq!(anime.raw["episodes"], 26);
}

#[tokio::test]
async fn test_bare_appearance_keeps_hydrated_title() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/anime/99/full"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "mal_id": 99,
                "title": "Cowboy Bebop",
                "images": {"jpg": {"image_url": "https://cdn.example/99.jpg"}}
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/characters/5/full"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "mal_id": 5,
                "name": "Spike Spiegel",
                "anime": [{"role": "Main", "anime": {"mal_id": 99}}]
            }
        })))
        .mount(&server)
        .await;

    let storage = memory_storage();
    let pipeline = create_pipeline(&server, storage.clone());

    pipeline.hydrate(EntityKind::Anime, 99).await.unwrap();
    pipeline.hydrate(EntityKind::Character, 5).await.unwrap();

    let storage = lock_storage(&storage).unwrap();
    let anime = storage.get_entity(EntityKind::Anime, 99).unwrap().unwrap();
    assert_eq!(anime.display_name, "Cowboy Bebop");
    assert_eq!(storage.count_appearances(EntityKind::Anime).unwrap(), 1);
}

#[tokio::test]
async fn test_discovery_runs_ahead_of_hydration() {
    let server = MockServer::start().await;
    mount_catalog_page(&server, "anime", 1, &[1], true).await;
    mount_catalog_page(&server, "anime", 2, &[], false).await;
    Mock::given(method("GET"))
        .and(path("/anime/1/full"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": {"mal_id": 1, "title": "Slow"}}))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let storage = memory_storage();
    let pipeline = create_pipeline(&server, storage.clone());

    let report = pipeline.crawl(EntityKind::Anime).await.unwrap();
    assert_eq!(report.last_page, 2);

    // The unlimited limiter still dispatches one request at a time, in order
    let order: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|request| match request.url.query() {
            Some(query) => format!("{}?{}", request.url.path(), query),
            None => request.url.path().to_string(),
        })
        .collect();
    let page_two = order.iter().position(|p| p == "/anime?page=2").unwrap();
    let detail = order.iter().position(|p| p == "/anime/1/full").unwrap();
    assert!(
        page_two < detail,
        "page 2 should be listed before the detail request: {:?}",
        order
    );

    // crawl_all_pages still waits for the slow hydration before returning
    assert_eq!(
        lock_storage(&storage)
            .unwrap()
            .count_entities(EntityKind::Anime)
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_refresh_empty_table_makes_no_requests() {
    let server = MockServer::start().await;
    let pipeline = create_pipeline(&server, memory_storage());

    let report = pipeline.refresh(EntityKind::Anime, 2.0).await.unwrap();

    assert_eq!(report.total, 0);
    assert_eq!(report.selected, 0);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_refresh_selects_stalest_slice() {
    let server = MockServer::start().await;
    mount_details(&server, "anime", DetailResponder::all()).await;

    let storage = memory_storage();
    {
        let mut storage = lock_storage(&storage).unwrap();
        // Inserted in id order, so updated_at never decreases with id
        for id in 1..=1000 {
            storage.upsert_anime(&anime_record(id)).unwrap();
        }
    }
    let pipeline = create_pipeline(&server, storage.clone());

    let report = pipeline.refresh(EntityKind::Anime, 2.0).await.unwrap();

    assert_eq!(report.total, 1000);
    assert_eq!(report.selected, 20);
    assert_eq!(
        requested_detail_ids(&server).await,
        (1..=20).collect::<Vec<i64>>()
    );

    let storage = lock_storage(&storage).unwrap();
    let refreshed = storage.get_entity(EntityKind::Anime, 1).unwrap().unwrap();
    assert_eq!(refreshed.display_name, "Title 1");
    assert_eq!(
        storage.stalest_ids(EntityKind::Anime, 20).unwrap(),
        (21..=40).collect::<Vec<i64>>()
    );
}

#[tokio::test]
async fn test_failed_id_does_not_block_batch() {
    let server = MockServer::start().await;
    mount_catalog_page(&server, "anime", 1, &[1, 2, 3], false).await;
    mount_details(&server, "anime", DetailResponder { missing: vec![2] }).await;

    let storage = memory_storage();
    let pipeline = create_pipeline(&server, storage.clone());

    pipeline.crawl(EntityKind::Anime).await.unwrap();

    {
        let storage = lock_storage(&storage).unwrap();
        assert_eq!(storage.count_entities(EntityKind::Anime).unwrap(), 2);
        assert!(storage.get_entity(EntityKind::Anime, 2).unwrap().is_none());
        assert_eq!(
            storage
                .get_cursor(EntityKind::Anime)
                .unwrap()
                .and_then(|c| c.page()),
            Some(1)
        );
    }

    let result = pipeline.hydrate(EntityKind::Anime, 2).await;
    assert!(matches!(
        result,
        Err(HydrateError::Fetch(FetchError::Status { status: 404, .. }))
    ));
}

#[tokio::test]
async fn test_catalog_failure_stops_crawl() {
    let server = MockServer::start().await;
    mount_catalog_page(&server, "anime", 1, &[1], true).await;
    Mock::given(method("GET"))
        .and(path("/anime"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/anime"))
        .and(query_param("page", "3"))
        .respond_with(catalog_page(&[], 3, false))
        .expect(0)
        .mount(&server)
        .await;
    mount_details(&server, "anime", DetailResponder::all()).await;

    let storage = memory_storage();
    let pipeline = create_pipeline(&server, storage.clone());

    let result = pipeline.crawl(EntityKind::Anime).await;
    assert!(matches!(
        result,
        Err(EtlError::Fetch(FetchError::Status { status: 404, .. }))
    ));

    // Page 1's batch was already queued and still completes
    pipeline.wait_idle().await;

    let storage = lock_storage(&storage).unwrap();
    assert_eq!(
        storage
            .get_cursor(EntityKind::Anime)
            .unwrap()
            .and_then(|c| c.page()),
        Some(1)
    );
    assert_eq!(storage.count_entities(EntityKind::Anime).unwrap(), 1);
}

#[tokio::test]
async fn test_shared_limiter_paces_requests() {
    let server = MockServer::start().await;
    mount_catalog_page(&server, "anime", 1, &[1, 2, 3, 4, 5], false).await;
    mount_details(&server, "anime", DetailResponder::all()).await;

    // Real limits: 3 per second
    let config = create_test_config(&server.uri());
    let pipeline = Pipeline::new(&config, memory_storage()).unwrap();

    let start = Instant::now();
    pipeline.crawl(EntityKind::Anime).await.unwrap();

    // Six requests at 3/s cannot all land inside one second
    assert!(start.elapsed() >= Duration::from_secs(1));
    assert_eq!(server.received_requests().await.unwrap().len(), 6);
}

#[tokio::test]
async fn test_status_reports_counts_and_cursors() {
    let server = MockServer::start().await;
    mount_catalog_page(&server, "anime", 1, &[10, 20], false).await;
    mount_details(&server, "anime", DetailResponder::all()).await;

    let pipeline = create_pipeline(&server, memory_storage());
    pipeline.crawl(EntityKind::Anime).await.unwrap();

    let status = pipeline.status().unwrap();
    assert_eq!(status.entity_counts[&EntityKind::Anime], 2);
    assert_eq!(status.entity_counts[&EntityKind::Manga], 0);
    assert_eq!(status.cursor_page(EntityKind::Anime), Some(1));

    assert!(pipeline.reset_cursor(EntityKind::Anime).unwrap());
    assert!(pipeline.status().unwrap().cursors.is_empty());
}
