//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the WikiTree and Mapbox APIs
//! and exercise the full crawl cycle against a real SQLite file.

use funk_tree_crawler::config::Config;
use funk_tree_crawler::crawler::run_crawl;
use funk_tree_crawler::geocode::{run_geocode_workflow, MapboxGeocoder};
use funk_tree_crawler::output::{backup_database, restore_database};
use funk_tree_crawler::storage::{
    GeocodeCache, PersonRecord, PersonStore, QueueStore, RunStatus, RunStore, SqliteStorage,
};
use funk_tree_crawler::{ApiError, CrawlOutcome, ProfileSource, QueueStatus, WikiTreeClient};
use serde_json::{json, Value};
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock server
fn create_test_config(server: &MockServer, dir: &TempDir) -> Config {
    let mut config = Config::default();

    config.crawler.request_delay_ms = 10;
    config.crawler.save_interval = 1;
    config.crawler.max_retries = 1;

    config.api.endpoint = format!("{}/api.php", server.uri());
    config.api.timeout_secs = 10;

    config.geocoding.enabled = false;
    config.geocoding.mapbox_token = None;
    config.geocoding.endpoint = format!("{}/mapbox.places", server.uri());
    config.geocoding.rate_limit_ms = 0;

    config.output.database_path = db_path(dir).to_string_lossy().into_owned();
    config.output.export_path = dir
        .path()
        .join("export.db")
        .to_string_lossy()
        .into_owned();
    config.output.backup_dir = dir.path().join("backups").to_string_lossy().into_owned();

    config
}

fn db_path(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("funk-tree.db")
}

fn profile_body(profile: Value) -> Value {
    json!([{ "page_name": profile["Name"], "status": 0, "profile": profile }])
}

/// Mounts a getProfile mock for one id
async fn mount_profile(server: &MockServer, wiki_id: &str, profile: Value) {
    Mock::given(method("GET"))
        .and(path("/api.php"))
        .and(query_param("action", "getProfile"))
        .and(query_param("key", wiki_id))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_body(profile)))
        .mount(server)
        .await;
}

/// Mounts a getProfile mock answering with an empty profile
async fn mount_missing(server: &MockServer, wiki_id: &str) {
    Mock::given(method("GET"))
        .and(path("/api.php"))
        .and(query_param("action", "getProfile"))
        .and(query_param("key", wiki_id))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "status": 0, "profile": [] }])),
        )
        .mount(server)
        .await;
}

async fn mount_descendants(server: &MockServer, wiki_id: &str, descendants: Value) {
    Mock::given(method("GET"))
        .and(path("/api.php"))
        .and(query_param("action", "getDescendants"))
        .and(query_param("key", wiki_id))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{ "status": 0, "descendants": descendants }])),
        )
        .mount(server)
        .await;
}

fn seed_profile() -> Value {
    json!({
        "Id": 1001,
        "Name": "Funck-6",
        "FirstName": "Heinrich",
        "LastNameAtBirth": "Funck",
        "BirthDate": "1690-00-00",
        "BirthLocation": "Palatinate, Germany",
        "IsLiving": 0,
        "Father": 0,
        "Mother": "0",
        "Spouses": { "0": {}, "Meyer-1": { "Name": "Meyer-1" } },
        "Children": { "Funck-7": { "Name": "Funck-7" } }
    })
}

fn child_profile() -> Value {
    json!({
        "Id": "1002",
        "Name": "Funck-7",
        "FirstName": "Anna",
        "LastNameAtBirth": "Funck",
        "BirthLocation": "Lancaster, Pennsylvania",
        "Father": "Funck-6",
        "IsLiving": 0
    })
}

#[tokio::test]
async fn test_full_crawl_from_seed() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server, &dir);

    mount_profile(&server, "Funck-6", seed_profile()).await;
    mount_profile(&server, "Funck-7", child_profile()).await;
    mount_missing(&server, "Meyer-1").await;
    mount_descendants(
        &server,
        "Funck-6",
        json!([
            { "Id": 1001, "Name": "Funck-6" },
            { "Id": 1002, "Name": "Funck-7", "FirstName": "Anna" }
        ]),
    )
    .await;

    let outcome = run_crawl(&config, "hash", None, std::future::pending::<()>())
        .await
        .expect("crawl should complete");

    let CrawlOutcome::Completed(summary) = outcome else {
        panic!("crawl was interrupted");
    };
    assert_eq!(summary.seed_id, "Funck-6");
    assert_eq!(summary.total_persons, 2);
    assert_eq!(summary.not_found, 1);
    assert_eq!(summary.errors, 0);
    assert_eq!(summary.queue.pending, 0);
    // Seed, descendants, Funck-7, Meyer-1
    assert_eq!(summary.request_count, 4);

    let storage = SqliteStorage::new(&db_path(&dir)).unwrap();
    let seed = storage.get_person("Funck-6").unwrap().unwrap();
    assert_eq!(seed.name, "Heinrich Funck");
    assert_eq!(seed.wiki_numeric_id, Some(1001));
    assert_eq!(seed.birth_location_key.as_deref(), Some("palatinate, germany"));
    assert_eq!(seed.father_wiki_id, None);

    let child = storage.get_person("Funck-7").unwrap().unwrap();
    assert_eq!(child.father_wiki_id.as_deref(), Some("Funck-6"));
    assert_eq!(child.birth_location.as_deref(), Some("Lancaster, Pennsylvania"));

    assert!(!storage.is_queued("0").unwrap());
    let missing = storage.get_queue_item("Meyer-1").unwrap().unwrap();
    assert_eq!(missing.status, QueueStatus::Error);
    assert_eq!(missing.error_message.as_deref(), Some("Profile not found"));

    let run = storage.latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "hash");

    // Final export is a complete, openable database
    let export = SqliteStorage::new(&dir.path().join("export.db")).unwrap();
    assert_eq!(export.count_persons().unwrap(), 2);
}

#[tokio::test]
async fn test_seed_override_and_fatal_seed_failure() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server, &dir);

    mount_missing(&server, "Nobody-1").await;

    let err = run_crawl(&config, "", Some("Nobody-1"), std::future::pending::<()>())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Nobody-1"));

    let storage = SqliteStorage::new(&db_path(&dir)).unwrap();
    assert_eq!(storage.count_persons().unwrap(), 0);
    let run = storage.latest_run().unwrap().unwrap();
    assert_eq!(run.seed_id, "Nobody-1");
    assert_eq!(run.status, RunStatus::Failed);
}

#[tokio::test]
async fn test_rate_limited_request_waits_for_retry_after() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server, &dir);

    Mock::given(method("GET"))
        .and(path("/api.php"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "2"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_profile(&server, "Funck-6", seed_profile()).await;

    let client = WikiTreeClient::new(&config.api, &config.crawler).unwrap();
    let started = Instant::now();
    let profile = client.get_profile("Funck-6").await.unwrap();

    assert!(started.elapsed() >= Duration::from_secs(2));
    assert_eq!(profile.name.as_deref(), Some("Funck-6"));
    assert_eq!(client.request_count(), 2);
}

#[tokio::test]
async fn test_retry_after_is_clamped() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(&server, &dir);
    config.crawler.max_retry_after_secs = 1;

    Mock::given(method("GET"))
        .and(path("/api.php"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "3600"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_profile(&server, "Funck-6", seed_profile()).await;

    let client = WikiTreeClient::new(&config.api, &config.crawler).unwrap();
    let started = Instant::now();
    client.get_profile("Funck-6").await.unwrap();

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(1));
    assert!(elapsed < Duration::from_secs(30));
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server, &dir);

    Mock::given(method("GET"))
        .and(path("/api.php"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let client = WikiTreeClient::new(&config.api, &config.crawler).unwrap();
    let err = client.get_profile("Funck-6").await.unwrap_err();

    assert!(matches!(err, ApiError::Status { status: 500, .. }));
    assert_eq!(client.request_count(), 1);
}

/// Mounts a getProfile mock that answers only after the client has timed out
async fn mount_slow_profile(server: &MockServer, wiki_id: &str, times: Option<u64>) {
    let mock = Mock::given(method("GET"))
        .and(path("/api.php"))
        .and(query_param("action", "getProfile"))
        .and(query_param("key", wiki_id))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(profile_body(seed_profile()))
                .set_delay(Duration::from_secs(3)),
        );
    let mock = match times {
        Some(n) => mock.up_to_n_times(n),
        None => mock.expect(2),
    };
    mock.mount(server).await;
}

#[tokio::test]
async fn test_network_errors_retry_with_backoff() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(&server, &dir);
    config.api.timeout_secs = 1;
    config.crawler.request_delay_ms = 200;
    config.crawler.max_retries = 2;

    // Two timeouts, then a prompt answer
    mount_slow_profile(&server, "Funck-6", Some(2)).await;
    mount_profile(&server, "Funck-6", seed_profile()).await;

    let client = WikiTreeClient::new(&config.api, &config.crawler).unwrap();
    let started = Instant::now();
    let profile = client.get_profile("Funck-6").await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(profile.name.as_deref(), Some("Funck-6"));
    // Timed-out attempts never got a response
    assert_eq!(client.request_count(), 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);

    // Two 1 s timeouts, then waits of max(200 ms backoff, 400 ms cooldown)
    // and max(400 ms backoff, 400 ms cooldown)
    assert!(elapsed >= Duration::from_millis(2800), "elapsed {:?}", elapsed);
}

#[tokio::test]
async fn test_network_errors_exhaust_retries() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(&server, &dir);
    config.api.timeout_secs = 1;
    config.crawler.request_delay_ms = 100;
    config.crawler.max_retries = 1;

    // One attempt plus one retry; verified when the server drops
    mount_slow_profile(&server, "Funck-6", None).await;

    let client = WikiTreeClient::new(&config.api, &config.crawler).unwrap();
    let started = Instant::now();
    let err = client.get_profile("Funck-6").await.unwrap_err();

    assert!(matches!(err, ApiError::Network(_)), "got {:?}", err);
    assert_eq!(client.request_count(), 0);
    assert!(started.elapsed() >= Duration::from_millis(2200));
}

#[tokio::test]
async fn test_rate_limited_item_completes_without_error() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server, &dir);

    mount_profile(&server, "Funck-6", seed_profile()).await;
    mount_descendants(&server, "Funck-6", json!([])).await;
    mount_missing(&server, "Meyer-1").await;
    Mock::given(method("GET"))
        .and(path("/api.php"))
        .and(query_param("action", "getProfile"))
        .and(query_param("key", "Funck-7"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "5"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_profile(&server, "Funck-7", child_profile()).await;

    let started = Instant::now();
    let outcome = run_crawl(&config, "hash", None, std::future::pending::<()>())
        .await
        .expect("crawl should complete");

    assert!(started.elapsed() >= Duration::from_secs(5));
    let summary = outcome.summary();
    assert!(outcome.is_completed());
    assert_eq!(summary.errors, 0);
    assert_eq!(summary.total_persons, 2);

    let storage = SqliteStorage::new(&db_path(&dir)).unwrap();
    let item = storage.get_queue_item("Funck-7").unwrap().unwrap();
    assert_eq!(item.status, QueueStatus::Completed);
    assert_eq!(item.retry_count, 0);
    assert_eq!(item.error_message, None);
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server, &dir);

    Mock::given(method("GET"))
        .and(path("/api.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let client = WikiTreeClient::new(&config.api, &config.crawler).unwrap();
    let err = client.get_profile("Funck-6").await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_missing_profile_is_not_found() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server, &dir);

    mount_missing(&server, "Nobody-1").await;

    let client = WikiTreeClient::new(&config.api, &config.crawler).unwrap();
    let err = client.get_profile("Nobody-1").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_interrupt_and_resume() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server, &dir);

    let seed = json!({
        "Id": 1001,
        "Name": "Funck-6",
        "FirstName": "Heinrich",
        "Children": { "Funck-7": {}, "Funck-8": {} }
    });

    // The seed must only ever be fetched once across both runs
    Mock::given(method("GET"))
        .and(path("/api.php"))
        .and(query_param("action", "getProfile"))
        .and(query_param("key", "Funck-6"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_body(seed)))
        .expect(1)
        .mount(&server)
        .await;
    mount_descendants(&server, "Funck-6", json!([])).await;

    // First fetch of Funck-7 hangs long enough for the shutdown to fire
    Mock::given(method("GET"))
        .and(path("/api.php"))
        .and(query_param("action", "getProfile"))
        .and(query_param("key", "Funck-7"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(profile_body(json!({ "Name": "Funck-7", "FirstName": "Anna" })))
                .set_delay(Duration::from_secs(5)),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_profile(
        &server,
        "Funck-7",
        json!({ "Name": "Funck-7", "FirstName": "Anna" }),
    )
    .await;
    mount_profile(
        &server,
        "Funck-8",
        json!({ "Name": "Funck-8", "FirstName": "Samuel" }),
    )
    .await;

    let outcome = run_crawl(
        &config,
        "",
        None,
        tokio::time::sleep(Duration::from_millis(1000)),
    )
    .await
    .unwrap();
    assert!(matches!(outcome, CrawlOutcome::Interrupted(_)));

    {
        let storage = SqliteStorage::new(&db_path(&dir)).unwrap();
        assert_eq!(storage.count_persons().unwrap(), 1);
        let stats = storage.queue_stats().unwrap();
        assert_eq!(stats.processing, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(
            storage.latest_run().unwrap().unwrap().status,
            RunStatus::Running
        );
    }

    let outcome = run_crawl(&config, "", None, std::future::pending::<()>())
        .await
        .unwrap();
    let CrawlOutcome::Completed(summary) = outcome else {
        panic!("resumed crawl was interrupted");
    };
    assert_eq!(summary.reset_count, 1);
    assert_eq!(summary.total_persons, 3);
    assert_eq!(summary.queue.completed, 2);
    assert_eq!(summary.queue.processing, 0);
}

#[tokio::test]
async fn test_snapshot_backup_and_restore() {
    let dir = tempfile::tempdir().unwrap();
    let backup_dir = dir.path().join("backups");

    let mut storage = SqliteStorage::new(&db_path(&dir)).unwrap();
    storage
        .upsert_person(&PersonRecord {
            wiki_id: "Funck-6".to_string(),
            name: "Heinrich Funck".to_string(),
            ..PersonRecord::default()
        })
        .unwrap();
    storage.enqueue("Funck-7", 0).unwrap();

    let backup = backup_database(&storage, &backup_dir, None).unwrap();
    assert_eq!(backup.person_count, 1);

    // Changes after the backup are discarded by the restore
    storage
        .upsert_person(&PersonRecord {
            wiki_id: "Funck-7".to_string(),
            name: "Anna Funck".to_string(),
            ..PersonRecord::default()
        })
        .unwrap();
    assert_eq!(storage.count_persons().unwrap(), 2);

    let restored = restore_database(&mut storage, &backup_dir, None).unwrap();
    assert_eq!(restored.path, backup.path);
    assert_eq!(storage.count_persons().unwrap(), 1);
    assert!(!storage.person_exists("Funck-7").unwrap());
    assert!(storage.is_queued("Funck-7").unwrap());
}

fn mapbox_body(lng: f64, lat: f64, place_name: &str) -> Value {
    json!({
        "type": "FeatureCollection",
        "features": [{
            "center": [lng, lat],
            "place_name": place_name,
            "context": [
                { "id": "place.1", "text": "Lancaster" },
                { "id": "region.2", "text": "Pennsylvania" },
                { "id": "country.3", "text": "United States" }
            ]
        }]
    })
}

#[tokio::test]
async fn test_geocode_workflow_against_mapbox() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(&server, &dir);
    config.geocoding.enabled = true;
    config.geocoding.mapbox_token = Some("pk.test".to_string());

    Mock::given(method("GET"))
        .and(path_regex(r"(?i)^/mapbox\.places/lancaster.*\.json$"))
        .and(query_param("access_token", "pk.test"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(mapbox_body(
            -76.3055,
            40.0379,
            "Lancaster, Pennsylvania, United States",
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/mapbox\.places/Atlantis\.json$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "features": [] })))
        .mount(&server)
        .await;

    let mut storage = SqliteStorage::new(&db_path(&dir)).unwrap();
    for (wiki_id, birth, death) in [
        ("Funck-7", "Lancaster, Pennsylvania", Some("lancaster,  pennsylvania.")),
        ("Funck-8", "Atlantis", None),
    ] {
        storage
            .upsert_person(&PersonRecord {
                wiki_id: wiki_id.to_string(),
                name: wiki_id.to_string(),
                birth_location: Some(birth.to_string()),
                death_location: death.map(str::to_string),
                ..PersonRecord::default()
            })
            .unwrap();
    }

    let geocoder = MapboxGeocoder::new(&config.geocoding, &config.api).unwrap();
    let report = run_geocode_workflow(&mut storage, &geocoder).await.unwrap();

    assert_eq!(report.total, 3);
    assert_eq!(report.success, 1);
    assert_eq!(report.not_found, 1);
    assert_eq!(report.skipped, 1);

    let location = storage
        .get_location("lancaster, pennsylvania")
        .unwrap()
        .unwrap();
    assert_eq!(location.latitude, 40.0379);
    assert_eq!(location.longitude, -76.3055);
    assert_eq!(location.state.as_deref(), Some("Pennsylvania"));
}

#[tokio::test]
async fn test_crawl_geocodes_inline() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(&server, &dir);
    config.geocoding.enabled = true;
    config.geocoding.mapbox_token = Some("pk.test".to_string());

    mount_profile(
        &server,
        "Funck-7",
        json!({
            "Name": "Funck-7",
            "FirstName": "Anna",
            "BirthLocation": "Lancaster, Pennsylvania"
        }),
    )
    .await;
    mount_descendants(&server, "Funck-7", json!([])).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/mapbox\.places/.+\.json$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(mapbox_body(
            -76.3055,
            40.0379,
            "Lancaster, Pennsylvania, United States",
        )))
        .mount(&server)
        .await;

    let outcome = run_crawl(&config, "", Some("Funck-7"), std::future::pending::<()>())
        .await
        .unwrap();
    assert!(outcome.is_completed());

    let storage = SqliteStorage::new(Path::new(&config.output.database_path)).unwrap();
    assert_eq!(storage.count_locations().unwrap(), 1);
    assert!(storage.has_location("lancaster, pennsylvania").unwrap());
}
