//! Integration tests for the crawler
//!
//! These tests use wiremock to create a mock API server and run the full
//! resolve → crawl → persist cycle against real stores.

use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wallcrawl::api::VkClient;
use wallcrawl::config::{ApiConfig, CrawlerConfig, TransientRetry};
use wallcrawl::crawler::CrawlSettings;
use wallcrawl::output::SourceOutcome;
use wallcrawl::storage::{FileStore, SqliteStore};
use wallcrawl::{Checkpoint, Comment, Orchestrator, RecordStore};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn crawler_config() -> CrawlerConfig {
    CrawlerConfig {
        request_interval_ms: 5,
        page_size: 2,
        flush_interval_secs: 1,
        shutdown_grace_secs: 1,
        ..CrawlerConfig::default()
    }
}

fn settings() -> CrawlSettings {
    CrawlSettings {
        page_size: 2,
        rate_limit_cooldown: Duration::from_millis(50),
        transient_retry: TransientRetry::SameOffset,
        nudge_step: 10,
        transient_backoff: Duration::from_millis(10),
        transient_backoff_max: Duration::from_millis(40),
    }
}

fn api_client(server: &MockServer) -> Arc<VkClient> {
    let api = ApiConfig {
        base_url: format!("{}/method", server.uri()),
        ..ApiConfig::default()
    };
    Arc::new(VkClient::new(&api, "test-token".to_string(), Duration::from_secs(5)).unwrap())
}

/// A page of `post_ids` where every post has one comment by `author`
fn comments_page(post_ids: &[i64], total: u64, author: i64) -> Value {
    let posts: Vec<Value> = post_ids
        .iter()
        .map(|id| json!({"id": id, "owner_id": -42, "text": "post", "comments": {"count": 1}}))
        .collect();
    let items: Vec<Value> = post_ids
        .iter()
        .map(|id| {
            json!({
                "groupID": "-42",
                "postID": id,
                "comments": {
                    "count": 1,
                    "items": [{"id": id * 10, "from_id": author, "text": "hi"}],
                    "profiles": [{"id": author, "first_name": "Ivan", "bdate": "1.1.1990"}]
                }
            })
        })
        .collect();
    json!({"response": {"posts": {"count": total, "items": posts}, "items": items}})
}

async fn mount_resolver(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/method/groups.getById"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": [{"id": 42, "screen_name": "testgroup", "name": "Test Group"}]
        })))
        .mount(server)
        .await;
}

async fn mount_page(server: &MockServer, offset: u64, body: Value) {
    Mock::given(method("GET"))
        .and(path("/method/execute.getComments"))
        .and(query_param("offset", offset.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

#[tokio::test]
async fn test_full_crawl_to_file_store() {
    let server = MockServer::start().await;
    mount_resolver(&server).await;
    mount_page(&server, 0, comments_page(&[1, 2], 3, 7)).await;
    mount_page(&server, 2, comments_page(&[3], 3, 8)).await;

    let dir = TempDir::new().unwrap();
    let store: Arc<dyn RecordStore> = Arc::new(FileStore::new(dir.path()));
    let client = api_client(&server);
    let orchestrator = Orchestrator::new(&crawler_config(), client.clone(), client, store)
        .with_settings(settings());

    let summary = orchestrator
        .run(&["testgroup".to_string()])
        .await
        .unwrap();

    assert!(!summary.interrupted);
    assert_eq!(
        summary.sources[0].outcome,
        SourceOutcome::Done(Checkpoint::new(3, 3))
    );
    assert_eq!(summary.counters.posts, 3);
    assert_eq!(summary.counters.comments, 3);
    assert_eq!(summary.counters.profiles, 2);

    let root = dir.path();
    assert!(root.join("comments/-42/1/post.json").exists());
    assert!(root.join("comments/-42/3/post.json").exists());
    assert!(root.join("profiles/7.json").exists());
    assert!(root.join("profiles/8.json").exists());
    assert_eq!(read(&root.join("comments/-42/offset.txt")), "3");
    assert_eq!(read(&root.join("comments/-42/count.txt")), "3");
    assert_eq!(read(&root.join("PostsCounter.txt")), "3");
    assert_eq!(read(&root.join("CommentsCounter.txt")), "3");
    assert_eq!(read(&root.join("ProfilesCounter.txt")), "2");

    let comment: Comment =
        serde_json::from_str(&read(&root.join("comments/-42/2/20.json"))).unwrap();
    assert_eq!(comment.source_name, "testgroup");
    assert_eq!(comment.post_url, "https://vk.com/public42?w=wall-42_2");
    assert_eq!(comment.profile.unwrap().byear, 1990);
}

#[tokio::test]
async fn test_rerun_after_checkpoint_loss_keeps_counters() {
    let server = MockServer::start().await;
    mount_resolver(&server).await;
    mount_page(&server, 0, comments_page(&[1, 2], 4, 7)).await;
    mount_page(&server, 2, comments_page(&[3, 4], 4, 8)).await;

    let dir = TempDir::new().unwrap();
    let names = vec!["testgroup".to_string()];

    for _ in 0..2 {
        let store: Arc<dyn RecordStore> = Arc::new(FileStore::new(dir.path()));
        let client = api_client(&server);
        Orchestrator::new(&crawler_config(), client.clone(), client, store)
            .with_settings(settings())
            .run(&names)
            .await
            .unwrap();

        // Simulate a crash that lost the checkpoint but kept the records
        std::fs::write(dir.path().join("comments/-42/offset.txt"), "0").unwrap();
    }

    assert_eq!(read(&dir.path().join("PostsCounter.txt")), "4");
    assert_eq!(read(&dir.path().join("CommentsCounter.txt")), "4");
    assert_eq!(read(&dir.path().join("ProfilesCounter.txt")), "2");
}

#[tokio::test]
async fn test_rate_limited_page_is_retried_into_sqlite_store() {
    let server = MockServer::start().await;
    mount_resolver(&server).await;

    // The first request is rate limited, the retry of the same offset succeeds
    Mock::given(method("GET"))
        .and(path("/method/execute.getComments"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": {"error_code": 29, "error_msg": "Rate limit reached"}
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_page(&server, 0, comments_page(&[1, 2], 2, 7)).await;

    let dir = TempDir::new().unwrap();
    let sqlite = SqliteStore::new(&dir.path().join("records.db")).unwrap();
    let store: Arc<dyn RecordStore> = Arc::new(sqlite);
    let client = api_client(&server);
    let orchestrator =
        Orchestrator::new(&crawler_config(), client.clone(), client, Arc::clone(&store))
            .with_settings(settings());

    let summary = orchestrator
        .run(&["testgroup".to_string()])
        .await
        .unwrap();

    assert_eq!(
        summary.sources[0].outcome,
        SourceOutcome::Done(Checkpoint::new(2, 2))
    );
    assert_eq!(
        store.get("comments/-42/offset.txt").await.unwrap(),
        Some(b"2".to_vec())
    );
    assert_eq!(
        store.list("comments/-42").await.unwrap(),
        vec!["1", "2", "count.txt", "offset.txt"]
    );

    let requests = server.received_requests().await.unwrap();
    let page_requests = requests
        .iter()
        .filter(|r| r.url.path().ends_with("execute.getComments"))
        .count();
    assert_eq!(page_requests, 2);
}

#[tokio::test]
async fn test_fatal_source_error_is_reported() {
    let server = MockServer::start().await;
    mount_resolver(&server).await;
    mount_page(
        &server,
        0,
        json!({"error": {"error_code": 15, "error_msg": "Access denied"}}),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let store: Arc<dyn RecordStore> = Arc::new(FileStore::new(dir.path()));
    let client = api_client(&server);
    let summary = Orchestrator::new(&crawler_config(), client.clone(), client, store)
        .with_settings(settings())
        .run(&["testgroup".to_string()])
        .await
        .unwrap();

    assert!(matches!(
        summary.sources[0].outcome,
        SourceOutcome::Failed(_)
    ));
    assert!(!dir.path().join("comments/-42/offset.txt").exists());
}
