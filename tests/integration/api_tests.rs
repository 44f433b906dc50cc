//! Integration tests for the API client
//!
//! These tests use wiremock to stand in for the remote API and check request
//! parameters and error classification.

use serde_json::json;
use std::time::Duration;
use wallcrawl::api::{BatchSource, SourceResolver, VkClient};
use wallcrawl::config::ApiConfig;
use wallcrawl::{FetchError, Source};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "secret-token";

fn client(server: &MockServer, timeout: Duration) -> VkClient {
    let api = ApiConfig {
        base_url: format!("{}/method", server.uri()),
        ..ApiConfig::default()
    };
    VkClient::new(&api, TOKEN.to_string(), timeout).unwrap()
}

fn source() -> Source {
    Source::new("-42", "testgroup")
}

#[tokio::test]
async fn test_fetch_sends_parameters_and_decodes_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/method/execute.getComments"))
        .and(query_param("group", "-42"))
        .and(query_param("offset", "40"))
        .and(query_param("req", "20"))
        .and(query_param("access_token", TOKEN))
        .and(query_param("v", "5.122"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": {
                "posts": {
                    "count": 41,
                    "items": [{"id": 3, "owner_id": -42, "text": "post",
                               "comments": {"count": 1}}]
                },
                "items": [{
                    "group_id": -42,
                    "post_id": 3,
                    "comments": {
                        "count": 1,
                        "items": [{"id": 30, "from_id": 7, "text": "hello"}],
                        "profiles": [{"id": 7, "first_name": "Anna", "bdate": "3.4.1995"}]
                    }
                }]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = client(&server, Duration::from_secs(5))
        .fetch(&source(), 40, 20)
        .await
        .unwrap();

    assert_eq!(page.total_count, 41);
    assert_eq!(page.posts[0].id, 3);
    assert_eq!(page.items[0].post_id, "3");
    assert_eq!(page.items[0].source_id, "-42");
    assert_eq!(page.items[0].comments[0].text, "hello");
    assert_eq!(page.items[0].profiles[0].first_name, "Anna");
}

#[tokio::test]
async fn test_rate_limit_error_is_classified() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/method/execute.getComments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": {"error_code": 29, "error_msg": "Rate limit reached"}
        })))
        .mount(&server)
        .await;

    let result = client(&server, Duration::from_secs(5))
        .fetch(&source(), 0, 20)
        .await;

    assert_eq!(
        result.unwrap_err(),
        FetchError::RateLimited {
            code: 29,
            message: "Rate limit reached".to_string()
        }
    );
}

#[tokio::test]
async fn test_other_api_errors_are_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/method/execute.getComments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": {"error_code": 5, "error_msg": "User authorization failed"}
        })))
        .mount(&server)
        .await;

    let result = client(&server, Duration::from_secs(5))
        .fetch(&source(), 0, 20)
        .await;

    assert!(matches!(result, Err(FetchError::Fatal { code: 5, .. })));
}

#[tokio::test]
async fn test_http_failures_are_classified() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/method/execute.getComments"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/method/execute.getComments"))
        .and(query_param("offset", "20"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/method/execute.getComments"))
        .and(query_param("offset", "40"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let client = client(&server, Duration::from_secs(5));

    assert!(matches!(
        client.fetch(&source(), 0, 20).await,
        Err(FetchError::Transient(_))
    ));
    assert!(matches!(
        client.fetch(&source(), 20, 20).await,
        Err(FetchError::Fatal { code: 403, .. })
    ));
    assert!(matches!(
        client.fetch(&source(), 40, 20).await,
        Err(FetchError::Transient(_))
    ));
}

#[tokio::test]
async fn test_timeout_is_transient_and_hides_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let result = client(&server, Duration::from_millis(200))
        .fetch(&source(), 0, 20)
        .await;

    match result {
        Err(FetchError::Transient(message)) => assert!(!message.contains(TOKEN)),
        other => panic!("expected a transient error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_resolve_maps_screen_names_to_sources() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/method/groups.getById"))
        .and(query_param("group_ids", "testgroup,unknown,apiclub"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": [
                {"id": 42, "screen_name": "testgroup", "name": "Test Group"},
                {"id": 1, "screen_name": "apiclub", "name": "API Club"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let names = vec![
        "testgroup".to_string(),
        "unknown".to_string(),
        "apiclub".to_string(),
    ];
    let sources = client(&server, Duration::from_secs(5))
        .resolve(&names)
        .await
        .unwrap();

    assert_eq!(
        sources,
        vec![Source::new("-42", "testgroup"), Source::new("-1", "apiclub")]
    );
}
