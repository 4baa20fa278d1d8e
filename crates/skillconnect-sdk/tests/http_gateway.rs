//! HttpGateway against a mocked REST service

use std::sync::Arc;

use skillconnect_sdk::config::ApiConfig;
use skillconnect_sdk::gateway::{KeyValueCredential, StaticCredential, TOKEN_KEY};
use skillconnect_sdk::{HttpGateway, KeyValueStore, MemoryStore, RemoteGateway, SdkError};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api(server: &MockServer) -> ApiConfig {
    ApiConfig {
        base_url: server.uri(),
        request_timeout_secs: 5,
    }
}

#[tokio::test]
async fn test_plans_fetched_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/learning-plans/user/7"))
        .and(header("authorization", "Bearer jwt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "planId": 1,
                "title": "Rust in practice",
                "user": { "userId": 7 },
                "items": [
                    { "itemId": 11, "title": "Ownership", "complete": true },
                    { "itemId": 12, "title": "Lifetimes", "complete": false }
                ]
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = HttpGateway::new(&api(&server), Arc::new(StaticCredential::new("jwt"))).unwrap();
    let plans = gateway.plans(7).await.unwrap();

    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].items.len(), 2);
    assert!(plans[0].items[0].complete);
}

#[tokio::test]
async fn test_unauthorized_clears_stored_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/posts/loadfeed/7"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let kv = Arc::new(MemoryStore::new());
    kv.set(TOKEN_KEY, "expired").unwrap();
    let gateway =
        HttpGateway::new(&api(&server), Arc::new(KeyValueCredential::new(kv.clone()))).unwrap();

    let err = gateway.load_feed(7).await.unwrap_err();
    assert!(matches!(err, SdkError::Unauthorized));
    assert_eq!(kv.get(TOKEN_KEY), None);
}

#[tokio::test]
async fn test_rejection_carries_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/likes/5/user/7"))
        .respond_with(
            ResponseTemplate::new(409)
                .set_body_json(serde_json::json!({ "message": "Already liked" })),
        )
        .mount(&server)
        .await;

    let gateway = HttpGateway::new(&api(&server), Arc::new(StaticCredential::new("jwt"))).unwrap();
    match gateway.like(5, 7).await {
        Err(SdkError::RemoteRejected { status, message }) => {
            assert_eq!(status, 409);
            assert_eq!(message, "Already liked");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_non_json_rejection_uses_status_reason() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/posts/9"))
        .respond_with(ResponseTemplate::new(500).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let gateway = HttpGateway::new(&api(&server), Arc::new(StaticCredential::new("jwt"))).unwrap();
    match gateway.delete_post(9).await {
        Err(SdkError::RemoteRejected { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "Internal Server Error");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_follow_check_sends_both_ids() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/follow/check"))
        .and(query_param("followerId", "7"))
        .and(query_param("followingId", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!(true)))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = HttpGateway::new(&api(&server), Arc::new(StaticCredential::new("jwt"))).unwrap();
    assert!(gateway.is_following(7, 3).await.unwrap());
}

#[test]
fn test_empty_base_url_is_config_error() {
    let config = ApiConfig {
        base_url: "  ".into(),
        request_timeout_secs: 5,
    };
    let result = HttpGateway::new(&config, Arc::new(StaticCredential::new("jwt")));
    assert!(matches!(result, Err(SdkError::Config(_))));
}
