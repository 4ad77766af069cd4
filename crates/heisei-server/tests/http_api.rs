//! REST surface: routing, admission, and error mapping.
#![allow(clippy::expect_used, clippy::unwrap_used)]

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use heisei_server::{router, Application, ServerConfig};
use heisei_store::MemoryStorage;
use heisei_testkit::ManualClock;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

struct TestServer {
    app: Application,
    router: Router,
}

impl TestServer {
    fn new(capacity: u32) -> Self {
        let mut config = ServerConfig::default();
        config.limiter.capacity = capacity;
        config.limiter.refill_per_second = 1.0;
        let app = Application::build(
            &config,
            Arc::new(MemoryStorage::new()),
            ManualClock::new(),
        );
        let router = router(app.state().clone());
        Self { app, router }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        from: &str,
    ) -> (StatusCode, Option<String>, Value) {
        let addr: SocketAddr = from.parse().unwrap();
        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(match body {
                Some(body) => Body::from(body.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, retry_after, value)
    }
}

const CLIENT: &str = "10.1.2.3:40000";

async fn seed_thread(server: &TestServer) -> u64 {
    let (status, _, category) = server
        .send(
            Method::POST,
            "/api/categories",
            Some(json!({ "name": "Technology", "slug": "technology" })),
            CLIENT,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _, thread) = server
        .send(
            Method::POST,
            "/api/threads",
            Some(json!({ "category_id": category["id"], "title": "Rust" })),
            CLIENT,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    thread["id"].as_u64().unwrap()
}

#[tokio::test]
async fn post_creation_updates_thread_and_masks_author() {
    let server = TestServer::new(10);
    let thread_id = seed_thread(&server).await;

    let (status, _, post) = server
        .send(
            Method::POST,
            "/api/posts",
            Some(json!({ "thread_id": thread_id, "content": "Hello forum" })),
            CLIENT,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(post["author_address"], "10.1.2.xxx");

    let (_, _, thread) = server
        .send(Method::GET, &format!("/api/threads/{thread_id}"), None, CLIENT)
        .await;
    assert_eq!(thread["post_count"], 1);

    let (status, _, page) = server
        .send(
            Method::GET,
            &format!("/api/threads/{thread_id}/posts?page=1&limit=5"),
            None,
            CLIENT,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["limit"], 5);
    assert_eq!(page["posts"][0]["content"], "Hello forum");
}

#[tokio::test]
async fn mutations_past_the_burst_get_429() {
    let server = TestServer::new(2);

    for slug in ["one", "two"] {
        let (status, _, _) = server
            .send(
                Method::POST,
                "/api/categories",
                Some(json!({ "name": slug, "slug": slug })),
                CLIENT,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, retry_after, body) = server
        .send(
            Method::POST,
            "/api/categories",
            Some(json!({ "name": "three", "slug": "three" })),
            CLIENT,
        )
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(retry_after.as_deref(), Some("1"));
    assert_eq!(body["code"], "rate_limited");

    // Reads are not gated and other clients keep their own budget.
    for _ in 0..5 {
        let (status, _, _) = server.send(Method::GET, "/api/categories", None, CLIENT).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _, _) = server
        .send(
            Method::POST,
            "/api/categories",
            Some(json!({ "name": "three", "slug": "three" })),
            "10.9.9.9:1234",
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(server.app.state().limiter.statistics().rejected, 1);
}

#[tokio::test]
async fn posting_to_missing_thread_is_404() {
    let server = TestServer::new(10);
    seed_thread(&server).await;

    let (status, _, body) = server
        .send(
            Method::POST,
            "/api/posts",
            Some(json!({ "thread_id": 4242, "content": "anyone?" })),
            CLIENT,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "thread_not_found");
}

#[tokio::test]
async fn invalid_and_duplicate_input_map_to_client_errors() {
    let server = TestServer::new(10);
    let thread_id = seed_thread(&server).await;

    let (status, _, body) = server
        .send(
            Method::POST,
            "/api/posts",
            Some(json!({ "thread_id": thread_id, "content": "" })),
            CLIENT,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_input");

    let (status, _, body) = server
        .send(
            Method::POST,
            "/api/categories",
            Some(json!({ "name": "Tech", "slug": "technology" })),
            CLIENT,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");
}

#[tokio::test]
async fn soft_deleted_posts_stay_listed() {
    let server = TestServer::new(10);
    let thread_id = seed_thread(&server).await;
    let (_, _, post) = server
        .send(
            Method::POST,
            "/api/posts",
            Some(json!({ "thread_id": thread_id, "content": "regret" })),
            CLIENT,
        )
        .await;

    let (status, _, _) = server
        .send(Method::DELETE, &format!("/api/posts/{}", post["id"]), None, CLIENT)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, _, fetched) = server
        .send(Method::GET, &format!("/api/posts/{}", post["id"]), None, CLIENT)
        .await;
    assert_eq!(fetched["is_deleted"], true);

    let (_, _, thread) = server
        .send(Method::GET, &format!("/api/threads/{thread_id}"), None, CLIENT)
        .await;
    assert_eq!(thread["post_count"], 1);
}

#[tokio::test]
async fn health_is_open() {
    let server = TestServer::new(1);
    let response = server
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!server.app.shutdown().is_triggered());
}

#[tokio::test]
async fn post_edits_are_length_checked() {
    let server = TestServer::new(10);
    let thread_id = seed_thread(&server).await;
    let (_, _, post) = server
        .send(
            Method::POST,
            "/api/posts",
            Some(json!({ "thread_id": thread_id, "content": "first draft" })),
            CLIENT,
        )
        .await;
    let uri = format!("/api/posts/{}", post["id"]);

    for content in [String::new(), "x".repeat(10_001)] {
        let (status, _, body) = server
            .send(Method::PUT, &uri, Some(json!({ "content": content })), CLIENT)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_input");
    }

    let (status, _, edited) = server
        .send(
            Method::PUT,
            &uri,
            Some(json!({ "content": "x".repeat(10_000) })),
            CLIENT,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["content"].as_str().unwrap().len(), 10_000);

    let (_, _, fetched) = server.send(Method::GET, &uri, None, CLIENT).await;
    assert_eq!(fetched["content"], edited["content"]);

    let (status, _, body) = server
        .send(
            Method::PUT,
            "/api/posts/9999",
            Some(json!({ "content": "ghost" })),
            CLIENT,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}
