use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::stream::BoxStream;
use futures::StreamExt;
use rusty_library_lending::adapters::memory::LedgerStore as MemoryLedgerStore;
use rusty_library_lending::adapters::mock::CatalogReader as MockCatalogReader;
use rusty_library_lending::api::handlers::AppState;
use rusty_library_lending::api::router::create_router;
use rusty_library_lending::application::lending::{RetryPolicy, ServiceDependencies};
use rusty_library_lending::domain::*;
use rusty_library_lending::ports::*;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

// ============================================================================
// APIテスト用のヘルパー関数
// ============================================================================

/// テスト用のアプリケーションセットアップ
///
/// インメモリの台帳ストアとモックカタログを使用する。
fn setup_app(catalog_reader: Arc<MockCatalogReader>) -> axum::Router {
    setup_app_with_store(Arc::new(MemoryLedgerStore::new()), catalog_reader)
}

fn setup_app_with_store(
    ledger_store: Arc<dyn LedgerStore>,
    catalog_reader: Arc<MockCatalogReader>,
) -> axum::Router {
    let service_deps = ServiceDependencies {
        ledger_store,
        catalog_reader,
        ledger_key: LedgerKey::global(),
        retry_policy: RetryPolicy::immediate(3),
    };

    let app_state = Arc::new(AppState {
        service_deps,
        operation_timeout: Duration::from_secs(5),
    });

    create_router(app_state)
}

fn catalog() -> Arc<MockCatalogReader> {
    Arc::new(MockCatalogReader::with_books([Book {
        book_id: BookId::new("dune").unwrap(),
        title: "Dune".to_string(),
        author: "Frank Herbert".to_string(),
        summary: "Desert planet".to_string(),
        rating: Some(4.5),
        image_url: Some("https://example.com/dune.jpg".to_string()),
    }]))
}

async fn send(app: &axum::Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, json)
}

/// 常に接続できないストア
struct UnavailableStore;

#[async_trait::async_trait]
impl LedgerStore for UnavailableStore {
    async fn load_or_init(&self, _key: &LedgerKey) -> ledger_store::Result<Ledger> {
        Err("connection refused".into())
    }

    async fn compare_and_swap(
        &self,
        _key: &LedgerKey,
        _transition: &LedgerTransition,
    ) -> ledger_store::Result<WriteOutcome> {
        Err("connection refused".into())
    }

    async fn find_commit(
        &self,
        _key: &LedgerKey,
        _operation_id: OperationId,
    ) -> ledger_store::Result<Option<Revision>> {
        Err("connection refused".into())
    }

    fn subscribe(&self, _key: &LedgerKey) -> BoxStream<'static, ledger_store::Result<Ledger>> {
        let result: ledger_store::Result<Ledger> = Err("connection refused".into());
        futures::stream::once(async move { result }).boxed()
    }
}

// ============================================================================
// 正常系
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = setup_app(catalog());

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_get_ledger_returns_empty_ledger() {
    let app = setup_app(catalog());

    let (status, body) = send(&app, "GET", "/ledger").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "borrowed_ids": [],
            "revision": 0,
            "capacity": 3,
            "remaining_capacity": 3
        })
    );
}

#[tokio::test]
async fn test_borrow_and_return_flow() {
    let app = setup_app(catalog());

    let (status, body) = send(&app, "POST", "/ledger/borrow/dune").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["borrowed_ids"], json!(["dune"]));
    assert_eq!(body["remaining_capacity"], 2);

    let (status, body) = send(&app, "POST", "/ledger/return/dune").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["borrowed_ids"], json!([]));
    assert_eq!(body["revision"], 2);
}

#[tokio::test]
async fn test_ledger_entries_are_hydrated() {
    let app = setup_app(catalog());
    send(&app, "POST", "/ledger/borrow/dune").await;
    send(&app, "POST", "/ledger/borrow/unknown").await;

    let (status, body) = send(&app, "GET", "/ledger/entries").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["revision"], 2);
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["status"], "available");
    assert_eq!(entries[0]["book"]["title"], "Dune");
    assert_eq!(entries[1], json!({"status": "missing", "book_id": "unknown"}));
}

#[tokio::test]
async fn test_fixture_catalog_hydrates_entries() {
    let catalog =
        MockCatalogReader::from_json(include_str!("../fixtures/books.json")).unwrap();
    let app = setup_app(Arc::new(catalog));
    send(&app, "POST", "/ledger/borrow/the-hobbit").await;

    let (status, body) = send(&app, "GET", "/ledger/entries").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"][0]["status"], "available");
    assert_eq!(body["entries"][0]["book"]["author"], "J. R. R. Tolkien");
}

#[tokio::test]
async fn test_book_detail_includes_borrow_prompt() {
    let app = setup_app(catalog());

    let (status, body) = send(&app, "GET", "/books/dune").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["book"]["author"], "Frank Herbert");
    assert_eq!(body["borrowed"], false);
    assert_eq!(body["prompt"], json!({"kind": "confirm"}));

    send(&app, "POST", "/ledger/borrow/a").await;
    send(&app, "POST", "/ledger/borrow/b").await;

    let (_, body) = send(&app, "GET", "/books/dune").await;
    assert_eq!(body["prompt"], json!({"kind": "last_slot"}));
    assert_eq!(
        body["prompt_message"],
        "You are about to reach the borrowing limit of 3 books. Do you want to proceed?"
    );

    send(&app, "POST", "/ledger/borrow/dune").await;

    let (_, body) = send(&app, "GET", "/books/dune").await;
    assert_eq!(body["borrowed"], true);
    assert_eq!(
        body["prompt"],
        json!({"kind": "unavailable", "reason": "already_borrowed"})
    );
}

// ============================================================================
// エラー系
// ============================================================================

#[tokio::test]
async fn test_borrow_twice_returns_unprocessable_entity() {
    let app = setup_app(catalog());
    send(&app, "POST", "/ledger/borrow/dune").await;

    let (status, body) = send(&app, "POST", "/ledger/borrow/dune").await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "ALREADY_BORROWED");
    assert_eq!(body["message"], "Book is already borrowed");
}

#[tokio::test]
async fn test_borrow_beyond_capacity_returns_unprocessable_entity() {
    let app = setup_app(catalog());
    for id in ["a", "b", "c"] {
        let (status, _) = send(&app, "POST", &format!("/ledger/borrow/{}", id)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(&app, "POST", "/ledger/borrow/d").await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "CAPACITY_EXCEEDED");
}

#[tokio::test]
async fn test_return_unborrowed_returns_unprocessable_entity() {
    let app = setup_app(catalog());

    let (status, body) = send(&app, "POST", "/ledger/return/dune").await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "NOT_BORROWED");
}

#[tokio::test]
async fn test_unknown_book_detail_returns_not_found() {
    let app = setup_app(catalog());

    let (status, body) = send(&app, "GET", "/books/missing").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "BOOK_NOT_FOUND");
}

#[tokio::test]
async fn test_store_failure_returns_service_unavailable() {
    let app = setup_app_with_store(Arc::new(UnavailableStore), catalog());

    let (status, body) = send(&app, "POST", "/ledger/borrow/dune").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "STORE_UNAVAILABLE");
    // 内部エラーの詳細はクライアントに返さない
    assert_eq!(body["message"], "Ledger store unavailable");

    let (status, _) = send(&app, "GET", "/ledger").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_ledger_events_stream_starts_with_current_ledger() {
    let app = setup_app(catalog());
    send(&app, "POST", "/ledger/borrow/dune").await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/ledger/events")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );

    // ストリームは終わらないので最初のイベントだけを読む
    let mut body = response.into_body().into_data_stream();
    let first = body.next().await.unwrap().unwrap();
    let chunk = String::from_utf8(first.to_vec()).unwrap().replace(": ", ":");

    assert!(chunk.contains("event:ledger"));
    assert!(chunk.contains("id:1"));
    assert!(chunk.contains(r#""borrowed_ids":["dune"]"#));
}
