use crate::application::lending::{
    LendingError, ServiceDependencies, borrow_book as execute_borrow_book, current_ledger,
    find_book, hydrate_ledger, return_book as execute_return_book, subscribe, with_deadline,
};
use crate::domain::BookId;
use axum::{
    Json,
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;

use super::{
    error::ApiError,
    types::{BookDetailResponse, LedgerEntriesResponse, LedgerResponse},
};

// ============================================================================
// State
// ============================================================================

/// ハンドラー間で共有されるアプリケーション状態
#[derive(Clone)]
pub struct AppState {
    pub service_deps: ServiceDependencies,
    /// 1リクエストあたりの処理期限
    pub operation_timeout: Duration,
}

// ============================================================================
// Command handlers (POST)
// ============================================================================

/// POST /ledger/borrow/:book_id - 書籍を借りる
///
/// 強制されるビジネスルール:
/// - 既に貸出中でないこと
/// - 貸出中の冊数が上限（3冊）未満であること
///
/// 成功時はコミット後の台帳を返す。
pub async fn borrow_book(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<String>,
) -> Result<Json<LedgerResponse>, ApiError> {
    let book_id = BookId::new(book_id)?;

    let ledger = with_deadline(
        state.operation_timeout,
        execute_borrow_book(&state.service_deps, book_id),
    )
    .await?;

    Ok(Json(LedgerResponse::from(ledger)))
}

/// POST /ledger/return/:book_id - 書籍を返却する
///
/// 強制されるビジネスルール:
/// - 貸出中の書籍であること
pub async fn return_book(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<String>,
) -> Result<Json<LedgerResponse>, ApiError> {
    let book_id = BookId::new(book_id)?;

    let ledger = with_deadline(
        state.operation_timeout,
        execute_return_book(&state.service_deps, book_id),
    )
    .await?;

    Ok(Json(LedgerResponse::from(ledger)))
}

// ============================================================================
// Query handlers (GET)
// ============================================================================

/// GET /ledger - 現在の台帳を取得
pub async fn get_ledger(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LedgerResponse>, ApiError> {
    let ledger = with_deadline(state.operation_timeout, current_ledger(&state.service_deps)).await?;

    Ok(Json(LedgerResponse::from(ledger)))
}

/// GET /ledger/entries - 貸出中の書籍を詳細付きで取得
///
/// カタログに存在しない、または取得できなかった書籍はエントリの状態で示し、
/// リクエスト全体は失敗させない。
pub async fn get_ledger_entries(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LedgerEntriesResponse>, ApiError> {
    let deps = &state.service_deps;

    let response = with_deadline(state.operation_timeout, async {
        let ledger = current_ledger(deps).await?;
        let entries = hydrate_ledger(deps.catalog_reader.as_ref(), &ledger).await;
        Ok::<_, LendingError>(LedgerEntriesResponse {
            revision: ledger.revision().value(),
            entries,
        })
    })
    .await?;

    Ok(Json(response))
}

/// GET /books/:book_id - 書籍詳細と貸出確認を取得
///
/// 確認内容は現在の台帳から計算した参考情報。貸出時に改めて検証される。
pub async fn get_book_detail(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<String>,
) -> Result<Json<BookDetailResponse>, ApiError> {
    let book_id = BookId::new(book_id)?;
    let deps = &state.service_deps;

    let (book, ledger) = with_deadline(state.operation_timeout, async {
        let book = find_book(deps, &book_id).await?;
        let ledger = current_ledger(deps).await?;
        Ok::<_, LendingError>((book, ledger))
    })
    .await?;

    let book = book.ok_or(ApiError::BookNotFound)?;

    Ok(Json(BookDetailResponse::new(book, &ledger)))
}

/// GET /ledger/events - 台帳の変更をServer-Sent Eventsで配信
///
/// 接続直後に現在の台帳を`ledger`イベントとして送り、以降はコミットごとに送る。
/// ストアの障害は`error`イベントを1回送って終了する。
pub async fn ledger_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let events = subscribe(&state.service_deps).map(|snapshot| match snapshot {
        Ok(ledger) => Event::default()
            .event("ledger")
            .id(ledger.revision().value().to_string())
            .json_data(LedgerResponse::from(ledger)),
        Err(e) => {
            tracing::error!("Ledger subscription ended: {}", e);
            Ok(Event::default().event("error").data(e.to_string()))
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
