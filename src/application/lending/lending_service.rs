use crate::domain::{
    self, BookId, BorrowRequest, Ledger, LedgerKey, LedgerTransition, OperationId, ReturnRequest,
    Revision,
};
use crate::ports::*;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

use super::errors::{LendingError, Result};
use super::retry::RetryPolicy;

/// サービスの依存関係
///
/// 関数型DDDの原則に従い、データ構造として定義。
/// 振る舞い（メソッド）は持たず、純粋な関数に依存関係を渡す。
///
/// コーディネーター自身は永続的な状態を持たない。台帳は試行のたびにストアから読み直す。
#[derive(Clone)]
pub struct ServiceDependencies {
    pub ledger_store: Arc<dyn LedgerStore>,
    pub catalog_reader: Arc<dyn CatalogReader>,
    /// 操作対象の台帳
    pub ledger_key: LedgerKey,
    pub retry_policy: RetryPolicy,
}

/// 1回の試行が確定しなかった理由
enum AttemptFailure {
    Conflict(Revision),
    Store(Box<dyn std::error::Error + Send + Sync>),
}

/// 現在の台帳を取得する
///
/// 台帳が未作成の場合、ストアが空の台帳を作成して返す。
pub async fn current_ledger(deps: &ServiceDependencies) -> Result<Ledger> {
    deps.ledger_store
        .load_or_init(&deps.ledger_key)
        .await
        .map_err(LendingError::StoreUnavailable)
}

/// 書籍を借りる
///
/// ビジネスルール：
/// - 既に貸出中の書籍は借りられない
/// - 貸出中が3冊に達している場合は借りられない
///
/// # 一貫性保証
///
/// 検証に使用したリビジョンをキーとする条件付き更新でコミットする。
/// 他の書き込みが先に確定していた場合は台帳を読み直し、**最初から検証し直す**。
/// 同時に2件の貸出が最後の1枠を争っても、成功するのは1件のみ。
///
/// # エラー
/// - AlreadyBorrowed / CapacityExceeded: 再試行しない
/// - Contention: 再試行上限まで競合が続いた
/// - StoreUnavailable: 再試行上限までストア障害が続いた
pub async fn borrow_book(deps: &ServiceDependencies, book_id: BookId) -> Result<Ledger> {
    let operation_id = OperationId::new();
    let span = tracing::info_span!(
        "borrow_book",
        ledger = %deps.ledger_key,
        book_id = %book_id,
        operation_id = %operation_id,
    );

    commit_with_retry(deps, operation_id, |snapshot| {
        let request = BorrowRequest::against(snapshot, book_id.clone(), operation_id);
        Ok(domain::ledger::borrow_book(snapshot, &request, Utc::now())?)
    })
    .instrument(span)
    .await
}

/// 書籍を返却する
///
/// ビジネスルール：
/// - 貸出中の書籍のみ返却できる
///
/// コミットの手順は`borrow_book()`と対称。
pub async fn return_book(deps: &ServiceDependencies, book_id: BookId) -> Result<Ledger> {
    let operation_id = OperationId::new();
    let span = tracing::info_span!(
        "return_book",
        ledger = %deps.ledger_key,
        book_id = %book_id,
        operation_id = %operation_id,
    );

    commit_with_retry(deps, operation_id, |snapshot| {
        let request = ReturnRequest::against(snapshot, book_id.clone(), operation_id);
        Ok(domain::ledger::return_book(snapshot, &request, Utc::now())?)
    })
    .instrument(span)
    .await
}

/// 読み込み・検証・条件付き更新を上限回数まで繰り返す
///
/// `decide`は試行ごとに最新のスナップショットで呼ばれる。
/// 検証エラーはその場で返し、競合とストア障害のみ再試行する。
///
/// 書き込みがエラーを返しても、ストア側では確定している場合がある。
/// その後の試行では検証の前にコミット記録を確認し、確定済みなら成功として返す。
async fn commit_with_retry<F>(
    deps: &ServiceDependencies,
    operation_id: OperationId,
    mut decide: F,
) -> Result<Ledger>
where
    F: FnMut(&Ledger) -> Result<LedgerTransition>,
{
    let policy = &deps.retry_policy;
    let mut attempt = 0;
    let mut unacknowledged_write = false;

    loop {
        attempt += 1;

        let failure = match deps.ledger_store.load_or_init(&deps.ledger_key).await {
            Err(e) => AttemptFailure::Store(e),
            Ok(snapshot) => {
                if unacknowledged_write {
                    if let Some(revision) = deps
                        .ledger_store
                        .find_commit(&deps.ledger_key, operation_id)
                        .await
                        .map_err(LendingError::StoreUnavailable)?
                    {
                        tracing::info!(attempt, revision = %revision, "earlier write had committed");
                        return Ok(snapshot);
                    }
                }

                tracing::debug!(attempt, revision = %snapshot.revision(), "validating against snapshot");
                let transition = decide(&snapshot)?;

                match deps
                    .ledger_store
                    .compare_and_swap(&deps.ledger_key, &transition)
                    .await
                {
                    Ok(WriteOutcome::Committed(ledger)) => {
                        tracing::info!(
                            event = transition.event.event_type(),
                            revision = %ledger.revision(),
                            borrowed = ledger.len(),
                            "ledger committed"
                        );
                        return Ok(ledger);
                    }
                    Ok(WriteOutcome::Conflict { current }) => AttemptFailure::Conflict(current),
                    Err(e) => {
                        unacknowledged_write = true;
                        AttemptFailure::Store(e)
                    }
                }
            }
        };

        if attempt >= policy.max_attempts {
            return Err(match failure {
                AttemptFailure::Conflict(_) => LendingError::Contention { attempts: attempt },
                AttemptFailure::Store(e) => LendingError::StoreUnavailable(e),
            });
        }

        match &failure {
            AttemptFailure::Conflict(current) => {
                tracing::warn!(attempt, current = %current, "revision conflict, re-validating");
            }
            AttemptFailure::Store(e) => {
                tracing::warn!(attempt, error = %e, "ledger store failure, retrying");
            }
        }

        tokio::time::sleep(policy.delay_after(attempt)).await;
    }
}

/// 期限付きで操作を実行する
///
/// 期限を過ぎると実行中のストア呼び出しを破棄して`TimedOut`を返す。
/// 条件付き更新は全か無かなので、破棄されても台帳が中途半端な状態になることはない。
pub async fn with_deadline<T, F>(limit: Duration, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(?limit, "lending operation timed out");
            Err(LendingError::TimedOut(limit))
        }
    }
}

/// 書籍を1冊取得する（書籍詳細の表示用）
///
/// カタログのエラーは`CatalogLookupFailed`として返す。台帳の操作には影響しない。
pub async fn find_book(deps: &ServiceDependencies, book_id: &BookId) -> Result<Option<Book>> {
    deps.catalog_reader
        .get_book(book_id)
        .await
        .map_err(LendingError::CatalogLookupFailed)
}
