use crate::domain::{BorrowBookError, ReturnBookError};
use std::time::Duration;
use thiserror::Error;

/// 貸出台帳アプリケーション層のエラー
#[derive(Debug, Error)]
pub enum LendingError {
    /// 既に貸出中
    #[error("Book is already borrowed")]
    AlreadyBorrowed,

    /// 貸出上限（3冊）に達している
    #[error("Borrowing limit reached (max 3 books)")]
    CapacityExceeded,

    /// 貸出されていない書籍の返却
    #[error("Book is not borrowed")]
    NotBorrowed,

    /// 同時更新との競合が再試行上限まで解消しなかった
    #[error("Ledger update lost to concurrent writers after {attempts} attempts")]
    Contention { attempts: u32 },

    /// 台帳ストアのエラー（リビジョン競合以外）
    #[error("Ledger store unavailable")]
    StoreUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// カタログのエラー（表示のみ劣化させる）
    #[error("Catalog lookup failed")]
    CatalogLookupFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// 呼び出し側の期限切れ
    #[error("Operation timed out after {0:?}")]
    TimedOut(Duration),
}

impl LendingError {
    /// 呼び出し側が操作全体を後で再試行して良いか
    ///
    /// バリデーションエラーは前提条件の違反なので、再試行しても結果は変わらない。
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LendingError::Contention { .. }
                | LendingError::StoreUnavailable(_)
                | LendingError::CatalogLookupFailed(_)
                | LendingError::TimedOut(_)
        )
    }
}

impl From<BorrowBookError> for LendingError {
    fn from(err: BorrowBookError) -> Self {
        match err {
            BorrowBookError::AlreadyBorrowed => LendingError::AlreadyBorrowed,
            BorrowBookError::CapacityExceeded => LendingError::CapacityExceeded,
        }
    }
}

impl From<ReturnBookError> for LendingError {
    fn from(err: ReturnBookError) -> Self {
        match err {
            ReturnBookError::NotBorrowed => LendingError::NotBorrowed,
        }
    }
}

/// アプリケーション層の Result型
pub type Result<T> = std::result::Result<T, LendingError>;
