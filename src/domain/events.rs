use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BookId, OperationId, Revision};

/// イベント：書籍が貸出された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookBorrowed {
    pub operation_id: OperationId,
    pub book_id: BookId,
    /// 貸出を記録した台帳のリビジョン
    pub revision: Revision,
    pub borrowed_at: DateTime<Utc>,
}

/// イベント：書籍が返却された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookReturned {
    pub operation_id: OperationId,
    pub book_id: BookId,
    /// 返却を記録した台帳のリビジョン
    pub revision: Revision,
    pub returned_at: DateTime<Utc>,
}

/// 台帳イベント統合型
///
/// 台帳への書き込みと同時に永続化されるコミット記録。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    BookBorrowed(BookBorrowed),
    BookReturned(BookReturned),
}

impl LedgerEvent {
    /// イベント種別の識別子
    pub fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::BookBorrowed(_) => "BookBorrowed",
            LedgerEvent::BookReturned(_) => "BookReturned",
        }
    }

    pub fn operation_id(&self) -> OperationId {
        match self {
            LedgerEvent::BookBorrowed(e) => e.operation_id,
            LedgerEvent::BookReturned(e) => e.operation_id,
        }
    }

    pub fn book_id(&self) -> &BookId {
        match self {
            LedgerEvent::BookBorrowed(e) => &e.book_id,
            LedgerEvent::BookReturned(e) => &e.book_id,
        }
    }

    pub fn revision(&self) -> Revision {
        match self {
            LedgerEvent::BookBorrowed(e) => e.revision,
            LedgerEvent::BookReturned(e) => e.revision,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::BookBorrowed(e) => e.borrowed_at,
            LedgerEvent::BookReturned(e) => e.returned_at,
        }
    }
}
