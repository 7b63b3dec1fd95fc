use serde::{Deserialize, Serialize};

use super::{BookId, Ledger, OperationId, Revision};

/// コマンド：書籍を借りる
///
/// 判定に使用した台帳スナップショットのリビジョンを保持する。永続化されない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowRequest {
    pub operation_id: OperationId,
    pub book_id: BookId,
    pub expected_revision: Revision,
}

impl BorrowRequest {
    /// スナップショットに対するリクエストを作成する
    pub fn against(snapshot: &Ledger, book_id: BookId, operation_id: OperationId) -> Self {
        Self {
            operation_id,
            book_id,
            expected_revision: snapshot.revision(),
        }
    }
}

/// コマンド：書籍を返却する
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnRequest {
    pub operation_id: OperationId,
    pub book_id: BookId,
    pub expected_revision: Revision,
}

impl ReturnRequest {
    pub fn against(snapshot: &Ledger, book_id: BookId, operation_id: OperationId) -> Self {
        Self {
            operation_id,
            book_id,
            expected_revision: snapshot.revision(),
        }
    }
}
