use super::BookId;
use thiserror::Error;

/// 貸出のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BorrowBookError {
    /// 既に貸出中
    AlreadyBorrowed,
    /// 貸出上限（3冊）に達している
    CapacityExceeded,
}

/// 返却のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnBookError {
    /// 貸出されていない
    NotBorrowed,
}

/// 永続化された台帳の整合性エラー
///
/// ストアから読み込んだデータが不変条件を満たさない場合に返される。
/// 正常な遷移のみで更新されていれば発生しない。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerIntegrityError {
    /// 同じ書籍IDが複数回記録されている
    #[error("ledger records book {0} more than once")]
    DuplicateEntry(BookId),
    /// 記録数が上限を超えている
    #[error("ledger holds {0} books, above capacity")]
    OverCapacity(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrity_error_messages() {
        let duplicate = LedgerIntegrityError::DuplicateEntry(BookId::new("A").unwrap());
        assert_eq!(duplicate.to_string(), "ledger records book A more than once");
        assert_eq!(
            LedgerIntegrityError::OverCapacity(4).to_string(),
            "ledger holds 4 books, above capacity"
        );
    }
}
