use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    BookBorrowed, BookId, BookReturned, BorrowBookError, BorrowRequest, LedgerEvent,
    LedgerIntegrityError, ReturnBookError, ReturnRequest, Revision,
};

/// 同時に貸出できる最大冊数
pub const CAPACITY: usize = 3;

/// 貸出台帳 - 現在貸出中の書籍の共有記録
///
/// 不変条件：
/// - 同じ書籍IDは1回しか現れない
/// - 記録数は`CAPACITY`以下
///
/// フィールドは非公開。値を変更できるのは`borrow_book`/`return_book`の遷移と、
/// 検証付きの`Ledger::restore`のみ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LedgerRecord")]
pub struct Ledger {
    /// 貸出順に並んだ書籍ID
    borrowed_ids: Vec<BookId>,
    revision: Revision,
}

/// デシリアライズ用の未検証レコード
#[derive(Deserialize)]
struct LedgerRecord {
    borrowed_ids: Vec<BookId>,
    revision: Revision,
}

impl TryFrom<LedgerRecord> for Ledger {
    type Error = LedgerIntegrityError;

    fn try_from(record: LedgerRecord) -> Result<Self, Self::Error> {
        Ledger::restore(record.borrowed_ids, record.revision)
    }
}

impl Ledger {
    /// 初回アクセス時に作成される空の台帳
    pub fn empty() -> Self {
        Self {
            borrowed_ids: Vec::new(),
            revision: Revision::initial(),
        }
    }

    /// 永続化された値から台帳を復元する
    ///
    /// # エラー
    /// 重複または上限超過がある場合は`LedgerIntegrityError`を返す
    pub fn restore(
        borrowed_ids: Vec<BookId>,
        revision: Revision,
    ) -> Result<Self, LedgerIntegrityError> {
        if borrowed_ids.len() > CAPACITY {
            return Err(LedgerIntegrityError::OverCapacity(borrowed_ids.len()));
        }
        for (i, id) in borrowed_ids.iter().enumerate() {
            if borrowed_ids[..i].contains(id) {
                return Err(LedgerIntegrityError::DuplicateEntry(id.clone()));
            }
        }
        Ok(Self {
            borrowed_ids,
            revision,
        })
    }

    pub fn borrowed_ids(&self) -> &[BookId] {
        &self.borrowed_ids
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    pub fn contains(&self, book_id: &BookId) -> bool {
        self.borrowed_ids.contains(book_id)
    }

    pub fn len(&self) -> usize {
        self.borrowed_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.borrowed_ids.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.borrowed_ids.len() >= CAPACITY
    }

    /// 残りの貸出可能冊数
    pub fn remaining_capacity(&self) -> usize {
        CAPACITY.saturating_sub(self.borrowed_ids.len())
    }

    /// リビジョンを除いた内容が等しいか
    pub fn same_members(&self, other: &Ledger) -> bool {
        self.borrowed_ids == other.borrowed_ids
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::empty()
    }
}

/// 台帳の遷移
///
/// 条件付き更新でストアに渡される単位。`expected`のリビジョンがストア上で
/// 変わっていない場合に限り`next`が書き込まれる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerTransition {
    pub expected: Revision,
    pub next: Ledger,
    pub event: LedgerEvent,
}

/// 純粋関数：書籍を借りる
///
/// ビジネスルール：
/// - 既に貸出中の書籍は借りられない
/// - 貸出中が3冊に達している場合は借りられない
///
/// 判定は`ledger`（リクエストを作成したスナップショット）に対して行う。
/// 副作用なし。遷移後の台帳とイベントを返す。
pub fn borrow_book(
    ledger: &Ledger,
    request: &BorrowRequest,
    borrowed_at: DateTime<Utc>,
) -> Result<LedgerTransition, BorrowBookError> {
    if ledger.contains(&request.book_id) {
        return Err(BorrowBookError::AlreadyBorrowed);
    }

    if ledger.is_full() {
        return Err(BorrowBookError::CapacityExceeded);
    }

    let revision = request.expected_revision.next();
    let mut borrowed_ids = ledger.borrowed_ids.clone();
    borrowed_ids.push(request.book_id.clone());

    let event = BookBorrowed {
        operation_id: request.operation_id,
        book_id: request.book_id.clone(),
        revision,
        borrowed_at,
    };

    Ok(LedgerTransition {
        expected: request.expected_revision,
        next: Ledger {
            borrowed_ids,
            revision,
        },
        event: LedgerEvent::BookBorrowed(event),
    })
}

/// 純粋関数：書籍を返却する
///
/// ビジネスルール：
/// - 貸出中の書籍のみ返却できる
///
/// 副作用なし。遷移後の台帳とイベントを返す。
pub fn return_book(
    ledger: &Ledger,
    request: &ReturnRequest,
    returned_at: DateTime<Utc>,
) -> Result<LedgerTransition, ReturnBookError> {
    if !ledger.contains(&request.book_id) {
        return Err(ReturnBookError::NotBorrowed);
    }

    let revision = request.expected_revision.next();
    let borrowed_ids = ledger
        .borrowed_ids
        .iter()
        .filter(|id| **id != request.book_id)
        .cloned()
        .collect();

    let event = BookReturned {
        operation_id: request.operation_id,
        book_id: request.book_id.clone(),
        revision,
        returned_at,
    };

    Ok(LedgerTransition {
        expected: request.expected_revision,
        next: Ledger {
            borrowed_ids,
            revision,
        },
        event: LedgerEvent::BookReturned(event),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OperationId;

    fn book(id: &str) -> BookId {
        BookId::new(id).unwrap()
    }

    fn apply_borrow(ledger: &Ledger, id: &str) -> Result<Ledger, BorrowBookError> {
        let request = BorrowRequest::against(ledger, book(id), OperationId::new());
        borrow_book(ledger, &request, Utc::now()).map(|t| t.next)
    }

    fn apply_return(ledger: &Ledger, id: &str) -> Result<Ledger, ReturnBookError> {
        let request = ReturnRequest::against(ledger, book(id), OperationId::new());
        return_book(ledger, &request, Utc::now()).map(|t| t.next)
    }

    // TDD: borrow_book() のテスト
    #[test]
    fn test_borrow_book_appends_and_bumps_revision() {
        let ledger = Ledger::empty();
        let request = BorrowRequest::against(&ledger, book("A"), OperationId::new());
        let borrowed_at = Utc::now();

        let transition = borrow_book(&ledger, &request, borrowed_at).unwrap();

        assert_eq!(transition.expected, Revision::initial());
        assert_eq!(transition.next.borrowed_ids(), &[book("A")]);
        assert_eq!(transition.next.revision(), Revision::initial().next());

        match transition.event {
            LedgerEvent::BookBorrowed(e) => {
                assert_eq!(e.book_id, book("A"));
                assert_eq!(e.operation_id, request.operation_id);
                assert_eq!(e.revision, transition.next.revision());
                assert_eq!(e.borrowed_at, borrowed_at);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_borrow_book_keeps_borrow_order() {
        let ledger = apply_borrow(&Ledger::empty(), "C").unwrap();
        let ledger = apply_borrow(&ledger, "A").unwrap();
        let ledger = apply_borrow(&ledger, "B").unwrap();
        assert_eq!(ledger.borrowed_ids(), &[book("C"), book("A"), book("B")]);
    }

    #[test]
    fn test_borrow_book_fails_when_already_borrowed() {
        let ledger = apply_borrow(&Ledger::empty(), "A").unwrap();
        assert_eq!(
            apply_borrow(&ledger, "A"),
            Err(BorrowBookError::AlreadyBorrowed)
        );
    }

    #[test]
    fn test_borrow_book_fails_at_capacity() {
        let mut ledger = Ledger::empty();
        for id in ["A", "B", "C"] {
            ledger = apply_borrow(&ledger, id).unwrap();
        }
        assert!(ledger.is_full());
        assert_eq!(
            apply_borrow(&ledger, "D"),
            Err(BorrowBookError::CapacityExceeded)
        );
    }

    #[test]
    fn test_borrow_book_reports_duplicate_before_capacity() {
        let mut ledger = Ledger::empty();
        for id in ["A", "B", "C"] {
            ledger = apply_borrow(&ledger, id).unwrap();
        }
        assert_eq!(
            apply_borrow(&ledger, "B"),
            Err(BorrowBookError::AlreadyBorrowed)
        );
    }

    #[test]
    fn test_capacity_invariant_holds_for_any_borrow_sequence() {
        let mut ledger = Ledger::empty();
        for i in 0..10 {
            if let Ok(next) = apply_borrow(&ledger, &format!("book-{}", i % 5)) {
                ledger = next;
            }
            assert!(ledger.len() <= CAPACITY);
        }
        assert_eq!(ledger.len(), CAPACITY);
    }

    // TDD: return_book() のテスト
    #[test]
    fn test_return_book_removes_entry() {
        let mut ledger = Ledger::empty();
        for id in ["A", "B", "C"] {
            ledger = apply_borrow(&ledger, id).unwrap();
        }
        let ledger = apply_return(&ledger, "B").unwrap();
        assert_eq!(ledger.borrowed_ids(), &[book("A"), book("C")]);
        assert_eq!(ledger.remaining_capacity(), 1);
    }

    #[test]
    fn test_return_book_fails_when_not_borrowed() {
        let ledger = apply_borrow(&Ledger::empty(), "A").unwrap();
        assert_eq!(apply_return(&ledger, "Z"), Err(ReturnBookError::NotBorrowed));
    }

    #[test]
    fn test_borrow_then_return_restores_members_with_new_revision() {
        let before = apply_borrow(&Ledger::empty(), "A").unwrap();
        let borrowed = apply_borrow(&before, "b1").unwrap();
        let after = apply_return(&borrowed, "b1").unwrap();

        assert!(after.same_members(&before));
        assert_ne!(after.revision(), before.revision());
    }

    // TDD: Ledger::restore() のテスト
    #[test]
    fn test_restore_rejects_duplicates() {
        let result = Ledger::restore(vec![book("A"), book("A")], Revision::from_u64(3));
        assert_eq!(result, Err(LedgerIntegrityError::DuplicateEntry(book("A"))));
    }

    #[test]
    fn test_restore_rejects_over_capacity() {
        let ids = vec![book("A"), book("B"), book("C"), book("D")];
        let result = Ledger::restore(ids, Revision::from_u64(4));
        assert_eq!(result, Err(LedgerIntegrityError::OverCapacity(4)));
    }

    #[test]
    fn test_deserialize_validates_invariants() {
        let json = r#"{"borrowed_ids":["A","A"],"revision":2}"#;
        assert!(serde_json::from_str::<Ledger>(json).is_err());

        let json = r#"{"borrowed_ids":["A","B"],"revision":2}"#;
        let ledger: Ledger = serde_json::from_str(json).unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.revision(), Revision::from_u64(2));
    }
}
