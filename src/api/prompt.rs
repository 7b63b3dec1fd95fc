use crate::domain::{BookId, CAPACITY, Ledger};
use serde::Serialize;

/// 貸出できない理由
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    AlreadyBorrowed,
    LimitReached,
}

/// 貸出ボタンを押したときに表示する確認内容
///
/// 台帳スナップショットから計算する参考情報にすぎない。
/// 実際の判定は`borrow_book()`が最新の台帳で再検証する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BorrowPrompt {
    /// 通常の確認
    Confirm,
    /// この貸出で上限に達する
    LastSlot,
    /// 貸出は拒否される
    Unavailable { reason: UnavailableReason },
}

impl BorrowPrompt {
    /// スナップショットから確認内容を決める
    ///
    /// 判定順は`borrow_book()`と同じ（重複が上限より先）。
    pub fn for_book(ledger: &Ledger, book_id: &BookId) -> Self {
        if ledger.contains(book_id) {
            BorrowPrompt::Unavailable {
                reason: UnavailableReason::AlreadyBorrowed,
            }
        } else if ledger.is_full() {
            BorrowPrompt::Unavailable {
                reason: UnavailableReason::LimitReached,
            }
        } else if ledger.remaining_capacity() == 1 {
            BorrowPrompt::LastSlot
        } else {
            BorrowPrompt::Confirm
        }
    }

    /// 利用者に表示するメッセージ
    pub fn message(&self) -> String {
        match self {
            BorrowPrompt::Confirm => "Do you want to borrow this book?".to_string(),
            BorrowPrompt::LastSlot => format!(
                "You are about to reach the borrowing limit of {} books. Do you want to proceed?",
                CAPACITY
            ),
            BorrowPrompt::Unavailable {
                reason: UnavailableReason::AlreadyBorrowed,
            } => "This book is already borrowed.".to_string(),
            BorrowPrompt::Unavailable {
                reason: UnavailableReason::LimitReached,
            } => format!("You cannot borrow more than {} books at a time.", CAPACITY),
        }
    }
}
