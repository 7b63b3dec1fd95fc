use serde::Serialize;

use crate::application::lending::BorrowedEntry;
use crate::domain::{BookId, CAPACITY, Ledger};
use crate::ports::Book;

use super::prompt::BorrowPrompt;

/// 台帳レスポンス（GET /ledger、POST /ledger/borrow|return）
#[derive(Debug, Serialize)]
pub struct LedgerResponse {
    pub borrowed_ids: Vec<BookId>,
    pub revision: u64,
    pub capacity: usize,
    pub remaining_capacity: usize,
}

impl From<Ledger> for LedgerResponse {
    fn from(ledger: Ledger) -> Self {
        Self {
            borrowed_ids: ledger.borrowed_ids().to_vec(),
            revision: ledger.revision().value(),
            capacity: CAPACITY,
            remaining_capacity: ledger.remaining_capacity(),
        }
    }
}

/// 書籍詳細付きの貸出一覧（GET /ledger/entries）
#[derive(Debug, Serialize)]
pub struct LedgerEntriesResponse {
    pub revision: u64,
    pub entries: Vec<BorrowedEntry>,
}

/// 書籍詳細と貸出確認（GET /books/:book_id）
#[derive(Debug, Serialize)]
pub struct BookDetailResponse {
    pub book: Book,
    pub borrowed: bool,
    pub prompt: BorrowPrompt,
    pub prompt_message: String,
}

impl BookDetailResponse {
    pub fn new(book: Book, ledger: &Ledger) -> Self {
        let prompt = BorrowPrompt::for_book(ledger, &book.book_id);
        Self {
            borrowed: ledger.contains(&book.book_id),
            prompt_message: prompt.message(),
            prompt,
            book,
        }
    }
}

/// エラーレスポンス
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}
