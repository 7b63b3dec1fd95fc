use crate::domain::{BookId, Ledger};
use crate::ports::{Book, CatalogReader};
use serde::Serialize;

/// 表示用に解決された貸出エントリ
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BorrowedEntry {
    /// カタログから詳細を取得できた
    Available { book: Book },
    /// カタログに存在しない（表示のみの劣化。台帳の破損ではない）
    Missing { book_id: BookId },
    /// カタログの取得に失敗した
    Unavailable { book_id: BookId },
}

impl BorrowedEntry {
    pub fn book_id(&self) -> &BookId {
        match self {
            BorrowedEntry::Available { book } => &book.book_id,
            BorrowedEntry::Missing { book_id } | BorrowedEntry::Unavailable { book_id } => book_id,
        }
    }
}

/// 台帳スナップショットの書籍詳細をまとめて解決する
///
/// 通知の配信とは切り離され、スナップショットを受け取った表示側が呼ぶ。
/// 貸出中のIDを1回のバッチ呼び出しで取得し、台帳の順序でエントリを返す。
/// カタログのエラーは表示を劣化させるだけで、呼び出し側には返さない。
pub async fn hydrate_ledger(catalog: &dyn CatalogReader, ledger: &Ledger) -> Vec<BorrowedEntry> {
    if ledger.is_empty() {
        return Vec::new();
    }

    match catalog.get_books(ledger.borrowed_ids()).await {
        Ok(mut books) => ledger
            .borrowed_ids()
            .iter()
            .map(|book_id| match books.remove(book_id) {
                Some(book) => BorrowedEntry::Available { book },
                None => {
                    tracing::warn!(book_id = %book_id, "borrowed book missing from catalog");
                    BorrowedEntry::Missing {
                        book_id: book_id.clone(),
                    }
                }
            })
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, borrowed = ledger.len(), "catalog lookup failed, hydration degraded");
            ledger
                .borrowed_ids()
                .iter()
                .map(|book_id| BorrowedEntry::Unavailable {
                    book_id: book_id.clone(),
                })
                .collect()
        }
    }
}
