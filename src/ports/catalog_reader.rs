use crate::domain::value_objects::BookId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 書籍（カタログ側が所有する読み取り専用のメタデータ）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub book_id: BookId,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub summary: String,
    pub rating: Option<f32>,
    pub image_url: Option<String>,
}

/// カタログ読み取りポート
///
/// 貸出コンテキストとカタログコンテキストの境界を維持する。
/// 貸出台帳はBookIDのみを知り、書籍の詳細は知らない。
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// 書籍を取得する
    ///
    /// 未知のIDは`Ok(None)`を返す（エラーではない）。
    async fn get_book(&self, book_id: &BookId) -> Result<Option<Book>>;

    /// 複数の書籍をまとめて取得する
    ///
    /// 見つからなかったIDは結果に含まれない。
    /// 既定の実装は`get_book`を順に呼ぶ。1回のクエリで取得できるアダプターは上書きする。
    async fn get_books(&self, book_ids: &[BookId]) -> Result<HashMap<BookId, Book>> {
        let mut books = HashMap::with_capacity(book_ids.len());
        for book_id in book_ids {
            if let Some(book) = self.get_book(book_id).await? {
                books.insert(book_id.clone(), book);
            }
        }
        Ok(books)
    }
}
