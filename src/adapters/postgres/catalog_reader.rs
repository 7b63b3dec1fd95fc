use crate::domain::value_objects::BookId;
use crate::ports::catalog_reader::{Book, CatalogReader as CatalogReaderTrait, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use std::collections::HashMap;

/// PostgreSQLの行データをBookに変換する
fn map_row_to_book(row: &PgRow) -> Result<Book> {
    let book_id: String = row.get("book_id");

    Ok(Book {
        book_id: BookId::new(book_id)?,
        title: row.get("title"),
        author: row.get("author"),
        summary: row.get("summary"),
        rating: row.get("rating"),
        image_url: row.get("image_url"),
    })
}

/// CatalogReaderのPostgreSQL実装
///
/// `books`テーブルを読み取り専用で参照する。カタログの更新はこのクレートの責務外。
pub struct CatalogReader {
    pool: PgPool,
}

impl CatalogReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogReaderTrait for CatalogReader {
    async fn get_book(&self, book_id: &BookId) -> Result<Option<Book>> {
        let row = sqlx::query(
            r#"
            SELECT book_id, title, author, summary, rating, image_url
            FROM books
            WHERE book_id = $1
            "#,
        )
        .bind(book_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_book).transpose()
    }

    /// 貸出中の書籍を1回のクエリでまとめて取得する
    async fn get_books(&self, book_ids: &[BookId]) -> Result<HashMap<BookId, Book>> {
        if book_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let keys: Vec<String> = book_ids.iter().map(|id| id.as_str().to_string()).collect();

        let rows = sqlx::query(
            r#"
            SELECT book_id, title, author, summary, rating, image_url
            FROM books
            WHERE book_id = ANY($1)
            "#,
        )
        .bind(&keys)
        .fetch_all(&self.pool)
        .await?;

        let mut books = HashMap::with_capacity(rows.len());
        for row in &rows {
            let book = map_row_to_book(row)?;
            books.insert(book.book_id.clone(), book);
        }
        Ok(books)
    }
}
