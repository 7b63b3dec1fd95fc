use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{
    AppState, borrow_book, get_book_detail, get_ledger, get_ledger_entries, ledger_events,
    return_book,
};

/// Creates the API router with all lending endpoints
///
/// Command endpoints (Write operations):
/// - POST /ledger/borrow/:book_id - Borrow a book
/// - POST /ledger/return/:book_id - Return a book
///
/// Query endpoints (Read operations):
/// - GET /ledger - Current ledger
/// - GET /ledger/entries - Borrowed books with catalog details
/// - GET /ledger/events - Ledger snapshots as Server-Sent Events
/// - GET /books/:book_id - Book detail with its borrow prompt
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        // Command endpoints (Write operations)
        .route("/ledger/borrow/:book_id", post(borrow_book))
        .route("/ledger/return/:book_id", post(return_book))
        // Query endpoints (Read operations)
        .route("/ledger", get(get_ledger))
        .route("/ledger/entries", get(get_ledger_entries))
        .route("/ledger/events", get(ledger_events))
        .route("/books/:book_id", get(get_book_detail))
        // Add tracing middleware
        .layer(TraceLayer::new_for_http())
        // Add application state
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
