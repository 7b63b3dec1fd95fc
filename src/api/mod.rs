pub mod error;
pub mod handlers;
pub mod prompt;
pub mod router;
pub mod types;

pub use error::ApiError;
pub use handlers::AppState;
pub use prompt::{BorrowPrompt, UnavailableReason};
pub use router::create_router;
pub use types::*;
