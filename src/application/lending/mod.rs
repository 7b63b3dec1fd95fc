mod errors;
mod hydration;
mod lending_service;
mod retry;
mod subscription;

pub use errors::{LendingError, Result};
pub use hydration::{BorrowedEntry, hydrate_ledger};
pub use lending_service::{
    ServiceDependencies, borrow_book, current_ledger, find_book, return_book, with_deadline,
};
pub use retry::RetryPolicy;
pub use subscription::subscribe;
