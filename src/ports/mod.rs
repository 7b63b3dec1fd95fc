pub mod catalog_reader;
pub mod ledger_store;

pub use catalog_reader::{Book, CatalogReader};
pub use ledger_store::{LedgerStore, WriteOutcome};
