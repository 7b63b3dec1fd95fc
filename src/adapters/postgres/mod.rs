pub mod catalog_reader;
pub mod ledger_store;

// パブリックに型を再エクスポート
pub use catalog_reader::CatalogReader as PostgresCatalogReader;
pub use ledger_store::LedgerStore as PostgresLedgerStore;
