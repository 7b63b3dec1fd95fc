pub mod catalog_reader;

pub use catalog_reader::CatalogReader;
