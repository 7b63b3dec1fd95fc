pub mod commands;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod value_objects;

pub use commands::*;
pub use errors::*;
pub use events::*;
pub use ledger::{CAPACITY, Ledger, LedgerTransition};
pub use value_objects::*;
