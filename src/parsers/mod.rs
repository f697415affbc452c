pub mod csv;

pub use self::csv::{TransactionParser, MIN_FIELDS};
