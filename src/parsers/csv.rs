use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};

use crate::error::RowError;
use crate::model::Transaction;

/// Minimum number of columns a transaction row must carry.
pub const MIN_FIELDS: usize = 13;

const DATE_FORMAT: &str = "%Y-%m-%d";

// Column positions in the transaction file.
const COL_TRANSACTION_ID: usize = 0;
const COL_DATE: usize = 1;
const COL_USER_ID: usize = 2;
const COL_COUNTRY: usize = 3;
const COL_REGION: usize = 4;
const COL_PRODUCT_ID: usize = 5;
const COL_PRODUCT_NAME: usize = 6;
const COL_CATEGORY: usize = 7;
const COL_PRICE: usize = 8;
const COL_QUANTITY: usize = 9;
const COL_TOTAL_PRICE: usize = 10;
const COL_STOCK: usize = 11;
const COL_ADDED_DATE: usize = 12;

/// Delimited-row parser producing [`Transaction`]s.
///
/// Fields are split with the `csv` crate so quoted values may contain the
/// delimiter; every field is trimmed. One parser is owned per worker thread
/// and reuses its record buffer across lines.
pub struct TransactionParser {
    delimiter: u8,
    record: StringRecord,
}

impl TransactionParser {
    /// Create a comma-separated parser
    pub fn new_csv() -> Self {
        Self::with_delimiter(b',')
    }

    /// Create a tab-separated parser
    pub fn new_tsv() -> Self {
        Self::with_delimiter(b'\t')
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        Self {
            delimiter,
            record: StringRecord::with_capacity(256, MIN_FIELDS),
        }
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// Parse one raw line. Any missing or unparsable required field rejects
    /// the whole row; nothing partial is ever returned.
    pub fn parse(&mut self, line: &str) -> Result<Transaction, RowError> {
        let line = line.trim_end_matches('\n').trim_end_matches('\r');

        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .buffer_capacity(line.len().max(64))
            .from_reader(line.as_bytes());

        match reader.read_record(&mut self.record) {
            Ok(true) => {}
            Ok(false) => {
                return Err(RowError::MissingFields {
                    found: 0,
                    required: MIN_FIELDS,
                })
            }
            Err(_) => return Err(RowError::Malformed),
        }

        let record = &self.record;
        if record.len() < MIN_FIELDS {
            return Err(RowError::MissingFields {
                found: record.len(),
                required: MIN_FIELDS,
            });
        }

        let date =
            NaiveDate::parse_from_str(&record[COL_DATE], DATE_FORMAT).map_err(|_| RowError::Date)?;
        let price = parse_amount(&record[COL_PRICE]).ok_or(RowError::Price)?;
        let quantity = record[COL_QUANTITY]
            .parse::<i64>()
            .map_err(|_| RowError::Quantity)?;
        let total_price = parse_amount(&record[COL_TOTAL_PRICE]).ok_or(RowError::TotalPrice)?;
        let stock = record[COL_STOCK]
            .parse::<i64>()
            .map_err(|_| RowError::Stock)?;

        Ok(Transaction {
            transaction_id: record[COL_TRANSACTION_ID].to_string(),
            date,
            user_id: record[COL_USER_ID].to_string(),
            country: record[COL_COUNTRY].to_string(),
            region: record[COL_REGION].to_string(),
            product_id: record[COL_PRODUCT_ID].to_string(),
            product_name: record[COL_PRODUCT_NAME].to_string(),
            category: record[COL_CATEGORY].to_string(),
            price,
            quantity,
            total_price,
            stock,
            added_date: NaiveDate::parse_from_str(&record[COL_ADDED_DATE], DATE_FORMAT).ok(),
        })
    }
}

impl Default for TransactionParser {
    fn default() -> Self {
        Self::new_csv()
    }
}

/// Decimal amount; NaN and infinities are rejected so rollups stay totally ordered.
fn parse_amount(field: &str) -> Option<f64> {
    field.parse::<f64>().ok().filter(|v| v.is_finite())
}
