//! Transaction input record and the four rollup record types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of the transaction file.
///
/// Only the date, country, region, product name, category, prices, quantity
/// and stock take part in aggregation; the remaining columns are carried
/// along when present.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub transaction_id: String,
    pub date: NaiveDate,
    pub user_id: String,
    pub country: String,
    pub region: String,
    pub product_id: String,
    pub product_name: String,
    pub category: String,
    pub price: f64,
    pub quantity: i64,
    pub total_price: f64,
    pub stock: i64,
    pub added_date: Option<NaiveDate>,
}

impl Transaction {
    /// Calendar month key, formatted `YYYY-MM`.
    pub fn month_key(&self) -> String {
        self.date.format("%Y-%m").to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryRevenue {
    pub country: String,
    pub product_name: String,
    pub category: String,
    pub total_revenue: f64,
    pub transactions: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductFrequency {
    pub product_name: String,
    pub category: String,
    pub frequency: u64,
    pub stock_quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyData {
    pub month: String,
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRevenue {
    pub region: String,
    #[serde(rename = "total_revenue")]
    pub revenue: f64,
    pub items_sold: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_key_is_zero_padded() {
        let tx = Transaction {
            transaction_id: "T1".into(),
            date: NaiveDate::from_ymd_opt(2023, 2, 1).unwrap(),
            user_id: "U1".into(),
            country: "USA".into(),
            region: "North America".into(),
            product_id: "P1".into(),
            product_name: "Laptop".into(),
            category: "Electronics".into(),
            price: 999.99,
            quantity: 1,
            total_price: 999.99,
            stock: 50,
            added_date: None,
        };
        assert_eq!(tx.month_key(), "2023-02");
    }

    #[test]
    fn test_region_revenue_json_field_names() {
        let region = RegionRevenue {
            region: "Europe".into(),
            revenue: 10.5,
            items_sold: 3,
        };
        let json = serde_json::to_value(&region).unwrap();
        assert_eq!(json["total_revenue"], 10.5);
        assert_eq!(json["items_sold"], 3);
    }
}
