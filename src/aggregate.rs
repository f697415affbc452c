//! Map-based aggregation of transactions into the four rollup maps.
//!
//! An [`Aggregates`] is built sequentially for one batch and then merged into
//! the global aggregates. Merging is additive per key, so folding a set of
//! transactions in any partitioning and merging the parts in file order gives
//! the same maps as folding the whole set at once.

use std::collections::HashMap;

use crate::model::{CountryRevenue, ProductFrequency, RegionRevenue, Transaction};

/// Composite key of the country revenue rollup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CountryKey {
    pub country: String,
    pub product_name: String,
    pub category: String,
}

impl CountryKey {
    fn of(tx: &Transaction) -> Self {
        Self {
            country: tx.country.clone(),
            product_name: tx.product_name.clone(),
            category: tx.category.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregates {
    pub countries: HashMap<CountryKey, CountryRevenue>,
    pub products: HashMap<String, ProductFrequency>,
    pub monthly: HashMap<String, f64>,
    pub regions: HashMap<String, RegionRevenue>,
    pub record_count: u64,
}

impl Aggregates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_transactions<'a, I>(transactions: I) -> Self
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        let mut aggregates = Self::new();
        for tx in transactions {
            aggregates.fold(tx);
        }
        aggregates
    }

    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }

    /// Fold one valid transaction into the maps.
    pub fn fold(&mut self, tx: &Transaction) {
        let country = self
            .countries
            .entry(CountryKey::of(tx))
            .or_insert_with(|| CountryRevenue {
                country: tx.country.clone(),
                product_name: tx.product_name.clone(),
                category: tx.category.clone(),
                total_revenue: 0.0,
                transactions: 0,
            });
        country.total_revenue += tx.total_price;
        country.transactions = country.transactions.saturating_add(1);

        // Category sticks to the first occurrence, stock follows the latest one.
        let product = self
            .products
            .entry(tx.product_name.clone())
            .or_insert_with(|| ProductFrequency {
                product_name: tx.product_name.clone(),
                category: tx.category.clone(),
                frequency: 0,
                stock_quantity: tx.stock,
            });
        product.frequency = product.frequency.saturating_add(1);
        product.stock_quantity = tx.stock;

        *self.monthly.entry(tx.month_key()).or_insert(0.0) += tx.total_price;

        let region = self
            .regions
            .entry(tx.region.clone())
            .or_insert_with(|| RegionRevenue {
                region: tx.region.clone(),
                revenue: 0.0,
                items_sold: 0,
            });
        region.revenue += tx.total_price;
        // Quantities are unbounded integers; the total clamps instead of wrapping.
        region.items_sold = region.items_sold.saturating_add(tx.quantity);

        self.record_count = self.record_count.saturating_add(1);
    }

    /// Merge `later` into `self`. `later` must cover rows that come after
    /// everything already folded into `self`.
    pub fn merge(&mut self, later: Aggregates) {
        for (key, local) in later.countries {
            match self.countries.get_mut(&key) {
                Some(global) => {
                    global.total_revenue += local.total_revenue;
                    global.transactions = global.transactions.saturating_add(local.transactions);
                }
                None => {
                    self.countries.insert(key, local);
                }
            }
        }

        for (key, local) in later.products {
            match self.products.get_mut(&key) {
                Some(global) => {
                    global.frequency = global.frequency.saturating_add(local.frequency);
                    global.stock_quantity = local.stock_quantity;
                }
                None => {
                    self.products.insert(key, local);
                }
            }
        }

        for (month, volume) in later.monthly {
            *self.monthly.entry(month).or_insert(0.0) += volume;
        }

        for (key, local) in later.regions {
            match self.regions.get_mut(&key) {
                Some(global) => {
                    global.revenue += local.revenue;
                    global.items_sold = global.items_sold.saturating_add(local.items_sold);
                }
                None => {
                    self.regions.insert(key, local);
                }
            }
        }

        self.record_count = self.record_count.saturating_add(later.record_count);
    }

    /// Number of distinct keys across the four maps.
    pub fn distinct_keys(&self) -> usize {
        self.countries.len() + self.products.len() + self.monthly.len() + self.regions.len()
    }
}
