//! Rollup finalization: aggregate maps to sorted, ranked collections.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregates;
use crate::model::{CountryRevenue, MonthlyData, ProductFrequency, RegionRevenue};

/// One complete, immutable set of rollups plus metadata.
///
/// Collections are sorted descending by their metric; ties are broken by key
/// ascending so the order is identical across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecomputedData {
    pub country_revenue: Vec<CountryRevenue>,
    pub top_products: Vec<ProductFrequency>,
    pub monthly_sales: Vec<MonthlyData>,
    pub top_regions: Vec<RegionRevenue>,
    pub last_modified: DateTime<Utc>,
    pub record_count: u64,
}

impl Default for PrecomputedData {
    fn default() -> Self {
        Self::empty()
    }
}

impl PrecomputedData {
    /// The snapshot installed before any load.
    pub fn empty() -> Self {
        Self {
            country_revenue: Vec::new(),
            top_products: Vec::new(),
            monthly_sales: Vec::new(),
            top_regions: Vec::new(),
            last_modified: DateTime::<Utc>::UNIX_EPOCH,
            record_count: 0,
        }
    }

    /// Materialize and sort every map. `record_count` is taken from the
    /// aggregates, i.e. the number of rows actually folded in.
    pub fn finalize(aggregates: Aggregates, last_modified: DateTime<Utc>) -> Self {
        let record_count = aggregates.record_count;

        let mut country_revenue: Vec<CountryRevenue> =
            aggregates.countries.into_values().collect();
        country_revenue.sort_by(|a, b| {
            desc(a.total_revenue, b.total_revenue)
                .then_with(|| a.country.cmp(&b.country))
                .then_with(|| a.product_name.cmp(&b.product_name))
                .then_with(|| a.category.cmp(&b.category))
        });

        let mut top_products: Vec<ProductFrequency> = aggregates.products.into_values().collect();
        top_products.sort_by(|a, b| {
            b.frequency
                .cmp(&a.frequency)
                .then_with(|| a.product_name.cmp(&b.product_name))
        });

        let mut monthly_sales: Vec<MonthlyData> = aggregates
            .monthly
            .into_iter()
            .map(|(month, volume)| MonthlyData { month, volume })
            .collect();
        monthly_sales.sort_by(|a, b| desc(a.volume, b.volume).then_with(|| a.month.cmp(&b.month)));

        let mut top_regions: Vec<RegionRevenue> = aggregates.regions.into_values().collect();
        top_regions.sort_by(|a, b| desc(a.revenue, b.revenue).then_with(|| a.region.cmp(&b.region)));

        Self {
            country_revenue,
            top_products,
            monthly_sales,
            top_regions,
            last_modified,
            record_count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }
}

fn desc(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

/// Prefix of at most `limit` elements. Never re-sorts, never panics.
pub fn top_n<T>(rows: &[T], limit: usize) -> &[T] {
    &rows[..limit.min(rows.len())]
}
