//! Rendering of rollups for the command line.

use anyhow::Result;
use serde_json::{Map, Value};

use crate::analytics::{Analytics, LoadReport};

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Default,
    Json,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Section {
    #[default]
    All,
    Countries,
    Products,
    Months,
    Regions,
}

impl Section {
    fn includes(self, other: Section) -> bool {
        self == Section::All || self == other
    }
}

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub format: OutputFormat,
    pub section: Section,
    /// Row limit for the product and region rankings
    pub top: usize,
    pub include_stats: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Default,
            section: Section::All,
            top: 10,
            include_stats: false,
        }
    }
}

/// Render the current snapshot of `analytics`.
pub fn render(analytics: &Analytics, load: Option<&LoadReport>, options: &ReportOptions) -> Result<String> {
    match options.format {
        OutputFormat::Default => Ok(render_text(analytics, load, options)),
        OutputFormat::Json => render_json(analytics, load, options),
    }
}

fn render_text(analytics: &Analytics, load: Option<&LoadReport>, options: &ReportOptions) -> String {
    let mut out = String::new();

    if options.section.includes(Section::Countries) {
        let rows = analytics.country_revenue();
        push_table(
            &mut out,
            "Revenue by country",
            &["COUNTRY", "PRODUCT", "CATEGORY", "REVENUE", "TRANSACTIONS"],
            rows.iter().map(|r| {
                vec![
                    r.country.clone(),
                    r.product_name.clone(),
                    r.category.clone(),
                    format!("{:.2}", r.total_revenue),
                    r.transactions.to_string(),
                ]
            }),
        );
    }

    if options.section.includes(Section::Products) {
        let rows = analytics.top_products(options.top);
        push_table(
            &mut out,
            &format!("Top {} products", rows.len()),
            &["PRODUCT", "CATEGORY", "SOLD", "STOCK"],
            rows.iter().map(|r| {
                vec![
                    r.product_name.clone(),
                    r.category.clone(),
                    r.frequency.to_string(),
                    r.stock_quantity.to_string(),
                ]
            }),
        );
    }

    if options.section.includes(Section::Months) {
        let rows = analytics.monthly_sales();
        push_table(
            &mut out,
            "Monthly sales volume",
            &["MONTH", "VOLUME"],
            rows.iter()
                .map(|r| vec![r.month.clone(), format!("{:.2}", r.volume)]),
        );
    }

    if options.section.includes(Section::Regions) {
        let rows = analytics.top_regions(options.top);
        push_table(
            &mut out,
            &format!("Top {} regions", rows.len()),
            &["REGION", "REVENUE", "ITEMS SOLD"],
            rows.iter().map(|r| {
                vec![
                    r.region.clone(),
                    format!("{:.2}", r.revenue),
                    r.items_sold.to_string(),
                ]
            }),
        );
    }

    if options.include_stats {
        let stats = analytics.stats();
        out.push_str("== Stats ==\n");
        out.push_str(&format!(
            "Records: {}\nLast processed: {}\nCountry rows: {}\nProducts: {}\nMonths: {}\nRegions: {}\n",
            stats.record_count,
            stats.last_processed.to_rfc3339(),
            stats.countries,
            stats.products,
            stats.months,
            stats.regions
        ));
        if let Some(load) = load {
            match &load.stats {
                Some(ingest) => out.push_str(&format!("{}\n", ingest.format_stats())),
                None => out.push_str("Loaded from cache\n"),
            }
        }
    }

    out
}

fn push_table<I>(out: &mut String, title: &str, headers: &[&str], rows: I)
where
    I: Iterator<Item = Vec<String>>,
{
    let rows: Vec<Vec<String>> = rows.collect();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    out.push_str(&format!("== {} ==\n", title));
    push_row(out, headers.iter().copied(), &widths);
    for row in &rows {
        push_row(out, row.iter().map(String::as_str), &widths);
    }
    out.push('\n');
}

fn push_row<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let line: Vec<String> = cells
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}

fn render_json(analytics: &Analytics, load: Option<&LoadReport>, options: &ReportOptions) -> Result<String> {
    let mut doc = Map::new();

    if options.section.includes(Section::Countries) {
        doc.insert(
            "country_revenue".to_string(),
            serde_json::to_value(analytics.country_revenue())?,
        );
    }
    if options.section.includes(Section::Products) {
        doc.insert(
            "top_products".to_string(),
            serde_json::to_value(analytics.top_products(options.top))?,
        );
    }
    if options.section.includes(Section::Months) {
        doc.insert(
            "monthly_sales".to_string(),
            serde_json::to_value(analytics.monthly_sales())?,
        );
    }
    if options.section.includes(Section::Regions) {
        doc.insert(
            "top_regions".to_string(),
            serde_json::to_value(analytics.top_regions(options.top))?,
        );
    }
    if options.include_stats {
        doc.insert("stats".to_string(), serde_json::to_value(analytics.stats())?);
        if let Some(load) = load {
            doc.insert("load".to_string(), serde_json::to_value(load)?);
        }
    }

    let mut rendered = serde_json::to_string_pretty(&Value::Object(doc))?;
    rendered.push('\n');
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::tests::tx;
    use crate::config::EngineConfig;

    fn analytics() -> Analytics {
        let analytics = Analytics::with_config(EngineConfig::default().without_cache()).unwrap();
        analytics.set_data(&[
            tx((2023, 1, 15), "USA", "North America", "Laptop", "Electronics", 999.99, 1, 50),
            tx((2023, 2, 1), "Canada", "North America", "Mouse", "Electronics", 29.99, 3, 200),
            tx((2023, 2, 2), "Germany", "Europe", "Desk", "Furniture", 199.99, 1, 10),
        ]);
        analytics
    }

    #[test]
    fn test_text_report_all_sections() {
        let text = render(&analytics(), None, &ReportOptions::default()).unwrap();
        assert!(text.contains("== Revenue by country =="));
        assert!(text.contains("== Top 3 products =="));
        assert!(text.contains("== Monthly sales volume =="));
        assert!(text.contains("== Top 2 regions =="));
        assert!(text.contains("999.99"));
        assert!(!text.contains("== Stats =="));
    }

    #[test]
    fn test_text_report_single_section_respects_top() {
        let options = ReportOptions {
            section: Section::Products,
            top: 1,
            ..ReportOptions::default()
        };
        let text = render(&analytics(), None, &options).unwrap();
        assert!(text.contains("== Top 1 products =="));
        assert!(!text.contains("Revenue by country"));
        assert_eq!(text.lines().filter(|l| l.starts_with("Laptop") || l.starts_with("Mouse") || l.starts_with("Desk")).count(), 1);
    }

    #[test]
    fn test_json_report() {
        let options = ReportOptions {
            format: OutputFormat::Json,
            include_stats: true,
            top: 2,
            ..ReportOptions::default()
        };
        let json: Value = serde_json::from_str(&render(&analytics(), None, &options).unwrap()).unwrap();

        assert_eq!(json["country_revenue"].as_array().unwrap().len(), 3);
        assert_eq!(json["top_products"].as_array().unwrap().len(), 2);
        assert_eq!(json["top_regions"][0]["region"], "North America");
        assert_eq!(json["top_regions"][0]["items_sold"], 4);
        assert_eq!(json["monthly_sales"][0]["month"], "2023-01");
        assert_eq!(json["stats"]["record_count"], 3);
        assert!(json.get("load").is_none());
    }
}
