//! Catalog store
//!
//! Loads all product rows from the configured CSV source once at startup
//! and holds them in memory. The set is immutable after load; there is no
//! runtime reload.

use crate::error::AgentError;
use crate::models::Product;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

/// Raw CSV row before validation and coercion.
#[derive(Debug, Deserialize)]
struct RawProductRow {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    image_url: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    discount: String,
    #[serde(default)]
    price: String,
    #[serde(default)]
    variant: String,
    #[serde(default)]
    created_at: String,
}

/// In-memory snapshot of the product catalog.
pub struct CatalogStore {
    products: Vec<Product>,
    ready: bool,
}

impl CatalogStore {
    /// An empty, not-ready store. Search calls against it fail with a
    /// not-initialized error; used for wiring before load completes.
    pub fn empty() -> Self {
        Self {
            products: Vec::new(),
            ready: false,
        }
    }

    /// Load the full catalog from a CSV file.
    ///
    /// A missing or unreadable file is fatal. Rows without a title or URL
    /// are skipped with a warning; malformed numeric fields fall back to
    /// defined defaults instead of rejecting the row.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(path)
            .map_err(|e| {
                AgentError::DataLoad(format!(
                    "Failed to open catalog source {}: {}",
                    path.display(),
                    e
                ))
            })?;

        let mut products = Vec::new();
        let mut skipped = 0usize;

        for (index, row) in reader.deserialize::<RawProductRow>().enumerate() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    warn!(row = index + 1, error = %e, "Skipping unreadable catalog row");
                    skipped += 1;
                    continue;
                }
            };

            match validate_row(row) {
                Some(product) => products.push(product),
                None => {
                    warn!(row = index + 1, "Skipping catalog row without title or URL");
                    skipped += 1;
                }
            }
        }

        info!(
            loaded = products.len(),
            skipped,
            path = %path.display(),
            "Catalog loaded"
        );

        Ok(Self {
            products,
            ready: true,
        })
    }

    /// Build a ready store from already-validated products (tests, fixtures).
    pub fn from_products(products: Vec<Product>) -> Self {
        Self {
            products,
            ready: true,
        }
    }

    /// False until the full source has been consumed exactly once.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Distinct category labels, sorted.
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = self
            .products
            .iter()
            .map(|p| p.category.clone())
            .filter(|c| !c.is_empty())
            .collect();
        categories.sort();
        categories.dedup();
        categories
    }
}

/// Validate and coerce one raw row into a `Product`, or drop it.
fn validate_row(row: RawProductRow) -> Option<Product> {
    if row.title.is_empty() || row.url.is_empty() {
        return None;
    }

    // Discount is stored as 0/1; anything unparseable defaults to 0 and any
    // nonzero value is coerced to 1.
    let discount = match row.discount.parse::<i64>() {
        Ok(0) => 0,
        Ok(_) => 1,
        Err(_) => 0,
    };

    let price = if row.price.is_empty() {
        "0.0 USD".to_string()
    } else {
        row.price
    };

    let created_at = row
        .created_at
        .parse::<DateTime<Utc>>()
        .unwrap_or_else(|_| Utc::now());

    let variant = if row.variant.trim().is_empty() {
        None
    } else {
        Some(row.variant)
    };

    Some(Product {
        title: row.title,
        description: row.description,
        url: row.url,
        image_url: row.image_url,
        category: row.category,
        discount,
        price,
        variant,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "title,description,url,image_url,category,discount,price,variant,created_at\n";

    fn write_catalog(rows: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(HEADER.as_bytes()).unwrap();
        file.write_all(rows.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_skips_rows_missing_title_or_url() {
        let file = write_catalog(
            "Phone,A phone,https://shop.example/phone,,Electronics,1,900.0 USD,,2024-01-01T00:00:00Z\n\
             ,No title,https://shop.example/x,,Electronics,0,1.0 USD,,\n\
             No url,desc,,,Electronics,0,1.0 USD,,\n",
        );

        let store = CatalogStore::load(file.path()).unwrap();
        assert!(store.is_ready());
        assert_eq!(store.products().len(), 1);
        assert_eq!(store.products()[0].title, "Phone");
    }

    #[test]
    fn test_load_coerces_malformed_fields() {
        let file = write_catalog(
            "Mug,A mug,https://shop.example/mug,,Kitchen,seven,,\"Red, Blue\",not-a-date\n",
        );

        let store = CatalogStore::load(file.path()).unwrap();
        let product = &store.products()[0];
        assert_eq!(product.discount, 0);
        assert_eq!(product.price, "0.0 USD");
        assert!(product.has_variants());
    }

    #[test]
    fn test_nonzero_discount_coerced_to_one() {
        let file = write_catalog(
            "Mug,A mug,https://shop.example/mug,,Kitchen,3,5.0 USD,,2024-01-01T00:00:00Z\n",
        );

        let store = CatalogStore::load(file.path()).unwrap();
        assert_eq!(store.products()[0].discount, 1);
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let result = CatalogStore::load("/nonexistent/products.csv");
        assert!(matches!(result, Err(AgentError::DataLoad(_))));
    }

    #[test]
    fn test_categories_distinct_and_sorted() {
        let file = write_catalog(
            "A,d,https://shop.example/a,,Kitchen,0,1.0 USD,,\n\
             B,d,https://shop.example/b,,Electronics,0,1.0 USD,,\n\
             C,d,https://shop.example/c,,Kitchen,0,1.0 USD,,\n",
        );

        let store = CatalogStore::load(file.path()).unwrap();
        assert_eq!(store.categories(), vec!["Electronics", "Kitchen"]);
    }

    #[test]
    fn test_empty_store_not_ready() {
        assert!(!CatalogStore::empty().is_ready());
    }
}
