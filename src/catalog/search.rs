//! Catalog search engine
//!
//! Read-only filtering, ranking and pagination over the loaded snapshot.
//! No locking: after load there is no concurrent writer.

use crate::error::AgentError;
use crate::models::{Product, SearchCriteria, SearchPage};
use crate::Result;
use std::cmp::Ordering;
use std::sync::Arc;

use super::store::CatalogStore;

const DEFAULT_LIMIT: usize = 20;

/// Parse the numeric value out of a free-text price string.
///
/// Only the first numeric token counts: "13.0 - 15.0 USD" parses as 13.0,
/// the range upper bound and currency are discarded. Unparseable input
/// yields 0.0.
pub fn parse_price(price: &str) -> f64 {
    price
        .split_whitespace()
        .find_map(|token| token.parse::<f64>().ok())
        .map(|value| if value.is_finite() { value.max(0.0) } else { 0.0 })
        .unwrap_or(0.0)
}

/// Answers structured search requests against the catalog snapshot.
pub struct CatalogSearch {
    store: Arc<CatalogStore>,
}

impl CatalogSearch {
    pub fn new(store: Arc<CatalogStore>) -> Self {
        Self { store }
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.store.is_ready() {
            Ok(())
        } else {
            // A startup ordering bug; callers must not retry.
            Err(AgentError::NotInitialized(
                "Product catalog has not been loaded".to_string(),
            ))
        }
    }

    /// Run a structured search: filter, sort, then paginate.
    pub fn search(&self, criteria: &SearchCriteria) -> Result<SearchPage> {
        self.ensure_ready()?;

        let query = criteria.query.as_deref().map(str::to_lowercase);
        let category = criteria.category.as_deref().map(str::to_lowercase);

        let mut matched: Vec<&Product> = self
            .store
            .products()
            .iter()
            .filter(|p| {
                if let Some(q) = &query {
                    let haystack = format!("{} {}", p.title, p.description).to_lowercase();
                    if !haystack.contains(q.as_str()) {
                        return false;
                    }
                }
                if let Some(c) = &category {
                    if p.category.to_lowercase() != *c {
                        return false;
                    }
                }
                let price = parse_price(&p.price);
                if let Some(min) = criteria.min_price {
                    if price < min {
                        return false;
                    }
                }
                if let Some(max) = criteria.max_price {
                    if price > max {
                        return false;
                    }
                }
                if let Some(discount) = criteria.discount {
                    if (p.discount == 1) != discount {
                        return false;
                    }
                }
                if let Some(has_variants) = criteria.has_variants {
                    if p.has_variants() != has_variants {
                        return false;
                    }
                }
                true
            })
            .collect();

        sort_products(&mut matched);

        let total = matched.len();
        let limit = criteria.limit.unwrap_or(DEFAULT_LIMIT);
        let offset = criteria.offset.unwrap_or(0);

        let products: Vec<Product> = matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();

        Ok(SearchPage {
            products,
            total,
            has_more: offset + limit < total,
        })
    }

    /// Exact title match.
    pub fn find_by_title(&self, title: &str) -> Result<Option<Product>> {
        self.ensure_ready()?;
        Ok(self
            .store
            .products()
            .iter()
            .find(|p| p.title == title)
            .cloned())
    }

    /// Exact URL match (URL is the unique key).
    pub fn find_by_url(&self, url: &str) -> Result<Option<Product>> {
        self.ensure_ready()?;
        Ok(self.store.products().iter().find(|p| p.url == url).cloned())
    }

    /// All products in a category, case-insensitively.
    pub fn find_by_category(&self, category: &str) -> Result<Vec<Product>> {
        self.collect_sorted(|p| p.category.eq_ignore_ascii_case(category))
    }

    /// All discounted products.
    pub fn discounted(&self) -> Result<Vec<Product>> {
        self.collect_sorted(|p| p.discount == 1)
    }

    /// All products whose parsed price lies in [min, max].
    pub fn in_price_range(&self, min: f64, max: f64) -> Result<Vec<Product>> {
        self.collect_sorted(|p| {
            let price = parse_price(&p.price);
            price >= min && price <= max
        })
    }

    /// All products whose descriptive text contains the given substring,
    /// case-insensitively.
    pub fn with_description_containing(&self, needle: &str) -> Result<Vec<Product>> {
        let needle = needle.to_lowercase();
        self.collect_sorted(|p| p.description.to_lowercase().contains(&needle))
    }

    fn collect_sorted(&self, predicate: impl Fn(&Product) -> bool) -> Result<Vec<Product>> {
        self.ensure_ready()?;
        let mut matched: Vec<&Product> = self
            .store
            .products()
            .iter()
            .filter(|p| predicate(p))
            .collect();
        sort_products(&mut matched);
        Ok(matched.into_iter().cloned().collect())
    }
}

/// Canonical result ordering: discounted products first, then ascending
/// parsed price within each group. Stable, so equal entries keep load order.
fn sort_products(products: &mut [&Product]) {
    products.sort_by(|a, b| {
        b.discount
            .cmp(&a.discount)
            .then_with(|| {
                parse_price(&a.price)
                    .partial_cmp(&parse_price(&b.price))
                    .unwrap_or(Ordering::Equal)
            })
    });
}
