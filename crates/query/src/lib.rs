//! Filter, search, sort and paginate canonical records.
//!
//! The same pipeline runs over live and static results so callers cannot
//! tell sources apart by behavior. Also translates a `QueryRequest` into
//! backend-specific parameters through the `QueryDialect` trait.

use catalogflow_model::{CanonicalRecord, QueryRequest, SortKey};
use catalogflow_resolve::normalize_text;
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum QueryError {
    #[error("Minimum price {min} exceeds maximum price {max}")]
    InvertedPriceRange { min: f64, max: f64 },
    #[error("Negative price bound: {0}")]
    NegativePrice(f64),
}

/// One page of pipeline output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub records: Vec<CanonicalRecord>,
    /// Matches before the page window was applied
    pub total: usize,
}

/// Run the full pipeline: filters, search, stable sort, then the page window.
///
/// Returns a new sequence; the input is never reordered.
pub fn apply(records: &[CanonicalRecord], query: &QueryRequest) -> Vec<CanonicalRecord> {
    apply_page(records, query).records
}

/// Same as [`apply`], also reporting how many records matched overall.
pub fn apply_page(records: &[CanonicalRecord], query: &QueryRequest) -> Page {
    let mut selected = filter(records, query);
    sort(&mut selected, query.sort);

    let records = paginate(&selected, query.offset, query.limit)
        .iter()
        .map(|record| (*record).clone())
        .collect();

    Page {
        records,
        total: selected.len(),
    }
}

/// Filter stages in fixed order: category, price, rating, stock, sale, search.
pub fn filter<'a>(records: &'a [CanonicalRecord], query: &QueryRequest) -> Vec<&'a CanonicalRecord> {
    let needle = query
        .search_text
        .as_deref()
        .map(normalize_text)
        .filter(|n| !n.is_empty());

    records
        .iter()
        .filter(|r| query.category.as_deref().map_or(true, |c| r.category == c))
        .filter(|r| query.price_min.map_or(true, |min| r.price >= min))
        .filter(|r| query.price_max.map_or(true, |max| r.price <= max))
        .filter(|r| query.min_rating.map_or(true, |min| r.rating >= min))
        .filter(|r| !query.in_stock_only || r.in_stock)
        .filter(|r| !query.on_sale_only || r.is_on_sale())
        .filter(|r| needle.as_deref().map_or(true, |n| matches_text(r, n)))
        .collect()
}

/// Stable sort; equal keys keep their input order.
pub fn sort(records: &mut [&CanonicalRecord], key: SortKey) {
    match key {
        SortKey::Relevance => {}
        SortKey::PriceAsc => records.sort_by(|a, b| a.price.total_cmp(&b.price)),
        SortKey::PriceDesc => records.sort_by(|a, b| b.price.total_cmp(&a.price)),
        SortKey::RatingDesc => records.sort_by(|a, b| b.rating.total_cmp(&a.rating)),
        SortKey::Newest => records.sort_by(|a, b| newest_first(a, b)),
    }
}

fn newest_first(a: &CanonicalRecord, b: &CanonicalRecord) -> Ordering {
    b.is_new.cmp(&a.is_new)
}

/// Slice out one page. An offset past the end yields an empty page.
pub fn paginate<T>(items: &[T], offset: usize, limit: Option<usize>) -> &[T] {
    let start = offset.min(items.len());
    let end = match limit {
        Some(limit) => start.saturating_add(limit).min(items.len()),
        None => items.len(),
    };
    &items[start..end]
}

/// Case-insensitive substring match against name, description or any tag.
///
/// `needle` must already be normalized with [`normalize_text`].
pub fn matches_text(record: &CanonicalRecord, needle: &str) -> bool {
    normalize_text(&record.name).contains(needle)
        || normalize_text(&record.description).contains(needle)
        || record.tags.iter().any(|tag| normalize_text(tag).contains(needle))
}

/// Trait for translating queries to backend-specific syntax.
pub trait QueryDialect {
    /// The output type (usually query-string pairs or a structured query)
    type Output;

    /// Translate a QueryRequest to this dialect
    fn translate(&self, query: &QueryRequest) -> Result<Self::Output, QueryError>;
}

/// Query-string dialect for the live REST backend.
///
/// Only filter hints are sent; paging is always applied locally after
/// normalization so both sources page identically.
#[derive(Debug, Default)]
pub struct HttpParamsDialect;

impl QueryDialect for HttpParamsDialect {
    type Output = Vec<(String, String)>;

    fn translate(&self, query: &QueryRequest) -> Result<Vec<(String, String)>, QueryError> {
        for bound in [query.price_min, query.price_max].into_iter().flatten() {
            if bound < 0.0 {
                return Err(QueryError::NegativePrice(bound));
            }
        }
        if let (Some(min), Some(max)) = (query.price_min, query.price_max) {
            if min > max {
                return Err(QueryError::InvertedPriceRange { min, max });
            }
        }

        let mut params = Vec::new();

        if let Some(category) = &query.category {
            params.push(("category".to_string(), category.clone()));
        }
        if let Some(min) = query.price_min {
            params.push(("minPrice".to_string(), min.to_string()));
        }
        if let Some(max) = query.price_max {
            params.push(("maxPrice".to_string(), max.to_string()));
        }
        if let Some(rating) = query.min_rating {
            params.push(("minRating".to_string(), rating.to_string()));
        }
        if query.in_stock_only {
            params.push(("inStock".to_string(), "true".to_string()));
        }
        if query.on_sale_only {
            params.push(("onSale".to_string(), "true".to_string()));
        }
        if let Some(search) = query.search_text.as_deref().map(str::trim) {
            if !search.is_empty() {
                params.push(("search".to_string(), search.to_string()));
            }
        }

        let sort = match query.sort {
            SortKey::Relevance => None,
            SortKey::PriceAsc => Some("price-asc"),
            SortKey::PriceDesc => Some("price-desc"),
            SortKey::RatingDesc => Some("rating"),
            SortKey::Newest => Some("newest"),
        };
        if let Some(sort) = sort {
            params.push(("sort".to_string(), sort.to_string()));
        }

        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn make_record(id: &str, name: &str, price: f64, rating: f64) -> CanonicalRecord {
        CanonicalRecord {
            price,
            rating,
            category: "electronics".to_string(),
            ..CanonicalRecord::new(id, name)
        }
    }

    fn ids(records: &[CanonicalRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    fn catalog() -> Vec<CanonicalRecord> {
        vec![
            make_record("a", "USB Cable", 9.99, 4.1),
            make_record("b", "Wireless Mouse", 24.99, 4.5),
            CanonicalRecord {
                category: "home".to_string(),
                ..make_record("c", "Desk Lamp", 34.0, 3.9)
            },
            CanonicalRecord {
                in_stock: false,
                stock_count: Some(0),
                ..make_record("d", "Mechanical Keyboard", 89.0, 4.8)
            },
            CanonicalRecord {
                original_price: Some(199.0),
                tags: vec!["Noise-Cancelling".to_string()],
                ..make_record("e", "Studio Headphones", 149.0, 4.5)
            },
        ]
    }

    #[test]
    fn test_category_filter() {
        let query = QueryRequest::new().with_category("home");
        assert_eq!(ids(&apply(&catalog(), &query)), vec!["c"]);
    }

    #[test]
    fn test_price_filter_is_inclusive() {
        let query = QueryRequest::new().with_price_range(Some(9.99), Some(34.0));
        let result = apply(&catalog(), &query);
        assert_eq!(ids(&result), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_price_filter_bounds_hold() {
        let query = QueryRequest::new().with_price_range(Some(10.0), Some(50.0));
        let result = apply(&catalog(), &query);
        assert!(!result.is_empty());
        assert!(result.iter().all(|r| (10.0..=50.0).contains(&r.price)));
    }

    #[test]
    fn test_price_filter_ignores_original_price() {
        let query = QueryRequest::new().with_price_range(Some(190.0), None);
        assert!(apply(&catalog(), &query).is_empty());
    }

    #[test]
    fn test_rating_stock_and_sale_filters() {
        let query = QueryRequest::new().with_min_rating(4.5);
        assert_eq!(ids(&apply(&catalog(), &query)), vec!["b", "d", "e"]);

        let query = QueryRequest::new().with_min_rating(4.5).in_stock_only();
        assert_eq!(ids(&apply(&catalog(), &query)), vec!["b", "e"]);

        let query = QueryRequest::new().on_sale_only();
        assert_eq!(ids(&apply(&catalog(), &query)), vec!["e"]);
    }

    #[test]
    fn test_search_matches_name_description_and_tags() {
        let query = QueryRequest::new().with_search("MOUSE");
        assert_eq!(ids(&apply(&catalog(), &query)), vec!["b"]);

        let query = QueryRequest::new().with_search("noise-cancel");
        assert_eq!(ids(&apply(&catalog(), &query)), vec!["e"]);

        // Every record carries the default description.
        let query = QueryRequest::new().with_search("description available");
        assert_eq!(apply(&catalog(), &query).len(), 5);
    }

    #[test]
    fn test_blank_search_is_noop() {
        let query = QueryRequest::new().with_search("   ");
        assert_eq!(apply(&catalog(), &query).len(), 5);
    }

    #[test]
    fn test_sort_orders() {
        let records = catalog();

        let asc = apply(&records, &QueryRequest::new().with_sort(SortKey::PriceAsc));
        assert_eq!(ids(&asc), vec!["a", "b", "c", "d", "e"]);

        let desc = apply(&records, &QueryRequest::new().with_sort(SortKey::PriceDesc));
        assert_eq!(ids(&desc), vec!["e", "d", "c", "b", "a"]);

        let rating = apply(&records, &QueryRequest::new().with_sort(SortKey::RatingDesc));
        assert_eq!(ids(&rating), vec!["d", "b", "e", "a", "c"]);
    }

    #[test]
    fn test_sort_is_stable_for_equal_keys() {
        let records: Vec<_> = ["p", "q", "r", "s"]
            .iter()
            .map(|id| make_record(id, id, 20.0, 4.0))
            .collect();

        for key in [
            SortKey::Relevance,
            SortKey::PriceAsc,
            SortKey::PriceDesc,
            SortKey::RatingDesc,
            SortKey::Newest,
        ] {
            let sorted = apply(&records, &QueryRequest::new().with_sort(key));
            assert_eq!(ids(&sorted), vec!["p", "q", "r", "s"], "sort key {:?}", key);
        }
    }

    #[test]
    fn test_newest_puts_new_items_first() {
        let mut records = catalog();
        records[2].is_new = true;
        records[4].is_new = true;

        let sorted = apply(&records, &QueryRequest::new().with_sort(SortKey::Newest));
        assert_eq!(ids(&sorted), vec!["c", "e", "a", "b", "d"]);
    }

    #[test]
    fn test_pagination() {
        let records = catalog();

        let page = apply(&records, &QueryRequest::new().with_offset(1).with_limit(2));
        assert_eq!(ids(&page), vec!["b", "c"]);

        let tail = apply(&records, &QueryRequest::new().with_offset(4).with_limit(10));
        assert_eq!(ids(&tail), vec!["e"]);

        let beyond = apply(
            &records,
            &QueryRequest::new().with_offset(records.len() + 5).with_limit(10),
        );
        assert!(beyond.is_empty());

        assert!(apply(&records, &QueryRequest::new().with_limit(0)).is_empty());
    }

    #[test]
    fn test_page_total_counts_all_matches() {
        let query = QueryRequest::new()
            .with_category("electronics")
            .with_sort(SortKey::PriceAsc)
            .with_limit(2);
        let page = apply_page(&catalog(), &query);

        assert_eq!(ids(&page.records), vec!["a", "b"]);
        assert_eq!(page.total, 4);
    }

    #[test]
    fn test_apply_does_not_reorder_input() {
        let records = catalog();
        let before = records.clone();
        let _ = apply(&records, &QueryRequest::new().with_sort(SortKey::PriceDesc));
        assert_eq!(records, before);
    }

    #[test]
    fn test_http_dialect() {
        let query = QueryRequest::new()
            .with_category("electronics")
            .with_price_range(None, Some(100.0))
            .with_search("  headphones ")
            .in_stock_only()
            .with_sort(SortKey::PriceAsc)
            .with_limit(5);

        let params = HttpParamsDialect.translate(&query).unwrap();
        assert_eq!(
            params,
            vec![
                ("category".to_string(), "electronics".to_string()),
                ("maxPrice".to_string(), "100".to_string()),
                ("inStock".to_string(), "true".to_string()),
                ("search".to_string(), "headphones".to_string()),
                ("sort".to_string(), "price-asc".to_string()),
            ]
        );
    }

    #[test]
    fn test_http_dialect_rejects_inverted_range() {
        let query = QueryRequest::new().with_price_range(Some(50.0), Some(10.0));
        assert_eq!(
            HttpParamsDialect.translate(&query),
            Err(QueryError::InvertedPriceRange { min: 50.0, max: 10.0 })
        );
    }
}
