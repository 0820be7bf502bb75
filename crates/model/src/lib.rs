//! Core domain model for the catalogflow product catalog.
//!
//! This crate defines the fundamental types used throughout the system:
//! - `CanonicalRecord`: The normalized product shape every source converts into
//! - `Specifications`: Ordered, key-unique attribute table
//! - `Resolution`: The outcome of mapping a raw identifier to a canonical key
//! - `QueryRequest` / `SortKey`: Filter, sort and paging criteria
//! - `CatalogSource`: Which source served a result

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Display name used when a source record has no usable name.
pub const PLACEHOLDER_NAME: &str = "Untitled product";

/// Display description used when a source record has no usable description.
pub const PLACEHOLDER_DESCRIPTION: &str = "No description available";

/// Name shown for a synthesized record whose identifier could not be found.
pub const UNAVAILABLE_NAME: &str = "Product unavailable";

/// Description shown for a synthesized record.
pub const UNAVAILABLE_DESCRIPTION: &str =
    "This product could not be found in the catalog right now.";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("Unknown sort key: {0}")]
    UnknownSortKey(String),
}

/// Whether a record is a genuine catalog item or a stand-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    /// Real item served by a catalog source
    #[default]
    Listed,
    /// Synthesized for an identifier that resolved but matched nothing
    Unavailable,
}

/// Attribute name to display value, in insertion order, keys unique.
///
/// Serializes as a JSON object whose key order follows insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Specifications(Vec<(String, String)>);

impl Specifications {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an attribute. A repeated key keeps its first position and takes
    /// the new value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Specifications {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut specs = Self::new();
        for (k, v) in iter {
            specs.insert(k, v);
        }
        specs
    }
}

impl Serialize for Specifications {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Specifications {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SpecVisitor;

        impl<'de> Visitor<'de> for SpecVisitor {
            type Value = Specifications;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of attribute names to display values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut specs = Specifications::new();
                while let Some((k, v)) = access.next_entry::<String, String>()? {
                    specs.insert(k, v);
                }
                Ok(specs)
            }
        }

        deserializer.deserialize_map(SpecVisitor)
    }
}

/// A normalized catalog item.
///
/// This is the canonical representation consumed by every downstream
/// component. Produced by `catalogflow-normalize`; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRecord {
    /// Canonical key (UUID-shaped)
    pub id: String,

    /// The source's own primary key, as received
    #[serde(default)]
    pub source_key: String,

    pub name: String,

    pub description: String,

    /// Current selling price, never negative
    pub price: f64,

    /// Pre-discount price; only present when greater than or equal to `price`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<f64>,

    #[serde(default)]
    pub category: String,

    #[serde(default)]
    pub subcategory: String,

    #[serde(default)]
    pub brand: String,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Average rating in [0, 5]
    #[serde(default)]
    pub rating: f64,

    #[serde(default)]
    pub review_count: u32,

    #[serde(default)]
    pub in_stock: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_count: Option<u32>,

    #[serde(default)]
    pub images: Vec<String>,

    #[serde(default)]
    pub specifications: Specifications,

    #[serde(default)]
    pub is_new: bool,

    #[serde(default)]
    pub is_featured: bool,

    #[serde(default)]
    pub availability: Availability,
}

impl CanonicalRecord {
    /// Create a minimal listed record.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            source_key: id.clone(),
            id,
            name: name.into(),
            description: PLACEHOLDER_DESCRIPTION.to_string(),
            price: 0.0,
            original_price: None,
            category: String::new(),
            subcategory: String::new(),
            brand: String::new(),
            tags: Vec::new(),
            rating: 0.0,
            review_count: 0,
            in_stock: true,
            stock_count: None,
            images: Vec::new(),
            specifications: Specifications::new(),
            is_new: false,
            is_featured: false,
            availability: Availability::Listed,
        }
    }

    /// Stand-in for an identifier that resolved but matched no catalog item.
    pub fn placeholder(canonical_id: impl Into<String>, original_input: impl Into<String>) -> Self {
        Self {
            source_key: original_input.into(),
            description: UNAVAILABLE_DESCRIPTION.to_string(),
            in_stock: false,
            stock_count: Some(0),
            availability: Availability::Unavailable,
            ..Self::new(canonical_id, UNAVAILABLE_NAME)
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.availability == Availability::Unavailable
    }

    /// True when a pre-discount price above the selling price is known.
    pub fn is_on_sale(&self) -> bool {
        self.original_price.is_some_and(|original| original > self.price)
    }

    /// Copy of this record carrying a different canonical key.
    pub fn rekeyed(&self, canonical_id: &str) -> Self {
        Self {
            id: canonical_id.to_string(),
            ..self.clone()
        }
    }
}

/// How a canonical key was obtained from a raw identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionKind {
    /// Input already was a canonical key
    DirectMatch,
    /// Key derived by hashing the input
    Generated,
    /// Record located through a keyword search on the input
    FallbackSearch,
}

impl ResolutionKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::DirectMatch => "direct-match",
            Self::Generated => "generated",
            Self::FallbackSearch => "fallback-search",
        }
    }
}

/// Result of resolving one raw identifier. Ephemeral, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub canonical_id: String,
    pub source_kind: ResolutionKind,
    pub original_input: String,
}

/// Which source served a catalog result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogSource {
    Live,
    Static,
}

impl fmt::Display for CatalogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => f.write_str("live"),
            Self::Static => f.write_str("static"),
        }
    }
}

/// Result ordering. Every key is a stable sort with no secondary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    /// Keep source order
    #[default]
    Relevance,
    PriceAsc,
    PriceDesc,
    RatingDesc,
    /// `is_new` records first; there is no timestamp to sort on
    Newest,
}

impl FromStr for SortKey {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "relevance" | "featured" => Ok(Self::Relevance),
            "price-asc" | "price-ascending" | "price_low" | "price-low" => Ok(Self::PriceAsc),
            "price-desc" | "price-descending" | "price_high" | "price-high" => Ok(Self::PriceDesc),
            "rating" | "rating-desc" | "rating-descending" => Ok(Self::RatingDesc),
            "newest" | "newest-first" => Ok(Self::Newest),
            other => Err(ModelError::UnknownSortKey(other.to_string())),
        }
    }
}

/// Filter, search, sort and paging criteria for a catalog listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    /// Exact category match
    #[serde(default)]
    pub category: Option<String>,

    /// Inclusive lower bound on `price`
    #[serde(default)]
    pub price_min: Option<f64>,

    /// Inclusive upper bound on `price`
    #[serde(default)]
    pub price_max: Option<f64>,

    /// Inclusive lower bound on `rating`
    #[serde(default)]
    pub min_rating: Option<f64>,

    #[serde(default)]
    pub in_stock_only: bool,

    #[serde(default)]
    pub on_sale_only: bool,

    /// Case-insensitive substring over name, description and tags
    #[serde(default)]
    pub search_text: Option<String>,

    #[serde(default)]
    pub sort: SortKey,

    #[serde(default)]
    pub offset: usize,

    /// Page size; `None` returns everything after `offset`
    #[serde(default)]
    pub limit: Option<usize>,
}

impl QueryRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_price_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.price_min = min;
        self.price_max = max;
        self
    }

    pub fn with_min_rating(mut self, rating: f64) -> Self {
        self.min_rating = Some(rating);
        self
    }

    pub fn in_stock_only(mut self) -> Self {
        self.in_stock_only = true;
        self
    }

    pub fn on_sale_only(mut self) -> Self {
        self.on_sale_only = true;
        self
    }

    pub fn with_search(mut self, text: impl Into<String>) -> Self {
        self.search_text = Some(text.into());
        self
    }

    pub fn with_sort(mut self, sort: SortKey) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sort_key_from_str() {
        assert_eq!("price-asc".parse::<SortKey>(), Ok(SortKey::PriceAsc));
        assert_eq!("Price-Descending".parse::<SortKey>(), Ok(SortKey::PriceDesc));
        assert_eq!("rating".parse::<SortKey>(), Ok(SortKey::RatingDesc));
        assert_eq!("newest".parse::<SortKey>(), Ok(SortKey::Newest));
        assert_eq!("".parse::<SortKey>(), Ok(SortKey::Relevance));
        assert!("cheapest".parse::<SortKey>().is_err());
    }

    #[test]
    fn test_specifications_keep_first_position() {
        let mut specs = Specifications::new();
        specs.insert("Color", "Black");
        specs.insert("Weight", "250g");
        specs.insert("Color", "White");

        let pairs: Vec<_> = specs.iter().collect();
        assert_eq!(pairs, vec![("Color", "White"), ("Weight", "250g")]);
    }

    #[test]
    fn test_specifications_serialize_in_order() {
        let specs: Specifications = [("Zoom", "10x"), ("Battery", "2 days"), ("Affix", "none")]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&specs).unwrap();
        assert_eq!(json, r#"{"Zoom":"10x","Battery":"2 days","Affix":"none"}"#);

        let parsed: Specifications = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, specs);
    }

    #[test]
    fn test_record_serialization_uses_camel_case() {
        let record = CanonicalRecord {
            original_price: Some(20.0),
            price: 15.0,
            ..CanonicalRecord::new("6f1c9a2e-0000-5000-8000-000000000000", "Desk Lamp")
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["originalPrice"], 20.0);
        assert_eq!(json["availability"], "listed");

        let parsed: CanonicalRecord = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_placeholder_is_marked() {
        let record = CanonicalRecord::placeholder("abc", "wireless-mouse");
        assert!(record.is_placeholder());
        assert!(!record.in_stock);
        assert_eq!(record.source_key, "wireless-mouse");
        assert!(!CanonicalRecord::new("abc", "Mouse").is_placeholder());
    }

    #[test]
    fn test_on_sale() {
        let base = CanonicalRecord::new("a", "A");
        assert!(!base.is_on_sale());
        let sale = CanonicalRecord {
            price: 10.0,
            original_price: Some(12.5),
            ..base.clone()
        };
        assert!(sale.is_on_sale());
        let equal = CanonicalRecord {
            price: 10.0,
            original_price: Some(10.0),
            ..base
        };
        assert!(!equal.is_on_sale());
    }

    #[test]
    fn test_query_request_defaults_from_json() {
        let query: QueryRequest =
            serde_json::from_str(r#"{"category":"electronics","sort":"price-asc","limit":5}"#)
                .unwrap();
        assert_eq!(
            query,
            QueryRequest::new()
                .with_category("electronics")
                .with_sort(SortKey::PriceAsc)
                .with_limit(5)
        );
    }
}
