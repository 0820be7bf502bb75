//! Schema normalization from source payloads to [`CanonicalRecord`].
//!
//! Live backend records and static dataset records disagree on field names
//! and shapes; this crate maps both onto the canonical model. The only hard
//! failure is a record without its own primary key. Everything else is
//! defaulted so no source-specific `null` leaks into the canonical model.

use catalogflow_model::{
    Availability, CanonicalRecord, CatalogSource, Specifications, PLACEHOLDER_DESCRIPTION,
    PLACEHOLDER_NAME,
};
use catalogflow_resolve::resolve;
use serde_json::{Map, Value};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("{source_kind} record is missing its identity field `{field}`")]
    MissingIdentity {
        source_kind: CatalogSource,
        field: &'static str,
    },

    #[error("{0} record is not a JSON object")]
    NotAnObject(CatalogSource),
}

/// Records that survived normalization, plus how many were dropped.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub records: Vec<CanonicalRecord>,
    pub dropped: usize,
}

/// Name of the primary key field for each source schema.
pub fn identity_field(kind: CatalogSource) -> &'static str {
    match kind {
        CatalogSource::Live => "_id",
        CatalogSource::Static => "id",
    }
}

/// Normalize a single source record.
///
/// # Errors
///
/// Returns [`NormalizationError::MissingIdentity`] if the source primary key
/// is absent, null or blank, and [`NormalizationError::NotAnObject`] if the
/// record is not an object at all.
pub fn normalize(source: &Value, kind: CatalogSource) -> Result<CanonicalRecord, NormalizationError> {
    let obj = source
        .as_object()
        .ok_or(NormalizationError::NotAnObject(kind))?;

    let field = identity_field(kind);
    let source_key = obj
        .get(field)
        .and_then(identity_value)
        .ok_or(NormalizationError::MissingIdentity {
            source_kind: kind,
            field,
        })?;

    let draft = match kind {
        CatalogSource::Live => from_live(obj),
        CatalogSource::Static => from_static(obj),
    };

    let id = resolve(&source_key).canonical_id;
    Ok(finish(id, source_key, draft))
}

/// Normalize a list of source records, dropping failures and duplicate keys.
pub fn normalize_batch(records: &[Value], kind: CatalogSource) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    let mut seen = HashSet::new();

    for (index, raw) in records.iter().enumerate() {
        match normalize(raw, kind) {
            Ok(record) => {
                if seen.insert(record.id.clone()) {
                    batch.records.push(record);
                } else {
                    tracing::warn!(
                        index,
                        id = %record.id,
                        source_key = %record.source_key,
                        "Dropping duplicate catalog record"
                    );
                    batch.dropped += 1;
                }
            }
            Err(e) => {
                tracing::warn!(index, source = %kind, error = %e, "Dropping unnormalizable record");
                batch.dropped += 1;
            }
        }
    }

    batch
}

/// Source-independent intermediate shape before invariants are enforced.
#[derive(Debug, Default)]
struct Draft {
    name: Option<String>,
    description: Option<String>,
    price: Option<f64>,
    original_price: Option<f64>,
    category: Option<String>,
    subcategory: Option<String>,
    brand: Option<String>,
    tags: Vec<String>,
    rating: Option<f64>,
    review_count: Option<f64>,
    in_stock: Option<bool>,
    stock_count: Option<f64>,
    images: Vec<String>,
    specifications: Specifications,
    is_new: bool,
    is_featured: bool,
}

fn from_live(obj: &Map<String, Value>) -> Draft {
    // Rating is usually `{ average, count }`, older payloads send a bare number.
    let (rating, review_count) = match obj.get("rating") {
        Some(Value::Object(rating)) => (
            rating.get("average").and_then(number),
            rating.get("count").and_then(number),
        ),
        Some(other) => (number(other), num_field(obj, "reviewCount")),
        None => (None, num_field(obj, "reviewCount")),
    };

    let stock = num_field(obj, "stock");

    Draft {
        name: str_field(obj, "name"),
        description: str_field(obj, "description"),
        price: num_field(obj, "price"),
        original_price: num_field(obj, "originalPrice"),
        category: obj.get("category").and_then(named),
        subcategory: obj.get("subcategory").and_then(named),
        brand: obj.get("brand").and_then(named),
        tags: obj.get("tags").map(string_list).unwrap_or_default(),
        rating,
        review_count,
        in_stock: stock.map(|s| s > 0.0),
        stock_count: stock,
        images: obj.get("images").map(image_list).unwrap_or_default(),
        specifications: obj.get("specifications").map(specifications).unwrap_or_default(),
        is_new: bool_field(obj, "isNew"),
        is_featured: bool_field(obj, "isFeatured"),
    }
}

fn from_static(obj: &Map<String, Value>) -> Draft {
    Draft {
        name: str_field(obj, "name"),
        description: str_field(obj, "description"),
        price: num_field(obj, "price"),
        original_price: num_field(obj, "originalPrice"),
        category: obj.get("category").and_then(named),
        subcategory: obj.get("subcategory").and_then(named),
        brand: obj.get("brand").and_then(named),
        tags: obj.get("tags").map(string_list).unwrap_or_default(),
        rating: num_field(obj, "rating"),
        review_count: num_field(obj, "reviewCount"),
        in_stock: obj.get("inStock").and_then(Value::as_bool),
        stock_count: num_field(obj, "stockCount"),
        images: obj.get("images").map(image_list).unwrap_or_default(),
        specifications: obj.get("specifications").map(specifications).unwrap_or_default(),
        is_new: bool_field(obj, "isNew"),
        is_featured: bool_field(obj, "isFeatured"),
    }
}

/// Apply canonical defaults and invariants.
fn finish(id: String, source_key: String, draft: Draft) -> CanonicalRecord {
    let price = draft.price.map(non_negative).unwrap_or(0.0);

    // An original price below the selling price is meaningless; clear it.
    let original_price = draft
        .original_price
        .map(non_negative)
        .filter(|original| *original >= price);

    let stock_count = draft.stock_count.map(|s| non_negative(s).floor().min(u32::MAX as f64) as u32);
    let in_stock = match stock_count {
        Some(0) => false,
        Some(_) => draft.in_stock.unwrap_or(true),
        None => draft.in_stock.unwrap_or(false),
    };

    let mut tags: Vec<String> = Vec::with_capacity(draft.tags.len());
    for tag in draft.tags {
        if !tags.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
            tags.push(tag);
        }
    }

    CanonicalRecord {
        id,
        source_key,
        name: draft.name.unwrap_or_else(|| PLACEHOLDER_NAME.to_string()),
        description: draft
            .description
            .unwrap_or_else(|| PLACEHOLDER_DESCRIPTION.to_string()),
        price,
        original_price,
        category: draft.category.unwrap_or_default(),
        subcategory: draft.subcategory.unwrap_or_default(),
        brand: draft.brand.unwrap_or_default(),
        tags,
        rating: draft.rating.map(|r| r.clamp(0.0, 5.0)).unwrap_or(0.0),
        review_count: draft
            .review_count
            .map(|c| non_negative(c).floor().min(u32::MAX as f64) as u32)
            .unwrap_or(0),
        in_stock,
        stock_count,
        images: draft.images,
        specifications: draft.specifications,
        is_new: draft.is_new,
        is_featured: draft.is_featured,
        availability: Availability::Listed,
    }
}

fn non_negative(n: f64) -> f64 {
    if n.is_finite() && n > 0.0 {
        n
    } else {
        0.0
    }
}

fn identity_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim()).filter(|s| !s.is_empty()).map(str::to_string),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn str_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(text)
}

fn text(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// A string, or an object carrying a `name` (populated references).
fn named(value: &Value) -> Option<String> {
    match value {
        Value::Object(obj) => str_field(obj, "name"),
        other => text(other),
    }
}

/// Numbers may arrive as JSON numbers or numeric strings.
fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn num_field(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    obj.get(key).and_then(number)
}

fn bool_field(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(text).collect())
        .unwrap_or_default()
}

/// Image entries are URIs, or objects with a `url`.
fn image_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::Object(obj) => str_field(obj, "url"),
                    other => text(other),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// An object of name to value, or an array of `{ name|key, value }` pairs.
fn specifications(value: &Value) -> Specifications {
    let mut specs = Specifications::new();

    match value {
        Value::Object(obj) => {
            for (key, raw) in obj {
                if let Some(display) = display_value(raw) {
                    specs.insert(key.trim(), display);
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter().filter_map(Value::as_object) {
                let key = str_field(item, "name").or_else(|| str_field(item, "key"));
                let display = item.get("value").and_then(display_value);
                if let (Some(key), Some(display)) = (key, display) {
                    specs.insert(key, display);
                }
            }
        }
        _ => {}
    }

    specs
}

fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "Yes" } else { "No" }.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(display_value).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        Value::Object(_) => Some(value.to_string()),
    }
}
