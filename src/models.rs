//! Request and response schema for similarity search.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Number of matches per query when `top_k` is omitted
pub const DEFAULT_TOP_K: i64 = 2;

/// Error-kind tag for rule violations
pub const VALUE_ERROR: &str = "value_error";

/// Raw similarity request body, before validation.
///
/// Absent fields stay `None` so they are reported per field. An explicit
/// `null` is a type error and rejects the whole body.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct QueryPayload {
    /// Free-text queries
    #[serde(default, deserialize_with = "non_null")]
    #[schema(value_type = Vec<String>, required = true, min_items = 1)]
    pub text: Option<Vec<String>>,

    /// Product descriptions to rank
    #[serde(default, deserialize_with = "non_null")]
    #[schema(value_type = Vec<String>, required = true, min_items = 1)]
    pub products: Option<Vec<String>>,

    /// Matches to return per query
    #[serde(default, deserialize_with = "non_null")]
    #[schema(value_type = i64, minimum = 1, default = 2)]
    pub top_k: Option<TopK>,
}

fn non_null<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// A requested match count.
///
/// Positive counts beyond `usize::MAX` saturate; search truncates them to the
/// product count anyway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopK {
    Count(usize),
    /// Zero or negative, rejected by validation
    NotPositive(i64),
}

impl From<i64> for TopK {
    fn from(value: i64) -> Self {
        if value < 1 {
            Self::NotPositive(value)
        } else {
            Self::Count(usize::try_from(value).unwrap_or(usize::MAX))
        }
    }
}

impl From<u64> for TopK {
    fn from(value: u64) -> Self {
        match value {
            0 => Self::NotPositive(0),
            count => Self::Count(usize::try_from(count).unwrap_or(usize::MAX)),
        }
    }
}

struct TopKVisitor;

impl<'de> Visitor<'de> for TopKVisitor {
    type Value = TopK;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an integer")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<TopK, E> {
        Ok(TopK::from(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<TopK, E> {
        Ok(TopK::from(value))
    }

    // integers past u64 arrive as floats
    fn visit_f64<E: de::Error>(self, value: f64) -> Result<TopK, E> {
        if !value.is_finite() || value.fract() != 0.0 {
            return Err(E::invalid_type(de::Unexpected::Float(value), &self));
        }

        // float to int `as` casts saturate
        if value >= 1.0 {
            Ok(TopK::Count(value as usize))
        } else {
            Ok(TopK::NotPositive(value as i64))
        }
    }
}

impl<'de> Deserialize<'de> for TopK {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TopKVisitor)
    }
}

/// A validated similarity query.
///
/// Only constructible through [`Query::new`] or `TryFrom<QueryPayload>`, so
/// `text` and `products` are non-empty and `top_k >= 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    text: Vec<String>,
    products: Vec<String>,
    top_k: usize,
}

impl Query {
    pub fn new(
        text: Vec<String>,
        products: Vec<String>,
        top_k: i64,
    ) -> Result<Self, ValidationErrors> {
        let top_k = TopK::from(top_k);
        let errors = Self::check(Some(text.as_slice()), Some(products.as_slice()), top_k);

        match top_k {
            TopK::Count(count) if errors.is_empty() => Ok(Self::validated(text, products, count)),
            _ => Err(errors),
        }
    }

    pub fn text(&self) -> &[String] {
        &self.text
    }

    pub fn products(&self) -> &[String] {
        &self.products
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Collect every rule violation; `None` means the field was absent.
    fn check(text: Option<&[String]>, products: Option<&[String]>, top_k: TopK) -> ValidationErrors {
        let mut errors = ValidationErrors::default();

        match text {
            None => errors.push(FieldError::missing("text")),
            Some(text) if text.is_empty() => {
                errors.push(FieldError::value_error("text", "text list cannot be empty"))
            }
            Some(_) => {}
        }

        match products {
            None => errors.push(FieldError::missing("products")),
            Some(products) if products.is_empty() => errors.push(FieldError::value_error(
                "products",
                "products list cannot be empty",
            )),
            Some(_) => {}
        }

        if let TopK::NotPositive(_) = top_k {
            errors.push(FieldError::value_error(
                "top_k",
                "top_k must be greater than 0",
            ));
        }

        errors
    }

    fn validated(text: Vec<String>, products: Vec<String>, top_k: usize) -> Self {
        Self {
            text,
            products,
            top_k,
        }
    }
}

impl TryFrom<QueryPayload> for Query {
    type Error = ValidationErrors;

    fn try_from(payload: QueryPayload) -> Result<Self, Self::Error> {
        let top_k = payload.top_k.unwrap_or(TopK::from(DEFAULT_TOP_K));
        let errors = Self::check(payload.text.as_deref(), payload.products.as_deref(), top_k);

        match (payload.text, payload.products, top_k) {
            (Some(text), Some(products), TopK::Count(count)) if errors.is_empty() => {
                Ok(Self::validated(text, products, count))
            }
            _ => Err(errors),
        }
    }
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldError {
    /// Location path, e.g. `["body", "text"]`
    pub loc: Vec<String>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl FieldError {
    pub fn new(loc: Vec<String>, msg: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            loc,
            msg: msg.into(),
            kind: kind.into(),
        }
    }

    pub fn value_error(field: &str, msg: impl Into<String>) -> Self {
        Self::new(vec![field.to_string()], msg, VALUE_ERROR)
    }

    pub fn missing(field: &str) -> Self {
        Self::new(vec![field.to_string()], "Field required", "missing")
    }
}

/// All validation failures for one payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// Prefix every location with `root`, e.g. `"body"` for request bodies.
    pub fn at(mut self, root: &str) -> Self {
        for error in &mut self.0 {
            error.loc.insert(0, root.to_string());
        }
        self
    }
}

impl From<FieldError> for ValidationErrors {
    fn from(error: FieldError) -> Self {
        Self(vec![error])
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self
            .errors()
            .iter()
            .map(|error| format!("{}: {}", error.loc.join("."), error.msg))
            .collect();
        write!(f, "validation failed: {}", messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// A matched product and its similarity score in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SimilarityMatch {
    pub product: String,
    #[schema(minimum = 0.0, maximum = 1.0)]
    pub score: f64,
}

/// Ranked matches for one query, highest score first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SimilarityResult {
    pub query: String,
    pub matches: Vec<SimilarityMatch>,
}

/// Pair each query with its matches, keeping input order.
pub fn collect_results(
    queries: &[String],
    hits: Vec<Vec<SimilarityMatch>>,
) -> Vec<SimilarityResult> {
    queries
        .iter()
        .cloned()
        .zip(hits)
        .map(|(query, matches)| SimilarityResult { query, matches })
        .collect()
}
