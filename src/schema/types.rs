//! Type registry: static mapping tables shared by extractors and translators

use serde::{Deserialize, Serialize};

/// Normalized field type tags (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizedType {
    String,
    Number,
    Date,
    Boolean,
    Enum,
    Array,
    Object,
}

impl NormalizedType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Date => "date",
            Self::Boolean => "boolean",
            Self::Enum => "enum",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

impl std::fmt::Display for NormalizedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Search-backend field types that carry no queryable data
const IGNORED_SEARCH_TYPES: &[&str] = &["alias"];

/// Map a search-backend mapping type to its normalized tag
///
/// Returns None for ignored or unrecognized types; callers skip those
/// entries and record a warning.
pub fn normalize_search_type(backend_type: &str) -> Option<NormalizedType> {
    if IGNORED_SEARCH_TYPES.contains(&backend_type) {
        return None;
    }
    match backend_type {
        "text" | "keyword" => Some(NormalizedType::String),
        "integer" | "long" | "short" | "byte" => Some(NormalizedType::Number),
        "double" | "float" | "half_float" | "scaled_float" => Some(NormalizedType::Number),
        "boolean" => Some(NormalizedType::Boolean),
        "date" => Some(NormalizedType::Date),
        "object" => Some(NormalizedType::Object),
        "nested" => Some(NormalizedType::Array),
        _ => None,
    }
}

/// Calendar interval for date grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    Day,
    Week,
    Month,
    Year,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    /// Format string for the search backend's date-histogram output
    pub fn search_format(&self) -> &'static str {
        match self {
            Self::Day => "yyyy-MM-dd",
            Self::Week => "yyyy-'W'ww",
            Self::Month => "yyyy-MM",
            Self::Year => "yyyy",
        }
    }

    /// Format string for the document store's date-to-string expression
    pub fn doc_format(&self) -> &'static str {
        match self {
            Self::Day => "%Y-%m-%d",
            Self::Week => "%Y-W%V",
            Self::Month => "%Y-%m",
            Self::Year => "%Y",
        }
    }
}

/// Aggregation kinds computed per bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateKind {
    Sum,
    Avg,
    Count,
    Min,
    Max,
}

impl AggregateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Count => "count",
            Self::Min => "min",
            Self::Max => "max",
        }
    }

    /// Metric operator name in the search backend's aggregation DSL
    pub fn search_op(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Count => "value_count",
            Self::Min => "min",
            Self::Max => "max",
        }
    }

    /// Accumulator operator in the document store; count is lowered to a
    /// conditional sum over non-null field occurrences and has no operator
    /// of its own
    pub fn doc_accumulator(&self) -> &'static str {
        match self {
            Self::Sum => "$sum",
            Self::Avg => "$avg",
            Self::Count => "$sum",
            Self::Min => "$min",
            Self::Max => "$max",
        }
    }

    /// Count is legal on any field type; the other four require numbers
    pub fn requires_numeric(&self) -> bool {
        !matches!(self, Self::Count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_type_table() {
        assert_eq!(normalize_search_type("text"), Some(NormalizedType::String));
        assert_eq!(normalize_search_type("keyword"), Some(NormalizedType::String));
        assert_eq!(normalize_search_type("long"), Some(NormalizedType::Number));
        assert_eq!(normalize_search_type("double"), Some(NormalizedType::Number));
        assert_eq!(normalize_search_type("boolean"), Some(NormalizedType::Boolean));
        assert_eq!(normalize_search_type("date"), Some(NormalizedType::Date));
        assert_eq!(normalize_search_type("nested"), Some(NormalizedType::Array));
        assert_eq!(normalize_search_type("alias"), None);
        assert_eq!(normalize_search_type("dense_vector"), None);
    }

    #[test]
    fn test_interval_formats() {
        assert_eq!(Interval::Day.search_format(), "yyyy-MM-dd");
        assert_eq!(Interval::Week.search_format(), "yyyy-'W'ww");
        assert_eq!(Interval::Month.search_format(), "yyyy-MM");
        assert_eq!(Interval::Year.search_format(), "yyyy");
        assert_eq!(Interval::Month.doc_format(), "%Y-%m");
    }

    #[test]
    fn test_aggregate_kind_ops() {
        assert_eq!(AggregateKind::Count.search_op(), "value_count");
        assert_eq!(AggregateKind::Sum.doc_accumulator(), "$sum");
        assert!(AggregateKind::Sum.requires_numeric());
        assert!(!AggregateKind::Count.requires_numeric());
    }
}
