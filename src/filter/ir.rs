//! Filter intermediate representation
//!
//! This is the document the external LLM populates: generic filter slices
//! over schema field paths, not backend query syntax. Values are immutable
//! once they have passed validation; both translators consume them as pure
//! inputs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use crate::schema::types::{AggregateKind, Interval};

/// Condition operators (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "is")]
    Is,
    #[serde(rename = "different")]
    Different,
    #[serde(rename = "isin")]
    IsIn,
    #[serde(rename = "notin")]
    NotIn,
    #[serde(rename = "between")]
    Between,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "exists")]
    Exists,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LessThan => "<",
            Self::GreaterThan => ">",
            Self::Is => "is",
            Self::Different => "different",
            Self::IsIn => "isin",
            Self::NotIn => "notin",
            Self::Between => "between",
            Self::Contains => "contains",
            Self::Exists => "exists",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "<" => Some(Self::LessThan),
            ">" => Some(Self::GreaterThan),
            "is" => Some(Self::Is),
            "different" => Some(Self::Different),
            "isin" => Some(Self::IsIn),
            "notin" => Some(Self::NotIn),
            "between" => Some(Self::Between),
            "contains" => Some(Self::Contains),
            "exists" => Some(Self::Exists),
            _ => None,
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Comparators allowed in a having clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HavingOperator {
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "is")]
    Is,
    #[serde(rename = "different")]
    Different,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = ">=")]
    GreaterOrEqual,
}

impl HavingOperator {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "<" => Some(Self::LessThan),
            ">" => Some(Self::GreaterThan),
            "is" => Some(Self::Is),
            "different" => Some(Self::Different),
            "<=" => Some(Self::LessOrEqual),
            ">=" => Some(Self::GreaterOrEqual),
            _ => None,
        }
    }

    /// Comparison symbol in the search backend's bucket-selector script
    pub fn script_symbol(&self) -> &'static str {
        match self {
            Self::LessThan => "<",
            Self::GreaterThan => ">",
            Self::Is => "==",
            Self::Different => "!=",
            Self::LessOrEqual => "<=",
            Self::GreaterOrEqual => ">=",
        }
    }

    /// Comparator operator in the document store's match stage
    pub fn doc_comparator(&self) -> &'static str {
        match self {
            Self::LessThan => "$lt",
            Self::GreaterThan => "$gt",
            Self::Is => "$eq",
            Self::Different => "$ne",
            Self::LessOrEqual => "$lte",
            Self::GreaterOrEqual => "$gte",
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// One filter condition; conditions within a slice are AND-joined
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

/// One sort key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    #[serde(default)]
    pub order: SortOrder,
}

/// One per-bucket metric, with an optional having predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub field: String,
    #[serde(rename = "type")]
    pub kind: AggregateKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub having_operator: Option<HavingOperator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub having_value: Option<Value>,
}

impl Aggregation {
    /// Metric name used by both backends: kind plus the field path with
    /// dots rewritten to underscores
    pub fn metric_name(&self) -> String {
        format!("{}_{}", self.kind.as_str(), self.field.replace('.', "_"))
    }
}

/// One query slice: an independent unit of filtering, grouping, and
/// aggregation; multiple slices express side-by-side comparisons
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slice {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<SortKey>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_by: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<Interval>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregations: Option<Vec<Aggregation>>,
}

impl Slice {
    pub fn group_fields(&self) -> &[String] {
        self.group_by.as_deref().unwrap_or(&[])
    }

    pub fn aggregation_list(&self) -> &[Aggregation] {
        self.aggregations.as_deref().unwrap_or(&[])
    }
}

/// Canonical validated filter document: a non-empty ordered list of slices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterIR {
    #[serde(rename = "filters")]
    pub slices: Vec<Slice>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operator_symbols_round_trip() {
        for op in [
            Operator::LessThan,
            Operator::GreaterThan,
            Operator::Is,
            Operator::Different,
            Operator::IsIn,
            Operator::NotIn,
            Operator::Between,
            Operator::Contains,
            Operator::Exists,
        ] {
            assert_eq!(Operator::parse(op.as_str()), Some(op));
            let encoded = serde_json::to_value(op).unwrap();
            assert_eq!(encoded, json!(op.as_str()));
        }
    }

    #[test]
    fn test_metric_name_rewrites_dots() {
        let agg = Aggregation {
            field: "transaction.amount".to_string(),
            kind: AggregateKind::Sum,
            having_operator: None,
            having_value: None,
        };
        assert_eq!(agg.metric_name(), "sum_transaction_amount");
    }

    #[test]
    fn test_slice_wire_shape() {
        let doc = json!({
            "filters": [{
                "conditions": [
                    {"field": "card_type", "operator": "is", "value": "GOLD"}
                ],
                "group_by": ["transaction.timestamp"],
                "interval": "month",
                "aggregations": [
                    {"field": "transaction.amount", "type": "sum"}
                ]
            }]
        });
        let ir: FilterIR = serde_json::from_value(doc.clone()).unwrap();
        assert_eq!(ir.slices.len(), 1);
        assert_eq!(ir.slices[0].conditions[0].operator, Operator::Is);
        assert_eq!(ir.slices[0].interval, Some(Interval::Month));
        assert_eq!(serde_json::to_value(&ir).unwrap(), doc);
    }
}
