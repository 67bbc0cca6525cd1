//! Normalized field map: the flattened, type-annotated schema consumed by
//! the filter builder and both translators

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::types::NormalizedType;

/// Description of one queryable leaf field
///
/// Invariants: `values` is present iff the type is enum and holds a
/// non-empty, duplicate-free ordered set; `item_type` is present iff the
/// type is array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub field_type: NormalizedType,

    /// Allowed literals, enum fields only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,

    /// Element type, array fields only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_type: Option<NormalizedType>,

    /// True when equality lookups need the backend's exact-match variant
    /// (the `.keyword` suffix on the search backend)
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub exact_match_capable: bool,
}

impl FieldSpec {
    pub fn scalar(field_type: NormalizedType) -> Self {
        Self {
            field_type,
            values: None,
            item_type: None,
            exact_match_capable: false,
        }
    }

    pub fn array(item_type: NormalizedType) -> Self {
        Self {
            field_type: NormalizedType::Array,
            values: None,
            item_type: Some(item_type),
            exact_match_capable: false,
        }
    }

    /// Enum spec; values are deduplicated preserving first occurrence
    pub fn enumeration(values: Vec<Value>) -> Self {
        let mut seen: Vec<Value> = Vec::with_capacity(values.len());
        for v in values {
            if !seen.contains(&v) {
                seen.push(v);
            }
        }
        Self {
            field_type: NormalizedType::Enum,
            values: Some(seen),
            item_type: None,
            exact_match_capable: false,
        }
    }

    pub fn with_exact_match(mut self, exact: bool) -> Self {
        self.exact_match_capable = exact;
        self
    }

    /// Promote this spec to an enum, keeping the exact-match flag
    pub fn promote_to_enum(&mut self, values: Vec<Value>) {
        let exact = self.exact_match_capable;
        *self = FieldSpec::enumeration(values).with_exact_match(exact);
    }
}

/// Ordered mapping from dotted field path to its spec
///
/// Only leaf paths appear; a parent object path is never present alongside
/// its leaves.
pub type FieldMap = BTreeMap<String, FieldSpec>;

/// Normalized type of a field path, if known
pub fn field_type(map: &FieldMap, path: &str) -> Option<NormalizedType> {
    map.get(path).map(|spec| spec.field_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_enumeration_dedups_preserving_order() {
        let spec = FieldSpec::enumeration(vec![json!("b"), json!("a"), json!("b")]);
        assert_eq!(spec.values, Some(vec![json!("b"), json!("a")]));
    }

    #[test]
    fn test_promote_keeps_exact_match_flag() {
        let mut spec = FieldSpec::scalar(NormalizedType::String).with_exact_match(true);
        spec.promote_to_enum(vec![json!("GOLD"), json!("SILVER")]);
        assert_eq!(spec.field_type, NormalizedType::Enum);
        assert!(spec.exact_match_capable);
    }

    #[test]
    fn test_field_spec_serde_shape() {
        let spec = FieldSpec::enumeration(vec![json!("GOLD")]);
        let v = serde_json::to_value(&spec).unwrap();
        assert_eq!(v, json!({"type": "enum", "values": ["GOLD"]}));
    }
}
