//! Search-engine translator: compiles filter slices into the JSON query
//! DSL (bool/must predicates, nested bucket aggregations, bucket-selector
//! having filters)

use serde_json::{json, Map, Value};

use crate::error::{QueryBuilderError, QueryBuilderResult};
use crate::filter::{Condition, FilterIR, Interval, Operator, Slice};
use crate::schema::{FieldMap, NormalizedType};
use super::{Plan, QueryTranslator};

/// Translator for the search-engine backend
pub struct SearchTranslator {
    bucket_size: usize,
    top_hits_size: usize,
}

impl SearchTranslator {
    pub fn new(bucket_size: usize, top_hits_size: usize) -> Self {
        Self {
            bucket_size,
            top_hits_size,
        }
    }

    fn translate_slice(&self, slice: &Slice, field_map: &FieldMap) -> QueryBuilderResult<Plan> {
        let mut must = Vec::with_capacity(slice.conditions.len());
        for condition in &slice.conditions {
            must.push(predicate(condition, field_map)?);
        }

        let mut plan = Map::new();
        if must.is_empty() {
            plan.insert("query".to_string(), json!({"match_all": {}}));
        } else {
            plan.insert("query".to_string(), json!({"bool": {"must": must}}));
        }

        if let Some(sort) = &slice.sort {
            let keys: Vec<Value> = sort
                .iter()
                .map(|key| json!({(key.field.clone()): {"order": key.order.as_str()}}))
                .collect();
            plan.insert("sort".to_string(), Value::Array(keys));
        }

        if let Some(limit) = slice.limit {
            plan.insert("size".to_string(), json!(limit));
        }

        if !slice.group_fields().is_empty() {
            let aggs = self.build_aggregations(slice, field_map)?;
            plan.insert("aggs".to_string(), aggs);
            // Aggregation plans return buckets, not documents
            plan.insert("size".to_string(), json!(0));
        }

        Ok(Value::Object(plan))
    }

    /// Nested bucket levels outer-to-inner; metrics, the per-bucket
    /// document collection, and the having filter live at the innermost
    /// level.
    fn build_aggregations(&self, slice: &Slice, field_map: &FieldMap) -> QueryBuilderResult<Value> {
        let group_fields = slice.group_fields();
        let interval = slice.interval.unwrap_or(Interval::Month);
        let terms_size = slice.limit.unwrap_or(self.bucket_size as u64);

        let mut leaf = Map::new();
        leaf.insert(
            "documents".to_string(),
            json!({"top_hits": {"size": self.top_hits_size}}),
        );

        let mut having_clauses = Vec::new();
        for agg in slice.aggregation_list() {
            let metric_name = agg.metric_name();
            // value_count on an analyzed string needs the exact-match variant
            let metric_field = if agg.kind == crate::schema::AggregateKind::Count {
                exact_field(&agg.field, field_map)
            } else {
                agg.field.clone()
            };
            leaf.insert(
                metric_name.clone(),
                json!({(agg.kind.search_op()): {"field": metric_field}}),
            );
            if let (Some(op), Some(value)) = (agg.having_operator, &agg.having_value) {
                having_clauses.push((metric_name, op, value.clone()));
            }
        }

        if !having_clauses.is_empty() {
            let mut buckets_path = Map::new();
            let mut script_parts = Vec::with_capacity(having_clauses.len());
            for (i, (metric_name, op, value)) in having_clauses.into_iter().enumerate() {
                let var = format!("var_{}", i);
                let literal = match &value {
                    Value::String(s) => format!("'{}'", s),
                    other => other.to_string(),
                };
                script_parts.push(format!("params.{} {} {}", var, op.script_symbol(), literal));
                buckets_path.insert(var, json!(metric_name));
            }
            leaf.insert(
                "having_filter".to_string(),
                json!({
                    "bucket_selector": {
                        "buckets_path": buckets_path,
                        "script": script_parts.join(" && "),
                    }
                }),
            );
        }

        // Assemble from the innermost level outward
        let mut inner: Option<Value> = None;
        for (i, group_field) in group_fields.iter().enumerate().rev() {
            let field_type = field_map.get(group_field).map(|s| s.field_type);
            let mut bucket = if field_type == Some(NormalizedType::Date) {
                let mut b = Map::new();
                b.insert(
                    "date_histogram".to_string(),
                    json!({
                        "field": group_field,
                        "calendar_interval": interval.as_str(),
                        "format": interval.search_format(),
                    }),
                );
                b
            } else {
                let mut b = Map::new();
                b.insert(
                    "terms".to_string(),
                    json!({
                        "field": exact_field(group_field, field_map),
                        "size": terms_size,
                    }),
                );
                b
            };

            let sub = match inner.take() {
                Some(nested) => json!({(format!("group_by_{}", i + 1)): nested}),
                None => Value::Object(leaf.clone()),
            };
            bucket.insert("aggs".to_string(), sub);
            inner = Some(Value::Object(bucket));
        }

        let innermost = inner.ok_or_else(|| {
            QueryBuilderError::translation("grouping requested without group fields")
        })?;
        Ok(json!({"group_by_0": innermost}))
    }
}

impl Default for SearchTranslator {
    fn default() -> Self {
        Self::new(100, 100)
    }
}

impl QueryTranslator for SearchTranslator {
    fn translate(&self, ir: &FilterIR, field_map: &FieldMap) -> QueryBuilderResult<Vec<Plan>> {
        ir.slices
            .iter()
            .map(|slice| self.translate_slice(slice, field_map))
            .collect()
    }
}

/// Field reference for exact-match lookups: append the keyword suffix when
/// the schema marks the field as needing it
fn exact_field(field: &str, field_map: &FieldMap) -> String {
    let needs_suffix = field_map
        .get(field)
        .map(|spec| spec.exact_match_capable)
        .unwrap_or(false);
    if needs_suffix && !field.ends_with(".keyword") {
        format!("{}.keyword", field)
    } else {
        field.to_string()
    }
}

/// Lower one condition to a query predicate
fn predicate(condition: &Condition, field_map: &FieldMap) -> QueryBuilderResult<Value> {
    let field = condition.field.as_str();
    let value = &condition.value;
    let exact = exact_field(field, field_map);

    let clause = match condition.operator {
        Operator::GreaterThan => json!({"range": {field: {"gt": value}}}),
        Operator::LessThan => json!({"range": {field: {"lt": value}}}),
        Operator::Is => json!({"term": {exact: value}}),
        Operator::Different => json!({"bool": {"must_not": [{"term": {exact: value}}]}}),
        Operator::IsIn => json!({"terms": {exact: value}}),
        Operator::NotIn => json!({"bool": {"must_not": [{"terms": {exact: value}}]}}),
        Operator::Between => {
            let pair = value.as_array().filter(|p| p.len() == 2).ok_or_else(|| {
                QueryBuilderError::translation(format!(
                    "between on '{}' reached the translator without a [lo, hi] pair",
                    field
                ))
            })?;
            json!({"range": {field: {"gte": pair[0], "lte": pair[1]}}})
        }
        Operator::Contains => {
            let needle = value.as_str().ok_or_else(|| {
                QueryBuilderError::translation(format!(
                    "contains on '{}' reached the translator without a string value",
                    field
                ))
            })?;
            let escaped = escape_wildcards(&needle.to_lowercase());
            json!({"wildcard": {exact: {"value": format!("*{}*", escaped)}}})
        }
        Operator::Exists => match value.as_bool() {
            Some(true) => json!({"exists": {"field": field}}),
            Some(false) => json!({"bool": {"must_not": [{"exists": {"field": field}}]}}),
            None => {
                return Err(QueryBuilderError::translation(format!(
                    "exists on '{}' reached the translator without a boolean value",
                    field
                )))
            }
        },
    };
    Ok(clause)
}

/// Escape the DSL's wildcard metacharacters inside a literal needle
fn escape_wildcards(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '*' | '?' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
