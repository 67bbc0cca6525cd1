//! Document-store translator: compiles filter slices into aggregation
//! pipelines (match, group with compound _id, post-group having match,
//! sort, limit)

use serde_json::{json, Map, Value};

use crate::error::{QueryBuilderError, QueryBuilderResult};
use crate::filter::{Condition, FilterIR, Interval, Operator, Slice};
use crate::schema::{AggregateKind, FieldMap, NormalizedType};
use super::{Plan, QueryTranslator};

/// Translator for the document-store backend
#[derive(Default)]
pub struct DocumentTranslator;

impl DocumentTranslator {
    pub fn new() -> Self {
        Self
    }

    fn translate_slice(&self, slice: &Slice, field_map: &FieldMap) -> QueryBuilderResult<Plan> {
        let mut pipeline: Vec<Value> = Vec::new();

        let mut clauses = Vec::with_capacity(slice.conditions.len());
        for condition in &slice.conditions {
            clauses.push(predicate(condition)?);
        }
        if let Some(match_doc) = combine_clauses(clauses) {
            pipeline.push(json!({"$match": match_doc}));
        }

        if !slice.group_fields().is_empty() {
            pipeline.push(self.build_group_stage(slice, field_map));
            if let Some(having) = build_having_match(slice) {
                pipeline.push(json!({"$match": having}));
            }
        }

        if let Some(sort) = &slice.sort {
            let mut spec = Map::new();
            for key in sort {
                let direction = match key.order {
                    crate::filter::SortOrder::Asc => 1,
                    crate::filter::SortOrder::Desc => -1,
                };
                spec.insert(key.field.clone(), json!(direction));
            }
            pipeline.push(json!({"$sort": spec}));
        }

        if let Some(limit) = slice.limit {
            pipeline.push(json!({"$limit": limit}));
        }

        Ok(json!({"pipeline": pipeline}))
    }

    /// Single $group stage: compound `_id` keyed per grouped field
    /// (dots rewritten to underscores), one accumulator per metric, and a
    /// push-all-root document collection
    fn build_group_stage(&self, slice: &Slice, field_map: &FieldMap) -> Value {
        let interval = slice.interval.unwrap_or(Interval::Month);

        let mut id = Map::new();
        for group_field in slice.group_fields() {
            let key = group_field.replace('.', "_");
            let field_type = field_map.get(group_field).map(|s| s.field_type);
            let expr = if field_type == Some(NormalizedType::Date) {
                json!({
                    "$dateToString": {
                        "format": interval.doc_format(),
                        "date": {
                            "$dateFromString": {
                                "dateString": format!("${}", group_field),
                                "onError": null,
                                "onNull": null,
                            }
                        },
                    }
                })
            } else {
                json!(format!("${}", group_field))
            };
            id.insert(key, expr);
        }

        let mut group = Map::new();
        group.insert("_id".to_string(), Value::Object(id));
        for agg in slice.aggregation_list() {
            let accumulator = if agg.kind == AggregateKind::Count {
                // count only non-null occurrences of the named field, the
                // same contract as the search backend's value_count
                json!({"$sum": {"$cond": [
                    {"$ne": [format!("${}", agg.field), null]}, 1, 0
                ]}})
            } else {
                json!({(agg.kind.doc_accumulator()): format!("${}", agg.field)})
            };
            group.insert(agg.metric_name(), accumulator);
        }
        group.insert("documents".to_string(), json!({"$push": "$$ROOT"}));

        json!({"$group": group})
    }
}

impl QueryTranslator for DocumentTranslator {
    fn translate(&self, ir: &FilterIR, field_map: &FieldMap) -> QueryBuilderResult<Vec<Plan>> {
        ir.slices
            .iter()
            .map(|slice| self.translate_slice(slice, field_map))
            .collect()
    }
}

/// One clause stays bare; several are AND-joined
fn combine_clauses(clauses: Vec<Value>) -> Option<Value> {
    match clauses.len() {
        0 => None,
        1 => clauses.into_iter().next(),
        _ => Some(json!({"$and": clauses})),
    }
}

/// Lower one condition to a match clause using native comparators
fn predicate(condition: &Condition) -> QueryBuilderResult<Value> {
    let field = condition.field.as_str();
    let value = &condition.value;

    let clause = match condition.operator {
        Operator::GreaterThan => json!({field: {"$gt": value}}),
        Operator::LessThan => json!({field: {"$lt": value}}),
        Operator::Is => json!({field: {"$eq": value}}),
        Operator::Different => json!({field: {"$ne": value}}),
        Operator::IsIn => json!({field: {"$in": value}}),
        Operator::NotIn => json!({field: {"$nin": value}}),
        Operator::Between => {
            let pair = value.as_array().filter(|p| p.len() == 2).ok_or_else(|| {
                QueryBuilderError::translation(format!(
                    "between on '{}' reached the translator without a [lo, hi] pair",
                    field
                ))
            })?;
            json!({field: {"$gte": pair[0], "$lte": pair[1]}})
        }
        Operator::Contains => {
            let needle = value.as_str().ok_or_else(|| {
                QueryBuilderError::translation(format!(
                    "contains on '{}' reached the translator without a string value",
                    field
                ))
            })?;
            json!({field: {"$regex": regex::escape(needle), "$options": "i"}})
        }
        Operator::Exists => match value.as_bool() {
            // exists means "present and non-null", mirroring count semantics
            Some(true) => json!({field: {"$exists": true, "$ne": null}}),
            Some(false) => json!({"$or": [{field: {"$exists": false}}, {field: null}]}),
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

/// Post-group match comparing accumulator names against having values
fn build_having_match(slice: &Slice) -> Option<Value> {
    let mut clauses = Vec::new();
    for agg in slice.aggregation_list() {
        if let (Some(op), Some(value)) = (agg.having_operator, &agg.having_value) {
            clauses.push(json!({(agg.metric_name()): {(op.doc_comparator()): value}}));
        }
    }
    combine_clauses(clauses)
}
