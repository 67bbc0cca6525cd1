//! Filter validation: canonicalizes an untyped filter document into a
//! `FilterIR`, rejecting illegal combinations and auto-correcting the
//! recoverable ones
//!
//! Checks run in a fixed order: document shape, per-condition field /
//! operator / value-shape rules, slice-level auto-corrections (reported as
//! warnings, never errors), aggregation kinds, having pairs.

use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::error::{QueryBuilderError, QueryBuilderResult, ValidationKind};
use crate::schema::{FieldMap, NormalizedType};
use super::builder::legal_operators;
use super::ir::{
    Aggregation, Condition, FilterIR, HavingOperator, Operator, Slice, SortKey, SortOrder,
};

/// Sentinel field name some upstream callers emit for "no condition";
/// conditions carrying it are dropped defensively.
const NULL_FIELD_SENTINEL: &str = "null";

/// A canonical IR plus the auto-correction warnings produced on the way
#[derive(Debug, Clone)]
pub struct ValidatedFilters {
    pub ir: FilterIR,
    pub warnings: Vec<String>,
}

/// Validator bound to one field map's per-field rules
#[derive(Clone)]
pub struct FilterValidator {
    field_map: Arc<FieldMap>,
}

impl FilterValidator {
    pub fn new(field_map: Arc<FieldMap>) -> Self {
        Self { field_map }
    }

    /// Validate and canonicalize an untyped filter document
    pub fn validate(&self, document: &Value) -> QueryBuilderResult<ValidatedFilters> {
        let filters = document
            .get("filters")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                QueryBuilderError::validation(
                    ValidationKind::BadValueShape,
                    "/filters",
                    "expected an object with a non-empty filters array",
                )
            })?;
        if filters.is_empty() {
            return Err(QueryBuilderError::validation(
                ValidationKind::BadValueShape,
                "/filters",
                "filters array must contain at least one slice",
            ));
        }

        let mut warnings = Vec::new();
        let mut slices = Vec::with_capacity(filters.len());
        for (i, raw_slice) in filters.iter().enumerate() {
            slices.push(self.validate_slice(raw_slice, i, &mut warnings)?);
        }

        for w in &warnings {
            warn!(warning = %w, "filter auto-correction applied");
        }

        Ok(ValidatedFilters {
            ir: FilterIR { slices },
            warnings,
        })
    }

    fn validate_slice(
        &self,
        raw: &Value,
        index: usize,
        warnings: &mut Vec<String>,
    ) -> QueryBuilderResult<Slice> {
        let base = format!("/filters/{}", index);
        let obj = raw.as_object().ok_or_else(|| {
            QueryBuilderError::validation(
                ValidationKind::BadValueShape,
                &base,
                "slice must be an object",
            )
        })?;

        let conditions = self.validate_conditions(obj.get("conditions"), &base, warnings)?;
        let group_by = self.validate_group_by(obj.get("group_by"), &base, warnings)?;
        let sort = self.validate_sort(obj.get("sort"), &base, warnings)?;
        let limit = validate_limit(obj.get("limit"), &base)?;
        let interval = validate_interval(obj.get("interval"), &base)?;

        // Auto-corrections come before the aggregation checks: aggregations
        // without grouping are dropped, not inspected; an interval no
        // date-typed group field can consume is dropped too.
        let raw_aggregations = obj.get("aggregations").filter(|v| !v.is_null());
        let aggregations = match (&group_by, raw_aggregations) {
            (None, Some(raw)) if raw.as_array().map(|a| !a.is_empty()).unwrap_or(true) => {
                warnings.push(format!(
                    "{}: aggregations without group_by were removed",
                    base
                ));
                None
            }
            (_, raw) => self
                .validate_aggregations(raw, &base)?
                .filter(|aggs| !aggs.is_empty()),
        };

        let interval = match interval {
            Some(iv) => {
                let date_grouped = group_by.as_deref().unwrap_or(&[]).iter().any(|f| {
                    self.field_map.get(f).map(|s| s.field_type) == Some(NormalizedType::Date)
                });
                if date_grouped {
                    Some(iv)
                } else {
                    warnings.push(format!(
                        "{}: interval without a date group field was removed",
                        base
                    ));
                    None
                }
            }
            None => None,
        };

        Ok(Slice {
            conditions,
            sort,
            limit,
            group_by,
            interval,
            aggregations,
        })
    }

    fn validate_conditions(
        &self,
        raw: Option<&Value>,
        base: &str,
        warnings: &mut Vec<String>,
    ) -> QueryBuilderResult<Vec<Condition>> {
        let Some(raw) = raw.filter(|v| !v.is_null()) else {
            return Ok(Vec::new());
        };
        let list = raw.as_array().ok_or_else(|| {
            QueryBuilderError::validation(
                ValidationKind::BadValueShape,
                format!("{}/conditions", base),
                "conditions must be an array",
            )
        })?;

        let mut conditions = Vec::with_capacity(list.len());
        for (j, raw_condition) in list.iter().enumerate() {
            let path = format!("{}/conditions/{}", base, j);
            if let Some(condition) = self.validate_condition(raw_condition, &path, warnings)? {
                conditions.push(condition);
            }
        }
        Ok(conditions)
    }

    fn validate_condition(
        &self,
        raw: &Value,
        path: &str,
        warnings: &mut Vec<String>,
    ) -> QueryBuilderResult<Option<Condition>> {
        let obj = raw.as_object().ok_or_else(|| {
            QueryBuilderError::validation(
                ValidationKind::BadValueShape,
                path,
                "condition must be an object",
            )
        })?;

        let field = obj.get("field").and_then(Value::as_str).ok_or_else(|| {
            QueryBuilderError::validation(
                ValidationKind::BadValueShape,
                format!("{}/field", path),
                "condition field must be a string",
            )
        })?;

        if field == NULL_FIELD_SENTINEL {
            warnings.push(format!("{}: condition with sentinel field was dropped", path));
            return Ok(None);
        }

        let spec = self.field_map.get(field).ok_or_else(|| {
            QueryBuilderError::validation(
                ValidationKind::UnknownField,
                format!("{}/field", path),
                format!("field '{}' is not in the schema", field),
            )
        })?;

        let operator_str = obj.get("operator").and_then(Value::as_str).ok_or_else(|| {
            QueryBuilderError::validation(
                ValidationKind::BadValueShape,
                format!("{}/operator", path),
                "condition operator must be a string",
            )
        })?;
        let operator = Operator::parse(operator_str).ok_or_else(|| {
            QueryBuilderError::validation(
                ValidationKind::IllegalOperator,
                format!("{}/operator", path),
                format!("unknown operator '{}'", operator_str),
            )
        })?;

        let field_type = spec.field_type;
        if !legal_operators(field_type).contains(&operator) {
            return Err(QueryBuilderError::validation(
                ValidationKind::IllegalOperator,
                format!("{}/operator", path),
                format!(
                    "operator '{}' is not legal for {} field '{}'",
                    operator, field_type, field
                ),
            ));
        }

        let value = obj.get("value").cloned().unwrap_or(Value::Null);
        let value_path = format!("{}/value", path);
        self.check_value_shape(&value, operator, field_type, spec.values.as_deref(), &value_path)?;

        Ok(Some(Condition {
            field: field.to_string(),
            operator,
            value,
        }))
    }

    fn check_value_shape(
        &self,
        value: &Value,
        operator: Operator,
        field_type: NormalizedType,
        enum_values: Option<&[Value]>,
        path: &str,
    ) -> QueryBuilderResult<()> {
        let bad = |message: String| {
            Err(QueryBuilderError::validation(
                ValidationKind::BadValueShape,
                path,
                message,
            ))
        };

        match operator {
            Operator::Between => {
                let Some(pair) = value.as_array() else {
                    return bad("between expects a [lo, hi] list".to_string());
                };
                if pair.len() != 2 {
                    return bad(format!("between expects exactly 2 values, got {}", pair.len()));
                }
                for bound in pair {
                    if !scalar_matches_type(bound, field_type) {
                        return bad(format!(
                            "between bounds must be {} scalars",
                            field_type
                        ));
                    }
                }
                if !bounds_ordered(&pair[0], &pair[1], field_type) {
                    return bad("between bounds must satisfy lo <= hi".to_string());
                }
                Ok(())
            }
            Operator::IsIn | Operator::NotIn => {
                let Some(items) = value.as_array() else {
                    return bad(format!("{} expects a list of values", operator));
                };
                if items.is_empty() {
                    return bad(format!("{} expects a non-empty list", operator));
                }
                if let Some(allowed) = enum_values {
                    for item in items {
                        if !allowed.contains(item) {
                            return Err(QueryBuilderError::validation(
                                ValidationKind::BadEnumValue,
                                path,
                                format!("value {} is not one of the allowed enum values", item),
                            ));
                        }
                    }
                } else {
                    for item in items {
                        if !scalar_matches_type(item, field_type) {
                            return bad(format!("list elements must be {} scalars", field_type));
                        }
                    }
                }
                Ok(())
            }
            Operator::Contains => {
                if value.is_string() {
                    Ok(())
                } else {
                    bad("contains expects a string value".to_string())
                }
            }
            Operator::Exists => {
                if value.is_boolean() {
                    Ok(())
                } else {
                    bad("exists expects a boolean value".to_string())
                }
            }
            Operator::LessThan
            | Operator::GreaterThan
            | Operator::Is
            | Operator::Different => {
                if scalar_matches_type(value, field_type) {
                    Ok(())
                } else {
                    bad(format!("expected a {} scalar", field_type))
                }
            }
        }
    }

    fn validate_group_by(
        &self,
        raw: Option<&Value>,
        base: &str,
        warnings: &mut Vec<String>,
    ) -> QueryBuilderResult<Option<Vec<String>>> {
        let Some(raw) = raw else {
            return Ok(None);
        };
        if raw.is_null() {
            return Ok(None);
        }
        let list = raw.as_array().ok_or_else(|| {
            QueryBuilderError::validation(
                ValidationKind::BadValueShape,
                format!("{}/group_by", base),
                "group_by must be an array of field paths",
            )
        })?;
        if list.is_empty() {
            return Ok(None);
        }

        let mut fields: Vec<String> = Vec::with_capacity(list.len());
        for (j, item) in list.iter().enumerate() {
            let path = format!("{}/group_by/{}", base, j);
            let field = item.as_str().ok_or_else(|| {
                QueryBuilderError::validation(
                    ValidationKind::BadValueShape,
                    &path,
                    "group_by entries must be strings",
                )
            })?;
            if !self.field_map.contains_key(field) {
                return Err(QueryBuilderError::validation(
                    ValidationKind::UnknownField,
                    &path,
                    format!("group_by field '{}' is not in the schema", field),
                ));
            }
            if fields.iter().any(|f| f == field) {
                warnings.push(format!("{}: duplicate group_by field '{}' removed", base, field));
                continue;
            }
            fields.push(field.to_string());
        }
        Ok(Some(fields))
    }

    fn validate_sort(
        &self,
        raw: Option<&Value>,
        base: &str,
        warnings: &mut Vec<String>,
    ) -> QueryBuilderResult<Option<Vec<SortKey>>> {
        let Some(raw) = raw else {
            return Ok(None);
        };
        if raw.is_null() {
            return Ok(None);
        }
        let list = raw.as_array().ok_or_else(|| {
            QueryBuilderError::validation(
                ValidationKind::BadValueShape,
                format!("{}/sort", base),
                "sort must be an array",
            )
        })?;

        let mut keys = Vec::with_capacity(list.len());
        for (j, item) in list.iter().enumerate() {
            let path = format!("{}/sort/{}", base, j);
            let obj = item.as_object().ok_or_else(|| {
                QueryBuilderError::validation(
                    ValidationKind::BadValueShape,
                    &path,
                    "sort entries must be objects",
                )
            })?;
            let field = obj.get("field").and_then(Value::as_str).ok_or_else(|| {
                QueryBuilderError::validation(
                    ValidationKind::BadValueShape,
                    format!("{}/field", path),
                    "sort field must be a string",
                )
            })?;
            if !self.field_map.contains_key(field) {
                warnings.push(format!(
                    "{}: sort on unknown field '{}' was dropped",
                    path, field
                ));
                continue;
            }
            let order = match obj.get("order").and_then(Value::as_str) {
                Some("desc") => SortOrder::Desc,
                Some("asc") | None => SortOrder::Asc,
                Some(other) => {
                    return Err(QueryBuilderError::validation(
                        ValidationKind::BadValueShape,
                        format!("{}/order", path),
                        format!("unknown sort order '{}'", other),
                    ));
                }
            };
            keys.push(SortKey {
                field: field.to_string(),
                order,
            });
        }
        Ok(if keys.is_empty() { None } else { Some(keys) })
    }

    fn validate_aggregations(
        &self,
        raw: Option<&Value>,
        base: &str,
    ) -> QueryBuilderResult<Option<Vec<Aggregation>>> {
        let Some(raw) = raw else {
            return Ok(None);
        };
        if raw.is_null() {
            return Ok(None);
        }
        let list = raw.as_array().ok_or_else(|| {
            QueryBuilderError::validation(
                ValidationKind::BadValueShape,
                format!("{}/aggregations", base),
                "aggregations must be an array",
            )
        })?;

        let mut aggregations = Vec::with_capacity(list.len());
        for (j, item) in list.iter().enumerate() {
            let path = format!("{}/aggregations/{}", base, j);
            aggregations.push(self.validate_aggregation(item, &path)?);
        }
        Ok(Some(aggregations))
    }

    fn validate_aggregation(&self, raw: &Value, path: &str) -> QueryBuilderResult<Aggregation> {
        let obj = raw.as_object().ok_or_else(|| {
            QueryBuilderError::validation(
                ValidationKind::BadValueShape,
                path,
                "aggregation must be an object",
            )
        })?;

        let field = obj.get("field").and_then(Value::as_str).ok_or_else(|| {
            QueryBuilderError::validation(
                ValidationKind::BadValueShape,
                format!("{}/field", path),
                "aggregation field must be a string",
            )
        })?;
        let spec = self.field_map.get(field).ok_or_else(|| {
            QueryBuilderError::validation(
                ValidationKind::UnknownField,
                format!("{}/field", path),
                format!("aggregation field '{}' is not in the schema", field),
            )
        })?;

        let kind_value = obj.get("type").cloned().ok_or_else(|| {
            QueryBuilderError::validation(
                ValidationKind::BadValueShape,
                format!("{}/type", path),
                "aggregation type is required",
            )
        })?;
        let kind: crate::schema::AggregateKind =
            serde_json::from_value(kind_value).map_err(|_| {
                QueryBuilderError::validation(
                    ValidationKind::BadValueShape,
                    format!("{}/type", path),
                    "aggregation type must be one of sum, avg, count, min, max",
                )
            })?;

        if kind.requires_numeric() && spec.field_type != NormalizedType::Number {
            return Err(QueryBuilderError::validation(
                ValidationKind::IllegalOperator,
                format!("{}/type", path),
                format!(
                    "aggregation '{}' requires a number field, '{}' is {}",
                    kind.as_str(),
                    field,
                    spec.field_type
                ),
            ));
        }

        let having_operator = obj.get("having_operator").filter(|v| !v.is_null());
        let having_value = obj.get("having_value").filter(|v| !v.is_null());
        let (having_operator, having_value) = match (having_operator, having_value) {
            (None, None) => (None, None),
            (Some(op), Some(value)) => {
                let op_str = op.as_str().ok_or_else(|| {
                    QueryBuilderError::validation(
                        ValidationKind::BadHaving,
                        format!("{}/having_operator", path),
                        "having_operator must be a string",
                    )
                })?;
                let op = HavingOperator::parse(op_str).ok_or_else(|| {
                    QueryBuilderError::validation(
                        ValidationKind::BadHaving,
                        format!("{}/having_operator", path),
                        format!("unknown having operator '{}'", op_str),
                    )
                })?;
                if !(value.is_number() || value.is_string() || value.is_boolean()) {
                    return Err(QueryBuilderError::validation(
                        ValidationKind::BadHaving,
                        format!("{}/having_value", path),
                        "having_value must be a scalar",
                    ));
                }
                (Some(op), Some(value.clone()))
            }
            _ => {
                return Err(QueryBuilderError::validation(
                    ValidationKind::BadHaving,
                    path,
                    "having_operator and having_value must be provided together",
                ));
            }
        };

        Ok(Aggregation {
            field: field.to_string(),
            kind,
            having_operator,
            having_value,
        })
    }
}

/// Does this JSON scalar match the field's normalized type
fn scalar_matches_type(value: &Value, field_type: NormalizedType) -> bool {
    match field_type {
        NormalizedType::Number => value.is_number(),
        NormalizedType::Boolean => value.is_boolean(),
        NormalizedType::Date => value.as_str().map(is_iso_date_literal).unwrap_or(false),
        NormalizedType::String => value.is_string(),
        // Enum literals come back from distinct collection and may be
        // strings or numbers; membership is checked separately for list
        // operators.
        NormalizedType::Enum => value.is_string() || value.is_number(),
        NormalizedType::Array | NormalizedType::Object => false,
    }
}

/// ISO-8601 date or datetime literal
pub(crate) fn is_iso_date_literal(s: &str) -> bool {
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
        || chrono::DateTime::parse_from_rfc3339(s).is_ok()
}

fn bounds_ordered(lo: &Value, hi: &Value, field_type: NormalizedType) -> bool {
    match field_type {
        NormalizedType::Number => match (lo.as_f64(), hi.as_f64()) {
            (Some(a), Some(b)) => a <= b,
            _ => false,
        },
        // ISO-8601 literals order lexicographically within the same shape
        NormalizedType::Date => match (lo.as_str(), hi.as_str()) {
            (Some(a), Some(b)) => a <= b,
            _ => false,
        },
        _ => false,
    }
}

fn validate_limit(raw: Option<&Value>, base: &str) -> QueryBuilderResult<Option<u64>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    if raw.is_null() {
        return Ok(None);
    }
    match raw.as_u64() {
        Some(n) if n > 0 => Ok(Some(n)),
        _ => Err(QueryBuilderError::validation(
            ValidationKind::BadValueShape,
            format!("{}/limit", base),
            "limit must be a positive integer",
        )),
    }
}

fn validate_interval(
    raw: Option<&Value>,
    base: &str,
) -> QueryBuilderResult<Option<crate::schema::Interval>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    if raw.is_null() {
        return Ok(None);
    }
    serde_json::from_value(raw.clone()).map(Some).map_err(|_| {
        QueryBuilderError::validation(
            ValidationKind::BadValueShape,
            format!("{}/interval", base),
            "interval must be one of day, week, month, year",
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, NormalizedType};
    use serde_json::json;

    fn transaction_field_map() -> Arc<FieldMap> {
        let mut map = FieldMap::new();
        map.insert(
            "card_type".to_string(),
            FieldSpec::enumeration(vec![json!("GOLD"), json!("SILVER")]).with_exact_match(true),
        );
        map.insert(
            "transaction.amount".to_string(),
            FieldSpec::scalar(NormalizedType::Number),
        );
        map.insert(
            "transaction.timestamp".to_string(),
            FieldSpec::scalar(NormalizedType::Date),
        );
        map.insert(
            "transaction.receiver.name".to_string(),
            FieldSpec::scalar(NormalizedType::String).with_exact_match(true),
        );
        map.insert(
            "transaction.settled".to_string(),
            FieldSpec::scalar(NormalizedType::Boolean),
        );
        Arc::new(map)
    }

    fn validator() -> FilterValidator {
        FilterValidator::new(transaction_field_map())
    }

    #[test]
    fn test_accepts_basic_condition() {
        let doc = json!({
            "filters": [{
                "conditions": [
                    {"field": "card_type", "operator": "is", "value": "GOLD"}
                ]
            }]
        });
        let validated = validator().validate(&doc).unwrap();
        assert_eq!(validated.ir.slices.len(), 1);
        assert!(validated.warnings.is_empty());
    }

    #[test]
    fn test_rejects_unknown_field() {
        let doc = json!({
            "filters": [{
                "conditions": [
                    {"field": "no.such.field", "operator": "is", "value": 1}
                ]
            }]
        });
        let err = validator().validate(&doc).unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationKind::UnknownField));
    }

    #[test]
    fn test_rejects_illegal_operator_for_type() {
        let doc = json!({
            "filters": [{
                "conditions": [
                    {"field": "transaction.receiver.name", "operator": ">", "value": "x"}
                ]
            }]
        });
        let err = validator().validate(&doc).unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationKind::IllegalOperator));
    }

    #[test]
    fn test_rejects_unordered_between() {
        let doc = json!({
            "filters": [{
                "conditions": [
                    {"field": "transaction.amount", "operator": "between", "value": [10, 5]}
                ]
            }]
        });
        let err = validator().validate(&doc).unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationKind::BadValueShape));
    }

    #[test]
    fn test_rejects_bad_enum_member() {
        let doc = json!({
            "filters": [{
                "conditions": [
                    {"field": "card_type", "operator": "isin", "value": ["GOLD", "PLATINUM"]}
                ]
            }]
        });
        let err = validator().validate(&doc).unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationKind::BadEnumValue));
    }

    #[test]
    fn test_rejects_non_iso_date_literal() {
        let doc = json!({
            "filters": [{
                "conditions": [
                    {"field": "transaction.timestamp", "operator": ">", "value": "last week"}
                ]
            }]
        });
        let err = validator().validate(&doc).unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationKind::BadValueShape));
    }

    #[test]
    fn test_drops_sentinel_field_condition() {
        let doc = json!({
            "filters": [{
                "conditions": [
                    {"field": "null", "operator": "is", "value": "x"},
                    {"field": "card_type", "operator": "is", "value": "GOLD"}
                ]
            }]
        });
        let validated = validator().validate(&doc).unwrap();
        assert_eq!(validated.ir.slices[0].conditions.len(), 1);
        assert_eq!(validated.warnings.len(), 1);
    }

    #[test]
    fn test_clears_aggregations_without_group_by() {
        let doc = json!({
            "filters": [{
                "conditions": [],
                "aggregations": [
                    {"field": "transaction.amount", "type": "sum"}
                ]
            }]
        });
        let validated = validator().validate(&doc).unwrap();
        assert!(validated.ir.slices[0].aggregations.is_none());
        assert_eq!(validated.warnings.len(), 1);
    }

    #[test]
    fn test_clears_interval_without_date_group() {
        let doc = json!({
            "filters": [{
                "conditions": [],
                "group_by": ["card_type"],
                "interval": "month"
            }]
        });
        let validated = validator().validate(&doc).unwrap();
        assert!(validated.ir.slices[0].interval.is_none());
        assert_eq!(validated.warnings.len(), 1);
    }

    #[test]
    fn test_dedupes_group_by_and_drops_unknown_sort() {
        let doc = json!({
            "filters": [{
                "conditions": [],
                "group_by": ["card_type", "card_type"],
                "sort": [
                    {"field": "transaction.amount", "order": "desc"},
                    {"field": "ghost", "order": "asc"}
                ]
            }]
        });
        let validated = validator().validate(&doc).unwrap();
        let slice = &validated.ir.slices[0];
        assert_eq!(slice.group_by, Some(vec!["card_type".to_string()]));
        assert_eq!(slice.sort.as_ref().unwrap().len(), 1);
        assert_eq!(validated.warnings.len(), 2);
    }

    #[test]
    fn test_rejects_numeric_aggregation_on_string_field() {
        let doc = json!({
            "filters": [{
                "conditions": [],
                "group_by": ["card_type"],
                "aggregations": [
                    {"field": "transaction.receiver.name", "type": "sum"}
                ]
            }]
        });
        let err = validator().validate(&doc).unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationKind::IllegalOperator));
    }

    #[test]
    fn test_count_is_legal_on_any_type() {
        let doc = json!({
            "filters": [{
                "conditions": [],
                "group_by": ["card_type"],
                "aggregations": [
                    {"field": "transaction.receiver.name", "type": "count"}
                ]
            }]
        });
        assert!(validator().validate(&doc).is_ok());
    }

    #[test]
    fn test_rejects_half_having_pair() {
        let doc = json!({
            "filters": [{
                "conditions": [],
                "group_by": ["card_type"],
                "aggregations": [
                    {"field": "transaction.amount", "type": "sum", "having_operator": ">"}
                ]
            }]
        });
        let err = validator().validate(&doc).unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationKind::BadHaving));
    }

    #[test]
    fn test_validation_is_idempotent() {
        let doc = json!({
            "filters": [{
                "conditions": [
                    {"field": "null", "operator": "is", "value": "x"},
                    {"field": "transaction.timestamp", "operator": "between",
                     "value": ["2024-01-01", "2024-12-31"]}
                ],
                "group_by": ["transaction.timestamp", "transaction.timestamp"],
                "interval": "month",
                "aggregations": [
                    {"field": "transaction.amount", "type": "sum"}
                ]
            }]
        });
        let v = validator();
        let once = v.validate(&doc).unwrap();
        let canonical = serde_json::to_value(&once.ir).unwrap();
        let twice = v.validate(&canonical).unwrap();
        assert_eq!(once.ir, twice.ir);
        assert!(twice.warnings.is_empty());
    }

    #[test]
    fn test_exists_allowed_on_boolean_and_requires_bool_value() {
        let ok = json!({
            "filters": [{
                "conditions": [
                    {"field": "transaction.settled", "operator": "exists", "value": true}
                ]
            }]
        });
        assert!(validator().validate(&ok).is_ok());

        let bad = json!({
            "filters": [{
                "conditions": [
                    {"field": "transaction.settled", "operator": "exists", "value": "yes"}
                ]
            }]
        });
        let err = validator().validate(&bad).unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationKind::BadValueShape));
    }
}
