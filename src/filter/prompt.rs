//! System-prompt rendering for the external LLM
//!
//! The descriptor enumerates fields, types, legal operators, and enum
//! values; the rendered prompt instructs the model to emit a raw
//! `{"filters": [...]}` document that the validator then canonicalizes.

use serde::Serialize;
use serde_json::{json, Value};

use crate::schema::NormalizedType;
use super::ir::Operator;

/// Per-field entry of the prompt descriptor
#[derive(Debug, Clone, Serialize)]
pub struct FieldPrompt {
    pub path: String,
    #[serde(rename = "type")]
    pub field_type: NormalizedType,
    pub operators: Vec<Operator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_type: Option<NormalizedType>,
}

/// Machine-readable companion of the validator, handed to the prompt layer
#[derive(Debug, Clone, Serialize)]
pub struct PromptDescriptor {
    pub fields: Vec<FieldPrompt>,
}

impl PromptDescriptor {
    /// Schema section of the prompt: field path -> type/operators/values
    fn schema_json(&self) -> Value {
        let mut schema = serde_json::Map::new();
        for field in &self.fields {
            let mut entry = serde_json::Map::new();
            entry.insert("type".to_string(), json!(field.field_type.as_str()));
            entry.insert(
                "operators".to_string(),
                json!(field
                    .operators
                    .iter()
                    .map(|op| op.as_str())
                    .collect::<Vec<_>>()),
            );
            if let Some(values) = &field.values {
                entry.insert("values".to_string(), json!(values));
            }
            if let Some(item_type) = field.item_type {
                entry.insert("item_type".to_string(), json!(item_type.as_str()));
            }
            schema.insert(field.path.clone(), Value::Object(entry));
        }
        Value::Object(schema)
    }

    /// Render the full system prompt
    pub fn system_prompt(&self) -> String {
        let today = chrono::Utc::now().format("%Y-%m-%d");
        let schema = serde_json::to_string_pretty(&self.schema_json())
            .unwrap_or_else(|_| "{}".to_string());

        format!(
            r#"Today is {today}

### 1. Your Goal
You are an expert assistant that converts a user's natural-language question into a structured JSON filter. Your output MUST strictly follow the JSON schema provided below.

### 2. Available Data Schema
This is the data you can query. Fields are specified as `object.field`; each entry lists the operators legal for that field.

{schema}

### 3. How to Build the JSON Filter
Your entire output must be a single JSON object with one key, `filters`. This key holds a list of "slices". Each slice represents a set of data.

#### Supported Operators
| Symbol | Meaning | Allowed on |
|---|---|---|
| `<` | less than | number, date |
| `>` | greater than | number, date |
| `is` | equals | any scalar |
| `different` | not equal | any scalar |
| `isin` | value in list | string, number, enum |
| `notin` | value not in list | string, number, enum |
| `between` | inclusive range `[lo, hi]` | number, date |
| `contains` | partial string match | string |
| `exists` | field is present | any (value `true` or `false`) |

#### Slice Options
Each slice in the `filters` list can have these keys:
- `conditions`: a list of filter conditions, AND-joined.
- `sort`: fields to sort by (e.g. `[{{"field": "transaction.amount", "order": "desc"}}]`).
- `limit`: the maximum number of results to return.
- `group_by`: a list of fields to group by, outermost first.
- `aggregations`: calculations per group (e.g. `[{{"field": "transaction.amount", "type": "sum"}}]`). An aggregation may carry a `having_operator` and `having_value` to filter groups by the computed metric.
- `interval`: date-grouping granularity (`day`, `week`, `month`, `year`).

### 4. Critical Rules & Guardrails
- **ALWAYS use the field names from the schema.** Do not invent fields.
- **`aggregations` and `interval` ONLY work with `group_by`.**
- **`interval` is ONLY for date fields.**
- **Comparisons mean multiple slices.** "Compare A with B" becomes two slices in `filters`, in that order.
- **Be precise with dates.** Convert relative phrases like "last year" into absolute ranges (e.g. `"operator": "between", "value": ["2024-01-01", "2024-12-31"]`).

### 5. Examples

User: "how much did I spend each month this year?"
```json
{{"filters": [{{"conditions": [{{"field": "transaction.timestamp", "operator": "between", "value": ["2025-01-01", "2025-12-31"]}}], "group_by": ["transaction.timestamp"], "interval": "month", "aggregations": [{{"field": "transaction.amount", "type": "sum"}}]}}]}}
```

User: "days with more than one purchase"
```json
{{"filters": [{{"conditions": [], "group_by": ["transaction.timestamp"], "interval": "day", "aggregations": [{{"field": "transaction.id", "type": "count", "having_operator": ">", "having_value": 1}}]}}]}}
```

Output only the JSON object, starting with `{{"filters":`. No extra explanation.
"#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> PromptDescriptor {
        PromptDescriptor {
            fields: vec![FieldPrompt {
                path: "card_type".to_string(),
                field_type: NormalizedType::Enum,
                operators: vec![Operator::Is, Operator::IsIn],
                values: Some(vec![json!("GOLD"), json!("SILVER")]),
                item_type: None,
            }],
        }
    }

    #[test]
    fn test_prompt_embeds_schema_and_values() {
        let prompt = descriptor().system_prompt();
        assert!(prompt.contains("card_type"));
        assert!(prompt.contains("GOLD"));
        assert!(prompt.contains("\"filters\""));
    }

    #[test]
    fn test_schema_json_lists_operators() {
        let schema = descriptor().schema_json();
        assert_eq!(schema["card_type"]["type"], json!("enum"));
        assert_eq!(schema["card_type"]["operators"], json!(["is", "isin"]));
    }
}
