//! Query translation: deterministic compilers from the filter IR to
//! backend-native plans, one plan per slice in declared order

pub mod document;
pub mod search;

use serde_json::Value;

use crate::error::QueryBuilderResult;
use crate::filter::FilterIR;
use crate::schema::FieldMap;

/// A backend-native serialized query
pub type Plan = Value;

/// Compiler from the validated IR to backend plans
///
/// Translation is pure: the same `(IR, FieldMap)` pair always yields the
/// same plans, and slice order is preserved.
pub trait QueryTranslator: Send + Sync {
    fn translate(&self, ir: &FilterIR, field_map: &FieldMap) -> QueryBuilderResult<Vec<Plan>>;
}

pub use document::DocumentTranslator;
pub use search::SearchTranslator;
