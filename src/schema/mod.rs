//! Schema model: normalized field maps and the extractors that build them

pub mod extractor;
pub mod field_map;
pub mod static_mapping;
pub mod types;

pub use extractor::{SchemaCatalog, SchemaExtractor};
pub use field_map::{FieldMap, FieldSpec};
pub use static_mapping::{field_map_from_properties, StaticMappingExtractor};
pub use types::{normalize_search_type, AggregateKind, Interval, NormalizedType};
