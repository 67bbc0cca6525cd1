//! Backend adapters: schema extractors and executors for the two targets

pub mod document;
pub mod search;

pub use document::{document_collection, DocumentExecutor, DocumentSchemaExtractor};
pub use search::{SearchExecutor, SearchSchemaExtractor};
