/// Unified error type for the query builder pipeline
/// Provides structured error handling with stable kinds across backends
use thiserror::Error;

/// Validation failure kinds, stable across backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ValidationKind {
    UnknownField,
    IllegalOperator,
    BadValueShape,
    BadEnumValue,
    BadHaving,
}

impl std::fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::UnknownField => "UnknownField",
            Self::IllegalOperator => "IllegalOperator",
            Self::BadValueShape => "BadValueShape",
            Self::BadEnumValue => "BadEnumValue",
            Self::BadHaving => "BadHaving",
        };
        write!(f, "{}", name)
    }
}

/// Pipeline stage that exceeded its deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    SchemaExtraction,
    LlmParsing,
    Execution,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::SchemaExtraction => "schema_extraction",
            Self::LlmParsing => "llm_parsing",
            Self::Execution => "execution",
        };
        write!(f, "{}", name)
    }
}

#[derive(Error, Debug, Clone)]
pub enum QueryBuilderError {
    /// Extractor could not produce a usable field map
    #[error("schema error: {message}")]
    Schema { message: String },

    /// IR rejection with the offending JSON pointer
    #[error("validation error ({kind}) at {path}: {message}")]
    Validation {
        kind: ValidationKind,
        path: String,
        message: String,
    },

    /// IR passed validation but cannot be lowered (validator gap)
    #[error("translation error: {message}")]
    Translation { message: String },

    /// The backend refused or failed an executing plan
    #[error("backend error: {message}")]
    Backend { message: String },

    /// Deadline exceeded during a pipeline stage
    #[error("timeout during {stage}")]
    Timeout { stage: Stage },

    /// External model produced non-JSON or structurally invalid output
    #[error("llm error: {message}")]
    Llm { message: String },
}

impl QueryBuilderError {
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    pub fn validation(
        kind: ValidationKind,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Validation {
            kind,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn translation(message: impl Into<String>) -> Self {
        Self::Translation {
            message: message.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    pub fn timeout(stage: Stage) -> Self {
        Self::Timeout { stage }
    }

    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
        }
    }

    /// Validation kind, when this is a validation error
    pub fn validation_kind(&self) -> Option<ValidationKind> {
        match self {
            Self::Validation { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Result type alias for query builder operations
pub type QueryBuilderResult<T> = Result<T, QueryBuilderError>;
