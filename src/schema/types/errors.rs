use thiserror::Error;

/// Error type for schema resolution and lookup
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// A definition referenced by name does not exist in the schema
    #[error("Unresolved reference: {0}")]
    UnresolvedReference(String),

    /// Two definitions share the same name
    #[error("Duplicate name: {0}")]
    DuplicateName(String),

    /// More than one remote or auth is flagged as the default
    #[error("Duplicate default {kind}: {name}")]
    DuplicateDefault { kind: String, name: String },

    /// More than one base action declared for the same scope
    #[error("Duplicate base action: {0}")]
    DuplicateBaseAction(String),

    /// A thing's reactive field dependencies form a cycle
    #[error("Reactive dependency cycle in {thing} involving field {field}")]
    ReactiveDependencyCycle { thing: String, field: String },

    /// A definition was requested by name but is not present
    #[error("Definition not found: {0}")]
    NotFound(String),

    /// A definition was requested with the wrong expected kind
    #[error("Type mismatch for {name}: expected {expected}, found {found}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A field declaration is structurally invalid
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// The raw schema input could not be interpreted
    #[error("Invalid schema data: {0}")]
    InvalidData(String),
}

/// Result type alias for operations that can result in a SchemaError
pub type SchemaResult<T> = Result<T, SchemaError>;
