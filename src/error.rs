//! Error types for crudgen.

use thiserror::Error;

/// The main error type for crudgen operations.
///
/// The first five variants form the compiler taxonomy. Every one of them is
/// fatal to the method being compiled; the router wraps them in
/// [`CrudgenError::InMethod`] before aborting the run.
#[derive(Debug, Error)]
pub enum CrudgenError {
    /// Unterminated string or template, dangling operator.
    #[error("Lex error at position {position}: {message}")]
    Lex { position: usize, message: String },

    /// An identifier that resolves to no parameter or builtin.
    #[error("Classification error: {0}")]
    Classification(String),

    /// Incompatible comparison operands.
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// Unbalanced or invalid clause nesting, unknown fragment.
    #[error("Structural error: {0}")]
    Structural(String),

    /// Conflicting or missing companion directive, wrong bound type.
    #[error("Directive error: {0}")]
    Directive(String),

    /// A plan could not be evaluated against the supplied bindings.
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Malformed input schema.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error raised while compiling a specific template.
    #[error("{source} (template: `{template}`)")]
    InTemplate {
        template: String,
        #[source]
        source: Box<CrudgenError>,
    },

    /// Error raised while compiling a specific method.
    #[error("{interface}.{method}: {source}")]
    InMethod {
        interface: String,
        method: String,
        #[source]
        source: Box<CrudgenError>,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CrudgenError {
    /// Create a lex error at the given position.
    pub fn lex(position: usize, message: impl Into<String>) -> Self {
        Self::Lex {
            position,
            message: message.into(),
        }
    }

    /// Create an unknown parameter error.
    pub fn unknown_parameter(name: &str) -> Self {
        Self::Classification(format!("unknown parameter: {}", name))
    }

    pub fn structural(message: impl Into<String>) -> Self {
        Self::Structural(message.into())
    }

    pub fn directive(message: impl Into<String>) -> Self {
        Self::Directive(message.into())
    }

    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation(message.into())
    }

    /// Attach the template text this error was raised for.
    pub fn in_template(self, template: &str) -> Self {
        Self::InTemplate {
            template: template.to_string(),
            source: Box::new(self),
        }
    }

    /// Attach the interface and method this error was raised for.
    pub fn in_method(self, interface: &str, method: &str) -> Self {
        Self::InMethod {
            interface: interface.to_string(),
            method: method.to_string(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with template and method context stripped.
    pub fn root(&self) -> &CrudgenError {
        match self {
            Self::InTemplate { source, .. } | Self::InMethod { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type alias for crudgen operations.
pub type CrudgenResult<T> = Result<T, CrudgenError>;
