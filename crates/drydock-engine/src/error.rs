//! Engine error types

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::suggestions::{extract_call_from_display, suggest_unknown_function};

pub type Result<T> = std::result::Result<T, EngineError>;

/// Main engine error type
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Document is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// Error kind for categorizing template errors
///
/// Note: This enum is non-exhaustive - new variants may be added in future versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TemplateErrorKind {
    UndefinedVariable,
    UnknownFunction,
    SyntaxError,
    TypeError,
    InvalidOperation,
    Other,
}

impl TemplateErrorKind {
    /// Convert to a code string for diagnostics
    pub fn to_code_string(&self) -> &'static str {
        match self {
            Self::UndefinedVariable => "undefined_variable",
            Self::UnknownFunction => "unknown_function",
            Self::SyntaxError => "syntax",
            Self::TypeError => "type",
            Self::InvalidOperation => "invalid_operation",
            Self::Other => "render",
        }
    }
}

/// Template error with source information
#[derive(Error, Debug, Diagnostic, Clone)]
#[error("{message}")]
#[diagnostic(code(drydock::template::render))]
pub struct TemplateError {
    pub message: String,

    pub kind: TemplateErrorKind,

    /// Document source
    #[source_code]
    pub src: NamedSource<String>,

    /// Error location in source
    #[label("error occurred here")]
    pub span: Option<SourceSpan>,

    #[help]
    pub suggestion: Option<String>,
}

impl TemplateError {
    /// Create a template error from a MiniJinja error
    pub fn from_minijinja(err: minijinja::Error, name: &str, source: &str) -> Self {
        let kind = categorize(&err);
        let span = err.line().and_then(|line| calculate_span(source, line));

        let suggestion = match kind {
            TemplateErrorKind::UnknownFunction => {
                extract_call_from_display(&format!("{:#}", err))
                    .and_then(|name| suggest_unknown_function(&name))
            }
            TemplateErrorKind::UndefinedVariable => Some(
                "Only `namespace`, `registry` and `config` are defined; installer settings are read with KurlString/KurlInt/KurlBool"
                    .to_string(),
            ),
            _ => None,
        };

        let message = err
            .to_string()
            .replace("invalid operation: ", "")
            .replace("syntax error: ", "")
            .replace("undefined value", "undefined variable");

        Self {
            message,
            kind,
            src: NamedSource::new(name, source.to_string()),
            span,
            suggestion,
        }
    }

    /// Create a simple error without source mapping
    pub fn simple(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: TemplateErrorKind::Other,
            src: NamedSource::new("<unknown>", String::new()),
            span: None,
            suggestion: None,
        }
    }

    pub fn kind(&self) -> TemplateErrorKind {
        self.kind
    }
}

fn categorize(err: &minijinja::Error) -> TemplateErrorKind {
    match err.kind() {
        minijinja::ErrorKind::UndefinedError => TemplateErrorKind::UndefinedVariable,
        minijinja::ErrorKind::UnknownFunction => TemplateErrorKind::UnknownFunction,
        minijinja::ErrorKind::SyntaxError => TemplateErrorKind::SyntaxError,
        minijinja::ErrorKind::InvalidOperation => TemplateErrorKind::InvalidOperation,
        minijinja::ErrorKind::NonPrimitive | minijinja::ErrorKind::NonKey => {
            TemplateErrorKind::TypeError
        }
        _ => TemplateErrorKind::Other,
    }
}

/// Span covering the whole of a 1-indexed line
fn calculate_span(source: &str, line_num: usize) -> Option<SourceSpan> {
    let mut offset = 0;

    for (index, line) in source.lines().enumerate() {
        if index + 1 == line_num {
            return Some(SourceSpan::new(offset.into(), line.len().into()));
        }
        offset += line.len() + 1;
    }

    None
}
