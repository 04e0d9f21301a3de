use thiserror::Error;

use crate::processor::expr::ExprError;

/// Every way a compile call can fail. `line` is the 1-based source line the
/// failure is attributed to.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("structure error at line {line}: {message}")]
    Structure { line: usize, message: String },

    #[error("reference error at line {line}: {message}")]
    Reference { line: usize, message: String },

    #[error("evaluation error at line {line}: {message}")]
    Evaluation { line: usize, message: String },

    /// The graph violated an invariant the builder is supposed to uphold.
    #[error("internal error at line {line}: {message}")]
    Internal { line: usize, message: String },
}

impl CompileError {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    pub fn structure(line: usize, message: impl Into<String>) -> Self {
        Self::Structure {
            line,
            message: message.into(),
        }
    }

    pub fn reference(line: usize, message: impl Into<String>) -> Self {
        Self::Reference {
            line,
            message: message.into(),
        }
    }

    pub fn evaluation(line: usize, message: impl Into<String>) -> Self {
        Self::Evaluation {
            line,
            message: message.into(),
        }
    }

    pub fn internal(line: usize, message: impl Into<String>) -> Self {
        Self::Internal {
            line,
            message: message.into(),
        }
    }

    /// Attach a source line to an expression failure.
    pub fn from_expr(line: usize, err: ExprError) -> Self {
        match err {
            ExprError::Unbound(_) => Self::reference(line, err.to_string()),
            _ => Self::evaluation(line, err.to_string()),
        }
    }

    pub fn line(&self) -> usize {
        match self {
            Self::Parse { line, .. }
            | Self::Structure { line, .. }
            | Self::Reference { line, .. }
            | Self::Evaluation { line, .. }
            | Self::Internal { line, .. } => *line,
        }
    }
}
