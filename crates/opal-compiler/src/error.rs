use miette::Diagnostic;

use crate::compiler::error::{CompileError, EvalError};
use crate::range::Range;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum InnerError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Represents a high-level error with diagnostic information for the
/// user: the underlying cause plus the source location, when the failing
/// form carried one.
#[derive(Debug, thiserror::Error, PartialEq)]
#[error("{cause}")]
pub struct Error {
    pub cause: InnerError,
    pub location: Option<Range>,
}

impl From<CompileError> for Error {
    fn from(err: CompileError) -> Self {
        let location = Some(err.range().clone());
        Error {
            cause: InnerError::Compile(err),
            location,
        }
    }
}

impl From<EvalError> for Error {
    fn from(err: EvalError) -> Self {
        let location = match &err {
            EvalError::Compile(compile) => Some(compile.range().clone()),
            _ => None,
        };
        Error {
            cause: InnerError::Eval(err),
            location,
        }
    }
}

impl Diagnostic for Error {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let code = match &self.cause {
            InnerError::Compile(err) => match err {
                CompileError::DuplicateArity { .. } => "CompileError::DuplicateArity",
                CompileError::MultipleVariadic { .. } => "CompileError::MultipleVariadic",
                CompileError::VariadicArityConflict { .. } => {
                    "CompileError::VariadicArityConflict"
                }
                CompileError::Syntax { .. } => "CompileError::Syntax",
                CompileError::Internal { .. } => "CompileError::Internal",
            },
            InnerError::Eval(err) => match err {
                EvalError::UnsupportedDirectEvaluation(_) => {
                    "EvalError::UnsupportedDirectEvaluation"
                }
                EvalError::Raised(_) => "EvalError::Raised",
                EvalError::ArityMismatch { .. } => "EvalError::ArityMismatch",
                EvalError::UnboundVar(_) => "EvalError::UnboundVar",
                EvalError::NotCallable(_) => "EvalError::NotCallable",
                EvalError::CallDepthExceeded(_) => "EvalError::CallDepthExceeded",
                EvalError::Internal(_) => "EvalError::Internal",
                EvalError::Compile(_) => "EvalError::Compile",
            },
        };
        Some(Box::new(code))
    }
}
