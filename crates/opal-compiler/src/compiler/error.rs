use smol_str::SmolStr;
use thiserror::Error;

use crate::intern::Symbol;
use crate::range::Range;
use crate::value::Value;

/// Parse-time and emission-time failures. Every variant carries the
/// source range of the form that failed; none are recovered locally, they
/// abort compilation of the containing literal.
#[derive(Error, Debug, PartialEq)]
pub enum CompileError {
    #[error("Can't have 2 overloads with same arity ({arity})")]
    DuplicateArity { arity: usize, range: Range },
    #[error("Can't have more than 1 variadic overload")]
    MultipleVariadic { range: Range },
    #[error("Can't have fixed arity function with more params than variadic function")]
    VariadicArityConflict {
        fixed_arity: usize,
        variadic_params: usize,
        range: Range,
    },
    #[error("{message}")]
    Syntax { message: String, range: Range },
    #[error("Internal compiler error: {message}")]
    Internal { message: String, range: Range },
}

impl CompileError {
    pub fn range(&self) -> &Range {
        match self {
            CompileError::DuplicateArity { range, .. } => range,
            CompileError::MultipleVariadic { range } => range,
            CompileError::VariadicArityConflict { range, .. } => range,
            CompileError::Syntax { range, .. } => range,
            CompileError::Internal { range, .. } => range,
        }
    }

    pub(crate) fn syntax(message: impl Into<String>, range: &Range) -> Self {
        CompileError::Syntax {
            message: message.into(),
            range: range.clone(),
        }
    }

    pub(crate) fn internal(message: impl Into<String>, range: &Range) -> Self {
        CompileError::Internal {
            message: message.into(),
            range: range.clone(),
        }
    }
}

/// Failures on the direct-evaluation path, including execution of emitted
/// code. `UnsupportedDirectEvaluation` is recoverable by choosing the
/// compiled path instead; everything else is fatal to the evaluation in
/// which it occurs.
#[derive(Error, Debug, PartialEq)]
pub enum EvalError {
    #[error("{0} cannot be directly evaluated")]
    UnsupportedDirectEvaluation(&'static str),
    #[error("Raised: {0}")]
    Raised(Value),
    #[error("Wrong number of args ({got}) passed to: {name}")]
    ArityMismatch { name: SmolStr, got: usize },
    #[error("Unable to resolve var {0} in this context")]
    UnboundVar(Symbol),
    #[error("{0} cannot be called as a function")]
    NotCallable(String),
    #[error("Maximum call depth exceeded ({0})")]
    CallDepthExceeded(u32),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error(transparent)]
    Compile(Box<CompileError>),
}

impl From<CompileError> for EvalError {
    fn from(err: CompileError) -> Self {
        EvalError::Compile(Box::new(err))
    }
}
