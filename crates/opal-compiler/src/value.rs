use std::sync::Arc;

use crate::compiler::code::{CompiledFn, ImmediateFn};
use crate::compiler::error::EvalError;
use crate::intern::{Keyword, Symbol};

/// A runtime value, as produced by direct evaluation or by executing
/// emitted code.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    Keyword(Keyword),
    Symbol(Symbol),
    List(Arc<Vec<Value>>),
    Fn(FnValue),
}

/// A callable closure value, backed either by a durable compiled unit or
/// by the immediate-mode holder used for top-level direct evaluation.
#[derive(Debug, Clone)]
pub enum FnValue {
    Immediate(Arc<ImmediateFn>),
    Compiled(Arc<CompiledFn>),
}

impl FnValue {
    pub fn name(&self) -> &str {
        match self {
            FnValue::Immediate(f) => f.name(),
            FnValue::Compiled(f) => f.name(),
        }
    }

    /// Selects the overload matching the argument count and executes it.
    pub fn invoke(&self, args: &[Value]) -> Result<Value, EvalError> {
        crate::compiler::code::invoke(self, args)
    }

    fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FnValue::Immediate(a), FnValue::Immediate(b)) => Arc::ptr_eq(a, b),
            (FnValue::Compiled(a), FnValue::Compiled(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// Closure values compare by identity, everything else structurally.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Keyword(a), Value::Keyword(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Fn(a), Value::Fn(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Keyword> for Value {
    fn from(kw: Keyword) -> Self {
        Value::Keyword(kw)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use itertools::Itertools;

        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Keyword(kw) => write!(f, "{}", kw),
            Value::Symbol(sym) => write!(f, "{}", sym),
            Value::List(items) => write!(f, "({})", items.iter().join(" ")),
            Value::Fn(func) => write!(f, "#<fn {}>", func.name()),
        }
    }
}
