use std::sync::Arc;

use smallvec::SmallVec;
use smol_str::SmolStr;

use crate::error::Error;
use crate::form::{Form, FormKind};
use crate::intern::Symbol;
use crate::value::Value;

pub mod code;
pub mod context;
pub mod env;
pub mod error;
pub mod expr;
pub mod fn_expr;
pub mod names;
pub mod templates;
pub mod throw;

use context::UsageContext;
use error::CompileError;
use expr::{ConstantExpr, ExprNode, InvokeExpr, KeywordExpr, LocalExpr, VarExpr};
use fn_expr::FnExpr;
use throw::ThrowExpr;

/// Positional parameters of one overload; the rest parameter sits last
/// when the overload is variadic.
pub type Params = SmallVec<[Symbol; 4]>;

enum SpecialForm {
    Fn,
    Throw,
}

/// The analysis dispatcher: classifies a form and routes it to the
/// matching node parser. Restricted to the node kinds this core defines;
/// body expressions recurse through it.
#[derive(Debug, Clone)]
pub struct Compiler {
    namespace: SmolStr,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new("user")
    }
}

impl Compiler {
    pub fn new(namespace: impl Into<SmolStr>) -> Self {
        Compiler {
            namespace: namespace.into(),
        }
    }

    /// The current namespace name, used as the name prefix for literals
    /// parsed outside any enclosing closure.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn analyze(&self, ctx: UsageContext, form: &Form) -> Result<ExprNode, CompileError> {
        self.analyze_named(ctx, form, None)
    }

    pub(crate) fn analyze_named(
        &self,
        ctx: UsageContext,
        form: &Form,
        name: Option<&str>,
    ) -> Result<ExprNode, CompileError> {
        match &form.kind {
            FormKind::Keyword(kw) => Ok(Box::new(KeywordExpr::new(*kw, form.range.clone()))),
            FormKind::Nil => Ok(self.constant(Value::Nil, form)),
            FormKind::Bool(b) => Ok(self.constant(Value::Bool(*b), form)),
            FormKind::Number(n) => Ok(self.constant(Value::Number(*n), form)),
            FormKind::Str(s) => Ok(self.constant(Value::String(s.clone()), form)),
            FormKind::Symbol(sym) => {
                if env::is_local(*sym) {
                    Ok(Box::new(LocalExpr::new(*sym, form.range.clone())))
                } else {
                    Ok(Box::new(VarExpr::new(*sym, form.range.clone())))
                }
            }
            FormKind::List(items) if items.is_empty() => {
                Ok(self.constant(Value::List(Arc::new(Vec::new())), form))
            }
            FormKind::List(items) => {
                let special = items[0].as_symbol().and_then(|sym| {
                    sym.resolve_with(|s| match s {
                        "fn" | "fn*" => Some(SpecialForm::Fn),
                        "throw" => Some(SpecialForm::Throw),
                        _ => None,
                    })
                });
                match special {
                    Some(SpecialForm::Fn) => FnExpr::parse(self, ctx, form, name)
                        .map(|fn_expr| Box::new(fn_expr) as ExprNode),
                    Some(SpecialForm::Throw) => ThrowExpr::parse(self, ctx, form),
                    None => InvokeExpr::parse(self, ctx, form, name),
                }
            }
            FormKind::Vector(_) => Err(CompileError::syntax(
                "vector forms are not supported in this position",
                &form.range,
            )),
        }
    }

    /// Analyzes a top-level form under eval context and evaluates it
    /// directly, without materializing a durable code unit.
    pub fn eval(&self, form: &Form) -> Result<Value, Error> {
        let node = self.analyze(UsageContext::Eval, form)?;
        Ok(node.eval()?)
    }

    fn constant(&self, value: Value, form: &Form) -> ExprNode {
        Box::new(ConstantExpr::new(value, form.range.clone()))
    }
}
