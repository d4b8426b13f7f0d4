use crate::compiler::Compiler;
use crate::compiler::code::Code;
use crate::compiler::context::UsageContext;
use crate::compiler::env::CompileEnv;
use crate::compiler::error::{CompileError, EvalError};
use crate::compiler::expr::{Expr, ExprKind, ExprNode, StaticType};
use crate::compiler::names;
use crate::form::Form;
use crate::range::Range;
use crate::value::Value;

/// A raise of a computed value. Control never returns normally, so the
/// node declares no static type; its result unifies with any expected
/// type at the emission site.
#[derive(Debug)]
pub struct ThrowExpr {
    payload: ExprNode,
    range: Range,
}

impl ThrowExpr {
    pub(crate) fn parse(
        compiler: &Compiler,
        ctx: UsageContext,
        form: &Form,
    ) -> Result<ExprNode, CompileError> {
        let items = form
            .as_list()
            .ok_or_else(|| CompileError::internal("throw form must be a list", &form.range))?;

        if ctx.is_eval() {
            // Direct evaluation cannot express a raise. Rewrite the form
            // into an immediately-invoked zero-argument closure and
            // compile that instead.
            let thunk = Form::list(vec![
                Form::symbol("fn*"),
                Form::vector(Vec::new()),
                form.clone(),
            ])
            .with_range(form.range.clone());
            let call = Form::list(vec![thunk]).with_range(form.range.clone());
            let name = format!("throw__{}", names::next_global_id());
            return compiler.analyze_named(ctx, &call, Some(&name));
        }

        if items.len() != 2 {
            return Err(CompileError::syntax(
                "throw expects exactly one value form",
                &form.range,
            ));
        }
        let payload = compiler.analyze(UsageContext::Expression, &items[1])?;
        Ok(Box::new(ThrowExpr {
            payload,
            range: form.range.clone(),
        }))
    }

    pub fn payload(&self) -> &dyn Expr {
        self.payload.as_ref()
    }
}

impl Expr for ThrowExpr {
    fn range(&self) -> &Range {
        &self.range
    }

    fn kind(&self) -> ExprKind {
        ExprKind::Throw
    }

    fn static_type(&self) -> Option<StaticType> {
        None
    }

    // Unreachable in practice: eval-context throws are rewritten into a
    // compiled closure before a ThrowExpr ever exists.
    fn eval(&self) -> Result<Value, EvalError> {
        Err(EvalError::Internal("can't eval a throw form".to_string()))
    }

    fn emit(&self, _ctx: UsageContext, env: &CompileEnv) -> Result<Code, CompileError> {
        let payload = self.payload.emit(UsageContext::Expression, env)?;
        Ok(Code::Raise(Box::new(payload)))
    }
}
