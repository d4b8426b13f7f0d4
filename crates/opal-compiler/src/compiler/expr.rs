use crate::compiler::Compiler;
use crate::compiler::code::Code;
use crate::compiler::context::UsageContext;
use crate::compiler::env::{self, CompileEnv};
use crate::compiler::error::{CompileError, EvalError};
use crate::compiler::fn_expr::FnExpr;
use crate::form::Form;
use crate::intern::{Keyword, Symbol};
use crate::range::Range;
use crate::value::Value;

/// The statically known result type of an expression node, when one
/// exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticType {
    Nil,
    Bool,
    Number,
    String,
    Keyword,
    List,
    Fn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprKind {
    Constant,
    Keyword,
    Local,
    Var,
    Invoke,
    Throw,
    Fn,
}

/// The capability set every analyzed expression implements: static type
/// query, direct evaluation, and code emission under a usage context.
/// Nodes are immutable once constructed and own their children outright.
pub trait Expr: std::fmt::Debug {
    fn kind(&self) -> ExprKind;

    /// `Some` only when the node's result type is invariant across all
    /// evaluations of the node.
    fn static_type(&self) -> Option<StaticType>;

    /// Evaluates the node directly, without building a code unit.
    fn eval(&self) -> Result<Value, EvalError>;

    /// Emits backend-neutral code for the node, resolving pooled values
    /// against the enclosing closure's environment.
    fn emit(&self, ctx: UsageContext, env: &CompileEnv) -> Result<Code, CompileError>;

    /// The source range of the form this node was analyzed from.
    fn range(&self) -> &Range;

    fn as_fn(&self) -> Option<&FnExpr> {
        None
    }

    fn as_invoke(&self) -> Option<&InvokeExpr> {
        None
    }
}

pub type ExprNode = Box<dyn Expr>;

/// A literal constant. Registered in the enclosing literal's constant
/// pool at analysis time so emission can address it by slot.
#[derive(Debug)]
pub struct ConstantExpr {
    value: Value,
    range: Range,
}

impl ConstantExpr {
    pub fn new(value: Value, range: Range) -> Self {
        env::register_constant(&value);
        ConstantExpr { value, range }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl Expr for ConstantExpr {
    fn range(&self) -> &Range {
        &self.range
    }

    fn kind(&self) -> ExprKind {
        ExprKind::Constant
    }

    fn static_type(&self) -> Option<StaticType> {
        match self.value {
            Value::Nil => Some(StaticType::Nil),
            Value::Bool(_) => Some(StaticType::Bool),
            Value::Number(_) => Some(StaticType::Number),
            Value::String(_) => Some(StaticType::String),
            Value::Keyword(_) => Some(StaticType::Keyword),
            Value::List(_) => Some(StaticType::List),
            Value::Symbol(_) | Value::Fn(_) => None,
        }
    }

    fn eval(&self) -> Result<Value, EvalError> {
        Ok(self.value.clone())
    }

    fn emit(&self, _ctx: UsageContext, env: &CompileEnv) -> Result<Code, CompileError> {
        env.constant_slot(&self.value)
            .map(Code::Const)
            .ok_or_else(|| {
                CompileError::internal(
                    format!("constant {} not pooled in enclosing fn", self.value),
                    &self.range,
                )
            })
    }
}

/// A reference to one interned keyword. Keywords are self-evaluating;
/// emission never inlines the literal but goes through the enclosing
/// closure's keyword pool, so each distinct keyword is materialized once
/// per compiled unit and identity comparisons stay pointer-cheap.
#[derive(Debug)]
pub struct KeywordExpr {
    kw: Keyword,
    range: Range,
}

impl KeywordExpr {
    pub fn new(kw: Keyword, range: Range) -> Self {
        env::register_keyword(kw);
        KeywordExpr { kw, range }
    }

    pub fn keyword(&self) -> Keyword {
        self.kw
    }
}

impl Expr for KeywordExpr {
    fn range(&self) -> &Range {
        &self.range
    }

    fn kind(&self) -> ExprKind {
        ExprKind::Keyword
    }

    fn static_type(&self) -> Option<StaticType> {
        Some(StaticType::Keyword)
    }

    fn eval(&self) -> Result<Value, EvalError> {
        Ok(Value::Keyword(self.kw))
    }

    fn emit(&self, _ctx: UsageContext, env: &CompileEnv) -> Result<Code, CompileError> {
        env.keyword_slot(&self.kw)
            .map(Code::KeywordRef)
            .ok_or_else(|| {
                CompileError::internal(
                    format!("keyword {} not pooled in enclosing fn", self.kw),
                    &self.range,
                )
            })
    }
}

/// A reference to a parameter or self-name binding of an enclosing
/// overload.
#[derive(Debug)]
pub struct LocalExpr {
    sym: Symbol,
    range: Range,
}

impl LocalExpr {
    pub fn new(sym: Symbol, range: Range) -> Self {
        LocalExpr { sym, range }
    }

    pub fn symbol(&self) -> Symbol {
        self.sym
    }
}

impl Expr for LocalExpr {
    fn range(&self) -> &Range {
        &self.range
    }

    fn kind(&self) -> ExprKind {
        ExprKind::Local
    }

    fn static_type(&self) -> Option<StaticType> {
        None
    }

    fn eval(&self) -> Result<Value, EvalError> {
        Err(EvalError::UnsupportedDirectEvaluation("a local binding"))
    }

    fn emit(&self, _ctx: UsageContext, _env: &CompileEnv) -> Result<Code, CompileError> {
        Ok(Code::Local(self.sym))
    }
}

/// A reference to a global var. Resolution and deref live in the host
/// runtime; this core only pools the reference for the enclosing unit.
#[derive(Debug)]
pub struct VarExpr {
    sym: Symbol,
    range: Range,
}

impl VarExpr {
    pub fn new(sym: Symbol, range: Range) -> Self {
        env::register_var(sym);
        VarExpr { sym, range }
    }

    pub fn symbol(&self) -> Symbol {
        self.sym
    }
}

impl Expr for VarExpr {
    fn range(&self) -> &Range {
        &self.range
    }

    fn kind(&self) -> ExprKind {
        ExprKind::Var
    }

    fn static_type(&self) -> Option<StaticType> {
        None
    }

    fn eval(&self) -> Result<Value, EvalError> {
        Err(EvalError::UnsupportedDirectEvaluation("a var reference"))
    }

    fn emit(&self, _ctx: UsageContext, env: &CompileEnv) -> Result<Code, CompileError> {
        env.var_slot(&self.sym).map(Code::VarRef).ok_or_else(|| {
            CompileError::internal(
                format!("var {} not pooled in enclosing fn", self.sym),
                &self.range,
            )
        })
    }
}

/// A call form: the head analyzed as the callee, the remaining items as
/// arguments, all under expression context.
#[derive(Debug)]
pub struct InvokeExpr {
    target: ExprNode,
    args: Vec<ExprNode>,
    range: Range,
}

impl InvokeExpr {
    pub(crate) fn parse(
        compiler: &Compiler,
        _ctx: UsageContext,
        form: &Form,
        name: Option<&str>,
    ) -> Result<ExprNode, CompileError> {
        let items = form
            .as_list()
            .ok_or_else(|| CompileError::internal("invoke form must be a list", &form.range))?;
        let target = compiler.analyze_named(UsageContext::Expression, &items[0], name)?;
        let args = items[1..]
            .iter()
            .map(|arg| compiler.analyze(UsageContext::Expression, arg))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Box::new(InvokeExpr {
            target,
            args,
            range: form.range.clone(),
        }))
    }

    pub fn target(&self) -> &dyn Expr {
        self.target.as_ref()
    }

    pub fn args(&self) -> &[ExprNode] {
        &self.args
    }
}

impl Expr for InvokeExpr {
    fn range(&self) -> &Range {
        &self.range
    }

    fn kind(&self) -> ExprKind {
        ExprKind::Invoke
    }

    fn static_type(&self) -> Option<StaticType> {
        None
    }

    fn eval(&self) -> Result<Value, EvalError> {
        let target = self.target.eval()?;
        let mut args = Vec::with_capacity(self.args.len());
        for arg in &self.args {
            args.push(arg.eval()?);
        }
        match target {
            Value::Fn(func) => func.invoke(&args),
            other => Err(EvalError::NotCallable(other.to_string())),
        }
    }

    fn emit(&self, _ctx: UsageContext, env: &CompileEnv) -> Result<Code, CompileError> {
        let target = self.target.emit(UsageContext::Expression, env)?;
        let args = self
            .args
            .iter()
            .map(|arg| arg.emit(UsageContext::Expression, env))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Code::Invoke {
            target: Box::new(target),
            args,
        })
    }

    fn as_invoke(&self) -> Option<&InvokeExpr> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_eval_returns_keyword_unchanged() {
        let kw = Keyword::new("status");
        let expr = KeywordExpr::new(kw, Range::default());
        assert_eq!(expr.eval().unwrap(), Value::Keyword(kw));
        assert_eq!(expr.static_type(), Some(StaticType::Keyword));
        assert_eq!(expr.kind(), ExprKind::Keyword);
    }

    #[test]
    fn test_keyword_emit_uses_pooled_slot() {
        let kw = Keyword::new("pooled");
        let mut env = CompileEnv::default();
        let slot = env.intern_keyword(kw);
        let expr = KeywordExpr::new(kw, Range::default());
        match expr.emit(UsageContext::Expression, &env).unwrap() {
            Code::KeywordRef(emitted) => assert_eq!(emitted, slot),
            other => panic!("expected a keyword slot reference, got {:?}", other),
        }
    }

    #[test]
    fn test_keyword_emit_without_pool_entry_fails() {
        let expr = KeywordExpr::new(Keyword::new("stray"), Range::default());
        let err = expr
            .emit(UsageContext::Expression, &CompileEnv::default())
            .unwrap_err();
        assert!(matches!(err, CompileError::Internal { .. }));
    }

    #[test]
    fn test_constant_static_types() {
        let range = Range::default;
        assert_eq!(
            ConstantExpr::new(Value::Number(1.0), range()).static_type(),
            Some(StaticType::Number)
        );
        assert_eq!(
            ConstantExpr::new(Value::Nil, range()).static_type(),
            Some(StaticType::Nil)
        );
        assert_eq!(
            ConstantExpr::new(Value::from("s"), range()).static_type(),
            Some(StaticType::String)
        );
    }

    #[test]
    fn test_constant_emit_resolves_slot() {
        let mut env = CompileEnv::default();
        let slot = env.intern_constant(Value::Number(42.0));
        let expr = ConstantExpr::new(Value::Number(42.0), Range::default());
        match expr.emit(UsageContext::Return, &env).unwrap() {
            Code::Const(emitted) => assert_eq!(emitted, slot),
            other => panic!("expected a constant slot reference, got {:?}", other),
        }
    }

    #[test]
    fn test_local_and_var_refuse_direct_evaluation() {
        let local = LocalExpr::new(Symbol::new("x"), Range::default());
        assert_eq!(
            local.eval().unwrap_err(),
            EvalError::UnsupportedDirectEvaluation("a local binding")
        );
        let var = VarExpr::new(Symbol::new("inc"), Range::default());
        assert_eq!(
            var.eval().unwrap_err(),
            EvalError::UnsupportedDirectEvaluation("a var reference")
        );
    }
}
