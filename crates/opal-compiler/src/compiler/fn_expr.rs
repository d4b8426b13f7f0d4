use std::collections::BTreeMap;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use smol_str::SmolStr;

use crate::compiler::Compiler;
use crate::compiler::Params;
use crate::compiler::code::{self, BaseKind, Code, CompiledFn, ImmediateFn, OverloadUnit};
use crate::compiler::context::UsageContext;
use crate::compiler::env::{self, CompileEnv, EnvScope, ParamScope};
use crate::compiler::error::{CompileError, EvalError};
use crate::compiler::expr::{Expr, ExprKind, ExprNode, StaticType};
use crate::compiler::names;
use crate::compiler::templates;
use crate::form::{Form, FormKind};
use crate::intern::Symbol;
use crate::range::Range;
use crate::value::{FnValue, Value};

/// One arity-specific clause of a closure literal: the positional
/// parameters it binds (plus the rest parameter when variadic) and its
/// analyzed body.
#[derive(Debug)]
pub struct Overload {
    required_arity: usize,
    is_variadic: bool,
    params: Params,
    body: Vec<ExprNode>,
    range: Range,
}

impl Overload {
    fn parse(
        compiler: &Compiler,
        clause: &[Form],
        clause_range: &Range,
        self_name: Option<Symbol>,
    ) -> Result<Overload, CompileError> {
        let params_form = clause
            .first()
            .ok_or_else(|| CompileError::syntax("fn clause is missing a params vector", clause_range))?;
        let param_forms = params_form
            .as_vector()
            .ok_or_else(|| CompileError::syntax("fn params must be a vector", &params_form.range))?;

        let rest_marker = Symbol::new("&");
        let mut params: Params = SmallVec::new();
        let mut bound: FxHashSet<Symbol> = FxHashSet::default();
        let mut is_variadic = false;
        let mut required_arity = 0usize;

        let mut forms = param_forms.iter();
        while let Some(param) = forms.next() {
            let sym = param
                .as_symbol()
                .ok_or_else(|| CompileError::syntax("fn params must be symbols", &param.range))?;
            if sym == rest_marker {
                let rest = forms.next().ok_or_else(|| {
                    CompileError::syntax("missing rest param after &", &param.range)
                })?;
                let rest_sym = rest.as_symbol().ok_or_else(|| {
                    CompileError::syntax("rest param must be a symbol", &rest.range)
                })?;
                if forms.next().is_some() {
                    return Err(CompileError::syntax(
                        "only one rest param is allowed",
                        &rest.range,
                    ));
                }
                if !bound.insert(rest_sym) {
                    return Err(CompileError::syntax(
                        format!("duplicate parameter {}", rest_sym),
                        &rest.range,
                    ));
                }
                params.push(rest_sym);
                is_variadic = true;
                break;
            }
            if !bound.insert(sym) {
                return Err(CompileError::syntax(
                    format!("duplicate parameter {}", sym),
                    &param.range,
                ));
            }
            params.push(sym);
            required_arity += 1;
        }

        if let Some(self_sym) = self_name {
            bound.insert(self_sym);
        }
        let _scope = ParamScope::enter(bound);

        let body_forms = &clause[1..];
        let mut body = Vec::with_capacity(body_forms.len());
        for (i, form) in body_forms.iter().enumerate() {
            let ctx = if i + 1 == body_forms.len() {
                UsageContext::Return
            } else {
                UsageContext::Statement
            };
            body.push(compiler.analyze(ctx, form)?);
        }

        Ok(Overload {
            required_arity,
            is_variadic,
            params,
            body,
            range: clause_range.clone(),
        })
    }

    fn emit_unit(&self, env: &CompileEnv) -> Result<OverloadUnit, CompileError> {
        let mut body = Vec::with_capacity(self.body.len());
        for (i, node) in self.body.iter().enumerate() {
            let last = i + 1 == self.body.len();
            let ctx = if last {
                UsageContext::Return
            } else {
                UsageContext::Statement
            };
            let emitted = node.emit(ctx, env)?;
            body.push(if last {
                emitted
            } else {
                Code::Discard(Box::new(emitted))
            });
        }
        Ok(OverloadUnit {
            required_arity: self.required_arity,
            is_variadic: self.is_variadic,
            params: self.params.clone(),
            body,
        })
    }

    /// The number of positional parameters bound before any rest
    /// collection.
    pub fn required_arity(&self) -> usize {
        self.required_arity
    }

    pub fn is_variadic(&self) -> bool {
        self.is_variadic
    }

    /// The declared parameter count, counting the rest slot of a variadic
    /// clause.
    pub fn num_params(&self) -> usize {
        self.params.len()
    }

    pub fn params(&self) -> &[Symbol] {
        &self.params
    }

    pub fn body(&self) -> &[ExprNode] {
        &self.body
    }

    pub fn range(&self) -> &Range {
        &self.range
    }
}

/// A multi-clause function literal compiled into a single callable
/// entity: at most one clause per fixed arity plus at most one variadic
/// clause, a globally unique generated name, and a private pool
/// environment captured while the clauses were parsed.
#[derive(Debug)]
pub struct FnExpr {
    generated_name: SmolStr,
    self_name: Option<Symbol>,
    once_only: bool,
    explicit_base_kind: Option<SmolStr>,
    overloads: BTreeMap<usize, Overload>,
    variadic: Option<Overload>,
    env: Arc<CompileEnv>,
    range: Range,
}

impl FnExpr {
    pub fn parse(
        compiler: &Compiler,
        _ctx: UsageContext,
        form: &Form,
        assigned_name: Option<&str>,
    ) -> Result<FnExpr, CompileError> {
        let items = form
            .as_list()
            .ok_or_else(|| CompileError::internal("fn form must be a list", &form.range))?;
        let head = items
            .first()
            .ok_or_else(|| CompileError::syntax("empty fn form", &form.range))?;

        let once_only = head.meta_flag("once");
        let explicit_base_kind = head.meta_name("base-kind");

        // An optional leading symbol names the fn for self-recursive
        // calls and doubles as its simple name.
        let self_name = items.get(1).and_then(|item| item.as_symbol());
        let user_name = self_name.map(|sym| sym.as_str());
        let simple_name = user_name.as_deref().or(assigned_name);

        // The prefix reads the enclosing literal's frame, so it must be
        // computed before this literal opens its own.
        let generated_name = names::generate_fn_name(
            env::enclosing_fn_name().as_deref(),
            compiler.namespace(),
            simple_name,
        );

        let clause_start = if self_name.is_some() { 2 } else { 1 };

        // An early return through `?` drops the scope and restores the
        // enclosing frame, success or failure alike.
        let scope = EnvScope::enter(generated_name.clone());
        let (overloads, variadic) =
            Self::parse_clauses(compiler, &items[clause_start..], self_name, &form.range)?;
        let env = Arc::new(scope.finish());

        tracing::debug!(
            "parsed fn literal {} with {} overloads",
            generated_name,
            overloads.len() + usize::from(variadic.is_some())
        );

        Ok(FnExpr {
            generated_name,
            self_name,
            once_only,
            explicit_base_kind,
            overloads,
            variadic,
            env,
            range: form.range.clone(),
        })
    }

    fn parse_clauses(
        compiler: &Compiler,
        rest: &[Form],
        self_name: Option<Symbol>,
        form_range: &Range,
    ) -> Result<(BTreeMap<usize, Overload>, Option<Overload>), CompileError> {
        // Single-clause shorthand: (fn* [x] body...) is treated as the
        // canonical (fn* ([x] body...)).
        let clauses: Vec<(&[Form], Range)> =
            if matches!(rest.first().map(|f| &f.kind), Some(FormKind::Vector(_))) {
                vec![(rest, form_range.clone())]
            } else {
                rest.iter()
                    .map(|clause_form| {
                        clause_form
                            .as_list()
                            .map(|clause| (clause, clause_form.range.clone()))
                            .ok_or_else(|| {
                                CompileError::syntax(
                                    "fn clause must be a list of params and body",
                                    &clause_form.range,
                                )
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()?
            };

        let mut overloads: BTreeMap<usize, Overload> = BTreeMap::new();
        let mut variadic: Option<Overload> = None;

        for (clause, clause_range) in clauses {
            let overload = Overload::parse(compiler, clause, &clause_range, self_name)?;
            if overload.is_variadic {
                if variadic.is_some() {
                    return Err(CompileError::MultipleVariadic {
                        range: clause_range,
                    });
                }
                variadic = Some(overload);
            } else if overloads.contains_key(&overload.required_arity) {
                return Err(CompileError::DuplicateArity {
                    arity: overload.required_arity,
                    range: clause_range,
                });
            } else {
                overloads.insert(overload.required_arity, overload);
            }
        }

        // A fixed clause needing at least as many arguments as the
        // variadic clause declares could never be selected.
        if let Some(variadic_overload) = &variadic {
            if let Some((&max_fixed, _)) = overloads.last_key_value() {
                if max_fixed >= variadic_overload.num_params() {
                    return Err(CompileError::VariadicArityConflict {
                        fixed_arity: max_fixed,
                        variadic_params: variadic_overload.num_params(),
                        range: form_range.clone(),
                    });
                }
            }
        }

        Ok((overloads, variadic))
    }

    fn all_overloads(&self) -> impl Iterator<Item = &Overload> {
        self.overloads.values().chain(self.variadic.iter())
    }

    fn emit_immediate(&self) -> Result<Code, CompileError> {
        let mut slots: FxHashMap<SmolStr, OverloadUnit> = FxHashMap::default();
        for overload in self.all_overloads() {
            let unit = overload.emit_unit(&self.env)?;
            slots.insert(code::immediate_slot_name(&unit), unit);
        }
        Ok(Code::ImmediateFn(Arc::new(ImmediateFn::new(
            self.generated_name.clone(),
            slots,
            self.self_name,
            Arc::clone(&self.env),
        ))))
    }

    fn emit_compiled(&self) -> Result<Code, CompileError> {
        let base = match (&self.explicit_base_kind, &self.variadic) {
            (Some(kind), _) => BaseKind::Explicit(kind.clone()),
            (None, Some(variadic_overload)) => BaseKind::RestDispatch(
                templates::rest_fn_templates().get_or_create(variadic_overload.required_arity),
            ),
            (None, None) => BaseKind::Plain,
        };

        let mut units = Vec::new();
        for overload in self.all_overloads() {
            units.push(overload.emit_unit(&self.env)?);
        }

        Ok(Code::MakeFn(Arc::new(CompiledFn::new(
            self.generated_name.clone(),
            base,
            units,
            self.variadic.as_ref().map(|v| v.required_arity),
            self.self_name,
            Arc::clone(&self.env),
        ))))
    }

    pub fn generated_name(&self) -> &str {
        &self.generated_name
    }

    pub fn self_name(&self) -> Option<Symbol> {
        self.self_name
    }

    pub fn once_only(&self) -> bool {
        self.once_only
    }

    pub fn explicit_base_kind(&self) -> Option<&str> {
        self.explicit_base_kind.as_deref()
    }

    pub fn overloads(&self) -> &BTreeMap<usize, Overload> {
        &self.overloads
    }

    pub fn variadic(&self) -> Option<&Overload> {
        self.variadic.as_ref()
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic.is_some()
    }

    pub fn env(&self) -> &CompileEnv {
        &self.env
    }
}

impl Expr for FnExpr {
    fn range(&self) -> &Range {
        &self.range
    }

    fn kind(&self) -> ExprKind {
        ExprKind::Fn
    }

    fn static_type(&self) -> Option<StaticType> {
        Some(StaticType::Fn)
    }

    fn eval(&self) -> Result<Value, EvalError> {
        match self.emit(UsageContext::Eval, &self.env)? {
            Code::ImmediateFn(holder) => Ok(Value::Fn(FnValue::Immediate(holder))),
            _ => Err(EvalError::Internal(
                "immediate emission produced a non-callable".to_string(),
            )),
        }
    }

    fn emit(&self, ctx: UsageContext, _env: &CompileEnv) -> Result<Code, CompileError> {
        if ctx.is_eval() {
            self.emit_immediate()
        } else {
            self.emit_compiled()
        }
    }

    fn as_fn(&self) -> Option<&FnExpr> {
        Some(self)
    }
}
