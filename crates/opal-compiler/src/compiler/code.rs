use std::sync::Arc;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::compiler::Params;
use crate::compiler::env::{CompileEnv, SlotRef};
use crate::compiler::error::EvalError;
use crate::compiler::templates::RestFnTemplate;
use crate::intern::Symbol;
use crate::value::{FnValue, Value};

const MAX_CALL_DEPTH: u32 = 512;

/// Backend-neutral emitted code. A real target lowers this tree onto its
/// instruction/method builder; the executor in this module runs it
/// directly so compiled closures can be exercised without a backend.
#[derive(Debug, Clone)]
pub enum Code {
    Nil,
    /// Load a pooled constant from the enclosing unit.
    Const(SlotRef),
    /// Load a pooled keyword from the enclosing unit.
    KeywordRef(SlotRef),
    /// Load a pooled var reference from the enclosing unit.
    VarRef(SlotRef),
    /// Read a parameter or self-reference binding.
    Local(Symbol),
    /// Evaluate for effect only; the value is dropped.
    Discard(Box<Code>),
    /// Evaluate to a value, convert it to the platform's raisable-error
    /// representation, and raise. Never returns normally.
    Raise(Box<Code>),
    Invoke { target: Box<Code>, args: Vec<Code> },
    MakeFn(Arc<CompiledFn>),
    ImmediateFn(Arc<ImmediateFn>),
}

/// The base execution shape a compiled closure derives from.
#[derive(Debug, Clone)]
pub enum BaseKind {
    /// Plain fixed-arity callable.
    Plain,
    /// Variable-arity dispatch, derived from the shared per-arity template.
    RestDispatch(Arc<RestFnTemplate>),
    /// Metadata-supplied override; taken verbatim.
    Explicit(SmolStr),
}

/// One emitted callable unit, one per overload of the closure literal.
#[derive(Debug, Clone)]
pub struct OverloadUnit {
    pub required_arity: usize,
    pub is_variadic: bool,
    pub params: Params,
    pub body: Vec<Code>,
}

pub(crate) fn immediate_slot_name(unit: &OverloadUnit) -> SmolStr {
    if unit.is_variadic {
        SmolStr::new(format!("variadic-{}", unit.required_arity))
    } else {
        SmolStr::new(format!("fixed-{}", unit.params.len()))
    }
}

/// A durable code unit for one closure literal: its base kind, one
/// callable per overload, and (for variadic closures) the constant
/// required-arity accessor the rest-dispatch machinery reads.
#[derive(Debug)]
pub struct CompiledFn {
    name: SmolStr,
    base: BaseKind,
    units: Vec<OverloadUnit>,
    variadic_arity: Option<usize>,
    self_name: Option<Symbol>,
    env: Arc<CompileEnv>,
}

impl CompiledFn {
    pub(crate) fn new(
        name: SmolStr,
        base: BaseKind,
        units: Vec<OverloadUnit>,
        variadic_arity: Option<usize>,
        self_name: Option<Symbol>,
        env: Arc<CompileEnv>,
    ) -> Self {
        CompiledFn {
            name,
            base,
            units,
            variadic_arity,
            self_name,
            env,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> &BaseKind {
        &self.base
    }

    pub fn units(&self) -> &[OverloadUnit] {
        &self.units
    }

    /// The zero-argument accessor emitted for variadic closures: how many
    /// leading arguments are bound positionally before the remainder is
    /// collected into the rest argument.
    pub fn required_arity(&self) -> Option<usize> {
        self.variadic_arity
    }

    pub fn env(&self) -> &CompileEnv {
        &self.env
    }
}

/// The ad hoc holder produced by immediate-mode emission: per-overload
/// callables in named slots, `fixed-<N>` or `variadic-<N>`.
#[derive(Debug)]
pub struct ImmediateFn {
    name: SmolStr,
    slots: FxHashMap<SmolStr, OverloadUnit>,
    self_name: Option<Symbol>,
    env: Arc<CompileEnv>,
}

impl ImmediateFn {
    pub(crate) fn new(
        name: SmolStr,
        slots: FxHashMap<SmolStr, OverloadUnit>,
        self_name: Option<Symbol>,
        env: Arc<CompileEnv>,
    ) -> Self {
        ImmediateFn {
            name,
            slots,
            self_name,
            env,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slots(&self) -> &FxHashMap<SmolStr, OverloadUnit> {
        &self.slots
    }

    pub fn env(&self) -> &CompileEnv {
        &self.env
    }
}

pub(crate) fn invoke(callee: &FnValue, args: &[Value]) -> Result<Value, EvalError> {
    Machine { depth: 0 }.call(callee, args)
}

struct Machine {
    depth: u32,
}

impl Machine {
    fn call(&mut self, callee: &FnValue, args: &[Value]) -> Result<Value, EvalError> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(EvalError::CallDepthExceeded(MAX_CALL_DEPTH));
        }
        self.depth += 1;
        let result = match callee {
            FnValue::Immediate(f) => {
                self.call_unit(callee, f.slots.values(), f.self_name, &f.env, f.name(), args)
            }
            FnValue::Compiled(f) => {
                self.call_unit(callee, f.units.iter(), f.self_name, &f.env, f.name(), args)
            }
        };
        self.depth -= 1;
        result
    }

    fn call_unit<'a>(
        &mut self,
        callee: &FnValue,
        units: impl Iterator<Item = &'a OverloadUnit>,
        self_name: Option<Symbol>,
        env: &CompileEnv,
        name: &str,
        args: &[Value],
    ) -> Result<Value, EvalError> {
        let unit = select_overload(units, args.len()).ok_or_else(|| EvalError::ArityMismatch {
            name: SmolStr::new(name),
            got: args.len(),
        })?;

        let mut locals: FxHashMap<Symbol, Value> = FxHashMap::default();
        if let Some(self_sym) = self_name {
            locals.insert(self_sym, Value::Fn(callee.clone()));
        }
        bind_params(unit, args, &mut locals);

        let mut result = Value::Nil;
        for code in &unit.body {
            result = self.run(code, env, &locals)?;
        }
        Ok(result)
    }

    fn run(
        &mut self,
        code: &Code,
        env: &CompileEnv,
        locals: &FxHashMap<Symbol, Value>,
    ) -> Result<Value, EvalError> {
        match code {
            Code::Nil => Ok(Value::Nil),
            Code::Const(slot) => env
                .constant(*slot)
                .cloned()
                .ok_or_else(|| EvalError::Internal(format!("missing constant {}", slot))),
            Code::KeywordRef(slot) => env
                .keyword(*slot)
                .map(|kw| Value::Keyword(*kw))
                .ok_or_else(|| EvalError::Internal(format!("missing keyword {}", slot))),
            Code::VarRef(slot) => {
                let sym = env
                    .var(*slot)
                    .ok_or_else(|| EvalError::Internal(format!("missing var {}", slot)))?;
                // Var tables live in the host runtime; the direct executor
                // has nothing to dereference them against.
                Err(EvalError::UnboundVar(*sym))
            }
            Code::Local(sym) => locals
                .get(sym)
                .cloned()
                .ok_or_else(|| EvalError::Internal(format!("unresolved local {}", sym))),
            Code::Discard(inner) => {
                self.run(inner, env, locals)?;
                Ok(Value::Nil)
            }
            Code::Raise(inner) => {
                let value = self.run(inner, env, locals)?;
                Err(EvalError::Raised(value))
            }
            Code::Invoke { target, args } => {
                let target = self.run(target, env, locals)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.run(arg, env, locals)?);
                }
                match target {
                    Value::Fn(func) => self.call(&func, &values),
                    other => Err(EvalError::NotCallable(other.to_string())),
                }
            }
            Code::MakeFn(unit) => Ok(Value::Fn(FnValue::Compiled(Arc::clone(unit)))),
            Code::ImmediateFn(unit) => Ok(Value::Fn(FnValue::Immediate(Arc::clone(unit)))),
        }
    }
}

fn select_overload<'a>(
    units: impl Iterator<Item = &'a OverloadUnit>,
    argc: usize,
) -> Option<&'a OverloadUnit> {
    let mut variadic = None;
    for unit in units {
        if unit.is_variadic {
            variadic = Some(unit);
        } else if unit.required_arity == argc {
            return Some(unit);
        }
    }
    variadic.filter(|unit| argc >= unit.required_arity)
}

fn bind_params(unit: &OverloadUnit, args: &[Value], locals: &mut FxHashMap<Symbol, Value>) {
    for (param, arg) in unit.params.iter().zip(args.iter()).take(unit.required_arity) {
        locals.insert(*param, arg.clone());
    }
    if unit.is_variadic {
        if let Some(rest_param) = unit.params.last() {
            let rest = &args[unit.required_arity.min(args.len())..];
            let rest_value = if rest.is_empty() {
                Value::Nil
            } else {
                Value::List(Arc::new(rest.to_vec()))
            };
            locals.insert(*rest_param, rest_value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_unit(arity: usize, body: Vec<Code>) -> OverloadUnit {
        let params = (0..arity)
            .map(|i| Symbol::new(&format!("p{}", i)))
            .collect();
        OverloadUnit {
            required_arity: arity,
            is_variadic: false,
            params,
            body,
        }
    }

    fn variadic_unit(required: usize, body: Vec<Code>) -> OverloadUnit {
        let mut params: Params = (0..required)
            .map(|i| Symbol::new(&format!("p{}", i)))
            .collect();
        params.push(Symbol::new("rest"));
        OverloadUnit {
            required_arity: required,
            is_variadic: true,
            params,
            body,
        }
    }

    #[test]
    fn test_select_overload_prefers_exact_fixed_match() {
        let units = vec![fixed_unit(1, vec![]), variadic_unit(1, vec![])];
        let selected = select_overload(units.iter(), 1).unwrap();
        assert!(!selected.is_variadic);
    }

    #[test]
    fn test_select_overload_falls_back_to_variadic() {
        let units = vec![fixed_unit(1, vec![]), variadic_unit(2, vec![])];
        let selected = select_overload(units.iter(), 5).unwrap();
        assert!(selected.is_variadic);
        assert!(select_overload(units.iter(), 0).is_none());
    }

    #[test]
    fn test_invoke_binds_rest_argument() {
        let unit = variadic_unit(1, vec![Code::Local(Symbol::new("rest"))]);
        let func = FnValue::Compiled(Arc::new(CompiledFn::new(
            SmolStr::new("user$f__1"),
            BaseKind::Plain,
            vec![unit],
            Some(1),
            None,
            Arc::new(CompileEnv::default()),
        )));

        let out = func
            .invoke(&[Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)])
            .unwrap();
        assert_eq!(out, Value::from(vec![Value::Number(2.0), Value::Number(3.0)]));

        // An exactly-satisfied variadic call binds nil as the rest.
        let out = func.invoke(&[Value::Number(1.0)]).unwrap();
        assert_eq!(out, Value::Nil);
    }

    #[test]
    fn test_invoke_arity_mismatch() {
        let func = FnValue::Compiled(Arc::new(CompiledFn::new(
            SmolStr::new("user$f__2"),
            BaseKind::Plain,
            vec![fixed_unit(2, vec![Code::Nil])],
            None,
            None,
            Arc::new(CompileEnv::default()),
        )));
        let err = func.invoke(&[Value::Nil]).unwrap_err();
        assert_eq!(
            err,
            EvalError::ArityMismatch {
                name: SmolStr::new("user$f__2"),
                got: 1
            }
        );
    }

    #[test]
    fn test_raise_surfaces_as_eval_error() {
        let mut env = CompileEnv::default();
        let slot = env.intern_keyword(crate::intern::Keyword::new("boom"));
        let unit = fixed_unit(0, vec![Code::Raise(Box::new(Code::KeywordRef(slot)))]);
        let func = FnValue::Compiled(Arc::new(CompiledFn::new(
            SmolStr::new("user$f__3"),
            BaseKind::Plain,
            vec![unit],
            None,
            None,
            Arc::new(env),
        )));
        let err = func.invoke(&[]).unwrap_err();
        assert_eq!(
            err,
            EvalError::Raised(Value::Keyword(crate::intern::Keyword::new("boom")))
        );
    }

    #[test]
    fn test_self_reference_recursion_is_depth_limited() {
        // (fn loop [] (loop)) — recurses until the call depth guard trips.
        let loop_sym = Symbol::new("loop");
        let unit = fixed_unit(
            0,
            vec![Code::Invoke {
                target: Box::new(Code::Local(loop_sym)),
                args: Vec::new(),
            }],
        );
        let func = FnValue::Compiled(Arc::new(CompiledFn::new(
            SmolStr::new("user$loop__4"),
            BaseKind::Plain,
            vec![unit],
            None,
            Some(loop_sym),
            Arc::new(CompileEnv::default()),
        )));
        let err = func.invoke(&[]).unwrap_err();
        assert_eq!(err, EvalError::CallDepthExceeded(MAX_CALL_DEPTH));
    }

    #[test]
    fn test_immediate_slot_names() {
        assert_eq!(immediate_slot_name(&fixed_unit(2, vec![])), "fixed-2");
        assert_eq!(immediate_slot_name(&variadic_unit(2, vec![])), "variadic-2");
    }
}
