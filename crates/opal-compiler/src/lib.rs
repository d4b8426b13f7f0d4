//! `opal-compiler` is the expression-compilation core of the opal
//! language: it turns parsed source forms into executable code.
//!
//! The crate provides the typed expression-node family behind the
//! analyzer (constants, keywords, locals, vars, invocations, `throw`)
//! and the multi-arity closure compiler, including overload validation,
//! globally unique closure naming, and the process-wide cache of
//! rest-dispatch base templates shared by all variadic closures of the
//! same required arity.
//!
//! ## Examples
//!
//! ```
//! use opal_compiler::{Compiler, Form, Value};
//!
//! let compiler = Compiler::new("user");
//!
//! // (fn* greet [who] who)
//! let form = Form::list(vec![
//!     Form::symbol("fn*"),
//!     Form::symbol("greet"),
//!     Form::vector(vec![Form::symbol("who")]),
//!     Form::symbol("who"),
//! ]);
//!
//! let greet = compiler.eval(&form).unwrap();
//! let Value::Fn(greet) = greet else { unreachable!() };
//! let out = greet.invoke(&[Value::from("world")]).unwrap();
//! assert_eq!(out, Value::from("world"));
//! ```

mod compiler;
mod error;
mod form;
mod intern;
mod range;
mod value;

pub use compiler::Compiler;
pub use compiler::Params;
pub use compiler::code::{BaseKind, Code, CompiledFn, ImmediateFn, OverloadUnit};
pub use compiler::context::UsageContext;
pub use compiler::env::{CompileEnv, SlotRef};
pub use compiler::error::{CompileError, EvalError};
pub use compiler::expr::{
    ConstantExpr, Expr, ExprKind, ExprNode, InvokeExpr, KeywordExpr, LocalExpr, StaticType,
    VarExpr,
};
pub use compiler::fn_expr::{FnExpr, Overload};
pub use compiler::names::{munge, next_global_id};
pub use compiler::templates::{RestFnTemplate, TemplateCache, rest_fn_templates};
pub use compiler::throw::ThrowExpr;
pub use error::{Error, InnerError};
pub use form::{Form, FormKind, Meta};
pub use intern::{Keyword, Symbol};
pub use range::{Position, Range};
pub use value::{FnValue, Value};
