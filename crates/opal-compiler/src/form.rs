use std::sync::Arc;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::intern::{Keyword, Symbol};
use crate::range::Range;

/// Metadata attached to a form, keyed by keyword.
pub type Meta = FxHashMap<Keyword, Form>;

/// One node of the nested-list source representation handed to the
/// analyzer by the reader. Forms carry their source range and optional
/// metadata; the reader that produces them from text lives outside this
/// crate.
#[derive(Debug, Clone, PartialEq)]
pub struct Form {
    pub kind: FormKind,
    pub range: Range,
    pub meta: Option<Arc<Meta>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormKind {
    List(Vec<Form>),
    Vector(Vec<Form>),
    Symbol(Symbol),
    Keyword(Keyword),
    Number(f64),
    Str(String),
    Bool(bool),
    Nil,
}

impl Form {
    pub fn new(kind: FormKind, range: Range) -> Self {
        Self {
            kind,
            range,
            meta: None,
        }
    }

    pub fn list(items: Vec<Form>) -> Self {
        Self::new(FormKind::List(items), Range::default())
    }

    pub fn vector(items: Vec<Form>) -> Self {
        Self::new(FormKind::Vector(items), Range::default())
    }

    pub fn symbol(name: &str) -> Self {
        Self::new(FormKind::Symbol(Symbol::new(name)), Range::default())
    }

    pub fn keyword(name: &str) -> Self {
        Self::new(FormKind::Keyword(Keyword::new(name)), Range::default())
    }

    pub fn number(n: f64) -> Self {
        Self::new(FormKind::Number(n), Range::default())
    }

    pub fn string(s: &str) -> Self {
        Self::new(FormKind::Str(s.to_string()), Range::default())
    }

    pub fn bool(b: bool) -> Self {
        Self::new(FormKind::Bool(b), Range::default())
    }

    pub fn nil() -> Self {
        Self::new(FormKind::Nil, Range::default())
    }

    pub fn with_range(mut self, range: Range) -> Self {
        self.range = range;
        self
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = Some(Arc::new(meta));
        self
    }

    pub fn as_symbol(&self) -> Option<Symbol> {
        match &self.kind {
            FormKind::Symbol(sym) => Some(*sym),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Form]> {
        match &self.kind {
            FormKind::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[Form]> {
        match &self.kind {
            FormKind::Vector(items) => Some(items),
            _ => None,
        }
    }

    /// Reads a metadata entry as a boolean flag. Anything other than an
    /// absent entry, `false`, or `nil` counts as set.
    pub fn meta_flag(&self, name: &str) -> bool {
        match self.meta_entry(name) {
            None => false,
            Some(form) => !matches!(form.kind, FormKind::Bool(false) | FormKind::Nil),
        }
    }

    /// Reads a metadata entry as a name, accepting symbols and strings.
    pub fn meta_name(&self, name: &str) -> Option<SmolStr> {
        match &self.meta_entry(name)?.kind {
            FormKind::Symbol(sym) => Some(sym.resolve_with(|s| SmolStr::new(s))),
            FormKind::Str(s) => Some(SmolStr::new(s)),
            _ => None,
        }
    }

    fn meta_entry(&self, name: &str) -> Option<&Form> {
        self.meta.as_ref()?.get(&Keyword::new(name))
    }
}

impl std::fmt::Display for Form {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use itertools::Itertools;

        match &self.kind {
            FormKind::List(items) => write!(f, "({})", items.iter().join(" ")),
            FormKind::Vector(items) => write!(f, "[{}]", items.iter().join(" ")),
            FormKind::Symbol(sym) => write!(f, "{}", sym),
            FormKind::Keyword(kw) => write!(f, "{}", kw),
            FormKind::Number(n) => write!(f, "{}", n),
            FormKind::Str(s) => write!(f, "{:?}", s),
            FormKind::Bool(b) => write!(f, "{}", b),
            FormKind::Nil => write!(f, "nil"),
        }
    }
}
