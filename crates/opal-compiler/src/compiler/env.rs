use std::cell::RefCell;

use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;

use crate::intern::{Keyword, Symbol};
use crate::value::Value;

/// A reference into one of a closure's pools. Emitted code addresses
/// constants, keywords, and var references exclusively through slots so
/// that each distinct value is materialized once per compiled unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotRef(u32);

impl SlotRef {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for SlotRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "slot#{}", self.0)
    }
}

/// The private constant/keyword/var environment of one closure literal.
/// Populated while the literal's overloads are parsed, then frozen into
/// the literal; emission only reads it.
#[derive(Debug, Default, Clone)]
pub struct CompileEnv {
    constants: Vec<Value>,
    keywords: Vec<Keyword>,
    keyword_slots: FxHashMap<Keyword, SlotRef>,
    vars: Vec<Symbol>,
    var_slots: FxHashMap<Symbol, SlotRef>,
}

impl CompileEnv {
    pub(crate) fn intern_constant(&mut self, value: Value) -> SlotRef {
        if let Some(slot) = self.constant_slot(&value) {
            return slot;
        }
        let slot = SlotRef(self.constants.len() as u32);
        self.constants.push(value);
        slot
    }

    pub(crate) fn intern_keyword(&mut self, kw: Keyword) -> SlotRef {
        if let Some(slot) = self.keyword_slots.get(&kw) {
            return *slot;
        }
        let slot = SlotRef(self.keywords.len() as u32);
        self.keywords.push(kw);
        self.keyword_slots.insert(kw, slot);
        slot
    }

    pub(crate) fn intern_var(&mut self, sym: Symbol) -> SlotRef {
        if let Some(slot) = self.var_slots.get(&sym) {
            return *slot;
        }
        let slot = SlotRef(self.vars.len() as u32);
        self.vars.push(sym);
        self.var_slots.insert(sym, slot);
        slot
    }

    pub fn constant_slot(&self, value: &Value) -> Option<SlotRef> {
        self.constants
            .iter()
            .position(|v| v == value)
            .map(|i| SlotRef(i as u32))
    }

    pub fn keyword_slot(&self, kw: &Keyword) -> Option<SlotRef> {
        self.keyword_slots.get(kw).copied()
    }

    pub fn var_slot(&self, sym: &Symbol) -> Option<SlotRef> {
        self.var_slots.get(sym).copied()
    }

    pub fn constant(&self, slot: SlotRef) -> Option<&Value> {
        self.constants.get(slot.index())
    }

    pub fn keyword(&self, slot: SlotRef) -> Option<&Keyword> {
        self.keywords.get(slot.index())
    }

    pub fn var(&self, slot: SlotRef) -> Option<&Symbol> {
        self.vars.get(slot.index())
    }

    pub fn constants_len(&self) -> usize {
        self.constants.len()
    }

    pub fn keywords_len(&self) -> usize {
        self.keywords.len()
    }

    pub fn vars_len(&self) -> usize {
        self.vars.len()
    }
}

#[derive(Debug, Default)]
struct Frame {
    fn_name: SmolStr,
    env: CompileEnv,
    locals: Vec<FxHashSet<Symbol>>,
}

thread_local! {
    // One stack per parsing thread; a literal's pools must never be
    // visible to a literal parsed concurrently on another thread.
    static FRAMES: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// Opens a fresh environment frame for one closure literal. Dropping the
/// scope restores the enclosing frame unconditionally, so a validation
/// failure partway through parsing leaves the caller's state intact;
/// `finish` consumes the scope and hands back the accumulated pools.
pub(crate) struct EnvScope {
    _private: (),
}

impl EnvScope {
    pub(crate) fn enter(fn_name: SmolStr) -> Self {
        FRAMES.with(|frames| {
            frames.borrow_mut().push(Frame {
                fn_name,
                env: CompileEnv::default(),
                locals: Vec::new(),
            });
        });
        EnvScope { _private: () }
    }

    pub(crate) fn finish(self) -> CompileEnv {
        let env = FRAMES.with(|frames| {
            frames
                .borrow_mut()
                .pop()
                .map(|frame| frame.env)
                .unwrap_or_default()
        });
        std::mem::forget(self);
        env
    }
}

impl Drop for EnvScope {
    fn drop(&mut self) {
        FRAMES.with(|frames| {
            frames.borrow_mut().pop();
        });
    }
}

/// Brings one overload's parameters into scope for the duration of its
/// body analysis.
pub(crate) struct ParamScope {
    pushed: bool,
}

impl ParamScope {
    pub(crate) fn enter(locals: FxHashSet<Symbol>) -> Self {
        let pushed = FRAMES.with(|frames| {
            let mut frames = frames.borrow_mut();
            match frames.last_mut() {
                Some(frame) => {
                    frame.locals.push(locals);
                    true
                }
                None => false,
            }
        });
        ParamScope { pushed }
    }
}

impl Drop for ParamScope {
    fn drop(&mut self) {
        if self.pushed {
            FRAMES.with(|frames| {
                if let Some(frame) = frames.borrow_mut().last_mut() {
                    frame.locals.pop();
                }
            });
        }
    }
}

pub(crate) fn enclosing_fn_name() -> Option<SmolStr> {
    FRAMES.with(|frames| frames.borrow().last().map(|frame| frame.fn_name.clone()))
}

pub(crate) fn register_constant(value: &Value) {
    FRAMES.with(|frames| {
        if let Some(frame) = frames.borrow_mut().last_mut() {
            frame.env.intern_constant(value.clone());
        }
    });
}

pub(crate) fn register_keyword(kw: Keyword) {
    FRAMES.with(|frames| {
        if let Some(frame) = frames.borrow_mut().last_mut() {
            frame.env.intern_keyword(kw);
        }
    });
}

pub(crate) fn register_var(sym: Symbol) {
    FRAMES.with(|frames| {
        if let Some(frame) = frames.borrow_mut().last_mut() {
            frame.env.intern_var(sym);
        }
    });
}

/// True when the symbol is bound by any overload currently being parsed,
/// including overloads of enclosing literals (closed-over locals).
pub(crate) fn is_local(sym: Symbol) -> bool {
    FRAMES.with(|frames| {
        frames
            .borrow()
            .iter()
            .rev()
            .any(|frame| frame.locals.iter().any(|set| set.contains(&sym)))
    })
}
