use std::sync::{LazyLock, Mutex};

use string_interner::{DefaultBackend, DefaultSymbol, StringInterner};

static STRING_INTERNER: LazyLock<Mutex<StringInterner<DefaultBackend>>> =
    LazyLock::new(|| Mutex::new(StringInterner::default()));

/// An interned symbol name. Two symbols spelled the same way are the same
/// value, so equality and hashing are pointer-cheap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(DefaultSymbol);

impl Symbol {
    pub fn new(s: &str) -> Self {
        Self(STRING_INTERNER.lock().unwrap().get_or_intern(s))
    }

    pub fn as_str(&self) -> String {
        STRING_INTERNER
            .lock()
            .unwrap()
            .resolve(self.0)
            .unwrap()
            .to_string()
    }

    pub fn resolve_with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&str) -> R,
    {
        let interner = STRING_INTERNER.lock().unwrap();
        let resolved = interner.resolve(self.0).unwrap();
        f(resolved)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.resolve_with(|s| write!(f, "{}", s))
    }
}

/// An interned keyword. Keywords are self-evaluating constants whose
/// identity comes from the same process-wide intern table as [`Symbol`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Keyword(Symbol);

impl Keyword {
    pub fn new(name: &str) -> Self {
        Self(Symbol::new(name))
    }

    pub fn name(&self) -> String {
        self.0.as_str()
    }

    pub fn resolve_with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&str) -> R,
    {
        self.0.resolve_with(f)
    }
}

impl From<&str> for Keyword {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.resolve_with(|s| write!(f, ":{}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_new_and_as_str() {
        let sym = Symbol::new("hello");
        assert_eq!(sym.as_str(), "hello");
    }

    #[test]
    fn test_symbol_interned_identity() {
        let a = Symbol::new("shared");
        let b: Symbol = String::from("shared").into();
        assert_eq!(a, b);
    }

    #[test]
    fn test_symbol_display() {
        let sym = Symbol::new("display_test");
        assert_eq!(format!("{}", sym), "display_test");
    }

    #[test]
    fn test_symbol_resolve_with() {
        let sym = Symbol::new("resolve");
        let len = sym.resolve_with(|s| s.len());
        assert_eq!(len, "resolve".len());
    }

    #[test]
    fn test_keyword_display_has_colon() {
        let kw = Keyword::new("status");
        assert_eq!(format!("{}", kw), ":status");
        assert_eq!(kw.name(), "status");
    }

    #[test]
    fn test_keyword_identity() {
        assert_eq!(Keyword::new("a"), Keyword::from("a"));
        assert_ne!(Keyword::new("a"), Keyword::new("b"));
    }
}
