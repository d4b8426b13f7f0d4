use std::sync::atomic::{AtomicU64, Ordering};

use smol_str::SmolStr;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Returns the next value of the process-wide id counter. Monotonic and
/// safe under concurrent callers; the sole source of uniqueness for
/// generated closure names.
pub fn next_global_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Rewrites a source-level name into the target identifier alphabet.
/// Characters with no direct spelling become escape sequences; anything
/// already legal passes through unchanged.
pub fn munge(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            '-' => out.push('_'),
            ':' => out.push_str("_COLON_"),
            '+' => out.push_str("_PLUS_"),
            '>' => out.push_str("_GT_"),
            '<' => out.push_str("_LT_"),
            '=' => out.push_str("_EQ_"),
            '~' => out.push_str("_TILDE_"),
            '!' => out.push_str("_BANG_"),
            '@' => out.push_str("_CIRCA_"),
            '#' => out.push_str("_SHARP_"),
            '\'' => out.push_str("_SINGLEQUOTE_"),
            '"' => out.push_str("_DOUBLEQUOTE_"),
            '%' => out.push_str("_PERCENT_"),
            '^' => out.push_str("_CARET_"),
            '&' => out.push_str("_AMPERSAND_"),
            '*' => out.push_str("_STAR_"),
            '|' => out.push_str("_BAR_"),
            '{' => out.push_str("_LBRACE_"),
            '}' => out.push_str("_RBRACE_"),
            '[' => out.push_str("_LBRACK_"),
            ']' => out.push_str("_RBRACK_"),
            '/' => out.push_str("_SLASH_"),
            '\\' => out.push_str("_BSLASH_"),
            '?' => out.push_str("_QMARK_"),
            _ => out.push(ch),
        }
    }
    out
}

/// Computes the globally unique name for a closure literal. The prefix is
/// the enclosing literal's generated name when parsing is nested, else the
/// current namespace; the suffix is the global id, which guarantees that
/// repeated or concurrent compilations never collide.
pub fn generate_fn_name(
    enclosing: Option<&str>,
    namespace: &str,
    simple_name: Option<&str>,
) -> SmolStr {
    let base = match enclosing {
        Some(name) => format!("{}$", name),
        None => format!("{}$", munge(namespace)),
    };
    let simple = munge(simple_name.unwrap_or("fn")).replace('.', "_DOT_");
    SmolStr::new(format!("{}{}__{}", base, simple, next_global_id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("plain", "plain")]
    #[case("with-dash", "with_dash")]
    #[case("really?", "really_QMARK_")]
    #[case("->vec", "__GT_vec")]
    #[case("a+b", "a_PLUS_b")]
    #[case("ns/name", "ns_SLASH_name")]
    fn test_munge(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(munge(input), expected);
    }

    #[test]
    fn test_next_global_id_is_monotonic() {
        let a = next_global_id();
        let b = next_global_id();
        assert!(b > a);
    }

    #[test]
    fn test_generate_fn_name_namespace_prefix() {
        let name = generate_fn_name(None, "core.user", Some("greet"));
        assert!(name.starts_with("core.user$greet__"), "got {}", name);
    }

    #[test]
    fn test_generate_fn_name_nested_prefix() {
        let name = generate_fn_name(Some("core$outer__7"), "core", None);
        assert!(name.starts_with("core$outer__7$fn__"), "got {}", name);
    }

    #[test]
    fn test_generate_fn_name_unique_for_same_input() {
        let a = generate_fn_name(None, "user", Some("f"));
        let b = generate_fn_name(None, "user", Some("f"));
        assert_ne!(a, b);
    }
}
