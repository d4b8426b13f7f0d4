//! Property-based tests for the closure literal compiler and its
//! process-wide naming and caching state.
use std::collections::HashSet;

use opal_compiler::{
    CompileError, Compiler, FnExpr, Form, UsageContext, munge, next_global_id, rest_fn_templates,
};
use proptest::prelude::*;

fn clause_with_arity(arity: usize, variadic: bool) -> Form {
    let mut params: Vec<Form> = (0..arity)
        .map(|i| Form::symbol(&format!("p{}", i)))
        .collect();
    if variadic {
        params.push(Form::symbol("&"));
        params.push(Form::symbol("rest"));
    }
    Form::list(vec![Form::vector(params), Form::nil()])
}

fn fixed_clause(arity: usize) -> Form {
    clause_with_arity(arity, false)
}

fn fn_form(clauses: Vec<Form>) -> Form {
    let mut items = vec![Form::symbol("fn*")];
    items.extend(clauses);
    Form::list(items)
}

fn parse(form: &Form) -> Result<FnExpr, CompileError> {
    FnExpr::parse(
        &Compiler::new("user"),
        UsageContext::Expression,
        form,
        None,
    )
}

mod strategies {
    use proptest::prelude::*;

    /// Pairwise distinct fixed arities, in arbitrary order.
    pub fn distinct_arities() -> impl Strategy<Value = Vec<usize>> {
        prop::collection::hash_set(0usize..10, 1..6)
            .prop_map(|set| set.into_iter().collect::<Vec<_>>())
            .prop_shuffle()
    }
}

proptest! {
    #[test]
    fn prop_distinct_fixed_arities_parse(arities in strategies::distinct_arities()) {
        let clauses = arities
            .iter()
            .map(|&arity| fixed_clause(arity))
            .collect::<Vec<_>>();
        let fn_expr = parse(&fn_form(clauses)).unwrap();
        prop_assert_eq!(fn_expr.overloads().len(), arities.len());
        prop_assert!(fn_expr.variadic().is_none());
        for arity in arities {
            prop_assert!(fn_expr.overloads().contains_key(&arity));
        }
    }

    #[test]
    fn prop_duplicated_arity_fails(arities in strategies::distinct_arities(), pick in any::<prop::sample::Index>()) {
        let duplicated = arities[pick.index(arities.len())];
        let mut clauses = arities
            .iter()
            .map(|&arity| fixed_clause(arity))
            .collect::<Vec<_>>();
        clauses.push(fixed_clause(duplicated));
        let err = parse(&fn_form(clauses)).unwrap_err();
        let matched = matches!(err, CompileError::DuplicateArity { arity, .. } if arity == duplicated);
        prop_assert!(matched);
    }

    #[test]
    fn prop_variadic_at_or_above_max_fixed_parses(arities in strategies::distinct_arities(), extra in 0usize..3) {
        let max_fixed = *arities.iter().max().unwrap();
        let required = max_fixed + extra;
        let mut clauses = arities
            .iter()
            .map(|&arity| fixed_clause(arity))
            .collect::<Vec<_>>();
        clauses.push(clause_with_arity(required, true));
        // The variadic clause declares required + 1 params, so every
        // fixed arity stays strictly below it.
        let fn_expr = parse(&fn_form(clauses)).unwrap();
        prop_assert_eq!(fn_expr.variadic().unwrap().required_arity(), required);
    }

    #[test]
    fn prop_fixed_arity_reaching_variadic_params_fails(required in 0usize..6, excess in 0usize..3) {
        let fixed = required + 1 + excess;
        let clauses = vec![
            clause_with_arity(fixed, false),
            clause_with_arity(required, true),
        ];
        let err = parse(&fn_form(clauses)).unwrap_err();
        let matched = matches!(err, CompileError::VariadicArityConflict { .. });
        prop_assert!(matched);
    }

    #[test]
    fn prop_repeated_parses_generate_distinct_names(count in 2usize..8) {
        let form = fn_form(vec![clause_with_arity(1, false)]);
        let names: HashSet<String> = (0..count)
            .map(|_| parse(&form).unwrap().generated_name().to_string())
            .collect();
        prop_assert_eq!(names.len(), count);
    }

    #[test]
    fn prop_munge_output_is_identifier_safe(input in "[ -~]{0,24}") {
        let munged = munge(&input);
        for ch in [
            '-', ':', '+', '>', '<', '=', '~', '!', '@', '#', '\'', '"', '%', '^', '&', '*',
            '|', '{', '}', '[', ']', '/', '\\', '?',
        ] {
            prop_assert!(!munged.contains(ch), "{:?} survived in {:?}", ch, munged);
        }
    }

    #[test]
    fn prop_template_identity_is_stable(arity in 0usize..16) {
        let first = rest_fn_templates().get_or_create(arity);
        let second = rest_fn_templates().get_or_create(arity);
        prop_assert!(std::sync::Arc::ptr_eq(&first, &second));
        prop_assert_eq!(first.required_arity(), arity);
    }
}

#[test]
fn test_global_ids_unique_under_concurrency() {
    let ids: Vec<u64> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| (0..200).map(|_| next_global_id()).collect::<Vec<_>>()))
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect()
    });
    let unique: HashSet<u64> = ids.iter().copied().collect();
    assert_eq!(unique.len(), ids.len());
}

#[test]
fn test_concurrent_parses_yield_distinct_names() {
    let names: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    let compiler = Compiler::new("user");
                    let form = fn_form(vec![clause_with_arity(0, false)]);
                    (0..50)
                        .map(|_| {
                            FnExpr::parse(&compiler, UsageContext::Expression, &form, Some("same"))
                                .unwrap()
                                .generated_name()
                                .to_string()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect()
    });
    let unique: HashSet<&String> = names.iter().collect();
    assert_eq!(unique.len(), names.len());
}
