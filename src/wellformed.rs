//! The well-formedness pass (§4.6).
//!
//! A single post-parse traversal that resolves every variable reference,
//! assigns sorts, and checks every xpath expression against the grammar —
//! the last point where a malformed formula is rejected before evaluation
//! ever sees it.

use crate::ast::{Formula, ParsedFormula, Sort, SortTable, Term, Variable, XPathExpr, XPathSegment};
use crate::error::WellFormednessError;
use crate::grammar::Grammar;
use crate::lexer::match_expr::MatchExpr;

/// Scope: the stack of tree/int variables bound by enclosing quantifiers,
/// plus the top-level `const`, each carrying its sort.
struct Scope<'a> {
    grammar: &'a Grammar,
    bound: Vec<Variable>,
}

impl<'a> Scope<'a> {
    fn resolve(&self, name: &str) -> Option<&Variable> {
        self.bound.iter().rev().find(|v| v.name == name)
    }

    fn is_bound_in_current_chain(&self, name: &str) -> bool {
        self.bound.iter().any(|v| v.name == name)
    }
}

/// Run the well-formedness pass over a parsed formula, returning the
/// name -> sort table the evaluator uses to avoid re-deriving sorts from
/// context (§4.6).
pub fn check(parsed: &ParsedFormula, grammar: &Grammar) -> Result<SortTable, WellFormednessError> {
    let mut scope = Scope { grammar, bound: vec![parsed.const_decl.clone()] };
    check_formula(&parsed.formula, &mut scope)?;

    let mut sorts = SortTable::new();
    sorts.insert(parsed.const_decl.name.clone(), parsed.const_decl.sort.clone());
    collect_sorts(&parsed.formula, &mut sorts);
    Ok(sorts)
}

fn collect_sorts(formula: &Formula, sorts: &mut SortTable) {
    match formula {
        Formula::True
        | Formula::False
        | Formula::SmtAtom(_)
        | Formula::StructuralPredicate(_)
        | Formula::SemanticPredicate(_) => {}
        Formula::Not(inner) => collect_sorts(inner, sorts),
        Formula::And(a, b)
        | Formula::Or(a, b)
        | Formula::Xor(a, b)
        | Formula::Implies(a, b)
        | Formula::Iff(a, b) => {
            collect_sorts(a, sorts);
            collect_sorts(b, sorts);
        }
        Formula::ForallTree { variable, body, .. } | Formula::ExistsTree { variable, body, .. } => {
            sorts.insert(variable.name.clone(), variable.sort.clone());
            collect_sorts(body, sorts);
        }
        Formula::ForallInt { variable, body } | Formula::ExistsInt { variable, body } => {
            sorts.insert(variable.name.clone(), variable.sort.clone());
            collect_sorts(body, sorts);
        }
    }
}

fn check_formula(formula: &Formula, scope: &mut Scope) -> Result<(), WellFormednessError> {
    match formula {
        Formula::True | Formula::False => Ok(()),
        Formula::SmtAtom(expr) => {
            for name in expr.free_names() {
                if scope.resolve(&name).is_none() {
                    return Err(WellFormednessError::UnresolvedVariable { name });
                }
            }
            check_xpaths_in_smt(expr, scope)?;
            check_smt_sorts(expr, scope)?;
            Ok(())
        }
        Formula::StructuralPredicate(call) => check_terms(&call.args, scope),
        Formula::SemanticPredicate(call) => check_terms(&call.args, scope),
        Formula::Not(inner) => check_formula(inner, scope),
        Formula::And(a, b)
        | Formula::Or(a, b)
        | Formula::Xor(a, b)
        | Formula::Implies(a, b)
        | Formula::Iff(a, b) => {
            check_formula(a, scope)?;
            check_formula(b, scope)
        }
        Formula::ForallTree { variable, match_expr, in_var, body }
        | Formula::ExistsTree { variable, match_expr, in_var, body } => {
            check_quantifier(variable, match_expr.as_ref(), in_var.as_deref(), body, scope)
        }
        Formula::ForallInt { variable, body } | Formula::ExistsInt { variable, body } => {
            check_quantifier(variable, None, None, body, scope)
        }
    }
}

fn check_quantifier(
    variable: &Variable,
    match_expr: Option<&MatchExpr>,
    in_var: Option<&str>,
    body: &Formula,
    scope: &mut Scope,
) -> Result<(), WellFormednessError> {
    if scope.is_bound_in_current_chain(&variable.name) {
        return Err(WellFormednessError::DuplicateBinder { name: variable.name.clone() });
    }
    if let Some(container) = in_var {
        if scope.resolve(container).is_none() {
            return Err(WellFormednessError::UnresolvedVariable { name: container.to_string() });
        }
    }
    let mut pushed = 1;
    scope.bound.push(variable.clone());
    if let Some(m) = match_expr {
        for (nonterminal, name) in m.bindings() {
            if scope.is_bound_in_current_chain(name) {
                scope.bound.truncate(scope.bound.len() - pushed);
                return Err(WellFormednessError::DuplicateBinder { name: name.to_string() });
            }
            scope.bound.push(Variable::new(name.to_string(), Sort::Tree(nonterminal.to_string())));
            pushed += 1;
        }
    }
    let result = check_formula(body, scope);
    scope.bound.truncate(scope.bound.len() - pushed);
    result
}

fn check_terms(args: &[Term], scope: &mut Scope) -> Result<(), WellFormednessError> {
    for term in args {
        match term {
            Term::Var(name) => {
                if scope.resolve(name).is_none() {
                    return Err(WellFormednessError::UnresolvedVariable { name: name.clone() });
                }
            }
            Term::XPath(xpath) => check_xpath(xpath, scope)?,
            Term::IntLiteral(_) | Term::StrLiteral(_) => {}
        }
    }
    Ok(())
}

fn check_xpaths_in_smt(
    expr: &crate::ast::SmtExpr,
    scope: &mut Scope,
) -> Result<(), WellFormednessError> {
    use crate::ast::SmtExpr;
    match expr {
        SmtExpr::XPathRef(xpath) => check_xpath(xpath, scope),
        SmtExpr::Apply { args, .. } => {
            for arg in args {
                check_xpaths_in_smt(arg, scope)?;
            }
            Ok(())
        }
        SmtExpr::VarRef(_) | SmtExpr::IntLiteral(_) | SmtExpr::StrLiteral(_) | SmtExpr::BoolLiteral(_) => Ok(()),
    }
}

/// The value sort an SMT sub-expression evaluates to once every reference is
/// substituted: `Int`/`Str`/`Bool` when known, `Unknown` when an unsupported
/// operator makes no sort promise either way (treated as a wildcard, never
/// flagged as a mismatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueSort {
    Int,
    Str,
    Bool,
    Unknown,
}

impl ValueSort {
    fn name(self) -> &'static str {
        match self {
            ValueSort::Int => "int",
            ValueSort::Str => "string",
            ValueSort::Bool => "bool",
            ValueSort::Unknown => "unknown",
        }
    }
}

/// §4.6(d): an SMT atom must not mix int-sorted and string-sorted variables
/// without going through an explicit coercion (`str.to.int`/`str.from_int`).
/// A tree-sorted variable or xpath reference always substitutes to its
/// yield, so it is string-sorted for this check; a `forall int`/`exists
/// int` variable is int-sorted. Recurses bottom-up, inferring each
/// operator's result sort and rejecting the first place two differently
/// sorted operands meet.
fn check_smt_sorts(expr: &crate::ast::SmtExpr, scope: &Scope) -> Result<ValueSort, WellFormednessError> {
    use crate::ast::SmtExpr;

    fn expect_all(
        args: &[SmtExpr],
        expected: ValueSort,
        op: &str,
        scope: &Scope,
    ) -> Result<(), WellFormednessError> {
        for arg in args {
            let found = check_smt_sorts(arg, scope)?;
            if found != ValueSort::Unknown && found != expected {
                return Err(WellFormednessError::SortMismatch {
                    context: format!("operand of `{}`", op),
                    expected: expected.name().to_string(),
                    found: found.name().to_string(),
                });
            }
        }
        Ok(())
    }

    match expr {
        SmtExpr::IntLiteral(_) => Ok(ValueSort::Int),
        SmtExpr::StrLiteral(_) => Ok(ValueSort::Str),
        SmtExpr::BoolLiteral(_) => Ok(ValueSort::Bool),
        SmtExpr::VarRef(name) => Ok(match scope.resolve(name) {
            Some(Variable { sort: Sort::Int, .. }) => ValueSort::Int,
            Some(Variable { sort: Sort::Tree(_), .. }) => ValueSort::Str,
            None => ValueSort::Unknown,
        }),
        SmtExpr::XPathRef(_) => Ok(ValueSort::Str),
        SmtExpr::Apply { op, args } => match op.as_str() {
            "+" | "-" | "*" => {
                expect_all(args, ValueSort::Int, op, scope)?;
                Ok(ValueSort::Int)
            }
            ">=" | "<=" | ">" | "<" => {
                expect_all(args, ValueSort::Int, op, scope)?;
                Ok(ValueSort::Bool)
            }
            "=" => {
                let mut expected = None;
                for arg in args {
                    let found = check_smt_sorts(arg, scope)?;
                    if found == ValueSort::Unknown {
                        continue;
                    }
                    match expected {
                        None => expected = Some(found),
                        Some(e) if e != found => {
                            return Err(WellFormednessError::SortMismatch {
                                context: "operand of `=`".to_string(),
                                expected: e.name().to_string(),
                                found: found.name().to_string(),
                            });
                        }
                        _ => {}
                    }
                }
                Ok(ValueSort::Bool)
            }
            "str.<=" | "str.prefixof" | "str.suffixof" | "str.contains" => {
                expect_all(args, ValueSort::Str, op, scope)?;
                Ok(ValueSort::Bool)
            }
            "str.++" => {
                expect_all(args, ValueSort::Str, op, scope)?;
                Ok(ValueSort::Str)
            }
            "str.to.int" => {
                expect_all(args, ValueSort::Str, op, scope)?;
                Ok(ValueSort::Int)
            }
            "str.from_int" => {
                expect_all(args, ValueSort::Int, op, scope)?;
                Ok(ValueSort::Str)
            }
            "str.len" => {
                expect_all(args, ValueSort::Str, op, scope)?;
                Ok(ValueSort::Int)
            }
            "str.is_digit" => {
                expect_all(args, ValueSort::Str, op, scope)?;
                Ok(ValueSort::Bool)
            }
            "and" | "or" => {
                expect_all(args, ValueSort::Bool, op, scope)?;
                Ok(ValueSort::Bool)
            }
            "not" => {
                expect_all(args, ValueSort::Bool, op, scope)?;
                Ok(ValueSort::Bool)
            }
            _ => {
                for arg in args {
                    check_smt_sorts(arg, scope)?;
                }
                Ok(ValueSort::Unknown)
            }
        },
    }
}

/// Each xpath segment must be reachable from the previous step's
/// nonterminal, starting at the base variable's own sort (§4.6(f)).
fn check_xpath(xpath: &XPathExpr, scope: &Scope) -> Result<(), WellFormednessError> {
    let base = scope
        .resolve(&xpath.base)
        .ok_or_else(|| WellFormednessError::UnresolvedVariable { name: xpath.base.clone() })?;
    let mut current = match &base.sort {
        Sort::Tree(nt) => nt.clone(),
        Sort::Int => {
            return Err(WellFormednessError::UnreachableXPath { path: render_xpath(xpath) });
        }
    };
    for segment in &xpath.segments {
        let ok = match segment {
            XPathSegment::Child { nonterminal, .. } => scope.grammar.is_possible_child(&current, nonterminal),
            XPathSegment::Descendant { nonterminal } => {
                scope.grammar.is_possible_descendant(&current, nonterminal)
            }
        };
        if !ok {
            return Err(WellFormednessError::UnreachableXPath { path: render_xpath(xpath) });
        }
        current = match segment {
            XPathSegment::Child { nonterminal, .. } => nonterminal.clone(),
            XPathSegment::Descendant { nonterminal } => nonterminal.clone(),
        };
    }
    Ok(())
}

fn render_xpath(xpath: &XPathExpr) -> String {
    xpath.to_string()
}

#[cfg(test)]
mod __tests__ {
    use super::*;
    use crate::parser::parse_formula;

    const ASSGN: &str = r#"
        <start> ::= <stmt> ;
        <stmt> ::= <assgn> ;
        <assgn> ::= <var> " := " <rhs> ;
        <rhs> ::= <var> | <digit> ;
        <var> ::= "a" | "b" | "c" ;
        <digit> ::= "0" | "1" ;
    "#;

    #[test]
    fn resolves_bound_variables_and_assigns_sorts() {
        let grammar = Grammar::parse(ASSGN, "start").unwrap();
        let parsed = parse_formula(
            r#"const start : <start> ; forall <assgn> a in start: same_position(a, a)"#,
            &[],
        )
        .unwrap();
        let sorts = check(&parsed, &grammar).unwrap();
        assert_eq!(sorts.get("a"), Some(&Sort::Tree("assgn".to_string())));
    }

    #[test]
    fn rejects_unresolved_variable() {
        let grammar = Grammar::parse(ASSGN, "start").unwrap();
        let parsed = parse_formula(r#"const start : <start> ; same_position(missing, missing)"#, &[]).unwrap();
        let err = check(&parsed, &grammar).unwrap_err();
        assert!(matches!(err, WellFormednessError::UnresolvedVariable { .. }));
    }

    #[test]
    fn rejects_duplicate_binder() {
        let grammar = Grammar::parse(ASSGN, "start").unwrap();
        let parsed = parse_formula(
            r#"const start : <start> ; forall <assgn> a in start: forall <rhs> a in a: true"#,
            &[],
        )
        .unwrap();
        let err = check(&parsed, &grammar).unwrap_err();
        assert!(matches!(err, WellFormednessError::DuplicateBinder { .. }));
    }

    #[test]
    fn rejects_unreachable_xpath_segment() {
        let grammar = Grammar::parse(ASSGN, "start").unwrap();
        let parsed = parse_formula(
            r#"const start : <start> ; forall <assgn> a in start: same_position(a.<digit>, a.<digit>)"#,
            &[],
        )
        .unwrap();
        let err = check(&parsed, &grammar).unwrap_err();
        assert!(matches!(err, WellFormednessError::UnreachableXPath { .. }));
    }

    #[test]
    fn rejects_int_and_string_sorted_variables_mixed_under_equality() {
        let grammar = Grammar::parse(ASSGN, "start").unwrap();
        let parsed = parse_formula(
            r#"const start : <start> ; forall <assgn> a in start: forall int i : a.<var> = i"#,
            &[],
        )
        .unwrap();
        let err = check(&parsed, &grammar).unwrap_err();
        assert!(matches!(err, WellFormednessError::SortMismatch { .. }));
    }

    #[test]
    fn accepts_int_sorted_variable_coerced_through_str_to_int() {
        let grammar = Grammar::parse(ASSGN, "start").unwrap();
        let parsed = parse_formula(
            r#"const start : <start> ; forall <assgn> a in start: forall int i : (str.to.int a.<rhs>) = i"#,
            &[],
        )
        .unwrap();
        assert!(check(&parsed, &grammar).is_ok());
    }

    #[test]
    fn accepts_reachable_xpath_segment() {
        let grammar = Grammar::parse(ASSGN, "start").unwrap();
        let parsed = parse_formula(
            r#"const start : <start> ; forall <assgn> a in start: same_position(a.<var>, a.<var>)"#,
            &[],
        )
        .unwrap();
        assert!(check(&parsed, &grammar).is_ok());
    }
}
