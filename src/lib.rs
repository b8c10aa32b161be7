//! ISLa's language core: BNF grammars, derivation trees, the ISLa formula
//! language (lexer, parser, well-formedness), and a three-valued
//! satisfaction evaluator (§1-§9).
//!
//! The pipeline a caller wires together is always the same four stages:
//! parse a [`grammar::Grammar`], parse a formula with [`parser::parse_formula`],
//! run [`wellformed::check`] against the grammar to get a sort table, then
//! hand grammar-, formula- and tree together to [`eval::check`]. [`check`]
//! does all four in one call for callers who do not need the intermediate
//! stages.

pub mod ast;
pub mod error;
pub mod eval;
pub mod grammar;
pub mod lexer;
pub mod oracle;
pub mod parser;
pub mod predicate;
pub mod tree;
pub mod util;
pub mod verdict;
pub mod wellformed;

pub use ast::{ParsedFormula, Sort, SortTable, Variable};
pub use error::IslaError;
pub use eval::EvalConfig;
pub use grammar::Grammar;
pub use oracle::{OracleValue, ReferenceOracle, SmtOracle};
pub use predicate::{SemanticPredicate, SemanticRegistry};
pub use tree::{Tree, TreeBuilder};
pub use verdict::Verdict;

/// Run the full pipeline: parse `formula_src` against `grammar`, check it
/// well-formed, then evaluate it over `tree` (§4.10, §6).
///
/// This is the convenience entry point for callers who already have a
/// parsed [`Grammar`] and a [`Tree`] and just want a verdict; callers who
/// need the sort table or want to reuse a parsed formula across several
/// trees should call [`parser::parse_formula`], [`wellformed::check`] and
/// [`eval::check`] directly instead.
pub fn check(
    grammar: &Grammar,
    tree: &Tree,
    formula_src: &str,
    semantic: &SemanticRegistry,
    oracle: &dyn SmtOracle,
    config: EvalConfig,
) -> Result<Verdict, IslaError> {
    let known: Vec<(&str, usize)> = semantic.signatures();
    let parsed = parser::parse_formula(formula_src, &known)?;
    let sorts = wellformed::check(&parsed, grammar)?;
    Ok(eval::check(tree, &parsed, &sorts, semantic, oracle, config)?)
}

#[cfg(test)]
mod __tests__ {
    use super::*;

    const ASSGN_GRAMMAR: &str = r#"
        <start> ::= <assgn> ;
        <assgn> ::= <var> " := " <rhs> ;
        <rhs> ::= <var> | <digit> ;
        <var> ::= "a" | "b" | "c" ;
        <digit> ::= "0" | "1" | "2" | "3" | "4" | "5" | "6" | "7" | "8" | "9" ;
    "#;

    fn digit_rhs_tree() -> Tree {
        let mut b = TreeBuilder::new();
        let lhs_a = b.terminal("a");
        let lhs = b.inner("var", vec![lhs_a]);
        let sep = b.terminal(" := ");
        let digit = b.terminal("7");
        let rhs_digit = b.inner("digit", vec![digit]);
        let rhs = b.inner("rhs", vec![rhs_digit]);
        let assgn = b.inner("assgn", vec![lhs, sep, rhs]);
        b.inner("start", vec![assgn]);
        b.finish()
    }

    #[test]
    fn full_pipeline_decides_a_simple_property() {
        let grammar = Grammar::parse(ASSGN_GRAMMAR, "start").unwrap();
        let tree = digit_rhs_tree();
        let semantic = SemanticRegistry::new();
        let formula = r#"
            const start : <start> ;
            forall <digit> d in start: (>= (str.to.int d) 0)
        "#;
        let verdict =
            check(&grammar, &tree, formula, &semantic, &ReferenceOracle, EvalConfig::default()).unwrap();
        assert_eq!(verdict, Verdict::Sat);
    }

    #[test]
    fn malformed_formula_surfaces_as_isla_error() {
        let grammar = Grammar::parse(ASSGN_GRAMMAR, "start").unwrap();
        let tree = digit_rhs_tree();
        let semantic = SemanticRegistry::new();
        let formula = r#"const start : <start> ; same_position(missing, missing)"#;
        let err = check(&grammar, &tree, formula, &semantic, &ReferenceOracle, EvalConfig::default())
            .unwrap_err();
        assert!(matches!(err, IslaError::WellFormedness(_)));
    }
}
