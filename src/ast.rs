//! The formula AST (§3, §4.4, §4.6, Design Notes §9).
//!
//! `Formula` is a single tagged-variant enum rather than a trait-object
//! hierarchy: the evaluator matches exhaustively over it (§9), so adding a
//! connective means the compiler finds every place that needs to handle it.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// A bound or free variable. Two variables are the same binder only if both
/// name and sort agree; well-formedness (§4.6) is what actually enforces
/// binder uniqueness per scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variable {
    pub name: String,
    pub sort: Sort,
}

impl Variable {
    pub fn new(name: impl Into<String>, sort: Sort) -> Self {
        Self { name: name.into(), sort }
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// The sort of a variable (§3): either a derivation-tree slot of a declared
/// nonterminal type, or an integer used only in `forall int` / `exists int`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Sort {
    Tree(String),
    Int,
}

impl Display for Sort {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Sort::Tree(nt) => write!(f, "<{}>", nt),
            Sort::Int => write!(f, "int"),
        }
    }
}

/// A single step of an XPath-like expression (§3, §4.6(f)): either a
/// positional child selector `.<T>` / `.<T>[k]`, or an unbounded-depth
/// descendant selector `..<T>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XPathSegment {
    Child { nonterminal: String, index: Option<usize> },
    Descendant { nonterminal: String },
}

/// `base.<T>[.<U>...]` — the base variable followed by zero or more
/// navigation steps (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XPathExpr {
    pub base: String,
    pub segments: Vec<XPathSegment>,
}

impl Display for XPathExpr {
    /// Renders the full navigation path, not just the base name — two
    /// distinct xpath expressions sharing a base (`a.<open>`, `a.<close>`)
    /// must render differently, since this is also used as the oracle
    /// binding key for a resolved reference (§4.9).
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.base)?;
        for segment in &self.segments {
            match segment {
                XPathSegment::Child { nonterminal, index: Some(k) } => write!(f, ".<{}>[{}]", nonterminal, k)?,
                XPathSegment::Child { nonterminal, index: None } => write!(f, ".<{}>", nonterminal)?,
                XPathSegment::Descendant { nonterminal } => write!(f, "..<{}>", nonterminal)?,
            }
        }
        Ok(())
    }
}

/// One argument to a structural or semantic predicate, or to an SMT atom's
/// free-standing reference position (§4.7, §4.8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Var(String),
    XPath(XPathExpr),
    IntLiteral(i64),
    /// A bare string literal, e.g. `level`'s leading comparison-kind and
    /// nonterminal-type arguments (§4.7) — never a variable reference, so it
    /// contributes nothing to a formula's free variables.
    StrLiteral(String),
}

/// An s-expression in the embedded SMT sub-language (§4.4, §6). Both the
/// prefix `(op a b)` and the ISLa-specific infix surface syntax parse down
/// into this one representation, so the evaluator and oracle never see the
/// surface notation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtExpr {
    VarRef(String),
    XPathRef(XPathExpr),
    IntLiteral(i64),
    StrLiteral(String),
    BoolLiteral(bool),
    Apply { op: String, args: Vec<SmtExpr> },
}

impl SmtExpr {
    /// Every variable name referenced anywhere in this expression, without
    /// duplicates, in first-occurrence order.
    pub fn free_names(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_names(&mut out);
        out
    }

    fn collect_names(&self, out: &mut Vec<String>) {
        match self {
            SmtExpr::VarRef(name) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            SmtExpr::XPathRef(xpath) => {
                if !out.contains(&xpath.base) {
                    out.push(xpath.base.clone());
                }
            }
            SmtExpr::IntLiteral(_) | SmtExpr::StrLiteral(_) | SmtExpr::BoolLiteral(_) => {}
            SmtExpr::Apply { args, .. } => {
                for arg in args {
                    arg.collect_names(out);
                }
            }
        }
    }
}

/// A structural predicate call, e.g. `before(v1, v2)` (§4.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralPredicateCall {
    pub name: String,
    pub args: Vec<Term>,
}

/// A semantic predicate call, e.g. `count(elem, "<digit>", n)` (§4.8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticPredicateCall {
    pub name: String,
    pub args: Vec<Term>,
}

/// The ISLa formula language (§3). One enum, exhaustively matched — no
/// dynamic dispatch, per the arena/tagged-variant design adopted throughout
/// this core (§9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Formula {
    True,
    False,
    SmtAtom(SmtExpr),
    StructuralPredicate(StructuralPredicateCall),
    SemanticPredicate(SemanticPredicateCall),
    Not(Box<Formula>),
    And(Box<Formula>, Box<Formula>),
    Or(Box<Formula>, Box<Formula>),
    Xor(Box<Formula>, Box<Formula>),
    Implies(Box<Formula>, Box<Formula>),
    Iff(Box<Formula>, Box<Formula>),
    /// `forall <T> v [= match-expr] [in c] : body` (§3, §4.4).
    ForallTree {
        variable: Variable,
        match_expr: Option<crate::lexer::match_expr::MatchExpr>,
        in_var: Option<String>,
        body: Box<Formula>,
    },
    /// `exists <T> v [= match-expr] [in c] : body` (§3, §4.4).
    ExistsTree {
        variable: Variable,
        match_expr: Option<crate::lexer::match_expr::MatchExpr>,
        in_var: Option<String>,
        body: Box<Formula>,
    },
    /// `forall int i : body` (§3, §4.4).
    ForallInt { variable: Variable, body: Box<Formula> },
    /// `exists int i : body` (§3, §4.4).
    ExistsInt { variable: Variable, body: Box<Formula> },
}

impl Formula {
    pub fn and(self, other: Formula) -> Formula {
        Formula::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Formula) -> Formula {
        Formula::Or(Box::new(self), Box::new(other))
    }

    pub fn not(self) -> Formula {
        Formula::Not(Box::new(self))
    }

    /// Free variable names, computed bottom-up so every quantifier can bind
    /// exactly the names free in its own body (§4.6(b)).
    pub fn free_variables(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_free(&mut out);
        out
    }

    fn collect_free(&self, out: &mut Vec<String>) {
        fn push(out: &mut Vec<String>, name: &str) {
            if !out.contains(&name.to_string()) {
                out.push(name.to_string());
            }
        }
        fn push_term(out: &mut Vec<String>, term: &Term) {
            match term {
                Term::Var(name) => push(out, name),
                Term::XPath(xpath) => push(out, &xpath.base),
                Term::IntLiteral(_) | Term::StrLiteral(_) => {}
            }
        }
        match self {
            Formula::True | Formula::False => {}
            Formula::SmtAtom(expr) => {
                for name in expr.free_names() {
                    push(out, &name);
                }
            }
            Formula::StructuralPredicate(call) => {
                for arg in &call.args {
                    push_term(out, arg);
                }
            }
            Formula::SemanticPredicate(call) => {
                for arg in &call.args {
                    push_term(out, arg);
                }
            }
            Formula::Not(inner) => inner.collect_free(out),
            Formula::And(a, b)
            | Formula::Or(a, b)
            | Formula::Xor(a, b)
            | Formula::Implies(a, b)
            | Formula::Iff(a, b) => {
                a.collect_free(out);
                b.collect_free(out);
            }
            Formula::ForallTree { variable, in_var, body, .. }
            | Formula::ExistsTree { variable, in_var, body, .. } => {
                let mut inner = Vec::new();
                body.collect_free(&mut inner);
                inner.retain(|n| n != &variable.name);
                let fresh: Vec<_> = inner.into_iter().filter(|n| !out.contains(n)).collect();
                out.extend(fresh);
                if let Some(c) = in_var {
                    push(out, c);
                }
            }
            Formula::ForallInt { variable, body } | Formula::ExistsInt { variable, body } => {
                let mut inner = Vec::new();
                body.collect_free(&mut inner);
                inner.retain(|n| n != &variable.name);
                let fresh: Vec<_> = inner.into_iter().filter(|n| !out.contains(n)).collect();
                out.extend(fresh);
            }
        }
    }
}

/// The result of a completed parse: the formula plus the `const` declaration
/// that gives the top-level subject tree its name and sort (§4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFormula {
    pub const_decl: Variable,
    pub formula: Formula,
}

/// Name -> sort table built during well-formedness, handed to the evaluator
/// so it never has to re-derive a variable's sort from context.
pub type SortTable = BTreeMap<String, Sort>;

#[cfg(test)]
mod __tests__ {
    use super::*;

    #[test]
    fn free_variables_excludes_bound_quantifier_var() {
        let f = Formula::ForallTree {
            variable: Variable::new("e", Sort::Tree("var".into())),
            match_expr: None,
            in_var: Some("start".into()),
            body: Box::new(Formula::StructuralPredicate(StructuralPredicateCall {
                name: "before".into(),
                args: vec![Term::Var("e".into()), Term::Var("other".into())],
            })),
        };
        let mut fv = f.free_variables();
        fv.sort();
        assert_eq!(fv, vec!["other".to_string(), "start".to_string()]);
    }

    #[test]
    fn smt_expr_collects_free_names_once_each() {
        let expr = SmtExpr::Apply {
            op: "=".into(),
            args: vec![SmtExpr::VarRef("x".into()), SmtExpr::VarRef("x".into())],
        };
        assert_eq!(expr.free_names(), vec!["x".to_string()]);
    }

    #[test]
    fn and_or_not_helpers_build_expected_shape() {
        let f = Formula::True.and(Formula::False).or(Formula::True.not());
        assert!(matches!(f, Formula::Or(_, _)));
    }
}
