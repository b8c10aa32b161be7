//! The satisfaction evaluator (§3, §4.10, Design Notes §9).
//!
//! Checks a well-formed formula against a concrete derivation tree, in
//! strong Kleene logic throughout: an `Undef` sub-result is never silently
//! rounded to `Sat` or `Unsat`. Quantifiers enumerate candidate tree
//! positions and short-circuit the moment the outcome is already decided —
//! `forall` stops at the first `Unsat`, `exists` stops at the first `Sat`.

use crate::ast::{Formula, ParsedFormula, SmtExpr, Sort, SortTable, Term, Variable, XPathExpr, XPathSegment};
use crate::error::EvalError;
use crate::lexer::match_expr::{MatchElement, MatchExpr};
use crate::oracle::{OracleValue, SmtOracle};
use crate::predicate::structural::{evaluate_structural, Arg as StructuralArg};
use crate::predicate::semantic::SemanticRegistry;
use crate::tree::{Path, Tree};
use crate::util::Log;
use crate::verdict::Verdict;
use std::collections::BTreeMap;

/// Evaluation knobs the caller can set (§4.10).
pub struct EvalConfig {
    /// Whether `forall int` / `exists int` may be handed to the oracle as
    /// a quantified arithmetic assertion instead of being rejected outright
    /// (§4.10's documented int-quantifier special case). Off by default:
    /// without a real arithmetic-capable oracle this buys nothing, and
    /// silently reporting `Undef` is the honest answer.
    pub allow_int_rewrite: bool,
    pub trace: Log<&'static str>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self { allow_int_rewrite: false, trace: Log::None }
    }
}

/// What a bound variable currently holds: a tree position or an integer.
#[derive(Debug, Clone, PartialEq)]
enum Binding {
    Tree(Path),
    Int(i64),
}

/// The variable -> value map threaded through one recursive descent of the
/// formula (§3). Cloned per quantifier candidate rather than mutated in
/// place, since sibling candidates must not see each other's bindings.
#[derive(Debug, Clone, Default)]
struct Assignment {
    values: BTreeMap<String, Binding>,
}

impl Assignment {
    fn with(mut self, name: String, binding: Binding) -> Self {
        self.values.insert(name, binding);
        self
    }
}

/// Check `parsed.formula` against `tree`, given the sort table a prior
/// `wellformed::check` produced and the predicate/oracle dependencies the
/// formula's atoms need (§4.10, §5).
pub fn check(
    tree: &Tree,
    parsed: &ParsedFormula,
    sorts: &SortTable,
    semantic: &SemanticRegistry,
    oracle: &dyn SmtOracle,
    config: EvalConfig,
) -> Result<Verdict, EvalError> {
    for name in parsed.formula.free_variables() {
        if !sorts.contains_key(&name) && name != parsed.const_decl.name {
            return Err(EvalError::MissingBinding { name });
        }
    }
    let evaluator = Evaluator { tree, sorts, semantic, oracle, config };
    let assignment = Assignment::default().with(parsed.const_decl.name.clone(), Binding::Tree(Path::root()));
    evaluator.eval(&parsed.formula, &assignment)
}

struct Evaluator<'a> {
    tree: &'a Tree,
    sorts: &'a SortTable,
    semantic: &'a SemanticRegistry,
    oracle: &'a dyn SmtOracle,
    config: EvalConfig,
}

impl<'a> Evaluator<'a> {
    fn eval(&self, formula: &Formula, assignment: &Assignment) -> Result<Verdict, EvalError> {
        match formula {
            Formula::True => Ok(Verdict::Sat),
            Formula::False => Ok(Verdict::Unsat),
            Formula::Not(inner) => Ok(self.eval(inner, assignment)?.not()),
            Formula::And(a, b) => {
                let va = self.eval(a, assignment)?;
                if va.is_unsat() {
                    return Ok(Verdict::Unsat);
                }
                let vb = self.eval(b, assignment)?;
                Ok(va.and(vb))
            }
            Formula::Or(a, b) => {
                let va = self.eval(a, assignment)?;
                if va.is_sat() {
                    return Ok(Verdict::Sat);
                }
                let vb = self.eval(b, assignment)?;
                Ok(va.or(vb))
            }
            Formula::Xor(a, b) => {
                let va = self.eval(a, assignment)?;
                let vb = self.eval(b, assignment)?;
                Ok(va.iff(vb).not())
            }
            Formula::Implies(a, b) => {
                let va = self.eval(a, assignment)?;
                if va.is_unsat() {
                    return Ok(Verdict::Sat);
                }
                let vb = self.eval(b, assignment)?;
                Ok(va.implies(vb))
            }
            Formula::Iff(a, b) => {
                let va = self.eval(a, assignment)?;
                let vb = self.eval(b, assignment)?;
                Ok(va.iff(vb))
            }
            Formula::SmtAtom(expr) => self.eval_smt_atom(expr, assignment),
            Formula::StructuralPredicate(call) => self.eval_structural(&call.name, &call.args, assignment),
            Formula::SemanticPredicate(call) => self.eval_semantic(&call.name, &call.args, assignment),
            Formula::ForallTree { variable, match_expr, in_var, body } => {
                self.eval_tree_quantifier(variable, match_expr.as_ref(), in_var.as_deref(), body, assignment, true)
            }
            Formula::ExistsTree { variable, match_expr, in_var, body } => {
                self.eval_tree_quantifier(variable, match_expr.as_ref(), in_var.as_deref(), body, assignment, false)
            }
            Formula::ForallInt { variable, body } => self.eval_int_quantifier(variable, body, assignment, true),
            Formula::ExistsInt { variable, body } => self.eval_int_quantifier(variable, body, assignment, false),
        }
    }

    /// Enumerate candidate nodes of `variable`'s sort, in document order,
    /// optionally restricted to `in_var`'s subtree, and fold the body's
    /// verdict across them with short-circuiting (§4.10).
    #[allow(clippy::too_many_arguments)]
    fn eval_tree_quantifier(
        &self,
        variable: &Variable,
        match_expr: Option<&MatchExpr>,
        in_var: Option<&str>,
        body: &Formula,
        assignment: &Assignment,
        is_forall: bool,
    ) -> Result<Verdict, EvalError> {
        let nt = match &variable.sort {
            Sort::Tree(nt) => nt.clone(),
            Sort::Int => unreachable!("a tree quantifier always carries a tree sort"),
        };
        let scope_root = match in_var {
            Some(name) => self.resolve_path(name, assignment)?,
            None => Path::root(),
        };
        let candidates: Vec<Path> = self
            .tree
            .descendants_of_type(&nt)
            .into_iter()
            .map(|(p, _)| p)
            .filter(|p| in_var.is_none() || scope_root.is_prefix_of(p) || scope_root == *p)
            .collect();

        let mut saw_undef = false;
        for (probe_index, candidate) in candidates.iter().enumerate() {
            let mut extended = assignment.clone().with(variable.name.clone(), Binding::Tree(candidate.clone()));
            if let Some(m) = match_expr {
                if let Some(bindings) = bind_match_expr(self.tree, candidate, m) {
                    for (name, path) in bindings {
                        extended = extended.with(name, Binding::Tree(path));
                    }
                } else {
                    // The candidate's shape does not match the pattern at
                    // all: skip it rather than treat it as undecided.
                    continue;
                }
            }
            let verdict = self.eval(body, &extended)?;
            self.config.trace.trace_probe(&variable.name, probe_index, verdict);
            match (is_forall, verdict) {
                (true, Verdict::Unsat) => return Ok(Verdict::Unsat),
                (false, Verdict::Sat) => return Ok(Verdict::Sat),
                (_, Verdict::Undef) => saw_undef = true,
                _ => {}
            }
        }
        let result = if saw_undef { Verdict::Undef } else { Verdict::from_bool(is_forall) };
        self.config.trace.trace_done(&variable.name, result);
        Ok(result)
    }

    /// `forall int` / `exists int` cannot be enumerated — the domain is
    /// unbounded. With `allow_int_rewrite` off this is honestly `Undef`;
    /// with it on, the body is handed to the oracle as a single quantified
    /// arithmetic assertion, which only a real arithmetic-capable oracle
    /// implementation can actually decide (§4.10).
    fn eval_int_quantifier(
        &self,
        variable: &Variable,
        body: &Formula,
        assignment: &Assignment,
        is_forall: bool,
    ) -> Result<Verdict, EvalError> {
        if !self.config.allow_int_rewrite {
            return Ok(Verdict::Undef);
        }
        let inner = match body {
            Formula::SmtAtom(expr) => expr.clone(),
            _ => return Ok(Verdict::Undef),
        };
        let op = if is_forall { "forall-int" } else { "exists-int" };
        let wrapped = SmtExpr::Apply {
            op: op.to_string(),
            args: vec![SmtExpr::VarRef(variable.name.clone()), inner],
        };
        let bindings = match self.oracle_bindings(&wrapped, assignment) {
            Ok(b) => b,
            Err(UnresolvedXPath) => return Ok(Verdict::Undef),
        };
        Ok(self.oracle.check(&wrapped, &bindings))
    }

    fn eval_smt_atom(&self, expr: &SmtExpr, assignment: &Assignment) -> Result<Verdict, EvalError> {
        let bindings = match self.oracle_bindings(expr, assignment) {
            Ok(b) => b,
            Err(UnresolvedXPath) => return Ok(Verdict::Undef),
        };
        Ok(self.oracle.check(expr, &bindings))
    }

    /// Resolve every free name in `expr` to a concrete oracle value. Tree
    /// bindings substitute to their string yield; a dangling xpath
    /// reference (the tree just does not have that shape) is reported as
    /// `Undef` rather than an error, since it is a property of the
    /// concrete tree, not a malformed formula.
    fn oracle_bindings(
        &self,
        expr: &SmtExpr,
        assignment: &Assignment,
    ) -> Result<BTreeMap<String, OracleValue>, UnresolvedXPath> {
        let mut out = BTreeMap::new();
        self.collect_bindings(expr, assignment, &mut out)?;
        Ok(out)
    }

    fn collect_bindings(
        &self,
        expr: &SmtExpr,
        assignment: &Assignment,
        out: &mut BTreeMap<String, OracleValue>,
    ) -> Result<(), UnresolvedXPath> {
        match expr {
            SmtExpr::VarRef(name) => {
                if let Some(value) = self.binding_to_oracle_value(name, assignment) {
                    out.insert(name.clone(), value);
                }
                Ok(())
            }
            SmtExpr::XPathRef(xpath) => {
                let path = self.resolve_xpath(xpath, assignment).ok_or(UnresolvedXPath)?;
                // Keyed by the full rendered xpath, not just the base: two
                // distinct references sharing a base (`a.<open>`, `a.<close>`)
                // must not collide under one binding name.
                out.insert(xpath.to_string(), OracleValue::Str(self.yield_at(&path)));
                Ok(())
            }
            SmtExpr::IntLiteral(_) | SmtExpr::StrLiteral(_) | SmtExpr::BoolLiteral(_) => Ok(()),
            SmtExpr::Apply { args, .. } => {
                for arg in args {
                    self.collect_bindings(arg, assignment, out)?;
                }
                Ok(())
            }
        }
    }

    fn binding_to_oracle_value(&self, name: &str, assignment: &Assignment) -> Option<OracleValue> {
        match assignment.values.get(name)? {
            Binding::Tree(path) => Some(OracleValue::Str(self.yield_at(path))),
            Binding::Int(n) => Some(OracleValue::Int(*n)),
        }
    }

    fn yield_at(&self, path: &Path) -> String {
        match self.tree.subtree(path) {
            Some(subtree) => subtree.yield_str(),
            None => String::new(),
        }
    }

    fn eval_structural(&self, name: &str, args: &[Term], assignment: &Assignment) -> Result<Verdict, EvalError> {
        enum Owned {
            Path(Path),
            Int(i64),
            Str(String),
        }
        let mut owned = Vec::with_capacity(args.len());
        for term in args {
            match term {
                Term::IntLiteral(n) => owned.push(Owned::Int(*n)),
                Term::StrLiteral(s) => owned.push(Owned::Str(s.clone())),
                Term::Var(v) => match self.resolve_path(v, assignment) {
                    Ok(p) => owned.push(Owned::Path(p)),
                    Err(_) => return Ok(Verdict::Undef),
                },
                Term::XPath(xpath) => match self.resolve_xpath(xpath, assignment) {
                    Some(p) => owned.push(Owned::Path(p)),
                    None => return Ok(Verdict::Undef),
                },
            }
        }
        let resolved: Vec<StructuralArg> = owned
            .iter()
            .map(|o| match o {
                Owned::Path(p) => StructuralArg::Path(p),
                Owned::Int(n) => StructuralArg::Int(*n),
                Owned::Str(s) => StructuralArg::Str(s),
            })
            .collect();
        Ok(Verdict::from_bool(evaluate_structural(name, &resolved, self.tree)))
    }

    fn eval_semantic(&self, name: &str, args: &[Term], assignment: &Assignment) -> Result<Verdict, EvalError> {
        let predicate = match self.semantic.get(name) {
            Some(p) => p,
            None => return Ok(Verdict::Undef),
        };
        enum Owned {
            Path(Path),
            Int(i64),
            Str(String),
        }
        let mut owned = Vec::with_capacity(args.len());
        for term in args {
            match term {
                Term::IntLiteral(n) => owned.push(Owned::Int(*n)),
                Term::StrLiteral(s) => owned.push(Owned::Str(s.clone())),
                Term::Var(v) => match self.resolve_path(v, assignment) {
                    Ok(p) => owned.push(Owned::Path(p)),
                    Err(_) => return Ok(Verdict::Undef),
                },
                Term::XPath(xpath) => match self.resolve_xpath(xpath, assignment) {
                    Some(p) => owned.push(Owned::Path(p)),
                    None => return Ok(Verdict::Undef),
                },
            }
        }
        let resolved: Vec<StructuralArg> = owned
            .iter()
            .map(|o| match o {
                Owned::Path(p) => StructuralArg::Path(p),
                Owned::Int(n) => StructuralArg::Int(*n),
                Owned::Str(s) => StructuralArg::Str(s),
            })
            .collect();
        Ok(predicate.evaluate(&resolved, self.tree))
    }

    fn resolve_path(&self, name: &str, assignment: &Assignment) -> Result<Path, EvalError> {
        match assignment.values.get(name) {
            Some(Binding::Tree(path)) => Ok(path.clone()),
            Some(Binding::Int(_)) | None => Err(EvalError::MissingBinding { name: name.to_string() }),
        }
    }

    fn resolve_xpath(&self, xpath: &XPathExpr, assignment: &Assignment) -> Option<Path> {
        let mut current = match assignment.values.get(&xpath.base)? {
            Binding::Tree(path) => path.clone(),
            Binding::Int(_) => return None,
        };
        for segment in &xpath.segments {
            current = self.step(&current, segment)?;
        }
        Some(current)
    }

    fn step(&self, from: &Path, segment: &XPathSegment) -> Option<Path> {
        let node = self.tree.at(from)?;
        match segment {
            XPathSegment::Child { nonterminal, index } => {
                let matches: Vec<usize> = self
                    .tree
                    .children(node)
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| self.tree.label(**c).as_nonterminal() == Some(nonterminal.as_str()))
                    .map(|(i, _)| i)
                    .collect();
                let chosen = match index {
                    Some(k) if *k >= 1 => matches.get(k - 1).copied()?,
                    Some(_) => return None,
                    None if matches.len() == 1 => matches[0],
                    None => return None,
                };
                Some(from.child(chosen))
            }
            XPathSegment::Descendant { nonterminal } => self
                .tree
                .descendants_of_type(nonterminal)
                .into_iter()
                .map(|(p, _)| p)
                .find(|p| from.is_prefix_of(p)),
        }
    }
}

struct UnresolvedXPath;

/// Best-effort structural match of a match expression against a candidate
/// subtree's direct children, in order: each `{<T> name}` hole consumes the
/// next not-yet-consumed child labelled `T`; each literal `Text` segment
/// consumes one child without inspecting its content; `[optional]`
/// fragments are tried but never required. This is a syntactic shortcut,
/// not a general tree-pattern matcher — adequate for checking formulas
/// against concrete trees, which is this evaluator's whole job (§1
/// Non-goals exclude building trees from patterns).
fn bind_match_expr(tree: &Tree, candidate: &Path, m: &MatchExpr) -> Option<Vec<(String, Path)>> {
    let node = tree.at(candidate)?;
    let children = tree.children(node);
    let mut cursor = 0usize;
    let mut bindings = Vec::new();
    for element in &m.elements {
        match element {
            MatchElement::Text(_) => {
                if cursor < children.len() {
                    cursor += 1;
                }
            }
            MatchElement::Bind { nonterminal, name } => {
                let found = children[cursor..]
                    .iter()
                    .position(|c| tree.label(*c).as_nonterminal() == Some(nonterminal.as_str()))?;
                let index = cursor + found;
                bindings.push((name.clone(), candidate.child(index)));
                cursor = index + 1;
            }
            MatchElement::Optional(inner) => {
                let sub = MatchExpr { elements: inner.clone() };
                if let Some(mut extra) = bind_match_expr_from(tree, candidate, children, &mut cursor, &sub) {
                    bindings.append(&mut extra);
                }
            }
        }
    }
    Some(bindings)
}

fn bind_match_expr_from(
    tree: &Tree,
    candidate: &Path,
    children: &[crate::tree::NodeId],
    cursor: &mut usize,
    m: &MatchExpr,
) -> Option<Vec<(String, Path)>> {
    let mut bindings = Vec::new();
    for element in &m.elements {
        match element {
            MatchElement::Text(_) => {
                if *cursor < children.len() {
                    *cursor += 1;
                }
            }
            MatchElement::Bind { nonterminal, name } => {
                let found = children[*cursor..]
                    .iter()
                    .position(|c| tree.label(*c).as_nonterminal() == Some(nonterminal.as_str()))?;
                let index = *cursor + found;
                bindings.push((name.clone(), candidate.child(index)));
                *cursor = index + 1;
            }
            MatchElement::Optional(_) => {}
        }
    }
    Some(bindings)
}

#[cfg(test)]
mod __tests__ {
    use super::*;
    use crate::oracle::ReferenceOracle;
    use crate::parser::parse_formula;
    use crate::tree::TreeBuilder;
    use crate::wellformed;

    fn self_assignment_tree() -> Tree {
        let mut b = TreeBuilder::new();
        let lhs_a = b.terminal("a");
        let lhs = b.inner("var", vec![lhs_a]);
        let sep = b.terminal(" := ");
        let rhs_a = b.terminal("a");
        let rhs_var = b.inner("var", vec![rhs_a]);
        let rhs = b.inner("rhs", vec![rhs_var]);
        let assgn = b.inner("assgn", vec![lhs, sep, rhs]);
        b.inner("start", vec![assgn]);
        b.finish()
    }

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

    const ASSGN_GRAMMAR: &str = r#"
        <start> ::= <assgn> ;
        <assgn> ::= <var> " := " <rhs> ;
        <rhs> ::= <var> | <digit> ;
        <var> ::= "a" | "b" | "c" ;
        <digit> ::= "0" | "1" | "2" | "3" | "4" | "5" | "6" | "7" | "8" | "9" ;
    "#;

    fn run(tree: &Tree, formula_src: &str) -> Verdict {
        let grammar = crate::grammar::Grammar::parse(ASSGN_GRAMMAR, "start").unwrap();
        let parsed = parse_formula(formula_src, &[]).unwrap();
        let sorts = wellformed::check(&parsed, &grammar).unwrap();
        let semantic = SemanticRegistry::new();
        check(tree, &parsed, &sorts, &semantic, &ReferenceOracle, EvalConfig::default()).unwrap()
    }

    #[test]
    fn self_assignment_violates_distinct_sides_property() {
        let formula = r#"
            const start : <start> ;
            forall <assgn> a = "{<var> lhs} := {<rhs> rhs}" in start:
              not (lhs = rhs)
        "#;
        assert_eq!(run(&self_assignment_tree(), formula), Verdict::Unsat);
        assert_eq!(run(&digit_rhs_tree(), formula), Verdict::Sat);
    }

    #[test]
    fn different_position_never_coincides_with_same_position() {
        let formula = r#"
            const start : <start> ;
            forall <var> lhs in start:
              forall <var> rhs in start:
                different_position(lhs, rhs) implies not (same_position(lhs, rhs))
        "#;
        assert_eq!(run(&self_assignment_tree(), formula), Verdict::Sat);
    }

    #[test]
    fn smt_atom_digit_non_negative_is_sat() {
        let formula = r#"
            const start : <start> ;
            forall <digit> d in start: (>= (str.to.int d) 0)
        "#;
        assert_eq!(run(&digit_rhs_tree(), formula), Verdict::Sat);
    }

    #[test]
    fn forall_over_empty_candidate_set_is_vacuously_sat() {
        let formula = r#"
            const start : <start> ;
            forall <digit> d in start: (>= (str.to.int d) 100)
        "#;
        // self_assignment_tree has no <digit> nodes at all.
        assert_eq!(run(&self_assignment_tree(), formula), Verdict::Sat);
    }

    #[test]
    fn exists_finds_a_witness() {
        let formula = r#"
            const start : <start> ;
            exists <rhs> r in start: same_position(r, r)
        "#;
        assert_eq!(run(&digit_rhs_tree(), formula), Verdict::Sat);
    }

    #[test]
    fn match_expression_binds_direct_children() {
        let formula = r#"
            const start : <start> ;
            forall <assgn> a = "{<var> lhs} := {<rhs> rhs}" in start:
              different_position(lhs, rhs)
        "#;
        assert_eq!(run(&self_assignment_tree(), formula), Verdict::Sat);
    }

    #[test]
    fn smt_atom_distinguishes_two_xpaths_sharing_one_base() {
        // digit_rhs_tree: "a := 7" — a.<var> yields "a", a.<rhs> yields "7".
        // A stale implementation keying the oracle environment by xpath
        // base would bind both references to whichever yield was inserted
        // last and the atom would evaluate Sat unconditionally.
        let formula = r#"
            const start : <start> ;
            forall <assgn> a in start: a.<var> = a.<rhs>
        "#;
        assert_eq!(run(&digit_rhs_tree(), formula), Verdict::Unsat);
    }

    #[test]
    fn forall_int_without_rewrite_is_undef() {
        let formula = r#"
            const start : <start> ;
            forall int i : true
        "#;
        assert_eq!(run(&self_assignment_tree(), formula), Verdict::Undef);
    }
}
