//! The formula parser (§3, §4.4, §6).
//!
//! A hand-written precedence-climbing recursive descent, same as the
//! grammar reader: ISLa's formula language is fixed, not user-extensible, so
//! there is no value in a combinator/packrat framework here — a direct
//! descent is both simpler and faster. Precedence, loosest to tightest:
//! `iff -> implies -> xor -> or -> and -> not -> quantifiers/atoms`.

pub mod smt;

use crate::ast::{
    Formula, ParsedFormula, SemanticPredicateCall, Sort, StructuralPredicateCall, Term, Variable,
    XPathExpr, XPathSegment,
};
use crate::error::ParseError;
use crate::lexer::match_expr::{parse_match_expr, MatchExpr};
use crate::lexer::{tokenize, Token, TokenKind};
use crate::util::Code;
use smt::SmtParser;

/// The fixed library of structural predicates (§4.7), by name and arity.
/// `nth(k, elem, container)` takes a leading integer-literal argument rather
/// than two tree variables; `level(kind, nonterminal, elem, reference)`
/// takes two leading string-literal arguments.
const STRUCTURAL_PREDICATES: &[(&str, usize)] = &[
    ("before", 2),
    ("after", 2),
    ("same_position", 2),
    ("different_position", 2),
    ("direct_child", 2),
    ("inside", 2),
    ("nth", 3),
    ("level", 4),
];

pub fn parse_formula(
    text: &str,
    known_semantic_predicates: &[(&str, usize)],
) -> Result<ParsedFormula, ParseError> {
    let code = Code::new(text);
    let tokens = tokenize(&code)?;
    let mut parser = Parser { code: &code, tokens: &tokens, pos: 0, semantic: known_semantic_predicates };
    let const_decl = parser.parse_const_decl()?;
    let formula = parser.parse_iff()?;
    parser.expect_eof()?;
    Ok(ParsedFormula { const_decl, formula })
}

struct Parser<'c> {
    code: &'c Code<'c>,
    tokens: &'c [Token],
    pos: usize,
    semantic: &'c [(&'c str, usize)],
}

impl<'c> Parser<'c> {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn err(&self, expected: &str) -> ParseError {
        ParseError::ParseError {
            at: self.code.obtain_position(self.tokens[self.pos].start),
            expected: expected.to_string(),
        }
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.tokens[self.pos].kind.clone();
        if !matches!(kind, TokenKind::Eof) {
            self.pos += 1;
        }
        kind
    }

    fn expect(&mut self, expected: TokenKind, what: &str) -> Result<(), ParseError> {
        if *self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.err(what))
        }
    }

    fn expect_eof(&self) -> Result<(), ParseError> {
        if matches!(self.peek(), TokenKind::Eof) {
            Ok(())
        } else {
            Err(self.err("end of input"))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, ParseError> {
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.err(what)),
        }
    }

    fn expect_nonterminal_type(&mut self, what: &str) -> Result<String, ParseError> {
        match self.peek().clone() {
            TokenKind::NonterminalType(nt) => {
                self.advance();
                Ok(nt)
            }
            _ => Err(self.err(what)),
        }
    }

    /// `const name : <T> ;` (§4.4) — names the tree the formula is checked
    /// against.
    fn parse_const_decl(&mut self) -> Result<Variable, ParseError> {
        self.expect(TokenKind::Const, "'const'")?;
        let name = self.expect_ident("the constant's name")?;
        self.expect(TokenKind::Colon, "':'")?;
        let nt = self.expect_nonterminal_type("a nonterminal type")?;
        self.expect(TokenKind::Semicolon, "';'")?;
        Ok(Variable::new(name, Sort::Tree(nt)))
    }

    fn parse_iff(&mut self) -> Result<Formula, ParseError> {
        let mut lhs = self.parse_implies()?;
        while matches!(self.peek(), TokenKind::Iff) {
            self.advance();
            let rhs = self.parse_implies()?;
            lhs = Formula::Iff(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_implies(&mut self) -> Result<Formula, ParseError> {
        let mut lhs = self.parse_xor()?;
        while matches!(self.peek(), TokenKind::Implies) {
            self.advance();
            let rhs = self.parse_xor()?;
            lhs = Formula::Implies(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_xor(&mut self) -> Result<Formula, ParseError> {
        let mut lhs = self.parse_or()?;
        while matches!(self.peek(), TokenKind::Xor) {
            self.advance();
            let rhs = self.parse_or()?;
            lhs = Formula::Xor(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> Result<Formula, ParseError> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), TokenKind::Or) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Formula::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Formula, ParseError> {
        let mut lhs = self.parse_not()?;
        while matches!(self.peek(), TokenKind::And) {
            self.advance();
            let rhs = self.parse_not()?;
            lhs = Formula::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Formula, ParseError> {
        if matches!(self.peek(), TokenKind::Not) {
            self.advance();
            let inner = self.parse_not()?;
            return Ok(Formula::Not(Box::new(inner)));
        }
        self.parse_unit()
    }

    fn parse_unit(&mut self) -> Result<Formula, ParseError> {
        match self.peek().clone() {
            TokenKind::Forall => self.parse_quantifier(true),
            TokenKind::Exists => self.parse_quantifier(false),
            TokenKind::True => {
                self.advance();
                Ok(Formula::True)
            }
            TokenKind::False => {
                self.advance();
                Ok(Formula::False)
            }
            TokenKind::LParen => {
                // Parenthesized boolean grouping of a full formula, e.g.
                // `(a and b) or c`. Tried first; if what follows is not a
                // formula (e.g. a bare SMT s-expression), fall back to
                // parsing the whole unit as an SMT atom instead.
                let checkpoint = self.pos;
                self.advance();
                if let Ok(inner) = self.parse_iff() {
                    if matches!(self.peek(), TokenKind::RParen) {
                        self.advance();
                        return Ok(inner);
                    }
                }
                self.pos = checkpoint;
                self.parse_smt_atom()
            }
            TokenKind::Ident(name) => {
                if is_known_predicate(&name, self.semantic) {
                    self.parse_predicate_call(name)
                } else {
                    self.parse_smt_atom()
                }
            }
            _ => self.parse_smt_atom(),
        }
    }

    fn parse_smt_atom(&mut self) -> Result<Formula, ParseError> {
        let mut smt = SmtParser::new(self.code, self.tokens, self.pos);
        let expr = smt.parse()?;
        self.pos = smt.position();
        Ok(Formula::SmtAtom(expr))
    }

    /// `forall/exists <T> v [= match-expr] [in c] : body` or `forall/exists
    /// int i : body` (§3, §4.4).
    fn parse_quantifier(&mut self, is_forall: bool) -> Result<Formula, ParseError> {
        self.advance(); // 'forall' | 'exists'
        if matches!(self.peek(), TokenKind::IntKw) {
            self.advance();
            let name = self.expect_ident("the bound integer variable's name")?;
            self.expect(TokenKind::Colon, "':'")?;
            let body = self.parse_iff()?;
            let variable = Variable::new(name, Sort::Int);
            return Ok(if is_forall {
                Formula::ForallInt { variable, body: Box::new(body) }
            } else {
                Formula::ExistsInt { variable, body: Box::new(body) }
            });
        }

        let nt = self.expect_nonterminal_type("a nonterminal type or 'int'")?;
        let name = self.expect_ident("the bound variable's name")?;

        let match_expr: Option<MatchExpr> = if matches!(self.peek(), TokenKind::Assign) {
            self.advance();
            let text = match self.peek().clone() {
                TokenKind::Str(s) => {
                    self.advance();
                    s
                }
                _ => return Err(self.err("a match-expression string after '='")),
            };
            Some(parse_match_expr(&text, &[name.clone()])?)
        } else {
            None
        };

        let in_var = if matches!(self.peek(), TokenKind::In) {
            self.advance();
            Some(self.expect_ident("the container variable's name")?)
        } else {
            None
        };

        self.expect(TokenKind::Colon, "':'")?;
        let body = self.parse_iff()?;
        let variable = Variable::new(name, Sort::Tree(nt));
        Ok(if is_forall {
            Formula::ForallTree { variable, match_expr, in_var, body: Box::new(body) }
        } else {
            Formula::ExistsTree { variable, match_expr, in_var, body: Box::new(body) }
        })
    }

    /// `name(arg, arg, ...)` where `name` is a known structural or semantic
    /// predicate (§4.7, §4.8).
    fn parse_predicate_call(&mut self, name: String) -> Result<Formula, ParseError> {
        let at = self.code.obtain_position(self.tokens[self.pos].start);
        self.advance();
        self.expect(TokenKind::LParen, "'(' opening the predicate's arguments")?;
        let mut args = Vec::new();
        if !matches!(self.peek(), TokenKind::RParen) {
            loop {
                args.push(self.parse_term()?);
                if matches!(self.peek(), TokenKind::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RParen, "')' closing the predicate's arguments")?;

        if let Some((_, expected)) = STRUCTURAL_PREDICATES.iter().find(|(n, _)| *n == name) {
            if *expected != args.len() {
                return Err(ParseError::ArityMismatch { at, name, expected: *expected, found: args.len() });
            }
            return Ok(Formula::StructuralPredicate(StructuralPredicateCall { name, args }));
        }
        if let Some((_, expected)) = self.semantic.iter().find(|(n, _)| *n == name) {
            if *expected != args.len() {
                return Err(ParseError::ArityMismatch { at, name, expected: *expected, found: args.len() });
            }
            return Ok(Formula::SemanticPredicate(SemanticPredicateCall { name, args }));
        }
        Err(ParseError::UnknownPredicate { at, name })
    }

    fn parse_term(&mut self) -> Result<Term, ParseError> {
        match self.peek().clone() {
            TokenKind::Int(n) => {
                self.advance();
                Ok(Term::IntLiteral(n))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Term::StrLiteral(s))
            }
            TokenKind::Ident(name) => {
                self.advance();
                if matches!(self.peek(), TokenKind::Dot | TokenKind::DotDot) {
                    Ok(Term::XPath(self.parse_xpath_suffix(name)?))
                } else {
                    Ok(Term::Var(name))
                }
            }
            _ => Err(self.err("a variable, xpath expression, string, or integer literal")),
        }
    }

    fn parse_xpath_suffix(&mut self, base: String) -> Result<XPathExpr, ParseError> {
        let mut segments = Vec::new();
        loop {
            match self.peek().clone() {
                TokenKind::Dot => {
                    self.advance();
                    let nonterminal = self.expect_nonterminal_type("a nonterminal type after '.'")?;
                    let index = if matches!(self.peek(), TokenKind::LBracket) {
                        self.advance();
                        let idx = match self.peek().clone() {
                            TokenKind::Int(n) => {
                                self.advance();
                                n as usize
                            }
                            _ => return Err(self.err("an integer index")),
                        };
                        self.expect(TokenKind::RBracket, "']' closing xpath index")?;
                        Some(idx)
                    } else {
                        None
                    };
                    segments.push(XPathSegment::Child { nonterminal, index });
                }
                TokenKind::DotDot => {
                    self.advance();
                    let nonterminal = self.expect_nonterminal_type("a nonterminal type after '..'")?;
                    segments.push(XPathSegment::Descendant { nonterminal });
                }
                _ => break,
            }
        }
        Ok(XPathExpr { base, segments })
    }
}

fn is_known_predicate(name: &str, semantic: &[(&str, usize)]) -> bool {
    STRUCTURAL_PREDICATES.iter().any(|(n, _)| *n == name) || semantic.iter().any(|(n, _)| *n == name)
}

#[cfg(test)]
mod __tests__ {
    use super::*;

    const ASSGN_USE_AFTER_DEF: &str = r#"
        const start : <start> ;
        forall <assgn> assgn1 in start:
          exists <assgn> assgn2 in start:
            before(assgn2, assgn1) and
            same_position(assgn1.<var>, assgn2.<var>)
    "#;

    #[test]
    fn parses_const_decl_and_nested_quantifiers() {
        let parsed = parse_formula(ASSGN_USE_AFTER_DEF, &[]).unwrap();
        assert_eq!(parsed.const_decl.name, "start");
        assert!(matches!(parsed.formula, Formula::ForallTree { .. }));
    }

    #[test]
    fn parses_smt_atom_comparison() {
        let parsed = parse_formula(
            r#"const start : <start> ; forall <digit> d in start: (>= (str.to.int d) 0)"#,
            &[],
        )
        .unwrap();
        match parsed.formula {
            Formula::ForallTree { body, .. } => assert!(matches!(*body, Formula::SmtAtom(_))),
            _ => panic!("expected forall"),
        }
    }

    #[test]
    fn rejects_unknown_predicate() {
        let err = parse_formula(r#"const start : <start> ; frobnicate(start)"#, &[]).unwrap_err();
        assert!(matches!(err, ParseError::UnknownPredicate { .. }));
    }

    #[test]
    fn rejects_structural_predicate_arity_mismatch() {
        let err = parse_formula(r#"const start : <start> ; before(start)"#, &[]).unwrap_err();
        assert!(matches!(err, ParseError::ArityMismatch { .. }));
    }

    #[test]
    fn accepts_registered_semantic_predicate() {
        let parsed = parse_formula(
            r#"const start : <start> ; count(start, "<digit>", 3)"#,
            &[("count", 3)],
        )
        .unwrap();
        assert!(matches!(parsed.formula, Formula::SemanticPredicate(_)));
    }

    #[test]
    fn parses_match_expression_with_bind() {
        let parsed = parse_formula(
            r#"const start : <start> ; forall <assgn> a = "{<var> lhs} := {<var> rhs}" in start: true"#,
            &[],
        )
        .unwrap();
        match parsed.formula {
            Formula::ForallTree { match_expr: Some(m), .. } => assert_eq!(m.bindings().len(), 2),
            _ => panic!("expected match expression"),
        }
    }

    #[test]
    fn connective_precedence_and_binds_tighter_than_or() {
        let parsed =
            parse_formula(r#"const start : <start> ; true or false and true"#, &[]).unwrap();
        match parsed.formula {
            Formula::Or(_, rhs) => assert!(matches!(*rhs, Formula::And(_, _))),
            _ => panic!("expected top-level or"),
        }
    }
}
