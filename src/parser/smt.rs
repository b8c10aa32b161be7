//! The embedded SMT-LIB sub-language (§4.4, §6).
//!
//! ISLa formulas embed SMT-LIB atoms two ways: SMT-LIB's own prefix
//! s-expression notation `(op a b)`, and a more readable infix sugar
//! (`elem >= 0`, `x str.++ y`, `f(x)`). Both normalize into the same
//! [`SmtExpr`](crate::ast::SmtExpr) tree so the oracle and evaluator never
//! see surface syntax.

use crate::ast::{SmtExpr, XPathExpr, XPathSegment};
use crate::error::ParseError;
use crate::lexer::{Token, TokenKind};
use crate::util::Code;

pub struct SmtParser<'c> {
    code: &'c Code<'c>,
    tokens: &'c [Token],
    pos: usize,
}

impl<'c> SmtParser<'c> {
    pub fn new(code: &'c Code<'c>, tokens: &'c [Token], pos: usize) -> Self {
        Self { code, tokens, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

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

    /// Entry point: parse one full SMT expression at the current position,
    /// at the lowest precedence level (equality/comparison).
    pub fn parse(&mut self) -> Result<SmtExpr, ParseError> {
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<SmtExpr, ParseError> {
        let lhs = self.parse_additive()?;
        let op = match self.peek() {
            TokenKind::Assign => Some("="),
            TokenKind::Ge => Some(">="),
            TokenKind::Le => Some("<="),
            TokenKind::Gt => Some(">"),
            TokenKind::Lt => Some("<"),
            TokenKind::StrLe => Some("str.<="),
            _ => None,
        };
        match op {
            Some(op) => {
                self.advance();
                let rhs = self.parse_additive()?;
                Ok(SmtExpr::Apply { op: op.to_string(), args: vec![lhs, rhs] })
            }
            None => Ok(lhs),
        }
    }

    fn parse_additive(&mut self) -> Result<SmtExpr, ParseError> {
        let mut expr = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => Some("+"),
                TokenKind::Minus => Some("-"),
                TokenKind::StrConcat => Some("str.++"),
                TokenKind::ReConcat => Some("re.++"),
                _ => None,
            };
            match op {
                Some(op) => {
                    self.advance();
                    let rhs = self.parse_multiplicative()?;
                    expr = SmtExpr::Apply { op: op.to_string(), args: vec![expr, rhs] };
                }
                None => break,
            }
        }
        Ok(expr)
    }

    fn parse_multiplicative(&mut self) -> Result<SmtExpr, ParseError> {
        let mut expr = self.parse_unary()?;
        while matches!(self.peek(), TokenKind::Star) {
            self.advance();
            let rhs = self.parse_unary()?;
            expr = SmtExpr::Apply { op: "*".to_string(), args: vec![expr, rhs] };
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<SmtExpr, ParseError> {
        if matches!(self.peek(), TokenKind::Not) {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(SmtExpr::Apply { op: "not".to_string(), args: vec![inner] });
        }
        if matches!(self.peek(), TokenKind::Minus) {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(SmtExpr::Apply { op: "-".to_string(), args: vec![inner] });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<SmtExpr, ParseError> {
        match self.peek().clone() {
            TokenKind::Int(n) => {
                self.advance();
                Ok(SmtExpr::IntLiteral(n))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(SmtExpr::StrLiteral(s))
            }
            TokenKind::True => {
                self.advance();
                Ok(SmtExpr::BoolLiteral(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(SmtExpr::BoolLiteral(false))
            }
            TokenKind::LParen => self.parse_sexpr(),
            TokenKind::Ident(name) => {
                self.advance();
                if matches!(self.peek(), TokenKind::LParen) {
                    let args = self.parse_call_args()?;
                    Ok(SmtExpr::Apply { op: name, args })
                } else if matches!(self.peek(), TokenKind::Dot | TokenKind::DotDot) {
                    let xpath = self.parse_xpath_suffix(name)?;
                    Ok(SmtExpr::XPathRef(xpath))
                } else {
                    Ok(SmtExpr::VarRef(name))
                }
            }
            _ => Err(self.err("an SMT term (literal, variable, or parenthesized expression)")),
        }
    }

    /// An xpath navigation written directly inside an SMT atom, e.g.
    /// `elem.<rhs>.<var> = elem` (§3, §4.6(f)).
    fn parse_xpath_suffix(&mut self, base: String) -> Result<XPathExpr, ParseError> {
        let mut segments = Vec::new();
        loop {
            match self.peek().clone() {
                TokenKind::Dot => {
                    self.advance();
                    let nonterminal = self.expect_nonterminal_type()?;
                    let index = if matches!(self.peek(), TokenKind::LBracket) {
                        self.advance();
                        let idx = self.expect_int()?;
                        if !matches!(self.peek(), TokenKind::RBracket) {
                            return Err(self.err("']' closing xpath index"));
                        }
                        self.advance();
                        Some(idx as usize)
                    } else {
                        None
                    };
                    segments.push(XPathSegment::Child { nonterminal, index });
                }
                TokenKind::DotDot => {
                    self.advance();
                    let nonterminal = self.expect_nonterminal_type()?;
                    segments.push(XPathSegment::Descendant { nonterminal });
                }
                _ => break,
            }
        }
        Ok(XPathExpr { base, segments })
    }

    fn expect_nonterminal_type(&mut self) -> Result<String, ParseError> {
        match self.peek().clone() {
            TokenKind::NonterminalType(nt) => {
                self.advance();
                Ok(nt)
            }
            _ => Err(self.err("a nonterminal type after '.' in an xpath expression")),
        }
    }

    fn expect_int(&mut self) -> Result<i64, ParseError> {
        match self.peek().clone() {
            TokenKind::Int(n) => {
                self.advance();
                Ok(n)
            }
            _ => Err(self.err("an integer index")),
        }
    }

    /// `op(arg, arg, ...)` function-call sugar.
    fn parse_call_args(&mut self) -> Result<Vec<SmtExpr>, ParseError> {
        self.advance(); // '('
        let mut args = Vec::new();
        if !matches!(self.peek(), TokenKind::RParen) {
            loop {
                args.push(self.parse()?);
                if matches!(self.peek(), TokenKind::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        if !matches!(self.peek(), TokenKind::RParen) {
            return Err(self.err("')' closing argument list"));
        }
        self.advance();
        Ok(args)
    }

    /// SMT-LIB prefix s-expression `(op arg arg ...)`, the oracle's native
    /// notation (§6). A lone parenthesized term `(expr)` is also accepted as
    /// pure grouping when it carries no operator of its own.
    fn parse_sexpr(&mut self) -> Result<SmtExpr, ParseError> {
        self.advance(); // '('
        let op = match self.peek().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                name
            }
            TokenKind::Plus => { self.advance(); "+".to_string() }
            TokenKind::Minus => { self.advance(); "-".to_string() }
            TokenKind::Star => { self.advance(); "*".to_string() }
            TokenKind::Assign => { self.advance(); "=".to_string() }
            TokenKind::Ge => { self.advance(); ">=".to_string() }
            TokenKind::Le => { self.advance(); "<=".to_string() }
            TokenKind::Gt => { self.advance(); ">".to_string() }
            TokenKind::Lt => { self.advance(); "<".to_string() }
            TokenKind::And => { self.advance(); "and".to_string() }
            TokenKind::Or => { self.advance(); "or".to_string() }
            TokenKind::Not => { self.advance(); "not".to_string() }
            TokenKind::StrConcat => { self.advance(); "str.++".to_string() }
            TokenKind::ReConcat => { self.advance(); "re.++".to_string() }
            TokenKind::StrLe => { self.advance(); "str.<=".to_string() }
            TokenKind::LParen => {
                // A parenthesized sub-expression in operator position: this
                // is pure grouping, `((...))`, not an application.
                let inner = self.parse_sexpr()?;
                if !matches!(self.peek(), TokenKind::RParen) {
                    return Err(self.err("')' closing parenthesized term"));
                }
                self.advance();
                return Ok(inner);
            }
            _ => return Err(self.err("an operator symbol")),
        };
        let mut args = Vec::new();
        while !matches!(self.peek(), TokenKind::RParen | TokenKind::Eof) {
            args.push(self.parse()?);
        }
        if !matches!(self.peek(), TokenKind::RParen) {
            return Err(self.err("')' closing s-expression"));
        }
        self.advance();
        if args.is_empty() {
            // `(x)` with `x` a bare identifier parsed as op: a grouped
            // variable reference, not an application.
            return Ok(SmtExpr::VarRef(op));
        }
        Ok(SmtExpr::Apply { op, args })
    }
}

#[cfg(test)]
mod __tests__ {
    use super::*;
    use crate::lexer::tokenize;

    fn parse(src: &str) -> SmtExpr {
        let code = Code::new(src);
        let tokens = tokenize(&code).unwrap();
        let mut parser = SmtParser::new(&code, &tokens, 0);
        parser.parse().unwrap()
    }

    #[test]
    fn parses_infix_comparison() {
        let expr = parse("elem >= 0");
        assert_eq!(
            expr,
            SmtExpr::Apply {
                op: ">=".into(),
                args: vec![SmtExpr::VarRef("elem".into()), SmtExpr::IntLiteral(0)]
            }
        );
    }

    #[test]
    fn parses_prefix_sexpr_equality() {
        let expr = parse("(= elem 0)");
        assert_eq!(
            expr,
            SmtExpr::Apply {
                op: "=".into(),
                args: vec![SmtExpr::VarRef("elem".into()), SmtExpr::IntLiteral(0)]
            }
        );
    }

    #[test]
    fn parses_dotted_function_call_sugar() {
        let expr = parse("str.to.int(elem) >= 0");
        assert_eq!(
            expr,
            SmtExpr::Apply {
                op: ">=".into(),
                args: vec![
                    SmtExpr::Apply { op: "str.to.int".into(), args: vec![SmtExpr::VarRef("elem".into())] },
                    SmtExpr::IntLiteral(0)
                ]
            }
        );
    }

    #[test]
    fn parses_nested_prefix_and_not() {
        let expr = parse("(and (>= x 0) (not (= y 0)))");
        assert_eq!(
            expr,
            SmtExpr::Apply {
                op: "and".into(),
                args: vec![
                    SmtExpr::Apply { op: ">=".into(), args: vec![SmtExpr::VarRef("x".into()), SmtExpr::IntLiteral(0)] },
                    SmtExpr::Apply {
                        op: "not".into(),
                        args: vec![SmtExpr::Apply {
                            op: "=".into(),
                            args: vec![SmtExpr::VarRef("y".into()), SmtExpr::IntLiteral(0)]
                        }]
                    },
                ]
            }
        );
    }
}
