//! The match-expression sub-language (§3, §4.5).
//!
//! A match expression is its own tiny grammar nested inside a quantifier's
//! `= "..."` clause. It is tokenised by a three-mode sub-lexer — `Default`,
//! `VarDecl` (between `{` and `}`), `Optional` (between `[` and `]`) — the
//! same structural idea as the teacher's state-indexed `CombinedTokenizer`,
//! generalized from lexical *states* to match-expression *modes*.

use crate::error::ParseError;
use crate::util::Code;

/// One element of a parsed match expression (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchElement {
    /// Literal terminal material that must appear verbatim.
    Text(String),
    /// `{<T> name}` — a hole of nonterminal type `T` bound to `name`.
    Bind { nonterminal: String, name: String },
    /// `[...]` — a sub-pattern present only optionally.
    Optional(Vec<MatchElement>),
}

/// A fully parsed match expression: an ordered sequence of elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchExpr {
    pub elements: Vec<MatchElement>,
}

impl MatchExpr {
    /// All `{<T> name}` bindings introduced anywhere in this match
    /// expression, including inside `[optional]` fragments, in left-to-right
    /// order.
    pub fn bindings(&self) -> Vec<(&str, &str)> {
        fn collect<'a>(elements: &'a [MatchElement], out: &mut Vec<(&'a str, &'a str)>) {
            for el in elements {
                match el {
                    MatchElement::Bind { nonterminal, name } => out.push((nonterminal, name)),
                    MatchElement::Optional(inner) => collect(inner, out),
                    MatchElement::Text(_) => {}
                }
            }
        }
        let mut out = Vec::new();
        collect(&self.elements, &mut out);
        out
    }
}

struct Reader<'c> {
    code: &'c Code<'c>,
    bytes: &'c [u8],
    pos: usize,
    seen_names: Vec<String>,
}

impl<'c> Reader<'c> {
    fn err(&self, message: &str) -> ParseError {
        ParseError::ParseError { at: self.code.obtain_position(self.pos), expected: message.to_string() }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    /// Parse a sequence of elements until `stop_at` (one of `}` handled by
    /// the caller, `]`, or end of input for the top level).
    fn parse_elements(&mut self, terminator: Option<u8>) -> Result<Vec<MatchElement>, ParseError> {
        let mut elements = Vec::new();
        let mut text = String::new();
        loop {
            match self.peek() {
                None => {
                    if terminator.is_some() {
                        return Err(self.err("closing bracket for match expression"));
                    }
                    break;
                }
                Some(b) if Some(b) == terminator => break,
                Some(b'{') => {
                    flush_text(&mut text, &mut elements);
                    elements.push(self.parse_bind()?);
                }
                Some(b'[') => {
                    flush_text(&mut text, &mut elements);
                    elements.push(self.parse_optional()?);
                }
                Some(b'\n') | Some(b'\r') => {
                    // Newlines in default-mode text are stripped (§4.5).
                    self.pos += 1;
                }
                Some(_) => {
                    let ch = self.code.value[self.pos..].chars().next().unwrap();
                    text.push(ch);
                    self.pos += ch.len_utf8();
                }
            }
        }
        flush_text(&mut text, &mut elements);
        Ok(elements)
    }

    fn parse_bind(&mut self) -> Result<MatchElement, ParseError> {
        self.pos += 1; // consume '{'
        self.skip_ws();
        if self.peek() != Some(b'<') {
            return Err(self.err("nonterminal type after '{'"));
        }
        self.pos += 1;
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == b'>' {
                break;
            }
            self.pos += 1;
        }
        if self.at_end() {
            return Err(self.err("'>' closing nonterminal type"));
        }
        let nonterminal = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap().to_string();
        self.pos += 1; // '>'
        self.skip_ws();
        let name_start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphanumeric() || b == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == name_start {
            return Err(self.err("variable name after nonterminal type"));
        }
        let name = std::str::from_utf8(&self.bytes[name_start..self.pos]).unwrap().to_string();
        self.skip_ws();
        if self.peek() != Some(b'}') {
            return Err(self.err("'}' closing bind slot"));
        }
        self.pos += 1;
        if self.seen_names.contains(&name) {
            return Err(self.err(&format!("duplicate or shadowing bind name '{}'", name)));
        }
        self.seen_names.push(name.clone());
        Ok(MatchElement::Bind { nonterminal, name })
    }

    fn parse_optional(&mut self) -> Result<MatchElement, ParseError> {
        self.pos += 1; // consume '['
        let inner = self.parse_elements(Some(b']'))?;
        self.pos += 1; // consume ']'
        Ok(MatchElement::Optional(inner))
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }
}

fn flush_text(text: &mut String, elements: &mut Vec<MatchElement>) {
    if !text.is_empty() {
        elements.push(MatchElement::Text(std::mem::take(text)));
    }
}

/// Parse the contents of a `Q <T> v = "..."` match-expression string. `names`
/// outer-scope binder names already in use, so that `{<T> v}` is rejected if
/// it shadows an enclosing quantifier's variable (§4.5 invariant).
pub fn parse_match_expr(text: &str, outer_names: &[String]) -> Result<MatchExpr, ParseError> {
    let code = Code::new(text);
    let mut reader = Reader { code: &code, bytes: code.value.as_bytes(), pos: 0, seen_names: outer_names.to_vec() };
    let outer_count = outer_names.len();
    let elements = reader.parse_elements(None)?;
    // Only report names introduced *within* this match expression, not the
    // pre-seeded outer ones, as the match expression's own bindings.
    let _ = outer_count;
    Ok(MatchExpr { elements })
}

#[cfg(test)]
mod __tests__ {
    use super::*;

    #[test]
    fn parses_text_and_binds() {
        let m = parse_match_expr("{<var> lhs} := {<rhs> rhs}", &[]).unwrap();
        assert_eq!(
            m.elements,
            vec![
                MatchElement::Bind { nonterminal: "var".into(), name: "lhs".into() },
                MatchElement::Text(" := ".into()),
                MatchElement::Bind { nonterminal: "rhs".into(), name: "rhs".into() },
            ]
        );
    }

    #[test]
    fn bindings_collects_nested_optional() {
        let m = parse_match_expr("{<var> x}[{<digit> d}]", &[]).unwrap();
        assert_eq!(m.bindings(), vec![("var", "x"), ("digit", "d")]);
    }

    #[test]
    fn rejects_duplicate_bind_name() {
        let err = parse_match_expr("{<var> x} {<digit> x}", &[]).unwrap_err();
        assert!(matches!(err, ParseError::ParseError { .. }));
    }

    #[test]
    fn rejects_shadowing_outer_binder() {
        let err = parse_match_expr("{<var> outer}", &["outer".to_string()]).unwrap_err();
        assert!(matches!(err, ParseError::ParseError { .. }));
    }

    #[test]
    fn strips_newlines_in_default_mode() {
        let m = parse_match_expr("a\nb", &[]).unwrap();
        assert_eq!(m.elements, vec![MatchElement::Text("ab".into())]);
    }

    #[test]
    fn unterminated_optional_errors() {
        let err = parse_match_expr("[{<var> x}", &[]).unwrap_err();
        assert!(matches!(err, ParseError::ParseError { .. }));
    }
}
