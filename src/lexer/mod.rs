//! ISLa source lexer (§4.3) and the match-expression sub-language (§4.5).

pub mod match_expr;

use crate::error::LexError;
use crate::util::{Code, Position};
use once_cell::sync::Lazy;
use regex::Regex;

/// A single ISLa token, carrying its byte span for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    // Literals and identifiers
    Ident(String),
    NonterminalType(String),
    Int(i64),
    Str(String),
    // Reserved words
    Const,
    Forall,
    Exists,
    In,
    IntKw,
    Not,
    And,
    Or,
    Xor,
    Implies,
    Iff,
    True,
    False,
    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Semicolon,
    Dot,
    DotDot,
    Assign, // '=' used both for SMT-equality atoms and `v = "match expr"`
    // Operator symbols usable as infix (subset of §6's operator table)
    Ge,
    Le,
    Gt,
    Lt,
    // (Lt is produced only when `<...>` does not parse as a nonterminal type)
    Plus,
    Minus,
    Star,
    StrConcat, // str.++
    ReConcat,  // re.++
    StrLe,     // str.<=
    Eof,
}

/// Tokenise ISLa source, eliding comments (`#` to end of line) and
/// whitespace. Nonterminal types `<id>` are emitted whole (§4.3).
pub fn tokenize(code: &Code) -> Result<Vec<Token>, LexError> {
    let bytes = code.value.as_bytes();
    let mut pos = 0usize;
    let mut tokens = Vec::new();

    while pos < bytes.len() {
        let b = bytes[pos];
        if b.is_ascii_whitespace() {
            pos += 1;
            continue;
        }
        if b == b'#' {
            while pos < bytes.len() && bytes[pos] != b'\n' {
                pos += 1;
            }
            continue;
        }
        let start = pos;
        let rest = &code.value[pos..];
        let kind = if rest.starts_with("str.++") {
            pos += 6;
            TokenKind::StrConcat
        } else if rest.starts_with("str.<=") {
            pos += 6;
            TokenKind::StrLe
        } else if rest.starts_with("re.++") {
            pos += 5;
            TokenKind::ReConcat
        } else if let Some(name) = lex_dotted_op_name(rest) {
            pos += name.len();
            TokenKind::Ident(name.to_string())
        } else {
            match b {
            b'<' => lex_lt_or_nonterminal_type(code, &mut pos),
            b'"' => lex_string(code, &mut pos)?,
            b'(' => { pos += 1; TokenKind::LParen }
            b')' => { pos += 1; TokenKind::RParen }
            b'{' => { pos += 1; TokenKind::LBrace }
            b'}' => { pos += 1; TokenKind::RBrace }
            b'[' => { pos += 1; TokenKind::LBracket }
            b']' => { pos += 1; TokenKind::RBracket }
            b',' => { pos += 1; TokenKind::Comma }
            b':' => { pos += 1; TokenKind::Colon }
            b';' => { pos += 1; TokenKind::Semicolon }
            b'=' => {
                pos += 1;
                if bytes.get(pos) == Some(&b'>') {
                    pos += 1;
                    TokenKind::Implies
                } else {
                    TokenKind::Assign
                }
            }
            b'>' => {
                pos += 1;
                if bytes.get(pos) == Some(&b'=') {
                    pos += 1;
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            b'+' => { pos += 1; TokenKind::Plus }
            b'-' => { pos += 1; TokenKind::Minus }
            b'*' => { pos += 1; TokenKind::Star }
            b'.' => lex_dot_or_operator(code, &mut pos)?,
            _ if b.is_ascii_digit() => lex_int(code, &mut pos),
            _ if is_ident_start(b) => lex_ident_or_keyword(code, &mut pos),
            _ => {
                let ch = code.value[pos..].chars().next().unwrap();
                return Err(LexError::LexError { at: code.obtain_position(pos), found: ch });
            }
            }
        };
        tokens.push(Token { kind, start, end: pos });
    }
    tokens.push(Token { kind: TokenKind::Eof, start: pos, end: pos });
    Ok(tokens)
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Prefix/non-binary SMT operator names that contain a `.` or a symbol
/// character (§6): these can never be produced by the plain identifier
/// scanner (which stops at `.`), so they are matched as whole literals,
/// longest first, before falling back to punctuation/identifier lexing.
/// Binary infix operators with the same shape (`str.++`, `re.++`,
/// `str.<=`) are handled separately since the parser needs a dedicated
/// token kind for infix position.
static DOTTED_OP_NAMES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    let mut names = vec![
        "str.len", "str.in_re", "str.to_re", "str.at", "str.substr", "str.prefixof",
        "str.suffixof", "str.contains", "str.indexof", "str.replace_re_all", "str.replace_re",
        "str.replace_all", "str.replace", "str.is_digit", "str.to_code", "str.from_code",
        "str.to.int", "str.from_int", "re.none", "re.all", "re.allchar", "re.comp", "re.diff",
        "re.opt", "re.range", "re.loop", "re.+", "re.*",
    ];
    names.sort_by_key(|s| std::cmp::Reverse(s.len()));
    names
});

fn lex_dotted_op_name(rest: &str) -> Option<&'static str> {
    DOTTED_OP_NAMES.iter().find(|name| {
        rest.starts_with(**name)
            && match rest.as_bytes().get(name.len()) {
                None => true,
                Some(&c) => !(c.is_ascii_alphanumeric() || c == b'_'),
            }
    }).copied()
}

static NONTERMINAL_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<([A-Za-z0-9_-]+)>").unwrap());

/// `<` starts three different things depending on what follows: `<=`
/// (comparison), `<word>` (a nonterminal type), or a bare `<` (less-than).
/// Disambiguation is purely lexical — a nonterminal type never contains
/// whitespace or another bracket, per the names actually used in the
/// grammars this core targets.
fn lex_lt_or_nonterminal_type(code: &Code, pos: &mut usize) -> TokenKind {
    let rest = &code.value[*pos..];
    if rest.starts_with("<=") {
        *pos += 2;
        return TokenKind::Le;
    }
    if let Some(caps) = NONTERMINAL_NAME.captures(rest) {
        let whole = caps.get(0).unwrap().as_str();
        let name = caps.get(1).unwrap().as_str().to_string();
        *pos += whole.len();
        return TokenKind::NonterminalType(name);
    }
    *pos += 1;
    TokenKind::Lt
}

fn lex_string(code: &Code, pos: &mut usize) -> Result<TokenKind, LexError> {
    let bytes = code.value.as_bytes();
    let open_at = *pos;
    *pos += 1; // opening quote
    let mut out = String::new();
    loop {
        match bytes.get(*pos) {
            None => return Err(LexError::UnterminatedString { at: code.obtain_position(open_at) }),
            Some(b'"') => {
                *pos += 1;
                break;
            }
            Some(b'\\') => {
                *pos += 1;
                match bytes.get(*pos) {
                    Some(b'b') => out.push('\u{8}'),
                    Some(b't') => out.push('\t'),
                    Some(b'n') => out.push('\n'),
                    Some(b'r') => out.push('\r'),
                    Some(b'"') => out.push('"'),
                    Some(b'\\') => out.push('\\'),
                    _ => return Err(LexError::UnterminatedString { at: code.obtain_position(open_at) }),
                }
                *pos += 1;
            }
            Some(_) => {
                let ch = code.value[*pos..].chars().next().unwrap();
                out.push(ch);
                *pos += ch.len_utf8();
            }
        }
    }
    Ok(TokenKind::Str(out))
}

fn lex_int(code: &Code, pos: &mut usize) -> TokenKind {
    let bytes = code.value.as_bytes();
    let start = *pos;
    while *pos < bytes.len() && bytes[*pos].is_ascii_digit() {
        *pos += 1;
    }
    let text = &code.value[start..*pos];
    TokenKind::Int(text.parse().unwrap_or(0))
}

fn lex_dot_or_operator(code: &Code, pos: &mut usize) -> Result<TokenKind, LexError> {
    let rest = &code.value[*pos..];
    if rest.starts_with("..") {
        *pos += 2;
        return Ok(TokenKind::DotDot);
    }
    *pos += 1;
    Ok(TokenKind::Dot)
}

fn lex_ident_or_keyword(code: &Code, pos: &mut usize) -> TokenKind {
    let bytes = code.value.as_bytes();
    let start = *pos;
    *pos += 1;
    while *pos < bytes.len() && is_ident_continue(bytes[*pos]) {
        *pos += 1;
    }
    let text = &code.value[start..*pos];
    match text {
        "const" => TokenKind::Const,
        "forall" => TokenKind::Forall,
        "exists" => TokenKind::Exists,
        "in" => TokenKind::In,
        "int" => TokenKind::IntKw,
        "not" => TokenKind::Not,
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "xor" => TokenKind::Xor,
        "implies" => TokenKind::Implies,
        "iff" => TokenKind::Iff,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "div" => TokenKind::Ident("div".to_string()),
        "mod" => TokenKind::Ident("mod".to_string()),
        _ => TokenKind::Ident(text.to_string()),
    }
}

pub fn position_of(code: &Code, token: &Token) -> Position {
    code.obtain_position(token.start)
}

#[cfg(test)]
mod __tests__ {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let code = Code::new(src);
        tokenize(&code).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn tokenizes_reserved_words() {
        assert_eq!(
            kinds("forall exists in int not and or xor implies iff true false"),
            vec![
                TokenKind::Forall, TokenKind::Exists, TokenKind::In, TokenKind::IntKw,
                TokenKind::Not, TokenKind::And, TokenKind::Or, TokenKind::Xor,
                TokenKind::Implies, TokenKind::Iff, TokenKind::True, TokenKind::False,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn tokenizes_nonterminal_type_whole() {
        assert_eq!(kinds("<assgn>"), vec![TokenKind::NonterminalType("assgn".into()), TokenKind::Eof]);
    }

    #[test]
    fn distinguishes_le_from_nonterminal() {
        assert_eq!(kinds("<="), vec![TokenKind::Le, TokenKind::Eof]);
    }

    #[test]
    fn elides_comments_and_whitespace() {
        assert_eq!(kinds("  # a comment\n forall"), vec![TokenKind::Forall, TokenKind::Eof]);
    }

    #[test]
    fn string_escape_quote_is_single_quote_not_doubled() {
        assert_eq!(kinds(r#""a\"b""#), vec![TokenKind::Str("a\"b".into()), TokenKind::Eof]);
    }

    #[test]
    fn unterminated_string_errors() {
        let code = Code::new("\"abc");
        let err = tokenize(&code).unwrap_err();
        assert!(matches!(err, LexError::UnterminatedString { .. }));
    }

    #[test]
    fn tokenizes_smt_operator_words() {
        assert_eq!(
            kinds("str.++ re.++ str.<="),
            vec![TokenKind::StrConcat, TokenKind::ReConcat, TokenKind::StrLe, TokenKind::Eof]
        );
    }

    #[test]
    fn tokenizes_xpath_segments() {
        assert_eq!(kinds(". .."), vec![TokenKind::Dot, TokenKind::DotDot, TokenKind::Eof]);
    }

    #[test]
    fn tokenizes_xpath_expression_without_swallowing_dots() {
        assert_eq!(
            kinds("a1.<rhs>.<var>"),
            vec![
                TokenKind::Ident("a1".into()),
                TokenKind::Dot,
                TokenKind::NonterminalType("rhs".into()),
                TokenKind::Dot,
                TokenKind::NonterminalType("var".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn tokenizes_dotted_predicate_names_whole() {
        assert_eq!(
            kinds("str.to.int str.len str.from_int"),
            vec![
                TokenKind::Ident("str.to.int".into()),
                TokenKind::Ident("str.len".into()),
                TokenKind::Ident("str.from_int".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_error_reports_position() {
        let code = Code::new("forall @");
        let err = tokenize(&code).unwrap_err();
        match err {
            LexError::LexError { at, found } => {
                assert_eq!(found, '@');
                assert_eq!(at.line, 1);
            }
            _ => panic!("expected LexError"),
        }
    }
}
