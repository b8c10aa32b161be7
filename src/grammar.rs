//! BNF reference grammars (§3, §4.1, §6).
//!
//! A [`Grammar`] is a finite mapping from nonterminal names to an ordered
//! list of alternatives. Parsing is a small hand-written recursive descent
//! over `util::Code`, the same position-tracking wrapper the ISLa lexer
//! uses, so grammar and formula diagnostics share one style of location.

use crate::error::GrammarError;
use crate::util::Code;
use std::collections::BTreeMap;

/// One element of an alternative: either a literal terminal or a reference
/// to another nonterminal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Symbol {
    Terminal(String),
    Nonterminal(String),
}

impl Symbol {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Symbol::Terminal(_))
    }

    pub fn as_nonterminal(&self) -> Option<&str> {
        match self {
            Symbol::Nonterminal(name) => Some(name),
            Symbol::Terminal(_) => None,
        }
    }
}

/// An ordered concatenation of symbols; one right-hand side of a rule.
pub type Alternative = Vec<Symbol>;

/// A finite BNF grammar: nonterminal name (without brackets) -> alternatives,
/// in declaration order, plus the declared start symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grammar {
    rules: BTreeMap<String, Vec<Alternative>>,
    order: Vec<String>,
    start: String,
}

impl Grammar {
    /// Parse BNF text of the form described in §6. `start` names the start
    /// symbol without angle brackets; pass `"start"` to use the conventional
    /// `<start>`.
    pub fn parse(text: &str, start: &str) -> Result<Grammar, GrammarError> {
        let code = Code::new(text);
        let mut rules: BTreeMap<String, Vec<Alternative>> = BTreeMap::new();
        let mut order: Vec<String> = Vec::new();
        let mut reader = GrammarReader::new(&code);
        let mut references: Vec<(String, crate::util::Position)> = Vec::new();

        reader.skip_trivia();
        while !reader.at_end() {
            let (name, alts) = reader.parse_rule()?;
            if !rules.contains_key(&name) {
                order.push(name.clone());
            }
            rules.entry(name).or_default().extend(alts);
            references.append(&mut reader.references);
            reader.skip_trivia();
        }

        if rules.is_empty() {
            return Err(GrammarError::EmptyGrammar);
        }
        if !rules.contains_key(start) {
            return Err(GrammarError::StartNotDefined { name: format!("<{}>", start) });
        }
        for (name, used_at) in references {
            if !rules.contains_key(&name) {
                return Err(GrammarError::UndefinedNonterminal { name: format!("<{}>", name), used_at });
            }
        }

        Ok(Grammar { rules, order, start: start.to_string() })
    }

    pub fn start_symbol(&self) -> &str {
        &self.start
    }

    /// All declared nonterminals, in first-declaration order.
    pub fn nonterminals(&self) -> &[String] {
        &self.order
    }

    /// The alternatives for `name`, or `None` if undeclared.
    pub fn rules(&self, name: &str) -> Option<&[Alternative]> {
        self.rules.get(name).map(|v| v.as_slice())
    }

    pub fn is_terminal(&self, sym: &Symbol) -> bool {
        sym.is_terminal()
    }

    /// Every nonterminal reachable from `name` (inclusive), via a simple
    /// worklist traversal of the rule graph.
    pub fn reachable(&self, name: &str) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        let mut stack = vec![name.to_string()];
        while let Some(n) = stack.pop() {
            if seen.contains(&n) {
                continue;
            }
            seen.push(n.clone());
            if let Some(alts) = self.rules.get(&n) {
                for alt in alts {
                    for sym in alt {
                        if let Symbol::Nonterminal(child) = sym {
                            if !seen.contains(child) {
                                stack.push(child.clone());
                            }
                        }
                    }
                }
            }
        }
        seen
    }

    /// Whether `child` can appear as a direct child of a `<parent>` node:
    /// some alternative of `parent` contains `child` as one of its symbols.
    pub fn is_possible_child(&self, parent: &str, child: &str) -> bool {
        self.rules
            .get(parent)
            .map(|alts| {
                alts.iter()
                    .any(|alt| alt.iter().any(|s| s.as_nonterminal() == Some(child)))
            })
            .unwrap_or(false)
    }

    /// Whether `descendant` is reachable from `ancestor` through one or more
    /// rule expansions (used for XPath `..<T>` well-formedness, §4.6(f)).
    pub fn is_possible_descendant(&self, ancestor: &str, descendant: &str) -> bool {
        self.rules
            .get(ancestor)
            .map(|alts| {
                alts.iter().any(|alt| {
                    alt.iter().any(|s| match s {
                        Symbol::Nonterminal(child) => {
                            child == descendant || self.reachable(child).contains(&descendant.to_string())
                        }
                        Symbol::Terminal(_) => false,
                    })
                })
            })
            .unwrap_or(false)
    }
}

struct GrammarReader<'c> {
    code: &'c Code<'c>,
    bytes: &'c [u8],
    pos: usize,
    references: Vec<(String, crate::util::Position)>,
}

impl<'c> GrammarReader<'c> {
    fn new(code: &'c Code<'c>) -> Self {
        Self { code, bytes: code.value.as_bytes(), pos: 0, references: Vec::new() }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_trivia(&mut self) {
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn err(&self, message: &str) -> GrammarError {
        GrammarError::Syntax { at: self.code.obtain_position(self.pos), message: message.to_string() }
    }

    fn expect(&mut self, ch: u8) -> Result<(), GrammarError> {
        if self.peek() == Some(ch) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.err(&format!("expected '{}'", ch as char)))
        }
    }

    fn parse_nonterminal(&mut self) -> Result<String, GrammarError> {
        self.expect(b'<')?;
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == b'<' {
                return Err(self.err("nonterminal name must not contain '<'"));
            }
            if b == b'>' {
                break;
            }
            self.pos += 1;
        }
        if self.at_end() {
            return Err(self.err("unterminated nonterminal"));
        }
        let name = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap().to_string();
        self.expect(b'>')?;
        if name.is_empty() {
            return Err(self.err("nonterminal name must not be empty"));
        }
        Ok(name)
    }

    fn parse_string(&mut self) -> Result<String, GrammarError> {
        self.expect(b'"')?;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.err("unterminated string literal")),
                Some(b'"') => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(b'b') => out.push('\u{8}'),
                        Some(b't') => out.push('\t'),
                        Some(b'n') => out.push('\n'),
                        Some(b'r') => out.push('\r'),
                        Some(b'"') => out.push('"'),
                        Some(b'\\') => out.push('\\'),
                        _ => return Err(self.err("invalid escape sequence")),
                    }
                    self.pos += 1;
                }
                Some(_) => {
                    let rest = &self.code.value[self.pos..];
                    let ch = rest.chars().next().unwrap();
                    out.push(ch);
                    self.pos += ch.len_utf8();
                }
            }
        }
        Ok(out)
    }

    fn parse_alt(&mut self) -> Result<Alternative, GrammarError> {
        let mut symbols = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                Some(b'<') => {
                    let at = self.code.obtain_position(self.pos);
                    let name = self.parse_nonterminal()?;
                    self.references.push((name.clone(), at));
                    symbols.push(Symbol::Nonterminal(name));
                }
                Some(b'"') => symbols.push(Symbol::Terminal(self.parse_string()?)),
                _ => break,
            }
        }
        if symbols.is_empty() {
            return Err(self.err("alternative must not be empty"));
        }
        Ok(symbols)
    }

    fn parse_rule(&mut self) -> Result<(String, Vec<Alternative>), GrammarError> {
        let name = self.parse_nonterminal()?;
        self.skip_trivia();
        self.expect(b':')?;
        self.expect(b':')?;
        self.expect(b'=')?;
        let mut alts = Vec::new();
        loop {
            self.skip_trivia();
            alts.push(self.parse_alt()?);
            self.skip_trivia();
            match self.peek() {
                Some(b'|') => {
                    self.pos += 1;
                    continue;
                }
                Some(b';') => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(self.err("expected '|' or ';'")),
            }
        }
        Ok((name, alts))
    }
}
