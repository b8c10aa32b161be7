use crate::util::Position;
use std::fmt::{Display, Formatter};

/// Failures while parsing a BNF reference grammar (§4.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrammarError {
    UndefinedNonterminal { name: String, used_at: Position },
    StartNotDefined { name: String },
    EmptyGrammar,
    Syntax { at: Position, message: String },
}

impl Display for GrammarError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GrammarError::UndefinedNonterminal { name, used_at } => {
                write!(f, "GrammarError: undefined nonterminal {} at {}", name, used_at)
            }
            GrammarError::StartNotDefined { name } => {
                write!(f, "GrammarError: start symbol {} is not defined", name)
            }
            GrammarError::EmptyGrammar => write!(f, "GrammarError: grammar has no rules"),
            GrammarError::Syntax { at, message } => {
                write!(f, "GrammarError: {} at {}", message, at)
            }
        }
    }
}

/// Lexical failures tokenising ISLa source (§4.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    LexError { at: Position, found: char },
    UnterminatedString { at: Position },
}

impl Display for LexError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LexError::LexError { at, found } => {
                write!(f, "LexError: unexpected character '{}' at {}", found, at)
            }
            LexError::UnterminatedString { at } => {
                write!(f, "UnterminatedString: starting at {}", at)
            }
        }
    }
}

/// Syntactic failures while parsing the formula AST (§4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Lex(LexError),
    ParseError { at: Position, expected: String },
    ArityMismatch { at: Position, name: String, expected: usize, found: usize },
    UnknownPredicate { at: Position, name: String },
}

impl From<LexError> for ParseError {
    fn from(value: LexError) -> Self {
        ParseError::Lex(value)
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Lex(e) => write!(f, "{}", e),
            ParseError::ParseError { at, expected } => {
                write!(f, "ParseError: expected {} at {}", expected, at)
            }
            ParseError::ArityMismatch { at, name, expected, found } => write!(
                f,
                "ArityMismatch: {} expects {} argument(s), found {} at {}",
                name, expected, found, at
            ),
            ParseError::UnknownPredicate { at, name } => {
                write!(f, "UnknownPredicate: {} at {}", name, at)
            }
        }
    }
}

/// Well-formedness failures found in the single post-parse traversal (§4.6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WellFormednessError {
    UnresolvedVariable { name: String },
    SortMismatch { context: String, expected: String, found: String },
    DuplicateBinder { name: String },
    UnreachableXPath { path: String },
}

impl Display for WellFormednessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            WellFormednessError::UnresolvedVariable { name } => {
                write!(f, "UnresolvedVariable: {}", name)
            }
            WellFormednessError::SortMismatch { context, expected, found } => write!(
                f,
                "SortMismatch: {} expected sort {}, found {}",
                context, expected, found
            ),
            WellFormednessError::DuplicateBinder { name } => {
                write!(f, "DuplicateBinder: {}", name)
            }
            WellFormednessError::UnreachableXPath { path } => {
                write!(f, "UnreachableXPath: {}", path)
            }
        }
    }
}

/// Programming errors raised during evaluation: a missing binding for a free
/// variable (§4.10, §7). Oracle/predicate uncertainty is never an error —
/// it resolves to `Verdict::Undef` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    MissingBinding { name: String },
}

impl Display for EvalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalError::MissingBinding { name } => {
                write!(f, "EvalError: no binding for free variable {}", name)
            }
        }
    }
}

/// Umbrella error for callers of the three public entry points who want a
/// single error type instead of matching on each stage's own enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IslaError {
    Grammar(GrammarError),
    Parse(ParseError),
    WellFormedness(WellFormednessError),
    Eval(EvalError),
}

impl From<GrammarError> for IslaError {
    fn from(value: GrammarError) -> Self {
        IslaError::Grammar(value)
    }
}
impl From<ParseError> for IslaError {
    fn from(value: ParseError) -> Self {
        IslaError::Parse(value)
    }
}
impl From<WellFormednessError> for IslaError {
    fn from(value: WellFormednessError) -> Self {
        IslaError::WellFormedness(value)
    }
}
impl From<EvalError> for IslaError {
    fn from(value: EvalError) -> Self {
        IslaError::Eval(value)
    }
}

impl Display for IslaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            IslaError::Grammar(e) => write!(f, "{}", e),
            IslaError::Parse(e) => write!(f, "{}", e),
            IslaError::WellFormedness(e) => write!(f, "{}", e),
            IslaError::Eval(e) => write!(f, "{}", e),
        }
    }
}
