//! The SMT oracle contract (§4.9, §5).
//!
//! The evaluator never talks to a solver directly — the solver sits behind
//! this trait, exactly as the grammar/lexer/parser stay agnostic of how a
//! tree got built. This keeps the evaluator's tests free of any actual SMT
//! dependency while leaving room to plug in a real one later.

use crate::ast::SmtExpr;
use crate::verdict::Verdict;
use std::collections::BTreeMap;

/// A concrete value bound to a variable name when the oracle is asked to
/// check a fully-substituted SMT expression (§4.9).
#[derive(Debug, Clone, PartialEq)]
pub enum OracleValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

/// Abstract decision procedure for closed SMT expressions (§4.9). A real
/// integration would hand `expr` to an actual SMT-LIB solver after
/// substituting `bindings`; this core only specifies the contract.
pub trait SmtOracle {
    /// Decide whether `expr` holds once every free name in it is replaced
    /// by its binding. Returns `Undef` if the oracle cannot decide — an
    /// unsupported operator, a missing binding, or (for a real solver) a
    /// timeout or `unknown` result (§4.9, §4.10).
    fn check(&self, expr: &SmtExpr, bindings: &BTreeMap<String, OracleValue>) -> Verdict;
}

/// A small reference interpreter over the string/int fragment of §6's
/// operator table, good enough to drive this core's own test suite without
/// a real SMT dependency. Falls back to `Undef` for anything it does not
/// implement rather than guessing.
pub struct ReferenceOracle;

impl SmtOracle for ReferenceOracle {
    fn check(&self, expr: &SmtExpr, bindings: &BTreeMap<String, OracleValue>) -> Verdict {
        match eval_bool(expr, bindings) {
            Some(b) => Verdict::from_bool(b),
            None => Verdict::Undef,
        }
    }
}

fn eval_bool(expr: &SmtExpr, bindings: &BTreeMap<String, OracleValue>) -> Option<bool> {
    match expr {
        SmtExpr::BoolLiteral(b) => Some(*b),
        SmtExpr::VarRef(name) => match bindings.get(name) {
            Some(OracleValue::Bool(b)) => Some(*b),
            _ => None,
        },
        SmtExpr::Apply { op, args } => match op.as_str() {
            "=" => {
                let a = eval_value(&args[0], bindings)?;
                let b = eval_value(&args[1], bindings)?;
                Some(a == b)
            }
            ">=" | "<=" | ">" | "<" => {
                let a = eval_int(&args[0], bindings)?;
                let b = eval_int(&args[1], bindings)?;
                Some(match op.as_str() {
                    ">=" => a >= b,
                    "<=" => a <= b,
                    ">" => a > b,
                    "<" => a < b,
                    _ => unreachable!(),
                })
            }
            "str.<=" => {
                let a = eval_str(&args[0], bindings)?;
                let b = eval_str(&args[1], bindings)?;
                Some(a <= b)
            }
            "and" => args.iter().try_fold(true, |acc, a| Some(acc && eval_bool(a, bindings)?)),
            "or" => args.iter().try_fold(false, |acc, a| Some(acc || eval_bool(a, bindings)?)),
            "not" => eval_bool(&args[0], bindings).map(|b| !b),
            "str.is_digit" => {
                let s = eval_str(&args[0], bindings)?;
                Some(s.len() == 1 && s.chars().next().unwrap().is_ascii_digit())
            }
            "str.contains" => {
                let s = eval_str(&args[0], bindings)?;
                let needle = eval_str(&args[1], bindings)?;
                Some(s.contains(&needle))
            }
            "str.prefixof" => {
                let prefix = eval_str(&args[0], bindings)?;
                let s = eval_str(&args[1], bindings)?;
                Some(s.starts_with(&prefix))
            }
            "str.suffixof" => {
                let suffix = eval_str(&args[0], bindings)?;
                let s = eval_str(&args[1], bindings)?;
                Some(s.ends_with(&suffix))
            }
            _ => None,
        },
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Str(String),
    Int(i64),
}

fn eval_value(expr: &SmtExpr, bindings: &BTreeMap<String, OracleValue>) -> Option<Value> {
    match expr {
        SmtExpr::IntLiteral(n) => Some(Value::Int(*n)),
        SmtExpr::StrLiteral(s) => Some(Value::Str(s.clone())),
        SmtExpr::VarRef(name) => match bindings.get(name)? {
            OracleValue::Int(n) => Some(Value::Int(*n)),
            OracleValue::Str(s) => Some(Value::Str(s.clone())),
            OracleValue::Bool(_) => None,
        },
        // Keyed by the full rendered xpath, not just its base (§4.9) — two
        // references sharing a base must resolve to their own binding.
        SmtExpr::XPathRef(xpath) => match bindings.get(&xpath.to_string())? {
            OracleValue::Int(n) => Some(Value::Int(*n)),
            OracleValue::Str(s) => Some(Value::Str(s.clone())),
            OracleValue::Bool(_) => None,
        },
        SmtExpr::Apply { op, args } => match op.as_str() {
            "+" | "-" | "*" if args.len() == 2 => {
                let a = eval_int(&args[0], bindings)?;
                let b = eval_int(&args[1], bindings)?;
                Some(Value::Int(match op.as_str() {
                    "+" => a + b,
                    "-" => a - b,
                    "*" => a * b,
                    _ => unreachable!(),
                }))
            }
            "-" if args.len() == 1 => Some(Value::Int(-eval_int(&args[0], bindings)?)),
            "str.++" => {
                let a = eval_str(&args[0], bindings)?;
                let b = eval_str(&args[1], bindings)?;
                Some(Value::Str(a + &b))
            }
            "str.to.int" => {
                let s = eval_str(&args[0], bindings)?;
                s.parse::<i64>().ok().map(Value::Int)
            }
            "str.len" => {
                let s = eval_str(&args[0], bindings)?;
                Some(Value::Int(s.chars().count() as i64))
            }
            "str.from_int" => {
                let n = eval_int(&args[0], bindings)?;
                Some(Value::Str(n.to_string()))
            }
            _ => None,
        },
        _ => None,
    }
}

fn eval_int(expr: &SmtExpr, bindings: &BTreeMap<String, OracleValue>) -> Option<i64> {
    match eval_value(expr, bindings)? {
        Value::Int(n) => Some(n),
        Value::Str(_) => None,
    }
}

fn eval_str(expr: &SmtExpr, bindings: &BTreeMap<String, OracleValue>) -> Option<String> {
    match eval_value(expr, bindings)? {
        Value::Str(s) => Some(s),
        Value::Int(_) => None,
    }
}

#[cfg(test)]
mod __tests__ {
    use super::*;

    fn bindings(pairs: &[(&str, OracleValue)]) -> BTreeMap<String, OracleValue> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn decides_integer_comparison() {
        let expr = SmtExpr::Apply {
            op: ">=".into(),
            args: vec![SmtExpr::VarRef("n".into()), SmtExpr::IntLiteral(0)],
        };
        let b = bindings(&[("n", OracleValue::Int(5))]);
        assert_eq!(ReferenceOracle.check(&expr, &b), Verdict::Sat);
        let b = bindings(&[("n", OracleValue::Int(-1))]);
        assert_eq!(ReferenceOracle.check(&expr, &b), Verdict::Unsat);
    }

    #[test]
    fn decides_string_to_int_conversion() {
        let expr = SmtExpr::Apply {
            op: ">=".into(),
            args: vec![
                SmtExpr::Apply { op: "str.to.int".into(), args: vec![SmtExpr::VarRef("d".into())] },
                SmtExpr::IntLiteral(0),
            ],
        };
        let b = bindings(&[("d", OracleValue::Str("7".into()))]);
        assert_eq!(ReferenceOracle.check(&expr, &b), Verdict::Sat);
    }

    #[test]
    fn unsupported_operator_is_undef_not_a_panic() {
        let expr = SmtExpr::Apply { op: "str.replace_re_all".into(), args: vec![] };
        assert_eq!(ReferenceOracle.check(&expr, &BTreeMap::new()), Verdict::Undef);
    }

    #[test]
    fn string_equality_atom() {
        let expr = SmtExpr::Apply {
            op: "=".into(),
            args: vec![SmtExpr::VarRef("a".into()), SmtExpr::VarRef("b".into())],
        };
        let b = bindings(&[("a", OracleValue::Str("x".into())), ("b", OracleValue::Str("x".into()))]);
        assert_eq!(ReferenceOracle.check(&expr, &b), Verdict::Sat);
    }
}
