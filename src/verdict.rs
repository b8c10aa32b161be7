//! Three-valued Kleene logic (§3, §4.10).
//!
//! `Verdict` is never collapsed to a two-valued bool: an oracle or semantic
//! predicate that cannot decide a sub-formula propagates `Undef` through
//! the connectives exactly as strong Kleene logic prescribes, rather than
//! defaulting to either `Sat` or `Unsat`.

use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Sat,
    Unsat,
    Undef,
}

impl Display for Verdict {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Sat => write!(f, "SAT"),
            Verdict::Unsat => write!(f, "UNSAT"),
            Verdict::Undef => write!(f, "UNDEF"),
        }
    }
}

impl Verdict {
    pub fn from_bool(b: bool) -> Verdict {
        if b {
            Verdict::Sat
        } else {
            Verdict::Unsat
        }
    }

    pub fn is_sat(self) -> bool {
        matches!(self, Verdict::Sat)
    }

    pub fn is_unsat(self) -> bool {
        matches!(self, Verdict::Unsat)
    }

    /// Strong Kleene negation: `Undef` is its own negation.
    pub fn not(self) -> Verdict {
        match self {
            Verdict::Sat => Verdict::Unsat,
            Verdict::Unsat => Verdict::Sat,
            Verdict::Undef => Verdict::Undef,
        }
    }

    /// Strong Kleene conjunction: `Unsat` dominates even past an `Undef`
    /// operand, since one known-false conjunct already decides the whole.
    pub fn and(self, other: Verdict) -> Verdict {
        match (self, other) {
            (Verdict::Unsat, _) | (_, Verdict::Unsat) => Verdict::Unsat,
            (Verdict::Sat, Verdict::Sat) => Verdict::Sat,
            _ => Verdict::Undef,
        }
    }

    /// Strong Kleene disjunction: `Sat` dominates even past an `Undef`
    /// operand.
    pub fn or(self, other: Verdict) -> Verdict {
        match (self, other) {
            (Verdict::Sat, _) | (_, Verdict::Sat) => Verdict::Sat,
            (Verdict::Unsat, Verdict::Unsat) => Verdict::Unsat,
            _ => Verdict::Undef,
        }
    }

    pub fn implies(self, other: Verdict) -> Verdict {
        self.not().or(other)
    }

    pub fn iff(self, other: Verdict) -> Verdict {
        match (self, other) {
            (Verdict::Undef, _) | (_, Verdict::Undef) => Verdict::Undef,
            (a, b) => Verdict::from_bool(a == b),
        }
    }
}

#[cfg(test)]
mod __tests__ {
    use super::*;

    #[test]
    fn and_is_unsat_if_either_side_is_unsat_even_with_undef() {
        assert_eq!(Verdict::Undef.and(Verdict::Unsat), Verdict::Unsat);
        assert_eq!(Verdict::Unsat.and(Verdict::Undef), Verdict::Unsat);
    }

    #[test]
    fn or_is_sat_if_either_side_is_sat_even_with_undef() {
        assert_eq!(Verdict::Undef.or(Verdict::Sat), Verdict::Sat);
        assert_eq!(Verdict::Sat.or(Verdict::Undef), Verdict::Sat);
    }

    #[test]
    fn and_of_two_undef_is_undef() {
        assert_eq!(Verdict::Undef.and(Verdict::Undef), Verdict::Undef);
    }

    #[test]
    fn not_is_involutive_except_at_undef_fixpoint() {
        assert_eq!(Verdict::Sat.not(), Verdict::Unsat);
        assert_eq!(Verdict::Unsat.not(), Verdict::Sat);
        assert_eq!(Verdict::Undef.not(), Verdict::Undef);
    }

    #[test]
    fn iff_is_undef_whenever_either_side_is_undef() {
        assert_eq!(Verdict::Sat.iff(Verdict::Undef), Verdict::Undef);
    }
}
