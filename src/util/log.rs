use std::fmt::{Debug, Display, Formatter};

/// Debug-tracing verbosity, ordered from silent to verbose.
///
/// Carries an arbitrary label `T` printed alongside each traced line; the
/// evaluator uses `&'static str` labels naming the quantifier variable being
/// probed. All tracing is compiled out in release builds.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Log<T> {
    None,
    Default(T),
    Success(T),
    Result(T),
    Verbose(T),
}

impl<T> Log<T> {
    fn order(&self) -> u8 {
        match self {
            Log::None => 0,
            Log::Default(_) => 1,
            Log::Success(_) => 2,
            Log::Result(_) => 3,
            Log::Verbose(_) => 4,
        }
    }

    pub fn at_least(&self, other: &Log<T>) -> bool {
        self.order() >= other.order()
    }
}

impl<T: Display> Display for Log<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Log::None => Ok(()),
            Log::Default(s) | Log::Success(s) | Log::Result(s) | Log::Verbose(s) => {
                write!(f, "{}", s)
            }
        }
    }
}

impl Log<&'static str> {
    /// Trace a quantifier probe transition if the configured level allows it.
    #[cfg_attr(not(debug_assertions), allow(unused_variables))]
    pub fn trace_probe(&self, var: &str, candidate: usize, verdict: impl Debug) {
        #[cfg(debug_assertions)]
        if self.at_least(&Log::Verbose("")) {
            println!("[{}; probe {} #{}]: {:?}", self, var, candidate, verdict);
        }
    }

    /// Trace a quantifier's final verdict if the configured level allows it.
    #[cfg_attr(not(debug_assertions), allow(unused_variables))]
    pub fn trace_done(&self, var: &str, verdict: impl Debug) {
        #[cfg(debug_assertions)]
        if self.at_least(&Log::Success("")) {
            println!("[{}; done {}]: {:?}", self, var, verdict);
        }
    }
}
