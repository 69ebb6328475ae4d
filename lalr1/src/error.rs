//! The error taxonomy of spec §7: two grammar-build errors, a conflict
//! diagnostic that is only promoted to a hard error past a caller-supplied
//! threshold, a parser driver error, and a cache-mismatch error.

use std::collections::BTreeSet;
use std::fmt;

use crate::table::{ReduceReduceConflict, ShiftReduceConflict};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrammarError {
    SyntaxError(String),
    UndefinedNonTerminal(String),
}

impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GrammarError::SyntaxError(message) => write!(f, "grammar syntax error: {message}"),
            GrammarError::UndefinedNonTerminal(name) => {
                write!(f, "grammar semantic error: nonterminal '{name}' has no productions")
            }
        }
    }
}

impl std::error::Error for GrammarError {}

/// The accumulated, partitioned conflict log of spec §4.4. Informational on
/// its own; `BuildError::TooManyConflicts` is raised only when `build` is
/// asked to enforce an expected count and the total exceeds it.
#[derive(Debug, Clone, Default)]
pub struct ConflictLog {
    pub shift_reduce: Vec<ShiftReduceConflict>,
    pub reduce_reduce: Vec<ReduceReduceConflict>,
}

impl ConflictLog {
    pub fn total(&self) -> usize {
        self.shift_reduce.len() + self.reduce_reduce.len()
    }
}

impl fmt::Display for ConflictLog {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{} shift/reduce, {} reduce/reduce conflict(s)", self.shift_reduce.len(), self.reduce_reduce.len())?;
        for conflict in &self.shift_reduce {
            writeln!(f, "  {conflict}")?;
        }
        for conflict in &self.reduce_reduce {
            writeln!(f, "  {conflict}")?;
        }
        Ok(())
    }
}

/// Errors that can occur while building ACTION/GOTO tables from a grammar.
#[derive(Debug, Clone)]
pub enum BuildError {
    Grammar(GrammarError),
    /// `|sr| + |rr|` in the conflict log exceeded the author-supplied
    /// expected count (spec §4.4). The check sums both partitions; neither
    /// is assumed present.
    TooManyConflicts { expected: usize, log: ConflictLog },
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BuildError::Grammar(error) => write!(f, "{error}"),
            BuildError::TooManyConflicts { expected, log } => write!(
                f,
                "{} conflict(s) exceeds the expected count of {expected}:\n{log}",
                log.total()
            ),
        }
    }
}

impl std::error::Error for BuildError {}

impl From<GrammarError> for BuildError {
    fn from(error: GrammarError) -> Self {
        BuildError::Grammar(error)
    }
}

/// An error raised by the shift-reduce driver. The driver never panics on
/// malformed input; any `Error` cell consulted during parsing is reported
/// as one of these two variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError<T: Ord + fmt::Debug + fmt::Display> {
    LexicalError(lexan::Error<T>, BTreeSet<T>),
    SyntaxError { found: T, lexeme: String, location: lexan::Location, expected: BTreeSet<T> },
}

fn format_set<T: fmt::Display>(set: &BTreeSet<T>) -> String {
    let mut string = String::new();
    for (index, item) in set.iter().enumerate() {
        if index > 0 {
            string += if index == set.len() - 1 { " or " } else { ", " };
        }
        string += &item.to_string();
    }
    string
}

impl<T: Ord + fmt::Debug + fmt::Display> fmt::Display for ParseError<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::LexicalError(error, expected) => {
                write!(f, "lexical error: {error}: expected {}", format_set(expected))
            }
            ParseError::SyntaxError { found, lexeme, location, expected } => write!(
                f,
                "syntax error at {location}: found {found} (\"{lexeme}\"), expected {}",
                format_set(expected)
            ),
        }
    }
}

impl<T: Ord + fmt::Debug + fmt::Display> std::error::Error for ParseError<T> {}

/// Returned by the cache façade when stored tables do not match the
/// requesting grammar (spec §4.6): a different fingerprint, a state count
/// or symbol-name set that does not agree with the freshly analysed
/// grammar, or a corrupt/foreign serialised blob. Always recoverable by
/// rebuilding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheMismatchError {
    FingerprintMismatch,
    SymbolSetMismatch,
    Corrupt(String),
}

impl fmt::Display for CacheMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CacheMismatchError::FingerprintMismatch => write!(f, "cached tables were built from a different grammar"),
            CacheMismatchError::SymbolSetMismatch => {
                write!(f, "cached tables' terminal/nonterminal names do not match the grammar")
            }
            CacheMismatchError::Corrupt(message) => write!(f, "cached tables could not be decoded: {message}"),
        }
    }
}

impl std::error::Error for CacheMismatchError {}
