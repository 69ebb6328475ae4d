use std::fmt;

use crate::Location;

/// Errors that can occur while *building* a [`crate::LexicalAnalyzer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError<T> {
    DuplicateHandle(T),
    DuplicatePattern(String),
    EmptyPattern(Option<T>),
    RegexError(String),
}

impl<T: fmt::Debug> fmt::Display for BuildError<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BuildError::DuplicateHandle(tag) => write!(f, "duplicate token handle: {tag:?}"),
            BuildError::DuplicatePattern(pattern) => {
                write!(f, "duplicate lexeme pattern: \"{pattern}\"")
            }
            BuildError::EmptyPattern(tag) => write!(f, "empty pattern for {tag:?}"),
            BuildError::RegexError(message) => write!(f, "invalid regular expression: {message}"),
        }
    }
}

impl<T: fmt::Debug> std::error::Error for BuildError<T> {}

impl<T> From<regex::Error> for BuildError<T> {
    fn from(error: regex::Error) -> Self {
        BuildError::RegexError(error.to_string())
    }
}

/// Errors encountered while drawing tokens from a [`crate::TokenStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error<T> {
    /// No rule (literal, regex or skip) matched the text at this location.
    UnexpectedText(String, Location),
    /// Two or more regex rules of equal, maximal length matched here.
    AmbiguousMatches(Vec<T>, String, Location),
    /// `advance()` was called with no token pending.
    AdvancedWhenEmpty(Location),
}

impl<T: fmt::Display> fmt::Display for Error<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::UnexpectedText(text, location) => {
                write!(f, "{location}: unexpected text: \"{text}\"")
            }
            Error::AmbiguousMatches(tags, text, location) => {
                write!(f, "{location}: ambiguous match on \"{text}\" between: ")?;
                for (index, tag) in tags.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{tag}")?;
                }
                Ok(())
            }
            Error::AdvancedWhenEmpty(location) => {
                write!(f, "{location}: advanced past end of token stream")
            }
        }
    }
}

impl<T: fmt::Display + fmt::Debug> std::error::Error for Error<T> {}
