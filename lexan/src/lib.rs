//! A small ordered literal/regex lexical analyzer.
//!
//! A [`LexicalAnalyzer`] is built once from three rule tables (exact-text
//! literals, regular expressions, and "skip" regular expressions for
//! whitespace/comments) and then used to turn any number of input strings
//! into [`TokenStream`]s. At each position literals are tried before
//! regexes (so a keyword-like literal always beats a more general regex that
//! would also match it); among the regexes the longest match wins, and two
//! regexes matching the same longest span with different tags is reported
//! as [`Error::AmbiguousMatches`] rather than resolved arbitrarily.

mod error;

use std::fmt;

use regex::Regex;

pub use error::{BuildError, Error};

/// A position in some named piece of source text.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location {
    label: String,
    line: usize,
    column: usize,
}

impl Location {
    fn start_of(label: &str) -> Self {
        Self {
            label: label.to_string(),
            line: 1,
            column: 1,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn column(&self) -> usize {
        self.column
    }

    fn advance(&mut self, text: &str) {
        for ch in text.chars() {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.label.is_empty() {
            write!(f, "{}:{}", self.line, self.column)
        } else {
            write!(f, "{}:{}:{}", self.label, self.line, self.column)
        }
    }
}

/// A single recognised token: its kind, the text that matched, and where it
/// was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<T> {
    tag: T,
    lexeme: String,
    location: Location,
}

impl<T: Copy> Token<T> {
    pub fn tag(&self) -> &T {
        &self.tag
    }
}

impl<T> Token<T> {
    pub fn lexeme(&self) -> &str {
        &self.lexeme
    }

    pub fn location(&self) -> &Location {
        &self.location
    }
}

enum Rule<T> {
    Literal(T, String),
    Regex(T, Regex),
}

/// An ordered set of lexical rules: call [`LexicalAnalyzer::token_stream`]
/// to start tokenizing a piece of text.
pub struct LexicalAnalyzer<T> {
    literals: Vec<(T, String)>,
    regexes: Vec<(T, Regex)>,
    skip: Vec<Regex>,
    end_tag: T,
}

impl<T: Copy + Ord + fmt::Debug> LexicalAnalyzer<T> {
    /// Builds a new analyzer, panicking on a malformed rule table. Intended
    /// for rule tables that are fixed at compile time (e.g. inside a
    /// `lazy_static!`); for rule tables derived from user input prefer
    /// [`LexicalAnalyzer::try_new`].
    pub fn new(
        literals: &[(T, &str)],
        regexes: &[(T, &str)],
        skip: &[&str],
        end_tag: T,
    ) -> Self {
        Self::try_new(literals, regexes, skip, end_tag)
            .expect("invalid lexical analyzer rule table")
    }

    pub fn try_new(
        literals: &[(T, &str)],
        regexes: &[(T, &str)],
        skip: &[&str],
        end_tag: T,
    ) -> Result<Self, BuildError<T>> {
        let mut seen_tags = std::collections::BTreeSet::new();
        let mut seen_patterns = std::collections::BTreeSet::new();
        let mut built_literals = Vec::with_capacity(literals.len());
        for (tag, pattern) in literals {
            if pattern.is_empty() {
                return Err(BuildError::EmptyPattern(Some(*tag)));
            }
            if !seen_tags.insert(*tag) {
                return Err(BuildError::DuplicateHandle(*tag));
            }
            if !seen_patterns.insert(pattern.to_string()) {
                return Err(BuildError::DuplicatePattern(pattern.to_string()));
            }
            built_literals.push((*tag, pattern.to_string()));
        }
        let mut built_regexes = Vec::with_capacity(regexes.len());
        for (tag, pattern) in regexes {
            if pattern.is_empty() {
                return Err(BuildError::EmptyPattern(Some(*tag)));
            }
            if !seen_tags.insert(*tag) {
                return Err(BuildError::DuplicateHandle(*tag));
            }
            if !seen_patterns.insert(pattern.to_string()) {
                return Err(BuildError::DuplicatePattern(pattern.to_string()));
            }
            let anchored = format!("^(?:{pattern})");
            built_regexes.push((*tag, Regex::new(&anchored)?));
        }
        let mut built_skip = Vec::with_capacity(skip.len());
        for pattern in skip {
            if pattern.is_empty() {
                return Err(BuildError::EmptyPattern(None));
            }
            let anchored = format!("^(?:{pattern})");
            built_skip.push(Regex::new(&anchored)?);
        }
        Ok(Self {
            literals: built_literals,
            regexes: built_regexes,
            skip: built_skip,
            end_tag,
        })
    }

    /// Begins tokenizing `text`; `label` identifies the source (a file path,
    /// or the empty string) and is carried in every [`Location`] produced.
    pub fn token_stream(&self, text: String, label: String) -> TokenStream<'_, T> {
        TokenStream::new(self, text, label)
    }

    fn best_match_at<'t>(&self, text: &'t str) -> Option<MatchResult<T>> {
        let mut best_literal: Option<(T, usize)> = None;
        for (tag, pattern) in &self.literals {
            if text.starts_with(pattern.as_str()) {
                let len = pattern.len();
                if best_literal.map_or(true, |(_, best_len)| len > best_len) {
                    best_literal = Some((*tag, len));
                }
            }
        }
        if let Some((tag, len)) = best_literal {
            return Some(MatchResult {
                tags: vec![tag],
                len,
            });
        }

        let mut best_len = 0usize;
        let mut best_tags = Vec::new();
        for (tag, regex) in &self.regexes {
            if let Some(found) = regex.find(text) {
                let len = found.end();
                if len == 0 {
                    continue;
                }
                match len.cmp(&best_len) {
                    std::cmp::Ordering::Greater => {
                        best_len = len;
                        best_tags.clear();
                        best_tags.push(*tag);
                    }
                    std::cmp::Ordering::Equal => best_tags.push(*tag),
                    std::cmp::Ordering::Less => (),
                }
            }
        }
        if best_tags.is_empty() {
            None
        } else {
            Some(MatchResult {
                tags: best_tags,
                len: best_len,
            })
        }
    }

    fn skip_len_at(&self, text: &str) -> usize {
        let mut best = 0usize;
        for regex in &self.skip {
            if let Some(found) = regex.find(text) {
                best = best.max(found.end());
            }
        }
        best
    }
}

struct MatchResult<T> {
    tags: Vec<T>,
    len: usize,
}

struct Source {
    text: String,
    position: usize,
    location: Location,
}

impl Source {
    fn remaining(&self) -> &str {
        &self.text[self.position..]
    }

    fn is_exhausted(&self) -> bool {
        self.position >= self.text.len()
    }

    fn consume(&mut self, len: usize) -> String {
        let consumed = self.text[self.position..self.position + len].to_string();
        self.location.advance(&consumed);
        self.position += len;
        consumed
    }
}

/// Draws tokens, one at a time, from a piece of text plus any text injected
/// mid-stream via [`TokenStream::inject`].
pub struct TokenStream<'a, T: Copy + Ord + fmt::Debug> {
    analyzer: &'a LexicalAnalyzer<T>,
    stack: Vec<Source>,
    pending: Option<Result<Token<T>, Error<T>>>,
}

impl<'a, T: Copy + Ord + fmt::Debug> TokenStream<'a, T> {
    fn new(analyzer: &'a LexicalAnalyzer<T>, text: String, label: String) -> Self {
        Self {
            analyzer,
            stack: vec![Source {
                text,
                position: 0,
                location: Location::start_of(&label),
            }],
            pending: None,
        }
    }

    /// Pushes additional text to be lexed ahead of whatever remains of the
    /// current source; used by semantic actions that need to feed generated
    /// text back into the token stream.
    pub fn inject(&mut self, text: String, label: String) {
        self.pending = None;
        self.stack.push(Source {
            text,
            position: 0,
            location: Location::start_of(&label),
        });
    }

    fn drop_exhausted_sources(&mut self) {
        while self.stack.len() > 1 && self.stack.last().is_some_and(Source::is_exhausted) {
            self.stack.pop();
        }
    }

    fn lex_next(&mut self) -> Result<Token<T>, Error<T>> {
        loop {
            self.drop_exhausted_sources();
            let source = self.stack.last_mut().expect("stack never fully empties");
            if source.is_exhausted() {
                return Ok(Token {
                    tag: self.analyzer.end_tag,
                    lexeme: String::new(),
                    location: source.location.clone(),
                });
            }
            let remaining = source.remaining();
            let skip_len = self.analyzer.skip_len_at(remaining);
            if skip_len > 0 {
                source.consume(skip_len);
                continue;
            }
            match self.analyzer.best_match_at(remaining) {
                None => {
                    let text = remaining.chars().take(1).collect::<String>();
                    let location = source.location.clone();
                    return Err(Error::UnexpectedText(text, location));
                }
                Some(found) if found.tags.len() > 1 => {
                    let text = source.remaining()[..found.len].to_string();
                    let location = source.location.clone();
                    return Err(Error::AmbiguousMatches(found.tags, text, location));
                }
                Some(found) => {
                    let location = source.location.clone();
                    let lexeme = source.consume(found.len);
                    return Ok(Token {
                        tag: found.tags[0],
                        lexeme,
                        location,
                    });
                }
            }
        }
    }

    /// Returns the current token without consuming it; repeated calls
    /// return the same result until [`TokenStream::advance`] is called.
    pub fn front(&mut self) -> Result<Token<T>, Error<T>> {
        if self.pending.is_none() {
            self.pending = Some(self.lex_next());
        }
        self.pending.clone().expect("just set")
    }

    /// Consumes the current token so the next call to `front` lexes a fresh
    /// one.
    pub fn advance(&mut self) {
        if self.pending.take().is_none() {
            // No-op: callers are expected to call `front` before `advance`,
            // but advancing an un-peeked stream simply primes the cursor.
        }
    }

    /// True once every pushed source (the original text and anything
    /// injected) has been fully consumed.
    pub fn is_empty(&self) -> bool {
        self.stack.iter().all(Source::is_exhausted)
    }
}
