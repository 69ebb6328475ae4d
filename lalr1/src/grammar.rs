//! Grammar canonicalisation and the nullable/FIRST/FOLLOW fixed-point
//! computation (C1), plus a hand-rolled reader for the grammar text format
//! of spec §6. The reader is hand-written rather than generated by this
//! crate's own table builder, mirroring how the original generator's
//! bootstrap stage parsed its own grammar definition language before a
//! self-hosted parser existed.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::GrammarError;
use crate::production::{Production, ProductionId};
use crate::symbol::{NonTerminalId, PrecedenceTable, Symbol, SymbolTable, TerminalId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grammar {
    pub symbols: SymbolTable,
    pub precedence: PrecedenceTable,
    pub productions: Vec<Production>,
    pub start: NonTerminalId,
    productions_of: BTreeMap<NonTerminalId, Vec<ProductionId>>,
    #[serde(skip)]
    nullable: BTreeSet<NonTerminalId>,
    #[serde(skip)]
    first: BTreeMap<NonTerminalId, BTreeSet<TerminalId>>,
    #[serde(skip)]
    follow: BTreeMap<NonTerminalId, BTreeSet<TerminalId>>,
    #[serde(skip)]
    warnings: BuildLog,
}

/// Warnings noticed while building a [`Grammar`] — things that aren't wrong
/// enough to be a [`GrammarError`] but are still worth a caller's attention,
/// mirroring the teacher's `report_warning`/`Specification::warning_count`
/// (`lap_gen/src/grammar.rs`). Unlike the teacher, which writes straight to
/// stderr as it finds them, a `BuildLog` is handed back from `Grammar::build`
/// for the caller to print, log, or ignore.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildLog {
    pub unused_terminals: Vec<String>,
}

impl BuildLog {
    pub fn is_empty(&self) -> bool {
        self.unused_terminals.is_empty()
    }
}

impl Grammar {
    pub fn production(&self, id: ProductionId) -> &Production {
        &self.productions[id.0 as usize]
    }

    pub fn productions_of(&self, non_terminal: NonTerminalId) -> impl Iterator<Item = ProductionId> + '_ {
        self.productions_of
            .get(&non_terminal)
            .into_iter()
            .flatten()
            .copied()
    }

    pub fn is_nullable(&self, non_terminal: NonTerminalId) -> bool {
        self.nullable.contains(&non_terminal)
    }

    pub fn first(&self, non_terminal: NonTerminalId) -> &BTreeSet<TerminalId> {
        static EMPTY: BTreeSet<TerminalId> = BTreeSet::new();
        self.first.get(&non_terminal).unwrap_or(&EMPTY)
    }

    pub fn follow(&self, non_terminal: NonTerminalId) -> &BTreeSet<TerminalId> {
        static EMPTY: BTreeSet<TerminalId> = BTreeSet::new();
        self.follow.get(&non_terminal).unwrap_or(&EMPTY)
    }

    /// `FIRST` of a symbol string `rest` followed by the terminal(s) in
    /// `trailing`, i.e. `first[rest $trailing]` from the CLOSURE rule of
    /// spec §4.2. If every symbol in `rest` is nullable, `trailing` itself
    /// contributes to the result; otherwise only symbols up to and
    /// including the first non-nullable one do.
    pub fn first_of_sequence_followed_by(
        &self,
        rest: &[Symbol],
        trailing: &BTreeSet<TerminalId>,
    ) -> BTreeSet<TerminalId> {
        let mut result = BTreeSet::new();
        for symbol in rest {
            match symbol {
                Symbol::Terminal(terminal) => {
                    result.insert(*terminal);
                    return result;
                }
                Symbol::NonTerminal(non_terminal) => {
                    result.extend(self.first(*non_terminal).iter().copied());
                    if !self.is_nullable(*non_terminal) {
                        return result;
                    }
                }
            }
        }
        result.extend(trailing.iter().copied());
        result
    }

    /// Computes `nullable`, `first` and `follow` by fixed-point iteration,
    /// per spec §4.1. Must be called once after the production list and
    /// symbol table are final; `Grammar::build` does this automatically.
    fn compute_closures(&mut self) {
        self.compute_nullable();
        self.compute_first();
        self.compute_follow();
    }

    fn compute_nullable(&mut self) {
        loop {
            let mut changed = false;
            for production in &self.productions {
                if self.nullable.contains(&production.lhs) {
                    continue;
                }
                let is_nullable = production
                    .rhs
                    .iter()
                    .all(|symbol| matches!(symbol, Symbol::NonTerminal(nt) if self.nullable.contains(nt)));
                if is_nullable {
                    self.nullable.insert(production.lhs);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }

    fn compute_first(&mut self) {
        loop {
            let mut changed = false;
            for production in &self.productions {
                let mut addition = BTreeSet::new();
                for symbol in &production.rhs {
                    match symbol {
                        Symbol::Terminal(terminal) => {
                            addition.insert(*terminal);
                            break;
                        }
                        Symbol::NonTerminal(non_terminal) => {
                            let first_nt = self.first.get(non_terminal).cloned().unwrap_or_default();
                            addition.extend(first_nt);
                            if !self.nullable.contains(non_terminal) {
                                break;
                            }
                        }
                    }
                }
                let entry = self.first.entry(production.lhs).or_default();
                let before = entry.len();
                entry.extend(addition);
                if entry.len() > before {
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }

    /// The canonical FOLLOW fixed point of spec §4.1. The documented
    /// failure mode is exiting the right-context scan as soon as one
    /// nullable symbol has contributed, which drops `follow[A] ⊆
    /// follow[B]` for interior nullable suffixes; this loop instead walks
    /// the *entire* suffix `β` after each `B` and only stops contributing
    /// `FIRST` once a non-nullable symbol is seen, while separately
    /// checking — after the whole suffix has been scanned — whether it was
    /// nullable throughout, to decide whether `follow[A]` also propagates.
    fn compute_follow(&mut self) {
        self.follow.entry(self.start).or_default().insert(self.symbols.end_of_input);
        loop {
            let mut changed = false;
            for production in &self.productions {
                for (index, symbol) in production.rhs.iter().enumerate() {
                    let Symbol::NonTerminal(b) = symbol else { continue };
                    let beta = &production.rhs[index + 1..];
                    let first_beta = self.first_of_sequence_followed_by(beta, &BTreeSet::new());
                    let beta_nullable = beta.iter().all(|s| match s {
                        Symbol::Terminal(_) => false,
                        Symbol::NonTerminal(nt) => self.nullable.contains(nt),
                    });
                    let entry = self.follow.entry(*b).or_default();
                    let before = entry.len();
                    entry.extend(first_beta);
                    if beta_nullable {
                        let follow_a = self.follow.get(&production.lhs).cloned().unwrap_or_default();
                        let entry = self.follow.entry(*b).or_default();
                        entry.extend(follow_a);
                    }
                    let entry = self.follow.get(b).unwrap();
                    if entry.len() > before {
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
    }

    /// Builds a grammar from already-classified productions. `start` is the
    /// user's start nonterminal; this introduces the augmented production
    /// `S' -> start $` per spec §3.
    pub fn build(
        mut symbols: SymbolTable,
        precedence: PrecedenceTable,
        mut raw_productions: Vec<(NonTerminalId, Vec<Symbol>, Option<TerminalId>, Option<String>)>,
        start: NonTerminalId,
    ) -> Result<Grammar, GrammarError> {
        let augmented_start = symbols.augmented_start;
        let end = symbols.end_of_input;
        let mut productions = Vec::with_capacity(raw_productions.len() + 1);
        productions.push(Production {
            id: ProductionId(0),
            lhs: augmented_start,
            rhs: vec![Symbol::NonTerminal(start), Symbol::Terminal(end)],
            precedence_tag: None,
            action: None,
        });
        for (index, (lhs, rhs, precedence_tag, action)) in raw_productions.drain(..).enumerate() {
            productions.push(Production {
                id: ProductionId(index as u32 + 1),
                lhs,
                rhs,
                precedence_tag,
                action,
            });
        }

        let mut productions_of: BTreeMap<NonTerminalId, Vec<ProductionId>> = BTreeMap::new();
        for production in &productions {
            productions_of.entry(production.lhs).or_default().push(production.id);
        }

        // Every nonterminal the reader interned is either the left-hand
        // side of at least one production, or was only ever mentioned on
        // some right-hand side and so is undefined (spec §3's invariant).
        for non_terminal in symbols.non_terminals() {
            if !productions_of.contains_key(&non_terminal) {
                return Err(GrammarError::UndefinedNonTerminal(
                    symbols.non_terminal_name(non_terminal).to_string(),
                ));
            }
        }

        let mut grammar = Grammar {
            symbols,
            precedence,
            productions,
            start,
            productions_of,
            nullable: BTreeSet::new(),
            first: BTreeMap::new(),
            follow: BTreeMap::new(),
            warnings: BuildLog::default(),
        };
        grammar.compute_closures();
        grammar.compute_warnings();
        Ok(grammar)
    }

    /// Warnings accumulated while this grammar was built (spec §3's
    /// "Logging/diagnostics" requirement for a `BuildLog`).
    pub fn warnings(&self) -> &BuildLog {
        &self.warnings
    }

    /// A terminal that never appears on any production's right-hand side and
    /// is never named by a `%prec` tag is dead weight in the lexer's token
    /// set — the same thing the teacher's `unused_tokens()` warns about,
    /// restated over this crate's flat terminal ids. `end_of_input` is never
    /// reported: it is never meant to appear in a production body.
    fn compute_warnings(&mut self) {
        let mut used: BTreeSet<TerminalId> = BTreeSet::new();
        for production in &self.productions {
            for symbol in &production.rhs {
                if let Symbol::Terminal(terminal) = symbol {
                    used.insert(*terminal);
                }
            }
            if let Some(tag) = production.precedence_tag {
                used.insert(tag);
            }
        }
        for terminal in self.symbols.terminals() {
            if terminal == self.symbols.end_of_input || used.contains(&terminal) {
                continue;
            }
            self.warnings.unused_terminals.push(self.symbols.terminal_name(terminal).to_string());
        }
    }

    /// The canonical fingerprint of spec §4.6: sorted productions in the
    /// form `lhs | rhs0 rhs1 ... | precedence_tag`, the precedence table in
    /// sorted order, and the table flavour.
    pub fn fingerprint(&self, flavour: crate::automaton::Flavour) -> String {
        let mut lines: Vec<String> = self
            .productions
            .iter()
            .map(|production| {
                let rhs: Vec<String> = production
                    .rhs
                    .iter()
                    .map(|symbol| match symbol {
                        Symbol::Terminal(t) => self.symbols.terminal_name(*t).to_string(),
                        Symbol::NonTerminal(nt) => self.symbols.non_terminal_name(*nt).to_string(),
                    })
                    .collect();
                let tag = production
                    .precedence_tag
                    .map(|t| self.symbols.terminal_name(t).to_string())
                    .unwrap_or_default();
                format!("{} | {} | {}", self.symbols.non_terminal_name(production.lhs), rhs.join(" "), tag)
            })
            .collect();
        lines.sort_unstable();

        let mut precedence_lines: Vec<String> = self
            .precedence
            .iter()
            .map(|(terminal, (prec, assoc))| {
                format!("{} {} {}", self.symbols.terminal_name(*terminal), prec, assoc)
            })
            .collect();
        precedence_lines.sort_unstable();

        format!(
            "{}\n--\n{}\n--\n{:?}",
            lines.join("\n"),
            precedence_lines.join("\n"),
            flavour
        )
    }
}

/// Precedence/associativity groups and an optional `%expect` count, read from
/// the declaration lines a grammar source may carry ahead of its productions
/// (mirroring the teacher's `bootstrap.rs` `%left`/`%right`/`%nonassoc`/
/// `%token` declarations, generalised to this crate's terminal/tag precedence
/// model). Declarations are not part of `spec.md`'s §3 `Precedence table`
/// itself — `Declarations::into_table` resolves them against an already-built
/// `SymbolTable` to produce one.
#[derive(Debug, Clone, Default)]
pub struct Declarations {
    /// One entry per `%left`/`%right`/`%nonassoc` line, in source order;
    /// earlier lines bind more loosely, matching conventional yacc practice.
    pub groups: Vec<(crate::symbol::Associativity, Vec<String>)>,
    pub expect: Option<usize>,
}

impl Declarations {
    /// Resolves each declared name against `symbols`, assigning precedence
    /// levels `1..=groups.len()` in declaration order. A name that is not a
    /// known terminal is a grammar syntax error: declarations may only
    /// assign precedence to terminals.
    pub fn into_table(&self, symbols: &SymbolTable) -> Result<crate::symbol::PrecedenceTable, GrammarError> {
        let mut table = crate::symbol::PrecedenceTable::new();
        for (level, (assoc, names)) in self.groups.iter().enumerate() {
            for name in names {
                let terminal = symbols.terminal_named(name).ok_or_else(|| {
                    GrammarError::SyntaxError(format!("'{name}' in a precedence declaration is not a terminal"))
                })?;
                table.set(terminal, level as u16 + 1, *assoc);
            }
        }
        Ok(table)
    }
}

/// Strips leading `%left`/`%right`/`%nonassoc`/`%expect` declaration lines
/// (each `%keyword name... ;`) from `text`, returning the parsed
/// declarations and the remaining production text unchanged.
pub fn extract_declarations(text: &str) -> Result<(Declarations, &str), GrammarError> {
    use crate::symbol::Associativity;

    let mut declarations = Declarations::default();
    let mut reader = Reader::new(text);
    loop {
        reader.skip_whitespace();
        let keyword = if reader.peek_is("%left") {
            Some(Associativity::Left)
        } else if reader.peek_is("%right") {
            Some(Associativity::Right)
        } else if reader.peek_is("%nonassoc") {
            Some(Associativity::NonAssoc)
        } else {
            None
        };
        if let Some(assoc) = keyword {
            let keyword_len = match assoc {
                Associativity::Left => "%left".len(),
                Associativity::Right => "%right".len(),
                Associativity::NonAssoc => "%nonassoc".len(),
            };
            reader.position += keyword_len;
            let mut names = vec![];
            loop {
                reader.skip_whitespace();
                if reader.peek_is(";") {
                    break;
                }
                let name = reader.read_symbol().ok_or_else(|| {
                    GrammarError::SyntaxError(format!("expected a terminal name at position {}", reader.position))
                })?;
                names.push(name);
            }
            reader.expect(";")?;
            declarations.groups.push((assoc, names));
            continue;
        }
        if reader.peek_is("%expect") {
            reader.position += "%expect".len();
            reader.skip_whitespace();
            let start = reader.position;
            let remaining = reader.remaining();
            let end = remaining.char_indices().take_while(|(_, c)| c.is_ascii_digit()).last().map(|(i, c)| i + c.len_utf8());
            let Some(end) = end else {
                return Err(GrammarError::SyntaxError(format!("expected a number after '%expect' at position {start}")));
            };
            let count: usize = remaining[..end].parse().map_err(|_| {
                GrammarError::SyntaxError(format!("invalid number after '%expect' at position {start}"))
            })?;
            reader.position += end;
            reader.skip_whitespace();
            reader.expect(";")?;
            declarations.expect = Some(count);
            continue;
        }
        break;
    }
    Ok((declarations, reader.remaining()))
}

/// Parses the grammar text format of spec §6 into the raw ingredients of
/// [`Grammar::build`]. `terminal_names` is the lexer's configured token-kind
/// set: any symbol name found in it is a terminal, every other name is a
/// nonterminal (spec §6).
pub fn read_grammar_text(
    text: &str,
    terminal_names: &[&str],
) -> Result<(SymbolTable, Vec<(NonTerminalId, Vec<Symbol>, Option<TerminalId>, Option<String>)>, NonTerminalId), GrammarError> {
    let mut symbols = SymbolTable::new();
    for name in terminal_names {
        symbols.intern_terminal(name);
    }
    let terminal_set: BTreeSet<&str> = terminal_names.iter().copied().collect();

    let mut reader = Reader::new(text);
    let mut raw_productions = vec![];
    let mut start = None;

    loop {
        reader.skip_whitespace();
        if reader.is_empty() {
            break;
        }
        let lhs_name = reader.read_ident().ok_or_else(|| {
            GrammarError::SyntaxError(format!("expected a nonterminal name at position {}", reader.position))
        })?;
        if terminal_set.contains(lhs_name.as_str()) {
            return Err(GrammarError::SyntaxError(format!(
                "'{lhs_name}' names a terminal and cannot appear on the left of '->'"
            )));
        }
        let lhs = symbols.intern_non_terminal(&lhs_name);
        if start.is_none() {
            start = Some(lhs);
        }
        reader.skip_whitespace();
        reader.expect("->")?;

        loop {
            reader.skip_whitespace();
            let mut rhs = vec![];
            loop {
                reader.skip_whitespace();
                if reader.peek_is(";") || reader.peek_is("|") || reader.peek_is("%prec") || reader.is_empty() {
                    break;
                }
                let name = reader.read_symbol().ok_or_else(|| {
                    GrammarError::SyntaxError(format!("expected a symbol name at position {}", reader.position))
                })?;
                if terminal_set.contains(name.as_str()) {
                    rhs.push(Symbol::Terminal(symbols.intern_terminal(&name)));
                } else {
                    rhs.push(Symbol::NonTerminal(symbols.intern_non_terminal(&name)));
                }
            }
            reader.skip_whitespace();
            let precedence_tag = if reader.peek_is("%prec") {
                reader.expect("%prec")?;
                reader.skip_whitespace();
                let name = reader.read_symbol().ok_or_else(|| {
                    GrammarError::SyntaxError("expected a terminal name after '%prec'".to_string())
                })?;
                Some(symbols.intern_terminal(&name))
            } else {
                None
            };
            raw_productions.push((lhs, rhs, precedence_tag, None));
            reader.skip_whitespace();
            if reader.peek_is("|") {
                reader.expect("|")?;
                continue;
            }
            break;
        }
        reader.skip_whitespace();
        reader.expect(";")?;
    }

    let start = start.ok_or_else(|| GrammarError::SyntaxError("grammar text defines no productions".to_string()))?;
    Ok((symbols, raw_productions, start))
}

/// A minimal hand-rolled scanner for the grammar text format: just enough
/// to split on `->`, `|`, `;`, `%prec` and whitespace-separated identifiers,
/// without bootstrapping this crate's own table builder to parse its own
/// input language.
struct Reader<'a> {
    text: &'a str,
    position: usize,
}

impl<'a> Reader<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, position: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.text[self.position..]
    }

    fn is_empty(&self) -> bool {
        self.remaining().is_empty()
    }

    fn skip_whitespace(&mut self) {
        let remaining = self.remaining();
        let trimmed = remaining.trim_start();
        self.position += remaining.len() - trimmed.len();
    }

    fn peek_is(&self, token: &str) -> bool {
        self.remaining().starts_with(token)
    }

    fn expect(&mut self, token: &str) -> Result<(), GrammarError> {
        if self.peek_is(token) {
            self.position += token.len();
            Ok(())
        } else {
            Err(GrammarError::SyntaxError(format!(
                "expected '{token}' at position {}",
                self.position
            )))
        }
    }

    fn read_ident(&mut self) -> Option<String> {
        let remaining = self.remaining();
        let end = remaining
            .char_indices()
            .take_while(|(_, ch)| ch.is_alphanumeric() || *ch == '_' || *ch == '\'')
            .map(|(index, ch)| index + ch.len_utf8())
            .last()?;
        let ident = remaining[..end].to_string();
        self.position += end;
        Some(ident)
    }

    /// Reads one symbol name: an identifier (`read_ident`), or, when the text
    /// doesn't start with one, a maximal run of punctuation characters. This
    /// is what lets a terminal list name its tokens `"+"`/`"*"`/`"=="` rather
    /// than only alphabetic names like `PLUS`/`STAR` — `->` never appears
    /// here since it is only ever consumed by `expect("->")` right after an
    /// LHS name, before this is called.
    fn read_symbol(&mut self) -> Option<String> {
        if let Some(ident) = self.read_ident() {
            return Some(ident);
        }
        let remaining = self.remaining();
        let end = remaining
            .char_indices()
            .take_while(|(_, ch)| !ch.is_whitespace() && *ch != ';' && *ch != '|' && !ch.is_alphanumeric())
            .map(|(index, ch)| index + ch.len_utf8())
            .last()?;
        let symbol = remaining[..end].to_string();
        self.position += end;
        Some(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::Flavour;

    fn build_nullable_follow_grammar() -> Grammar {
        // S -> B C D A ; A -> n A | ; B -> t ; C -> b D e | ; D -> i E | ; E -> S f | p ;
        let terminals = ["t", "n", "b", "e", "i", "f", "p"];
        let text = "S -> B C D A ; A -> n A | ; B -> t ; C -> b D e | ; D -> i E | ; E -> S f | p ;";
        let (symbols, raw, start) = read_grammar_text(text, &terminals).unwrap();
        Grammar::build(symbols, PrecedenceTable::new(), raw, start).unwrap()
    }

    #[test]
    fn nullable_set_matches_documented_example() {
        let grammar = build_nullable_follow_grammar();
        let name = |nt: NonTerminalId| grammar.symbols.non_terminal_name(nt).to_string();
        let nullable_names: BTreeSet<String> = grammar
            .symbols
            .non_terminals()
            .filter(|nt| grammar.is_nullable(*nt))
            .map(name)
            .collect();
        let expected: BTreeSet<String> = ["A", "C", "D"].iter().map(|s| s.to_string()).collect();
        assert_eq!(nullable_names, expected);
    }

    #[test]
    fn follow_of_c_matches_documented_example() {
        let grammar = build_nullable_follow_grammar();
        let c = grammar.symbols.non_terminal_named("C").unwrap();
        let follow_c: BTreeSet<String> = grammar
            .follow(c)
            .iter()
            .map(|t| grammar.symbols.terminal_name(*t).to_string())
            .collect();
        let expected: BTreeSet<String> = ["i", "n", "$", "f"].iter().map(|s| s.to_string()).collect();
        assert_eq!(follow_c, expected);
    }

    #[test]
    fn start_follow_always_contains_end_of_input() {
        let grammar = build_nullable_follow_grammar();
        assert!(grammar.follow(grammar.start).contains(&grammar.symbols.end_of_input));
    }

    #[test]
    fn fingerprint_is_stable_across_rebuilds() {
        let first = build_nullable_follow_grammar().fingerprint(Flavour::Lalr1);
        let second = build_nullable_follow_grammar().fingerprint(Flavour::Lalr1);
        assert_eq!(first, second);
    }

    #[test]
    fn undefined_nonterminal_is_rejected() {
        let terminals = ["a"];
        let text = "S -> a Missing ;";
        let (symbols, raw, start) = read_grammar_text(text, &terminals).unwrap();
        let err = Grammar::build(symbols, PrecedenceTable::new(), raw, start).unwrap_err();
        assert!(matches!(err, GrammarError::UndefinedNonTerminal(_)));
    }

    #[test]
    fn unreferenced_terminal_is_warned_about_but_a_precedence_only_tag_is_not() {
        let terminals = ["a", "b", "unused", "uminus"];
        let text = "S -> a | b %prec uminus ;";
        let (symbols, raw, start) = read_grammar_text(text, &terminals).unwrap();
        let grammar = Grammar::build(symbols, PrecedenceTable::new(), raw, start).unwrap();
        assert_eq!(grammar.warnings().unused_terminals, vec!["unused".to_string()]);
    }

    #[test]
    fn a_grammar_with_no_dead_terminals_has_an_empty_build_log() {
        let grammar = build_nullable_follow_grammar();
        assert!(grammar.warnings().is_empty());
    }
}
