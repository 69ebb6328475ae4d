// Flat, id-indexed symbol representation. The original generator interned
// terminals and nonterminals as `Rc`-shared nodes so that equality and
// ordering were defined by name comparisons; here symbols are small `Copy`
// ids and all name lookups go through `SymbolTable`, which is the only
// place a symbol's name is stored.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies a terminal by its position in the grammar's terminal list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct TerminalId(pub u32);

/// Identifies a nonterminal by its position in the grammar's nonterminal list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct NonTerminalId(pub u32);

/// Terminals/nonterminals carry no name on their own (see `SymbolTable`); the
/// `Display` impl only exists so generic error types (spec §7's
/// `ParseError<T: Display>`) can be instantiated with these ids directly.
/// For a human-readable rendering use `SymbolTable::terminal_name` /
/// `Tables::terminal_name`.
impl fmt::Display for TerminalId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

impl fmt::Display for NonTerminalId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// A symbol occurring on the right-hand side of a production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Symbol {
    Terminal(TerminalId),
    NonTerminal(NonTerminalId),
}

impl Symbol {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Symbol::Terminal(_))
    }

    pub fn is_non_terminal(&self) -> bool {
        matches!(self, Symbol::NonTerminal(_))
    }
}

/// Shift/reduce tie-breaking behaviour for a terminal's declared precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Associativity {
    Left,
    Right,
    #[default]
    NonAssoc,
}

impl fmt::Display for Associativity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Associativity::Left => write!(f, "left"),
            Associativity::Right => write!(f, "right"),
            Associativity::NonAssoc => write!(f, "nonassoc"),
        }
    }
}

/// Name interning for both symbol kinds, plus the reserved names `$` (end of
/// input) and `S'` (the augmented start nonterminal) which are always
/// present and never user-assignable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolTable {
    terminal_names: Vec<String>,
    terminal_ids: BTreeMap<String, TerminalId>,
    non_terminal_names: Vec<String>,
    non_terminal_ids: BTreeMap<String, NonTerminalId>,
    pub end_of_input: TerminalId,
    pub augmented_start: NonTerminalId,
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut table = Self {
            terminal_names: vec![],
            terminal_ids: BTreeMap::new(),
            non_terminal_names: vec![],
            non_terminal_ids: BTreeMap::new(),
            end_of_input: TerminalId(0),
            augmented_start: NonTerminalId(0),
        };
        table.end_of_input = table.intern_terminal("$");
        table.augmented_start = table.intern_non_terminal("S'");
        table
    }

    pub fn intern_terminal(&mut self, name: &str) -> TerminalId {
        if let Some(id) = self.terminal_ids.get(name) {
            return *id;
        }
        let id = TerminalId(self.terminal_names.len() as u32);
        self.terminal_names.push(name.to_string());
        self.terminal_ids.insert(name.to_string(), id);
        id
    }

    pub fn intern_non_terminal(&mut self, name: &str) -> NonTerminalId {
        if let Some(id) = self.non_terminal_ids.get(name) {
            return *id;
        }
        let id = NonTerminalId(self.non_terminal_names.len() as u32);
        self.non_terminal_names.push(name.to_string());
        self.non_terminal_ids.insert(name.to_string(), id);
        id
    }

    pub fn terminal_named(&self, name: &str) -> Option<TerminalId> {
        self.terminal_ids.get(name).copied()
    }

    pub fn non_terminal_named(&self, name: &str) -> Option<NonTerminalId> {
        self.non_terminal_ids.get(name).copied()
    }

    pub fn terminal_name(&self, id: TerminalId) -> &str {
        &self.terminal_names[id.0 as usize]
    }

    pub fn non_terminal_name(&self, id: NonTerminalId) -> &str {
        &self.non_terminal_names[id.0 as usize]
    }

    pub fn terminals(&self) -> impl Iterator<Item = TerminalId> {
        (0..self.terminal_names.len() as u32).map(TerminalId)
    }

    pub fn non_terminals(&self) -> impl Iterator<Item = NonTerminalId> {
        (0..self.non_terminal_names.len() as u32).map(NonTerminalId)
    }

    /// Names in id order (id `i` at index `i`), suitable for a cache blob
    /// that needs to reconstruct `TerminalId -> name` lookups without the
    /// rest of the grammar.
    pub fn terminal_names_by_id(&self) -> Vec<String> {
        self.terminal_names.clone()
    }

    pub fn non_terminal_names_by_id(&self) -> Vec<String> {
        self.non_terminal_names.clone()
    }

    pub fn terminal_names_sorted(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.terminal_names.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn non_terminal_names_sorted(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.non_terminal_names.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Declared precedence and associativity for terminals, used to resolve
/// shift/reduce conflicts (§4.4). A terminal absent from this table has no
/// declared precedence, which forces any conflict it is party to to be
/// recorded rather than silently resolved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrecedenceTable(BTreeMap<TerminalId, (u16, Associativity)>);

impl PrecedenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, terminal: TerminalId, precedence: u16, associativity: Associativity) {
        self.0.insert(terminal, (precedence, associativity));
    }

    pub fn get(&self, terminal: TerminalId) -> Option<(u16, Associativity)> {
        self.0.get(&terminal).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TerminalId, &(u16, Associativity))> {
        self.0.iter()
    }
}
