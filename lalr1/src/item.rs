// Item-set primitives (C2). Per spec §9's design note, items are kept as a
// flat `(production_id, dot_position, lookahead)` record keyed by sorted
// kernel items rather than the original's graph of `Rc<ParserStateData>`
// nodes linked by shift/goto maps.

use std::collections::{BTreeMap, BTreeSet};

use crate::grammar::Grammar;
use crate::production::ProductionId;
use crate::symbol::{Symbol, TerminalId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemKey {
    pub production: ProductionId,
    pub dot: usize,
}

impl ItemKey {
    pub fn start(production: ProductionId) -> Self {
        Self { production, dot: 0 }
    }

    pub fn next_symbol(&self, grammar: &Grammar) -> Option<Symbol> {
        grammar.production(self.production).rhs.get(self.dot).copied()
    }

    pub fn is_reducible(&self, grammar: &Grammar) -> bool {
        self.dot >= grammar.production(self.production).len()
    }

    pub fn shifted(&self) -> Self {
        Self {
            production: self.production,
            dot: self.dot + 1,
        }
    }

    /// A kernel item either has a non-zero dot or derives the augmented
    /// start production; every other item is introduced by closure.
    pub fn is_kernel(&self, grammar: &Grammar) -> bool {
        self.dot > 0 || grammar.production(self.production).lhs == grammar.symbols.augmented_start
    }
}

/// A mapping from item key to its accumulated lookahead set. For SLR the
/// lookahead set is ignored by the table builder (FOLLOW is consulted
/// instead); for LR(1)/LALR(1) it drives both closure and reduce actions.
#[derive(Debug, Clone, Default)]
pub struct ItemSet(pub BTreeMap<ItemKey, BTreeSet<TerminalId>>);

impl ItemSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `lookahead` for `key`, returning whether this changed the set:
    /// a brand-new key is always a change (even with an empty lookahead,
    /// which is exactly the SLR case), as is a previously-seen key gaining
    /// new lookahead terminals.
    pub fn insert(&mut self, key: ItemKey, lookahead: BTreeSet<TerminalId>) -> bool {
        use std::collections::btree_map::Entry;
        match self.0.entry(key) {
            Entry::Vacant(entry) => {
                entry.insert(lookahead);
                true
            }
            Entry::Occupied(mut entry) => {
                let before = entry.get().len();
                entry.get_mut().extend(lookahead);
                entry.get().len() > before
            }
        }
    }

    pub fn kernel_keys(&self, grammar: &Grammar) -> BTreeSet<ItemKey> {
        self.0.keys().filter(|key| key.is_kernel(grammar)).copied().collect()
    }

    /// Closes `self` under the LR(1) closure rule of spec §4.2: for every
    /// item `[A -> a.Bb, x]`, add `[B -> .g, y]` for each `y` in
    /// `FIRST(b x)`, for every production `B -> g`.
    pub fn close(&mut self, grammar: &Grammar, track_lookahead: bool) {
        loop {
            let mut additions: Vec<(ItemKey, BTreeSet<TerminalId>)> = vec![];
            for (key, lookahead) in self.0.iter() {
                let Some(Symbol::NonTerminal(non_terminal)) = key.next_symbol(grammar) else {
                    continue;
                };
                let rest = &grammar.production(key.production).rhs[key.dot + 1..];
                let propagated = if track_lookahead {
                    grammar.first_of_sequence_followed_by(rest, lookahead)
                } else {
                    BTreeSet::new()
                };
                for production in grammar.productions_of(non_terminal) {
                    additions.push((ItemKey::start(production), propagated.clone()));
                }
            }
            let mut changed = false;
            for (key, lookahead) in additions {
                if self.insert(key, lookahead) {
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }

    /// The kernel of the state reached by shifting `symbol`: every item
    /// whose next symbol is `symbol`, with the dot advanced.
    pub fn goto_kernel(&self, grammar: &Grammar, symbol: Symbol) -> ItemSet {
        let mut result = ItemSet::new();
        for (key, lookahead) in self.0.iter() {
            if key.next_symbol(grammar) == Some(symbol) {
                result.insert(key.shifted(), lookahead.clone());
            }
        }
        result
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ItemKey, &BTreeSet<TerminalId>)> {
        self.0.iter()
    }

    pub fn get(&self, key: &ItemKey) -> Option<&BTreeSet<TerminalId>> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &ItemKey) -> Option<&mut BTreeSet<TerminalId>> {
        self.0.get_mut(key)
    }

    pub fn reducible_items<'a>(&'a self, grammar: &'a Grammar) -> impl Iterator<Item = (&'a ItemKey, &'a BTreeSet<TerminalId>)> {
        self.0.iter().filter(move |(key, _)| key.is_reducible(grammar))
    }

    /// The symbols immediately after the dot across all items, used to
    /// enumerate the candidate `GOTO` targets of a state.
    pub fn next_symbols(&self, grammar: &Grammar) -> BTreeSet<Symbol> {
        self.0.keys().filter_map(|key| key.next_symbol(grammar)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{read_grammar_text, Grammar};
    use crate::symbol::PrecedenceTable;

    #[test]
    fn slr_closure_reaches_every_transitive_level() {
        // S -> A ; A -> B ; B -> c ; needs three closure levels (S -> .A,
        // A -> .B, B -> .c) to reach the terminal `c`. With no lookahead
        // tracked (the SLR case), a closure step that only reports "changed"
        // when an item's lookahead set grows never sees past the first
        // level, since every inserted item carries an empty lookahead set.
        let terminals = ["c"];
        let text = "S -> A ; A -> B ; B -> c ;";
        let (symbols, raw, start) = read_grammar_text(text, &terminals).unwrap();
        let grammar = Grammar::build(symbols, PrecedenceTable::new(), raw, start).unwrap();

        let mut items = ItemSet::new();
        items.insert(ItemKey::start(ProductionId(0)), BTreeSet::new());
        items.close(&grammar, false);

        let c = grammar.symbols.terminal_named("c").unwrap();
        let reaches_c = items
            .iter()
            .any(|(key, _)| key.next_symbol(&grammar) == Some(Symbol::Terminal(c)));
        assert!(reaches_c, "closure must reach B -> .c through A and B");
    }
}
