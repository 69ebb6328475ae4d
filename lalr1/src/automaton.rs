//! Canonical collection construction (C3): item-set closure, GOTO, and a
//! worklist-driven construction of the automaton for all three table
//! flavours. LALR(1) is built as the canonical LR(1) collection followed by
//! a merge pass over states with identical kernel cores, unioning their
//! lookahead sets — the standard "LR(1) then merge" construction, simpler to
//! get right than merging incrementally during construction.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::grammar::Grammar;
use crate::item::{ItemKey, ItemSet};
use crate::production::ProductionId;
use crate::symbol::Symbol;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Flavour {
    Slr,
    Lr1,
    Lalr1,
}

#[derive(Debug, Clone)]
pub struct State {
    pub id: u32,
    pub items: ItemSet,
}

#[derive(Debug, Clone, Default)]
pub struct Automaton {
    pub states: Vec<State>,
    /// `transitions[state][symbol] = target state`, covering both shifts
    /// (terminal symbols) and gotos (nonterminal symbols) uniformly; the
    /// table builder (C4) splits them back out into ACTION/GOTO rows.
    pub transitions: Vec<BTreeMap<Symbol, u32>>,
}

impl Automaton {
    pub fn build(grammar: &Grammar, flavour: Flavour) -> Self {
        let track_lookahead = !matches!(flavour, Flavour::Slr);
        let start_production = ProductionId(0);
        let mut start_items = ItemSet::new();
        let mut start_lookahead = BTreeSet::new();
        if track_lookahead {
            start_lookahead.insert(grammar.symbols.end_of_input);
        }
        start_items.insert(ItemKey::start(start_production), start_lookahead);
        start_items.close(grammar, track_lookahead);

        let mut states = vec![State { id: 0, items: start_items }];
        let mut transitions: Vec<BTreeMap<Symbol, u32>> = vec![BTreeMap::new()];
        let mut kernels: BTreeMap<BTreeSet<(ItemKey, BTreeSet<crate::symbol::TerminalId>)>, u32> = BTreeMap::new();
        kernels.insert(kernel_signature(&states[0].items, grammar), 0);

        let mut worklist = vec![0u32];
        while let Some(state_id) = worklist.pop() {
            let symbols = states[state_id as usize].items.next_symbols(grammar);
            for symbol in symbols {
                let mut goto_kernel = states[state_id as usize].items.goto_kernel(grammar, symbol);
                goto_kernel.close(grammar, track_lookahead);
                let signature = kernel_signature(&goto_kernel, grammar);
                let target = if let Some(existing) = kernels.get(&signature) {
                    *existing
                } else {
                    let new_id = states.len() as u32;
                    kernels.insert(signature, new_id);
                    states.push(State { id: new_id, items: goto_kernel });
                    transitions.push(BTreeMap::new());
                    worklist.push(new_id);
                    new_id
                };
                transitions[state_id as usize].insert(symbol, target);
            }
        }

        let mut automaton = Automaton { states, transitions };
        if matches!(flavour, Flavour::Lalr1) {
            automaton.merge_lalr_states(grammar);
        }
        automaton
    }

    /// Merges states whose kernels agree on `(production, dot)` pairs while
    /// ignoring lookahead, unioning the lookahead sets of the merged items.
    /// Transition tables are rewritten to route through the surviving
    /// (lowest-numbered) state id of each merge class.
    fn merge_lalr_states(&mut self, grammar: &Grammar) {
        let mut core_to_canonical: BTreeMap<BTreeSet<ItemKey>, u32> = BTreeMap::new();
        let mut remap: BTreeMap<u32, u32> = BTreeMap::new();
        for state in &self.states {
            let core: BTreeSet<ItemKey> = state.items.kernel_keys(grammar);
            let canonical = *core_to_canonical.entry(core).or_insert(state.id);
            remap.insert(state.id, canonical);
        }

        let mut merged_items: BTreeMap<u32, ItemSet> = BTreeMap::new();
        for state in &self.states {
            let canonical = remap[&state.id];
            let entry = merged_items.entry(canonical).or_default();
            for (key, lookahead) in state.items.iter() {
                entry.insert(*key, lookahead.clone());
            }
        }
        for items in merged_items.values_mut() {
            items.close(grammar, true);
        }

        let mut surviving_ids: Vec<u32> = merged_items.keys().copied().collect();
        surviving_ids.sort_unstable();
        let mut renumber: BTreeMap<u32, u32> = BTreeMap::new();
        for (new_id, old_id) in surviving_ids.iter().enumerate() {
            renumber.insert(*old_id, new_id as u32);
        }

        let mut new_states = Vec::with_capacity(surviving_ids.len());
        for old_id in &surviving_ids {
            let new_id = renumber[old_id];
            new_states.push(State { id: new_id, items: merged_items.remove(old_id).unwrap() });
        }

        let mut new_transitions = vec![BTreeMap::new(); surviving_ids.len()];
        for (old_from, row) in self.transitions.iter().enumerate() {
            let canonical_from = remap[&(old_from as u32)];
            let new_from = renumber[&canonical_from];
            for (symbol, old_to) in row {
                let canonical_to = remap[old_to];
                let new_to = renumber[&canonical_to];
                new_transitions[new_from as usize].insert(*symbol, new_to);
            }
        }

        self.states = new_states;
        self.transitions = new_transitions;
    }
}

fn kernel_signature(
    items: &ItemSet,
    grammar: &Grammar,
) -> BTreeSet<(ItemKey, BTreeSet<crate::symbol::TerminalId>)> {
    items
        .iter()
        .filter(|(key, _)| key.is_kernel(grammar))
        .map(|(key, lookahead)| (*key, lookahead.clone()))
        .collect()
}
