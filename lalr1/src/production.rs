// A production is an ordered triple `(lhs, rhs, id)` per spec §3. Where the
// original generator wrapped productions in `Rc<ProductionData>` so items
// could cheaply clone a handle to one, here a `Production` is plain data and
// items refer to it by `ProductionId` (its index in `Grammar::productions`).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::symbol::{Associativity, NonTerminalId, Symbol, SymbolTable, TerminalId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProductionId(pub u32);

/// An optional named precedence tag, resolved at grammar-build time to a
/// `(precedence, associativity)` pair either from an explicit `%prec` name
/// or, absent one, from the rightmost terminal in the production's body
/// (the open question noted in spec §9; see `DESIGN.md`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Production {
    pub id: ProductionId,
    pub lhs: NonTerminalId,
    pub rhs: Vec<Symbol>,
    pub precedence_tag: Option<TerminalId>,
    pub action: Option<String>,
}

impl Production {
    pub fn len(&self) -> usize {
        self.rhs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rhs.is_empty()
    }

    pub fn precedence(&self, precedence_table: &crate::symbol::PrecedenceTable) -> Option<(u16, Associativity)> {
        let tag = self.precedence_tag.or_else(|| {
            self.rhs.iter().rev().find_map(|symbol| match symbol {
                Symbol::Terminal(terminal) => Some(*terminal),
                Symbol::NonTerminal(_) => None,
            })
        })?;
        precedence_table.get(tag)
    }

    pub fn is_start_production(&self, augmented_start: NonTerminalId) -> bool {
        self.lhs == augmented_start
    }

    pub fn display<'a>(&'a self, symbols: &'a SymbolTable) -> ProductionDisplay<'a> {
        ProductionDisplay {
            production: self,
            symbols,
            dot: None,
        }
    }
}

pub struct ProductionDisplay<'a> {
    production: &'a Production,
    symbols: &'a SymbolTable,
    dot: Option<usize>,
}

impl<'a> ProductionDisplay<'a> {
    pub fn with_dot(mut self, dot: usize) -> Self {
        self.dot = Some(dot);
        self
    }
}

impl<'a> fmt::Display for ProductionDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ->", self.symbols.non_terminal_name(self.production.lhs))?;
        if self.production.rhs.is_empty() {
            write!(f, " <empty>")?;
        }
        for (index, symbol) in self.production.rhs.iter().enumerate() {
            if self.dot == Some(index) {
                write!(f, " .")?;
            }
            match symbol {
                Symbol::Terminal(terminal) => write!(f, " {}", self.symbols.terminal_name(*terminal))?,
                Symbol::NonTerminal(non_terminal) => {
                    write!(f, " {}", self.symbols.non_terminal_name(*non_terminal))?
                }
            }
        }
        if self.dot == Some(self.production.rhs.len()) {
            write!(f, " .")?;
        }
        Ok(())
    }
}
