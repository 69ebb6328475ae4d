//! A line calculator exercising `lalr1::build` and `lalr1::parse` end to
//! end: a small expression grammar with assignment, the four arithmetic
//! operators, unary minus and parenthesised grouping. Grounded in
//! `test_calc`'s `AATerminal`/`AANonTerminal`/`AALEXAN`/`Calc` conventions,
//! but the tables come from a runtime `build()` call instead of a
//! generator's dumped `next_action`/`production_data` match statements, so
//! there is no per-state table to hand-maintain here.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, BufRead, Write};

use lalr1::{build, parse, BuildOptions, NonTerminalId, PrecedenceTable, ProductionId};
use lalr1::{ParseErrorDisplay, SemanticActions, Tables};
use lexan::{LexicalAnalyzer, Token};

const GRAMMAR: &str = r"
%left plus minus ;
%left times divide ;
%left uminus ;
Line -> Expr | id assign Expr ;
Expr -> Expr plus Expr
      | Expr minus Expr
      | Expr times Expr
      | Expr divide Expr
      | lpr Expr rpr
      | minus Expr %prec uminus
      | number
      | id
      ;
";

const TERMINAL_NAMES: &[&str] = &["number", "id", "plus", "minus", "times", "divide", "assign", "lpr", "rpr"];

lazy_static::lazy_static! {
    static ref TABLES: Tables = {
        let (tables, _log) = build(GRAMMAR, TERMINAL_NAMES, &PrecedenceTable::new(), BuildOptions::default())
            .expect("the calculator grammar is a fixed, already-checked-in constant");
        tables
    };
    static ref LEXER: LexicalAnalyzer<lalr1::TerminalId> = {
        let id = |name: &str| TABLES.terminal_id(name).expect("declared in TERMINAL_NAMES above");
        LexicalAnalyzer::new(
            &[
                (id("plus"), "+"),
                (id("minus"), "-"),
                (id("times"), "*"),
                (id("divide"), "/"),
                (id("assign"), "="),
                (id("lpr"), "("),
                (id("rpr"), ")"),
            ],
            &[(id("number"), r"[0-9]+(\.[0-9]+)?"), (id("id"), r"[a-zA-Z]+")],
            &[r"[ \t]+"],
            TABLES.end_of_input,
        )
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CalcError {
    UndefinedVariable,
    DivideByZero,
}

impl fmt::Display for CalcError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CalcError::UndefinedVariable => write!(f, "undefined variable"),
            CalcError::DivideByZero => write!(f, "divide by zero"),
        }
    }
}

/// The semantic value of a parsed symbol: a number, an as-yet-unresolved
/// identifier (only ever seen as the left operand of `id assign Expr` or as
/// a variable reference), or nothing of interest (operators, punctuation).
#[derive(Debug, Clone)]
enum Value {
    Num(f64),
    Name(String),
    Unit,
}

impl Value {
    fn num(&self) -> f64 {
        match self {
            Value::Num(n) => *n,
            _ => panic!("expected a numeric value"),
        }
    }

    fn name(&self) -> &str {
        match self {
            Value::Name(s) => s,
            _ => panic!("expected an identifier"),
        }
    }
}

/// Interpreter state: the variable bindings a `Line -> id assign Expr`
/// accumulates across calls, mirroring `test_calc::Calc`'s `variables` map.
/// Unlike the teacher's error bitmask, failures are reported as ordinary
/// values of [`CalcError`] collected per line, since nothing here needs to
/// survive a crate boundary as a set of flag bits.
struct Calc {
    variables: HashMap<String, f64>,
    errors: Vec<CalcError>,
}

impl Calc {
    fn new() -> Self {
        Self { variables: HashMap::new(), errors: Vec::new() }
    }
}

impl SemanticActions<Value> for Calc {
    fn reduce(&mut self, production: ProductionId, _lhs: NonTerminalId, mut args: Vec<Value>) -> Value {
        match production.0 {
            1 => args.pop().expect("Line -> Expr"),
            2 => {
                // Line -> id assign Expr
                let value = args.pop().expect("Expr").num();
                let name = args.remove(0).name().to_string();
                self.variables.insert(name, value);
                Value::Num(value)
            }
            3 => Value::Num(args[0].num() + args[2].num()),
            4 => Value::Num(args[0].num() - args[2].num()),
            5 => Value::Num(args[0].num() * args[2].num()),
            6 => {
                let divisor = args[2].num();
                if divisor == 0.0 {
                    self.errors.push(CalcError::DivideByZero);
                    Value::Num(0.0)
                } else {
                    Value::Num(args[0].num() / divisor)
                }
            }
            7 => args.into_iter().nth(1).expect("lpr Expr rpr"),
            8 => Value::Num(-args[1].num()),
            9 => args.pop().expect("number"),
            10 => {
                let name = args[0].name().to_string();
                match self.variables.get(&name) {
                    Some(value) => Value::Num(*value),
                    None => {
                        self.errors.push(CalcError::UndefinedVariable);
                        Value::Num(0.0)
                    }
                }
            }
            _ => Value::Unit,
        }
    }
}

fn value_of_token(token: &Token<lalr1::TerminalId>) -> Value {
    if *token.tag() == TABLES.terminal_id("number").unwrap() {
        Value::Num(token.lexeme().parse().expect("NUMBER lexeme is always a valid float"))
    } else if *token.tag() == TABLES.terminal_id("id").unwrap() {
        Value::Name(token.lexeme().to_string())
    } else {
        Value::Unit
    }
}

fn eval_line(calc: &mut Calc, line: &str) {
    let stream = LEXER.token_stream(line.to_string(), String::new());
    calc.errors.clear();
    match parse(&TABLES, stream, calc, value_of_token) {
        Ok(value) => {
            for error in &calc.errors {
                println!("error: {error}");
            }
            println!("{}", value.num());
        }
        Err(error) => println!("{}", ParseErrorDisplay::new(&error, &TABLES)),
    }
}

fn main() {
    let mut calc = Calc::new();
    let stdin = io::stdin();
    print!("> ");
    io::stdout().flush().ok();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        if !line.trim().is_empty() {
            eval_line(&mut calc, &line);
        }
        print!("> ");
        io::stdout().flush().ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(calc: &mut Calc, line: &str) -> Result<f64, String> {
        let stream = LEXER.token_stream(line.to_string(), String::new());
        calc.errors.clear();
        match parse(&TABLES, stream, calc, value_of_token) {
            Ok(value) => Ok(value.num()),
            Err(error) => Err(format!("{}", ParseErrorDisplay::new(&error, &TABLES))),
        }
    }

    #[test]
    fn arithmetic_follows_precedence_and_associativity() {
        let mut calc = Calc::new();
        assert_eq!(run(&mut calc, "1 + 2 * 3"), Ok(7.0));
        assert_eq!(run(&mut calc, "10 - 2 - 3"), Ok(5.0));
        assert_eq!(run(&mut calc, "(1 + 2) * 3"), Ok(9.0));
        assert_eq!(run(&mut calc, "-2 * 3"), Ok(-6.0));
        assert_eq!(run(&mut calc, "-(2 + 3)"), Ok(-5.0));
    }

    #[test]
    fn assignment_binds_a_variable_for_later_lookup() {
        let mut calc = Calc::new();
        assert_eq!(run(&mut calc, "x = 41"), Ok(41.0));
        assert_eq!(run(&mut calc, "x + 1"), Ok(42.0));
    }

    #[test]
    fn undefined_variable_is_reported_but_still_yields_a_value() {
        let mut calc = Calc::new();
        let result = run(&mut calc, "y + 1");
        assert_eq!(result, Ok(1.0));
        assert_eq!(calc.errors, vec![CalcError::UndefinedVariable]);
    }

    #[test]
    fn divide_by_zero_is_reported_but_still_yields_a_value() {
        let mut calc = Calc::new();
        let result = run(&mut calc, "1 / 0");
        assert_eq!(result, Ok(0.0));
        assert_eq!(calc.errors, vec![CalcError::DivideByZero]);
    }

    #[test]
    fn a_malformed_line_is_a_syntax_error_not_a_panic() {
        let mut calc = Calc::new();
        assert!(run(&mut calc, "1 + + 2").is_err());
    }
}
