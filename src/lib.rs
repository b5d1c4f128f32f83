//! Lexer, recursive-descent parser and tree-walking interpreter for Minimus,
//! a tiny imperative language whose only type is the signed integer.
//!
//! ```
//! use minimus::{Recorder, VariableTable};
//!
//! let mut output = Recorder::default();
//! let run = minimus::run("{ a = 12 * (5 + 2); print(a - 4); }", &mut output).unwrap();
//! assert_eq!(run.variables, VariableTable::from([('a', 84)]));
//! assert_eq!(output.values(), vec![80]);
//! ```

pub mod error;
pub mod eval;
pub mod lex;
pub mod output;
pub mod parse;

pub use error::{Fault, FaultKind};
pub use eval::{Execution, Interpreter, VariableTable};
pub use lex::{Lexer, Token, TokenKind};
pub use output::{Emitted, Output, Recorder, Stdout};
pub use parse::{Node, NodeKind, Op, Parser};

/// Resource limits for a single parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Deepest nesting of statements and parenthesized or assigned
    /// sub-expressions before parsing gives up. Operator chains are flat and do
    /// not count. The default leaves room to parse and evaluate a program at the
    /// limit on a thread with a 2 MiB stack.
    pub max_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits { max_depth: 128 }
    }
}

/// Lexes, parses and runs `source` with default limits.
pub fn run<O: Output>(source: &str, output: O) -> Result<Execution, Fault> {
    Interpreter::new(None, source, output).run()
}
