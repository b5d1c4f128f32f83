use std::{collections::BTreeMap, fmt::Display};

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    Limits,
    error::{Fault, line_at, named_source},
    output::Output,
    parse::{Node, Op, Parser},
};

#[derive(Error, Debug, Diagnostic)]
pub enum SemanticFault {
    #[error("undefined variable `{name}`")]
    #[diagnostic(
        code(minimus::eval::undefined_variable),
        help("variables must be assigned before they are read")
    )]
    UndefinedVariable {
        #[source_code]
        src: NamedSource<String>,
        #[label("read before any assignment")]
        bad_bit: Option<SourceSpan>,
        name: char,
        line: Option<usize>,
    },

    #[error("division by zero")]
    #[diagnostic(code(minimus::eval::division_by_zero))]
    DivisionByZero {
        #[source_code]
        src: NamedSource<String>,
        #[label("right-hand side is 0")]
        bad_bit: Option<SourceSpan>,
        line: Option<usize>,
    },

    #[error("integer overflow evaluating `{lhs} {op} {rhs}`")]
    #[diagnostic(code(minimus::eval::overflow))]
    Overflow {
        #[source_code]
        src: NamedSource<String>,
        #[label("result does not fit in 64 bits")]
        bad_bit: Option<SourceSpan>,
        op: Op,
        lhs: i64,
        rhs: i64,
        line: Option<usize>,
    },
}

impl SemanticFault {
    pub fn line(&self) -> Option<usize> {
        match self {
            SemanticFault::UndefinedVariable { line, .. }
            | SemanticFault::DivisionByZero { line, .. }
            | SemanticFault::Overflow { line, .. } => *line,
        }
    }
}

/// Name-to-value bindings of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableTable {
    values: BTreeMap<char, i64>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: char) -> Option<i64> {
        self.values.get(&name).copied()
    }

    pub fn insert(&mut self, name: char, value: i64) {
        self.values.insert(name, value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Bindings in alphabetical order.
    pub fn iter(&self) -> impl Iterator<Item = (char, i64)> + '_ {
        self.values.iter().map(|(name, value)| (*name, *value))
    }
}

impl<const N: usize> From<[(char, i64); N]> for VariableTable {
    fn from(bindings: [(char, i64); N]) -> Self {
        VariableTable {
            values: BTreeMap::from(bindings),
        }
    }
}

impl Display for VariableTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        write!(f, "}}")
    }
}

/// What a completed run leaves behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// Value the top-level node evaluated to.
    pub value: i64,
    pub variables: VariableTable,
}

/// Tree-walking evaluator over a single variable table.
pub struct Interpreter<'de, O> {
    filename: Option<&'de str>,
    whole: &'de str,
    limits: Limits,
    variables: VariableTable,
    output: O,
}

impl<'de, O: Output> Interpreter<'de, O> {
    pub fn new(filename: Option<&'de str>, whole: &'de str, output: O) -> Self {
        Self::with_limits(filename, whole, output, Limits::default())
    }

    pub fn with_limits(
        filename: Option<&'de str>,
        whole: &'de str,
        output: O,
        limits: Limits,
    ) -> Self {
        Self {
            filename,
            whole,
            limits,
            variables: VariableTable::new(),
            output,
        }
    }

    /// Parses and evaluates the whole program, then hands the final table to the output.
    pub fn run(mut self) -> Result<Execution, Fault> {
        let program = Parser::with_limits(self.filename, self.whole, self.limits).parse()?;
        let value = self.evaluate(&program)?;
        self.output.snapshot(&self.variables);
        debug!(value, variables = self.variables.len(), "program finished");
        Ok(Execution {
            value,
            variables: self.variables,
        })
    }

    pub fn variables(&self) -> &VariableTable {
        &self.variables
    }

    /// Evaluates `node` against the current table. Statements yield `0`.
    pub fn evaluate(&mut self, node: &Node) -> Result<i64, Fault> {
        Ok(match node {
            Node::Integer(value) => *value,
            Node::Variable { name, byte } => match self.variables.get(*name) {
                Some(value) => value,
                None => return Err(self.undefined(*name, *byte)),
            },
            Node::Assign { name, value } => {
                let value = self.evaluate(value)?;
                self.assign(*name, value)
            }
            Node::Binary { .. } => self.chain(node)?,
            Node::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)? != 0 {
                    self.evaluate(then_branch)?
                } else if let Some(else_branch) = else_branch {
                    self.evaluate(else_branch)?
                } else {
                    0
                }
            }
            Node::While { condition, body } => {
                while self.evaluate(condition)? != 0 {
                    self.evaluate(body)?;
                }
                0
            }
            Node::Print(value) => {
                let value = self.evaluate(value)?;
                self.print(value);
                0
            }
            Node::Sequence(statements) => {
                for statement in statements {
                    self.evaluate(statement)?;
                }
                0
            }
            Node::Empty => 0,
        })
    }

    /// Walks the left spine of `node` without recursing, then applies each
    /// operator left to right. `a+b+c+...` parses into a spine as long as the chain.
    fn chain(&mut self, node: &Node) -> Result<i64, Fault> {
        let mut spine = Vec::new();
        let mut leftmost = node;
        while let Node::Binary { op, lhs, rhs, byte } = leftmost {
            spine.push((*op, &**rhs, *byte));
            leftmost = &**lhs;
        }

        let mut value = self.evaluate(leftmost)?;
        for (op, rhs, byte) in spine.into_iter().rev() {
            let rhs = self.evaluate(rhs)?;
            value = self.apply(op, value, rhs, byte)?;
        }
        Ok(value)
    }

    fn assign(&mut self, name: char, value: i64) -> i64 {
        trace!(%name, value, "assign");
        self.variables.insert(name, value);
        value
    }

    fn print(&mut self, value: i64) {
        trace!(value, "print");
        self.output.print(value);
    }

    #[cold]
    #[inline(never)]
    fn undefined(&self, name: char, byte: usize) -> Fault {
        SemanticFault::UndefinedVariable {
            src: self.source(),
            bad_bit: self.span(byte, 1),
            name,
            line: line_at(self.whole, byte),
        }
        .into()
    }

    fn apply(&self, op: Op, lhs: i64, rhs: i64, byte: usize) -> Result<i64, Fault> {
        if op.is_relational() {
            let holds = match op {
                Op::Less => lhs < rhs,
                Op::Greater => lhs > rhs,
                Op::LessEqual => lhs <= rhs,
                Op::GreaterEqual => lhs >= rhs,
                Op::EqualEqual => lhs == rhs,
                _ => lhs != rhs,
            };
            return Ok(i64::from(holds));
        }

        if op == Op::Slash && rhs == 0 {
            return Err(SemanticFault::DivisionByZero {
                src: self.source(),
                bad_bit: self.span(byte, 1),
                line: line_at(self.whole, byte),
            }
            .into());
        }

        let result = match op {
            Op::Plus => lhs.checked_add(rhs),
            Op::Minus => lhs.checked_sub(rhs),
            Op::Star => lhs.checked_mul(rhs),
            _ => lhs.checked_div(rhs),
        };
        result.ok_or_else(|| {
            SemanticFault::Overflow {
                src: self.source(),
                bad_bit: self.span(byte, op.to_string().len()),
                op,
                lhs,
                rhs,
                line: line_at(self.whole, byte),
            }
            .into()
        })
    }

    fn source(&self) -> NamedSource<String> {
        named_source(self.filename, self.whole)
    }

    /// Label span, dropped for trees that did not come from this source.
    fn span(&self, byte: usize, len: usize) -> Option<SourceSpan> {
        (byte + len <= self.whole.len()).then(|| SourceSpan::from(byte..byte + len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FaultKind, output::Recorder};

    fn num(value: i64) -> Box<Node> {
        Box::new(Node::Integer(value))
    }

    fn var(name: char) -> Box<Node> {
        Box::new(Node::Variable { name, byte: 0 })
    }

    fn binary(op: Op, lhs: Box<Node>, rhs: Box<Node>) -> Box<Node> {
        Box::new(Node::Binary {
            op,
            lhs,
            rhs,
            byte: 0,
        })
    }

    fn interpreter(recorder: &mut Recorder) -> Interpreter<'static, &mut Recorder> {
        Interpreter::new(None, "", recorder)
    }

    #[test]
    fn integer_literal() {
        let mut recorder = Recorder::default();
        let mut interp = interpreter(&mut recorder);
        assert_eq!(interp.evaluate(&Node::Integer(42)).unwrap(), 42);
    }

    #[test]
    fn arithmetic() {
        let mut recorder = Recorder::default();
        let mut interp = interpreter(&mut recorder);
        let cases = [
            (Op::Plus, 2, 3, 5),
            (Op::Minus, 10, 3, 7),
            (Op::Star, 4, 5, 20),
            (Op::Slash, 20, 4, 5),
            (Op::Slash, 7, 2, 3),
            (Op::Slash, -7, 2, -3),
        ];
        for (op, lhs, rhs, expected) in cases {
            let node = binary(op, num(lhs), num(rhs));
            assert_eq!(interp.evaluate(&node).unwrap(), expected, "{lhs} {op} {rhs}");
        }
    }

    #[test]
    fn chains_apply_left_to_right() {
        let mut recorder = Recorder::default();
        let mut interp = interpreter(&mut recorder);
        let node = binary(Op::Minus, binary(Op::Minus, num(10), num(4)), num(3));
        assert_eq!(interp.evaluate(&node).unwrap(), 3);
        let node = binary(Op::Slash, binary(Op::Star, num(7), num(2)), num(4));
        assert_eq!(interp.evaluate(&node).unwrap(), 3);
    }

    #[test]
    fn long_chains_do_not_recurse() {
        let mut recorder = Recorder::default();
        let mut interp = interpreter(&mut recorder);
        let mut node = num(0);
        for _ in 0..100_000 {
            node = binary(Op::Plus, node, num(1));
        }
        assert_eq!(interp.evaluate(&node).unwrap(), 100_000);
    }

    #[test]
    fn comparisons_yield_zero_or_one() {
        let mut recorder = Recorder::default();
        let mut interp = interpreter(&mut recorder);
        let ops = [
            Op::Less,
            Op::Greater,
            Op::LessEqual,
            Op::GreaterEqual,
            Op::EqualEqual,
            Op::NotEqual,
        ];
        for op in ops {
            for (lhs, rhs) in [(1, 2), (2, 2), (3, 2), (-5, 5)] {
                let value = interp.evaluate(&binary(op, num(lhs), num(rhs))).unwrap();
                assert!(value == 0 || value == 1, "{lhs} {op} {rhs} gave {value}");
            }
        }
        assert_eq!(interp.evaluate(&binary(Op::NotEqual, num(2), num(2))).unwrap(), 0);
        assert_eq!(interp.evaluate(&binary(Op::LessEqual, num(2), num(2))).unwrap(), 1);
    }

    #[test]
    fn division_by_zero() {
        let mut recorder = Recorder::default();
        let mut interp = interpreter(&mut recorder);
        let e = interp
            .evaluate(&binary(Op::Slash, num(10), num(0)))
            .unwrap_err();
        assert_eq!(e.kind(), FaultKind::Semantic);
        assert!(matches!(e.as_semantic(), Some(SemanticFault::DivisionByZero { .. })));
    }

    #[test]
    fn overflow_is_a_fault() {
        let mut recorder = Recorder::default();
        let mut interp = interpreter(&mut recorder);
        let e = interp
            .evaluate(&binary(Op::Star, num(i64::MAX), num(2)))
            .unwrap_err();
        assert!(matches!(e.as_semantic(), Some(SemanticFault::Overflow { .. })));

        let e = interp
            .evaluate(&binary(Op::Slash, num(i64::MIN), num(-1)))
            .unwrap_err();
        assert!(matches!(e.as_semantic(), Some(SemanticFault::Overflow { .. })));
    }

    #[test]
    fn assignment_stores_and_yields() {
        let mut recorder = Recorder::default();
        let mut interp = interpreter(&mut recorder);
        let node = Node::Assign {
            name: 'x',
            value: num(42),
        };
        assert_eq!(interp.evaluate(&node).unwrap(), 42);
        assert_eq!(interp.variables().get('x'), Some(42));
    }

    #[test]
    fn reassignment_overwrites() {
        let mut recorder = Recorder::default();
        let mut interp = interpreter(&mut recorder);
        for value in [1, 2, 3] {
            interp
                .evaluate(&Node::Assign {
                    name: 'x',
                    value: num(value),
                })
                .unwrap();
        }
        assert_eq!(interp.variables(), &VariableTable::from([('x', 3)]));
    }

    #[test]
    fn undefined_variable() {
        let mut recorder = Recorder::default();
        let mut interp = interpreter(&mut recorder);
        let e = interp.evaluate(&var('q')).unwrap_err();
        assert!(matches!(
            e.as_semantic(),
            Some(SemanticFault::UndefinedVariable { name: 'q', line: None, .. })
        ));
        assert_eq!(e.to_string(), "undefined variable `q`");
    }

    #[test]
    fn if_without_else_yields_zero_and_skips_then() {
        let mut recorder = Recorder::default();
        let mut interp = interpreter(&mut recorder);
        let node = Node::If {
            condition: num(0),
            then_branch: Box::new(Node::Print(num(1))),
            else_branch: None,
        };
        assert_eq!(interp.evaluate(&node).unwrap(), 0);
        drop(interp);
        assert!(recorder.values().is_empty());
    }

    #[test]
    fn if_yields_the_taken_branch() {
        let mut recorder = Recorder::default();
        let mut interp = interpreter(&mut recorder);
        let node = |condition| Node::If {
            condition: num(condition),
            then_branch: num(10),
            else_branch: Some(num(20)),
        };
        assert_eq!(interp.evaluate(&node(7)).unwrap(), 10);
        assert_eq!(interp.evaluate(&node(-1)).unwrap(), 10);
        assert_eq!(interp.evaluate(&node(0)).unwrap(), 20);
    }

    #[test]
    fn while_with_false_condition_never_runs_body() {
        let mut recorder = Recorder::default();
        let mut interp = interpreter(&mut recorder);
        let node = Node::While {
            condition: num(0),
            body: Box::new(Node::Print(var('z'))),
        };
        assert_eq!(interp.evaluate(&node).unwrap(), 0);
    }

    #[test]
    fn print_and_sequence_yield_zero() {
        let mut recorder = Recorder::default();
        let mut interp = interpreter(&mut recorder);
        let node = Node::Sequence(vec![
            Node::Print(num(3)),
            Node::Empty,
            Node::Print(binary(Op::Plus, num(1), num(1))),
        ]);
        assert_eq!(interp.evaluate(&node).unwrap(), 0);
        drop(interp);
        assert_eq!(recorder.values(), vec![3, 2]);
    }

    #[test]
    fn empty_yields_zero() {
        let mut recorder = Recorder::default();
        let mut interp = interpreter(&mut recorder);
        assert_eq!(interp.evaluate(&Node::Empty).unwrap(), 0);
    }

    #[test]
    fn run_reports_source_lines_for_semantic_faults() {
        let mut recorder = Recorder::default();
        let src = "{\n  a = 4;\n  b = a / (a - 4);\n}";
        let e = Interpreter::new(Some("div.min"), src, &mut recorder)
            .run()
            .unwrap_err();
        assert!(matches!(e.as_semantic(), Some(SemanticFault::DivisionByZero { .. })));
        assert_eq!(e.line(), Some(3));

        let e = Interpreter::new(None, "a = 1;\nprint(x);", &mut recorder)
            .run()
            .unwrap_err();
        assert_eq!(e.line(), Some(2));
    }

    #[test]
    fn table_display() {
        let table = VariableTable::from([('b', 7), ('a', 12)]);
        assert_eq!(table.to_string(), "{a=12, b=7}");
        assert_eq!(VariableTable::new().to_string(), "{}");
    }
}
