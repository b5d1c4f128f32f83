use std::fmt::Display;

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;
use tracing::debug;

use crate::{
    Limits,
    error::{Fault, InternalFault, named_source},
    lex::{Lexer, Token, TokenKind},
};

#[derive(Error, Debug, Diagnostic)]
pub enum SyntaxFault {
    #[error("expected {expected} {context}, found {found}")]
    #[diagnostic(code(minimus::parse::unexpected_token))]
    UnexpectedToken {
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        bad_bit: SourceSpan,
        #[help]
        advice: String,
        expected: String,
        context: String,
        found: String,
        line: usize,
    },

    #[error("unexpected input after end of program")]
    #[diagnostic(
        code(minimus::parse::trailing_input),
        help("look for an unbalanced closing bracket or a stray `else`")
    )]
    TrailingInput {
        #[source_code]
        src: NamedSource<String>,
        #[label("program should have ended before this")]
        bad_bit: SourceSpan,
        line: usize,
    },

    #[error("integer literal `{literal}` does not fit in a 64-bit signed integer")]
    #[diagnostic(code(minimus::parse::integer_out_of_range))]
    IntegerOutOfRange {
        #[source_code]
        src: NamedSource<String>,
        #[label("this literal")]
        bad_bit: SourceSpan,
        literal: String,
        line: usize,
    },

    #[error("program nests deeper than {limit} levels")]
    #[diagnostic(
        code(minimus::parse::nesting_too_deep),
        help("split the expression up or raise the depth limit")
    )]
    NestingTooDeep {
        #[source_code]
        src: NamedSource<String>,
        #[label("limit reached here")]
        bad_bit: SourceSpan,
        limit: usize,
        line: usize,
    },
}

impl SyntaxFault {
    pub fn line(&self) -> usize {
        match self {
            SyntaxFault::UnexpectedToken { line, .. }
            | SyntaxFault::TrailingInput { line, .. }
            | SyntaxFault::IntegerOutOfRange { line, .. }
            | SyntaxFault::NestingTooDeep { line, .. } => *line,
        }
    }
}

/// A parsed program.
///
/// Every variant owns its children, so the shape of the enum is also the
/// child-count rule of each node kind. Parentheses leave no trace: nesting alone
/// encodes precedence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Assign {
        name: char,
        value: Box<Node>,
    },
    If {
        condition: Box<Node>,
        then_branch: Box<Node>,
        else_branch: Option<Box<Node>>,
    },
    While {
        condition: Box<Node>,
        body: Box<Node>,
    },
    Sequence(Vec<Node>),
    Empty,
    Print(Box<Node>),
    /// `byte` is the offset of the operator token.
    Binary {
        op: Op,
        lhs: Box<Node>,
        rhs: Box<Node>,
        byte: usize,
    },
    Variable {
        name: char,
        byte: usize,
    },
    Integer(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    EqualEqual,
    NotEqual,
    Plus,
    Minus,
    Star,
    Slash,
}

/// Flat tag over every node shape, binary operators spelled out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Assignment,
    If,
    While,
    Sequence,
    Empty,
    Print,
    LessThan,
    GreaterThan,
    LessEqualThan,
    GreaterEqualThan,
    Equals,
    NotEquals,
    Addition,
    Subtraction,
    Multiply,
    Divide,
    Variable,
    Integer,
}

impl Op {
    pub fn is_relational(self) -> bool {
        matches!(
            self,
            Op::Less | Op::Greater | Op::LessEqual | Op::GreaterEqual | Op::EqualEqual | Op::NotEqual
        )
    }

    fn relational(kind: TokenKind) -> Option<Op> {
        Some(match kind {
            TokenKind::Less => Op::Less,
            TokenKind::Greater => Op::Greater,
            TokenKind::LessEqual => Op::LessEqual,
            TokenKind::GreaterEqual => Op::GreaterEqual,
            TokenKind::EqualEqual => Op::EqualEqual,
            TokenKind::NotEqual => Op::NotEqual,
            _ => return None,
        })
    }
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Assign { .. } => NodeKind::Assignment,
            Node::If { .. } => NodeKind::If,
            Node::While { .. } => NodeKind::While,
            Node::Sequence(_) => NodeKind::Sequence,
            Node::Empty => NodeKind::Empty,
            Node::Print(_) => NodeKind::Print,
            Node::Binary { op, .. } => match op {
                Op::Less => NodeKind::LessThan,
                Op::Greater => NodeKind::GreaterThan,
                Op::LessEqual => NodeKind::LessEqualThan,
                Op::GreaterEqual => NodeKind::GreaterEqualThan,
                Op::EqualEqual => NodeKind::Equals,
                Op::NotEqual => NodeKind::NotEquals,
                Op::Plus => NodeKind::Addition,
                Op::Minus => NodeKind::Subtraction,
                Op::Star => NodeKind::Multiply,
                Op::Slash => NodeKind::Divide,
            },
            Node::Variable { .. } => NodeKind::Variable,
            Node::Integer(_) => NodeKind::Integer,
        }
    }
}

impl Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            Op::Less => "<",
            Op::Greater => ">",
            Op::LessEqual => "<=",
            Op::GreaterEqual => ">=",
            Op::EqualEqual => "==",
            Op::NotEqual => "=/=",
            Op::Plus => "+",
            Op::Minus => "-",
            Op::Star => "*",
            Op::Slash => "/",
        };
        f.write_str(symbol)
    }
}

/// Long operator chains build left spines thousands of nodes deep, so
/// children are torn down from a work list rather than recursively.
impl Drop for Node {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.detach_children(&mut pending);
        while let Some(mut node) = pending.pop() {
            node.detach_children(&mut pending);
        }
    }
}

impl Node {
    fn is_leaf(&self) -> bool {
        matches!(self, Node::Empty | Node::Variable { .. } | Node::Integer(_))
    }

    /// Moves every non-leaf child into `into`, leaving `Empty` behind.
    fn detach_children(&mut self, into: &mut Vec<Node>) {
        fn detach(child: &mut Node, into: &mut Vec<Node>) {
            if !child.is_leaf() {
                into.push(std::mem::replace(child, Node::Empty));
            }
        }

        match self {
            Node::Assign { value, .. } | Node::Print(value) => detach(value, into),
            Node::If {
                condition,
                then_branch,
                else_branch,
            } => {
                detach(condition, into);
                detach(then_branch, into);
                if let Some(else_branch) = else_branch {
                    detach(else_branch, into);
                }
            }
            Node::While { condition, body } => {
                detach(condition, into);
                detach(body, into);
            }
            Node::Binary { lhs, rhs, .. } => {
                detach(lhs, into);
                detach(rhs, into);
            }
            Node::Sequence(statements) => {
                into.extend(statements.drain(..).filter(|statement| !statement.is_leaf()));
            }
            Node::Empty | Node::Variable { .. } | Node::Integer(_) => {}
        }
    }
}

/// S-expression rendering, e.g. `(= a (* 12 (+ 5 2)))`.
impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Assign { name, value } => write!(f, "(= {name} {value})"),
            Node::If {
                condition,
                then_branch,
                else_branch: Some(else_branch),
            } => write!(f, "(if {condition} {then_branch} {else_branch})"),
            Node::If {
                condition,
                then_branch,
                else_branch: None,
            } => write!(f, "(if {condition} {then_branch})"),
            Node::While { condition, body } => write!(f, "(while {condition} {body})"),
            Node::Sequence(statements) => {
                write!(f, "(seq")?;
                for statement in statements {
                    write!(f, " {statement}")?;
                }
                write!(f, ")")
            }
            Node::Empty => write!(f, "(nop)"),
            Node::Print(value) => write!(f, "(print {value})"),
            Node::Binary { op, lhs, rhs, .. } => write!(f, "({op} {lhs} {rhs})"),
            Node::Variable { name, .. } => write!(f, "{name}"),
            Node::Integer(n) => write!(f, "{n}"),
        }
    }
}

/// Tokens that may open a statement inside `{ ... }` (and after the first
/// top-level statement). Integer literals and `(` are not among them.
fn starts_statement(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::If
            | TokenKind::While
            | TokenKind::Print
            | TokenKind::LeftBrace
            | TokenKind::Ident
            | TokenKind::Semicolon
    )
}

pub struct Parser<'de> {
    filename: Option<&'de str>,
    whole: &'de str,
    lexer: Lexer<'de>,
    limits: Limits,
    depth: usize,
}

impl<'de> Parser<'de> {
    pub fn new(filename: Option<&'de str>, whole: &'de str) -> Self {
        Self::with_limits(filename, whole, Limits::default())
    }

    pub fn with_limits(filename: Option<&'de str>, whole: &'de str, limits: Limits) -> Self {
        Parser {
            filename,
            whole,
            lexer: Lexer::new(filename, whole),
            limits,
            depth: 0,
        }
    }

    /// `program ::= statement { statement } EOI`
    ///
    /// A lone statement is returned unchanged; several are wrapped in a sequence.
    pub fn parse(mut self) -> Result<Node, Fault> {
        let first = self.statement()?;
        let program = if starts_statement(self.lexer.peek()?.kind) {
            let mut statements = vec![first];
            while starts_statement(self.lexer.peek()?.kind) {
                statements.push(self.statement()?);
            }
            Node::Sequence(statements)
        } else {
            first
        };

        let token = self.lexer.next_token()?;
        if token.kind != TokenKind::Eof {
            return Err(SyntaxFault::TrailingInput {
                src: self.source(),
                bad_bit: token.span(),
                line: token.line,
            }
            .into());
        }

        debug!(lines = self.lexer.line(), kind = ?program.kind(), "parsed program");
        Ok(program)
    }

    fn source(&self) -> NamedSource<String> {
        named_source(self.filename, self.whole)
    }

    /// Counts one level of nesting against the depth limit.
    fn enter(&mut self) -> Result<(), Fault> {
        self.depth += 1;
        if self.depth <= self.limits.max_depth {
            return Ok(());
        }
        let token = self.lexer.peek()?;
        Err(SyntaxFault::NestingTooDeep {
            src: self.source(),
            bad_bit: token.span(),
            limit: self.limits.max_depth,
            line: token.line,
        }
        .into())
    }

    fn nested(&mut self, rule: fn(&mut Self) -> Result<Node, Fault>) -> Result<Node, Fault> {
        self.enter()?;
        let node = rule(self);
        self.depth -= 1;
        node
    }

    fn statement(&mut self) -> Result<Node, Fault> {
        self.nested(Self::parse_statement)
    }

    fn parse_statement(&mut self) -> Result<Node, Fault> {
        let token = self.lexer.peek()?;
        match token.kind {
            TokenKind::If => {
                self.lexer.next_token()?;
                let condition = self.parenthesized("after `if`", "to close the condition")?;
                let then_branch = self.statement()?;
                // the innermost `if` gets first claim on an `else`
                let else_branch = if self.lexer.peek()?.kind == TokenKind::Else {
                    self.lexer.next_token()?;
                    Some(Box::new(self.statement()?))
                } else {
                    None
                };
                Ok(Node::If {
                    condition: Box::new(condition),
                    then_branch: Box::new(then_branch),
                    else_branch,
                })
            }
            TokenKind::While => {
                self.lexer.next_token()?;
                let condition = self.parenthesized("after `while`", "to close the condition")?;
                let body = self.statement()?;
                Ok(Node::While {
                    condition: Box::new(condition),
                    body: Box::new(body),
                })
            }
            TokenKind::LeftBrace => {
                self.lexer.next_token()?;
                let mut statements = Vec::new();
                while starts_statement(self.lexer.peek()?.kind) {
                    statements.push(self.statement()?);
                }
                self.lexer.expect(TokenKind::RightBrace, "to close the block")?;
                Ok(Node::Sequence(statements))
            }
            TokenKind::Print => {
                self.lexer.next_token()?;
                let value = self.parenthesized("after `print`", "to close the print argument")?;
                self.lexer.expect(TokenKind::Semicolon, "after `print(...)`")?;
                Ok(Node::Print(Box::new(value)))
            }
            TokenKind::Semicolon => {
                self.lexer.next_token()?;
                Ok(Node::Empty)
            }
            _ => {
                let expr = self.expression()?;
                self.lexer.expect(TokenKind::Semicolon, "to end the statement")?;
                Ok(expr)
            }
        }
    }

    fn parenthesized(&mut self, open: &str, close: &str) -> Result<Node, Fault> {
        self.lexer.expect(TokenKind::LeftParen, open)?;
        let node = self.expression()?;
        self.lexer.expect(TokenKind::RightParen, close)?;
        Ok(node)
    }

    fn expression(&mut self) -> Result<Node, Fault> {
        self.nested(Self::parse_expression)
    }

    /// `expr ::= id "=" expr | test`
    ///
    /// Both alternatives may start with an identifier, so parse a `test` first
    /// and turn it into an assignment when it is a bare variable followed by `=`.
    fn parse_expression(&mut self) -> Result<Node, Fault> {
        let test = self.test()?;
        if let Node::Variable { name, .. } = test {
            if self.lexer.peek()?.kind == TokenKind::Equal {
                self.lexer.next_token()?;
                let value = self.expression()?;
                return Ok(Node::Assign {
                    name,
                    value: Box::new(value),
                });
            }
        }
        Ok(test)
    }

    /// `test ::= sum [ relOp sum ]`, at most one comparison.
    fn test(&mut self) -> Result<Node, Fault> {
        let lhs = self.sum()?;
        let token = self.lexer.peek()?;
        let Some(op) = Op::relational(token.kind) else {
            return Ok(lhs);
        };
        self.lexer.next_token()?;
        let rhs = self.sum()?;
        Ok(Node::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            byte: token.offset,
        })
    }

    fn sum(&mut self) -> Result<Node, Fault> {
        self.fold_left(Self::factor, |kind| match kind {
            TokenKind::Plus => Some(Op::Plus),
            TokenKind::Minus => Some(Op::Minus),
            _ => None,
        })
    }

    fn factor(&mut self) -> Result<Node, Fault> {
        self.fold_left(Self::term, |kind| match kind {
            TokenKind::Star => Some(Op::Star),
            TokenKind::Slash => Some(Op::Slash),
            _ => None,
        })
    }

    /// `operand { op operand }`, folded so `a - b - c` is `(a - b) - c`.
    ///
    /// Chains are flat in the source and are built by iteration, so they do not
    /// count against the depth limit.
    fn fold_left(
        &mut self,
        operand: fn(&mut Self) -> Result<Node, Fault>,
        operator: fn(TokenKind) -> Option<Op>,
    ) -> Result<Node, Fault> {
        let mut lhs = operand(self)?;
        loop {
            let token = self.lexer.peek()?;
            let Some(op) = operator(token.kind) else {
                break;
            };
            self.lexer.next_token()?;
            let rhs = operand(self)?;
            lhs = Node::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                byte: token.offset,
            };
        }
        Ok(lhs)
    }

    /// `term ::= id | int | "(" expr ")"`
    fn term(&mut self) -> Result<Node, Fault> {
        let token = self.lexer.peek()?;
        match token.kind {
            TokenKind::Ident => {
                self.lexer.next_token()?;
                let Some(name) = token.literal.chars().next() else {
                    return Err(InternalFault::new("identifier token with empty text").into());
                };
                Ok(Node::Variable {
                    name,
                    byte: token.offset,
                })
            }
            TokenKind::Int => {
                self.lexer.next_token()?;
                self.integer(token)
            }
            TokenKind::LeftParen => {
                self.parenthesized("to open the group", "to close the parenthesized expression")
            }
            _ => Err(self.missing_operand(token)),
        }
    }

    // Kept out of `term` so the recursive frames stay small.
    #[cold]
    #[inline(never)]
    fn missing_operand(&self, token: Token<'de>) -> Fault {
        SyntaxFault::UnexpectedToken {
            src: self.source(),
            bad_bit: token.span(),
            advice: "an expression starts with a variable, a number or `(`".to_string(),
            expected: "an identifier, an integer or `(`".to_string(),
            context: "in the expression".to_string(),
            found: token.kind.to_string(),
            line: token.line,
        }
        .into()
    }

    fn integer(&self, token: Token<'de>) -> Result<Node, Fault> {
        match token.literal.parse::<i64>() {
            Ok(value) => Ok(Node::Integer(value)),
            Err(_) => Err(SyntaxFault::IntegerOutOfRange {
                src: self.source(),
                bad_bit: token.span(),
                literal: token.literal.to_string(),
                line: token.line,
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FaultKind;

    fn parse(src: &str) -> Node {
        Parser::new(None, src).parse().expect("parses")
    }

    fn parse_err(src: &str) -> Fault {
        Parser::new(None, src).parse().expect_err("should not parse")
    }

    #[test]
    fn parentheses_vanish_from_the_tree() {
        assert_eq!(parse("a=12*(5+2);").to_string(), "(= a (* 12 (+ 5 2)))");
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(parse("a=1+2*3-4/2;").to_string(), "(= a (- (+ 1 (* 2 3)) (/ 4 2)))");
    }

    #[test]
    fn arithmetic_is_left_associative() {
        assert_eq!(parse("a=10-4-3;").to_string(), "(= a (- (- 10 4) 3))");
        assert_eq!(parse("a=64/8/2;").to_string(), "(= a (/ (/ 64 8) 2))");
    }

    #[test]
    fn chained_assignment_is_right_associative() {
        assert_eq!(parse("a=b=c=d=12;").to_string(), "(= a (= b (= c (= d 12))))");
    }

    #[test]
    fn bare_variable_statement_is_a_test() {
        let node = parse("a;");
        assert_eq!(node.kind(), NodeKind::Variable);
    }

    #[test]
    fn comparison_is_not_an_assignment_target() {
        let e = parse_err("a<b=1;");
        assert_eq!(e.kind(), FaultKind::Syntax);
    }

    #[test]
    fn relational_operators_do_not_chain() {
        let e = parse_err("a=1<2<3;");
        assert!(matches!(e.as_syntax(), Some(SyntaxFault::UnexpectedToken { .. })));
    }

    #[test]
    fn if_else_with_blocks() {
        assert_eq!(
            parse("{ a=2; b=0; if (a=/=2) { b = 1; } else { b = 2; } }").to_string(),
            "(seq (= a 2) (= b 0) (if (=/= a 2) (seq (= b 1)) (seq (= b 2))))"
        );
    }

    #[test]
    fn dangling_else_binds_to_nearest_if() {
        let node = parse("if (a) if (b) c=1; else c=2;");
        assert_eq!(node.to_string(), "(if a (if b (= c 1) (= c 2)))");
    }

    #[test]
    fn while_loop() {
        assert_eq!(
            parse("{ a = 7; b = a * 2; while (a <= b) {b = b + 1;} }").to_string(),
            "(seq (= a 7) (= b (* a 2)) (while (<= a b) (seq (= b (+ b 1)))))"
        );
    }

    #[test]
    fn print_and_empty_statements() {
        assert_eq!(parse("{print(12);;}").to_string(), "(seq (print 12) (nop))");
        assert_eq!(parse(";").kind(), NodeKind::Empty);
        assert_eq!(parse("{}").to_string(), "(seq)");
    }

    #[test]
    fn complex_expression() {
        assert_eq!(
            parse("{ a=12;b=13;c=a+b*(a-b)+(a+b)-(12-b-a*3+2-1)+(1); }").to_string(),
            "(seq (= a 12) (= b 13) (= c (+ (- (+ (+ a (* b (- a b))) (+ a b)) \
             (- (+ (- (- 12 b) (* a 3)) 2) 1)) 1)))"
        );
    }

    #[test]
    fn several_top_level_statements_form_a_sequence() {
        let node = parse("a=1;b=0;if(a==1){b=1;}else{b=2;}");
        assert_eq!(
            node.to_string(),
            "(seq (= a 1) (= b 0) (if (== a 1) (seq (= b 1)) (seq (= b 2))))"
        );
    }

    #[test]
    fn node_kinds_cover_operators() {
        let cases = [
            ("a<b;", NodeKind::LessThan),
            ("a>b;", NodeKind::GreaterThan),
            ("a<=b;", NodeKind::LessEqualThan),
            ("a>=b;", NodeKind::GreaterEqualThan),
            ("a==b;", NodeKind::Equals),
            ("a=/=b;", NodeKind::NotEquals),
            ("a+b;", NodeKind::Addition),
            ("a-b;", NodeKind::Subtraction),
            ("a*b;", NodeKind::Multiply),
            ("a/b;", NodeKind::Divide),
            ("7;", NodeKind::Integer),
            ("while (a) ;", NodeKind::While),
            ("print(a);", NodeKind::Print),
        ];
        for (src, kind) in cases {
            assert_eq!(parse(src).kind(), kind, "{src}");
        }
    }

    #[test]
    fn missing_semicolon() {
        let e = parse_err("a=1");
        assert_eq!(e.to_string(), "expected `;` to end the statement, found end of input");
    }

    #[test]
    fn missing_paren_after_if() {
        let e = parse_err("if a) b=1;");
        assert_eq!(e.to_string(), "expected `(` after `if`, found an identifier");
    }

    #[test]
    fn unterminated_block_reports_line() {
        let e = parse_err("{\n a=1;\n b=2;\n");
        assert!(matches!(e.as_syntax(), Some(SyntaxFault::UnexpectedToken { .. })));
        assert_eq!(e.to_string(), "expected `}` to close the block, found end of input");
        assert_eq!(e.line(), Some(4));
    }

    #[test]
    fn integer_cannot_start_a_block_statement() {
        let e = parse_err("{ 5; }");
        assert!(e.to_string().starts_with("expected `}` to close the block"));
    }

    #[test]
    fn trailing_input_is_rejected() {
        let e = parse_err("a=1; }");
        assert!(matches!(e.as_syntax(), Some(SyntaxFault::TrailingInput { .. })));

        let e = parse_err("{ a=1; }\n\n)");
        assert!(matches!(e.as_syntax(), Some(SyntaxFault::TrailingInput { .. })));
        assert_eq!(e.line(), Some(3));
    }

    #[test]
    fn oversized_integer_is_a_syntax_fault() {
        let e = parse_err("a=99999999999999999999;");
        assert!(matches!(
            e.as_syntax(),
            Some(SyntaxFault::IntegerOutOfRange { literal, .. })
                if literal == "99999999999999999999"
        ));
    }

    #[test]
    fn lexical_faults_pass_through() {
        let e = parse_err("a = 1 & 2;");
        assert_eq!(e.kind(), FaultKind::Lexical);
    }

    /// Runs `f` on a thread with the 2 MiB stack spawned threads get by default.
    fn on_default_stack<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
        std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(f)
            .unwrap()
            .join()
            .unwrap()
    }

    /// `a=` wrapped in `parens` pairs nests `parens + 3` levels deep.
    fn parenthesized_assignment(parens: usize) -> String {
        format!("a={}1{};", "(".repeat(parens), ")".repeat(parens))
    }

    #[test]
    fn parentheses_up_to_the_limit_parse() {
        let limit = Limits::default().max_depth;
        let node = on_default_stack(move || {
            Parser::new(None, &parenthesized_assignment(limit - 3))
                .parse()
                .map(|node| node.kind())
        });
        assert_eq!(node.unwrap(), NodeKind::Assignment);
    }

    #[test]
    fn parentheses_past_the_limit_fault() {
        let limit = Limits::default().max_depth;
        let e = on_default_stack(move || parse_err(&parenthesized_assignment(limit - 2)));
        assert!(matches!(e.as_syntax(), Some(SyntaxFault::NestingTooDeep { limit: 128, .. })));

        let e = on_default_stack(|| parse_err(&parenthesized_assignment(10_000)));
        assert!(matches!(e.as_syntax(), Some(SyntaxFault::NestingTooDeep { .. })));
    }

    #[test]
    fn deep_statement_nesting_hits_the_depth_limit() {
        let limit = Limits::default().max_depth;
        let ok = on_default_stack(move || {
            Parser::new(None, &format!("{}a=1;", "if (1) ".repeat(limit - 3)))
                .parse()
                .is_ok()
        });
        assert!(ok);

        let e = on_default_stack(|| parse_err(&format!("{}a=1;", "if (1) ".repeat(10_000))));
        assert!(matches!(e.as_syntax(), Some(SyntaxFault::NestingTooDeep { .. })));
    }

    #[test]
    fn long_sums_are_not_nesting() {
        let src = format!("a=1{};", "+1".repeat(10_000));
        let node = Parser::new(None, &src).parse().unwrap();
        assert_eq!(node.kind(), NodeKind::Assignment);
    }

    #[test]
    fn dropping_a_deep_tree_does_not_recurse() {
        let dropped = on_default_stack(|| {
            let mut node = Node::Integer(0);
            for _ in 0..200_000 {
                node = Node::Binary {
                    op: Op::Plus,
                    lhs: Box::new(node),
                    rhs: Box::new(Node::Integer(1)),
                    byte: 0,
                };
            }
            drop(node);
            true
        });
        assert!(dropped);
    }

    #[test]
    fn depth_limit_is_configurable() {
        let src = "a=((((1))));";
        let shallow = Limits { max_depth: 4 };
        assert!(Parser::with_limits(None, src, shallow).parse().is_err());
        assert!(Parser::with_limits(None, src, Limits::default()).parse().is_ok());
    }

    #[test]
    fn sibling_statements_do_not_accumulate_depth() {
        let src = format!("{{{}}}", "a=a+1;".repeat(5_000));
        assert!(Parser::new(None, &src).parse().is_ok());
    }
}
