use std::fmt::Display;

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;
use tracing::trace;

use crate::{
    error::{Fault, named_source},
    parse::SyntaxFault,
};

#[derive(Error, Debug, Diagnostic)]
pub enum LexicalFault {
    #[error("unexpected character '{token}'")]
    #[diagnostic(code(minimus::lex::unexpected_character))]
    UnexpectedCharacter {
        #[source_code]
        src: NamedSource<String>,
        #[label("this character")]
        bad_bit: SourceSpan,
        #[help]
        advice: String,
        token: char,
        line: usize,
    },

    #[error("malformed operator, `=/` must be followed by `=`")]
    #[diagnostic(
        code(minimus::lex::malformed_operator),
        help("the not-equal operator is written `=/=`")
    )]
    MalformedOperator {
        #[source_code]
        src: NamedSource<String>,
        #[label("incomplete `=/=`")]
        bad_bit: SourceSpan,
        line: usize,
    },

    #[error("invalid identifier `{ident}`")]
    #[diagnostic(
        code(minimus::lex::invalid_identifier),
        help("variables are single lowercase letters `a` to `z`")
    )]
    InvalidIdentifier {
        #[source_code]
        src: NamedSource<String>,
        #[label("not a keyword or a variable")]
        bad_bit: SourceSpan,
        ident: String,
        line: usize,
    },
}

impl LexicalFault {
    pub fn line(&self) -> usize {
        match self {
            LexicalFault::UnexpectedCharacter { line, .. }
            | LexicalFault::MalformedOperator { line, .. }
            | LexicalFault::InvalidIdentifier { line, .. } => *line,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'de> {
    pub kind: TokenKind,
    pub literal: &'de str,
    pub line: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    If,
    Else,
    While,
    Print,
    LeftBrace,
    RightBrace,
    LeftParen,
    RightParen,
    Semicolon,
    Equal,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    EqualEqual,
    NotEqual,
    Plus,
    Minus,
    Star,
    Slash,
    Ident,
    Int,
    Eof,
}

impl<'de> Token<'de> {
    /// The literal text, for the two kinds whose text matters after lexing.
    pub fn lexeme(&self) -> Option<&'de str> {
        match self.kind {
            TokenKind::Ident | TokenKind::Int => Some(self.literal),
            _ => None,
        }
    }

    pub fn span(&self) -> SourceSpan {
        SourceSpan::from(self.offset..self.offset + self.literal.len())
    }
}

impl Display for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lit = self.literal;
        match self.kind {
            TokenKind::If => write!(f, "IF {lit} null"),
            TokenKind::Else => write!(f, "ELSE {lit} null"),
            TokenKind::While => write!(f, "WHILE {lit} null"),
            TokenKind::Print => write!(f, "PRINT {lit} null"),
            TokenKind::LeftBrace => write!(f, "LEFT_BRACE {lit} null"),
            TokenKind::RightBrace => write!(f, "RIGHT_BRACE {lit} null"),
            TokenKind::LeftParen => write!(f, "LEFT_PAREN {lit} null"),
            TokenKind::RightParen => write!(f, "RIGHT_PAREN {lit} null"),
            TokenKind::Semicolon => write!(f, "SEMICOLON {lit} null"),
            TokenKind::Equal => write!(f, "EQUAL {lit} null"),
            TokenKind::Less => write!(f, "LESS {lit} null"),
            TokenKind::LessEqual => write!(f, "LESS_EQUAL {lit} null"),
            TokenKind::Greater => write!(f, "GREATER {lit} null"),
            TokenKind::GreaterEqual => write!(f, "GREATER_EQUAL {lit} null"),
            TokenKind::EqualEqual => write!(f, "EQUAL_EQUAL {lit} null"),
            TokenKind::NotEqual => write!(f, "NOT_EQUAL {lit} null"),
            TokenKind::Plus => write!(f, "PLUS {lit} null"),
            TokenKind::Minus => write!(f, "MINUS {lit} null"),
            TokenKind::Star => write!(f, "STAR {lit} null"),
            TokenKind::Slash => write!(f, "SLASH {lit} null"),
            TokenKind::Ident => write!(f, "IDENTIFIER {lit} null"),
            TokenKind::Int => write!(f, "INTEGER {lit} {lit}"),
            TokenKind::Eof => write!(f, "EOF  null"),
        }
    }
}

/// How a token kind reads in a diagnostic: "expected `)`, found `;`".
impl Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            TokenKind::If => "`if`",
            TokenKind::Else => "`else`",
            TokenKind::While => "`while`",
            TokenKind::Print => "`print`",
            TokenKind::LeftBrace => "`{`",
            TokenKind::RightBrace => "`}`",
            TokenKind::LeftParen => "`(`",
            TokenKind::RightParen => "`)`",
            TokenKind::Semicolon => "`;`",
            TokenKind::Equal => "`=`",
            TokenKind::Less => "`<`",
            TokenKind::LessEqual => "`<=`",
            TokenKind::Greater => "`>`",
            TokenKind::GreaterEqual => "`>=`",
            TokenKind::EqualEqual => "`==`",
            TokenKind::NotEqual => "`=/=`",
            TokenKind::Plus => "`+`",
            TokenKind::Minus => "`-`",
            TokenKind::Star => "`*`",
            TokenKind::Slash => "`/`",
            TokenKind::Ident => "an identifier",
            TokenKind::Int => "an integer",
            TokenKind::Eof => "end of input",
        };
        f.write_str(text)
    }
}

/// Streaming tokenizer with a single token of lookahead.
///
/// Tokens are produced on demand; once the input is exhausted every further
/// request yields [`TokenKind::Eof`].
pub struct Lexer<'de> {
    filename: Option<&'de str>,
    whole: &'de str,
    rest: &'de str,
    pub byte: usize,
    line: usize,
    peeked: Option<Token<'de>>,
    finished: bool,
}

impl<'de> Lexer<'de> {
    pub fn new(filename: Option<&'de str>, input: &'de str) -> Self {
        Lexer {
            filename,
            whole: input,
            rest: input,
            byte: 0,
            line: 1,
            peeked: None,
            finished: false,
        }
    }

    /// Line the scanner has reached; it can run ahead of a peeked token.
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn peek(&mut self) -> Result<Token<'de>, Fault> {
        if let Some(token) = self.peeked {
            return Ok(token);
        }
        let token = self.scan()?;
        self.peeked = Some(token);
        Ok(token)
    }

    pub fn next_token(&mut self) -> Result<Token<'de>, Fault> {
        match self.peeked.take() {
            Some(token) => Ok(token),
            None => self.scan(),
        }
    }

    /// Consumes the next token, which must be of kind `expected`.
    ///
    /// `context` finishes the sentence "expected `x` ...", e.g. "to end the statement".
    pub fn expect(&mut self, expected: TokenKind, context: &str) -> Result<Token<'de>, Fault> {
        let token = self.next_token()?;
        if token.kind == expected {
            Ok(token)
        } else {
            Err(SyntaxFault::UnexpectedToken {
                src: self.source(),
                bad_bit: token.span(),
                advice: format!("use {expected} here instead"),
                expected: expected.to_string(),
                context: context.to_string(),
                found: token.kind.to_string(),
                line: token.line,
            }
            .into())
        }
    }

    fn source(&self) -> NamedSource<String> {
        named_source(self.filename, self.whole)
    }

    fn scan(&mut self) -> Result<Token<'de>, Fault> {
        loop {
            let mut chars = self.rest.chars();
            let Some(c) = chars.next() else {
                return Ok(Token {
                    kind: TokenKind::Eof,
                    literal: "",
                    line: self.line,
                    offset: self.byte,
                });
            };
            let cur = self.rest;
            let offset = self.byte;
            let line = self.line;
            let literal = &cur[..c.len_utf8()];
            self.rest = chars.as_str();
            self.byte += c.len_utf8();

            enum Start {
                Ident,
                Number,
                Equal,
                IfEqualElse(TokenKind, TokenKind),
            }

            let process = |kind: TokenKind| -> Result<Token<'de>, Fault> {
                let token = Token {
                    kind,
                    literal,
                    line,
                    offset,
                };
                trace!(%token, line, "token");
                Ok(token)
            };

            let started = match c {
                '{' => return process(TokenKind::LeftBrace),
                '}' => return process(TokenKind::RightBrace),
                '(' => return process(TokenKind::LeftParen),
                ')' => return process(TokenKind::RightParen),
                ';' => return process(TokenKind::Semicolon),
                '+' => return process(TokenKind::Plus),
                '-' => return process(TokenKind::Minus),
                '*' => return process(TokenKind::Star),
                '/' => return process(TokenKind::Slash),
                '<' => Start::IfEqualElse(TokenKind::LessEqual, TokenKind::Less),
                '>' => Start::IfEqualElse(TokenKind::GreaterEqual, TokenKind::Greater),
                '=' => Start::Equal,
                '0'..='9' => Start::Number,
                c if c.is_alphabetic() => Start::Ident,
                c if c.is_whitespace() => {
                    if c == '\n' {
                        self.line += 1;
                    }
                    continue;
                }
                c => {
                    return Err(LexicalFault::UnexpectedCharacter {
                        src: self.source(),
                        bad_bit: SourceSpan::from(offset..self.byte),
                        advice: format!("remove or correct the character: `{c}`"),
                        token: c,
                        line,
                    }
                    .into());
                }
            };

            let (kind, len) = match started {
                Start::IfEqualElse(yes, no) => {
                    if self.rest.starts_with('=') {
                        (yes, 2)
                    } else {
                        (no, 1)
                    }
                }
                Start::Equal => {
                    if self.rest.starts_with('=') {
                        (TokenKind::EqualEqual, 2)
                    } else if let Some(after_slash) = self.rest.strip_prefix('/') {
                        if !after_slash.starts_with('=') {
                            let bad_len = 2 + after_slash.chars().next().map_or(0, char::len_utf8);
                            return Err(LexicalFault::MalformedOperator {
                                src: self.source(),
                                bad_bit: SourceSpan::from(offset..offset + bad_len),
                                line,
                            }
                            .into());
                        }
                        (TokenKind::NotEqual, 3)
                    } else {
                        (TokenKind::Equal, 1)
                    }
                }
                Start::Number => {
                    let end = cur
                        .find(|c: char| !c.is_ascii_digit())
                        .unwrap_or(cur.len());
                    (TokenKind::Int, end)
                }
                Start::Ident => {
                    let end = cur.find(|c: char| !c.is_alphabetic()).unwrap_or(cur.len());
                    let word = &cur[..end];
                    let kind = match word {
                        "if" => TokenKind::If,
                        "else" => TokenKind::Else,
                        "while" => TokenKind::While,
                        "print" => TokenKind::Print,
                        _ if matches!(word.as_bytes(), [b'a'..=b'z']) => TokenKind::Ident,
                        _ => {
                            return Err(LexicalFault::InvalidIdentifier {
                                src: self.source(),
                                bad_bit: SourceSpan::from(offset..offset + end),
                                ident: word.to_string(),
                                line,
                            }
                            .into());
                        }
                    };
                    (kind, end)
                }
            };

            let extra_bytes = len - c.len_utf8();
            self.rest = &self.rest[extra_bytes..];
            self.byte += extra_bytes;

            let token = Token {
                kind,
                literal: &cur[..len],
                line,
                offset,
            };
            trace!(%token, line, "token");
            return Ok(token);
        }
    }
}

/// Yields every token before end of input; stops for good after the first fault.
impl<'de> Iterator for Lexer<'de> {
    type Item = Result<Token<'de>, Fault>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_token() {
            Ok(Token {
                kind: TokenKind::Eof,
                ..
            }) => {
                self.finished = true;
                None
            }
            Ok(token) => Some(Ok(token)),
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
