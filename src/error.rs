use std::fmt::Display;

use miette::{Diagnostic, LabeledSpan, NamedSource, Severity, SourceCode};
use thiserror::Error;

use crate::{eval::SemanticFault, lex::LexicalFault, parse::SyntaxFault};

/// Which stage of the pipeline gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Lexical,
    Syntax,
    Semantic,
    Internal,
}

/// Everything that can abort a Minimus run.
///
/// Nothing is recovered: the first fault ends lexing, parsing or evaluation
/// and travels up to the caller unchanged. Payloads are boxed so every
/// `Result` threaded through the recursive parser and evaluator stays two
/// words wide.
#[derive(Error, Debug)]
pub enum Fault {
    #[error(transparent)]
    Lexical(Box<LexicalFault>),

    #[error(transparent)]
    Syntax(Box<SyntaxFault>),

    #[error(transparent)]
    Semantic(Box<SemanticFault>),

    #[error(transparent)]
    Internal(Box<InternalFault>),
}

impl Fault {
    pub fn kind(&self) -> FaultKind {
        match self {
            Fault::Lexical(_) => FaultKind::Lexical,
            Fault::Syntax(_) => FaultKind::Syntax,
            Fault::Semantic(_) => FaultKind::Semantic,
            Fault::Internal(_) => FaultKind::Internal,
        }
    }

    /// 1-based source line the fault was detected on, when one is known.
    pub fn line(&self) -> Option<usize> {
        match self {
            Fault::Lexical(e) => Some(e.line()),
            Fault::Syntax(e) => Some(e.line()),
            Fault::Semantic(e) => e.line(),
            Fault::Internal(_) => None,
        }
    }

    pub fn as_lexical(&self) -> Option<&LexicalFault> {
        match self {
            Fault::Lexical(e) => Some(&**e),
            _ => None,
        }
    }

    pub fn as_syntax(&self) -> Option<&SyntaxFault> {
        match self {
            Fault::Syntax(e) => Some(&**e),
            _ => None,
        }
    }

    pub fn as_semantic(&self) -> Option<&SemanticFault> {
        match self {
            Fault::Semantic(e) => Some(&**e),
            _ => None,
        }
    }

    fn diagnostic(&self) -> &dyn Diagnostic {
        match self {
            Fault::Lexical(e) => &**e,
            Fault::Syntax(e) => &**e,
            Fault::Semantic(e) => &**e,
            Fault::Internal(e) => &**e,
        }
    }
}

impl Diagnostic for Fault {
    fn code<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        self.diagnostic().code()
    }

    fn severity(&self) -> Option<Severity> {
        self.diagnostic().severity()
    }

    fn help<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        self.diagnostic().help()
    }

    fn url<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        self.diagnostic().url()
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.diagnostic().source_code()
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        self.diagnostic().labels()
    }

    fn related<'a>(&'a self) -> Option<Box<dyn Iterator<Item = &'a dyn Diagnostic> + 'a>> {
        self.diagnostic().related()
    }

    fn diagnostic_source(&self) -> Option<&dyn Diagnostic> {
        self.diagnostic().diagnostic_source()
    }
}

impl From<LexicalFault> for Fault {
    fn from(fault: LexicalFault) -> Self {
        Fault::Lexical(Box::new(fault))
    }
}

impl From<SyntaxFault> for Fault {
    fn from(fault: SyntaxFault) -> Self {
        Fault::Syntax(Box::new(fault))
    }
}

impl From<SemanticFault> for Fault {
    fn from(fault: SemanticFault) -> Self {
        Fault::Semantic(Box::new(fault))
    }
}

impl From<InternalFault> for Fault {
    fn from(fault: InternalFault) -> Self {
        Fault::Internal(Box::new(fault))
    }
}

#[derive(Error, Debug, Diagnostic)]
#[error("internal invariant violated: {message}")]
#[diagnostic(
    code(minimus::internal),
    help("this is a bug in minimus, not in the program being run")
)]
pub struct InternalFault {
    pub message: String,
}

impl InternalFault {
    pub fn new(message: impl Into<String>) -> Self {
        InternalFault {
            message: message.into(),
        }
    }
}

pub(crate) fn named_source(filename: Option<&str>, whole: &str) -> NamedSource<String> {
    NamedSource::new(filename.unwrap_or("<input>"), whole.to_string())
}

/// Line containing `byte`, or `None` when the offset does not land inside `whole`.
pub(crate) fn line_at(whole: &str, byte: usize) -> Option<usize> {
    whole
        .get(..byte)
        .filter(|_| byte < whole.len())
        .map(|before| before.matches('\n').count() + 1)
}
