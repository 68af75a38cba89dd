//! Source positions, diagnostics and their console rendering
//!
//! Every stage of the pipeline reports problems as an [Error] carrying the
//! message and a [Span] into the source text. [render] turns an error into
//! the console form (message header plus a two-line excerpt with the span
//! underlined); [report] prints that and terminates the process, which is
//! what the command-line drivers do.

use colored::Colorize;
use thiserror::Error;

/// A range of columns on one source line. Lines are 1-based, columns are
/// 0-based. Errors raised at end of input carry the zero span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub line: usize,
    pub col_start: usize,
    pub col_end: usize,
}

impl Span {
    pub fn new(line: usize, col_start: usize, col_end: usize) -> Span {
        Span {
            line,
            col_start,
            col_end,
        }
    }
}

/// Everything that can go wrong between reading source text and finishing
/// execution. The `Display` form is the exact message shown to the user.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    // lexer
    #[error("unexpected char '{ch}' ({code})")]
    UnexpectedChar { ch: char, code: u8, span: Span },

    #[error("unclosed string literal")]
    UnclosedString { span: Span },

    /// A lone `-` or `+` with no digit behind it.
    #[error("unexpected token")]
    UnexpectedToken { span: Span },

    /// A decimal run outside the signed 64-bit range.
    #[error("invalid integer literal")]
    InvalidIntLiteral { span: Span },

    // parser
    #[error("unexpected token '{kind} ({value})' at top level. Expected a instruction or a label.")]
    UnexpectedTopLevel {
        kind: &'static str,
        value: String,
        span: Span,
    },

    #[error("expected a '{expected}', but got '{got}'.")]
    ExpectedToken {
        expected: &'static str,
        got: String,
        span: Span,
    },

    #[error("expected ',' between operands, but got '{got}'.")]
    ExpectedComma { got: String, span: Span },

    #[error("invalid token '{kind}' before memory address. Expected an integer as offset.")]
    BadMemOffset { kind: &'static str, span: Span },

    #[error("unexpected token '{got}' as an operand.")]
    BadOperand { got: String, span: Span },

    /// A label with no instruction after the colon.
    #[error("unexpected token '{got}' after a label.")]
    EmptyLabel { got: String, span: Span },

    // validation
    #[error("invalid opcode")]
    InvalidOpcode { span: Span },

    #[error("incorrect number of operands for opcode '{opcode}'. Required: {required}, got: {got}")]
    OperandCount {
        opcode: &'static str,
        required: usize,
        got: usize,
        span: Span,
    },

    /// `expected` is the preformatted list, e.g. `'register' or a 'integer'`.
    #[error("opcode '{opcode}' requires a {expected} as its {slot} operand, but got a '{got}'")]
    OperandType {
        opcode: &'static str,
        expected: String,
        slot: &'static str,
        got: &'static str,
        span: Span,
    },

    #[error("invalid register")]
    InvalidRegister { span: Span },

    #[error("invalid register specified in memory address")]
    InvalidMemRegister { span: Span },

    #[error("label not defined")]
    UndefinedLabel { span: Span },

    #[error("duplicated label '{name}'.")]
    DuplicatedLabel { name: String, span: Span },

    // runtime
    #[error("division by zero occurred while executing this instruction")]
    DivisionByZero { span: Span },

    #[error("callstack overflow")]
    CallStackOverflow { span: Span },

    #[error("callstack underflow")]
    CallStackUnderflow { span: Span },

    #[error("stack overflow")]
    StackOverflow { span: Span },

    #[error("stack underflow")]
    StackUnderflow { span: Span },

    #[error("invalid memory access")]
    InvalidMemAccess { span: Span },
}

impl Error {
    /// The source range this error points at.
    pub fn span(&self) -> Span {
        match self {
            Error::UnexpectedChar { span, .. }
            | Error::UnclosedString { span }
            | Error::UnexpectedToken { span }
            | Error::InvalidIntLiteral { span }
            | Error::UnexpectedTopLevel { span, .. }
            | Error::ExpectedToken { span, .. }
            | Error::ExpectedComma { span, .. }
            | Error::BadMemOffset { span, .. }
            | Error::BadOperand { span, .. }
            | Error::EmptyLabel { span, .. }
            | Error::InvalidOpcode { span }
            | Error::OperandCount { span, .. }
            | Error::OperandType { span, .. }
            | Error::InvalidRegister { span }
            | Error::InvalidMemRegister { span }
            | Error::UndefinedLabel { span }
            | Error::DuplicatedLabel { span, .. }
            | Error::DivisionByZero { span }
            | Error::CallStackOverflow { span }
            | Error::CallStackUnderflow { span }
            | Error::StackOverflow { span }
            | Error::StackUnderflow { span }
            | Error::InvalidMemAccess { span } => *span,
        }
    }
}

/// Renders an error the way the drivers show it: a header line, then the
/// offending source line with the span highlighted and underlined.
pub fn render(source: &str, error: &Error) -> String {
    let span = error.span();
    let mut out = format!(
        "{} {} {}",
        "Error:".red().bold(),
        error,
        format!("(line: {} column: {})", span.line, span.col_start).green()
    );

    // Spans raised at end of input carry line 0 and have no excerpt.
    if span.line == 0 {
        return out;
    }
    let Some(line) = source.lines().nth(span.line - 1) else {
        return out;
    };

    let col_start = span.col_start.min(line.len());
    let col_end = span.col_end.clamp(col_start, line.len());

    out.push_str("\n> ");
    out.push_str(&line[..col_start]);
    out.push_str(&line[col_start..col_end].red().to_string());
    out.push_str(&line[col_end..]);

    out.push('\n');
    out.push_str(&" ".repeat(2 + col_start));
    let width = (col_end - col_start).max(1);
    out.push_str(&"^".repeat(width).red().to_string());

    out
}

/// Default reporting path: print the rendered diagnostic and terminate.
pub fn report(source: &str, error: &Error) -> ! {
    eprintln!("{}", render(source, error));
    std::process::exit(1);
}
