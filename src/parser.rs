//! Parses the token stream into a tree of labels and instructions
//!
//! The grammar is flat: a file is a sequence of label-less instructions
//! followed (or interleaved) by labels, each label owning the instructions
//! up to the next label or the end of input. Operands are symbols, strings,
//! integers, or the bracketed memory forms `[reg]` and `offset[reg]`.
//!
//! All tokens are materialized before parsing starts, so lex errors for the
//! whole file surface in [Parser::new].

use crate::error::{Error, Span};
use crate::lexer::{Lexer, Token, TokenKind};

#[derive(Debug, Clone)]
pub enum OperandNode {
    Simple(Token),
    /// `[reg]` or `offset[reg]`; the span covers the whole bracketed form.
    Mem {
        offset: Option<Token>,
        register: Token,
        span: Span,
    },
}

#[derive(Debug, Clone)]
pub struct InstructionNode {
    pub opcode: Token,
    pub operands: Vec<OperandNode>,
}

#[derive(Debug, Clone)]
pub struct LabelNode {
    pub name: Token,
    pub instructions: Vec<InstructionNode>,
}

#[derive(Debug, Clone, Default)]
pub struct TopLevel {
    pub instructions: Vec<InstructionNode>,
    pub labels: Vec<LabelNode>,
}

pub struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
}

impl Parser {
    /// Lexes the whole input upfront. The token buffer always ends with an
    /// end-of-input token, so the cursor helpers never run out.
    pub fn new(source: &str) -> Result<Parser, Error> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token()?;
            let eof = matches!(token.kind, TokenKind::Eof);
            tokens.push(token);
            if eof {
                break;
            }
        }
        Ok(Parser { tokens, cursor: 0 })
    }

    fn next_token(&mut self) -> Token {
        if self.cursor >= self.tokens.len() {
            return self.tokens[self.tokens.len() - 1].clone();
        }
        let token = self.tokens[self.cursor].clone();
        self.cursor += 1;
        token
    }

    fn peek_token(&self) -> &Token {
        &self.tokens[self.cursor.min(self.tokens.len() - 1)]
    }

    fn next_skip_newline(&mut self) -> Token {
        loop {
            let token = self.next_token();
            if !matches!(token.kind, TokenKind::Newline) {
                return token;
            }
        }
    }

    fn peek_skip_newline(&mut self) -> Token {
        let saved = self.cursor;
        let token = self.next_skip_newline();
        self.cursor = saved;
        token
    }

    /// The next two non-newline tokens spell `symbol:`. A newline is not
    /// allowed between the name and the colon.
    fn at_label(&mut self) -> bool {
        let saved = self.cursor;
        let name = self.next_skip_newline();
        let colon = self.next_token();
        self.cursor = saved;
        matches!(name.kind, TokenKind::Symbol(_)) && matches!(colon.kind, TokenKind::Colon)
    }

    fn expect_symbol(&mut self) -> Result<Token, Error> {
        let token = self.next_token();
        if matches!(token.kind, TokenKind::Symbol(_)) {
            return Ok(token);
        }
        Err(Error::ExpectedToken {
            expected: "symbol",
            got: token.value_string(),
            span: token.span,
        })
    }

    fn expect_bracket_close(&mut self) -> Result<Token, Error> {
        let token = self.next_token();
        if matches!(token.kind, TokenKind::BracketClose) {
            return Ok(token);
        }
        Err(Error::ExpectedToken {
            expected: "]",
            got: token.value_string(),
            span: token.span,
        })
    }

    fn parse_operand(&mut self) -> Result<OperandNode, Error> {
        let token = self.next_token();

        // `[reg]` or `offset[reg]`
        if matches!(token.kind, TokenKind::BracketOpen)
            || matches!(self.peek_token().kind, TokenKind::BracketOpen)
        {
            let has_offset = !matches!(token.kind, TokenKind::BracketOpen);
            if has_offset && !matches!(token.kind, TokenKind::Int(_)) {
                return Err(Error::BadMemOffset {
                    kind: token.kind.friendly_name(),
                    span: token.span,
                });
            }
            if has_offset {
                self.next_token(); // the '['
            }
            let register = self.expect_symbol()?;
            let close = self.expect_bracket_close()?;
            let span = Span::new(token.span.line, token.span.col_start, close.span.col_end);
            let offset = has_offset.then_some(token);
            return Ok(OperandNode::Mem {
                offset,
                register,
                span,
            });
        }

        match token.kind {
            TokenKind::Symbol(_) | TokenKind::Str(_) | TokenKind::Int(_) => {
                Ok(OperandNode::Simple(token))
            }
            _ => Err(Error::BadOperand {
                got: token.value_string(),
                span: token.span,
            }),
        }
    }

    fn parse_operands(&mut self) -> Result<Vec<OperandNode>, Error> {
        let mut operands = Vec::new();
        loop {
            operands.push(self.parse_operand()?);

            let token = self.next_token();
            if token.is_terminator() {
                break;
            }
            if !matches!(token.kind, TokenKind::Comma) {
                return Err(Error::ExpectedComma {
                    got: token.value_string(),
                    span: token.span,
                });
            }
        }
        Ok(operands)
    }

    /// The caller has already established that the next non-newline token
    /// is a symbol; unknown opcode spellings are caught during validation.
    fn parse_instruction(&mut self) -> Result<InstructionNode, Error> {
        let opcode = self.next_skip_newline();
        let operands = if self.peek_token().is_terminator() {
            Vec::new()
        } else {
            self.parse_operands()?
        };
        Ok(InstructionNode { opcode, operands })
    }

    fn parse_label(&mut self) -> Result<LabelNode, Error> {
        let name = self.next_skip_newline();
        self.next_token(); // the ':', guaranteed by the label lookahead

        let first = self.peek_skip_newline();
        if !matches!(first.kind, TokenKind::Symbol(_)) {
            return Err(Error::EmptyLabel {
                got: first.value_string(),
                span: first.span,
            });
        }

        let mut instructions = Vec::new();
        loop {
            instructions.push(self.parse_instruction()?);
            if matches!(self.peek_skip_newline().kind, TokenKind::Eof) || self.at_label() {
                break;
            }
        }
        Ok(LabelNode { name, instructions })
    }

    pub fn parse(&mut self) -> Result<TopLevel, Error> {
        let mut top = TopLevel::default();
        loop {
            let next = self.peek_skip_newline();
            match next.kind {
                TokenKind::Eof => break,
                _ if self.at_label() => top.labels.push(self.parse_label()?),
                TokenKind::Symbol(_) => top.instructions.push(self.parse_instruction()?),
                _ => {
                    return Err(Error::UnexpectedTopLevel {
                        kind: next.kind.name(),
                        value: next.value_string(),
                        span: next.span,
                    });
                }
            }
        }
        Ok(top)
    }
}
