//! Tokenizes assembly source into a stream of spanned tokens
//!
//! The language is line-oriented: newlines are real tokens because they
//! terminate instructions. Comments start with `;` and run to the end of
//! the line, a bare `\r` is dropped so CRLF files lex like LF files, and
//! spaces and tabs only separate tokens. Strings are single-quoted with no
//! escape processing; integers are signed decimal; symbols match
//! `[A-Za-z_][A-Za-z0-9_]*`.

use crate::error::{Error, Span};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Symbol(String),
    Str(String),
    Int(i64),
    Colon,
    Comma,
    BracketOpen,
    BracketClose,
    Newline,
    Eof,
}

impl TokenKind {
    /// Uppercase tag used in the top-level parse error.
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Symbol(_) => "SYMBOL",
            TokenKind::Str(_) => "STRING",
            TokenKind::Int(_) => "INT",
            TokenKind::Colon => "COLON",
            TokenKind::Comma => "COMMA",
            TokenKind::BracketOpen => "BRACKET_OPEN",
            TokenKind::BracketClose => "BRACKET_CLOSE",
            TokenKind::Newline => "NEW_LINE",
            TokenKind::Eof => "EOF",
        }
    }

    /// Human-readable kind used in "expected a ..." errors.
    pub fn friendly_name(&self) -> &'static str {
        match self {
            TokenKind::Symbol(_) => "symbol",
            TokenKind::Str(_) => "string",
            TokenKind::Int(_) => "integer",
            TokenKind::Colon => ":",
            TokenKind::Comma => ",",
            TokenKind::BracketOpen => "[",
            TokenKind::BracketClose => "]",
            TokenKind::Newline => "new line",
            TokenKind::Eof => "eof",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    /// Value rendering used inside parse error messages.
    pub fn value_string(&self) -> String {
        match &self.kind {
            TokenKind::Symbol(text) => text.clone(),
            TokenKind::Str(text) => format!("'{}'", text),
            TokenKind::Int(value) => value.to_string(),
            TokenKind::Colon => ":".to_string(),
            TokenKind::Comma => ",".to_string(),
            TokenKind::BracketOpen => "[".to_string(),
            TokenKind::BracketClose => "]".to_string(),
            TokenKind::Newline => "<NEW_LINE>".to_string(),
            TokenKind::Eof => "<EOF>".to_string(),
        }
    }

    /// Newline or end of input, the two tokens that end an instruction.
    pub fn is_terminator(&self) -> bool {
        matches!(self.kind, TokenKind::Newline | TokenKind::Eof)
    }
}

pub struct Lexer<'a> {
    code: &'a [u8],
    offset: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(code: &'a str) -> Lexer<'a> {
        Lexer {
            code: code.as_bytes(),
            offset: 0,
            line: 1,
            column: 0,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.offset >= self.code.len()
    }

    fn peek(&self) -> Option<u8> {
        self.code.get(self.offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.offset += 1;
        self.column += 1;
        Some(c)
    }

    fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.bump();
        }
    }

    fn skip_comment(&mut self) {
        while !matches!(self.peek(), None | Some(b'\n')) {
            self.bump();
        }
    }

    /// Produces the next token. Once the input is exhausted every call
    /// returns [TokenKind::Eof], which carries the zero span.
    pub fn next_token(&mut self) -> Result<Token, Error> {
        loop {
            self.skip_spaces();
            match self.peek() {
                None => {
                    return Ok(Token {
                        kind: TokenKind::Eof,
                        span: Span::default(),
                    });
                }
                Some(b';') => self.skip_comment(),
                // Dropped without advancing the column so spans on CRLF
                // lines match their LF equivalents.
                Some(b'\r') => self.offset += 1,
                Some(c) if c.is_ascii_digit() => return self.lex_int(),
                Some(b'-' | b'+') => {
                    let col = self.column;
                    self.bump();
                    if matches!(self.peek(), Some(d) if d.is_ascii_digit()) {
                        // Push the sign back; it belongs to the integer.
                        self.offset -= 1;
                        self.column -= 1;
                        return self.lex_int();
                    }
                    return Err(Error::UnexpectedToken {
                        span: Span::new(self.line, col, col + 1),
                    });
                }
                Some(b'\'') => return self.lex_string(),
                Some(b'\n') => {
                    self.bump();
                    let span = Span::new(self.line, self.column - 1, self.column);
                    self.line += 1;
                    self.column = 0;
                    return Ok(Token {
                        kind: TokenKind::Newline,
                        span,
                    });
                }
                Some(b':') => return Ok(self.lex_single(TokenKind::Colon)),
                Some(b',') => return Ok(self.lex_single(TokenKind::Comma)),
                Some(b'[') => return Ok(self.lex_single(TokenKind::BracketOpen)),
                Some(b']') => return Ok(self.lex_single(TokenKind::BracketClose)),
                Some(c) if c.is_ascii_alphabetic() || c == b'_' => {
                    return Ok(self.lex_symbol());
                }
                Some(c) => {
                    let span = Span::new(self.line, self.column, self.column + 1);
                    let ch = if c.is_ascii_graphic() { c as char } else { '?' };
                    return Err(Error::UnexpectedChar { ch, code: c, span });
                }
            }
        }
    }

    fn lex_single(&mut self, kind: TokenKind) -> Token {
        let span = Span::new(self.line, self.column, self.column + 1);
        self.bump();
        Token { kind, span }
    }

    fn lex_int(&mut self) -> Result<Token, Error> {
        let col = self.column;
        let mut text = String::new();
        if let Some(sign @ (b'-' | b'+')) = self.peek() {
            text.push(sign as char);
            self.bump();
        }
        while let Some(d) = self.peek() {
            if !d.is_ascii_digit() {
                break;
            }
            text.push(d as char);
            self.bump();
        }

        let span = Span::new(self.line, col, self.column);
        let value = text
            .parse::<i64>()
            .map_err(|_| Error::InvalidIntLiteral { span })?;
        Ok(Token {
            kind: TokenKind::Int(value),
            span,
        })
    }

    fn lex_string(&mut self) -> Result<Token, Error> {
        self.bump(); // opening quote
        let start = self.offset;
        while !matches!(self.peek(), None | Some(b'\'' | b'\n')) {
            self.bump();
        }
        let len = self.offset - start;

        if !matches!(self.peek(), Some(b'\'')) {
            // The span runs from the opening quote through the last
            // scanned column.
            return Err(Error::UnclosedString {
                span: Span::new(self.line, self.column - len - 1, self.column - 1),
            });
        }

        let text = String::from_utf8_lossy(&self.code[start..self.offset]).into_owned();
        self.bump(); // closing quote
        Ok(Token {
            kind: TokenKind::Str(text),
            span: Span::new(self.line, self.column - len - 2, self.column),
        })
    }

    fn lex_symbol(&mut self) -> Token {
        let col = self.column;
        let start = self.offset;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_') {
            self.bump();
        }
        let text = String::from_utf8_lossy(&self.code[start..self.offset]).into_owned();
        Token {
            kind: TokenKind::Symbol(text),
            span: Span::new(self.line, col, self.column),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token().expect("lex error");
            let eof = matches!(token.kind, TokenKind::Eof);
            tokens.push(token);
            if eof {
                break;
            }
        }
        tokens
    }

    fn lex_until_error(source: &str) -> Error {
        let mut lexer = Lexer::new(source);
        loop {
            match lexer.next_token() {
                Ok(token) if matches!(token.kind, TokenKind::Eof) => {
                    panic!("no error in {:?}", source)
                }
                Ok(_) => {}
                Err(error) => return error,
            }
        }
    }

    #[test]
    fn empty_input_is_eof() {
        let mut lexer = Lexer::new("");
        assert!(lexer.is_eof());
        let token = lexer.next_token().unwrap();
        assert_eq!(token.kind, TokenKind::Eof);
        assert_eq!(token.span, Span::default());
    }

    #[test]
    fn int_tokens() {
        let tokens = tokenize("-223 100 +42");
        assert_eq!(tokens[0].kind, TokenKind::Int(-223));
        assert_eq!(tokens[1].kind, TokenKind::Int(100));
        assert_eq!(tokens[2].kind, TokenKind::Int(42));
        assert_eq!(tokens[0].span, Span::new(1, 0, 4));
        assert_eq!(tokens[1].span, Span::new(1, 5, 8));
    }

    #[test]
    fn int_tokens_cover_the_64_bit_range() {
        let tokens = tokenize("-9223372036854775808 9223372036854775807");
        assert_eq!(tokens[0].kind, TokenKind::Int(i64::MIN));
        assert_eq!(tokens[1].kind, TokenKind::Int(i64::MAX));
    }

    #[test]
    fn int_out_of_range_is_an_error() {
        let error = lex_until_error("9223372036854775808");
        assert_eq!(error.to_string(), "invalid integer literal");
        assert_eq!(error.span(), Span::new(1, 0, 19));
    }

    #[test]
    fn string_tokens() {
        let tokens = tokenize("'(5+1)/2 = ' '' 'foo'");
        assert_eq!(tokens[0].kind, TokenKind::Str("(5+1)/2 = ".to_string()));
        assert_eq!(tokens[1].kind, TokenKind::Str(String::new()));
        assert_eq!(tokens[2].kind, TokenKind::Str("foo".to_string()));
    }

    #[test]
    fn punctuation_tokens() {
        let tokens = tokenize(",  : [ ]");
        assert_eq!(tokens[0].kind, TokenKind::Comma);
        assert_eq!(tokens[1].kind, TokenKind::Colon);
        assert_eq!(tokens[2].kind, TokenKind::BracketOpen);
        assert_eq!(tokens[3].kind, TokenKind::BracketClose);
    }

    #[test]
    fn a_full_line() {
        let tokens = tokenize("msg  '(5+1)/2 = ', a    ; output message\n");
        assert_eq!(tokens[0].kind, TokenKind::Symbol("msg".to_string()));
        assert_eq!(tokens[1].kind, TokenKind::Str("(5+1)/2 = ".to_string()));
        assert_eq!(tokens[2].kind, TokenKind::Comma);
        assert_eq!(tokens[3].kind, TokenKind::Symbol("a".to_string()));
        assert_eq!(tokens[4].kind, TokenKind::Newline);
        assert_eq!(tokens[5].kind, TokenKind::Eof);
    }

    #[test]
    fn token_positions() {
        let tokens = tokenize(concat!(
            "; My first program\n", // 1
            "mov  a, 123\n",        // 2
            "inc  a\n",             // 3
            "call function\n",      // 4
            "msg  '(5+1)/2 = ', a    ; output message\n", // 5
            "end\n",                // 6
            "\n",                   // 7
            "function:\n",          // 8
            "    div  a, 2\n",      // 9
            "    ret\n",            // 10
            "foo:\n",               // 11
            " mov a, b\n",          // 12
            " mov b, a\n",          // 13
            " ret\n",               // 14
            "\n",                   // 15
        ));

        let positions = [
            (1, 18, 19), // newline after the comment
            (2, 0, 3),
            (2, 5, 6),
            (2, 6, 7),
            (2, 8, 11),
            (2, 11, 12),
            (3, 0, 3),
            (3, 5, 6),
            (3, 6, 7),
            (4, 0, 4),
            (4, 5, 13),
            (4, 13, 14),
            (5, 0, 3),
            (5, 5, 17),
            (5, 17, 18),
            (5, 19, 20),
            (5, 40, 41),
            (6, 0, 3),
            (6, 3, 4),
            (7, 0, 1),
            (8, 0, 8),
            (8, 8, 9),
            (8, 9, 10),
            (9, 4, 7),
            (9, 9, 10),
            (9, 10, 11),
            (9, 12, 13),
            (9, 13, 14),
            (10, 4, 7),
            (10, 7, 8),
            (11, 0, 3),
            (11, 3, 4),
            (11, 4, 5),
            (12, 1, 4),
            (12, 5, 6),
            (12, 6, 7),
            (12, 8, 9),
            (12, 9, 10),
            (13, 1, 4),
            (13, 5, 6),
            (13, 6, 7),
            (13, 8, 9),
            (13, 9, 10),
            (14, 1, 4),
            (14, 4, 5),
            (15, 0, 1),
            (0, 0, 0), // eof
        ];

        assert_eq!(tokens.len(), positions.len());
        for (token, (line, col_start, col_end)) in tokens.iter().zip(positions) {
            assert_eq!(token.span, Span::new(line, col_start, col_end), "{:?}", token);
        }
    }

    #[test]
    fn crlf_lines_lex_like_lf_lines() {
        let tokens = tokenize("mov a, 1\r\nend\r\n");
        assert_eq!(tokens[0].span, Span::new(1, 0, 3));
        assert_eq!(tokens[4].kind, TokenKind::Newline);
        assert_eq!(tokens[4].span, Span::new(1, 8, 9));
        assert_eq!(tokens[5].kind, TokenKind::Symbol("end".to_string()));
        assert_eq!(tokens[5].span, Span::new(2, 0, 3));
    }

    #[test]
    fn unclosed_string_spans() {
        let cases = [
            ("'bar  , 5", Span::new(1, 0, 8)),
            ("msg 5, a, 3, 'foo", Span::new(1, 13, 16)),
            (
                "mov a, b\nmov c, d\nmsg 'c=', c, 'd=, d\nsub a, 1\nend\n",
                Span::new(3, 13, 18),
            ),
        ];
        for (source, span) in cases {
            let error = lex_until_error(source);
            assert_eq!(error.to_string(), "unclosed string literal");
            assert_eq!(error.span(), span, "{:?}", source);
        }
    }

    #[test]
    fn lone_sign_is_an_error() {
        let error = lex_until_error("mov a, -x");
        assert_eq!(error.to_string(), "unexpected token");
        assert_eq!(error.span(), Span::new(1, 7, 8));
    }

    #[test]
    fn unexpected_char() {
        let error = lex_until_error("mov a, @");
        assert_eq!(error.to_string(), "unexpected char '@' (64)");
        assert_eq!(error.span(), Span::new(1, 7, 8));
    }

    #[test]
    fn spans_cover_their_spelling() {
        let source = "mov  a, 123\n";
        for token in tokenize(source) {
            if matches!(token.kind, TokenKind::Eof) {
                continue;
            }
            let span = token.span;
            let spelled = &source[span.col_start..span.col_end];
            match &token.kind {
                TokenKind::Symbol(text) => assert_eq!(spelled, text),
                TokenKind::Int(value) => assert_eq!(spelled, value.to_string()),
                TokenKind::Newline => assert_eq!(spelled, "\n"),
                _ => assert_eq!(spelled.len(), span.col_end - span.col_start),
            }
        }
    }
}
