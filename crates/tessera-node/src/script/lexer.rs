// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Tokens and the scanner that produces them from source text.

/// A token produced by the scanner.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// Byte offset of the first character
    pub start: usize,
}

impl Token {
    /// Creates a new token.
    pub fn new(kind: TokenKind, start: usize) -> Self {
        Self { kind, start }
    }
}

/// The different kinds of tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    /// Numeric literal
    Number(f64),
    /// String literal
    String(String),
    /// Identifier
    Identifier(String),

    // Keywords
    Var,
    Let,
    Const,
    If,
    Else,
    Throw,
    Function,
    Return,
    Try,
    Catch,
    Finally,
    New,
    Typeof,
    True,
    False,
    Null,
    /// Reserved word this dialect does not implement (`for`, `class`, ...)
    Unsupported(&'static str),

    // Punctuation
    LeftBrace,
    RightBrace,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Semicolon,
    Comma,
    Colon,
    Dot,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Equal,
    EqualEqual,
    StrictEqual,
    NotEqual,
    StrictNotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    AmpersandAmpersand,
    PipePipe,

    /// Unterminated literal or unknown character
    Invalid(String),
    /// End of input
    Eof,
}

const KEYWORDS: &[(&str, TokenKind)] = &[
    ("var", TokenKind::Var),
    ("let", TokenKind::Let),
    ("const", TokenKind::Const),
    ("if", TokenKind::If),
    ("else", TokenKind::Else),
    ("throw", TokenKind::Throw),
    ("function", TokenKind::Function),
    ("return", TokenKind::Return),
    ("try", TokenKind::Try),
    ("catch", TokenKind::Catch),
    ("finally", TokenKind::Finally),
    ("new", TokenKind::New),
    ("typeof", TokenKind::Typeof),
    ("true", TokenKind::True),
    ("false", TokenKind::False),
    ("null", TokenKind::Null),
];

const UNSUPPORTED: &[&str] = &[
    "for", "while", "do", "switch", "case", "break", "continue", "class", "import", "export",
    "delete", "void", "in", "instanceof", "this", "yield", "await", "async",
];

impl TokenKind {
    /// Source text of a keyword token, used when keywords appear as
    /// property names (`exports.default`, `module.new`).
    pub fn keyword_text(&self) -> Option<&'static str> {
        if let TokenKind::Unsupported(word) = self {
            return Some(*word);
        }
        KEYWORDS
            .iter()
            .find(|(_, kind)| kind == self)
            .map(|(text, _)| *text)
    }
}

/// A scanner that tokenizes module source code.
pub struct Scanner<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current_pos: usize,
}

impl<'a> Scanner<'a> {
    /// Creates a new scanner for the given source code.
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.char_indices().peekable(),
            current_pos: 0,
        }
    }

    /// Returns the next token from the source.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        let start = self.current_pos;

        let Some((_, ch)) = self.advance() else {
            return Token::new(TokenKind::Eof, start);
        };

        let kind = match ch {
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => self.scan_number('.'),
            '.' => TokenKind::Dot,
            '=' => self.scan_equal(),
            '!' => self.scan_bang(),
            '<' => self.scan_with_equal(TokenKind::LessThan, TokenKind::LessThanEqual),
            '>' => self.scan_with_equal(TokenKind::GreaterThan, TokenKind::GreaterThanEqual),
            '&' => self.scan_double('&', TokenKind::AmpersandAmpersand),
            '|' => self.scan_double('|', TokenKind::PipePipe),
            '"' | '\'' => self.scan_string(ch),
            '0'..='9' => self.scan_number(ch),
            _ if is_id_start(ch) => self.scan_identifier(ch),
            _ => TokenKind::Invalid(format!("Unexpected character '{}'", ch)),
        };

        Token::new(kind, start)
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let result = self.chars.next();
        if let Some((pos, ch)) = result {
            self.current_pos = pos + ch.len_utf8();
        }
        result
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn peek_next(&self) -> Option<char> {
        let mut iter = self.chars.clone();
        iter.next();
        iter.next().map(|(_, ch)| ch)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() || c == '\u{feff}' => {
                    self.advance();
                }
                Some('/') => match self.peek_next() {
                    Some('/') => {
                        while let Some(ch) = self.peek() {
                            if ch == '\n' || ch == '\r' {
                                break;
                            }
                            self.advance();
                        }
                    }
                    Some('*') => {
                        self.advance();
                        self.advance();
                        let mut prev = ' ';
                        while let Some((_, ch)) = self.advance() {
                            if prev == '*' && ch == '/' {
                                break;
                            }
                            prev = ch;
                        }
                    }
                    _ => break,
                },
                // Shebang line at the very start of a file
                Some('#') if self.current_pos == 0 && self.peek_next() == Some('!') => {
                    while let Some(ch) = self.peek() {
                        if ch == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_equal(&mut self) -> TokenKind {
        if self.peek() == Some('=') {
            self.advance();
            if self.peek() == Some('=') {
                self.advance();
                TokenKind::StrictEqual
            } else {
                TokenKind::EqualEqual
            }
        } else {
            TokenKind::Equal
        }
    }

    fn scan_bang(&mut self) -> TokenKind {
        if self.peek() == Some('=') {
            self.advance();
            if self.peek() == Some('=') {
                self.advance();
                TokenKind::StrictNotEqual
            } else {
                TokenKind::NotEqual
            }
        } else {
            TokenKind::Bang
        }
    }

    fn scan_with_equal(&mut self, single: TokenKind, with_equal: TokenKind) -> TokenKind {
        if self.peek() == Some('=') {
            self.advance();
            with_equal
        } else {
            single
        }
    }

    fn scan_double(&mut self, ch: char, double: TokenKind) -> TokenKind {
        if self.peek() == Some(ch) {
            self.advance();
            double
        } else {
            TokenKind::Invalid(format!("Unsupported operator '{}'", ch))
        }
    }

    fn scan_string(&mut self, quote: char) -> TokenKind {
        let mut value = String::new();

        loop {
            match self.advance() {
                None | Some((_, '\n')) => {
                    return TokenKind::Invalid("Unterminated string literal".to_string())
                }
                Some((_, ch)) if ch == quote => break,
                Some((_, '\\')) => match self.advance() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 'r')) => value.push('\r'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, '0')) => value.push('\0'),
                    Some((_, 'u')) => match self.scan_unicode_escape() {
                        Some(c) => value.push(c),
                        None => {
                            return TokenKind::Invalid("Invalid Unicode escape sequence".to_string())
                        }
                    },
                    // Line continuation
                    Some((_, '\n')) => {}
                    Some((_, escaped)) => value.push(escaped),
                    None => {
                        return TokenKind::Invalid("Unterminated string literal".to_string())
                    }
                },
                Some((_, ch)) => value.push(ch),
            }
        }

        TokenKind::String(value)
    }

    fn scan_unicode_escape(&mut self) -> Option<char> {
        let mut digits = String::new();
        if self.peek() == Some('{') {
            self.advance();
            while let Some((_, ch)) = self.advance() {
                if ch == '}' {
                    break;
                }
                digits.push(ch);
            }
        } else {
            for _ in 0..4 {
                digits.push(self.advance()?.1);
            }
        }
        u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32)
    }

    fn scan_number(&mut self, first: char) -> TokenKind {
        let mut text = String::from(first);

        if first == '0' && matches!(self.peek(), Some('x' | 'X')) {
            self.advance();
            let mut hex = String::new();
            while let Some(ch) = self.peek().filter(char::is_ascii_hexdigit) {
                hex.push(ch);
                self.advance();
            }
            return match u64::from_str_radix(&hex, 16) {
                Ok(n) => TokenKind::Number(n as f64),
                Err(_) => TokenKind::Invalid(format!("Invalid hex literal '0x{}'", hex)),
            };
        }

        while let Some(ch) = self.peek() {
            match ch {
                '0'..='9' | '.' => text.push(ch),
                '_' => {}
                'e' | 'E' => {
                    text.push(ch);
                    self.advance();
                    if let Some(sign @ ('+' | '-')) = self.peek() {
                        text.push(sign);
                    } else {
                        continue;
                    }
                }
                _ => break,
            }
            self.advance();
        }

        match text.parse::<f64>() {
            Ok(n) => TokenKind::Number(n),
            Err(_) => TokenKind::Invalid(format!("Invalid number literal '{}'", text)),
        }
    }

    fn scan_identifier(&mut self, first: char) -> TokenKind {
        let mut name = String::from(first);
        while let Some(ch) = self.peek() {
            if is_id_continue(ch) {
                name.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if let Some((_, kind)) = KEYWORDS.iter().find(|(text, _)| *text == name) {
            return kind.clone();
        }
        if let Some(word) = UNSUPPORTED.iter().find(|w| **w == name) {
            return TokenKind::Unsupported(*word);
        }
        TokenKind::Identifier(name)
    }
}

fn is_id_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '$'
}

fn is_id_continue(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}
