//! A small JavaScript tokenizer.
//!
//! It does not build a syntax tree. It splits source text into tokens that
//! are exact slices of the input, so callers can rewrite code while leaving
//! string literals, templates, regular expressions and comments untouched.
//! Concatenating every token's text reproduces the input byte for byte.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Whitespace without a line break.
    Whitespace,
    /// Whitespace containing at least one line break.
    Newline,
    LineComment,
    BlockComment,
    Ident,
    Number,
    Str,
    /// One piece of a template literal: from its opening backtick or `}` up
    /// to and including the closing backtick or `${`.
    Template,
    Regex,
    Punct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub start: usize,
}

impl<'a> Token<'a> {
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }

    /// Whitespace and comments.
    pub fn is_trivia(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Whitespace
                | TokenKind::Newline
                | TokenKind::LineComment
                | TokenKind::BlockComment
        )
    }

    pub fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct && self.text.len() == c.len_utf8() && self.text.starts_with(c)
    }

    pub fn is_ident(&self, name: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == name
    }

    pub fn has_line_break(&self) -> bool {
        match self.kind {
            TokenKind::Newline => true,
            TokenKind::BlockComment => self.text.contains('\n'),
            _ => false,
        }
    }

    /// Value of a string literal without its quotes. Escapes other than
    /// `\\`, `\'` and `\"` are kept verbatim.
    pub fn string_value(&self) -> Option<String> {
        if self.kind != TokenKind::Str || self.text.len() < 2 {
            return None;
        }
        let inner = &self.text[1..self.text.len() - 1];
        let mut value = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some(escaped @ ('\\' | '\'' | '"')) => value.push(escaped),
                    Some(other) => {
                        value.push('\\');
                        value.push(other);
                    }
                    None => value.push('\\'),
                }
            } else {
                value.push(c);
            }
        }
        Some(value)
    }
}

/// Keywords after which a `/` starts a regular expression literal.
const REGEX_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "yield", "await",
];

pub fn tokenize(src: &str) -> Vec<Token<'_>> {
    Lexer::new(src).run()
}

/// Tokens with trivia removed, paired with their index in the full stream.
pub fn significant<'t, 'a>(tokens: &'t [Token<'a>]) -> Vec<(usize, &'t Token<'a>)> {
    tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.is_trivia())
        .collect()
}

pub fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$' || (!c.is_ascii() && c.is_alphanumeric())
}

pub fn is_ident_part(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    tokens: Vec<Token<'a>>,
    brace_depth: usize,
    /// Brace depth recorded at each open `${`.
    template_stack: Vec<usize>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            tokens: Vec::new(),
            brace_depth: 0,
            template_stack: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<Token<'a>> {
        while let Some(c) = self.peek() {
            let start = self.pos;
            let kind = match c {
                c if c.is_whitespace() => self.whitespace(),
                '/' if self.peek_at(1) == Some('/') => self.line_comment(),
                '/' if self.peek_at(1) == Some('*') => self.block_comment(),
                '/' if self.regex_allowed() => self.regex(),
                '\'' | '"' => self.string(c),
                '`' => self.template(),
                '}' if self.template_stack.last() == Some(&self.brace_depth) => {
                    self.template_stack.pop();
                    self.template()
                }
                c if c.is_ascii_digit() => self.number(),
                '.' if self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) => self.number(),
                c if is_ident_start(c) => self.ident(),
                '\\' if self.peek_at(1) == Some('u') => self.ident(),
                _ => self.punct(c),
            };
            self.push(kind, start);
        }
        self.tokens
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            text: &self.src[start..self.pos],
            start,
        });
    }

    fn last_significant(&self) -> Option<&Token<'a>> {
        self.tokens.iter().rev().find(|t| !t.is_trivia())
    }

    fn regex_allowed(&self) -> bool {
        let Some(prev) = self.last_significant() else {
            return true;
        };
        match prev.kind {
            TokenKind::Punct => !(prev.is_punct(')') || prev.is_punct(']')),
            TokenKind::Ident => REGEX_KEYWORDS.contains(&prev.text),
            TokenKind::Template => prev.text.ends_with("${"),
            _ => false,
        }
    }

    fn whitespace(&mut self) -> TokenKind {
        let mut newline = false;
        while let Some(c) = self.peek().filter(|c| c.is_whitespace()) {
            newline |= matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}');
            self.bump();
        }
        if newline {
            TokenKind::Newline
        } else {
            TokenKind::Whitespace
        }
    }

    fn line_comment(&mut self) -> TokenKind {
        while let Some(c) = self.peek() {
            if c == '\n' || c == '\r' {
                break;
            }
            self.bump();
        }
        TokenKind::LineComment
    }

    fn block_comment(&mut self) -> TokenKind {
        self.pos += 2;
        match self.src[self.pos..].find("*/") {
            Some(end) => self.pos += end + 2,
            None => self.pos = self.src.len(),
        }
        TokenKind::BlockComment
    }

    fn string(&mut self, quote: char) -> TokenKind {
        self.bump();
        while let Some(c) = self.peek() {
            match c {
                '\\' => {
                    self.bump();
                    self.bump();
                }
                '\n' => break,
                c if c == quote => {
                    self.bump();
                    break;
                }
                _ => {
                    self.bump();
                }
            }
        }
        TokenKind::Str
    }

    /// Lexes from a backtick or a closing `}` to the next backtick or `${`.
    fn template(&mut self) -> TokenKind {
        self.bump();
        while let Some(c) = self.peek() {
            match c {
                '\\' => {
                    self.bump();
                    self.bump();
                }
                '`' => {
                    self.bump();
                    break;
                }
                '$' if self.peek_at(1) == Some('{') => {
                    self.pos += 2;
                    self.template_stack.push(self.brace_depth);
                    break;
                }
                _ => {
                    self.bump();
                }
            }
        }
        TokenKind::Template
    }

    fn regex(&mut self) -> TokenKind {
        let start = self.pos;
        self.bump();
        let mut in_class = false;
        loop {
            match self.peek() {
                None | Some('\n') | Some('\r') => {
                    // Not a regex after all; treat the slash as an operator.
                    self.pos = start + 1;
                    return TokenKind::Punct;
                }
                Some('\\') => {
                    self.bump();
                    self.bump();
                }
                Some('[') => {
                    in_class = true;
                    self.bump();
                }
                Some(']') => {
                    in_class = false;
                    self.bump();
                }
                Some('/') if !in_class => {
                    self.bump();
                    break;
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
        while self.peek().is_some_and(is_ident_part) {
            self.bump();
        }
        TokenKind::Regex
    }

    fn number(&mut self) -> TokenKind {
        let start = self.pos;
        while let Some(c) = self.peek() {
            let exponent_sign = (c == '+' || c == '-')
                && self.src[start..self.pos].ends_with(['e', 'E'])
                && !self.src[start..].starts_with("0x")
                && !self.src[start..].starts_with("0X");
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || exponent_sign {
                self.bump();
            } else {
                break;
            }
        }
        TokenKind::Number
    }

    fn ident(&mut self) -> TokenKind {
        while let Some(c) = self.peek() {
            if is_ident_part(c) {
                self.bump();
            } else if c == '\\' && self.peek_at(1) == Some('u') {
                self.pos += 2;
            } else {
                break;
            }
        }
        TokenKind::Ident
    }

    fn punct(&mut self, c: char) -> TokenKind {
        match c {
            '{' => self.brace_depth += 1,
            '}' => self.brace_depth = self.brace_depth.saturating_sub(1),
            _ => {}
        }
        self.bump();
        TokenKind::Punct
    }
}
