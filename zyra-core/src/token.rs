//! Lexical analysis of request files.
//!
//! The tokenizer is not on the execution path; documents are parsed line by line in
//! [`crate::parser`]. Tokens serve consumers that need a flat lexical view of a file,
//! such as `zyra tokens` or editor highlighting.

use std::str::FromStr;

use crate::model::Method;

const DOC_COMMENT_MARKER: &str = "\"\"\"";

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    /// `"""` ... `"""`
    DocComment,
    /// GET, POST, etc
    Method,
    /// `[headers]`, `[assert]`
    Section,
    Identifier,
    /// `=`
    Assign,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
    /// 1-based line of the first character.
    pub line: usize,
    /// 1-based column of the first character.
    pub column: usize,
}

/// Tokenize the whole input. The last token is always [`TokenKind::Eof`].
pub fn tokenize(src: &str) -> Vec<Token> {
    Tokenizer::new(src).collect()
}

pub struct Tokenizer {
    src: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    done: bool,
}

impl Tokenizer {
    pub fn new(src: &str) -> Tokenizer {
        Tokenizer {
            src: src.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            done: false,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn at_marker(&self) -> bool {
        DOC_COMMENT_MARKER
            .chars()
            .enumerate()
            .all(|(i, c)| self.src.get(self.pos + i) == Some(&c))
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(is_whitespace) {
            self.bump();
        }
    }

    fn read_doc_comment(&mut self) -> String {
        for _ in 0..DOC_COMMENT_MARKER.len() {
            self.bump();
        }
        let mut content = String::new();
        while self.peek().is_some() {
            if self.at_marker() {
                for _ in 0..DOC_COMMENT_MARKER.len() {
                    self.bump();
                }
                break;
            }
            content.extend(self.bump());
        }
        content
    }

    fn read_section(&mut self) -> String {
        self.bump(); // '['
        let mut name = String::new();
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.bump();
            if ch == ']' {
                break;
            }
            name.push(ch);
        }
        name
    }

    fn read_identifier(&mut self) -> String {
        let mut literal = String::new();
        while let Some(ch) = self.peek().filter(|ch| !is_whitespace(*ch)) {
            literal.push(ch);
            self.bump();
        }
        literal
    }

    fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        let (line, column) = (self.line, self.column);

        let (kind, literal) = match self.peek() {
            None => (TokenKind::Eof, String::new()),
            Some('"') if self.at_marker() => (TokenKind::DocComment, self.read_doc_comment()),
            Some('[') => (TokenKind::Section, self.read_section()),
            Some('=') => {
                self.bump();
                (TokenKind::Assign, "=".to_string())
            }
            Some(_) => {
                let literal = self.read_identifier();
                if Method::from_str(&literal).is_ok() {
                    (TokenKind::Method, literal)
                } else {
                    (TokenKind::Identifier, literal)
                }
            }
        };

        Token {
            kind,
            literal,
            line,
            column,
        }
    }
}

impl Iterator for Tokenizer {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.done {
            return None;
        }
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            self.done = true;
        }
        Some(token)
    }
}

fn is_whitespace(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\r' | '\n')
}
