//! Tokenizer for the opam value mini-language.
//!
//! Produces brackets, braces, parentheses, quoted strings and bare words, each
//! carrying the byte span it was read from so callers can recover source text.

use crate::SchemaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    LParen,
    RParen,
    Str,
    Word,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// Source text of the token. Quoted strings keep their quotes.
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
}

impl<'a> Token<'a> {
    /// The text between the quotes of a `Str` token; the full text otherwise.
    pub fn contents(&self) -> &'a str {
        match self.kind {
            TokenKind::Str => &self.text[1..self.text.len() - 1],
            _ => self.text,
        }
    }
}

fn is_delimiter(c: char) -> bool {
    matches!(c, '[' | ']' | '{' | '}' | '(' | ')' | '"')
}

pub fn tokenize(src: &str) -> Result<Vec<Token<'_>>, SchemaError> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let kind = match c {
            '[' => Some(TokenKind::LBracket),
            ']' => Some(TokenKind::RBracket),
            '{' => Some(TokenKind::LBrace),
            '}' => Some(TokenKind::RBrace),
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            _ => None,
        };
        if let Some(kind) = kind {
            chars.next();
            let end = start + c.len_utf8();
            tokens.push(Token {
                kind,
                text: &src[start..end],
                start,
                end,
            });
            continue;
        }

        if c == '"' {
            chars.next();
            let mut escaped = false;
            let mut end = None;
            for (i, ch) in chars.by_ref() {
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == '"' {
                    end = Some(i + 1);
                    break;
                }
            }
            let Some(end) = end else {
                return Err(SchemaError::MalformedField(format!(
                    "unterminated string starting at offset {start}"
                )));
            };
            tokens.push(Token {
                kind: TokenKind::Str,
                text: &src[start..end],
                start,
                end,
            });
            continue;
        }

        let mut end = start;
        while let Some(&(i, ch)) = chars.peek() {
            if ch.is_whitespace() || is_delimiter(ch) {
                break;
            }
            end = i + ch.len_utf8();
            chars.next();
        }
        tokens.push(Token {
            kind: TokenKind::Word,
            text: &src[start..end],
            start,
            end,
        });
    }

    Ok(tokens)
}
