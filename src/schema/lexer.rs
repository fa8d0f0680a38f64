//! Schema text lexer.

use std::fmt;

/// A token from the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub text: String,
}

/// Byte span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// A tag name; any run of characters other than whitespace and brackets.
    Name,
    LBracket,
    RBracket,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TokenKind::Name => "tag name",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Eof => "end of input",
        })
    }
}

/// Tokenize schema text. Never fails: every character is either whitespace,
/// a bracket or part of a name. The stream always ends with `Eof`.
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '[' | ']' => {
                chars.next();
                let kind = if ch == '[' { TokenKind::LBracket } else { TokenKind::RBracket };
                tokens.push(Token {
                    kind,
                    span: Span { start: pos, end: pos + 1 },
                    text: ch.to_string(),
                });
            }
            _ => {
                let mut end = pos;
                while let Some(&(i, c)) = chars.peek() {
                    if c.is_whitespace() || c == '[' || c == ']' {
                        break;
                    }
                    end = i + c.len_utf8();
                    chars.next();
                }
                tokens.push(Token {
                    kind: TokenKind::Name,
                    span: Span { start: pos, end },
                    text: input[pos..end].to_string(),
                });
            }
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        span: Span { start: input.len(), end: input.len() },
        text: String::new(),
    });
    tokens
}
