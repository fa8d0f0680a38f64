//! Schema text recursive descent parser.
//!
//! ```text
//! document := tree EOF
//!           | '[' tree ']' EOF
//! tree     := node node*          -- nodes after the first hang off the root
//! node     := NAME ( '[' node* ']' )?
//! ```

use super::lexer::{Token, TokenKind};
use super::{NodeRef, Schema, MAX_DEPTH};
use crate::model::TypeTag;
use crate::{Error, Result};

/// Parser state: wraps a token slice with cursor.
struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn advance(&mut self) -> &Token {
        let tok = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind) -> Result<&Token> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(kind))
        }
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, msg: String) -> Error {
        Error::SyntaxError {
            position: self.peek().span.start,
            message: msg,
        }
    }

    fn unexpected(&self, wanted: TokenKind) -> Error {
        let tok = self.peek();
        let msg = match (wanted, tok.kind) {
            (TokenKind::Name, TokenKind::LBracket) => "'[' must follow a tag name".to_string(),
            (TokenKind::RBracket, TokenKind::Eof) => "unterminated '['".to_string(),
            (_, TokenKind::Eof) => format!("expected {wanted}, got end of input"),
            (_, got) => format!("expected {wanted}, got {got} '{}'", tok.text),
        };
        self.error(msg)
    }
}

/// Parse schema text into a tree.
pub fn parse_schema(tokens: &[Token]) -> Result<Schema> {
    let mut p = Parser::new(tokens);
    if p.at(TokenKind::Eof) {
        return Err(p.error("empty schema".into()));
    }

    let wrapped = p.eat(TokenKind::LBracket);
    let close = if wrapped { TokenKind::RBracket } else { TokenKind::Eof };

    let root_tag = parse_tag(&mut p)?;
    let mut schema = Schema::new(root_tag);
    let root = schema.root();
    parse_scope(&mut p, &mut schema, root)?;

    while !p.at(close) {
        match p.peek_kind() {
            TokenKind::Name => parse_node(&mut p, &mut schema, root)?,
            TokenKind::RBracket => return Err(p.error("unbalanced ']'".into())),
            TokenKind::LBracket => return Err(p.unexpected(TokenKind::Name)),
            TokenKind::Eof => return Err(p.unexpected(TokenKind::RBracket)),
        }
    }

    if wrapped {
        p.expect(TokenKind::RBracket)?;
    }
    if !p.at(TokenKind::Eof) {
        return Err(p.error(format!("trailing input '{}'", p.peek().text)));
    }
    Ok(schema)
}

fn parse_tag(p: &mut Parser) -> Result<TypeTag> {
    let tok = p.expect(TokenKind::Name)?;
    let tag = TypeTag::from_name(&tok.text);
    if tag.is_invalid() && !tok.text.eq_ignore_ascii_case(TypeTag::Invalid.name()) {
        tracing::warn!(name = tok.text.as_str(), position = tok.span.start, "unknown tag name in schema");
    }
    Ok(tag)
}

fn parse_node(p: &mut Parser, schema: &mut Schema, parent: NodeRef) -> Result<()> {
    let tag = parse_tag(p)?;
    let node = schema.append_child(parent, tag);
    parse_scope(p, schema, node)
}

/// Optional `[ child* ]` after a node.
fn parse_scope(p: &mut Parser, schema: &mut Schema, node: NodeRef) -> Result<()> {
    if !p.at(TokenKind::LBracket) {
        return Ok(());
    }
    if schema.ply(node) >= MAX_DEPTH {
        return Err(p.error(format!("schema nests deeper than {MAX_DEPTH} levels")));
    }
    p.advance();
    loop {
        match p.peek_kind() {
            TokenKind::RBracket => {
                p.advance();
                return Ok(());
            }
            TokenKind::Name => parse_node(p, schema, node)?,
            TokenKind::LBracket => return Err(p.unexpected(TokenKind::Name)),
            TokenKind::Eof => return Err(p.unexpected(TokenKind::RBracket)),
        }
    }
}
