//! Parser for list-valued opam fields (`depends`, `depopts`, `substs`, `build`, `install`).
//!
//! Tokens from [`crate::lexer`] are folded into a small tree with an explicit
//! stack, then read back either as a flat list of quoted names or as a list of
//! commands. Both shapes come out as a [`StructuredList`].

use crate::lexer::{tokenize, Token, TokenKind};
use crate::SchemaError;
use serde::{Deserialize, Serialize};

/// One element of a parsed list field.
///
/// For dependency lists `token` is the package name and `qualifier` the
/// version constraint. For command lists `token` is the command text and
/// `qualifier` the build filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntry {
    pub token: String,
    pub qualifier: String,
}

impl ListEntry {
    pub fn new(token: impl Into<String>, qualifier: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            qualifier: qualifier.into(),
        }
    }
}

pub type StructuredList = Vec<ListEntry>;

#[derive(Debug)]
enum NodeKind<'a> {
    Atom(Token<'a>),
    List(Vec<Node<'a>>),
    Braced(&'a str),
    Group(Vec<Node<'a>>),
}

#[derive(Debug)]
struct Node<'a> {
    kind: NodeKind<'a>,
    raw: &'a str,
}

fn closing_for(open: TokenKind) -> TokenKind {
    match open {
        TokenKind::LBracket => TokenKind::RBracket,
        TokenKind::LBrace => TokenKind::RBrace,
        _ => TokenKind::RParen,
    }
}

fn parse_nodes(src: &str) -> Result<Vec<Node<'_>>, SchemaError> {
    // Each frame: opening token and the children collected so far.
    let mut stack: Vec<(Token<'_>, Vec<Node<'_>>)> = Vec::new();
    let mut top: Vec<Node<'_>> = Vec::new();

    for token in tokenize(src)? {
        match token.kind {
            TokenKind::LBracket | TokenKind::LBrace | TokenKind::LParen => {
                stack.push((token, Vec::new()));
            }
            TokenKind::RBracket | TokenKind::RBrace | TokenKind::RParen => {
                let Some((open, children)) = stack.pop() else {
                    return Err(SchemaError::MalformedField(format!(
                        "unbalanced '{}' at offset {}",
                        token.text, token.start
                    )));
                };
                if closing_for(open.kind) != token.kind {
                    return Err(SchemaError::MalformedField(format!(
                        "'{}' at offset {} closes '{}' from offset {}",
                        token.text, token.start, open.text, open.start
                    )));
                }
                let raw = &src[open.start..token.end];
                let kind = match open.kind {
                    TokenKind::LBracket => NodeKind::List(children),
                    TokenKind::LBrace => NodeKind::Braced(src[open.end..token.start].trim()),
                    _ => NodeKind::Group(children),
                };
                let node = Node { kind, raw };
                match stack.last_mut() {
                    Some((_, parent)) => parent.push(node),
                    None => top.push(node),
                }
            }
            TokenKind::Str | TokenKind::Word => {
                let node = Node {
                    kind: NodeKind::Atom(token),
                    raw: token.text,
                };
                match stack.last_mut() {
                    Some((_, parent)) => parent.push(node),
                    None => top.push(node),
                }
            }
        }
    }

    if let Some((open, _)) = stack.last() {
        return Err(SchemaError::MalformedField(format!(
            "unclosed '{}' at offset {}",
            open.text, open.start
        )));
    }
    Ok(top)
}

/// Drop one pair of enclosing brackets, if the whole value is a single list.
fn unwrap_outer(mut nodes: Vec<Node<'_>>) -> Vec<Node<'_>> {
    if nodes.len() == 1 && matches!(nodes[0].kind, NodeKind::List(_)) {
        if let Some(Node {
            kind: NodeKind::List(items),
            ..
        }) = nodes.pop()
        {
            return items;
        }
    }
    nodes
}

fn join_raw(nodes: &[Node<'_>]) -> String {
    nodes.iter().map(|n| n.raw).collect::<Vec<_>>().join(" ")
}

/// Parse a flat list of quoted names with optional `{...}` qualifiers.
///
/// Grouping parentheses and the operators between entries are skipped, so
/// `("a" | "b")` yields both names.
pub fn parse_flat_list(text: &str) -> Result<StructuredList, SchemaError> {
    let nodes = unwrap_outer(parse_nodes(text)?);
    let mut out = Vec::new();
    collect_flat(&nodes, &mut out)?;
    Ok(out)
}

fn collect_flat(nodes: &[Node<'_>], out: &mut StructuredList) -> Result<(), SchemaError> {
    // Index of the entry a following brace group would qualify.
    let mut pending: Option<usize> = None;
    for node in nodes {
        match &node.kind {
            NodeKind::Atom(token) if token.kind == TokenKind::Str => {
                out.push(ListEntry::new(token.contents(), ""));
                pending = Some(out.len() - 1);
            }
            NodeKind::Braced(inner) => {
                if let Some(idx) = pending.take() {
                    out[idx].qualifier = (*inner).to_owned();
                }
            }
            NodeKind::Group(children) => {
                collect_flat(children, out)?;
                pending = None;
            }
            NodeKind::List(_) => {
                return Err(SchemaError::MalformedField(format!(
                    "unexpected nested list '{}'",
                    node.raw
                )));
            }
            NodeKind::Atom(_) => pending = None,
        }
    }
    Ok(())
}

/// Parse a command list such as `build` or `install`.
///
/// `[["./configure" "--prefix" prefix] ["make"] {ocaml-native}]` yields one
/// entry per command, each carrying its trailing filter. A value with no
/// inner lists (`["make" "install"]`) is a single command.
pub fn parse_command_list(text: &str) -> Result<StructuredList, SchemaError> {
    let items = unwrap_outer(parse_nodes(text)?);
    if items.is_empty() {
        return Ok(Vec::new());
    }

    if !items.iter().any(|n| matches!(n.kind, NodeKind::List(_))) {
        return Ok(vec![ListEntry::new(join_raw(&items), "")]);
    }

    let mut out: StructuredList = Vec::new();
    let mut can_filter = false;
    for node in &items {
        match &node.kind {
            NodeKind::List(words) => {
                if let Some(nested) = words.iter().find(|w| matches!(w.kind, NodeKind::List(_))) {
                    return Err(SchemaError::MalformedField(format!(
                        "command nested too deeply: '{}'",
                        nested.raw
                    )));
                }
                out.push(ListEntry::new(join_raw(words), ""));
                can_filter = true;
            }
            NodeKind::Braced(inner) if can_filter => {
                if let Some(last) = out.last_mut() {
                    last.qualifier = (*inner).to_owned();
                }
                can_filter = false;
            }
            _ => {
                return Err(SchemaError::MalformedField(format!(
                    "'{}' is mixed with bracketed commands",
                    node.raw
                )));
            }
        }
    }
    Ok(out)
}

/// One word of a build command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandWord {
    /// A quoted literal, quotes removed.
    Quoted(String),
    /// A bare word, possibly a built-in variable name.
    Bare(String),
}

/// Split a command token into words.
///
/// Per-argument `{...}` filters are dropped.
pub fn command_words(command: &str) -> Result<Vec<CommandWord>, SchemaError> {
    let nodes = parse_nodes(command)?;
    Ok(nodes
        .iter()
        .filter_map(|node| match &node.kind {
            NodeKind::Atom(token) if token.kind == TokenKind::Str => {
                Some(CommandWord::Quoted(token.contents().to_owned()))
            }
            NodeKind::Atom(_) | NodeKind::List(_) | NodeKind::Group(_) => {
                Some(CommandWord::Bare(node.raw.to_owned()))
            }
            NodeKind::Braced(_) => None,
        })
        .collect())
}
