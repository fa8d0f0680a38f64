//! # Schema
//!
//! A rooted, ordered tree of [`TypeTag`]s declaring which kinds of node may
//! appear where in a container. A path is valid for a tag when the tags
//! persisted along the path spell out the chain of ancestors the schema
//! declares for that tag.
//!
//! Nodes live in an arena owned by the schema and are addressed by
//! [`NodeRef`] handles; the tree is built with [`Schema::append_child`] and
//! used read-only afterwards.
//!
//! ## Text form
//!
//! Depth-first pre-order, whitespace-separated tag names, with `[` opening
//! the child scope of the preceding name and `]` closing it:
//!
//! ```text
//! Base [ ProjectGroup [ MoleculeGroup ] Molecule [ Calculation Geometry [ State ] ] ]
//! ```
//!
//! ```rust
//! use qcstore::{Schema, TypeTag};
//!
//! let mut schema = Schema::new(TypeTag::Base);
//! let molecule = schema.append_child(schema.root(), TypeTag::Molecule);
//! schema.append_child(molecule, TypeTag::Geometry);
//!
//! let text = schema.serialize();
//! assert_eq!(text, "Base [ Molecule [ Geometry ] ]");
//! assert_eq!(Schema::deserialize(&text).unwrap(), schema);
//! ```

mod lexer;
mod parser;

use std::collections::VecDeque;
use std::fmt;

use crate::model::TypeTag;
use crate::path;
use crate::Result;

/// Deepest ply the text form may nest to.
pub const MAX_DEPTH: usize = 256;

/// Handle to a node of one [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef(usize);

#[derive(Debug, Clone)]
struct SchemaNode {
    tag: TypeTag,
    parent: Option<NodeRef>,
    children: Vec<NodeRef>,
    ply: usize,
}

/// Multiway tree of type tags.
#[derive(Debug, Clone)]
pub struct Schema {
    nodes: Vec<SchemaNode>,
}

impl Schema {
    /// A schema holding only its root.
    pub fn new(root: TypeTag) -> Self {
        Self {
            nodes: vec![SchemaNode { tag: root, parent: None, children: Vec::new(), ply: 0 }],
        }
    }

    pub fn root(&self) -> NodeRef {
        NodeRef(0)
    }

    /// Add a leaf under `parent` and return it.
    ///
    /// # Panics
    ///
    /// If `parent` does not belong to this schema.
    pub fn append_child(&mut self, parent: NodeRef, tag: TypeTag) -> NodeRef {
        let ply = self.node(parent).ply + 1;
        let child = NodeRef(self.nodes.len());
        self.nodes.push(SchemaNode { tag, parent: Some(parent), children: Vec::new(), ply });
        self.nodes[parent.0].children.push(child);
        child
    }

    fn node(&self, node: NodeRef) -> &SchemaNode {
        match self.nodes.get(node.0) {
            Some(n) => n,
            None => panic!("{node:?} does not belong to this schema ({} nodes)", self.nodes.len()),
        }
    }

    pub fn tag(&self, node: NodeRef) -> TypeTag {
        self.node(node).tag
    }

    pub fn children(&self, node: NodeRef) -> &[NodeRef] {
        &self.node(node).children
    }

    pub fn parent(&self, node: NodeRef) -> Option<NodeRef> {
        self.node(node).parent
    }

    /// Edges between `node` and the root.
    pub fn ply(&self, node: NodeRef) -> usize {
        self.node(node).ply
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: a schema has at least its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    /// Directory depth of a store path; see [`crate::path::depth`].
    pub fn path_depth(path: &str) -> usize {
        path::depth(path)
    }

    /// First node carrying `tag`, breadth-first from the root.
    pub fn find(&self, tag: TypeTag) -> Option<NodeRef> {
        let mut queue = VecDeque::from([self.root()]);
        while let Some(node) = queue.pop_front() {
            if self.tag(node) == tag {
                return Some(node);
            }
            queue.extend(self.children(node).iter().copied());
        }
        None
    }

    /// Ply of the first breadth-first node carrying `tag`.
    ///
    /// A tag declared at several positions only reports the shallowest one.
    pub fn type_depth(&self, tag: TypeTag) -> Option<usize> {
        self.find(tag).map(|node| self.ply(node))
    }

    /// Tags from the root down to the first breadth-first node carrying
    /// `tag`, both ends included. Empty when `tag` does not occur.
    pub fn chain_for(&self, tag: TypeTag) -> Vec<TypeTag> {
        let mut chain = Vec::new();
        let mut cursor = self.find(tag);
        while let Some(node) = cursor {
            chain.push(self.tag(node));
            cursor = self.parent(node);
        }
        chain.reverse();
        chain
    }

    /// Whether a node tagged `tag` may be placed directly under `path`.
    ///
    /// The schema root stands for the container root, so the chain for `tag`
    /// minus its root must have one entry per component of `path` plus one
    /// for the node being placed. Each prefix of `path` must carry, according
    /// to `lookup`, the tag at the same position of the chain.
    pub fn is_path_valid<F>(&self, path: &str, tag: TypeTag, lookup: F) -> bool
    where
        F: Fn(&str) -> TypeTag,
    {
        let tokens = path::tokens(path);
        let chain = self.chain_for(tag);
        let Some((_, ancestors)) = chain.split_first() else {
            tracing::debug!(%tag, "tag does not occur in the schema");
            return false;
        };
        if ancestors.len() != tokens.len() + 1 {
            tracing::debug!(path, %tag, chain = ancestors.len(), components = tokens.len(), "path depth does not match schema");
            return false;
        }

        let mut prefix = String::new();
        for (token, expected) in tokens.iter().zip(ancestors) {
            prefix.push(path::SEPARATOR);
            prefix.push_str(token);
            let found = lookup(&prefix);
            if found != *expected {
                tracing::debug!(path = prefix.as_str(), %expected, %found, "path component has the wrong tag");
                return false;
            }
        }
        true
    }

    // ========================================================================
    // Text form
    // ========================================================================

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        self.write_text(self.root(), &mut out);
        out
    }

    fn write_text(&self, node: NodeRef, out: &mut String) {
        enum Step {
            Node(NodeRef),
            Close,
        }

        let mut stack = vec![Step::Node(node)];
        let mut first = true;
        while let Some(step) = stack.pop() {
            match step {
                Step::Close => out.push_str(" ]"),
                Step::Node(node) => {
                    if !first {
                        out.push(' ');
                    }
                    first = false;
                    out.push_str(self.tag(node).name());
                    let children = self.children(node);
                    if !children.is_empty() {
                        out.push_str(" [");
                        stack.push(Step::Close);
                        stack.extend(children.iter().rev().map(|&child| Step::Node(child)));
                    }
                }
            }
        }
    }

    /// Parse the text form. An outer `[ ... ]` around the whole tree is
    /// accepted, and names after the root that sit outside any bracket become
    /// children of the root. Nesting deeper than [`MAX_DEPTH`] plies is a
    /// syntax error.
    pub fn deserialize(text: &str) -> Result<Self> {
        let tokens = lexer::tokenize(text);
        parser::parse_schema(&tokens)
    }

    fn subtree_eq(&self, a: NodeRef, other: &Schema, b: NodeRef) -> bool {
        let mut stack = vec![(a, b)];
        while let Some((a, b)) = stack.pop() {
            let (left, right) = (self.children(a), other.children(b));
            if self.tag(a) != other.tag(b) || left.len() != right.len() {
                return false;
            }
            stack.extend(left.iter().copied().zip(right.iter().copied()));
        }
        true
    }

    fn write_tree(&self, node: NodeRef, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut stack = vec![node];
        while let Some(node) = stack.pop() {
            writeln!(f, "{:indent$}{}", "", self.tag(node), indent = 3 * self.ply(node))?;
            stack.extend(self.children(node).iter().rev().copied());
        }
        Ok(())
    }
}

/// Structural: same tags in the same shape.
impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.subtree_eq(self.root(), other, other.root())
    }
}

impl Eq for Schema {}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_tree(self.root(), f)
    }
}
