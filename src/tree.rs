//! Derivation trees (§3, §4.2, Design Notes §9).
//!
//! Trees are arena-backed: every node lives in one contiguous `Vec<Node>`
//! and children are referenced by index (`NodeId`), never by pointer. This
//! avoids a recursive ownership graph and makes `descendants_of_type` a
//! linear scan, per the teacher's index-based arena pattern for other
//! structurally-shared trees in the reference corpus.

use std::fmt::{Display, Formatter};

/// Index of a node within a [`Tree`]'s arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

/// A node's label: a nonterminal name (no angle brackets) or a terminal
/// literal string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Label {
    Nonterminal(String),
    Terminal(String),
}

impl Label {
    pub fn as_nonterminal(&self) -> Option<&str> {
        match self {
            Label::Nonterminal(name) => Some(name),
            Label::Terminal(_) => None,
        }
    }

    pub fn as_terminal(&self) -> Option<&str> {
        match self {
            Label::Terminal(s) => Some(s),
            Label::Nonterminal(_) => None,
        }
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Nonterminal(n) => write!(f, "<{}>", n),
            Label::Terminal(s) => write!(f, "{:?}", s),
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    label: Label,
    children: Option<Vec<NodeId>>,
}

/// A stable, lexicographically ordered address of a node: the sequence of
/// child indices from the root (§3). `Path(vec![])` is the root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Path(pub Vec<usize>);

impl Path {
    pub fn root() -> Self {
        Path(Vec::new())
    }

    pub fn child(&self, index: usize) -> Path {
        let mut steps = self.0.clone();
        steps.push(index);
        Path(steps)
    }

    /// Whether `self` is a strict prefix of `other` — i.e. `other` denotes a
    /// node inside the subtree rooted at `self`.
    pub fn is_prefix_of(&self, other: &Path) -> bool {
        self.0.len() < other.0.len() && other.0[..self.0.len()] == self.0[..]
    }

    pub fn parent(&self) -> Option<Path> {
        if self.0.is_empty() {
            None
        } else {
            Some(Path(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

/// An immutable, arena-backed derivation tree (§3).
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Tree {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn label(&self, id: NodeId) -> &Label {
        &self.nodes[id.0 as usize].label
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes[id.0 as usize].children.as_deref().unwrap_or(&[])
    }

    /// A node is *open* if its label is a nonterminal and it has no
    /// children recorded (§3).
    pub fn is_open(&self, id: NodeId) -> bool {
        let node = &self.nodes[id.0 as usize];
        matches!(node.label, Label::Nonterminal(_)) && node.children.is_none()
    }

    /// A node is *terminal* if its label is a literal (§3).
    pub fn is_terminal_node(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0 as usize].label, Label::Terminal(_))
    }

    /// Whether every leaf in the whole tree is terminal (§3).
    pub fn is_closed(&self) -> bool {
        self.is_closed_at(self.root)
    }

    fn is_closed_at(&self, id: NodeId) -> bool {
        let node = &self.nodes[id.0 as usize];
        match &node.children {
            None => matches!(node.label, Label::Terminal(_)),
            Some(children) => children.iter().all(|c| self.is_closed_at(*c)),
        }
    }

    /// Concatenation of terminal labels in left-to-right depth-first order.
    pub fn yield_str(&self) -> String {
        let mut out = String::new();
        self.yield_into(self.root, &mut out);
        out
    }

    fn yield_into(&self, id: NodeId, out: &mut String) {
        let node = &self.nodes[id.0 as usize];
        match &node.children {
            None => {
                if let Label::Terminal(s) = &node.label {
                    out.push_str(s);
                }
            }
            Some(children) => {
                for c in children {
                    self.yield_into(*c, out);
                }
            }
        }
    }

    /// Every `(path, node)` pair in pre-order.
    pub fn paths(&self) -> Vec<(Path, NodeId)> {
        let mut out = Vec::new();
        self.paths_from(self.root, Path::root(), &mut out);
        out
    }

    fn paths_from(&self, id: NodeId, path: Path, out: &mut Vec<(Path, NodeId)>) {
        out.push((path.clone(), id));
        for (i, child) in self.children(id).iter().enumerate() {
            self.paths_from(*child, path.child(i), out);
        }
    }

    /// The node at `path`, if it exists.
    pub fn at(&self, path: &Path) -> Option<NodeId> {
        let mut current = self.root;
        for &index in &path.0 {
            current = *self.children(current).get(index)?;
        }
        Some(current)
    }

    /// The path of `id`, computed by a pre-order search (arena trees carry
    /// no parent pointers, so this is O(n); fine at the sizes this core
    /// targets — see §1 Non-goals on large-corpus storage).
    pub fn path_of(&self, id: NodeId) -> Option<Path> {
        self.paths().into_iter().find(|(_, n)| *n == id).map(|(p, _)| p)
    }

    /// All nodes whose label is the nonterminal `nt`, in pre-order.
    pub fn descendants_of_type(&self, nt: &str) -> Vec<(Path, NodeId)> {
        self.paths()
            .into_iter()
            .filter(|(_, id)| self.label(*id).as_nonterminal() == Some(nt))
            .collect()
    }

    /// The subtree rooted at `path` as a standalone `Tree`.
    pub fn subtree(&self, path: &Path) -> Option<Tree> {
        let id = self.at(path)?;
        let mut builder = TreeBuilder::new();
        builder.copy_from(self, id);
        Some(builder.finish())
    }
}

impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        fn rec(a: &Tree, b: &Tree, na: NodeId, nb: NodeId) -> bool {
            if a.label(na) != b.label(nb) {
                return false;
            }
            let ca = a.children(na);
            let cb = b.children(nb);
            ca.len() == cb.len() && ca.iter().zip(cb).all(|(x, y)| rec(a, b, *x, *y))
        }
        rec(self, other, self.root, other.root)
    }
}
impl Eq for Tree {}

/// Assembles a [`Tree`] by hand, inserting nodes bottom-up.
///
/// Generating trees *from a grammar and a string* is the solver's job and
/// explicitly out of scope (§1); this builder only gives the evaluator and
/// its tests a way to construct concrete trees to check formulas against.
pub struct TreeBuilder {
    nodes: Vec<Node>,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    fn push(&mut self, label: Label, children: Option<Vec<NodeId>>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { label, children });
        id
    }

    pub fn terminal(&mut self, literal: impl Into<String>) -> NodeId {
        self.push(Label::Terminal(literal.into()), None)
    }

    pub fn open(&mut self, nonterminal: impl Into<String>) -> NodeId {
        self.push(Label::Nonterminal(nonterminal.into()), None)
    }

    pub fn inner(&mut self, nonterminal: impl Into<String>, children: Vec<NodeId>) -> NodeId {
        self.push(Label::Nonterminal(nonterminal.into()), Some(children))
    }

    fn copy_from(&mut self, source: &Tree, id: NodeId) -> NodeId {
        let label = source.label(id).clone();
        let children = source.nodes[id.0 as usize].children.as_ref().map(|kids| {
            kids.iter().map(|k| self.copy_from(source, *k)).collect()
        });
        self.push(label, children)
    }

    pub fn finish_at(self, root: NodeId) -> Tree {
        Tree { nodes: self.nodes, root }
    }

    /// Finish using the most recently pushed node as the root — convenient
    /// when the builder was used bottom-up and the last call built the root.
    pub fn finish(mut self) -> Tree {
        let root = NodeId(self.nodes.len() as u32 - 1);
        let nodes = std::mem::take(&mut self.nodes);
        Tree { nodes, root }
    }
}

#[cfg(test)]
mod __tests__ {
    use super::*;

    fn self_assignment_tree() -> Tree {
        // "a := a"
        let mut b = TreeBuilder::new();
        let lhs_a = b.terminal("a");
        let lhs = b.inner("var", vec![lhs_a]);
        let sep = b.terminal(" := ");
        let rhs_a = b.terminal("a");
        let rhs_var = b.inner("var", vec![rhs_a]);
        let rhs = b.inner("rhs", vec![rhs_var]);
        let assgn = b.inner("assgn", vec![lhs, sep, rhs]);
        b.inner("start", vec![assgn]);
        b.finish()
    }

    #[test]
    fn yields_concatenated_terminals() {
        let t = self_assignment_tree();
        assert_eq!(t.yield_str(), "a := a");
    }

    #[test]
    fn closed_tree_has_only_terminal_leaves() {
        let t = self_assignment_tree();
        assert!(t.is_closed());
    }

    #[test]
    fn open_tree_is_not_closed() {
        let mut b = TreeBuilder::new();
        b.open("assgn");
        let t = b.finish();
        assert!(!t.is_closed());
        assert!(t.is_open(t.root()));
    }

    #[test]
    fn paths_are_preorder_and_lexicographic() {
        let t = self_assignment_tree();
        let paths: Vec<Path> = t.paths().into_iter().map(|(p, _)| p).collect();
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);
    }

    #[test]
    fn descendants_of_type_finds_both_vars() {
        let t = self_assignment_tree();
        let vars = t.descendants_of_type("var");
        assert_eq!(vars.len(), 2);
    }

    #[test]
    fn prefix_relation() {
        let root = Path::root();
        let child = root.child(0);
        assert!(root.is_prefix_of(&child));
        assert!(!child.is_prefix_of(&root));
        assert!(!child.is_prefix_of(&child));
    }

    #[test]
    fn subtree_extracts_independent_tree() {
        let t = self_assignment_tree();
        let (path, _) = t.descendants_of_type("var").remove(0);
        let sub = t.subtree(&path).unwrap();
        assert_eq!(sub.yield_str(), "a");
    }
}
