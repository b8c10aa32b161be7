//! The fixed structural predicate library (§4.7).
//!
//! Every predicate here is decidable purely from the tree's shape: no
//! oracle call, no uncertainty, never `Undef`. Most need only [`Path`]
//! ordering — `Path`'s derived `Ord` already walks parent-before-child,
//! sibling-by-index, which is exactly pre-order document order, so
//! `before`/`after` fall out of a plain comparison instead of a bespoke
//! traversal. `level` is the one exception: comparing nesting depth with
//! respect to a given nonterminal needs the node labels along the ancestor
//! chain, which only the tree itself carries.

use crate::tree::{Path, Tree};

/// A resolved structural-predicate argument: a tree position, a plain
/// integer (`nth`'s leading argument), or a plain string (`level`'s
/// comparison-kind and nonterminal-type arguments).
#[derive(Debug, Clone, Copy)]
pub enum Arg<'a> {
    Path(&'a Path),
    Int(i64),
    Str(&'a str),
}

impl<'a> Arg<'a> {
    fn path(&self) -> Option<&'a Path> {
        match self {
            Arg::Path(p) => Some(p),
            Arg::Int(_) | Arg::Str(_) => None,
        }
    }

    fn int(&self) -> Option<i64> {
        match self {
            Arg::Int(n) => Some(*n),
            Arg::Path(_) | Arg::Str(_) => None,
        }
    }

    fn str(&self) -> Option<&'a str> {
        match self {
            Arg::Str(s) => Some(s),
            Arg::Path(_) | Arg::Int(_) => None,
        }
    }
}

/// Evaluate a structural predicate call whose arguments have already been
/// resolved to tree positions (§4.7). `name` is assumed valid and arity
/// already checked at parse time (`parser::STRUCTURAL_PREDICATES`). `tree`
/// is only consulted by `level`; every other predicate ignores it.
pub fn evaluate_structural(name: &str, args: &[Arg], tree: &Tree) -> bool {
    match name {
        "before" => args[0].path().unwrap() < args[1].path().unwrap(),
        "after" => args[0].path().unwrap() > args[1].path().unwrap(),
        "same_position" => args[0].path().unwrap() == args[1].path().unwrap(),
        "different_position" => args[0].path().unwrap() != args[1].path().unwrap(),
        "direct_child" => args[0].path().unwrap().parent().as_ref() == Some(args[1].path().unwrap()),
        "inside" => {
            let (elem, container) = (args[0].path().unwrap(), args[1].path().unwrap());
            elem == container || container.is_prefix_of(elem)
        }
        "nth" => {
            let k = args[0].int().unwrap();
            let elem = args[1].path().unwrap();
            let container = args[2].path().unwrap();
            k > 0 && container.child((k - 1) as usize) == *elem
        }
        "level" => {
            let kind = args[0].str().unwrap();
            let nonterminal = args[1].str().unwrap();
            let elem = args[2].path().unwrap();
            let reference = args[3].path().unwrap();
            let de = nesting_depth(tree, elem, nonterminal);
            let dr = nesting_depth(tree, reference, nonterminal);
            match kind {
                "EQ" => de == dr,
                "LE" => de <= dr,
                "GE" => de >= dr,
                "LT" => de < dr,
                "GT" => de > dr,
                _ => false,
            }
        }
        _ => unreachable!("unknown structural predicate {} reached the evaluator", name),
    }
}

/// How many strict ancestors of `path` are labelled `nonterminal` — the
/// node's nesting depth with respect to that nonterminal, used to compare
/// how deeply two positions sit inside recursive grammar rules (§4.7).
fn nesting_depth(tree: &Tree, path: &Path, nonterminal: &str) -> usize {
    let mut count = 0;
    let mut current = path.parent();
    while let Some(ancestor) = current {
        if let Some(node) = tree.at(&ancestor) {
            if tree.label(node).as_nonterminal() == Some(nonterminal) {
                count += 1;
            }
        }
        current = ancestor.parent();
    }
    count
}

#[cfg(test)]
mod __tests__ {
    use super::*;
    use crate::tree::TreeBuilder;

    /// A tree for `1 + (2 + 3)`: an `<expr>` nested two deep on its right
    /// branch, one deep on its left — enough shape for `level`'s nesting
    /// comparisons, irrelevant to every other predicate under test here.
    fn nested_expr_tree() -> Tree {
        let mut b = TreeBuilder::new();
        let one = b.terminal("1");
        let left = b.inner("expr", vec![one]);
        let plus1 = b.terminal(" + ");
        let two = b.terminal("2");
        let two_expr = b.inner("expr", vec![two]);
        let plus2 = b.terminal(" + ");
        let three = b.terminal("3");
        let three_expr = b.inner("expr", vec![three]);
        let inner_sum = b.inner("expr", vec![two_expr, plus2, three_expr]);
        b.inner("expr", vec![left, plus1, inner_sum]);
        b.finish()
    }

    #[test]
    fn before_follows_document_order() {
        let tree = nested_expr_tree();
        let root = Path::root();
        let first = root.child(0);
        let second = root.child(1);
        assert!(evaluate_structural("before", &[Arg::Path(&first), Arg::Path(&second)], &tree));
        assert!(!evaluate_structural("before", &[Arg::Path(&second), Arg::Path(&first)], &tree));
    }

    #[test]
    fn before_orders_parent_ahead_of_its_own_descendant() {
        let tree = nested_expr_tree();
        let parent = Path::root().child(0);
        let child = parent.child(0);
        assert!(evaluate_structural("before", &[Arg::Path(&parent), Arg::Path(&child)], &tree));
    }

    #[test]
    fn direct_child_checks_exact_parent() {
        let tree = nested_expr_tree();
        let parent = Path::root().child(0);
        let child = parent.child(2);
        assert!(evaluate_structural("direct_child", &[Arg::Path(&child), Arg::Path(&parent)], &tree));
        assert!(!evaluate_structural("direct_child", &[Arg::Path(&parent), Arg::Path(&child)], &tree));
    }

    #[test]
    fn inside_includes_self_and_all_descendants() {
        let tree = nested_expr_tree();
        let container = Path::root().child(0);
        let deep = container.child(1).child(2);
        assert!(evaluate_structural("inside", &[Arg::Path(&container), Arg::Path(&container)], &tree));
        assert!(evaluate_structural("inside", &[Arg::Path(&deep), Arg::Path(&container)], &tree));
        assert!(!evaluate_structural("inside", &[Arg::Path(&container), Arg::Path(&deep)], &tree));
    }

    #[test]
    fn nth_checks_one_indexed_position() {
        let tree = nested_expr_tree();
        let container = Path::root();
        let second_child = container.child(1);
        assert!(evaluate_structural(
            "nth",
            &[Arg::Int(2), Arg::Path(&second_child), Arg::Path(&container)],
            &tree
        ));
        assert!(!evaluate_structural(
            "nth",
            &[Arg::Int(1), Arg::Path(&second_child), Arg::Path(&container)],
            &tree
        ));
    }

    #[test]
    fn level_compares_nesting_depth_with_respect_to_a_nonterminal() {
        let tree = nested_expr_tree();
        // root = expr(0); left child "1" sits one <expr> deep; "3" sits
        // inside two nested <expr>s (the inner sum, then the outer root).
        let shallow = Path::root().child(0); // left `expr` wrapping "1"
        let deep = Path::root().child(2).child(2); // `expr` wrapping "3"
        assert!(evaluate_structural(
            "level",
            &[Arg::Str("LT"), Arg::Str("expr"), Arg::Path(&shallow), Arg::Path(&deep)],
            &tree
        ));
        assert!(!evaluate_structural(
            "level",
            &[Arg::Str("GE"), Arg::Str("expr"), Arg::Path(&shallow), Arg::Path(&deep)],
            &tree
        ));
        assert!(evaluate_structural(
            "level",
            &[Arg::Str("EQ"), Arg::Str("expr"), Arg::Path(&shallow), Arg::Path(&shallow)],
            &tree
        ));
    }
}
