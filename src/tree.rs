//! Pure transformations on goal trees
//!
//! Every mutation of a goal tree goes through [`rewrite`]: a single
//! predicate + transform walk that returns a new tree and leaves the input
//! untouched. Lookups here never allocate beyond the returned values.

use std::collections::HashSet;

use crate::model::Node;

// =============================================================================
// Rewrite - the one tree walk behind add/delete/edit/toggle
// =============================================================================

/// Rebuild `node`, replacing every node matching `matches` with the result of
/// `apply`. Returning `None` from `apply` removes that node and its subtree.
/// Matched nodes are not descended into.
///
/// Returns `None` only when the root itself matched and was removed.
pub fn rewrite<P, F>(node: &Node, matches: &P, apply: &F) -> Option<Node>
where
    P: Fn(&Node) -> bool,
    F: Fn(&Node) -> Option<Node>,
{
    if matches(node) {
        return apply(node);
    }
    let children = node
        .children
        .iter()
        .filter_map(|child| rewrite(child, matches, apply))
        .collect();
    Some(with_children(node, children))
}

/// Rewrite the single node with `id`
pub fn rewrite_id<F>(node: &Node, id: &str, apply: F) -> Option<Node>
where
    F: Fn(&Node) -> Option<Node>,
{
    rewrite(node, &|n: &Node| n.id == id, &apply)
}

/// Copy of `node`'s own fields with a new child list
pub fn with_children(node: &Node, children: Vec<Node>) -> Node {
    Node {
        id: node.id.clone(),
        title: node.title.clone(),
        description: node.description.clone(),
        children,
        done: node.done,
    }
}

// =============================================================================
// Lookup
// =============================================================================

/// Find the node with `id` anywhere in the tree
pub fn find<'a>(node: &'a Node, id: &str) -> Option<&'a Node> {
    if node.id == id {
        return Some(node);
    }
    node.children.iter().find_map(|c| find(c, id))
}

/// Find the parent of the node with `id`
pub fn find_parent<'a>(node: &'a Node, id: &str) -> Option<&'a Node> {
    if node.children.iter().any(|c| c.id == id) {
        return Some(node);
    }
    node.children.iter().find_map(|c| find_parent(c, id))
}

/// All ids in the subtree rooted at `node`, including its own
pub fn collect_ids(node: &Node) -> HashSet<String> {
    let mut ids = HashSet::new();
    collect_into(node, &mut ids);
    ids
}

fn collect_into(node: &Node, ids: &mut HashSet<String>) {
    ids.insert(node.id.clone());
    for child in &node.children {
        collect_into(child, ids);
    }
}

/// Number of nodes in the subtree, including the root
pub fn count(node: &Node) -> usize {
    1 + node.children.iter().map(count).sum::<usize>()
}

/// Whether every descendant (not the node itself) is done
pub fn all_descendants_done(node: &Node) -> bool {
    node.children
        .iter()
        .all(|c| c.done && all_descendants_done(c))
}

/// (done, total) over all descendants of `node`
pub fn done_counts(node: &Node) -> (usize, usize) {
    node.children.iter().fold((0, 0), |(done, total), child| {
        let (d, t) = done_counts(child);
        (done + d + usize::from(child.done), total + t + 1)
    })
}
