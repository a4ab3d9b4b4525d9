//! View-tree projection
//!
//! The view tree mirrors one goal tree node-for-node and adds UI-only flags.
//! It is always rebuilt from the data tree; flags are carried over by id.

use std::collections::HashMap;

use crate::model::Node;

/// A node of the view tree
#[derive(Debug, Clone, PartialEq)]
pub struct ViewNode {
    pub id: String,
    pub title: String,
    pub description: String,
    pub done: bool,
    pub children: Vec<ViewNode>,
    /// Children hidden from layout
    pub collapsed: bool,
    /// Drawn as a small stub under its parent
    pub minimized: bool,
    /// Excluded by the show-completed filter
    pub hidden: bool,
}

impl ViewNode {
    /// Children that take part in layout and navigation, stubs included
    pub fn visible_children(&self) -> impl Iterator<Item = &ViewNode> {
        self.children.iter().filter(|c| !c.hidden)
    }

    /// Visible children drawn full size
    pub fn expanded_children(&self) -> impl Iterator<Item = &ViewNode> {
        self.visible_children().filter(|c| !c.minimized)
    }

    /// Visible children drawn as stubs
    pub fn minimized_children(&self) -> impl Iterator<Item = &ViewNode> {
        self.visible_children().filter(|c| c.minimized)
    }

    pub fn find(&self, id: &str) -> Option<&ViewNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut ViewNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }

    pub fn parent_of(&self, id: &str) -> Option<&ViewNode> {
        if self.children.iter().any(|c| c.id == id) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.parent_of(id))
    }

    /// Whether `id` is drawn: it and all its ancestors are visible and no
    /// ancestor is collapsed or minimized.
    pub fn is_displayed(&self, id: &str) -> bool {
        if self.id == id {
            return true;
        }
        if self.collapsed || self.minimized {
            return false;
        }
        self.visible_children().any(|c| c.is_displayed(id))
    }
}

/// Flags that survive a rebuild
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Flags {
    collapsed: bool,
    minimized: bool,
}

/// Build the view tree for a goal. With `show_completed` off, done nodes
/// below the root are marked hidden, which takes their subtrees out of
/// layout with them.
pub fn project(goal: &Node, show_completed: bool) -> ViewNode {
    project_with(goal, show_completed, &HashMap::new(), true)
}

/// Rebuild after a mutation or filter change, keeping `collapsed` and
/// `minimized` for every node that still exists.
pub fn reproject_preserving_flags(
    previous: &ViewNode,
    goal: &Node,
    show_completed: bool,
) -> ViewNode {
    let mut flags = HashMap::new();
    collect_flags(previous, &mut flags);
    project_with(goal, show_completed, &flags, true)
}

fn collect_flags(view: &ViewNode, out: &mut HashMap<String, Flags>) {
    if view.collapsed || view.minimized {
        out.insert(
            view.id.clone(),
            Flags {
                collapsed: view.collapsed,
                minimized: view.minimized,
            },
        );
    }
    for child in &view.children {
        collect_flags(child, out);
    }
}

fn project_with(
    node: &Node,
    show_completed: bool,
    flags: &HashMap<String, Flags>,
    is_root: bool,
) -> ViewNode {
    let kept = flags.get(&node.id).copied().unwrap_or_default();
    ViewNode {
        id: node.id.clone(),
        title: node.title.clone(),
        description: node.description.clone(),
        done: node.done,
        children: node
            .children
            .iter()
            .map(|c| project_with(c, show_completed, flags, false))
            .collect(),
        collapsed: kept.collapsed,
        // the root is never a stub
        minimized: kept.minimized && !is_root,
        hidden: !is_root && !show_completed && node.done,
    }
}

/// Reconstruct the data tree a view tree was projected from
pub fn to_data(view: &ViewNode) -> Node {
    Node {
        id: view.id.clone(),
        title: view.title.clone(),
        description: view.description.clone(),
        children: view.children.iter().map(to_data).collect(),
        done: view.done,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, done: bool, children: Vec<Node>) -> Node {
        Node {
            id: id.to_string(),
            title: format!("Title {}", id),
            description: format!("About {}", id),
            children,
            done,
        }
    }

    fn goal() -> Node {
        node(
            "g",
            false,
            vec![
                node("a", true, vec![node("a1", false, vec![])]),
                node("b", false, vec![node("b1", true, vec![]), node("b2", false, vec![])]),
            ],
        )
    }

    #[test]
    fn test_project_mirrors_tree() {
        let view = project(&goal(), true);
        assert_eq!(view.children.len(), 2);
        assert_eq!(view.children[1].children[1].id, "b2");
        assert!(view.children.iter().all(|c| !c.hidden && !c.collapsed && !c.minimized));
    }

    #[test]
    fn test_filter_hides_done_nodes() {
        let view = project(&goal(), false);
        let visible: Vec<&str> = view.visible_children().map(|c| c.id.as_str()).collect();
        assert_eq!(visible, vec!["b"]);
        let b = view.find("b").unwrap();
        let visible: Vec<&str> = b.visible_children().map(|c| c.id.as_str()).collect();
        assert_eq!(visible, vec!["b2"]);
        // a1 is pending but only reachable through a
        assert!(!view.is_displayed("a1"));
        assert!(view.is_displayed("b2"));
    }

    #[test]
    fn test_done_root_is_never_hidden() {
        let mut g = goal();
        g.done = true;
        assert!(!project(&g, false).hidden);
    }

    #[test]
    fn test_reproject_keeps_flags() {
        let mut view = project(&goal(), true);
        view.find_mut("b").unwrap().collapsed = true;
        view.find_mut("a").unwrap().minimized = true;

        let mut changed = goal();
        changed.children[1].children.push(node("b3", false, vec![]));
        let rebuilt = reproject_preserving_flags(&view, &changed, true);

        assert!(rebuilt.find("b").unwrap().collapsed);
        assert!(rebuilt.find("a").unwrap().minimized);
        assert!(!rebuilt.find("b3").unwrap().collapsed);
    }

    #[test]
    fn test_reproject_drops_flags_of_removed_nodes() {
        let mut view = project(&goal(), true);
        view.find_mut("a").unwrap().collapsed = true;

        let mut changed = goal();
        changed.children.remove(0);
        let rebuilt = reproject_preserving_flags(&view, &changed, true);
        assert!(rebuilt.find("a").is_none());
    }

    #[test]
    fn test_round_trip() {
        let g = goal();
        assert_eq!(to_data(&project(&g, true)), g);
    }
}
