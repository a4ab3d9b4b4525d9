//! Tree layout
//!
//! Two passes over the view tree:
//! - `measure` computes the footprint of every subtree bottom-up
//! - `place` hands each child a share of its parent's width, left to right
//!
//! Each subtree stays inside the horizontal share it was given, so sibling
//! subtrees never overlap. Minimized children do not take part in the width
//! sum; they sit in a lane of fixed-width slots right under their parent.
//!
//! Output depends only on the view tree, the config, and the available width.

use std::collections::HashMap;

use super::project::ViewNode;
use crate::config::LayoutConfig;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle, `x`/`y` at the top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }
}

/// Footprint of a subtree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubtreeSize {
    pub width: f64,
    pub height: f64,
    /// Nodes laid out below this one, stubs included
    pub node_count: usize,
}

/// Where one node ended up
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub id: String,
    pub parent: Option<String>,
    /// Horizontal center of the node box
    pub x: f64,
    /// Top edge of the node box
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Drawn as a minimized stub
    pub stub: bool,
    /// Where this node's connector leaves the parent's bottom edge
    pub connector: Option<Point>,
    pub depth: usize,
}

impl Placement {
    pub fn rect(&self) -> Rect {
        Rect {
            x: self.x - self.width / 2.0,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }

    /// Top-center, where incoming connectors end
    pub fn top_anchor(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// All placements for one view tree, in pre-order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    placements: Vec<Placement>,
    index: HashMap<String, usize>,
}

impl Layout {
    /// Measure and place the whole tree. The root is centered in
    /// `available_width`, or in its own width when that is larger.
    pub fn compute(root: &ViewNode, cfg: &LayoutConfig, available_width: f64) -> Self {
        let size = measure(root, cfg);
        let width = available_width.max(size.width);
        place(root, width / 2.0, cfg.top_margin, width, cfg)
    }

    pub fn get(&self, id: &str) -> Option<&Placement> {
        self.index.get(id).map(|&i| &self.placements[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Placement> {
        self.placements.iter()
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    /// Bounding box over every placed node
    pub fn bounds(&self) -> Option<Rect> {
        self.placements
            .iter()
            .map(Placement::rect)
            .reduce(|a, b| a.union(&b))
    }

    /// Topmost node under a world-space point
    pub fn hit_test(&self, p: Point) -> Option<&Placement> {
        self.placements.iter().rev().find(|pl| pl.rect().contains(p))
    }

    fn push(&mut self, placement: Placement) {
        self.index
            .insert(placement.id.clone(), self.placements.len());
        self.placements.push(placement);
    }
}

// =============================================================================
// Measure
// =============================================================================

/// Footprint of the subtree rooted at `view`.
///
/// A leaf or collapsed node is one slot wide and one level tall. Otherwise
/// the width is the sum of the expanded children's widths, floored at one
/// slot per expanded child and widened to fit the minimized lane.
pub fn measure(view: &ViewNode, cfg: &LayoutConfig) -> SubtreeSize {
    let mut sizes = HashMap::new();
    measure_into(view, cfg, &mut sizes)
}

fn measure_into(
    view: &ViewNode,
    cfg: &LayoutConfig,
    sizes: &mut HashMap<String, SubtreeSize>,
) -> SubtreeSize {
    let unit = SubtreeSize {
        width: cfg.unit_node_width,
        height: cfg.level_height,
        node_count: 0,
    };

    let size = if view.collapsed || view.visible_children().next().is_none() {
        unit
    } else {
        let mut width_sum = 0.0;
        let mut max_height: f64 = 0.0;
        let mut node_count = 0;
        let mut expanded = 0usize;
        for child in view.expanded_children() {
            let s = measure_into(child, cfg, sizes);
            width_sum += s.width;
            max_height = max_height.max(s.height);
            node_count += 1 + s.node_count;
            expanded += 1;
        }
        let stubs = view.minimized_children().count();
        node_count += stubs;

        let floor = expanded as f64 * cfg.unit_node_width;
        let lane = stubs as f64 * cfg.minimized_slot_width;
        SubtreeSize {
            width: width_sum.max(floor).max(lane).max(cfg.unit_node_width),
            height: cfg.level_height + max_height,
            node_count,
        }
    };

    sizes.insert(view.id.clone(), size);
    size
}

// =============================================================================
// Place
// =============================================================================

/// Assign positions to `view` and everything displayed below it.
///
/// `view` is centered on `center_x` with its top at `top_y`. Expanded
/// children go one level down, each centered in a share of
/// `available_width` proportional to its measured width. Shares only grow:
/// when the children need more than `available_width` they keep their
/// natural widths.
pub fn place(
    view: &ViewNode,
    center_x: f64,
    top_y: f64,
    available_width: f64,
    cfg: &LayoutConfig,
) -> Layout {
    let mut sizes = HashMap::new();
    measure_into(view, cfg, &mut sizes);

    let mut layout = Layout::default();
    let root = Placement {
        id: view.id.clone(),
        parent: None,
        x: center_x,
        y: top_y,
        width: cfg.node_width,
        height: cfg.node_height,
        stub: false,
        connector: None,
        depth: 0,
    };
    layout.push(root);
    place_children(view, center_x, top_y, available_width, 0, cfg, &sizes, &mut layout);
    layout
}

fn place_children(
    view: &ViewNode,
    center_x: f64,
    top_y: f64,
    available_width: f64,
    depth: usize,
    cfg: &LayoutConfig,
    sizes: &HashMap<String, SubtreeSize>,
    layout: &mut Layout,
) {
    if view.collapsed {
        return;
    }

    let expanded: Vec<&ViewNode> = view.expanded_children().collect();
    let natural: Vec<f64> = expanded
        .iter()
        .map(|c| sizes.get(&c.id).map_or(cfg.unit_node_width, |s| s.width))
        .collect();
    let total: f64 = natural.iter().sum();
    let factor = if total > 0.0 && available_width > total {
        available_width / total
    } else {
        1.0
    };

    let bottom = top_y + cfg.node_height;
    let n = expanded.len() as f64;
    let mut left = center_x - total * factor / 2.0;
    for (i, (child, width)) in expanded.iter().zip(&natural).enumerate() {
        let share = width * factor;
        let child_x = left + share / 2.0;
        let child_y = top_y + cfg.level_height;
        // spread connector origins along the parent's bottom edge
        let anchor_x =
            center_x - cfg.node_width / 2.0 + cfg.node_width * (i as f64 + 1.0) / (n + 1.0);
        layout.push(Placement {
            id: child.id.clone(),
            parent: Some(view.id.clone()),
            x: child_x,
            y: child_y,
            width: cfg.node_width,
            height: cfg.node_height,
            stub: false,
            connector: Some(Point::new(anchor_x, bottom)),
            depth: depth + 1,
        });
        place_children(child, child_x, child_y, share, depth + 1, cfg, sizes, layout);
        left += share;
    }

    let stubs: Vec<&ViewNode> = view.minimized_children().collect();
    let lane_top = bottom + cfg.minimized_lane_gap;
    let lane_left = center_x - stubs.len() as f64 * cfg.minimized_slot_width / 2.0;
    for (j, stub) in stubs.iter().enumerate() {
        layout.push(Placement {
            id: stub.id.clone(),
            parent: Some(view.id.clone()),
            x: lane_left + cfg.minimized_slot_width * (j as f64 + 0.5),
            y: lane_top,
            width: cfg.minimized_slot_width,
            height: cfg.minimized_slot_height,
            stub: true,
            connector: Some(Point::new(center_x, bottom)),
            depth: depth + 1,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn view(id: &str, children: Vec<ViewNode>) -> ViewNode {
        ViewNode {
            id: id.to_string(),
            title: id.to_string(),
            description: String::new(),
            done: false,
            children,
            collapsed: false,
            minimized: false,
            hidden: false,
        }
    }

    /// Goal with 3 children, each with 2 children
    fn three_by_two() -> ViewNode {
        view(
            "g",
            (0..3)
                .map(|i| {
                    view(
                        &format!("c{}", i),
                        (0..2).map(|j| view(&format!("c{}-{}", i, j), vec![])).collect(),
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn test_measure_leaf_is_one_unit() {
        let cfg = LayoutConfig::default();
        let size = measure(&view("x", vec![]), &cfg);
        assert_eq!(size.width, cfg.unit_node_width);
        assert_eq!(size.height, cfg.level_height);
        assert_eq!(size.node_count, 0);
    }

    #[test]
    fn test_measure_collapsed_is_one_unit() {
        let cfg = LayoutConfig::default();
        let mut tree = three_by_two();
        tree.collapsed = true;
        let size = measure(&tree, &cfg);
        assert_eq!(size.width, cfg.unit_node_width);
        assert_eq!(size.node_count, 0);
    }

    #[test]
    fn test_three_by_two_scenario() {
        let cfg = LayoutConfig::default();
        let tree = three_by_two();
        let size = measure(&tree, &cfg);
        assert_eq!(size.node_count, 9);
        assert_eq!(size.height, cfg.level_height * 3.0);

        let layout = place(&tree, 750.0, 0.0, 1500.0, &cfg);
        let xs: Vec<f64> = ["c0", "c1", "c2"]
            .iter()
            .map(|id| layout.get(id).unwrap().x)
            .collect();
        assert!(xs[0] < xs[1] && xs[1] < xs[2]);
        assert!(((xs[1] - xs[0]) - (xs[2] - xs[1])).abs() < 1e-9);
        assert_eq!(layout.get("c0").unwrap().y, cfg.level_height);
        assert_eq!(layout.len(), 10);
    }

    #[test]
    fn test_children_scale_to_available_width() {
        let cfg = LayoutConfig::default();
        let tree = view("g", vec![view("a", vec![]), view("b", vec![])]);
        let layout = place(&tree, 500.0, 0.0, 1000.0, &cfg);
        assert_eq!(layout.get("a").unwrap().x, 250.0);
        assert_eq!(layout.get("b").unwrap().x, 750.0);
    }

    #[test]
    fn test_connector_anchors_are_spread() {
        let cfg = LayoutConfig::default();
        let layout = place(&three_by_two(), 750.0, 0.0, 1500.0, &cfg);
        let anchors: Vec<Point> = ["c0", "c1", "c2"]
            .iter()
            .map(|id| layout.get(id).unwrap().connector.unwrap())
            .collect();
        assert!(anchors[0].x < anchors[1].x && anchors[1].x < anchors[2].x);
        assert_eq!(anchors[1].x, 750.0);
        for a in &anchors {
            assert!(a.x > 750.0 - cfg.node_width / 2.0 && a.x < 750.0 + cfg.node_width / 2.0);
            assert_eq!(a.y, cfg.node_height);
        }
    }

    #[test]
    fn test_minimized_children_go_to_lane() {
        let cfg = LayoutConfig::default();
        let mut tree = three_by_two();
        tree.children[0].minimized = true;
        tree.children[2].minimized = true;

        let size = measure(&tree, &cfg);
        // c1 (2 children) + two stubs
        assert_eq!(size.node_count, 5);
        assert_eq!(size.width, 2.0 * cfg.unit_node_width);

        let layout = place(&tree, 500.0, 0.0, 500.0, &cfg);
        let stub = layout.get("c0").unwrap();
        assert!(stub.stub);
        assert_eq!(stub.y, cfg.node_height + cfg.minimized_lane_gap);
        assert!(stub.rect().bottom() < layout.get("c1").unwrap().y);
        // stub subtrees are not laid out
        assert!(layout.get("c0-0").is_none());
        assert_eq!(layout.get("c1").unwrap().x, 500.0);
    }

    #[test]
    fn test_collapsed_children_not_placed() {
        let cfg = LayoutConfig::default();
        let mut tree = three_by_two();
        tree.children[1].collapsed = true;
        let layout = Layout::compute(&tree, &cfg, 0.0);
        assert!(layout.get("c1").is_some());
        assert!(layout.get("c1-0").is_none());
        assert_eq!(layout.len(), 8);
    }

    #[test]
    fn test_hidden_children_not_placed() {
        let cfg = LayoutConfig::default();
        let mut tree = three_by_two();
        tree.children[0].hidden = true;
        let layout = Layout::compute(&tree, &cfg, 0.0);
        assert!(layout.get("c0").is_none());
        assert!(layout.get("c0-0").is_none());
        assert_eq!(measure(&tree, &cfg).node_count, 6);
    }

    #[test]
    fn test_placement_is_deterministic() {
        let cfg = LayoutConfig::default();
        let tree = three_by_two();
        assert_eq!(
            Layout::compute(&tree, &cfg, 1200.0),
            Layout::compute(&tree, &cfg, 1200.0)
        );
    }

    #[test]
    fn test_hit_test() {
        let cfg = LayoutConfig::default();
        let layout = place(&three_by_two(), 750.0, 0.0, 1500.0, &cfg);
        let c2 = layout.get("c2").unwrap().clone();
        let hit = layout.hit_test(c2.rect().center()).unwrap();
        assert_eq!(hit.id, "c2");
        assert!(layout.hit_test(Point::new(-1000.0, -1000.0)).is_none());
    }

    // =========================================================================
    // Property: sibling subtrees never overlap horizontally
    // =========================================================================

    fn arb_tree() -> impl Strategy<Value = ViewNode> {
        let leaf = (any::<bool>(), any::<bool>())
            .prop_map(|(minimized, hidden)| ViewNode {
                minimized,
                hidden,
                ..view("", vec![])
            });
        leaf.prop_recursive(4, 48, 5, |inner| {
            (
                prop::collection::vec(inner, 0..5),
                any::<bool>(),
                prop::bool::weighted(0.2),
                prop::bool::weighted(0.1),
            )
                .prop_map(|(children, minimized, collapsed, hidden)| ViewNode {
                    minimized,
                    collapsed,
                    hidden,
                    ..view("", children)
                })
        })
    }

    fn renumber(node: &mut ViewNode, next: &mut usize) {
        node.id = format!("n{}", next);
        *next += 1;
        for child in &mut node.children {
            renumber(child, next);
        }
    }

    /// Horizontal extent of everything placed in this subtree
    fn extent(node: &ViewNode, layout: &Layout) -> Option<(f64, f64)> {
        let own = layout.get(&node.id)?.rect();
        let mut span = (own.x, own.right());
        for child in &node.children {
            if let Some((lo, hi)) = extent(child, layout) {
                span = (span.0.min(lo), span.1.max(hi));
            }
        }
        Some(span)
    }

    fn assert_siblings_disjoint(node: &ViewNode, layout: &Layout) {
        if layout.get(&node.id).is_none() {
            return;
        }
        let mut spans: Vec<(f64, f64)> = node
            .expanded_children()
            .filter_map(|c| extent(c, layout))
            .collect();
        spans.sort_by(|a, b| a.0.total_cmp(&b.0));
        for pair in spans.windows(2) {
            assert!(
                pair[0].1 <= pair[1].0 + 1e-6,
                "overlap under {}: {:?}",
                node.id,
                pair
            );
        }
        for child in &node.children {
            assert_siblings_disjoint(child, layout);
        }
    }

    proptest! {
        #[test]
        fn prop_sibling_subtrees_disjoint(mut tree in arb_tree(), width in 0.0f64..4000.0) {
            let mut next = 0;
            renumber(&mut tree, &mut next);
            tree.minimized = false;
            tree.hidden = false;
            let cfg = LayoutConfig::default();
            let layout = Layout::compute(&tree, &cfg, width);
            assert_siblings_disjoint(&tree, &layout);
        }

        #[test]
        fn prop_node_count_matches_placements(mut tree in arb_tree()) {
            let mut next = 0;
            renumber(&mut tree, &mut next);
            tree.minimized = false;
            tree.hidden = false;
            let cfg = LayoutConfig::default();
            let layout = Layout::compute(&tree, &cfg, 800.0);
            prop_assert_eq!(measure(&tree, &cfg).node_count + 1, layout.len());
        }
    }
}
