// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core tree implementation: structure, updates, queries.

use alloc::{vec, vec::Vec};
use kurbo::{Affine, Point, Rect};

use crate::gesture::Gesture;
use crate::types::{Layout, LocalNode, NodeFlags, NodeId};
use crate::util::{about_center, transform_rect_bbox};

/// Retained-mode view tree.
///
/// Nodes live in slots addressed by generational [`NodeId`]s. Every node has
/// at most one parent; nodes without a parent are roots and are laid out
/// against the viewport passed to [`Tree::commit`].
///
/// Children are ordered back to front: the last child is drawn on top of its
/// siblings and wins hit tests against them.
///
/// Changes to layout or transforms do **not** update world-space data
/// immediately. They are applied when [`Tree::commit`] is called.
///
/// ## Example
///
/// ```rust
/// use kurbo::{Point, Rect};
/// use understory_view_tree::{FractionalRect, LocalNode, Tree};
///
/// let mut tree = Tree::new();
/// let root = tree.insert(None, LocalNode::default());
/// let panel = tree.insert(
///     Some(root),
///     LocalNode {
///         layout: FractionalRect::new(0.5, 0.5, 0.5, 0.5).into(),
///         ..LocalNode::default()
///     },
/// );
///
/// tree.commit(Rect::new(0.0, 0.0, 100.0, 100.0));
///
/// assert_eq!(tree.world_bounds(panel), Some(Rect::new(25.0, 25.0, 75.0, 75.0)));
/// assert_eq!(tree.hit_test_point(Point::new(50.0, 50.0)).map(|h| h.node), Some(panel));
/// assert_eq!(tree.hit_test_point(Point::new(5.0, 5.0)).map(|h| h.node), Some(root));
/// ```
pub struct Tree {
    /// slots
    nodes: Vec<Option<Node>>,
    /// last generation per slot (persists across frees)
    generations: Vec<u32>,
    free_list: Vec<usize>,
}

impl core::fmt::Debug for Tree {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let total = self.nodes.len();
        let alive = self.nodes.iter().filter(|n| n.is_some()).count();
        let free = self.free_list.len();
        f.debug_struct("Tree")
            .field("nodes_total", &total)
            .field("nodes_alive", &alive)
            .field("free_list", &free)
            .finish_non_exhaustive()
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

/// Results of a hit test.
#[derive(Clone, Debug)]
pub struct Hit {
    /// The matched node.
    pub node: NodeId,
    /// Path from root to node (inclusive).
    pub path: Vec<NodeId>,
}

#[derive(Clone, Debug, Default)]
struct WorldNode {
    /// Untransformed layout rectangle in world coordinates.
    layout_rect: Rect,
    world_transform: Affine,
    /// AABB of the transformed layout rectangle.
    world_bounds: Rect,
}

#[derive(Clone, Debug)]
struct Node {
    generation: u32,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    local: LocalNode,
    world: WorldNode,
    gestures: Vec<Gesture>,
}

impl Node {
    fn new(generation: u32, local: LocalNode) -> Self {
        Self {
            generation,
            parent: None,
            children: Vec::new(),
            local,
            world: WorldNode::default(),
            gestures: Vec::new(),
        }
    }
}

impl Tree {
    /// Create a new empty tree.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
        }
    }

    /// Insert a new node as the topmost child of `parent` (or as a root if `None`).
    ///
    /// World-space data for the node is only computed on the next [`Tree::commit`].
    /// A stale `parent` inserts the node as a root.
    pub fn insert(&mut self, parent: Option<NodeId>, local: LocalNode) -> NodeId {
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.nodes[idx] = Some(Node::new(generation, local));
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices by design."
            )]
            (idx as u32, generation)
        } else {
            let generation = 1_u32;
            self.nodes.push(Some(Node::new(generation, local)));
            self.generations.push(generation);
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices by design."
            )]
            ((self.nodes.len() - 1) as u32, generation)
        };
        let id = NodeId::new(idx, generation);
        if let Some(p) = parent
            && self.is_alive(p)
        {
            self.link_parent(id, p);
        }
        id
    }

    /// Remove a node and its subtree from the tree.
    pub fn remove(&mut self, id: NodeId) {
        if !self.is_alive(id) {
            return;
        }
        if let Some(parent) = self.node(id).parent {
            self.unlink_parent(id, parent);
        }
        let children = self.node(id).children.clone();
        for child in children {
            self.remove(child);
        }
        self.nodes[id.idx()] = None;
        self.free_list.push(id.idx());
    }

    /// Move `id` under `new_parent` as its topmost child, or detach it into a root.
    ///
    /// Requests that would put a node inside its own subtree are ignored, as are
    /// stale identifiers. Returns whether the node was moved.
    pub fn reparent(&mut self, id: NodeId, new_parent: Option<NodeId>) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        if let Some(p) = new_parent
            && (!self.is_alive(p) || p == id || self.ancestors(p).any(|a| a == id))
        {
            return false;
        }
        if let Some(parent) = self.node(id).parent {
            self.unlink_parent(id, parent);
        }
        if let Some(p) = new_parent {
            self.link_parent(id, p);
        }
        true
    }

    /// Move `id` to the end of its parent's children so it is drawn above its siblings.
    ///
    /// Returns `true` if the order changed. Roots and stale ids are left alone.
    pub fn raise_to_front(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.parent_of(id) else {
            return false;
        };
        let siblings = &mut self.node_mut(parent).children;
        let Some(pos) = siblings.iter().position(|&c| c == id) else {
            return false;
        };
        if pos + 1 == siblings.len() {
            return false;
        }
        siblings.remove(pos);
        siblings.push(id);
        true
    }

    /// Move `id` to the start of its parent's children so it is drawn below its siblings.
    ///
    /// Returns `true` if the order changed. Roots and stale ids are left alone.
    pub fn lower_to_back(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.parent_of(id) else {
            return false;
        };
        let siblings = &mut self.node_mut(parent).children;
        let Some(pos) = siblings.iter().position(|&c| c == id) else {
            return false;
        };
        if pos == 0 {
            return false;
        }
        siblings.remove(pos);
        siblings.insert(0, id);
        true
    }

    /// Returns `true` if `id` is the last (topmost) child of its parent, or a live root.
    pub fn is_topmost(&self, id: NodeId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        match self.node(id).parent {
            Some(parent) => self.node(parent).children.last() == Some(&id),
            None => true,
        }
    }

    /// Update the fractional layout.
    pub fn set_layout(&mut self, id: NodeId, layout: impl Into<Layout>) {
        if let Some(n) = self.node_opt_mut(id) {
            n.local.layout = layout.into();
        }
    }

    /// Update the render transform.
    pub fn set_transform(&mut self, id: NodeId, tf: Affine) {
        if let Some(n) = self.node_opt_mut(id) {
            n.local.transform = tf;
        }
    }

    /// Update opacity, clamped to `[0, 1]`.
    pub fn set_opacity(&mut self, id: NodeId, opacity: f64) {
        if let Some(n) = self.node_opt_mut(id) {
            n.local.opacity = opacity.clamp(0.0, 1.0);
        }
    }

    /// Update node flags.
    pub fn set_flags(&mut self, id: NodeId, flags: NodeFlags) {
        if let Some(n) = self.node_opt_mut(id) {
            n.local.flags = flags;
        }
    }

    /// Set or clear [`NodeFlags::VISIBLE`], leaving other flags untouched.
    pub fn set_visible(&mut self, id: NodeId, visible: bool) {
        if let Some(n) = self.node_opt_mut(id) {
            n.local.flags.set(NodeFlags::VISIBLE, visible);
        }
    }

    /// Attach a gesture recognizer. Returns `false` for stale ids.
    pub fn add_gesture(&mut self, id: NodeId, gesture: Gesture) -> bool {
        match self.node_opt_mut(id) {
            Some(n) => {
                n.gestures.push(gesture);
                true
            }
            None => false,
        }
    }

    /// Gesture recognizers attached to a node, or an empty slice if the node is stale.
    pub fn gestures_of(&self, id: NodeId) -> &[Gesture] {
        if !self.is_alive(id) {
            return &[];
        }
        &self.node(id).gestures
    }

    /// Detach every gesture recognizer from a node.
    pub fn clear_gestures(&mut self, id: NodeId) {
        if let Some(n) = self.node_opt_mut(id) {
            n.gestures.clear();
        }
    }

    /// Resolve layout and world transforms for every node reachable from a root.
    ///
    /// Roots are laid out against `viewport`; every other node against its parent's
    /// layout rectangle. Transforms compose from the root down.
    pub fn commit(&mut self, viewport: Rect) {
        let roots: Vec<NodeId> = self.roots().collect();
        for root in roots {
            self.update_world(root, viewport, Affine::IDENTITY);
        }
    }

    /// Return the world transform for a live node as of the last [`Tree::commit`].
    pub fn world_transform(&self, id: NodeId) -> Option<Affine> {
        if !self.is_alive(id) {
            return None;
        }
        Some(self.node(id).world.world_transform)
    }

    /// Return the world-space axis-aligned bounding box for a live node as of
    /// the last [`Tree::commit`].
    pub fn world_bounds(&self, id: NodeId) -> Option<Rect> {
        if !self.is_alive(id) {
            return None;
        }
        Some(self.node(id).world.world_bounds)
    }

    /// Hit test a world-space point and return the topmost node under it.
    ///
    /// Only rendered ([`Tree::is_rendered`]) and pickable nodes are candidates.
    /// Paint order decides between candidates: later siblings are above earlier
    /// ones, children are above their parent, and later roots are above earlier
    /// roots. Uses world data from the last [`Tree::commit`].
    pub fn hit_test_point(&self, point: Point) -> Option<Hit> {
        let mut best = None;
        let mut stack: Vec<NodeId> = Vec::new();
        for root in self.roots() {
            stack.push(root);
            while let Some(id) = stack.pop() {
                let node = self.node(id);
                if !node.local.flags.contains(NodeFlags::VISIBLE) {
                    continue;
                }
                if node.local.flags.contains(NodeFlags::PICKABLE) && node.contains(point) {
                    best = Some(id);
                }
                // Reverse so children are visited in paint order.
                stack.extend(node.children.iter().rev().copied());
            }
        }
        best.map(|node| Hit {
            node,
            path: self.path_to(node),
        })
    }

    /// Returns true if `id` refers to a live node.
    ///
    /// A `NodeId` is considered live if its slot exists and its generation matches
    /// the current generation stored in that slot.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.nodes
            .get(id.idx())
            .and_then(|n| n.as_ref())
            .map(|n| n.generation == id.generation())
            .unwrap_or(false)
    }

    /// Returns true if the node and all of its ancestors are visible.
    pub fn is_rendered(&self, id: NodeId) -> bool {
        self.is_alive(id)
            && core::iter::once(id)
                .chain(self.ancestors(id))
                .all(|n| self.node(n).local.flags.contains(NodeFlags::VISIBLE))
    }

    /// Returns the local data of a live node.
    pub fn local(&self, id: NodeId) -> Option<&LocalNode> {
        if !self.is_alive(id) {
            return None;
        }
        Some(&self.node(id).local)
    }

    /// Returns the parent of a node if live, or `None` for roots or stale ids.
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        if !self.is_alive(id) {
            return None;
        }
        self.node(id).parent
    }

    /// Get the children of a node back to front, or an empty slice if the node is stale.
    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        if !self.is_alive(id) {
            return &[];
        }
        &self.node(id).children
    }

    /// Iterate the ancestors of a node, nearest first. The node itself is not included.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.parent_of(id),
        }
    }

    /// Iterate a subtree in depth-first pre-order, starting with `id` itself.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let stack = if self.is_alive(id) { vec![id] } else { Vec::new() };
        Descendants { tree: self, stack }
    }

    /// The node after `current` in depth-first pre-order within its tree.
    ///
    /// Returns `None` at the end of the tree or for stale ids. Does not wrap around
    /// and does not cross into other roots.
    pub fn next_depth_first(&self, current: NodeId) -> Option<NodeId> {
        if !self.is_alive(current) {
            return None;
        }
        if let Some(&first) = self.node(current).children.first() {
            return Some(first);
        }
        let mut node = current;
        while let Some(parent) = self.node(node).parent {
            if let Some(next) = self.sibling(parent, node, 1) {
                return Some(next);
            }
            node = parent;
        }
        None
    }

    /// The node before `current` in depth-first pre-order within its tree.
    ///
    /// Returns `None` at the root or for stale ids.
    pub fn prev_depth_first(&self, current: NodeId) -> Option<NodeId> {
        if !self.is_alive(current) {
            return None;
        }
        let parent = self.node(current).parent?;
        let Some(mut node) = self.sibling(parent, current, -1) else {
            return Some(parent);
        };
        // Deepest last descendant of the previous sibling.
        while let Some(&last) = self.node(node).children.last() {
            node = last;
        }
        Some(node)
    }

    /// The root of the tree containing `id`.
    pub fn root_of(&self, id: NodeId) -> Option<NodeId> {
        if !self.is_alive(id) {
            return None;
        }
        Some(self.ancestors(id).last().unwrap_or(id))
    }

    /// Iterate live roots in slot order.
    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().enumerate().filter_map(|(i, n)| match n {
            Some(n) if n.parent.is_none() =>
            {
                #[allow(
                    clippy::cast_possible_truncation,
                    reason = "NodeId uses 32-bit indices by design."
                )]
                Some(NodeId::new(i as u32, n.generation))
            }
            _ => None,
        })
    }

    // --- internals ---

    fn node(&self, id: NodeId) -> &Node {
        self.nodes[id.idx()].as_ref().expect("dangling NodeId")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id.idx()].as_mut().expect("dangling NodeId")
    }

    fn node_opt_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let n = self.nodes.get_mut(id.idx())?.as_mut()?;
        if n.generation != id.generation() {
            return None;
        }
        Some(n)
    }

    fn link_parent(&mut self, id: NodeId, parent: NodeId) {
        let parent_node = self.node_mut(parent);
        parent_node.children.push(id);
        self.node_mut(id).parent = Some(parent);
    }

    fn unlink_parent(&mut self, id: NodeId, parent: NodeId) {
        let p = self.node_mut(parent);
        p.children.retain(|c| *c != id);
        self.node_mut(id).parent = None;
    }

    fn sibling(&self, parent: NodeId, id: NodeId, offset: isize) -> Option<NodeId> {
        let siblings = &self.node(parent).children;
        let pos = siblings.iter().position(|&c| c == id)?;
        let target = pos.checked_add_signed(offset)?;
        siblings.get(target).copied()
    }

    fn path_to(&self, id: NodeId) -> Vec<NodeId> {
        let mut path: Vec<NodeId> = core::iter::once(id).chain(self.ancestors(id)).collect();
        path.reverse();
        path
    }

    fn update_world(&mut self, root_id: NodeId, viewport: Rect, root_tf: Affine) {
        // Depth-first, propagating the parent's layout rectangle and transform
        // toward the leaves.
        let mut stack = vec![(root_id, viewport, root_tf)];

        while let Some((id, parent_rect, parent_tf)) = stack.pop() {
            let node = self.node_mut(id);
            let layout_rect = node.local.layout.resolve(parent_rect);
            let world_tf = parent_tf * about_center(node.local.transform, layout_rect);
            node.world = WorldNode {
                layout_rect,
                world_transform: world_tf,
                world_bounds: transform_rect_bbox(world_tf, layout_rect),
            };
            for &child in node.children.iter().rev() {
                stack.push((child, layout_rect, world_tf));
            }
        }
    }
}

impl Node {
    fn contains(&self, point: Point) -> bool {
        let local_point = self.world.world_transform.inverse() * point;
        self.world.layout_rect.contains(local_point)
    }
}

/// Iterator over the ancestors of a node, see [`Tree::ancestors`].
#[derive(Clone, Debug)]
pub struct Ancestors<'a> {
    tree: &'a Tree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.parent_of(current);
        Some(current)
    }
}

/// Iterator over a subtree in pre-order, see [`Tree::descendants`].
#[derive(Clone, Debug)]
pub struct Descendants<'a> {
    tree: &'a Tree,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.stack.pop()?;
        self.stack
            .extend(self.tree.children_of(current).iter().rev().copied());
        Some(current)
    }
}
