// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the view tree: node identifiers, flags, and local layout data.

use kurbo::{Affine, Rect};

/// Identifier for a node in the tree (generational).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeId(pub(crate) u32, pub(crate) u32);

impl NodeId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }

    pub(crate) const fn generation(self) -> u32 {
        self.1
    }
}

bitflags::bitflags! {
    /// Node flags controlling visibility and picking.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u8 {
        /// Node is visible. An invisible node hides its whole subtree.
        const VISIBLE  = 0b0000_0001;
        /// Node is pickable (participates in hit testing).
        const PICKABLE = 0b0000_0010;
    }
}

impl Default for NodeFlags {
    fn default() -> Self {
        Self::VISIBLE | Self::PICKABLE
    }
}

/// Placement of a node inside its parent, expressed as fractions of the parent's bounds.
///
/// `width` and `height` are fractions of the parent's size. `x` and `y` are
/// proportional positions: `0.0` aligns the node's leading edge with the parent's
/// leading edge, `1.0` aligns the trailing edges, and `0.5` centers the node.
///
/// ```rust
/// use kurbo::Rect;
/// use understory_view_tree::FractionalRect;
///
/// let centered = FractionalRect::new(0.5, 0.5, 0.5, 0.5);
/// let parent = Rect::new(0.0, 0.0, 200.0, 100.0);
/// assert_eq!(centered.resolve(parent), Rect::new(50.0, 25.0, 150.0, 75.0));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FractionalRect {
    /// Proportional horizontal position.
    pub x: f64,
    /// Proportional vertical position.
    pub y: f64,
    /// Width as a fraction of the parent's width.
    pub width: f64,
    /// Height as a fraction of the parent's height.
    pub height: f64,
}

impl FractionalRect {
    /// Fills the whole parent.
    pub const FULL: Self = Self::new(0.0, 0.0, 1.0, 1.0);

    /// Takes no space at the parent's origin.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Create a fractional rectangle from proportional position and fractional size.
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Resolve into concrete coordinates inside `parent`.
    pub fn resolve(&self, parent: Rect) -> Rect {
        let w = parent.width() * self.width;
        let h = parent.height() * self.height;
        let x0 = parent.x0 + (parent.width() - w) * self.x;
        let y0 = parent.y0 + (parent.height() - h) * self.y;
        Rect::new(x0, y0, x0 + w, y0 + h)
    }
}

impl Default for FractionalRect {
    fn default() -> Self {
        Self::FULL
    }
}

/// Placement of a node by its edges, each a fraction of the parent's size.
///
/// Siblings that share an edge value resolve to exactly the same coordinate,
/// which makes this the form to use for stacked or tiled children.
///
/// ```rust
/// use kurbo::Rect;
/// use understory_view_tree::FractionalEdges;
///
/// let parent = Rect::new(0.0, 0.0, 100.0, 100.0);
/// let top = FractionalEdges::new(0.0, 0.0, 1.0, 0.15).resolve(parent);
/// let rest = FractionalEdges::new(0.0, 0.15, 1.0, 1.0).resolve(parent);
/// assert_eq!(top.y1, rest.y0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FractionalEdges {
    /// Left edge.
    pub left: f64,
    /// Top edge.
    pub top: f64,
    /// Right edge.
    pub right: f64,
    /// Bottom edge.
    pub bottom: f64,
}

impl FractionalEdges {
    /// Create fractional edges.
    pub const fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Resolve into concrete coordinates inside `parent`.
    pub fn resolve(&self, parent: Rect) -> Rect {
        let (w, h) = (parent.width(), parent.height());
        Rect::new(
            parent.x0 + w * self.left,
            parent.y0 + h * self.top,
            parent.x0 + w * self.right,
            parent.y0 + h * self.bottom,
        )
    }
}

/// How a node is placed inside its parent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Layout {
    /// Proportional position and fractional size.
    Proportional(FractionalRect),
    /// Fractional edges.
    Edges(FractionalEdges),
}

impl Layout {
    /// Fills the whole parent.
    pub const FULL: Self = Self::Proportional(FractionalRect::FULL);

    /// Resolve into concrete coordinates inside `parent`.
    pub fn resolve(&self, parent: Rect) -> Rect {
        match self {
            Self::Proportional(rect) => rect.resolve(parent),
            Self::Edges(edges) => edges.resolve(parent),
        }
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::FULL
    }
}

impl From<FractionalRect> for Layout {
    fn from(rect: FractionalRect) -> Self {
        Self::Proportional(rect)
    }
}

impl From<FractionalEdges> for Layout {
    fn from(edges: FractionalEdges) -> Self {
        Self::Edges(edges)
    }
}

/// Local data for a node.
#[derive(Clone, Debug)]
pub struct LocalNode {
    /// Placement inside the parent (or inside the viewport for roots).
    pub layout: Layout,
    /// Render transform, applied about the center of the node's layout rectangle.
    ///
    /// Layout of children is not affected; the transform composes down the tree
    /// and is honored by hit testing.
    pub transform: Affine,
    /// Opacity in `[0, 1]`. Purely presentational; transparent nodes are still pickable.
    pub opacity: f64,
    /// Visibility and picking flags.
    pub flags: NodeFlags,
}

impl Default for LocalNode {
    fn default() -> Self {
        Self {
            layout: Layout::FULL,
            transform: Affine::IDENTITY,
            opacity: 1.0,
            flags: NodeFlags::default(),
        }
    }
}
