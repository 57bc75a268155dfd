// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory View Tree: a headless, retained-mode view tree with fractional layout.
//!
//! The tree models what a toolkit would keep for each on-screen element: a parent, an
//! ordered list of children, a placement inside the parent, a render transform, opacity,
//! visibility, and a list of gesture recognizers. It does not draw anything.
//!
//! - Placement is fractional ([`Layout`]). A [`FractionalRect`] gives sizes as fractions of
//!   the parent and proportional positions, so `0.0`, `0.5`, and `1.0` mean leading, centered,
//!   and trailing. [`FractionalEdges`] gives each edge as a fraction of the parent instead.
//! - Children are ordered back to front. Raising a child moves it to the end of the list.
//! - Render transforms pivot around the center of a node's layout rectangle and compose from
//!   the root down. They do not affect the layout of children.
//! - Gesture recognizers ([`Gesture`]) are plain data attached to nodes. Delivering input to
//!   them is left to the embedding code.
//!
//! ## Not a layout engine
//!
//! Fractional placement is the only layout policy. There is no measurement, no intrinsic
//! sizing, and no stack or grid containers. Higher layers compute fractions and write them
//! with [`Tree::set_layout`].
//!
//! ## API overview
//!
//! - [`Tree`]: container owning every node.
//! - [`LocalNode`]: per-node local data (layout, transform, opacity, flags).
//! - [`NodeFlags`]: visibility and picking controls.
//! - [`NodeId`]: generational handle of a node. Stale handles are ignored by setters and
//!   yield `None` or empty results from queries.
//!
//! Key operations:
//! - [`Tree::insert`] / [`Tree::remove`] / [`Tree::reparent`]
//! - [`Tree::raise_to_front`] / [`Tree::lower_to_back`] / [`Tree::is_topmost`]
//! - [`Tree::commit`] resolves layout and world transforms against a viewport.
//! - [`Tree::hit_test_point`] returns the topmost rendered, pickable node under a point.
//! - [`Tree::ancestors`] and [`Tree::descendants`] walk the hierarchy;
//!   [`Tree::next_depth_first`] and [`Tree::prev_depth_first`] step through it one node at a time.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod gesture;
mod tree;
mod types;
mod util;

pub use gesture::{Gesture, PanCommand, PanGesture, TapCommand, TapGesture};
pub use tree::{Ancestors, Descendants, Hit, Tree};
pub use types::{FractionalEdges, FractionalRect, Layout, LocalNode, NodeFlags, NodeId};
