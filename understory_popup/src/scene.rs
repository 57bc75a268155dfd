// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared UI model: the view tree, section tags and viewport behind one handle.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use kurbo::{Point, Rect};
use understory_view_tree::{LocalNode, NodeId, TapCommand, Tree};

use crate::classify::{Classification, classify};
use crate::section::{Section, SectionTags};

/// Handle to a view tree shared by a host page, its overlay and its popups.
///
/// Cloning the handle is cheap and every clone refers to the same scene. The
/// scene is single-threaded: borrows of the tree are scoped to the closures
/// passed to [`Scene::with_tree`] and [`Scene::with_tree_mut`] and must not be
/// nested.
#[derive(Clone)]
pub struct Scene {
    inner: Rc<SceneInner>,
}

struct SceneInner {
    tree: RefCell<Tree>,
    sections: RefCell<SectionTags>,
    viewport: Cell<Rect>,
}

impl Scene {
    /// Create an empty scene laid out against `viewport`.
    pub fn new(viewport: Rect) -> Self {
        Self {
            inner: Rc::new(SceneInner {
                tree: RefCell::new(Tree::new()),
                sections: RefCell::new(SectionTags::new()),
                viewport: Cell::new(viewport),
            }),
        }
    }

    /// The rectangle roots are laid out against.
    pub fn viewport(&self) -> Rect {
        self.inner.viewport.get()
    }

    /// Change the viewport. Takes effect at the next [`Scene::commit`].
    pub fn set_viewport(&self, viewport: Rect) {
        self.inner.viewport.set(viewport);
    }

    /// Run `f` with shared access to the tree.
    pub fn with_tree<R>(&self, f: impl FnOnce(&Tree) -> R) -> R {
        f(&self.inner.tree.borrow())
    }

    /// Run `f` with exclusive access to the tree.
    pub fn with_tree_mut<R>(&self, f: impl FnOnce(&mut Tree) -> R) -> R {
        f(&mut self.inner.tree.borrow_mut())
    }

    /// Insert a node. See [`Tree::insert`].
    pub fn insert(&self, parent: Option<NodeId>, local: LocalNode) -> NodeId {
        self.with_tree_mut(|tree| tree.insert(parent, local))
    }

    /// Remove a node and its subtree, dropping their section tags.
    pub fn remove(&self, node: NodeId) {
        let removed: Vec<NodeId> = self.with_tree_mut(|tree| {
            let removed = tree.descendants(node).collect();
            tree.remove(node);
            removed
        });
        let mut sections = self.inner.sections.borrow_mut();
        for id in removed {
            sections.forget(id);
        }
    }

    /// Returns `true` if `node` is live in this scene.
    pub fn is_alive(&self, node: NodeId) -> bool {
        self.with_tree(|tree| tree.is_alive(node))
    }

    /// The section tag of `node`.
    pub fn section_of(&self, node: NodeId) -> Section {
        self.inner.sections.borrow().get(node)
    }

    pub(crate) fn tag(&self, node: NodeId, section: Section) {
        self.inner.sections.borrow_mut().tag(node, section);
    }

    /// Classify a tap on `node`, walking no higher than `boundary`.
    pub fn classify(&self, node: NodeId, boundary: Option<NodeId>) -> Classification {
        let tree = self.inner.tree.borrow();
        let sections = self.inner.sections.borrow();
        classify(node, boundary, &*tree, &*sections)
    }

    /// Resolve layout against the current viewport.
    pub fn commit(&self) {
        let viewport = self.viewport();
        self.with_tree_mut(|tree| tree.commit(viewport));
    }

    /// Deliver a single tap to `node`.
    ///
    /// Runs the command of every single-tap recognizer attached to `node`, in
    /// attachment order, and returns how many ran. Commands run with no borrow
    /// of the scene held, so they are free to change the tree.
    pub fn tap(&self, node: NodeId) -> usize {
        let commands: Vec<(TapCommand, NodeId)> = self.with_tree(|tree| {
            tree.gestures_of(node)
                .iter()
                .filter_map(|g| g.as_tap())
                .filter(|tap| tap.taps_required <= 1)
                .filter_map(|tap| {
                    let command = tap.command.clone()?;
                    Some((command, tap.parameter.unwrap_or(node)))
                })
                .collect()
        });
        tracing::trace!(?node, commands = commands.len(), "tap delivered");
        for (command, parameter) in &commands {
            command(*parameter);
        }
        commands.len()
    }

    /// Tap the scene at a point in viewport coordinates.
    ///
    /// Commits layout, hit tests, and delivers the tap to the hit node, or to
    /// its nearest ancestor carrying a tap recognizer. Returns the node that
    /// received the tap, or `None` if nothing under the point handles taps.
    pub fn tap_at(&self, point: Point) -> Option<NodeId> {
        self.commit();
        let target = self.with_tree(|tree| {
            let hit = tree.hit_test_point(point)?;
            hit.path
                .iter()
                .rev()
                .copied()
                .find(|&n| tree.gestures_of(n).iter().any(|g| g.as_tap().is_some()))
        })?;
        self.tap(target);
        Some(target)
    }

    /// Returns `true` if both handles refer to the same scene.
    pub fn same_scene(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("viewport", &self.viewport())
            .field("tree", &*self.inner.tree.borrow())
            .finish_non_exhaustive()
    }
}
