// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host pages: a root node with a single content slot and lifecycle signals.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use understory_view_tree::{FractionalRect, LocalNode, NodeId};

use crate::error::PopupError;
use crate::event::Event;
use crate::scene::Scene;

/// Raised after a node becomes the page's content.
#[derive(Clone, Debug)]
pub struct ChildAddedEvent {
    /// The page whose content changed.
    pub page: Page,
    /// The new content.
    pub child: NodeId,
}

/// Raised every time the page is about to become visible.
#[derive(Clone, Debug)]
pub struct AppearingEvent {
    /// The appearing page.
    pub page: Page,
}

/// Raised every time the page stops being visible.
#[derive(Clone, Debug)]
pub struct DisappearingEvent {
    /// The disappearing page.
    pub page: Page,
}

struct PageInner {
    scene: Scene,
    root: NodeId,
    content: Cell<Option<NodeId>>,
    appear_count: Cell<usize>,
    child_added: Event<ChildAddedEvent>,
    appearing: Event<AppearingEvent>,
    disappearing: Event<DisappearingEvent>,
}

/// A host screen with one content node.
///
/// `Page` is a cheap handle; clones refer to the same page.
#[derive(Clone)]
pub struct Page {
    inner: Rc<PageInner>,
}

impl Page {
    /// Create a page as a new root of `scene`.
    pub fn new(scene: &Scene) -> Self {
        let root = scene.insert(None, LocalNode::default());
        Self {
            inner: Rc::new(PageInner {
                scene: scene.clone(),
                root,
                content: Cell::new(None),
                appear_count: Cell::new(0),
                child_added: Event::new(),
                appearing: Event::new(),
                disappearing: Event::new(),
            }),
        }
    }

    /// The scene this page lives in.
    pub fn scene(&self) -> &Scene {
        &self.inner.scene
    }

    /// Root node of the page.
    pub fn root(&self) -> NodeId {
        self.inner.root
    }

    /// Returns `true` while the page's root is live in its scene.
    pub fn is_alive(&self) -> bool {
        self.inner.scene.is_alive(self.inner.root)
    }

    /// Current content.
    pub fn content(&self) -> Option<NodeId> {
        self.inner.content.get()
    }

    /// Make `node` the page's content, full-bleed, then raise [`ChildAddedEvent`].
    ///
    /// The previous content is detached if it still sits directly under the page
    /// root and is returned. Assigning the current content again does nothing.
    pub fn set_content(&self, node: NodeId) -> Result<Option<NodeId>, PopupError> {
        let root = self.inner.root;
        if self.inner.content.get() == Some(node) {
            return Ok(None);
        }
        self.inner.scene.with_tree(|tree| {
            if !tree.is_alive(root) {
                Err(PopupError::HostNotAlive)
            } else if !tree.is_alive(node) {
                Err(PopupError::StaleNode(node))
            } else if node == root || tree.ancestors(root).any(|a| a == node) {
                Err(PopupError::WouldCycle(node))
            } else {
                Ok(())
            }
        })?;
        let previous = self.inner.content.replace(Some(node));
        self.inner.scene.with_tree_mut(|tree| {
            if let Some(old) = previous
                && tree.parent_of(old) == Some(root)
            {
                tree.reparent(old, None);
            }
            tree.reparent(node, Some(root));
            tree.set_layout(node, FractionalRect::FULL);
        });
        self.inner.child_added.emit(&mut ChildAddedEvent {
            page: self.clone(),
            child: node,
        });
        Ok(previous)
    }

    /// Signal that the page is appearing.
    pub fn appear(&self) {
        self.inner.appear_count.set(self.inner.appear_count.get() + 1);
        self.inner
            .appearing
            .emit(&mut AppearingEvent { page: self.clone() });
    }

    /// Signal that the page is disappearing.
    pub fn disappear(&self) {
        self.inner
            .disappearing
            .emit(&mut DisappearingEvent { page: self.clone() });
    }

    /// How many times [`Page::appear`] has been called.
    pub fn appear_count(&self) -> usize {
        self.inner.appear_count.get()
    }

    /// Raised after the content changes.
    pub fn child_added(&self) -> &Event<ChildAddedEvent> {
        &self.inner.child_added
    }

    /// Raised on every [`Page::appear`].
    pub fn appearing(&self) -> &Event<AppearingEvent> {
        &self.inner.appearing
    }

    /// Raised on every [`Page::disappear`].
    pub fn disappearing(&self) -> &Event<DisappearingEvent> {
        &self.inner.disappearing
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("root", &self.inner.root)
            .field("content", &self.inner.content.get())
            .field("appear_count", &self.inner.appear_count.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Rect;
    use std::cell::RefCell;

    #[test]
    fn set_content_reparents_and_notifies() {
        let scene = Scene::new(Rect::new(0.0, 0.0, 10.0, 10.0));
        let page = Page::new(&scene);
        let added = Rc::new(RefCell::new(Vec::new()));
        let a = Rc::clone(&added);
        page.child_added()
            .subscribe(move |e| a.borrow_mut().push((e.page.root(), e.child)));

        let first = scene.insert(None, LocalNode::default());
        let second = scene.insert(None, LocalNode::default());

        assert_eq!(page.set_content(first).unwrap(), None);
        assert_eq!(scene.with_tree(|t| t.parent_of(first)), Some(page.root()));
        assert_eq!(page.set_content(first).unwrap(), None);

        assert_eq!(page.set_content(second).unwrap(), Some(first));
        assert_eq!(scene.with_tree(|t| t.parent_of(first)), None);
        assert_eq!(page.content(), Some(second));
        assert_eq!(
            *added.borrow(),
            vec![(page.root(), first), (page.root(), second)]
        );
    }

    #[test]
    fn appear_counts_and_notifies_every_time() {
        let scene = Scene::new(Rect::ZERO);
        let page = Page::new(&scene);
        let seen = Rc::new(Cell::new(0));
        let s = Rc::clone(&seen);
        page.appearing().subscribe(move |_| s.set(s.get() + 1));
        let gone = Rc::new(Cell::new(false));
        let g = Rc::clone(&gone);
        page.disappearing().subscribe(move |_| g.set(true));

        page.appear();
        page.appear();
        page.disappear();
        assert_eq!(page.appear_count(), 2);
        assert_eq!(seen.get(), 2);
        assert!(gone.get());
    }

    #[test]
    fn removed_page_rejects_content() {
        let scene = Scene::new(Rect::ZERO);
        let page = Page::new(&scene);
        let node = scene.insert(None, LocalNode::default());
        scene.remove(page.root());
        assert!(!page.is_alive());
        assert!(matches!(
            page.set_content(node),
            Err(PopupError::HostNotAlive)
        ));
    }
}
