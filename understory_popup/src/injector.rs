// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Overlay injection: slide a popup layer under a host page's content slot.
//!
//! An [`OverlayInjector`] watches a [`Page`]. The first time the page's content
//! is assigned, the content is moved into a new full-bleed overlay node and the
//! overlay becomes the page's content. Every time the page appears, registered
//! popups that are not yet in the overlay are inserted above the content and
//! initialized.
//!
//! Register popups before assigning the page's content. Popups registered later
//! are picked up on the next appearing signal.
//!
//! ```
//! use kurbo::Rect;
//! use understory_popup::{OverlayInjector, Page, Popup, Scene};
//! use understory_view_tree::LocalNode;
//!
//! let scene = Scene::new(Rect::new(0.0, 0.0, 320.0, 480.0));
//! let page = Page::new(&scene);
//! let popup = Popup::new(&scene);
//!
//! let injector = OverlayInjector::new(&page).unwrap();
//! injector.add(&popup).unwrap();
//!
//! let content = scene.insert(None, LocalNode::default());
//! page.set_content(content).unwrap();
//! page.appear();
//!
//! let overlay = injector.overlay().unwrap();
//! assert_eq!(page.content(), Some(overlay));
//! assert_eq!(
//!     scene.with_tree(|t| t.children_of(overlay).to_vec()),
//!     vec![content, popup.root()]
//! );
//! assert!(popup.is_initialized());
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use understory_view_tree::{FractionalRect, LocalNode, NodeFlags, NodeId};

use crate::error::PopupError;
use crate::page::Page;
use crate::popup::Popup;
use crate::scene::Scene;

/// Per-host state shared with the page's signal listeners.
struct HostRegistry {
    scene: Scene,
    overlay: Cell<Option<NodeId>>,
    /// Host content currently held by the overlay.
    content: Cell<Option<NodeId>>,
    popups: RefCell<Vec<Popup>>,
    wrapped: Cell<bool>,
}

impl HostRegistry {
    fn overlay_node(&self) -> NodeId {
        if let Some(overlay) = self.overlay.get() {
            return overlay;
        }
        let overlay = self.scene.insert(
            None,
            LocalNode {
                flags: NodeFlags::VISIBLE,
                ..LocalNode::default()
            },
        );
        self.overlay.set(Some(overlay));
        overlay
    }

    fn on_child_added(&self, page: &Page, child: NodeId) {
        if page.content() != Some(child) || self.overlay.get() == Some(child) {
            return;
        }
        self.wrap(page, Some(child));
    }

    /// Move `content` into the overlay and make the overlay the page's content.
    fn wrap(&self, page: &Page, content: Option<NodeId>) {
        let overlay = self.overlay_node();
        let first = !self.wrapped.replace(true);
        if let Some(child) = content {
            let previous = self.content.replace(Some(child));
            self.scene.with_tree_mut(|tree| {
                if let Some(prev) = previous
                    && prev != child
                    && tree.parent_of(prev) == Some(overlay)
                {
                    tree.reparent(prev, None);
                }
                tree.reparent(child, Some(overlay));
                tree.set_layout(child, FractionalRect::FULL);
                tree.lower_to_back(child);
            });
        }
        if first {
            tracing::debug!(?overlay, ?content, "host content wrapped in overlay");
        } else {
            tracing::debug!(?overlay, ?content, "replacement content moved into overlay");
        }
        if let Err(err) = page.set_content(overlay) {
            tracing::error!(?overlay, "failed to install overlay: {}", err);
        }
    }

    fn on_appearing(&self, page: &Page) {
        if !self.wrapped.get() {
            self.wrap(page, page.content());
        }
        let Some(overlay) = self.overlay.get() else {
            return;
        };
        let popups = self.popups.borrow().clone();
        for popup in popups {
            let root = popup.root();
            let inserted = self
                .scene
                .with_tree_mut(|tree| {
                    if !tree.is_alive(root) {
                        return Err(PopupError::PopupNotAlive);
                    }
                    if tree.parent_of(root) == Some(overlay) {
                        return Ok(false);
                    }
                    tree.reparent(root, Some(overlay));
                    tree.set_layout(root, FractionalRect::FULL);
                    Ok(true)
                })
                .and_then(|inserted| popup.initialize().map(|_| inserted));
            match inserted {
                Ok(true) => tracing::debug!(?root, "popup inserted into overlay"),
                Ok(false) => {}
                Err(err) => tracing::error!(?root, "failed to insert popup: {}", err),
            }
        }
    }
}

/// Binds popups to a host [`Page`] through an overlay layer.
///
/// The injector's state lives as long as the page: dropping the injector
/// handle does not stop it.
pub struct OverlayInjector {
    page: Page,
    registry: Rc<HostRegistry>,
}

impl OverlayInjector {
    /// Start watching `page`.
    pub fn new(page: &Page) -> Result<Self, PopupError> {
        if !page.is_alive() {
            return Err(PopupError::HostNotAlive);
        }
        let registry = Rc::new(HostRegistry {
            scene: page.scene().clone(),
            overlay: Cell::new(None),
            content: Cell::new(None),
            popups: RefCell::new(Vec::new()),
            wrapped: Cell::new(false),
        });
        let r = Rc::clone(&registry);
        page.child_added()
            .subscribe(move |e| r.on_child_added(&e.page, e.child));
        let r = Rc::clone(&registry);
        page.appearing().subscribe(move |e| r.on_appearing(&e.page));
        Ok(Self {
            page: page.clone(),
            registry,
        })
    }

    /// The host page.
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Register a popup with the host.
    ///
    /// Registering the same popup twice is allowed; it is still inserted once.
    pub fn add(&self, popup: &Popup) -> Result<(), PopupError> {
        if !self.page.is_alive() {
            return Err(PopupError::HostNotAlive);
        }
        if !popup.scene().same_scene(self.page.scene()) {
            return Err(PopupError::ForeignScene);
        }
        if !popup.is_alive() {
            return Err(PopupError::PopupNotAlive);
        }
        self.registry.popups.borrow_mut().push(popup.clone());
        Ok(())
    }

    /// Register several popups, stopping at the first one that fails.
    pub fn add_all<'a>(
        &self,
        popups: impl IntoIterator<Item = &'a Popup>,
    ) -> Result<(), PopupError> {
        popups.into_iter().try_for_each(|popup| self.add(popup))
    }

    /// Registered popups in registration order, duplicates included.
    pub fn popups(&self) -> Vec<Popup> {
        self.registry.popups.borrow().clone()
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.registry.popups.borrow().len()
    }

    /// Returns `true` if no popup has been registered.
    pub fn is_empty(&self) -> bool {
        self.registry.popups.borrow().is_empty()
    }

    /// The overlay node, once it has been created.
    pub fn overlay(&self) -> Option<NodeId> {
        self.registry.overlay.get()
    }

    /// Returns `true` once the page's content has been wrapped in the overlay.
    pub fn is_wrapped(&self) -> bool {
        self.registry.wrapped.get()
    }
}

impl<'a> IntoIterator for &'a OverlayInjector {
    type Item = Popup;
    type IntoIter = std::vec::IntoIter<Popup>;

    fn into_iter(self) -> Self::IntoIter {
        self.popups().into_iter()
    }
}

impl fmt::Debug for OverlayInjector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayInjector")
            .field("page", &self.page)
            .field("popups", &self.len())
            .field("overlay", &self.registry.overlay.get())
            .field("wrapped", &self.registry.wrapped.get())
            .finish_non_exhaustive()
    }
}
