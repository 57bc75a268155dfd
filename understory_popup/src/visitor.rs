// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Attach tap capture to a whole subtree.

use understory_view_tree::{Gesture, NodeId, Tree};

use crate::error::PopupError;

/// Attach one tap recognizer to `root` and to every node below it.
///
/// `factory` is called once per node, in pre-order. Each recognizer gets its
/// parameter bound to the node it is attached to, so a shared command learns
/// which node was tapped.
///
/// Nothing is attached unless the factory produces a tap recognizer for every
/// node; otherwise [`PopupError::NotATapGesture`] names the first offending node.
/// Returns the number of recognizers attached.
pub fn attach_tap_capture(
    tree: &mut Tree,
    root: NodeId,
    factory: impl FnMut() -> Gesture,
) -> Result<usize, PopupError> {
    attach_tap_capture_where(tree, root, |_| true, factory)
}

/// Like [`attach_tap_capture`], but only nodes accepted by `filter` get a
/// recognizer. The factory is not called for skipped nodes.
pub(crate) fn attach_tap_capture_where(
    tree: &mut Tree,
    root: NodeId,
    mut filter: impl FnMut(NodeId) -> bool,
    mut factory: impl FnMut() -> Gesture,
) -> Result<usize, PopupError> {
    if !tree.is_alive(root) {
        return Err(PopupError::StaleNode(root));
    }
    let mut pending = Vec::new();
    for node in tree.descendants(root).filter(|&n| filter(n)) {
        let Gesture::Tap(tap) = factory() else {
            return Err(PopupError::NotATapGesture { node });
        };
        pending.push((node, tap.with_parameter(node)));
    }
    let attached = pending.len();
    for (node, tap) in pending {
        tree.add_gesture(node, Gesture::Tap(tap));
    }
    Ok(attached)
}
