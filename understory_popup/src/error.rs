// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Popup error types.

use thiserror::Error;
use understory_view_tree::NodeId;

/// Error returned by a show or hide animation hook.
pub type AnimationError = Box<dyn std::error::Error>;

/// Errors reported by popups, hosts and the overlay injector.
#[derive(Debug, Error)]
pub enum PopupError {
    /// The host page's root node has been removed from its scene.
    #[error("host page is no longer part of its scene")]
    HostNotAlive,

    /// The popup's root node has been removed from its scene.
    #[error("popup is no longer part of its scene")]
    PopupNotAlive,

    /// The popup and the host live in different scenes.
    #[error("popup belongs to a different scene than its host")]
    ForeignScene,

    /// A node handle no longer refers to a live node.
    #[error("stale node handle: {0:?}")]
    StaleNode(NodeId),

    /// Moving the node would place it inside its own subtree.
    #[error("node {0:?} cannot be moved below one of its own descendants")]
    WouldCycle(NodeId),

    /// A gesture factory produced something other than a tap recognizer.
    #[error("gesture factory did not produce a tap gesture for node {node:?}")]
    NotATapGesture {
        /// Node the gesture was produced for.
        node: NodeId,
    },

    /// A show or hide animation hook failed.
    #[error("animation failed: {0}")]
    Animation(#[source] AnimationError),
}
