// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Section tags: the logical popup region a node belongs to.

use hashbrown::HashMap;
use understory_view_tree::NodeId;

/// Logical region of a popup.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Section {
    /// Untagged. Nodes supplied by the application report this.
    #[default]
    NotSet,
    /// One of the four border strips around the content.
    Border,
    /// The full-bleed layer behind the content.
    Backdrop,
    /// Header content slot.
    Header,
    /// Body content slot.
    Body,
    /// Footer content slot.
    Footer,
}

impl Section {
    /// Returns `true` for `Header`, `Body` and `Footer`.
    pub const fn is_content(self) -> bool {
        matches!(self, Self::Header | Self::Body | Self::Footer)
    }
}

/// Side table mapping nodes to their [`Section`].
///
/// A node is tagged at most once; later assignments are ignored.
#[derive(Clone, Debug, Default)]
pub struct SectionTags {
    tags: HashMap<NodeId, Section>,
}

impl SectionTags {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag `node`. Returns `false` if it already carried a tag.
    pub fn tag(&mut self, node: NodeId, section: Section) -> bool {
        if self.tags.contains_key(&node) {
            return false;
        }
        self.tags.insert(node, section);
        true
    }

    /// The tag of `node`, or [`Section::NotSet`] for untagged nodes.
    pub fn get(&self, node: NodeId) -> Section {
        self.tags.get(&node).copied().unwrap_or_default()
    }

    /// Drop the tag of a node that has been removed from its tree.
    pub(crate) fn forget(&mut self, node: NodeId) {
        self.tags.remove(&node);
    }
}
