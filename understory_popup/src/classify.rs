// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Hit classification: which popup section contains a tapped node.
//!
//! The walk starts at the tapped node's parent and moves toward the root. The
//! first ancestor tagged [`Section::Header`], [`Section::Body`] or
//! [`Section::Footer`] decides the section. If the walk reaches the boundary
//! (normally the popup's root) or the tree root without finding one, the tap
//! belongs to [`Section::Backdrop`]. Border and backdrop tags never stop the walk.
//!
//! Separately, the tapped node's own tag tells whether it is a user control:
//! untagged nodes were supplied by the application, tagged ones belong to the
//! popup's chrome.
//!
//! ```
//! use understory_popup::classify::{classify, ParentLookup, SectionLookup};
//! use understory_popup::Section;
//!
//! // 1 (popup root) → 2 (body slot) → 3 (panel) → 4 (button)
//! struct Parents;
//! impl ParentLookup<u32> for Parents {
//!     fn parent_of(&self, node: &u32) -> Option<u32> {
//!         (*node > 1).then(|| node - 1)
//!     }
//! }
//! struct Tags;
//! impl SectionLookup<u32> for Tags {
//!     fn section_of(&self, node: &u32) -> Section {
//!         if *node == 2 { Section::Body } else { Section::NotSet }
//!     }
//! }
//!
//! let c = classify(4, Some(1), &Parents, &Tags);
//! assert_eq!(c.section, Section::Body);
//! assert!(c.is_user_control);
//! ```

use understory_view_tree::{NodeId, Tree};

use crate::section::{Section, SectionTags};

/// Parent relation used by [`classify`].
pub trait ParentLookup<K> {
    /// The parent of `node`, or `None` at a root.
    fn parent_of(&self, node: &K) -> Option<K>;
}

/// Section tags used by [`classify`].
pub trait SectionLookup<K> {
    /// The tag of `node`; untagged nodes report [`Section::NotSet`].
    fn section_of(&self, node: &K) -> Section;
}

impl ParentLookup<NodeId> for Tree {
    fn parent_of(&self, node: &NodeId) -> Option<NodeId> {
        Self::parent_of(self, *node)
    }
}

impl SectionLookup<NodeId> for SectionTags {
    fn section_of(&self, node: &NodeId) -> Section {
        self.get(*node)
    }
}

/// Where a tap landed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Classification {
    /// Section containing the tapped node.
    pub section: Section,
    /// `true` if the tapped node itself is untagged.
    pub is_user_control: bool,
}

/// Classify a tapped node.
///
/// The walk does not go above `boundary`; the boundary itself is still checked.
/// With `None` the walk runs to the root.
pub fn classify<K: Copy + Eq>(
    node: K,
    boundary: Option<K>,
    parents: &impl ParentLookup<K>,
    sections: &impl SectionLookup<K>,
) -> Classification {
    let is_user_control = sections.section_of(&node) == Section::NotSet;
    let mut section = Section::Backdrop;
    if Some(node) != boundary {
        let mut cur = parents.parent_of(&node);
        while let Some(n) = cur {
            let tag = sections.section_of(&n);
            if tag.is_content() {
                section = tag;
                break;
            }
            if Some(n) == boundary {
                break;
            }
            cur = parents.parent_of(&n);
        }
    }
    Classification {
        section,
        is_user_control,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashbrown::HashMap;

    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    struct Node(u32);

    #[derive(Default)]
    struct Model {
        parents: HashMap<Node, Node>,
        tags: HashMap<Node, Section>,
    }

    impl Model {
        fn child(&mut self, parent: Node, child: Node, tag: Section) {
            self.parents.insert(child, parent);
            self.tags.insert(child, tag);
        }
    }

    impl ParentLookup<Node> for Model {
        fn parent_of(&self, node: &Node) -> Option<Node> {
            self.parents.get(node).copied()
        }
    }

    impl SectionLookup<Node> for Model {
        fn section_of(&self, node: &Node) -> Section {
            self.tags.get(node).copied().unwrap_or_default()
        }
    }

    // host(0) → popup root(1) → backdrop(2) → container(3) → {header(4), body(5), border(6)}
    fn popup() -> Model {
        let mut m = Model::default();
        m.child(Node(0), Node(1), Section::NotSet);
        m.child(Node(1), Node(2), Section::Backdrop);
        m.child(Node(2), Node(3), Section::NotSet);
        m.child(Node(3), Node(4), Section::Header);
        m.child(Node(3), Node(5), Section::Body);
        m.child(Node(3), Node(6), Section::Border);
        m
    }

    #[test]
    fn body_wins_at_any_depth() {
        let mut m = popup();
        let mut parent = Node(5);
        for i in 10..20 {
            m.child(parent, Node(i), Section::NotSet);
            parent = Node(i);
        }
        for i in 10..20 {
            let c = classify(Node(i), Some(Node(1)), &m, &m);
            assert_eq!(c.section, Section::Body, "depth {}", i - 9);
            assert!(c.is_user_control);
        }
    }

    #[test]
    fn header_content_is_header() {
        let mut m = popup();
        m.child(Node(4), Node(40), Section::NotSet);
        let c = classify(Node(40), Some(Node(1)), &m, &m);
        assert_eq!(c.section, Section::Header);
    }

    #[test]
    fn border_and_backdrop_resolve_to_backdrop() {
        let m = popup();
        let border = classify(Node(6), Some(Node(1)), &m, &m);
        assert_eq!(border.section, Section::Backdrop);
        assert!(!border.is_user_control);

        let backdrop = classify(Node(2), Some(Node(1)), &m, &m);
        assert_eq!(backdrop.section, Section::Backdrop);
        assert!(!backdrop.is_user_control);
    }

    #[test]
    fn slot_itself_starts_walk_at_parent() {
        let m = popup();
        let c = classify(Node(5), Some(Node(1)), &m, &m);
        assert_eq!(c.section, Section::Backdrop);
        assert!(!c.is_user_control);
    }

    #[test]
    fn walk_stops_at_boundary() {
        let mut m = popup();
        // A content tag above the popup root must not leak into the popup.
        m.tags.insert(Node(0), Section::Body);
        let c = classify(Node(3), Some(Node(1)), &m, &m);
        assert_eq!(c.section, Section::Backdrop);

        let unbounded = classify(Node(3), None, &m, &m);
        assert_eq!(unbounded.section, Section::Body);
    }

    #[test]
    fn boundary_node_itself_is_backdrop() {
        let m = popup();
        let c = classify(Node(1), Some(Node(1)), &m, &m);
        assert_eq!(c.section, Section::Backdrop);
        assert!(c.is_user_control);
    }

    #[test]
    fn works_on_view_tree() {
        use understory_view_tree::LocalNode;

        let mut tree = Tree::new();
        let mut tags = SectionTags::new();
        let root = tree.insert(None, LocalNode::default());
        let footer = tree.insert(Some(root), LocalNode::default());
        let label = tree.insert(Some(footer), LocalNode::default());
        tags.tag(footer, Section::Footer);

        let c = classify(label, Some(root), &tree, &tags);
        assert_eq!(
            c,
            Classification {
                section: Section::Footer,
                is_user_control: true,
            }
        );
    }
}
