// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Gesture recognizers attached to nodes.
//!
//! Recognition is per node: a tap delivered to a node runs that node's tap
//! commands only, it does not bubble to ancestors. Callers that want a whole
//! subtree to react attach a recognizer to every node in it.

use alloc::rc::Rc;
use core::fmt;

use kurbo::Vec2;

use crate::types::NodeId;

/// Command run when a tap is recognized. Receives the gesture's bound parameter.
pub type TapCommand = Rc<dyn Fn(NodeId)>;

/// Command run while a pan is in progress. Receives the bound parameter and the total offset.
pub type PanCommand = Rc<dyn Fn(NodeId, Vec2)>;

/// A recognizer attached to a node.
#[derive(Clone, Debug)]
pub enum Gesture {
    /// Recognizes taps.
    Tap(TapGesture),
    /// Recognizes drags.
    Pan(PanGesture),
}

impl Gesture {
    /// Returns the tap recognizer, if this is one.
    pub fn as_tap(&self) -> Option<&TapGesture> {
        match self {
            Self::Tap(tap) => Some(tap),
            Self::Pan(_) => None,
        }
    }
}

/// Tap recognizer.
#[derive(Clone)]
pub struct TapGesture {
    /// Command to run; a recognizer without a command recognizes but does nothing.
    pub command: Option<TapCommand>,
    /// Parameter passed to the command. `None` passes the node the tap was delivered to.
    pub parameter: Option<NodeId>,
    /// Number of taps needed to trigger the command.
    pub taps_required: u32,
}

impl TapGesture {
    /// Create a single-tap recognizer running `command`.
    pub fn new(command: impl Fn(NodeId) + 'static) -> Self {
        Self {
            command: Some(Rc::new(command)),
            parameter: None,
            taps_required: 1,
        }
    }

    /// Bind the parameter passed to the command.
    pub fn with_parameter(mut self, node: NodeId) -> Self {
        self.parameter = Some(node);
        self
    }
}

impl fmt::Debug for TapGesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TapGesture")
            .field("has_command", &self.command.is_some())
            .field("parameter", &self.parameter)
            .field("taps_required", &self.taps_required)
            .finish()
    }
}

/// Pan recognizer.
#[derive(Clone)]
pub struct PanGesture {
    /// Command to run on every pan update.
    pub command: Option<PanCommand>,
    /// Parameter passed to the command. `None` passes the node the pan was delivered to.
    pub parameter: Option<NodeId>,
    /// Number of touch points needed to start the pan.
    pub touch_points: u32,
}

impl PanGesture {
    /// Create a single-finger pan recognizer running `command`.
    pub fn new(command: impl Fn(NodeId, Vec2) + 'static) -> Self {
        Self {
            command: Some(Rc::new(command)),
            parameter: None,
            touch_points: 1,
        }
    }
}

impl fmt::Debug for PanGesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanGesture")
            .field("has_command", &self.command.is_some())
            .field("parameter", &self.parameter)
            .field("touch_points", &self.touch_points)
            .finish()
    }
}
