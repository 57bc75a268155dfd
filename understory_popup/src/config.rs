// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Construction-time configuration and placement requests.

use understory_view_tree::FractionalRect;

/// Chrome proportions, fixed when a popup is built.
///
/// All values are fractions of the popup's content area.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PopupConfig {
    /// Thickness of each border strip.
    pub border_thickness: f64,
    /// Height of the header slot while it holds content.
    pub header_height: f64,
    /// Height of the footer slot while it holds content.
    pub footer_height: f64,
}

impl Default for PopupConfig {
    fn default() -> Self {
        Self {
            border_thickness: 0.005,
            header_height: 0.15,
            footer_height: 0.15,
        }
    }
}

/// Where a popup's content sits inside its host, as fractions of the host's bounds.
///
/// `x` and `y` are proportional positions: `0.5` centers the content, `0.0` and
/// `1.0` align it with the leading and trailing edges. Every field is clamped
/// to `[0, 1]`.
///
/// ```
/// use understory_popup::PlacementRequest;
///
/// let dialog = PlacementRequest::centered(0.8, 0.5);
/// assert_eq!(dialog, PlacementRequest::new(0.5, 0.5, 0.8, 0.5));
///
/// let clamped = PlacementRequest::new(-1.0, 0.25, 2.0, 0.5);
/// assert_eq!((clamped.x, clamped.width), (0.0, 1.0));
/// ```
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PlacementRequest {
    /// Proportional horizontal position.
    pub x: f64,
    /// Proportional vertical position.
    pub y: f64,
    /// Content width as a fraction of the host's width.
    pub width: f64,
    /// Content height as a fraction of the host's height.
    pub height: f64,
}

impl PlacementRequest {
    /// Create a request, clamping every field to `[0, 1]`.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x: unit(x),
            y: unit(y),
            width: unit(width),
            height: unit(height),
        }
    }

    /// Content of the given size centered in the host.
    pub fn centered(width: f64, height: f64) -> Self {
        Self::new(0.5, 0.5, width, height)
    }

    /// Replace the horizontal position.
    pub fn with_x(self, x: f64) -> Self {
        Self { x: unit(x), ..self }
    }

    /// Replace the vertical position.
    pub fn with_y(self, y: f64) -> Self {
        Self { y: unit(y), ..self }
    }

    /// Replace the width.
    pub fn with_width(self, width: f64) -> Self {
        Self {
            width: unit(width),
            ..self
        }
    }

    /// Replace the height.
    pub fn with_height(self, height: f64) -> Self {
        Self {
            height: unit(height),
            ..self
        }
    }

    /// The placement rectangle applied to the popup's section container.
    pub fn to_rect(self) -> FractionalRect {
        FractionalRect::new(self.x, self.y, self.width, self.height)
    }
}

fn unit(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}
