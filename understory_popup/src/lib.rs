// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Popup: overlay popups for a retained-mode view tree.
//!
//! A popup is a floating panel shown above a host page without touching the
//! page's navigation state. This crate decides *when* a popup shows or hides and
//! *where* a tap on it landed. Drawing, easing curves and theming belong to the
//! embedding toolkit.
//!
//! - [`Popup`]: chrome (backdrop, section container, header/body/footer slots,
//!   border strips), fractional placement, and a show/hide lifecycle with
//!   cancellable [`ShowingEvent`]/[`HidingEvent`] phases and optional async
//!   animation hooks.
//! - [`classify()`]: walks from a tapped node toward the popup root and reports the
//!   enclosing [`Section`] and whether the node is application content.
//! - [`attach_tap_capture`]: wires a whole subtree for tap capture.
//! - [`OverlayInjector`]: wraps a [`Page`]'s content in an overlay the first time
//!   it is assigned, and inserts registered popups on appearance.
//! - [`Scene`]: the shared [`understory_view_tree::Tree`] plus section tags and
//!   viewport, with [`Scene::tap`] and [`Scene::tap_at`] for input delivery.
//! - [`Event`]: synchronous listener lists used for every signal.
//!
//! ## Example
//!
//! ```
//! use kurbo::{Point, Rect};
//! use understory_popup::{OverlayInjector, Page, PlacementRequest, Popup, Scene, Section};
//! use understory_view_tree::LocalNode;
//!
//! let scene = Scene::new(Rect::new(0.0, 0.0, 200.0, 200.0));
//! let page = Page::new(&scene);
//!
//! let popup = Popup::new(&scene);
//! popup.set_placement(PlacementRequest::centered(0.5, 0.5));
//! let button = scene.insert(None, LocalNode::default());
//! popup.set_body(Some(button)).unwrap();
//! popup.tapped().subscribe(|e| {
//!     if e.section == Section::Backdrop {
//!         e.popup.hide();
//!     }
//! });
//!
//! let injector = OverlayInjector::new(&page).unwrap();
//! injector.add(&popup).unwrap();
//! page.set_content(scene.insert(None, LocalNode::default())).unwrap();
//! page.appear();
//!
//! popup.show();
//! // The body stays open...
//! assert_eq!(scene.tap_at(Point::new(100.0, 100.0)), Some(button));
//! assert!(popup.is_visible());
//! // ...the backdrop closes it.
//! scene.tap_at(Point::new(10.0, 10.0));
//! assert!(!popup.is_visible());
//! ```
//!
//! ## Threading
//!
//! Everything here is single-threaded and meant to run on the UI thread. Handles
//! are reference counted with [`std::rc::Rc`], and show/hide futures are not `Send`.
//! Drive animated transitions with a local executor.
//!
//! ## Logging
//!
//! Lifecycle transitions, overlay substitution and popup insertion are logged
//! with [`tracing`] at `debug`, tap classification at `trace`. Failures inside
//! signal listeners, where no caller can receive a `Result`, are logged at
//! `error`. No subscriber is installed.

pub mod classify;
mod config;
mod error;
mod event;
mod injector;
mod page;
mod popup;
mod scene;
mod section;
mod visitor;

pub use classify::{Classification, classify};
pub use config::{PlacementRequest, PopupConfig};
pub use error::{AnimationError, PopupError};
pub use event::{Event, ListenerId};
pub use injector::OverlayInjector;
pub use page::{AppearingEvent, ChildAddedEvent, DisappearingEvent, Page};
pub use popup::{
    Animation, BorderSide, Color, HiddenEvent, HidingEvent, InitializingEvent, Popup,
    ShowingEvent, ShownEvent, TapEvent, Transition, animation,
};
pub use scene::Scene;
pub use section::{Section, SectionTags};
pub use visitor::attach_tap_capture;
