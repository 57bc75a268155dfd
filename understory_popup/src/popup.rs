// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The popup control: chrome, content slots, placement and the show/hide lifecycle.
//!
//! ## Chrome
//!
//! Each popup owns a small subtree in its scene:
//!
//! ```text
//! root                      full-bleed, hidden until shown
//! └─ backdrop               Section::Backdrop, full-bleed
//!    └─ section container   placed by the PlacementRequest
//!       ├─ header slot      Section::Header
//!       ├─ body slot        Section::Body
//!       ├─ footer slot      Section::Footer
//!       └─ 4 border strips  Section::Border
//! ```
//!
//! Application content goes into the three slots and is never tagged, which
//! is how taps on it are reported as user controls.
//!
//! ## Lifecycle
//!
//! [`Popup::show`] and [`Popup::hide`] are no-ops when the popup is already in
//! the requested state. Otherwise they raise a cancellable phase event
//! ([`ShowingEvent`] or [`HidingEvent`]); if no listener cancels, visibility
//! flips, the optional animation hook runs, and the terminal event
//! ([`ShownEvent`] or [`HiddenEvent`]) fires exactly once.
//!
//! Transitions are not serialized. While a show animation is in flight a second
//! show is a no-op, but a hide runs to completion immediately; the pending show
//! still raises [`ShownEvent`] once its animation finishes, even though the
//! popup is hidden by then.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::ops::ControlFlow;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};
use hashbrown::HashSet;
use kurbo::{Affine, Vec2};
use understory_view_tree::{
    FractionalEdges, FractionalRect, Gesture, LocalNode, NodeFlags, NodeId, TapCommand,
    TapGesture,
};

use crate::classify::Classification;
use crate::config::{PlacementRequest, PopupConfig};
use crate::error::{AnimationError, PopupError};
use crate::event::Event;
use crate::scene::Scene;
use crate::section::Section;
use crate::visitor::attach_tap_capture_where;

/// An 8-bit RGBA color.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Color {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
    /// Alpha.
    pub a: u8,
}

impl Color {
    /// Fully transparent.
    pub const TRANSPARENT: Self = Self::rgba8(0, 0, 0, 0);
    /// Opaque black.
    pub const BLACK: Self = Self::rgb8(0, 0, 0);
    /// Opaque white.
    pub const WHITE: Self = Self::rgb8(255, 255, 255);

    /// Create a color from components.
    pub const fn rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque color.
    pub const fn rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::rgba8(r, g, b, 255)
    }
}

/// One edge of the content area.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BorderSide {
    /// Left edge.
    Left,
    /// Right edge.
    Right,
    /// Top edge.
    Top,
    /// Bottom edge.
    Bottom,
}

impl BorderSide {
    /// All four sides.
    pub const ALL: [Self; 4] = [Self::Left, Self::Right, Self::Top, Self::Bottom];

    const fn index(self) -> usize {
        self as usize
    }

    fn layout(self, thickness: f64) -> FractionalRect {
        match self {
            Self::Left => FractionalRect::new(0.0, 0.0, thickness, 1.0),
            Self::Right => FractionalRect::new(1.0, 0.0, thickness, 1.0),
            Self::Top => FractionalRect::new(0.0, 0.0, 1.0, thickness),
            Self::Bottom => FractionalRect::new(0.0, 1.0, 1.0, thickness),
        }
    }
}

/// Raised when a node inside a visible popup is tapped.
#[derive(Clone, Debug)]
pub struct TapEvent {
    /// The popup that was tapped.
    pub popup: Popup,
    /// The node the tap was delivered to.
    pub node: NodeId,
    /// Section containing the node.
    pub section: Section,
    /// `true` if the node is application content rather than popup chrome.
    pub is_user_control: bool,
}

/// Raised before a popup becomes visible. Set `cancel` to keep it hidden.
#[derive(Clone, Debug, Default)]
pub struct ShowingEvent {
    /// Veto the transition.
    pub cancel: bool,
}

/// Raised before a popup is hidden. Set `cancel` to keep it visible.
#[derive(Clone, Debug, Default)]
pub struct HidingEvent {
    /// Veto the transition.
    pub cancel: bool,
}

/// Raised once a show transition, including its animation, has completed.
#[derive(Copy, Clone, Debug, Default)]
pub struct ShownEvent;

/// Raised once a hide transition, including its animation, has completed.
#[derive(Copy, Clone, Debug, Default)]
pub struct HiddenEvent;

/// Raised once, right before a popup is displayed for the first time.
#[derive(Copy, Clone, Debug, Default)]
pub struct InitializingEvent;

/// Outcome of a show or hide request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Visibility changed and the terminal event fired.
    Completed,
    /// The popup was already in the requested state.
    Unchanged,
    /// A phase listener vetoed the transition.
    Cancelled,
}

/// Caller-supplied animation run between a visibility change and its terminal event.
///
/// The hook receives the popup so it can drive [`Popup::set_scale`],
/// [`Popup::set_translation`] or [`Popup::set_opacity`].
pub type Animation = Box<dyn FnOnce(Popup) -> LocalBoxFuture<'static, Result<(), AnimationError>>>;

/// Box an async closure as an [`Animation`].
pub fn animation<F, Fut>(f: F) -> Animation
where
    F: FnOnce(Popup) -> Fut + 'static,
    Fut: Future<Output = Result<(), AnimationError>> + 'static,
{
    Box::new(move |popup| f(popup).boxed_local())
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Direction {
    Show,
    Hide,
}

struct PopupInner {
    scene: Scene,
    config: PopupConfig,
    root: NodeId,
    backdrop: NodeId,
    container: NodeId,
    header: NodeId,
    body: NodeId,
    footer: NodeId,
    borders: [NodeId; 4],
    /// Nodes already carrying this popup's tap capture.
    wired: RefCell<HashSet<NodeId>>,
    border_colors: Cell<[Color; 4]>,
    placement: Cell<PlacementRequest>,
    scale: Cell<f64>,
    translation: Cell<Vec2>,
    opacity: Cell<f64>,
    visible: Cell<bool>,
    initialized: Cell<bool>,
    animating: Cell<usize>,
    tapped: Event<TapEvent>,
    initializing: Event<InitializingEvent>,
    showing: Event<ShowingEvent>,
    shown: Event<ShownEvent>,
    hiding: Event<HidingEvent>,
    hidden: Event<HiddenEvent>,
}

/// A floating panel shown above a host page.
///
/// `Popup` is a cheap handle; clones refer to the same popup. Equality is identity.
///
/// ```
/// use kurbo::Rect;
/// use understory_popup::{Popup, PlacementRequest, Scene, Section, Transition};
/// use understory_view_tree::LocalNode;
///
/// let scene = Scene::new(Rect::new(0.0, 0.0, 400.0, 300.0));
/// let popup = Popup::new(&scene);
/// popup.set_placement(PlacementRequest::centered(0.8, 0.5));
///
/// let message = scene.insert(None, LocalNode::default());
/// popup.set_body(Some(message)).unwrap();
/// popup.initialize().unwrap();
///
/// popup.tapped().subscribe(|e| {
///     if e.section == Section::Backdrop {
///         e.popup.hide();
///     }
/// });
///
/// assert_eq!(popup.show(), Transition::Completed);
/// scene.tap(popup.backdrop());
/// assert!(!popup.is_visible());
/// ```
#[derive(Clone)]
pub struct Popup {
    inner: Rc<PopupInner>,
}

impl Popup {
    /// Create a hidden popup with default chrome proportions.
    pub fn new(scene: &Scene) -> Self {
        Self::with_config(scene, PopupConfig::default())
    }

    /// Create a hidden popup.
    ///
    /// The popup's root starts out as a root of `scene`; an
    /// [`OverlayInjector`](crate::OverlayInjector) moves it into a host's overlay.
    pub fn with_config(scene: &Scene, config: PopupConfig) -> Self {
        let placement = PlacementRequest::default();
        let root = scene.insert(
            None,
            LocalNode {
                flags: NodeFlags::empty(),
                ..LocalNode::default()
            },
        );
        let backdrop = scene.insert(Some(root), LocalNode::default());
        let container = scene.insert(
            Some(backdrop),
            LocalNode {
                layout: placement.to_rect().into(),
                flags: NodeFlags::VISIBLE,
                ..LocalNode::default()
            },
        );
        let header = scene.insert(Some(container), LocalNode::default());
        let body = scene.insert(Some(container), LocalNode::default());
        let footer = scene.insert(Some(container), LocalNode::default());
        let borders = BorderSide::ALL.map(|side| {
            scene.insert(
                Some(container),
                LocalNode {
                    layout: side.layout(config.border_thickness).into(),
                    ..LocalNode::default()
                },
            )
        });

        scene.tag(backdrop, Section::Backdrop);
        scene.tag(header, Section::Header);
        scene.tag(body, Section::Body);
        scene.tag(footer, Section::Footer);
        for border in borders {
            scene.tag(border, Section::Border);
        }

        let popup = Self {
            inner: Rc::new(PopupInner {
                scene: scene.clone(),
                config,
                root,
                backdrop,
                container,
                header,
                body,
                footer,
                borders,
                wired: RefCell::new(HashSet::new()),
                border_colors: Cell::new([Color::TRANSPARENT; 4]),
                placement: Cell::new(placement),
                scale: Cell::new(1.0),
                translation: Cell::new(Vec2::ZERO),
                opacity: Cell::new(1.0),
                visible: Cell::new(false),
                initialized: Cell::new(false),
                animating: Cell::new(0),
                tapped: Event::new(),
                initializing: Event::new(),
                showing: Event::new(),
                shown: Event::new(),
                hiding: Event::new(),
                hidden: Event::new(),
            }),
        };
        popup.restack();
        popup
    }

    /// The scene this popup lives in.
    pub fn scene(&self) -> &Scene {
        &self.inner.scene
    }

    /// Chrome proportions.
    pub fn config(&self) -> PopupConfig {
        self.inner.config
    }

    /// Root node of the popup's subtree. Visible exactly while the popup is shown.
    pub fn root(&self) -> NodeId {
        self.inner.root
    }

    /// Full-bleed backdrop node.
    pub fn backdrop(&self) -> NodeId {
        self.inner.backdrop
    }

    /// Container holding the slots and border strips.
    pub fn section_container(&self) -> NodeId {
        self.inner.container
    }

    /// The slot node for a content section, or `None` for other sections.
    pub fn slot(&self, section: Section) -> Option<NodeId> {
        match section {
            Section::Header => Some(self.inner.header),
            Section::Body => Some(self.inner.body),
            Section::Footer => Some(self.inner.footer),
            Section::NotSet | Section::Border | Section::Backdrop => None,
        }
    }

    /// The border strip node on `side`.
    pub fn border_node(&self, side: BorderSide) -> NodeId {
        self.inner.borders[side.index()]
    }

    /// Returns `true` while the popup's root is live in its scene.
    pub fn is_alive(&self) -> bool {
        self.inner.scene.is_alive(self.inner.root)
    }

    /// Returns `true` if both handles refer to the same popup.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // --- content ---

    /// Header content.
    pub fn header(&self) -> Option<NodeId> {
        self.content_of(self.inner.header)
    }

    /// Body content.
    pub fn body(&self) -> Option<NodeId> {
        self.content_of(self.inner.body)
    }

    /// Footer content.
    pub fn footer(&self) -> Option<NodeId> {
        self.content_of(self.inner.footer)
    }

    /// What a slot holds right now, read from the tree.
    ///
    /// Content moved elsewhere, whether into another slot, another popup or out
    /// of the scene, stops being reported here.
    fn content_of(&self, slot: NodeId) -> Option<NodeId> {
        self.inner
            .scene
            .with_tree(|tree| tree.children_of(slot).first().copied())
    }

    /// Replace the header content. Returns the content it replaced.
    pub fn set_header(&self, content: Option<NodeId>) -> Result<Option<NodeId>, PopupError> {
        self.replace_content(self.inner.header, content)
    }

    /// Replace the body content. Returns the content it replaced.
    pub fn set_body(&self, content: Option<NodeId>) -> Result<Option<NodeId>, PopupError> {
        self.replace_content(self.inner.body, content)
    }

    /// Replace the footer content. Returns the content it replaced.
    pub fn set_footer(&self, content: Option<NodeId>) -> Result<Option<NodeId>, PopupError> {
        self.replace_content(self.inner.footer, content)
    }

    /// Move `content` into `slot`, detaching whatever the slot held before.
    ///
    /// Replaced content becomes a root of the scene and is left to the caller.
    /// Content taken from another slot leaves that slot empty.
    fn replace_content(
        &self,
        slot: NodeId,
        content: Option<NodeId>,
    ) -> Result<Option<NodeId>, PopupError> {
        let previous = self.content_of(slot);
        if previous == content {
            return Ok(None);
        }
        if let Some(node) = content {
            self.inner.scene.with_tree(|tree| {
                if !tree.is_alive(node) {
                    Err(PopupError::StaleNode(node))
                } else if node == slot || tree.ancestors(slot).any(|a| a == node) {
                    Err(PopupError::WouldCycle(node))
                } else {
                    Ok(())
                }
            })?;
        }
        self.inner.scene.with_tree_mut(|tree| {
            if let Some(old) = previous {
                tree.reparent(old, None);
            }
            if let Some(node) = content {
                tree.reparent(node, Some(slot));
                tree.set_layout(node, FractionalRect::FULL);
            }
        });
        self.restack();
        if let Some(node) = content
            && self.inner.initialized.get()
        {
            self.wire(node)?;
        }
        Ok(previous)
    }

    /// Stack the slots vertically: header and footer take their configured
    /// height while they hold content, the body takes the rest.
    fn restack(&self) {
        let inner = &*self.inner;
        let top = if self.header().is_some() {
            inner.config.header_height
        } else {
            0.0
        };
        let bottom = if self.footer().is_some() {
            (1.0 - inner.config.footer_height).max(top)
        } else {
            1.0
        };
        inner.scene.with_tree_mut(|tree| {
            tree.set_layout(inner.header, FractionalEdges::new(0.0, 0.0, 1.0, top));
            tree.set_layout(inner.body, FractionalEdges::new(0.0, top, 1.0, bottom));
            tree.set_layout(inner.footer, FractionalEdges::new(0.0, bottom, 1.0, 1.0));
        });
    }

    // --- borders ---

    /// Color of the border strip on `side`. Defaults to [`Color::TRANSPARENT`].
    pub fn border_color(&self, side: BorderSide) -> Color {
        self.inner.border_colors.get()[side.index()]
    }

    /// Set the color of one border strip.
    pub fn set_border_color(&self, side: BorderSide, color: Color) {
        let mut colors = self.inner.border_colors.get();
        colors[side.index()] = color;
        self.inner.border_colors.set(colors);
    }

    /// Set all four border colors.
    pub fn set_border_colors(&self, color: Color) {
        self.inner.border_colors.set([color; 4]);
    }

    // --- placement ---

    /// Current placement request.
    pub fn placement(&self) -> PlacementRequest {
        self.inner.placement.get()
    }

    /// The placement rectangle applied to the section container.
    pub fn placement_rect(&self) -> FractionalRect {
        self.placement().to_rect()
    }

    /// Replace all four placement fractions at once.
    ///
    /// The rectangle is applied to the section container. The popup's root stays
    /// full-bleed inside its host so the backdrop keeps covering the host.
    pub fn set_placement(&self, placement: PlacementRequest) {
        let placement =
            PlacementRequest::new(placement.x, placement.y, placement.width, placement.height);
        self.inner.placement.set(placement);
        let container = self.inner.container;
        self.inner
            .scene
            .with_tree_mut(|tree| tree.set_layout(container, placement.to_rect()));
    }

    /// Proportional horizontal position of the content.
    pub fn x_position(&self) -> f64 {
        self.placement().x
    }

    /// Proportional vertical position of the content.
    pub fn y_position(&self) -> f64 {
        self.placement().y
    }

    /// Content width as a fraction of the host.
    pub fn content_width(&self) -> f64 {
        self.placement().width
    }

    /// Content height as a fraction of the host.
    pub fn content_height(&self) -> f64 {
        self.placement().height
    }

    /// Set the proportional horizontal position.
    pub fn set_x_position(&self, x: f64) {
        self.set_placement(self.placement().with_x(x));
    }

    /// Set the proportional vertical position.
    pub fn set_y_position(&self, y: f64) {
        self.set_placement(self.placement().with_y(y));
    }

    /// Set the content width.
    pub fn set_content_width(&self, width: f64) {
        self.set_placement(self.placement().with_width(width));
    }

    /// Set the content height.
    pub fn set_content_height(&self, height: f64) {
        self.set_placement(self.placement().with_height(height));
    }

    // --- presentation ---

    /// Uniform scale of the whole popup, about its center.
    pub fn scale(&self) -> f64 {
        self.inner.scale.get()
    }

    /// Set the uniform scale.
    pub fn set_scale(&self, scale: f64) {
        self.inner.scale.set(scale);
        self.apply_transform();
    }

    /// Translation of the whole popup.
    pub fn translation(&self) -> Vec2 {
        self.inner.translation.get()
    }

    /// Set the translation.
    pub fn set_translation(&self, translation: Vec2) {
        self.inner.translation.set(translation);
        self.apply_transform();
    }

    /// Combined render transform applied to the popup's root.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.translation()) * Affine::scale(self.scale())
    }

    fn apply_transform(&self) {
        let (root, transform) = (self.inner.root, self.transform());
        self.inner
            .scene
            .with_tree_mut(|tree| tree.set_transform(root, transform));
    }

    /// Opacity of the whole popup.
    pub fn opacity(&self) -> f64 {
        self.inner.opacity.get()
    }

    /// Set the opacity, clamped to `[0, 1]`.
    pub fn set_opacity(&self, opacity: f64) {
        let opacity = opacity.clamp(0.0, 1.0);
        self.inner.opacity.set(opacity);
        let root = self.inner.root;
        self.inner
            .scene
            .with_tree_mut(|tree| tree.set_opacity(root, opacity));
    }

    // --- events ---

    /// Raised for taps on any node of a visible popup.
    pub fn tapped(&self) -> &Event<TapEvent> {
        &self.inner.tapped
    }

    /// Raised once, by [`Popup::initialize`].
    pub fn initializing(&self) -> &Event<InitializingEvent> {
        &self.inner.initializing
    }

    /// Cancellable phase before showing.
    pub fn showing(&self) -> &Event<ShowingEvent> {
        &self.inner.showing
    }

    /// Terminal event of a show transition.
    pub fn shown(&self) -> &Event<ShownEvent> {
        &self.inner.shown
    }

    /// Cancellable phase before hiding.
    pub fn hiding(&self) -> &Event<HidingEvent> {
        &self.inner.hiding
    }

    /// Terminal event of a hide transition.
    pub fn hidden(&self) -> &Event<HiddenEvent> {
        &self.inner.hidden
    }

    // --- initialization and taps ---

    /// Returns `true` once [`Popup::initialize`] has run.
    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.get()
    }

    /// Wire every node of the popup for tap capture, then raise [`InitializingEvent`].
    ///
    /// Runs once; later calls return `Ok(false)`. Content assigned afterwards is
    /// wired as it arrives.
    pub fn initialize(&self) -> Result<bool, PopupError> {
        if self.inner.initialized.get() {
            return Ok(false);
        }
        if !self.is_alive() {
            return Err(PopupError::PopupNotAlive);
        }
        let wired = self.wire(self.inner.backdrop)?;
        self.inner.initialized.set(true);
        tracing::debug!(root = ?self.inner.root, wired, "popup initialized");
        self.inner.initializing.emit(&mut InitializingEvent);
        Ok(true)
    }

    /// Attach tap capture below `node`, skipping nodes this popup already wired.
    fn wire(&self, node: NodeId) -> Result<usize, PopupError> {
        let weak = Rc::downgrade(&self.inner);
        let command: TapCommand = Rc::new(move |tapped| {
            if let Some(inner) = weak.upgrade() {
                Self { inner }.handle_tap(tapped);
            }
        });
        self.inner.scene.with_tree_mut(|tree| {
            let mut wired = self.inner.wired.borrow_mut();
            let attached = attach_tap_capture_where(
                tree,
                node,
                |n| !wired.contains(&n),
                || {
                    Gesture::Tap(TapGesture {
                        command: Some(Rc::clone(&command)),
                        parameter: None,
                        taps_required: 1,
                    })
                },
            )?;
            wired.extend(tree.descendants(node));
            Ok(attached)
        })
    }

    fn handle_tap(&self, node: NodeId) {
        if !self.inner.visible.get() {
            tracing::trace!(?node, "tap ignored while popup is hidden");
            return;
        }
        let root = self.inner.root;
        let scene = &self.inner.scene;
        if !scene.with_tree(|tree| tree.ancestors(node).any(|a| a == root)) {
            tracing::trace!(?node, "tap on node no longer inside the popup");
            return;
        }
        let Classification {
            section,
            is_user_control,
        } = scene.classify(node, Some(root));
        tracing::trace!(?node, ?section, is_user_control, "popup tapped");
        self.inner.tapped.emit(&mut TapEvent {
            popup: self.clone(),
            node,
            section,
            is_user_control,
        });
    }

    // --- lifecycle ---

    /// Returns `true` while the popup is shown.
    pub fn is_visible(&self) -> bool {
        self.inner.visible.get()
    }

    /// Returns `true` while a show or hide animation hook is running.
    pub fn is_animating(&self) -> bool {
        self.inner.animating.get() > 0
    }

    /// Show the popup without animation.
    pub fn show(&self) -> Transition {
        self.transition_now(Direction::Show)
    }

    /// Hide the popup without animation.
    pub fn hide(&self) -> Transition {
        self.transition_now(Direction::Hide)
    }

    /// Show the popup, awaiting `animation` before raising [`ShownEvent`].
    ///
    /// If the hook fails the popup stays visible, [`ShownEvent`] is not raised and
    /// the hook's error is returned as [`PopupError::Animation`].
    pub async fn show_with(&self, animation: Option<Animation>) -> Result<Transition, PopupError> {
        self.transition(Direction::Show, animation).await
    }

    /// Hide the popup, awaiting `animation` before raising [`HiddenEvent`].
    ///
    /// If the hook fails the popup stays hidden, [`HiddenEvent`] is not raised and
    /// the hook's error is returned as [`PopupError::Animation`].
    pub async fn hide_with(&self, animation: Option<Animation>) -> Result<Transition, PopupError> {
        self.transition(Direction::Hide, animation).await
    }

    /// Show the popup with an async animation closure. See [`Popup::show_with`].
    pub async fn show_animated<F, Fut>(&self, f: F) -> Result<Transition, PopupError>
    where
        F: FnOnce(Self) -> Fut + 'static,
        Fut: Future<Output = Result<(), AnimationError>> + 'static,
    {
        self.show_with(Some(animation(f))).await
    }

    /// Hide the popup with an async animation closure. See [`Popup::hide_with`].
    pub async fn hide_animated<F, Fut>(&self, f: F) -> Result<Transition, PopupError>
    where
        F: FnOnce(Self) -> Fut + 'static,
        Fut: Future<Output = Result<(), AnimationError>> + 'static,
    {
        self.hide_with(Some(animation(f))).await
    }

    fn transition_now(&self, direction: Direction) -> Transition {
        match self.begin(direction) {
            ControlFlow::Break(outcome) => outcome,
            ControlFlow::Continue(()) => {
                self.finish(direction);
                Transition::Completed
            }
        }
    }

    async fn transition(
        &self,
        direction: Direction,
        animation: Option<Animation>,
    ) -> Result<Transition, PopupError> {
        if let ControlFlow::Break(outcome) = self.begin(direction) {
            return Ok(outcome);
        }
        if let Some(animation) = animation {
            let _animating = Animating::enter(&self.inner.animating);
            if let Err(err) = animation(self.clone()).await {
                tracing::warn!(?direction, "popup animation failed: {}", err);
                return Err(PopupError::Animation(err));
            }
        }
        self.finish(direction);
        Ok(Transition::Completed)
    }

    /// Raise the phase event and flip visibility unless vetoed.
    fn begin(&self, direction: Direction) -> ControlFlow<Transition> {
        let target = direction == Direction::Show;
        if self.inner.visible.get() == target {
            tracing::trace!(?direction, "popup already in requested state");
            return ControlFlow::Break(Transition::Unchanged);
        }
        let root = self.inner.root;
        if target
            && self
                .inner
                .scene
                .with_tree_mut(|tree| !tree.is_topmost(root) && tree.raise_to_front(root))
        {
            tracing::trace!(?root, "popup raised above its siblings");
        }
        let cancelled = match direction {
            Direction::Show => {
                let mut args = ShowingEvent::default();
                self.inner.showing.emit(&mut args);
                args.cancel
            }
            Direction::Hide => {
                let mut args = HidingEvent::default();
                self.inner.hiding.emit(&mut args);
                args.cancel
            }
        };
        if cancelled {
            tracing::debug!(?direction, "popup transition cancelled");
            return ControlFlow::Break(Transition::Cancelled);
        }
        self.inner.visible.set(target);
        self.inner
            .scene
            .with_tree_mut(|tree| tree.set_visible(root, target));
        tracing::debug!(?direction, ?root, "popup visibility changed");
        ControlFlow::Continue(())
    }

    fn finish(&self, direction: Direction) {
        match direction {
            Direction::Show => self.inner.shown.emit(&mut ShownEvent),
            Direction::Hide => self.inner.hidden.emit(&mut HiddenEvent),
        }
        tracing::debug!(?direction, "popup transition completed");
    }
}

/// Counts in-flight animation hooks; decrements even if the future is dropped.
struct Animating<'a>(&'a Cell<usize>);

impl<'a> Animating<'a> {
    fn enter(count: &'a Cell<usize>) -> Self {
        count.set(count.get() + 1);
        Self(count)
    }
}

impl Drop for Animating<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

impl PartialEq for Popup {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Popup {}

impl fmt::Debug for Popup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Popup")
            .field("root", &self.inner.root)
            .field("visible", &self.inner.visible.get())
            .field("initialized", &self.inner.initialized.get())
            .field("animating", &self.inner.animating.get())
            .field("placement", &self.inner.placement.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::oneshot;
    use futures::executor::block_on;
    use futures::task::noop_waker;
    use kurbo::{Point, Rect};
    use std::cell::RefCell;
    use std::pin::pin;
    use std::task::{Context, Poll};
    use understory_view_tree::Layout;

    const VIEWPORT: Rect = Rect::new(0.0, 0.0, 100.0, 100.0);

    #[derive(Default)]
    struct Counts {
        showing: Cell<u32>,
        shown: Cell<u32>,
        hiding: Cell<u32>,
        hidden: Cell<u32>,
    }

    fn bump(c: &Cell<u32>) {
        c.set(c.get() + 1);
    }

    fn counted(popup: &Popup) -> Rc<Counts> {
        let counts = Rc::new(Counts::default());
        let c = Rc::clone(&counts);
        popup.showing().subscribe(move |_| bump(&c.showing));
        let c = Rc::clone(&counts);
        popup.shown().subscribe(move |_| bump(&c.shown));
        let c = Rc::clone(&counts);
        popup.hiding().subscribe(move |_| bump(&c.hiding));
        let c = Rc::clone(&counts);
        popup.hidden().subscribe(move |_| bump(&c.hidden));
        counts
    }

    fn leaf(scene: &Scene) -> NodeId {
        scene.insert(None, LocalNode::default())
    }

    #[test]
    fn starts_hidden_with_transparent_borders() {
        let scene = Scene::new(VIEWPORT);
        let popup = Popup::new(&scene);
        assert!(!popup.is_visible());
        assert!(!scene.with_tree(|t| t.is_rendered(popup.backdrop())));
        for side in BorderSide::ALL {
            assert_eq!(popup.border_color(side), Color::TRANSPARENT);
            assert_eq!(scene.section_of(popup.border_node(side)), Section::Border);
        }
        assert_eq!(scene.section_of(popup.backdrop()), Section::Backdrop);
        assert_eq!(scene.section_of(popup.section_container()), Section::NotSet);
        assert_eq!(popup.slot(Section::Border), None);
    }

    #[test]
    fn show_while_visible_changes_nothing() {
        let scene = Scene::new(VIEWPORT);
        let popup = Popup::new(&scene);
        let body = leaf(&scene);
        popup.set_body(Some(body)).unwrap();
        let counts = counted(&popup);

        assert_eq!(popup.show(), Transition::Completed);
        assert_eq!((counts.showing.get(), counts.shown.get()), (1, 1));

        assert_eq!(popup.show(), Transition::Unchanged);
        assert!(popup.is_visible());
        assert_eq!(popup.body(), Some(body));
        assert_eq!((counts.showing.get(), counts.shown.get()), (1, 1));
    }

    #[test]
    fn cancelled_showing_never_shows() {
        let scene = Scene::new(VIEWPORT);
        let popup = Popup::new(&scene);
        let counts = counted(&popup);
        popup.showing().subscribe(|e| e.cancel = true);

        assert_eq!(popup.show(), Transition::Cancelled);
        assert!(!popup.is_visible());
        assert!(!scene.with_tree(|t| t.is_rendered(popup.root())));

        assert_eq!(popup.hide(), Transition::Unchanged);
        assert_eq!(counts.shown.get(), 0);
        assert_eq!(counts.hiding.get(), 0);
        assert_eq!(counts.hidden.get(), 0);

        let result = block_on(popup.show_animated(
            |_| -> std::future::Ready<Result<(), AnimationError>> {
                panic!("animation must not run when cancelled")
            },
        ));
        assert_eq!(result.unwrap(), Transition::Cancelled);
    }

    #[test]
    fn cancelled_hiding_keeps_popup_visible() {
        let scene = Scene::new(VIEWPORT);
        let popup = Popup::new(&scene);
        let counts = counted(&popup);
        popup.show();
        let veto = popup.hiding().subscribe(|e| e.cancel = true);

        assert_eq!(popup.hide(), Transition::Cancelled);
        assert!(popup.is_visible());
        assert_eq!(counts.hidden.get(), 0);

        popup.hiding().unsubscribe(veto);
        assert_eq!(popup.hide(), Transition::Completed);
        assert!(!popup.is_visible());
        assert_eq!((counts.hiding.get(), counts.hidden.get()), (2, 1));
    }

    #[test]
    fn show_raises_popup_above_siblings() {
        let scene = Scene::new(VIEWPORT);
        let host = leaf(&scene);
        let first = Popup::new(&scene);
        let second = Popup::new(&scene);
        scene.with_tree_mut(|t| {
            t.reparent(first.root(), Some(host));
            t.reparent(second.root(), Some(host));
        });
        assert!(!scene.with_tree(|t| t.is_topmost(first.root())));

        first.show();
        assert!(scene.with_tree(|t| t.is_topmost(first.root())));
        assert_eq!(
            scene.with_tree(|t| t.children_of(host).to_vec()),
            vec![second.root(), first.root()]
        );
    }

    #[test]
    fn animation_runs_between_visibility_change_and_shown() {
        let scene = Scene::new(VIEWPORT);
        let popup = Popup::new(&scene);
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        popup.showing().subscribe(move |_| l.borrow_mut().push("showing"));
        let l = Rc::clone(&log);
        popup.shown().subscribe(move |_| l.borrow_mut().push("shown"));

        let l = Rc::clone(&log);
        let result = block_on(popup.show_animated(move |p| async move {
            assert!(p.is_visible(), "visibility flips before the hook runs");
            assert!(p.is_animating());
            p.set_scale(0.5);
            p.set_scale(1.0);
            l.borrow_mut().push("animation");
            Ok::<(), AnimationError>(())
        }));

        assert_eq!(result.unwrap(), Transition::Completed);
        assert!(!popup.is_animating());
        assert_eq!(*log.borrow(), vec!["showing", "animation", "shown"]);
    }

    #[test]
    fn animation_failure_is_propagated() {
        let scene = Scene::new(VIEWPORT);
        let popup = Popup::new(&scene);
        let counts = counted(&popup);

        let result = block_on(popup.show_animated(|_| async {
            Err::<(), AnimationError>("renderer went away".into())
        }));

        let err = result.unwrap_err();
        assert!(matches!(err, PopupError::Animation(_)));
        assert_eq!(
            std::error::Error::source(&err).map(ToString::to_string),
            Some("renderer went away".to_string())
        );
        assert!(popup.is_visible(), "visibility already flipped");
        assert!(!popup.is_animating());
        assert_eq!(counts.shown.get(), 0);
    }

    #[test]
    fn hide_during_show_animation_is_not_blocked() {
        let scene = Scene::new(VIEWPORT);
        let popup = Popup::new(&scene);
        let counts = counted(&popup);
        let (finish, finished) = oneshot::channel::<()>();

        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        let mut show = pin!(popup.show_animated(move |_| async move {
            finished.await.map_err(|e| Box::new(e) as AnimationError)
        }));

        assert!(show.as_mut().poll(&mut cx).is_pending());
        assert!(popup.is_visible());
        assert!(popup.is_animating());

        assert_eq!(popup.show(), Transition::Unchanged);
        assert_eq!(counts.showing.get(), 1);

        assert_eq!(popup.hide(), Transition::Completed);
        assert!(!popup.is_visible());
        assert_eq!(counts.hidden.get(), 1);
        assert_eq!(counts.shown.get(), 0);

        finish.send(()).unwrap();
        match show.as_mut().poll(&mut cx) {
            Poll::Ready(result) => assert_eq!(result.unwrap(), Transition::Completed),
            Poll::Pending => panic!("show should complete once the animation finishes"),
        }
        assert_eq!(counts.shown.get(), 1);
        assert!(!popup.is_visible(), "the earlier hide still stands");
        assert!(!popup.is_animating());
    }

    #[test]
    fn hide_animation_runs_after_visibility_flip() {
        let scene = Scene::new(VIEWPORT);
        let popup = Popup::new(&scene);
        let counts = counted(&popup);
        popup.show();

        let result = block_on(popup.hide_animated(|p| async move {
            assert!(!p.is_visible());
            p.set_opacity(0.0);
            Ok::<(), AnimationError>(())
        }));
        assert_eq!(result.unwrap(), Transition::Completed);
        assert_eq!(counts.hidden.get(), 1);
        assert_eq!(popup.opacity(), 0.0);

        let again = block_on(popup.hide_with(None)).unwrap();
        assert_eq!(again, Transition::Unchanged);
        assert_eq!(counts.hidden.get(), 1);
    }

    #[test]
    fn placement_is_recomputed_and_applied() {
        let scene = Scene::new(VIEWPORT);
        let popup = Popup::new(&scene);
        popup.set_x_position(0.5);
        popup.set_y_position(0.5);
        popup.set_content_width(0.8);
        popup.set_content_height(0.5);

        let expected = FractionalRect::new(0.5, 0.5, 0.8, 0.5);
        let applied = || {
            scene.with_tree(|t| t.local(popup.section_container()).map(|l| l.layout))
        };
        assert_eq!(popup.placement_rect(), expected);
        assert_eq!(applied(), Some(Layout::from(expected)));

        popup.set_x_position(0.5);
        assert_eq!(popup.placement_rect(), expected);
        assert_eq!(applied(), Some(Layout::from(expected)));
        assert!(!popup.is_visible());
        assert_eq!(
            scene.with_tree(|t| t.local(popup.root()).map(|l| l.layout)),
            Some(Layout::FULL),
            "the root stays full-bleed so the backdrop covers the host"
        );

        popup.set_content_width(3.0);
        assert_eq!(popup.content_width(), 1.0);
    }

    #[test]
    fn slots_stack_header_body_footer() {
        let scene = Scene::new(VIEWPORT);
        let popup = Popup::with_config(
            &scene,
            PopupConfig {
                header_height: 0.25,
                footer_height: 0.25,
                ..PopupConfig::default()
            },
        );
        popup.set_placement(PlacementRequest::new(0.0, 0.0, 1.0, 1.0));
        let bounds = |section| {
            scene.commit();
            scene.with_tree(|t| t.world_bounds(popup.slot(section).unwrap()))
        };

        assert_eq!(bounds(Section::Body), Some(VIEWPORT));

        popup.set_header(Some(leaf(&scene))).unwrap();
        popup.set_footer(Some(leaf(&scene))).unwrap();
        assert_eq!(bounds(Section::Header), Some(Rect::new(0.0, 0.0, 100.0, 25.0)));
        assert_eq!(bounds(Section::Body), Some(Rect::new(0.0, 25.0, 100.0, 75.0)));
        assert_eq!(bounds(Section::Footer), Some(Rect::new(0.0, 75.0, 100.0, 100.0)));

        popup.set_header(None).unwrap();
        assert_eq!(bounds(Section::Body), Some(Rect::new(0.0, 0.0, 100.0, 75.0)));
    }

    #[test]
    fn replacing_content_returns_and_detaches_previous() {
        let scene = Scene::new(VIEWPORT);
        let popup = Popup::new(&scene);
        let a = leaf(&scene);
        let b = leaf(&scene);

        assert_eq!(popup.set_body(Some(a)).unwrap(), None);
        assert_eq!(scene.with_tree(|t| t.parent_of(a)), popup.slot(Section::Body));
        assert_eq!(popup.set_body(Some(a)).unwrap(), None, "same content is a no-op");

        assert_eq!(popup.set_body(Some(b)).unwrap(), Some(a));
        assert_eq!(scene.with_tree(|t| t.parent_of(a)), None);
        assert_eq!(popup.set_body(None).unwrap(), Some(b));
        assert_eq!(popup.body(), None);
    }

    #[test]
    fn default_slots_share_exact_edges() {
        let scene = Scene::new(VIEWPORT);
        let popup = Popup::new(&scene);
        popup.set_placement(PlacementRequest::new(0.0, 0.0, 1.0, 1.0));
        popup.set_header(Some(leaf(&scene))).unwrap();
        popup.set_footer(Some(leaf(&scene))).unwrap();
        scene.commit();

        let bounds = |section| {
            scene
                .with_tree(|t| t.world_bounds(popup.slot(section).unwrap()))
                .unwrap()
        };
        let (header, body, footer) = (
            bounds(Section::Header),
            bounds(Section::Body),
            bounds(Section::Footer),
        );
        assert_eq!(header.y1, body.y0);
        assert_eq!(body.y1, footer.y0);
        assert_eq!(body.y0, 15.0);
        assert_eq!(footer.y0, 85.0);
    }

    #[test]
    fn moving_content_between_slots_empties_the_source() {
        let scene = Scene::new(VIEWPORT);
        let popup = Popup::new(&scene);
        popup.set_placement(PlacementRequest::new(0.0, 0.0, 1.0, 1.0));
        let a = leaf(&scene);

        popup.set_header(Some(a)).unwrap();
        assert_eq!(popup.set_body(Some(a)).unwrap(), None);
        assert_eq!(popup.header(), None);
        assert_eq!(popup.body(), Some(a));
        scene.commit();
        assert_eq!(
            scene.with_tree(|t| t.world_bounds(popup.slot(Section::Body).unwrap())),
            Some(VIEWPORT),
            "an emptied header reserves no height"
        );

        let c = leaf(&scene);
        assert_eq!(popup.set_header(Some(c)).unwrap(), None);
        assert_eq!(popup.body(), Some(a));

        let other = Popup::new(&scene);
        other.set_footer(Some(a)).unwrap();
        assert_eq!(popup.body(), None);
        assert_eq!(other.footer(), Some(a));
        assert_eq!(popup.set_body(None).unwrap(), None);
        assert_eq!(scene.with_tree(|t| t.parent_of(a)), other.slot(Section::Footer));
    }

    #[test]
    fn invalid_content_is_rejected() {
        let scene = Scene::new(VIEWPORT);
        let popup = Popup::new(&scene);
        let gone = leaf(&scene);
        scene.remove(gone);

        assert!(matches!(popup.set_body(Some(gone)), Err(PopupError::StaleNode(n)) if n == gone));
        assert!(matches!(
            popup.set_header(Some(popup.root())),
            Err(PopupError::WouldCycle(n)) if n == popup.root()
        ));
        assert_eq!(popup.body(), None);
        assert_eq!(popup.header(), None);
    }

    #[test]
    fn initialize_runs_once() {
        let scene = Scene::new(VIEWPORT);
        let popup = Popup::new(&scene);
        let fired = Rc::new(Cell::new(0));
        let f = Rc::clone(&fired);
        popup.initializing().subscribe(move |_| bump(&f));

        assert!(popup.initialize().unwrap());
        assert!(!popup.initialize().unwrap());
        assert_eq!(fired.get(), 1);
        assert!(popup.is_initialized());

        scene.with_tree(|t| {
            for node in t.descendants(popup.backdrop()) {
                assert_eq!(t.gestures_of(node).len(), 1, "{node:?}");
            }
        });
    }

    #[test]
    fn initialize_fails_once_removed() {
        let scene = Scene::new(VIEWPORT);
        let popup = Popup::new(&scene);
        scene.remove(popup.root());
        assert!(matches!(popup.initialize(), Err(PopupError::PopupNotAlive)));
    }

    fn tap_log(popup: &Popup) -> Rc<RefCell<Vec<(NodeId, Section, bool)>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        popup.tapped().subscribe(move |e| {
            l.borrow_mut()
                .push((e.node, e.section, e.is_user_control));
        });
        log
    }

    #[test]
    fn taps_are_classified_by_section() {
        let scene = Scene::new(VIEWPORT);
        let popup = Popup::new(&scene);
        let panel = leaf(&scene);
        let button = scene.insert(Some(panel), LocalNode::default());
        popup.set_body(Some(panel)).unwrap();
        popup.initialize().unwrap();
        let log = tap_log(&popup);

        scene.tap(button);
        assert!(log.borrow().is_empty(), "hidden popups ignore taps");

        popup.show();
        scene.tap(button);
        scene.tap(popup.border_node(BorderSide::Top));
        scene.tap(popup.backdrop());
        assert_eq!(
            *log.borrow(),
            vec![
                (button, Section::Body, true),
                (popup.border_node(BorderSide::Top), Section::Backdrop, false),
                (popup.backdrop(), Section::Backdrop, false),
            ]
        );
    }

    #[test]
    fn late_content_is_wired_and_old_content_is_ignored() {
        let scene = Scene::new(VIEWPORT);
        let popup = Popup::new(&scene);
        let old = leaf(&scene);
        popup.set_footer(Some(old)).unwrap();
        popup.initialize().unwrap();
        popup.show();
        let log = tap_log(&popup);

        let late = leaf(&scene);
        popup.set_footer(Some(late)).unwrap();
        scene.tap(late);
        scene.tap(old);
        assert_eq!(*log.borrow(), vec![(late, Section::Footer, true)]);
    }

    #[test]
    fn reassigned_content_is_wired_once() {
        let scene = Scene::new(VIEWPORT);
        let popup = Popup::new(&scene);
        let a = leaf(&scene);
        let b = leaf(&scene);
        popup.set_body(Some(a)).unwrap();
        popup.initialize().unwrap();
        popup.show();
        let log = tap_log(&popup);

        popup.set_body(Some(b)).unwrap();
        popup.set_body(Some(a)).unwrap();
        scene.tap(a);

        assert_eq!(*log.borrow(), vec![(a, Section::Body, true)]);
        assert_eq!(scene.with_tree(|t| t.gestures_of(a).len()), 1);
    }

    #[test]
    fn grown_content_wires_only_new_nodes() {
        let scene = Scene::new(VIEWPORT);
        let popup = Popup::new(&scene);
        let panel = leaf(&scene);
        popup.set_body(Some(panel)).unwrap();
        popup.initialize().unwrap();
        popup.show();

        popup.set_body(None).unwrap();
        let button = scene.insert(Some(panel), LocalNode::default());
        popup.set_body(Some(panel)).unwrap();
        let log = tap_log(&popup);
        scene.tap(button);
        scene.tap(panel);

        assert_eq!(
            *log.borrow(),
            vec![(button, Section::Body, true), (panel, Section::Body, true)]
        );
        scene.with_tree(|t| {
            assert_eq!(t.gestures_of(panel).len(), 1);
            assert_eq!(t.gestures_of(button).len(), 1);
        });
    }

    #[test]
    fn backdrop_tap_hides_once_and_body_tap_does_not() {
        let scene = Scene::new(VIEWPORT);
        let popup = Popup::new(&scene);
        popup.set_placement(PlacementRequest::centered(0.5, 0.5));
        let button = leaf(&scene);
        popup.set_body(Some(button)).unwrap();
        popup.initialize().unwrap();
        let counts = counted(&popup);
        let log = tap_log(&popup);
        popup.tapped().subscribe(|e| {
            if e.section == Section::Backdrop {
                e.popup.hide();
            }
        });

        popup.show();
        assert_eq!(scene.tap_at(Point::new(50.0, 50.0)), Some(button));
        assert!(popup.is_visible());
        assert_eq!(log.borrow()[0], (button, Section::Body, true));

        assert_eq!(scene.tap_at(Point::new(5.0, 5.0)), Some(popup.backdrop()));
        assert!(!popup.is_visible());
        assert_eq!(counts.hidden.get(), 1);

        scene.tap(popup.backdrop());
        assert_eq!(counts.hidden.get(), 1);
    }

    #[test]
    fn transform_and_opacity_reach_the_root() {
        let scene = Scene::new(VIEWPORT);
        let popup = Popup::new(&scene);
        popup.set_scale(0.5);
        popup.set_translation(Vec2::new(10.0, 0.0));
        popup.set_opacity(2.0);

        let expected = Affine::translate(Vec2::new(10.0, 0.0)) * Affine::scale(0.5);
        assert_eq!(popup.transform(), expected);
        scene.with_tree(|t| {
            let local = t.local(popup.root()).unwrap();
            assert_eq!(local.transform, expected);
            assert_eq!(local.opacity, 1.0);
        });
    }

    #[test]
    fn border_colors_are_independent() {
        let scene = Scene::new(VIEWPORT);
        let popup = Popup::new(&scene);
        popup.set_border_colors(Color::BLACK);
        popup.set_border_color(BorderSide::Left, Color::WHITE);
        assert_eq!(popup.border_color(BorderSide::Left), Color::WHITE);
        assert_eq!(popup.border_color(BorderSide::Right), Color::BLACK);
        assert_eq!(popup.border_color(BorderSide::Top), Color::BLACK);
        assert_eq!(popup.border_color(BorderSide::Bottom), Color::BLACK);
    }

    mod interleaving {
        use super::*;
        use futures::future::{FutureExt, LocalBoxFuture};
        use proptest::prelude::*;
        use std::future::Future;

        #[derive(Clone, Copy, Debug)]
        enum Step {
            Show,
            Hide,
            ShowAnimated,
            HideAnimated,
            Complete(usize),
            VetoNext,
        }

        impl Step {
            fn direction(self) -> Option<Direction> {
                match self {
                    Self::Show | Self::ShowAnimated => Some(Direction::Show),
                    Self::Hide | Self::HideAnimated => Some(Direction::Hide),
                    Self::Complete(_) | Self::VetoNext => None,
                }
            }
        }

        fn step() -> impl Strategy<Value = Step> {
            prop_oneof![
                Just(Step::Show),
                Just(Step::Hide),
                Just(Step::ShowAnimated),
                Just(Step::HideAnimated),
                (0_usize..8).prop_map(Step::Complete),
                Just(Step::VetoNext),
            ]
        }

        type Task = LocalBoxFuture<'static, Result<Transition, PopupError>>;

        struct InFlight {
            direction: Direction,
            finish: oneshot::Sender<()>,
            task: Task,
        }

        /// Start an animated transition whose hook waits for `finish`.
        fn start(popup: &Popup, direction: Direction) -> (oneshot::Sender<()>, Task) {
            let (finish, finished) = oneshot::channel::<()>();
            let hook = animation(move |_| async move {
                finished.await.map_err(|e| Box::new(e) as AnimationError)
            });
            let popup = popup.clone();
            let task = async move { popup.transition(direction, Some(hook)).await }.boxed_local();
            (finish, task)
        }

        /// Reference model: what a request should return, updating visibility and
        /// consuming a pending veto when the phase event is raised.
        fn expect(visible: &mut bool, veto: &mut bool, direction: Direction) -> Transition {
            let target = direction == Direction::Show;
            if *visible == target {
                Transition::Unchanged
            } else if std::mem::take(veto) {
                Transition::Cancelled
            } else {
                *visible = target;
                Transition::Completed
            }
        }

        proptest! {
            #[test]
            fn interleaved_transitions_follow_the_model(
                steps in prop::collection::vec(step(), 0..48)
            ) {
                let scene = Scene::new(VIEWPORT);
                let popup = Popup::new(&scene);
                let counts = counted(&popup);
                let veto = Rc::new(Cell::new(false));
                let v = Rc::clone(&veto);
                popup.showing().subscribe(move |e| e.cancel = v.replace(false));
                let v = Rc::clone(&veto);
                popup.hiding().subscribe(move |e| e.cancel = v.replace(false));

                let waker = noop_waker();
                let mut cx = Context::from_waker(&waker);
                let (mut visible, mut vetoed) = (false, false);
                // Terminal events expected so far, indexed by direction.
                let mut terminal = [0_u32; 2];
                let mut in_flight: Vec<InFlight> = Vec::new();

                for step in steps {
                    match step {
                        Step::Show | Step::Hide => {
                            let direction = step.direction().unwrap();
                            let expected = expect(&mut visible, &mut vetoed, direction);
                            let outcome = match direction {
                                Direction::Show => popup.show(),
                                Direction::Hide => popup.hide(),
                            };
                            prop_assert_eq!(outcome, expected);
                            if expected == Transition::Completed {
                                terminal[direction as usize] += 1;
                            }
                        }
                        Step::ShowAnimated | Step::HideAnimated => {
                            let direction = step.direction().unwrap();
                            let expected = expect(&mut visible, &mut vetoed, direction);
                            let (finish, mut task) = start(&popup, direction);
                            match task.as_mut().poll(&mut cx) {
                                Poll::Pending => {
                                    prop_assert_eq!(expected, Transition::Completed);
                                    in_flight.push(InFlight { direction, finish, task });
                                }
                                Poll::Ready(result) => {
                                    prop_assert_ne!(expected, Transition::Completed);
                                    prop_assert_eq!(result.unwrap(), expected);
                                }
                            }
                        }
                        Step::Complete(i) => {
                            if in_flight.is_empty() {
                                continue;
                            }
                            let InFlight { direction, finish, mut task } =
                                in_flight.remove(i % in_flight.len());
                            prop_assert!(finish.send(()).is_ok());
                            let outcome = task.as_mut().poll(&mut cx);
                            prop_assert!(
                                matches!(outcome, Poll::Ready(Ok(Transition::Completed))),
                                "{:?}",
                                outcome
                            );
                            terminal[direction as usize] += 1;
                        }
                        Step::VetoNext => {
                            vetoed = true;
                            veto.set(true);
                        }
                    }
                    prop_assert_eq!(popup.is_visible(), visible);
                    prop_assert_eq!(veto.get(), vetoed);
                    prop_assert_eq!(popup.is_animating(), !in_flight.is_empty());
                    prop_assert_eq!(counts.shown.get(), terminal[Direction::Show as usize]);
                    prop_assert_eq!(counts.hidden.get(), terminal[Direction::Hide as usize]);
                }
            }
        }
    }
}
