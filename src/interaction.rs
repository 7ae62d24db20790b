//! Gesture state machine translating pointer, keyboard and command input
//! into scene mutations.
//!
//! The [`Controller`] owns the [`Scene`]. Every transient gesture carries its
//! own payload in a private [`Gesture`] value, and hosts observe changes
//! through the listener passed to [`Controller::with_listener`].

use std::fmt;
use std::mem;
use std::str::FromStr;

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use crate::config::EditorConfig;
use crate::error::{EditorError, Result};
use crate::geometry::{Point, Rect, Size, link_path};
use crate::layout::{AutoFit, FitMode, TextMeasurer, auto_fit_node};
use crate::render::{
    self, EditorOverlay, Handle, Overlay, RenderScene, label_rect, resizable_selection,
    resize_handles, title_bar,
};
use crate::scene::{EditTarget, EntityRef, LinkKey, Scene};
use crate::serialize::to_mermaid;

/// Held keyboard modifiers. `ctrl` doubles as the multi-select modifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        shift: false,
    };
    pub const CTRL: Modifiers = Modifiers {
        ctrl: true,
        shift: false,
    };
    pub const SHIFT: Modifiers = Modifiers {
        ctrl: false,
        shift: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Delete,
    Backspace,
    Enter,
    Escape,
    Char(char),
}

impl FromStr for Key {
    type Err = EditorError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "Delete" => Ok(Key::Delete),
            "Backspace" => Ok(Key::Backspace),
            "Enter" => Ok(Key::Enter),
            "Escape" | "Esc" => Ok(Key::Escape),
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => Ok(Key::Char(ch)),
                    _ => Err(EditorError::UnknownKey(other.to_string())),
                }
            }
        }
    }
}

/// What lies under a point, in hit-test priority order.
#[derive(Debug, Clone, PartialEq)]
pub enum Hit {
    Handle(EntityRef, Handle),
    Node(String),
    Link(LinkKey),
    SubgraphTitle(String),
    Subgraph(String),
    Canvas,
}

/// Public view of the controller state.
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionState {
    Idle,
    LinkingAwaitingSource,
    LinkingAwaitingTarget(String),
    Dragging(EntityRef),
    Resizing(EntityRef, Handle),
    MarqueeSelecting(Rect),
    TextEditing(EditTarget),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
    /// Mid-gesture change: re-render only.
    Preview,
    /// The scene settled: re-render and re-serialize.
    Commit,
}

/// Returned when a double-click opens a text editor.
#[derive(Debug, Clone, PartialEq)]
pub struct EditRequest {
    pub target: EditTarget,
    pub text: String,
    pub rect: Rect,
}

#[derive(Debug, Clone, PartialEq)]
struct EditSession {
    target: EditTarget,
    buffer: String,
    rect: Rect,
}

#[derive(Debug, Clone, PartialEq)]
enum Gesture {
    Idle,
    /// Pointer is down but has not yet moved past the drag threshold.
    Pressed {
        target: Hit,
        origin: Point,
        modifiers: Modifiers,
    },
    DraggingNode {
        id: String,
        grab_offset: Point,
    },
    DraggingSubgraph {
        id: String,
        last: Point,
    },
    Resizing {
        entity: EntityRef,
        handle: Handle,
        last: Point,
    },
    Marquee {
        origin: Point,
        current: Point,
    },
    TextEditing(EditSession),
}

pub type ChangeListener = Box<dyn FnMut(&Scene, Update)>;

pub struct Controller {
    scene: Scene,
    config: EditorConfig,
    fit: AutoFit,
    measurer: Box<dyn TextMeasurer>,
    gesture: Gesture,
    listener: Option<ChangeListener>,
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("scene", &self.scene)
            .field("gesture", &self.gesture)
            .finish_non_exhaustive()
    }
}

/// Finds the top-most thing under `point`.
pub fn hit_test(scene: &Scene, config: &EditorConfig, point: Point) -> Hit {
    if let Some(entity) = resizable_selection(scene) {
        for shape in resize_handles(scene, config.handle_size) {
            if shape.rect.contains(point) {
                return Hit::Handle(entity, shape.handle);
            }
        }
    }

    let nodes: Vec<_> = scene.nodes().collect();
    if let Some(node) = nodes.iter().rev().find(|node| node.bounds().contains(point)) {
        return Hit::Node(node.id.clone());
    }

    for link in scene.links().iter().rev() {
        let Some(segment) = link_path(scene.node(&link.source), scene.node(&link.target)) else {
            continue;
        };
        let on_label = !link.label.is_empty()
            && label_rect(segment.midpoint(), &link.label, config).contains(point);
        if on_label || segment.distance_to(point) <= config.link_hit_tolerance {
            return Hit::Link(link.key());
        }
    }

    let subgraphs: Vec<_> = scene.subgraphs().collect();
    for subgraph in subgraphs.iter().rev() {
        let bounds = subgraph.bounds();
        if title_bar(&bounds, config.subgraph_title_height).contains(point) {
            return Hit::SubgraphTitle(subgraph.id.clone());
        }
        if bounds.contains(point) {
            return Hit::Subgraph(subgraph.id.clone());
        }
    }

    Hit::Canvas
}

fn random_between(low: f64, high: f64) -> f64 {
    if high > low {
        rand::random_range(low..high)
    } else {
        low
    }
}

impl Controller {
    pub fn new(scene: Scene, config: EditorConfig, measurer: Box<dyn TextMeasurer>) -> Self {
        Self {
            fit: AutoFit::from_config(&config),
            scene,
            config,
            measurer,
            gesture: Gesture::Idle,
            listener: None,
        }
    }

    /// Installs the callback that receives the scene after every change.
    pub fn with_listener(mut self, listener: impl FnMut(&Scene, Update) + 'static) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn into_scene(self) -> Scene {
        self.scene
    }

    pub fn state(&self) -> InteractionState {
        match &self.gesture {
            Gesture::DraggingNode { id, .. } => InteractionState::Dragging(EntityRef::Node(id.clone())),
            Gesture::DraggingSubgraph { id, .. } => {
                InteractionState::Dragging(EntityRef::Subgraph(id.clone()))
            }
            Gesture::Resizing { entity, handle, .. } => {
                InteractionState::Resizing(entity.clone(), *handle)
            }
            Gesture::Marquee { origin, current } => {
                InteractionState::MarqueeSelecting(Rect::from_corners(*origin, *current))
            }
            Gesture::TextEditing(session) => InteractionState::TextEditing(session.target.clone()),
            Gesture::Idle | Gesture::Pressed { .. } => {
                let linking = self.scene.linking();
                match (linking.active, &linking.pending_source) {
                    (false, _) => InteractionState::Idle,
                    (true, None) => InteractionState::LinkingAwaitingSource,
                    (true, Some(source)) => InteractionState::LinkingAwaitingTarget(source.clone()),
                }
            }
        }
    }

    pub fn overlay(&self) -> Overlay {
        let marquee = match &self.gesture {
            Gesture::Marquee { origin, current } => Some(Rect::from_corners(*origin, *current)),
            _ => None,
        };
        let editor = match &self.gesture {
            Gesture::TextEditing(session) => Some(EditorOverlay {
                target: session.target.clone(),
                rect: session.rect,
                text: session.buffer.clone(),
            }),
            _ => None,
        };
        Overlay { marquee, editor }
    }

    pub fn render(&self) -> RenderScene {
        render::project(&self.scene, &self.config, &self.overlay())
    }

    pub fn serialized_diagram(&self) -> String {
        to_mermaid(&self.scene, &self.config.direction)
    }

    pub fn hit_test(&self, point: Point) -> Hit {
        hit_test(&self.scene, &self.config, point)
    }

    fn notify(&mut self, update: Update) {
        if let Some(listener) = self.listener.as_mut() {
            listener(&self.scene, update);
        }
    }

    fn refit(&mut self, id: &str, mode: FitMode) -> Result<()> {
        auto_fit_node(&mut self.scene, &self.fit, self.measurer.as_ref(), id, mode)?;
        Ok(())
    }

    // --- Pointer events ---

    pub fn pointer_down(&mut self, point: Point, modifiers: Modifiers) {
        if let Gesture::TextEditing(session) = &self.gesture {
            if session.rect.contains(point) {
                return;
            }
            self.blur();
        }

        let target = self.hit_test(point);
        trace!(x = point.x, y = point.y; "Pointer down on {target:?}");

        if self.scene.linking().active {
            self.gesture = Gesture::Pressed {
                target,
                origin: point,
                modifiers,
            };
            return;
        }

        self.gesture = match target {
            Hit::Handle(entity, handle) => Gesture::Resizing {
                entity,
                handle,
                last: point,
            },
            Hit::Canvas => {
                if !modifiers.ctrl {
                    self.scene.clear_selection();
                    self.notify(Update::Preview);
                }
                Gesture::Marquee {
                    origin: point,
                    current: point,
                }
            }
            target => Gesture::Pressed {
                target,
                origin: point,
                modifiers,
            },
        };
    }

    pub fn pointer_move(&mut self, point: Point) {
        let gesture = mem::replace(&mut self.gesture, Gesture::Idle);
        self.gesture = match gesture {
            Gesture::Pressed {
                target,
                origin,
                modifiers,
            } => self.promote_press(target, origin, modifiers, point),
            Gesture::DraggingNode { id, grab_offset } => {
                self.drag_node(&id, point.offset(grab_offset.x, grab_offset.y));
                Gesture::DraggingNode { id, grab_offset }
            }
            Gesture::DraggingSubgraph { id, last } => {
                self.drag_subgraph(&id, point.x - last.x, point.y - last.y);
                Gesture::DraggingSubgraph { id, last: point }
            }
            Gesture::Resizing {
                entity,
                handle,
                last,
            } => {
                self.resize(&entity, handle, point.x - last.x, point.y - last.y);
                Gesture::Resizing {
                    entity,
                    handle,
                    last: point,
                }
            }
            Gesture::Marquee { origin, .. } => {
                self.notify(Update::Preview);
                Gesture::Marquee {
                    origin,
                    current: point,
                }
            }
            other => other,
        };
    }

    fn promote_press(
        &mut self,
        target: Hit,
        origin: Point,
        modifiers: Modifiers,
        point: Point,
    ) -> Gesture {
        let pressed = |target| Gesture::Pressed {
            target,
            origin,
            modifiers,
        };
        if self.scene.linking().active || origin.distance(point) < self.config.drag_threshold {
            return pressed(target);
        }

        match target {
            Hit::Node(id) => {
                let Some(center) = self.scene.node(&id).map(|node| node.center()) else {
                    return Gesture::Idle;
                };
                let grab_offset = Point::new(center.x - origin.x, center.y - origin.y);
                debug!(node = id.as_str(); "Dragging node");
                self.drag_node(&id, point.offset(grab_offset.x, grab_offset.y));
                Gesture::DraggingNode { id, grab_offset }
            }
            Hit::Subgraph(id) | Hit::SubgraphTitle(id) => {
                debug!(subgraph = id.as_str(); "Dragging subgraph");
                self.drag_subgraph(&id, point.x - origin.x, point.y - origin.y);
                Gesture::DraggingSubgraph { id, last: point }
            }
            target => pressed(target),
        }
    }

    /// Moves a node toward `center`. While `center` stays inside the parent
    /// subgraph the node's full bounds are kept inside it; past the parent's
    /// edge the node follows the pointer out.
    fn drag_node(&mut self, id: &str, center: Point) {
        let Some(node) = self.scene.node(id) else {
            return;
        };
        let (half_w, half_h) = (node.width / 2.0, node.height / 2.0);
        let parent = self
            .scene
            .subgraph_of(id)
            .map(|subgraph| subgraph.bounds())
            .filter(|bounds| bounds.contains(center));

        let center = match parent {
            Some(parent) => Point::new(
                center.x.min(parent.max_x - half_w).max(parent.min_x + half_w),
                center.y.min(parent.max_y - half_h).max(parent.min_y + half_h),
            ),
            None => center,
        };

        if let Err(err) = self.scene.set_node_position(id, center) {
            warn!(node = id; "Dragged node vanished: {err}");
        }
        self.notify(Update::Preview);
    }

    fn drag_subgraph(&mut self, id: &str, dx: f64, dy: f64) {
        if let Err(err) = self.scene.move_subgraph(id, dx, dy) {
            warn!(subgraph = id; "Dragged subgraph vanished: {err}");
        }
        self.notify(Update::Preview);
    }

    fn resize(&mut self, entity: &EntityRef, handle: Handle, dx: f64, dy: f64) {
        let result = match entity {
            EntityRef::Node(id) => self.resize_node(id, handle, dx, dy),
            EntityRef::Subgraph(id) => self.resize_subgraph(id, handle, dx, dy),
            EntityRef::Link(_) => Ok(()),
        };
        if let Err(err) = result {
            warn!("Resize dropped: {err}");
        }
        self.notify(Update::Preview);
    }

    fn resize_node(&mut self, id: &str, handle: Handle, dx: f64, dy: f64) -> Result<()> {
        let node = self
            .scene
            .node(id)
            .ok_or_else(|| EditorError::UnknownNode(id.to_string()))?;
        let min = self.scene.min_node_size();
        let mut center = node.center();
        let mut size = node.size();

        let width = if handle.moves_left() { size.width - dx } else { size.width + dx };
        if width >= min.width {
            size.width = width;
            center.x += dx / 2.0;
        }
        let height = if handle.moves_top() { size.height - dy } else { size.height + dy };
        if height >= min.height {
            size.height = height;
            center.y += dy / 2.0;
        }

        self.scene.set_node_geometry(id, center, size)
    }

    fn resize_subgraph(&mut self, id: &str, handle: Handle, dx: f64, dy: f64) -> Result<()> {
        let bounds = self
            .scene
            .subgraph(id)
            .map(|subgraph| subgraph.bounds())
            .ok_or_else(|| EditorError::UnknownSubgraph(id.to_string()))?;
        let min = self.scene.min_subgraph_size();
        let (mut x, mut y) = (bounds.min_x, bounds.min_y);
        let (mut width, mut height) = (bounds.width(), bounds.height());

        if handle.moves_left() {
            if width - dx >= min {
                width -= dx;
                x += dx;
            }
        } else if width + dx >= min {
            width += dx;
        }

        if handle.moves_top() {
            if height - dy >= min {
                height -= dy;
                y += dy;
            }
        } else if height + dy >= min {
            height += dy;
        }

        self.scene
            .set_subgraph_bounds(id, Rect::from_origin(x, y, width, height))
    }

    pub fn pointer_up(&mut self, point: Point) {
        self.pointer_move(point);

        match mem::replace(&mut self.gesture, Gesture::Idle) {
            Gesture::Pressed {
                target, modifiers, ..
            } => self.click(target, modifiers),
            Gesture::DraggingNode { id, .. } => {
                self.settle_membership(&id);
                self.notify(Update::Commit);
            }
            Gesture::DraggingSubgraph { .. } => self.notify(Update::Commit),
            Gesture::Resizing { entity, .. } => {
                if let EntityRef::Node(id) = &entity {
                    if let Err(err) = self.refit(id, FitMode::Contain) {
                        warn!(node = id.as_str(); "Auto-fit after resize failed: {err}");
                    }
                }
                self.notify(Update::Commit);
            }
            Gesture::Marquee { origin, current } => {
                if origin.distance(current) < self.config.drag_threshold {
                    self.click(Hit::Canvas, Modifiers::NONE);
                } else {
                    self.select_within(Rect::from_corners(origin, current));
                }
            }
            editing @ Gesture::TextEditing(_) => self.gesture = editing,
            Gesture::Idle => {}
        }
    }

    /// Reassigns a dropped node to the last-added subgraph whose bounds
    /// strictly contain its center.
    fn settle_membership(&mut self, id: &str) {
        let Some(center) = self.scene.node(id).map(|node| node.center()) else {
            return;
        };
        let parent = self
            .scene
            .subgraphs()
            .filter(|subgraph| subgraph.bounds().contains_strict(center))
            .last()
            .map(|subgraph| subgraph.id.clone());

        debug!(node = id, subgraph = parent.as_deref().unwrap_or("-"); "Node dropped");
        if let Err(err) = self.scene.set_node_subgraph(id, parent.as_deref()) {
            warn!(node = id; "Failed to update membership: {err}");
        }
    }

    fn select_within(&mut self, area: Rect) {
        let nodes: Vec<String> = self
            .scene
            .nodes()
            .filter(|node| area.contains(node.center()))
            .map(|node| node.id.clone())
            .collect();
        let links: Vec<LinkKey> = self
            .scene
            .links()
            .iter()
            .filter(|link| {
                match (self.scene.node(&link.source), self.scene.node(&link.target)) {
                    (Some(source), Some(target)) => area.contains(Point::new(
                        (source.x + target.x) / 2.0,
                        (source.y + target.y) / 2.0,
                    )),
                    _ => false,
                }
            })
            .map(|link| link.key())
            .collect();

        debug!(nodes = nodes.len(), links = links.len(); "Marquee selection");
        self.scene.extend_selection(nodes, links);
        self.notify(Update::Commit);
    }

    fn click(&mut self, target: Hit, modifiers: Modifiers) {
        if self.scene.linking().active {
            self.linking_click(target, modifiers);
        } else {
            match target {
                Hit::Node(id) => {
                    self.scene.select_node(&id, modifiers.ctrl);
                }
                Hit::Link(key) => {
                    self.scene.select_link(&key, modifiers.ctrl);
                }
                Hit::Subgraph(id) | Hit::SubgraphTitle(id) => {
                    self.scene.select_subgraph(&id);
                }
                Hit::Canvas => self.scene.clear_selection(),
                Hit::Handle(..) => {}
            }
        }
        self.notify(Update::Commit);
    }

    fn linking_click(&mut self, target: Hit, modifiers: Modifiers) {
        match target {
            Hit::Node(id) => match self.scene.linking().pending_source.clone() {
                None => self.scene.set_pending_source(Some(id)),
                Some(source) => {
                    if source != id {
                        match self.scene.add_link(&source, &id) {
                            Ok(key) => debug!(link = key.to_string(); "Link created"),
                            Err(err) => debug!("Link rejected: {err}"),
                        }
                    }
                    self.scene.set_pending_source(None);
                }
            },
            Hit::Link(key) => {
                self.scene.stop_linking();
                self.scene.select_link(&key, modifiers.ctrl);
            }
            Hit::Subgraph(id) | Hit::SubgraphTitle(id) => {
                self.scene.stop_linking();
                self.scene.select_subgraph(&id);
            }
            Hit::Canvas => {
                self.scene.stop_linking();
                self.scene.clear_selection();
            }
            Hit::Handle(..) => {}
        }
    }

    // --- Text editing ---

    /// Opens a text editor for whatever is under `point`. Ignored while
    /// another edit is open.
    pub fn double_click(&mut self, point: Point) -> Option<EditRequest> {
        if matches!(self.gesture, Gesture::TextEditing(_)) {
            return None;
        }

        let target = match self.hit_test(point) {
            Hit::Node(id) | Hit::Handle(EntityRef::Node(id), _) => EditTarget::NodeText(id),
            Hit::Link(key) | Hit::Handle(EntityRef::Link(key), _) => EditTarget::LinkLabel(key),
            Hit::Subgraph(id) | Hit::SubgraphTitle(id) | Hit::Handle(EntityRef::Subgraph(id), _) => {
                EditTarget::SubgraphTitle(id)
            }
            Hit::Canvas => return None,
        };

        let text = match &target {
            EditTarget::NodeText(id) => self.scene.node(id).map(|node| node.text.clone()),
            EditTarget::LinkLabel(key) => self.scene.link(key).map(|link| link.label.clone()),
            EditTarget::SubgraphTitle(id) => {
                self.scene.subgraph(id).map(|subgraph| subgraph.title.clone())
            }
        }?;
        let rect = render::editor_rect(&self.scene, &self.config, &target)?;

        debug!("Opening text editor for {target:?}");
        self.gesture = Gesture::TextEditing(EditSession {
            target: target.clone(),
            buffer: text.clone(),
            rect,
        });
        self.notify(Update::Preview);
        Some(EditRequest { target, text, rect })
    }

    /// Replaces the open editor's contents.
    pub fn text_input(&mut self, text: &str) {
        if let Gesture::TextEditing(session) = &mut self.gesture {
            session.buffer = text.to_string();
            self.notify(Update::Preview);
        }
    }

    /// Writes the editor contents back and closes it. Blank text leaves a
    /// node or subgraph unchanged but clears a link label.
    pub fn commit_text(&mut self) -> Result<()> {
        let Gesture::TextEditing(session) = mem::replace(&mut self.gesture, Gesture::Idle) else {
            return Ok(());
        };
        let EditSession { target, buffer, .. } = session;
        if !self.edit_target_exists(&target) {
            debug!("Discarding edit for removed {target:?}");
            self.notify(Update::Preview);
            return Ok(());
        }
        let blank = buffer.trim().is_empty();

        let result = match &target {
            EditTarget::NodeText(id) if !blank => self
                .scene
                .set_node_text(id, buffer)
                .and_then(|()| self.refit(id, FitMode::Reflow)),
            EditTarget::SubgraphTitle(id) if !blank => self.scene.set_subgraph_title(id, buffer),
            EditTarget::LinkLabel(key) if blank => self.scene.set_link_label(key, ""),
            EditTarget::LinkLabel(key) => self.scene.set_link_label(key, buffer),
            _ => Ok(()),
        };
        self.notify(Update::Commit);
        result
    }

    fn edit_target_exists(&self, target: &EditTarget) -> bool {
        match target {
            EditTarget::NodeText(id) => self.scene.node(id).is_some(),
            EditTarget::LinkLabel(key) => self.scene.link(key).is_some(),
            EditTarget::SubgraphTitle(id) => self.scene.subgraph(id).is_some(),
        }
    }

    /// Closes an open editor whose target no longer exists.
    fn drop_orphaned_edit(&mut self) {
        if let Gesture::TextEditing(session) = &self.gesture {
            if !self.edit_target_exists(&session.target) {
                debug!("Closing editor for removed {:?}", session.target);
                self.gesture = Gesture::Idle;
            }
        }
    }

    pub fn cancel_text(&mut self) {
        if matches!(self.gesture, Gesture::TextEditing(_)) {
            self.gesture = Gesture::Idle;
            self.notify(Update::Preview);
        }
    }

    /// Focus left the editor: same as confirming.
    pub fn blur(&mut self) {
        if let Err(err) = self.commit_text() {
            warn!("Text edit could not be applied: {err}");
        }
    }

    pub fn is_editing_text(&self) -> bool {
        matches!(self.gesture, Gesture::TextEditing(_))
    }

    // --- Keyboard ---

    pub fn key_down(&mut self, key: Key, modifiers: Modifiers) -> Result<()> {
        if self.is_editing_text() {
            match key {
                Key::Enter if !modifiers.shift => return self.commit_text(),
                Key::Escape => self.cancel_text(),
                _ => {}
            }
            return Ok(());
        }

        match key {
            Key::Delete | Key::Backspace => {
                self.delete_selected();
            }
            Key::Char('n' | 'N') if modifiers.ctrl => {
                self.add_node()?;
            }
            Key::Char('l' | 'L') if modifiers.ctrl => self.toggle_linking_mode(),
            Key::Escape if self.scene.linking().active => self.cancel_linking(),
            _ => {}
        }
        Ok(())
    }

    // --- Commands ---

    /// Adds a default node at a random canvas point, or inside the selected
    /// subgraph, then selects only the new node.
    pub fn add_node(&mut self) -> Result<String> {
        let size = Size::new(self.config.node_default_width, self.config.node_default_height);
        let parent = self
            .scene
            .selected_subgraph()
            .map(|subgraph| (subgraph.id.clone(), subgraph.bounds()));

        let center = match &parent {
            Some((_, bounds)) => Point::new(
                random_between(
                    bounds.min_x + size.width / 2.0,
                    bounds.max_x - size.width / 2.0,
                ),
                random_between(
                    bounds.min_y + self.config.subgraph_title_height + size.height / 2.0,
                    bounds.max_y - size.height / 2.0,
                ),
            ),
            None => Point::new(
                random_between(100.0, self.config.canvas_width - 100.0),
                random_between(50.0, self.config.canvas_height - 50.0),
            ),
        };

        let id = self
            .scene
            .add_node(self.config.node_default_text.clone(), center)?;
        if let Some((subgraph_id, _)) = &parent {
            self.scene.set_node_subgraph(&id, Some(subgraph_id))?;
        }
        self.refit(&id, FitMode::Reflow)?;
        self.scene.select_node(&id, false);

        debug!(node = id.as_str(), x = center.x, y = center.y; "Added node");
        self.notify(Update::Commit);
        Ok(id)
    }

    /// Inserts a node with a caller-chosen id, fitted to its text.
    pub fn insert_node(&mut self, id: &str, text: &str, center: Point) -> Result<()> {
        self.scene.insert_node(id, text, center)?;
        self.refit(id, FitMode::Reflow)?;
        self.notify(Update::Commit);
        Ok(())
    }

    pub fn add_subgraph(&mut self) -> Result<String> {
        let origin = Point::new(
            random_between(100.0, self.config.canvas_width - 300.0),
            random_between(100.0, self.config.canvas_height - 300.0),
        );
        let bounds = Rect::from_origin(
            origin.x,
            origin.y,
            self.config.subgraph_default_width,
            self.config.subgraph_default_height,
        );
        let id = self
            .scene
            .add_subgraph(self.config.subgraph_default_title.clone(), bounds)?;
        self.scene.select_subgraph(&id);

        debug!(subgraph = id.as_str(); "Added subgraph");
        self.notify(Update::Commit);
        Ok(id)
    }

    pub fn insert_subgraph(&mut self, id: &str, title: &str, bounds: Rect) -> Result<()> {
        self.scene.insert_subgraph(id, title, bounds)?;
        self.notify(Update::Commit);
        Ok(())
    }

    /// Entering or leaving linking mode clears the selection.
    pub fn toggle_linking_mode(&mut self) {
        self.scene.clear_selection();
        if self.scene.linking().active {
            self.scene.stop_linking();
        } else {
            self.scene.start_linking();
        }
        debug!(active = self.scene.linking().active; "Linking mode toggled");
        self.notify(Update::Commit);
    }

    pub fn cancel_linking(&mut self) {
        self.scene.stop_linking();
        self.notify(Update::Commit);
    }

    /// Deletes every selected node, link and subgraph. Returns how many
    /// entities were removed directly, not counting cascaded links.
    pub fn delete_selected(&mut self) -> usize {
        let selection = self.scene.selection().clone();
        let nodes: Vec<String> = selection.nodes.into_iter().collect();
        let links: Vec<LinkKey> = selection.links.into_iter().collect();

        let mut removed = self.scene.delete_links(&links);
        removed += self.scene.delete_nodes(&nodes);
        if let Some(subgraph) = selection.subgraph {
            removed += usize::from(self.scene.delete_subgraph(&subgraph));
        }

        self.scene.clear_selection();
        self.scene.stop_linking();
        self.drop_orphaned_edit();
        debug!(removed = removed; "Deleted selection");
        self.notify(Update::Commit);
        removed
    }

    pub fn set_node_text(&mut self, id: &str, text: &str) -> Result<()> {
        self.scene.set_node_text(id, text)?;
        self.refit(id, FitMode::Reflow)?;
        self.notify(Update::Commit);
        Ok(())
    }

    pub fn set_link_label(&mut self, key: &LinkKey, label: &str) -> Result<()> {
        self.scene.set_link_label(key, label)?;
        self.notify(Update::Commit);
        Ok(())
    }

    pub fn set_subgraph_title(&mut self, id: &str, title: &str) -> Result<()> {
        self.scene.set_subgraph_title(id, title)?;
        self.notify(Update::Commit);
        Ok(())
    }

    pub fn set_node_subgraph(&mut self, id: &str, subgraph_id: Option<&str>) -> Result<()> {
        self.scene.set_node_subgraph(id, subgraph_id)?;
        self.notify(Update::Commit);
        Ok(())
    }

    pub fn set_comments(&mut self, comments: &str) {
        self.scene.set_comments(comments);
        self.notify(Update::Commit);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::layout::FixedWidthMeasurer;
    use crate::scene::SequentialIds;

    fn controller() -> Controller {
        let config = EditorConfig::default();
        let mut scene = Scene::with_id_generator(&config, Box::<SequentialIds>::default());
        scene.insert_node("A", "A", Point::new(100.0, 100.0)).unwrap();
        scene.insert_node("B", "B", Point::new(300.0, 100.0)).unwrap();
        Controller::new(scene, config, Box::new(FixedWidthMeasurer::new(10.0, 20.0)))
    }

    fn with_group(mut controller: Controller) -> Controller {
        controller
            .insert_subgraph("SG", "Group", Rect::from_origin(0.0, 300.0, 300.0, 250.0))
            .unwrap();
        controller
    }

    fn click(controller: &mut Controller, x: f64, y: f64, modifiers: Modifiers) {
        controller.pointer_down(Point::new(x, y), modifiers);
        controller.pointer_up(Point::new(x, y));
    }

    fn drag(controller: &mut Controller, from: (f64, f64), to: (f64, f64)) {
        controller.pointer_down(Point::new(from.0, from.1), Modifiers::NONE);
        controller.pointer_move(Point::new(to.0, to.1));
        controller.pointer_up(Point::new(to.0, to.1));
    }

    #[test]
    fn hit_test_prefers_handles_then_nodes_then_links() {
        let mut controller = controller();
        controller.scene.add_link("A", "B").unwrap();

        assert_eq!(controller.hit_test(Point::new(100.0, 100.0)), Hit::Node("A".into()));
        assert_eq!(
            controller.hit_test(Point::new(200.0, 104.0)),
            Hit::Link(LinkKey::new("A", "B"))
        );
        assert_eq!(controller.hit_test(Point::new(200.0, 110.0)), Hit::Canvas);

        click(&mut controller, 100.0, 100.0, Modifiers::NONE);
        assert_eq!(
            controller.hit_test(Point::new(160.0, 130.0)),
            Hit::Handle(EntityRef::Node("A".into()), Handle::BottomRight)
        );
    }

    #[test]
    fn hit_test_splits_subgraph_title_from_body() {
        let controller = with_group(controller());
        assert_eq!(
            controller.hit_test(Point::new(150.0, 310.0)),
            Hit::SubgraphTitle("SG".into())
        );
        assert_eq!(controller.hit_test(Point::new(150.0, 400.0)), Hit::Subgraph("SG".into()));
    }

    #[test]
    fn linking_walks_source_then_target_and_rearms() {
        let mut controller = controller();
        controller.toggle_linking_mode();
        assert_eq!(controller.state(), InteractionState::LinkingAwaitingSource);

        click(&mut controller, 100.0, 100.0, Modifiers::NONE);
        assert_eq!(
            controller.state(),
            InteractionState::LinkingAwaitingTarget("A".into())
        );

        click(&mut controller, 300.0, 100.0, Modifiers::NONE);
        assert_eq!(controller.state(), InteractionState::LinkingAwaitingSource);
        assert_eq!(controller.scene().links().len(), 1);

        // Same node twice, then a duplicate: neither adds a link.
        click(&mut controller, 300.0, 100.0, Modifiers::NONE);
        click(&mut controller, 300.0, 100.0, Modifiers::NONE);
        click(&mut controller, 100.0, 100.0, Modifiers::NONE);
        click(&mut controller, 300.0, 100.0, Modifiers::NONE);
        assert_eq!(controller.scene().links().len(), 1);
        assert!(controller.scene().selection().is_empty());

        controller.cancel_linking();
        assert_eq!(controller.state(), InteractionState::Idle);
    }

    #[test]
    fn canvas_click_leaves_linking_mode() {
        let mut controller = controller();
        controller.toggle_linking_mode();
        click(&mut controller, 100.0, 100.0, Modifiers::NONE);
        click(&mut controller, 700.0, 550.0, Modifiers::NONE);
        assert_eq!(controller.state(), InteractionState::Idle);
        assert!(controller.scene().linking().pending_source.is_none());
    }

    #[test]
    fn linking_mode_does_not_drag_nodes() {
        let mut controller = controller();
        controller.toggle_linking_mode();
        drag(&mut controller, (100.0, 100.0), (150.0, 200.0));
        assert_eq!(controller.scene().node("A").unwrap().center(), Point::new(100.0, 100.0));
        assert_eq!(
            controller.state(),
            InteractionState::LinkingAwaitingTarget("A".into())
        );
    }

    #[test]
    fn clicks_replace_or_toggle_selection() {
        let mut controller = controller();
        click(&mut controller, 100.0, 100.0, Modifiers::NONE);
        click(&mut controller, 300.0, 100.0, Modifiers::CTRL);
        assert_eq!(controller.scene().selection().nodes.len(), 2);

        click(&mut controller, 300.0, 100.0, Modifiers::CTRL);
        assert_eq!(
            controller.scene().selection().nodes.iter().collect::<Vec<_>>(),
            vec!["A"]
        );

        click(&mut controller, 700.0, 550.0, Modifiers::NONE);
        assert!(controller.scene().selection().is_empty());
    }

    #[test]
    fn small_moves_stay_clicks() {
        let mut controller = controller();
        drag(&mut controller, (100.0, 100.0), (101.0, 101.0));
        assert_eq!(controller.scene().node("A").unwrap().center(), Point::new(100.0, 100.0));
        assert!(controller.scene().selection().nodes.contains("A"));
    }

    #[test]
    fn dragging_a_child_is_clamped_to_its_parent() {
        let mut controller = with_group(controller());
        controller
            .scene
            .set_node_position("A", Point::new(150.0, 425.0))
            .unwrap();
        controller.set_node_subgraph("A", Some("SG")).unwrap();

        controller.pointer_down(Point::new(140.0, 420.0), Modifiers::NONE);
        controller.pointer_move(Point::new(270.0, 540.0));
        assert_eq!(controller.state(), InteractionState::Dragging(EntityRef::Node("A".into())));
        controller.pointer_up(Point::new(270.0, 540.0));

        let node = controller.scene().node("A").unwrap();
        assert_eq!(node.center(), Point::new(240.0, 520.0));
        assert_eq!(node.subgraph_id.as_deref(), Some("SG"));
        assert_eq!(controller.state(), InteractionState::Idle);
    }

    #[test]
    fn pulling_a_child_past_the_edge_releases_it() {
        let mut controller = with_group(controller());
        controller
            .scene
            .set_node_position("A", Point::new(150.0, 425.0))
            .unwrap();
        controller.set_node_subgraph("A", Some("SG")).unwrap();

        drag(&mut controller, (150.0, 425.0), (600.0, 425.0));
        let node = controller.scene().node("A").unwrap();
        assert_eq!(node.center(), Point::new(600.0, 425.0));
        assert!(node.subgraph_id.is_none());
    }

    #[test]
    fn dropping_a_node_picks_the_last_added_container() {
        let mut controller = with_group(controller());
        controller
            .insert_subgraph("INNER", "Inner", Rect::from_origin(50.0, 350.0, 200.0, 150.0))
            .unwrap();

        drag(&mut controller, (300.0, 100.0), (150.0, 420.0));
        assert_eq!(
            controller.scene().node("B").unwrap().subgraph_id.as_deref(),
            Some("INNER")
        );

        drag(&mut controller, (100.0, 100.0), (600.0, 100.0));
        assert!(controller.scene().node("A").unwrap().subgraph_id.is_none());
    }

    #[test]
    fn dragging_a_subgraph_carries_its_children() {
        let mut controller = with_group(controller());
        controller.set_node_subgraph("A", Some("SG")).unwrap();

        drag(&mut controller, (150.0, 310.0), (170.0, 330.0));
        assert_eq!(
            controller.scene().subgraph("SG").unwrap().bounds().origin(),
            Point::new(20.0, 320.0)
        );
        assert_eq!(controller.scene().node("A").unwrap().center(), Point::new(120.0, 120.0));
        assert_eq!(controller.scene().node("B").unwrap().center(), Point::new(300.0, 100.0));
    }

    #[test]
    fn node_resize_rejects_each_axis_independently() {
        let mut controller = controller();
        click(&mut controller, 100.0, 100.0, Modifiers::NONE);

        controller.pointer_down(Point::new(160.0, 130.0), Modifiers::NONE);
        assert_eq!(
            controller.state(),
            InteractionState::Resizing(EntityRef::Node("A".into()), Handle::BottomRight)
        );
        controller.pointer_move(Point::new(180.0, 130.0));
        controller.pointer_move(Point::new(100.0, 130.0));
        controller.pointer_move(Point::new(100.0, 200.0));
        controller.pointer_up(Point::new(100.0, 200.0));

        let node = controller.scene().node("A").unwrap();
        assert_eq!(node.size(), Size::new(140.0, 130.0));
        assert_eq!(node.center(), Point::new(110.0, 135.0));
    }

    #[test]
    fn subgraph_top_left_handle_moves_the_origin() {
        let mut controller = with_group(controller());
        click(&mut controller, 150.0, 310.0, Modifiers::NONE);

        controller.pointer_down(Point::new(0.0, 300.0), Modifiers::NONE);
        controller.pointer_move(Point::new(20.0, 310.0));
        controller.pointer_move(Point::new(300.0, 310.0));
        controller.pointer_up(Point::new(300.0, 310.0));

        let bounds = controller.scene().subgraph("SG").unwrap().bounds();
        assert_eq!(bounds, Rect::from_origin(20.0, 310.0, 280.0, 240.0));
    }

    #[test]
    fn marquee_selects_centers_and_link_midpoints() {
        let mut controller = controller();
        controller.scene.add_link("A", "B").unwrap();

        controller.pointer_down(Point::new(50.0, 50.0), Modifiers::NONE);
        controller.pointer_move(Point::new(250.0, 150.0));
        assert_eq!(
            controller.state(),
            InteractionState::MarqueeSelecting(Rect::from_origin(50.0, 50.0, 200.0, 100.0))
        );
        assert!(controller.render().marquee.is_some());
        controller.pointer_up(Point::new(250.0, 150.0));

        let selection = controller.scene().selection();
        assert_eq!(selection.nodes.iter().collect::<Vec<_>>(), vec!["A"]);
        assert!(selection.links.contains(&LinkKey::new("A", "B")));
    }

    #[test]
    fn marquee_with_modifier_keeps_prior_selection() {
        let mut controller = controller();
        click(&mut controller, 300.0, 100.0, Modifiers::NONE);

        controller.pointer_down(Point::new(50.0, 50.0), Modifiers::CTRL);
        controller.pointer_up(Point::new(150.0, 150.0));
        assert_eq!(controller.scene().selection().nodes.len(), 2);

        controller.pointer_down(Point::new(50.0, 50.0), Modifiers::NONE);
        controller.pointer_up(Point::new(150.0, 150.0));
        assert_eq!(controller.scene().selection().nodes.len(), 1);
    }

    #[test]
    fn enter_commits_text_and_refits() {
        let mut controller = controller();
        let request = controller.double_click(Point::new(100.0, 100.0)).unwrap();
        assert_eq!(request.target, EditTarget::NodeText("A".into()));
        assert_eq!(request.text, "A");
        assert!(controller.double_click(Point::new(300.0, 100.0)).is_none());

        controller.text_input("aaaa bbbb cccc dddd eeee ffff gggg");
        controller.key_down(Key::Enter, Modifiers::SHIFT).unwrap();
        assert!(controller.is_editing_text());
        assert!(!controller.render().nodes[0].text_visible);

        controller.key_down(Key::Enter, Modifiers::NONE).unwrap();
        assert_eq!(controller.state(), InteractionState::Idle);
        let node = controller.scene().node("A").unwrap();
        assert_eq!(node.text, "aaaa bbbb cccc dddd eeee ffff gggg");
        assert_eq!(node.size(), Size::new(150.0, 90.0));
    }

    #[test]
    fn escape_discards_the_edit() {
        let mut controller = controller();
        controller.double_click(Point::new(100.0, 100.0)).unwrap();
        controller.text_input("zzz");
        controller.key_down(Key::Delete, Modifiers::NONE).unwrap();
        controller.key_down(Key::Escape, Modifiers::NONE).unwrap();

        assert_eq!(controller.scene().node("A").unwrap().text, "A");
        assert_eq!(controller.scene().nodes().count(), 2);
        assert_eq!(controller.state(), InteractionState::Idle);
    }

    #[test]
    fn pressing_elsewhere_commits_first() {
        let mut controller = controller();
        controller.double_click(Point::new(100.0, 100.0)).unwrap();
        controller.text_input("Hello");
        controller.pointer_down(Point::new(100.0, 105.0), Modifiers::NONE);
        assert!(controller.is_editing_text());

        click(&mut controller, 700.0, 550.0, Modifiers::NONE);
        assert_eq!(controller.scene().node("A").unwrap().text, "Hello");
        assert_eq!(controller.state(), InteractionState::Idle);
    }

    #[test]
    fn blank_commits_keep_titles_but_clear_labels() {
        let mut controller = with_group(controller());
        controller.scene.add_link("A", "B").unwrap();
        controller
            .set_link_label(&LinkKey::new("A", "B"), "yes")
            .unwrap();

        controller.double_click(Point::new(150.0, 400.0)).unwrap();
        controller.text_input("   ");
        controller.commit_text().unwrap();
        assert_eq!(controller.scene().subgraph("SG").unwrap().title, "Group");

        let request = controller.double_click(Point::new(200.0, 100.0)).unwrap();
        assert_eq!(request.text, "yes");
        controller.text_input("");
        controller.blur();
        assert_eq!(controller.scene().links()[0].label, "");
    }

    #[test]
    fn link_labels_commit_as_typed() {
        let mut controller = controller();
        controller.scene.add_link("A", "B").unwrap();

        controller.double_click(Point::new(200.0, 100.0)).unwrap();
        controller.text_input("  Yes  ");
        controller.key_down(Key::Enter, Modifiers::NONE).unwrap();
        assert_eq!(controller.scene().links()[0].label, "  Yes  ");
    }

    #[test]
    fn deleting_the_edited_node_closes_its_editor() {
        let mut controller = controller();
        click(&mut controller, 100.0, 100.0, Modifiers::NONE);
        controller.double_click(Point::new(100.0, 100.0)).unwrap();
        controller.text_input("hello");

        controller.delete_selected();
        assert!(controller.overlay().editor.is_none());
        assert_eq!(controller.state(), InteractionState::Idle);
        assert!(controller.key_down(Key::Enter, Modifiers::NONE).is_ok());
        assert!(controller.scene().node("A").is_none());
    }

    #[test]
    fn cascaded_link_removal_closes_its_label_editor() {
        let mut controller = controller();
        controller.scene.add_link("A", "B").unwrap();
        controller.double_click(Point::new(200.0, 100.0)).unwrap();

        controller.scene.select_node("A", false);
        controller.delete_selected();
        assert!(!controller.is_editing_text());
        assert!(controller.commit_text().is_ok());
    }

    #[test]
    fn committing_for_a_vanished_target_is_a_no_op() {
        let mut controller = controller();
        controller.double_click(Point::new(300.0, 100.0)).unwrap();
        controller.text_input("renamed");

        controller.scene.delete_nodes(&["B".to_string()]);
        assert!(controller.commit_text().is_ok());
        assert_eq!(controller.state(), InteractionState::Idle);
        assert_eq!(controller.scene().nodes().count(), 1);
    }

    #[test]
    fn shortcuts_add_toggle_and_delete() {
        let mut controller = controller();
        controller.key_down(Key::Char('n'), Modifiers::CTRL).unwrap();
        assert_eq!(controller.scene().nodes().count(), 3);
        let added = controller.scene().selection().nodes.first().cloned().unwrap();
        assert!(added.starts_with("node_"));

        controller.key_down(Key::Delete, Modifiers::NONE).unwrap();
        assert_eq!(controller.scene().nodes().count(), 2);

        controller.key_down(Key::Char('l'), Modifiers::CTRL).unwrap();
        assert_eq!(controller.state(), InteractionState::LinkingAwaitingSource);
        controller.key_down(Key::Escape, Modifiers::NONE).unwrap();
        assert_eq!(controller.state(), InteractionState::Idle);
    }

    #[test]
    fn new_node_lands_inside_the_selected_subgraph() {
        let mut controller = with_group(controller());
        click(&mut controller, 150.0, 310.0, Modifiers::NONE);

        let id = controller.add_node().unwrap();
        let node = controller.scene().node(&id).unwrap();
        assert_eq!(node.subgraph_id.as_deref(), Some("SG"));
        assert!(Rect::from_origin(0.0, 300.0, 300.0, 250.0).contains_rect(&node.bounds()));
        assert_eq!(
            controller.scene().selection().nodes.iter().collect::<Vec<_>>(),
            vec![&id]
        );
        assert!(controller.scene().selection().subgraph.is_none());
    }

    #[test]
    fn delete_selected_cascades_and_detaches() {
        let mut controller = with_group(controller());
        controller.scene.add_link("A", "B").unwrap();
        controller.set_node_subgraph("B", Some("SG")).unwrap();

        click(&mut controller, 100.0, 100.0, Modifiers::NONE);
        assert_eq!(controller.delete_selected(), 1);
        assert!(controller.scene().links().is_empty());

        click(&mut controller, 150.0, 310.0, Modifiers::NONE);
        controller.delete_selected();
        assert_eq!(controller.scene().subgraphs().count(), 0);
        assert!(controller.scene().node("B").unwrap().subgraph_id.is_none());
    }

    #[test]
    fn listener_sees_previews_then_a_commit() {
        let updates = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&updates);
        let mut controller =
            controller().with_listener(move |_scene, update| sink.borrow_mut().push(update));

        drag(&mut controller, (100.0, 100.0), (200.0, 250.0));

        let updates = updates.borrow();
        assert_eq!(updates.last(), Some(&Update::Commit));
        assert_eq!(updates.iter().filter(|u| **u == Update::Commit).count(), 1);
        assert!(updates.contains(&Update::Preview));
    }

    #[test]
    fn keys_parse_from_names() {
        assert_eq!("Delete".parse::<Key>().unwrap(), Key::Delete);
        assert_eq!("n".parse::<Key>().unwrap(), Key::Char('n'));
        assert!("Tab!".parse::<Key>().is_err());
    }
}
