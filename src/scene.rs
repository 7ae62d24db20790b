//! The canonical graph being edited: nodes, links, subgraphs, selection and
//! linking state.

use std::fmt;

use chrono::Utc;
use indexmap::{IndexMap, IndexSet};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::EditorConfig;
use crate::error::{EditorError, Result};
use crate::geometry::{Point, Rect, Size};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub text: String,
    /// Center of the node.
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub subgraph_id: Option<String>,
}

impl Node {
    pub fn center(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_center(self.center(), self.size())
    }
}

/// Ordered (source, target) pair identifying a link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkKey {
    pub source: String,
    pub target: String,
}

impl LinkKey {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    fn unknown(&self) -> EditorError {
        EditorError::UnknownLink {
            from: self.source.clone(),
            to: self.target.clone(),
        }
    }
}

impl fmt::Display for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} --> {}", self.source, self.target)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub label: String,
}

impl Link {
    pub fn key(&self) -> LinkKey {
        LinkKey::new(self.source.clone(), self.target.clone())
    }

    pub fn matches(&self, key: &LinkKey) -> bool {
        self.source == key.source && self.target == key.target
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subgraph {
    pub id: String,
    pub title: String,
    /// Top-left corner.
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Subgraph {
    pub fn bounds(&self) -> Rect {
        Rect::from_origin(self.x, self.y, self.width, self.height)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub nodes: IndexSet<String>,
    pub links: IndexSet<LinkKey>,
    pub subgraph: Option<String>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty() && self.subgraph.is_none()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.links.clear();
        self.subgraph = None;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkingState {
    pub active: bool,
    pub pending_source: Option<String>,
}

/// A handle to one entity of the scene, by identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Node(String),
    Link(LinkKey),
    Subgraph(String),
}

/// The single text field an edit session writes back to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EditTarget {
    NodeText(String),
    LinkLabel(LinkKey),
    SubgraphTitle(String),
}

impl EditTarget {
    pub fn entity(&self) -> EntityRef {
        match self {
            EditTarget::NodeText(id) => EntityRef::Node(id.clone()),
            EditTarget::LinkLabel(key) => EntityRef::Link(key.clone()),
            EditTarget::SubgraphTitle(id) => EntityRef::Subgraph(id.clone()),
        }
    }
}

/// Source of fresh entity identifiers.
pub trait IdGenerator {
    fn next_id(&mut self, prefix: &str) -> String;
}

/// `{prefix}_{unix millis}_{0..1000}`.
///
/// Two ids minted in the same millisecond can collide; the scene rejects the
/// second insert with [`EditorError::DuplicateId`] instead of retrying.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClockIds;

impl IdGenerator for ClockIds {
    fn next_id(&mut self, prefix: &str) -> String {
        format!(
            "{prefix}_{}_{}",
            Utc::now().timestamp_millis(),
            rand::random_range(0..1000u32)
        )
    }
}

/// Deterministic `{prefix}_{n}` ids for scripted sessions and tests.
#[derive(Debug, Clone, Default)]
pub struct SequentialIds {
    next: u64,
}

impl IdGenerator for SequentialIds {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next += 1;
        format!("{prefix}_{}", self.next)
    }
}

#[derive(Debug, Clone, Copy)]
struct Limits {
    node_min: Size,
    node_default: Size,
    subgraph_min: f64,
}

pub struct Scene {
    nodes: IndexMap<String, Node>,
    links: Vec<Link>,
    subgraphs: IndexMap<String, Subgraph>,
    selection: Selection,
    linking: LinkingState,
    comments: String,
    limits: Limits,
    ids: Box<dyn IdGenerator>,
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("nodes", &self.nodes)
            .field("links", &self.links)
            .field("subgraphs", &self.subgraphs)
            .field("selection", &self.selection)
            .field("linking", &self.linking)
            .finish_non_exhaustive()
    }
}

impl Scene {
    pub fn new(config: &EditorConfig) -> Self {
        Self::with_id_generator(config, Box::new(ClockIds))
    }

    pub fn with_id_generator(config: &EditorConfig, ids: Box<dyn IdGenerator>) -> Self {
        Self {
            nodes: IndexMap::new(),
            links: Vec::new(),
            subgraphs: IndexMap::new(),
            selection: Selection::default(),
            linking: LinkingState::default(),
            comments: String::new(),
            limits: Limits {
                node_min: Size::new(config.node_min_width, config.node_min_height),
                node_default: Size::new(config.node_default_width, config.node_default_height),
                subgraph_min: config.subgraph_min_size,
            },
            ids,
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn link(&self, key: &LinkKey) -> Option<&Link> {
        self.links.iter().find(|link| link.matches(key))
    }

    pub fn subgraphs(&self) -> impl Iterator<Item = &Subgraph> {
        self.subgraphs.values()
    }

    pub fn subgraph(&self, id: &str) -> Option<&Subgraph> {
        self.subgraphs.get(id)
    }

    /// Resolves a node's subgraph reference. A reference to a deleted
    /// subgraph resolves to `None`.
    pub fn subgraph_of(&self, node_id: &str) -> Option<&Subgraph> {
        let subgraph_id = self.nodes.get(node_id)?.subgraph_id.as_deref()?;
        self.subgraphs.get(subgraph_id)
    }

    pub fn children_of<'a>(&'a self, subgraph_id: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.nodes
            .values()
            .filter(move |node| node.subgraph_id.as_deref() == Some(subgraph_id))
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn linking(&self) -> &LinkingState {
        &self.linking
    }

    pub fn comments(&self) -> &str {
        &self.comments
    }

    pub fn set_comments(&mut self, comments: impl Into<String>) {
        self.comments = comments.into();
    }

    pub fn min_node_size(&self) -> Size {
        self.limits.node_min
    }

    pub fn min_subgraph_size(&self) -> f64 {
        self.limits.subgraph_min
    }

    pub fn next_id(&mut self, prefix: &str) -> String {
        self.ids.next_id(prefix)
    }

    // --- Creation ---

    pub fn add_node(&mut self, text: impl Into<String>, center: Point) -> Result<String> {
        let id = self.ids.next_id("node");
        self.insert_node(id.clone(), text, center)?;
        Ok(id)
    }

    pub fn insert_node(
        &mut self,
        id: impl Into<String>,
        text: impl Into<String>,
        center: Point,
    ) -> Result<()> {
        let id = id.into();
        if self.nodes.contains_key(&id) {
            return Err(EditorError::DuplicateId(id));
        }

        let size = self.limits.node_default;
        self.nodes.insert(
            id.clone(),
            Node {
                id,
                text: text.into(),
                x: center.x,
                y: center.y,
                width: size.width,
                height: size.height,
                subgraph_id: None,
            },
        );
        Ok(())
    }

    pub fn add_link(&mut self, source: &str, target: &str) -> Result<LinkKey> {
        if source == target {
            return Err(EditorError::SelfLoop(source.to_string()));
        }
        for endpoint in [source, target] {
            if !self.nodes.contains_key(endpoint) {
                return Err(EditorError::UnknownNode(endpoint.to_string()));
            }
        }

        let key = LinkKey::new(source, target);
        if self.link(&key).is_some() {
            return Err(EditorError::DuplicateLink {
                from: key.source,
                to: key.target,
            });
        }

        self.links.push(Link {
            source: key.source.clone(),
            target: key.target.clone(),
            label: String::new(),
        });
        Ok(key)
    }

    pub fn add_subgraph(&mut self, title: impl Into<String>, bounds: Rect) -> Result<String> {
        let id = self.ids.next_id("sg");
        self.insert_subgraph(id.clone(), title, bounds)?;
        Ok(id)
    }

    pub fn insert_subgraph(
        &mut self,
        id: impl Into<String>,
        title: impl Into<String>,
        bounds: Rect,
    ) -> Result<()> {
        let id = id.into();
        if self.subgraphs.contains_key(&id) {
            return Err(EditorError::DuplicateId(id));
        }
        self.check_subgraph_size(bounds.width(), bounds.height())?;

        self.subgraphs.insert(
            id.clone(),
            Subgraph {
                id,
                title: title.into(),
                x: bounds.min_x,
                y: bounds.min_y,
                width: bounds.width(),
                height: bounds.height(),
            },
        );
        Ok(())
    }

    // --- Deletion ---

    /// Removes the nodes and every link touching them. Returns how many
    /// nodes were removed.
    pub fn delete_nodes(&mut self, ids: &[String]) -> usize {
        let mut removed = 0;
        for id in ids {
            if self.nodes.shift_remove(id).is_some() {
                removed += 1;
                self.selection.nodes.shift_remove(id);
                if self.linking.pending_source.as_deref() == Some(id.as_str()) {
                    self.linking.pending_source = None;
                }
            }
        }

        if removed > 0 {
            let dropped = self.prune_dangling_links();
            debug!(nodes = removed, links = dropped; "Deleted nodes");
        }
        removed
    }

    pub fn delete_links(&mut self, keys: &[LinkKey]) -> usize {
        let before = self.links.len();
        self.links
            .retain(|link| !keys.iter().any(|key| link.matches(key)));
        for key in keys {
            self.selection.links.shift_remove(key);
        }
        before - self.links.len()
    }

    /// Removes the subgraph and detaches (never deletes) its children.
    pub fn delete_subgraph(&mut self, id: &str) -> bool {
        if self.subgraphs.shift_remove(id).is_none() {
            return false;
        }

        for node in self.nodes.values_mut() {
            if node.subgraph_id.as_deref() == Some(id) {
                node.subgraph_id = None;
            }
        }
        if self.selection.subgraph.as_deref() == Some(id) {
            self.selection.subgraph = None;
        }
        true
    }

    /// Drops links whose source or target no longer exists.
    pub fn prune_dangling_links(&mut self) -> usize {
        let before = self.links.len();
        let nodes = &self.nodes;
        self.links
            .retain(|link| nodes.contains_key(&link.source) && nodes.contains_key(&link.target));
        let selection = &mut self.selection;
        let links = &self.links;
        selection
            .links
            .retain(|key| links.iter().any(|link| link.matches(key)));
        before - self.links.len()
    }

    // --- Node mutators ---

    fn node_mut(&mut self, id: &str) -> Result<&mut Node> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| EditorError::UnknownNode(id.to_string()))
    }

    pub fn set_node_position(&mut self, id: &str, center: Point) -> Result<()> {
        let node = self.node_mut(id)?;
        node.x = center.x;
        node.y = center.y;
        Ok(())
    }

    pub fn translate_node(&mut self, id: &str, dx: f64, dy: f64) -> Result<()> {
        let node = self.node_mut(id)?;
        node.x += dx;
        node.y += dy;
        Ok(())
    }

    pub fn set_node_size(&mut self, id: &str, size: Size) -> Result<()> {
        self.check_node_size(size)?;
        let node = self.node_mut(id)?;
        node.width = size.width;
        node.height = size.height;
        Ok(())
    }

    /// Moves and resizes in one validated step.
    pub fn set_node_geometry(&mut self, id: &str, center: Point, size: Size) -> Result<()> {
        self.check_node_size(size)?;
        let node = self.node_mut(id)?;
        node.x = center.x;
        node.y = center.y;
        node.width = size.width;
        node.height = size.height;
        Ok(())
    }

    pub fn set_node_text(&mut self, id: &str, text: impl Into<String>) -> Result<()> {
        self.node_mut(id)?.text = text.into();
        Ok(())
    }

    pub fn set_node_subgraph(&mut self, id: &str, subgraph_id: Option<&str>) -> Result<()> {
        if let Some(subgraph_id) = subgraph_id {
            if !self.subgraphs.contains_key(subgraph_id) {
                return Err(EditorError::UnknownSubgraph(subgraph_id.to_string()));
            }
        }
        self.node_mut(id)?.subgraph_id = subgraph_id.map(str::to_string);
        Ok(())
    }

    fn check_node_size(&self, size: Size) -> Result<()> {
        let min = self.limits.node_min;
        if size.width < min.width || size.height < min.height {
            return Err(EditorError::BelowMinimumSize {
                entity: "node",
                width: size.width,
                height: size.height,
                min_width: min.width,
                min_height: min.height,
            });
        }
        Ok(())
    }

    // --- Link mutators ---

    pub fn set_link_label(&mut self, key: &LinkKey, label: impl Into<String>) -> Result<()> {
        let link = self
            .links
            .iter_mut()
            .find(|link| link.matches(key))
            .ok_or_else(|| key.unknown())?;
        link.label = label.into();
        Ok(())
    }

    // --- Subgraph mutators ---

    fn subgraph_mut(&mut self, id: &str) -> Result<&mut Subgraph> {
        self.subgraphs
            .get_mut(id)
            .ok_or_else(|| EditorError::UnknownSubgraph(id.to_string()))
    }

    pub fn set_subgraph_title(&mut self, id: &str, title: impl Into<String>) -> Result<()> {
        self.subgraph_mut(id)?.title = title.into();
        Ok(())
    }

    pub fn set_subgraph_bounds(&mut self, id: &str, bounds: Rect) -> Result<()> {
        self.check_subgraph_size(bounds.width(), bounds.height())?;
        let subgraph = self.subgraph_mut(id)?;
        subgraph.x = bounds.min_x;
        subgraph.y = bounds.min_y;
        subgraph.width = bounds.width();
        subgraph.height = bounds.height();
        Ok(())
    }

    /// Translates the subgraph together with every node assigned to it.
    pub fn move_subgraph(&mut self, id: &str, dx: f64, dy: f64) -> Result<()> {
        let subgraph = self.subgraph_mut(id)?;
        subgraph.x += dx;
        subgraph.y += dy;
        for node in self.nodes.values_mut() {
            if node.subgraph_id.as_deref() == Some(id) {
                node.x += dx;
                node.y += dy;
            }
        }
        Ok(())
    }

    fn check_subgraph_size(&self, width: f64, height: f64) -> Result<()> {
        let min = self.limits.subgraph_min;
        if width < min || height < min {
            return Err(EditorError::BelowMinimumSize {
                entity: "subgraph",
                width,
                height,
                min_width: min,
                min_height: min,
            });
        }
        Ok(())
    }

    // --- Selection ---

    /// Toggles the node when `multi` is set, otherwise makes it the only
    /// selected item.
    pub fn select_node(&mut self, id: &str, multi: bool) -> bool {
        if !self.nodes.contains_key(id) {
            return false;
        }
        if !multi {
            self.selection.clear();
        }
        if !self.selection.nodes.shift_remove(id) {
            self.selection.nodes.insert(id.to_string());
        }
        self.selection.subgraph = None;
        true
    }

    pub fn select_link(&mut self, key: &LinkKey, multi: bool) -> bool {
        if self.link(key).is_none() {
            return false;
        }
        if !multi {
            self.selection.clear();
        }
        if !self.selection.links.shift_remove(key) {
            self.selection.links.insert(key.clone());
        }
        self.selection.subgraph = None;
        true
    }

    pub fn select_subgraph(&mut self, id: &str) -> bool {
        if !self.subgraphs.contains_key(id) {
            return false;
        }
        self.selection.clear();
        self.selection.subgraph = Some(id.to_string());
        true
    }

    /// Adds to the selection without toggling, as a marquee does.
    pub fn extend_selection(&mut self, nodes: Vec<String>, links: Vec<LinkKey>) {
        self.selection.nodes.extend(nodes);
        self.selection.links.extend(links);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn single_selected_node(&self) -> Option<&Node> {
        if self.selection.nodes.len() != 1 {
            return None;
        }
        self.selection.nodes.first().and_then(|id| self.nodes.get(id))
    }

    pub fn single_selected_link(&self) -> Option<&Link> {
        if self.selection.links.len() != 1 {
            return None;
        }
        self.selection.links.first().and_then(|key| self.link(key))
    }

    pub fn selected_subgraph(&self) -> Option<&Subgraph> {
        self.selection
            .subgraph
            .as_deref()
            .and_then(|id| self.subgraphs.get(id))
    }

    // --- Linking ---

    pub fn start_linking(&mut self) {
        self.linking = LinkingState {
            active: true,
            pending_source: None,
        };
    }

    pub fn stop_linking(&mut self) {
        self.linking = LinkingState::default();
    }

    pub fn set_pending_source(&mut self, node_id: Option<String>) {
        self.linking.pending_source = node_id;
    }
}
