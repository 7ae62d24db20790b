//! Projection of the scene into drawable primitives, plus an SVG surface and
//! optional PNG rasterisation.
//!
//! [`project`] holds no editing logic: it reads the scene and an [`Overlay`]
//! describing transient controller state, and produces a [`RenderScene`].
//! Anything that can draw rectangles, text and lines can paint it through the
//! [`Surface`] trait.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::config::EditorConfig;
use crate::error::Result;
use crate::geometry::{Point, Rect, Segment, Size, link_path};
use crate::scene::{EditTarget, EntityRef, LinkKey, Scene};

const LABEL_PADDING: f64 = 4.0;
const LINK_EDITOR_SIZE: Size = Size::new(100.0, 30.0);
const TITLE_EDITOR_WIDTH: f64 = 150.0;
const SVG_LINE_HEIGHT: f64 = 16.0;
const SVG_MARGIN: f64 = 20.0;

/// Corner grip of a resizable entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Handle {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Handle {
    pub const ALL: [Handle; 4] = [
        Handle::TopLeft,
        Handle::TopRight,
        Handle::BottomLeft,
        Handle::BottomRight,
    ];

    pub fn moves_left(self) -> bool {
        matches!(self, Handle::TopLeft | Handle::BottomLeft)
    }

    pub fn moves_top(self) -> bool {
        matches!(self, Handle::TopLeft | Handle::TopRight)
    }

    pub fn corner(self, bounds: &Rect) -> Point {
        let x = if self.moves_left() { bounds.min_x } else { bounds.max_x };
        let y = if self.moves_top() { bounds.min_y } else { bounds.max_y };
        Point::new(x, y)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubgraphShape {
    pub id: String,
    pub rect: Rect,
    pub title_bar: Rect,
    pub title: String,
    pub title_visible: bool,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkShape {
    pub key: LinkKey,
    pub segment: Segment,
    pub label: String,
    pub label_anchor: Point,
    /// Backing box of a non-empty, visible label.
    pub label_rect: Option<Rect>,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeShape {
    pub id: String,
    pub rect: Rect,
    pub text: String,
    pub text_visible: bool,
    pub selected: bool,
    /// Pending source of a link being drawn.
    pub link_source: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandleShape {
    pub handle: Handle,
    pub rect: Rect,
}

/// Text editor box shown while an edit session is open.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorOverlay {
    pub target: EditTarget,
    pub rect: Rect,
    pub text: String,
}

/// Controller state the scene itself does not hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overlay {
    pub marquee: Option<Rect>,
    pub editor: Option<EditorOverlay>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderScene {
    pub subgraphs: Vec<SubgraphShape>,
    pub links: Vec<LinkShape>,
    pub nodes: Vec<NodeShape>,
    pub handles: Vec<HandleShape>,
    pub marquee: Option<Rect>,
    pub editor: Option<EditorOverlay>,
}

/// Builds the drawable view of `scene`. Links with a missing endpoint are
/// left out.
pub fn project(scene: &Scene, config: &EditorConfig, overlay: &Overlay) -> RenderScene {
    let selection = scene.selection();
    let editing = overlay.editor.as_ref().map(|editor| &editor.target);

    let subgraphs = scene
        .subgraphs()
        .map(|subgraph| {
            let rect = subgraph.bounds();
            SubgraphShape {
                id: subgraph.id.clone(),
                rect,
                title_bar: title_bar(&rect, config.subgraph_title_height),
                title: subgraph.title.clone(),
                title_visible: !matches!(editing, Some(EditTarget::SubgraphTitle(id)) if *id == subgraph.id),
                selected: selection.subgraph.as_deref() == Some(subgraph.id.as_str()),
            }
        })
        .collect();

    let links = scene
        .links()
        .iter()
        .filter_map(|link| {
            let segment = link_path(scene.node(&link.source), scene.node(&link.target))?;
            let key = link.key();
            let label_visible = !matches!(editing, Some(EditTarget::LinkLabel(edited)) if *edited == key);
            let label_anchor = segment.midpoint();
            let label_rect = (label_visible && !link.label.is_empty())
                .then(|| label_rect(label_anchor, &link.label, config));
            Some(LinkShape {
                selected: selection.links.contains(&key),
                key,
                segment,
                label: link.label.clone(),
                label_anchor,
                label_rect,
            })
        })
        .collect();

    let pending = scene.linking().pending_source.as_deref();
    let nodes = scene
        .nodes()
        .map(|node| NodeShape {
            id: node.id.clone(),
            rect: node.bounds(),
            text: node.text.clone(),
            text_visible: !matches!(editing, Some(EditTarget::NodeText(id)) if *id == node.id),
            selected: selection.nodes.contains(&node.id),
            link_source: pending == Some(node.id.as_str()),
        })
        .collect();

    RenderScene {
        subgraphs,
        links,
        nodes,
        handles: resize_handles(scene, config.handle_size),
        marquee: overlay.marquee,
        editor: overlay.editor.clone(),
    }
}

/// The one entity that shows resize handles: the selected subgraph, or a
/// node when it is the whole selection.
pub fn resizable_selection(scene: &Scene) -> Option<EntityRef> {
    if let Some(subgraph) = scene.selected_subgraph() {
        return Some(EntityRef::Subgraph(subgraph.id.clone()));
    }
    if !scene.selection().links.is_empty() {
        return None;
    }
    scene
        .single_selected_node()
        .map(|node| EntityRef::Node(node.id.clone()))
}

pub fn entity_bounds(scene: &Scene, entity: &EntityRef) -> Option<Rect> {
    match entity {
        EntityRef::Node(id) => scene.node(id).map(|node| node.bounds()),
        EntityRef::Subgraph(id) => scene.subgraph(id).map(|subgraph| subgraph.bounds()),
        EntityRef::Link(key) => {
            let link = scene.link(key)?;
            let segment = link_path(scene.node(&link.source), scene.node(&link.target))?;
            Some(Rect::from_corners(segment.start, segment.end))
        }
    }
}

pub fn resize_handles(scene: &Scene, handle_size: f64) -> Vec<HandleShape> {
    let Some(bounds) = resizable_selection(scene).and_then(|entity| entity_bounds(scene, &entity))
    else {
        return Vec::new();
    };

    Handle::ALL
        .into_iter()
        .map(|handle| HandleShape {
            handle,
            rect: Rect::from_center(handle.corner(&bounds), Size::new(handle_size, handle_size)),
        })
        .collect()
}

pub fn title_bar(bounds: &Rect, title_height: f64) -> Rect {
    Rect::from_origin(
        bounds.min_x,
        bounds.min_y,
        bounds.width(),
        title_height.min(bounds.height()),
    )
}

/// Box a link label occupies around `anchor`.
pub fn label_rect(anchor: Point, label: &str, config: &EditorConfig) -> Rect {
    let lines = label.lines().count().max(1);
    let longest = label.lines().map(|line| line.chars().count()).max().unwrap_or(0);
    Rect::from_center(
        anchor,
        Size::new(
            longest as f64 * config.char_width + 2.0 * LABEL_PADDING,
            lines as f64 * config.line_height + LABEL_PADDING,
        ),
    )
}

/// Where the text editor opens for `target`, or `None` if it no longer
/// exists.
pub fn editor_rect(scene: &Scene, config: &EditorConfig, target: &EditTarget) -> Option<Rect> {
    match target {
        EditTarget::NodeText(id) => scene.node(id).map(|node| node.bounds()),
        EditTarget::SubgraphTitle(id) => {
            let bar = title_bar(&scene.subgraph(id)?.bounds(), config.subgraph_title_height);
            Some(Rect::from_center(
                bar.center(),
                Size::new(TITLE_EDITOR_WIDTH, bar.height()),
            ))
        }
        EditTarget::LinkLabel(key) => {
            let source = scene.node(&key.source)?;
            let target = scene.node(&key.target)?;
            let center = Segment {
                start: source.center(),
                end: target.center(),
            }
            .midpoint();
            Some(Rect::from_center(center, LINK_EDITOR_SIZE))
        }
    }
}

/// Paint roles a surface maps to its own styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Subgraph { selected: bool },
    TitleBar,
    Link { selected: bool },
    Label,
    Node { selected: bool, link_source: bool },
    Handle,
    Marquee,
    Editor,
}

/// A drawing target.
pub trait Surface {
    fn rect(&mut self, rect: Rect, role: Role) -> Result<()>;

    /// Draws `text` centred in `rect`, clipped to it when `clip` is set.
    fn text(&mut self, rect: Rect, text: &str, clip: bool) -> Result<()>;

    fn line(&mut self, segment: Segment, role: Role, arrowhead: bool) -> Result<()>;
}

impl RenderScene {
    /// Paints back to front: subgraphs, links, nodes, handles, marquee,
    /// editor.
    pub fn paint(&self, surface: &mut dyn Surface) -> Result<()> {
        for subgraph in &self.subgraphs {
            surface.rect(subgraph.rect, Role::Subgraph { selected: subgraph.selected })?;
            surface.rect(subgraph.title_bar, Role::TitleBar)?;
            if subgraph.title_visible {
                surface.text(subgraph.title_bar, &subgraph.title, true)?;
            }
        }

        for link in &self.links {
            surface.line(link.segment, Role::Link { selected: link.selected }, true)?;
            if let Some(rect) = link.label_rect {
                surface.rect(rect, Role::Label)?;
                surface.text(rect, &link.label, false)?;
            }
        }

        for node in &self.nodes {
            surface.rect(
                node.rect,
                Role::Node {
                    selected: node.selected,
                    link_source: node.link_source,
                },
            )?;
            if node.text_visible {
                surface.text(node.rect, &node.text, true)?;
            }
        }

        for handle in &self.handles {
            surface.rect(handle.rect, Role::Handle)?;
        }

        if let Some(marquee) = self.marquee {
            surface.rect(marquee, Role::Marquee)?;
        }

        if let Some(editor) = &self.editor {
            surface.rect(editor.rect, Role::Editor)?;
            surface.text(editor.rect, &editor.text, true)?;
        }
        Ok(())
    }

    /// Smallest rectangle covering every shape, or `None` for an empty
    /// scene.
    pub fn extent(&self) -> Option<Rect> {
        let rects = self
            .subgraphs
            .iter()
            .map(|shape| shape.rect)
            .chain(self.nodes.iter().map(|shape| shape.rect))
            .chain(
                self.links
                    .iter()
                    .map(|shape| Rect::from_corners(shape.segment.start, shape.segment.end)),
            )
            .chain(self.links.iter().filter_map(|shape| shape.label_rect))
            .chain(self.handles.iter().map(|shape| shape.rect))
            .chain(self.marquee)
            .chain(self.editor.as_ref().map(|editor| editor.rect));

        rects.reduce(|acc, rect| Rect {
            min_x: acc.min_x.min(rect.min_x),
            min_y: acc.min_y.min(rect.min_y),
            max_x: acc.max_x.max(rect.max_x),
            max_y: acc.max_y.max(rect.max_y),
        })
    }
}

/// Accumulates SVG elements; [`SvgSurface::finish`] wraps them into a
/// standalone document.
#[derive(Debug, Default)]
pub struct SvgSurface {
    body: String,
    clips: usize,
}

impl SvgSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self, view: Rect, background: &str) -> Result<String> {
        let mut svg = String::new();
        write!(
            svg,
            r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{:.0}" height="{:.0}" viewBox="{:.1} {:.1} {:.1} {:.1}" font-family="Inter, system-ui, sans-serif">
  <defs>
    <marker id="arrowhead" markerWidth="10" markerHeight="7" refX="10" refY="3.5" orient="auto">
      <path d="M0,0 L10,3.5 L0,7 z" fill="context-stroke" />
    </marker>
  </defs>
  <rect x="{:.1}" y="{:.1}" width="100%" height="100%" fill="{}" />
"##,
            view.width(),
            view.height(),
            view.min_x,
            view.min_y,
            view.width(),
            view.height(),
            view.min_x,
            view.min_y,
            escape_xml(background)
        )?;
        svg.push_str(&self.body);
        svg.push_str("</svg>\n");
        Ok(svg)
    }
}

impl Surface for SvgSurface {
    fn rect(&mut self, rect: Rect, role: Role) -> Result<()> {
        let (fill, stroke, extra) = match role {
            Role::Subgraph { selected } => (
                "#f7fafc",
                if selected { "#2563eb" } else { "#a0aec0" },
                " rx=\"6\" ry=\"6\"",
            ),
            Role::TitleBar => ("#e2e8f0", "none", ""),
            Role::Label => ("#ffffff", "none", " rx=\"3\" ry=\"3\""),
            Role::Node {
                selected,
                link_source,
            } => (
                "#fde68a",
                if link_source {
                    "#16a34a"
                } else if selected {
                    "#2563eb"
                } else {
                    "#2d3748"
                },
                " rx=\"8\" ry=\"8\"",
            ),
            Role::Handle => ("#ffffff", "#2563eb", ""),
            Role::Marquee => ("#2563eb", "#2563eb", " fill-opacity=\"0.1\" stroke-dasharray=\"4 3\""),
            Role::Editor => ("#ffffff", "#2563eb", ""),
            Role::Link { .. } => ("none", "#2d3748", ""),
        };

        writeln!(
            self.body,
            "  <rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" fill=\"{}\" stroke=\"{}\" stroke-width=\"2\"{} />",
            rect.min_x,
            rect.min_y,
            rect.width(),
            rect.height(),
            fill,
            stroke,
            extra
        )?;
        Ok(())
    }

    fn text(&mut self, rect: Rect, text: &str, clip: bool) -> Result<()> {
        let clip_attr = if clip {
            self.clips += 1;
            writeln!(
                self.body,
                "  <clipPath id=\"clip-{}\"><rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" /></clipPath>",
                self.clips,
                rect.min_x,
                rect.min_y,
                rect.width(),
                rect.height()
            )?;
            format!(" clip-path=\"url(#clip-{})\"", self.clips)
        } else {
            String::new()
        };

        let lines: Vec<&str> = text.split('\n').collect();
        let center = rect.center();
        let start_y = center.y - SVG_LINE_HEIGHT * (lines.len() as f64 - 1.0) / 2.0;

        writeln!(
            self.body,
            "  <text x=\"{:.1}\" fill=\"#1a202c\" font-size=\"14\" text-anchor=\"middle\" xml:space=\"preserve\"{}>",
            center.x, clip_attr
        )?;
        for (index, line) in lines.iter().enumerate() {
            writeln!(
                self.body,
                "    <tspan x=\"{:.1}\" y=\"{:.1}\" dominant-baseline=\"middle\">{}</tspan>",
                center.x,
                start_y + SVG_LINE_HEIGHT * index as f64,
                escape_xml(line)
            )?;
        }
        self.body.push_str("  </text>\n");
        Ok(())
    }

    fn line(&mut self, segment: Segment, role: Role, arrowhead: bool) -> Result<()> {
        let stroke = match role {
            Role::Link { selected: true } => "#2563eb",
            _ => "#2d3748",
        };
        let marker = if arrowhead {
            " marker-end=\"url(#arrowhead)\""
        } else {
            ""
        };
        writeln!(
            self.body,
            "  <line x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" stroke=\"{}\" stroke-width=\"2\"{} />",
            segment.start.x, segment.start.y, segment.end.x, segment.end.y, stroke, marker
        )?;
        Ok(())
    }
}

/// Renders a projected scene as a standalone SVG document. An empty scene
/// yields an empty canvas of the configured size.
pub fn render_svg(render: &RenderScene, config: &EditorConfig, background: &str) -> Result<String> {
    let view = render
        .extent()
        .map(|rect| rect.inflate(SVG_MARGIN))
        .unwrap_or_else(|| Rect::from_origin(0.0, 0.0, config.canvas_width, config.canvas_height));

    let mut surface = SvgSurface::new();
    render.paint(&mut surface)?;
    surface.finish(view, background)
}

#[cfg(feature = "png")]
pub fn render_png(svg: &str, scale: f32) -> Result<Vec<u8>> {
    use crate::error::EditorError;
    use resvg::usvg::{Options, Tree};
    use tiny_skia::{Pixmap, Transform};

    if scale <= 0.0 {
        return Err(EditorError::Raster("scale must be greater than zero".to_string()));
    }

    let mut options = Options::default();
    options.font_family = "Inter".to_string();
    options.fontdb_mut().load_system_fonts();

    let tree = Tree::from_str(svg, &options)
        .map_err(|err| EditorError::Raster(format!("generated svg did not parse: {err}")))?;

    let size = tree.size().to_int_size();
    let scaled_width = (size.width() as f32 * scale).ceil();
    let scaled_height = (size.height() as f32 * scale).ceil();

    if !scaled_width.is_finite() || !scaled_height.is_finite() {
        return Err(EditorError::Raster(
            "scaled dimensions are not finite; try a smaller scale factor".to_string(),
        ));
    }
    if scaled_width < 1.0 || scaled_height < 1.0 {
        return Err(EditorError::Raster(
            "scaled dimensions collapsed below 1px; try a larger scale factor".to_string(),
        ));
    }
    if scaled_width > u32::MAX as f32 || scaled_height > u32::MAX as f32 {
        return Err(EditorError::Raster(
            "scaled dimensions exceed supported limits; try a smaller scale factor".to_string(),
        ));
    }

    let (width, height) = (scaled_width as u32, scaled_height as u32);
    let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
        EditorError::Raster(format!("failed to allocate a {width}x{height} surface"))
    })?;

    resvg::render(&tree, Transform::from_scale(scale, scale), &mut pixmap.as_mut());

    pixmap
        .encode_png()
        .map_err(|err| EditorError::Raster(format!("failed to encode png: {err}")))
}

pub fn escape_xml(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SequentialIds;

    fn scene() -> Scene {
        let mut scene =
            Scene::with_id_generator(&EditorConfig::default(), Box::<SequentialIds>::default());
        scene.insert_node("A", "Start", Point::new(100.0, 100.0)).unwrap();
        scene.insert_node("B", "End", Point::new(100.0, 300.0)).unwrap();
        scene.add_link("A", "B").unwrap();
        scene
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl Surface for Recorder {
        fn rect(&mut self, _rect: Rect, role: Role) -> Result<()> {
            self.calls.push(format!("rect {role:?}"));
            Ok(())
        }

        fn text(&mut self, _rect: Rect, text: &str, _clip: bool) -> Result<()> {
            self.calls.push(format!("text {text}"));
            Ok(())
        }

        fn line(&mut self, _segment: Segment, _role: Role, arrowhead: bool) -> Result<()> {
            self.calls.push(format!("line {arrowhead}"));
            Ok(())
        }
    }

    #[test]
    fn nodes_are_drawn_around_their_center() {
        let render = project(&scene(), &EditorConfig::default(), &Overlay::default());
        assert_eq!(render.nodes[0].rect, Rect::from_origin(40.0, 70.0, 120.0, 60.0));
    }

    #[test]
    fn link_runs_between_facing_borders() {
        let render = project(&scene(), &EditorConfig::default(), &Overlay::default());
        let link = &render.links[0];
        assert_eq!(link.segment.start, Point::new(100.0, 130.0));
        assert_eq!(link.segment.end, Point::new(100.0, 270.0));
        assert_eq!(link.label_anchor, Point::new(100.0, 200.0));
        assert!(link.label_rect.is_none());
    }

    #[test]
    fn handles_follow_a_single_resizable_selection() {
        let config = EditorConfig::default();
        let mut scene = scene();
        assert!(project(&scene, &config, &Overlay::default()).handles.is_empty());

        scene.select_node("A", false);
        let handles = project(&scene, &config, &Overlay::default()).handles;
        assert_eq!(handles.len(), 4);
        assert_eq!(handles[0].rect.center(), Point::new(40.0, 70.0));
        assert_eq!(handles[3].rect.center(), Point::new(160.0, 130.0));

        scene.select_node("B", true);
        assert!(project(&scene, &config, &Overlay::default()).handles.is_empty());

        scene
            .insert_subgraph("SG", "Group", Rect::from_origin(0.0, 0.0, 300.0, 250.0))
            .unwrap();
        scene.select_subgraph("SG");
        let handles = project(&scene, &config, &Overlay::default()).handles;
        assert_eq!(handles[1].rect.center(), Point::new(300.0, 0.0));
    }

    #[test]
    fn edited_text_is_hidden_behind_the_editor() {
        let config = EditorConfig::default();
        let scene = scene();
        let target = EditTarget::NodeText("A".to_string());
        let overlay = Overlay {
            marquee: None,
            editor: Some(EditorOverlay {
                rect: editor_rect(&scene, &config, &target).unwrap(),
                target,
                text: "Sta".to_string(),
            }),
        };

        let render = project(&scene, &config, &overlay);
        assert!(!render.nodes[0].text_visible);
        assert!(render.nodes[1].text_visible);
        assert_eq!(render.editor.unwrap().rect, render.nodes[0].rect);
    }

    #[test]
    fn link_editor_sits_between_node_centers() {
        let scene = scene();
        let rect = editor_rect(
            &scene,
            &EditorConfig::default(),
            &EditTarget::LinkLabel(LinkKey::new("A", "B")),
        )
        .unwrap();
        assert_eq!(rect, Rect::from_origin(50.0, 185.0, 100.0, 30.0));
    }

    #[test]
    fn paints_back_to_front() {
        let mut scene = scene();
        scene
            .insert_subgraph("SG", "Group", Rect::from_origin(0.0, 0.0, 300.0, 400.0))
            .unwrap();
        scene.set_link_label(&LinkKey::new("A", "B"), "go").unwrap();
        scene.select_node("A", false);

        let render = project(&scene, &EditorConfig::default(), &Overlay::default());
        let mut recorder = Recorder::default();
        render.paint(&mut recorder).unwrap();

        let calls: Vec<&str> = recorder.calls.iter().map(String::as_str).collect();
        assert_eq!(
            &calls[..7],
            &[
                "rect Subgraph { selected: false }",
                "rect TitleBar",
                "text Group",
                "line true",
                "rect Label",
                "text go",
                "rect Node { selected: true, link_source: false }",
            ]
        );
        assert_eq!(calls.iter().filter(|call| **call == "rect Handle").count(), 4);
    }

    #[test]
    fn svg_is_standalone_and_escaped() {
        let mut scene = scene();
        scene.set_node_text("A", "a < b & \"c\"").unwrap();
        let config = EditorConfig::default();
        let svg = render_svg(&project(&scene, &config, &Overlay::default()), &config, "white").unwrap();

        assert!(svg.starts_with("<?xml"));
        assert!(svg.contains("marker-end=\"url(#arrowhead)\""));
        assert!(svg.contains("a &lt; b &amp; &quot;c&quot;"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn empty_scene_uses_the_canvas_size() {
        let config = EditorConfig::default();
        let scene = Scene::new(&config);
        let svg = render_svg(&project(&scene, &config, &Overlay::default()), &config, "white").unwrap();
        assert!(svg.contains("viewBox=\"0.0 0.0 800.0 600.0\""));
    }

    #[cfg(feature = "png")]
    #[test]
    fn png_rejects_non_positive_scale() {
        let config = EditorConfig::default();
        let svg = render_svg(&project(&scene(), &config, &Overlay::default()), &config, "white").unwrap();
        assert!(render_png(&svg, 0.0).is_err());
    }
}
