//! Editing core for Mermaid flowcharts.
//!
//! A [`Scene`] holds nodes, links and subgraphs. The [`Controller`] turns
//! pointer and keyboard input into scene mutations, [`render::project`]
//! turns the scene into drawable shapes, and [`to_mermaid`] emits the
//! diagram text after every change.

pub mod config;
pub mod error;
pub mod geometry;
pub mod interaction;
pub mod layout;
pub mod render;
pub mod scene;
pub mod serialize;

pub use config::EditorConfig;
pub use error::EditorError;
pub use geometry::{Point, Rect, Segment, Size, intersect, link_path};
pub use interaction::{
    Controller, EditRequest, Hit, InteractionState, Key, Modifiers, Update, hit_test,
};
pub use layout::{AutoFit, FitMode, FixedWidthMeasurer, TextMeasurer, TextMetrics};
pub use render::{Handle, Overlay, RenderScene, Surface, SvgSurface};
pub use scene::{
    ClockIds, EditTarget, EntityRef, IdGenerator, Link, LinkKey, Node, Scene, SequentialIds,
    Subgraph,
};
pub use serialize::to_mermaid;
