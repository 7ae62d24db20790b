use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::{ArgAction, Parser, ValueEnum};
use log::{debug, info};
use serde::Deserialize;

use oxflow::render::render_svg;
use oxflow::{
    Controller, EditorConfig, FixedWidthMeasurer, Key, LinkKey, Modifiers, Point, Rect, Scene,
    SequentialIds, Update,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum InputSource {
    Stdin,
    File(PathBuf),
}

#[derive(Debug, Clone)]
enum OutputDestination {
    Stdout,
    File(PathBuf),
}

#[derive(Debug, Parser)]
#[command(
    name = "oxflow",
    about = "Replay editing gestures against a flowchart and emit Mermaid, SVG or PNG."
)]
pub struct Args {
    /// Path to the JSON replay script. Use '-' to read from stdin.
    #[arg(short = 'i', long = "input")]
    input: Option<String>,

    /// Path to the output file. Use '-' to write to stdout.
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Output format (defaults to the output file extension, or mermaid on stdout).
    #[arg(short = 'e', long = "output-format")]
    output_format: Option<OutputFormat>,

    /// Convenience flag to force PNG output without specifying --output-format.
    #[arg(long = "png", action = ArgAction::SetTrue, conflicts_with = "output_format")]
    png: bool,

    /// Scale factor when rasterizing PNG output.
    #[arg(long = "scale", default_value_t = 2.0)]
    scale: f32,

    /// JSON file overriding editor sizes and thresholds.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Background color for svg and png output.
    #[arg(short = 'b', long = "background-color", default_value = "white")]
    background_color: String,

    /// Mint ids as `node_1`, `sg_2`, ... instead of clock-based ids.
    #[arg(long = "sequential-ids", action = ArgAction::SetTrue)]
    sequential_ids: bool,

    /// Suppress informational output.
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue)]
    quiet: bool,

    /// Log level (off, error, warn, info, debug, trace).
    #[arg(long = "log-level", default_value = "warn")]
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Mermaid,
    Svg,
    Png,
}

impl OutputFormat {
    fn from_path(path: &Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
        {
            Some(ext) if ext == "mmd" || ext == "mermaid" => Some(OutputFormat::Mermaid),
            Some(ext) if ext == "svg" => Some(OutputFormat::Svg),
            Some(ext) if ext == "png" => Some(OutputFormat::Png),
            _ => None,
        }
    }
}

/// One replayed gesture or command.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
enum Step {
    AddNode,
    InsertNode {
        id: String,
        text: Option<String>,
        x: f64,
        y: f64,
    },
    AddSubgraph,
    InsertSubgraph {
        id: String,
        title: Option<String>,
        x: f64,
        y: f64,
        width: Option<f64>,
        height: Option<f64>,
    },
    ToggleLinking,
    CancelLinking,
    PointerDown {
        x: f64,
        y: f64,
        #[serde(default)]
        ctrl: bool,
        #[serde(default)]
        shift: bool,
    },
    PointerMove {
        x: f64,
        y: f64,
    },
    PointerUp {
        x: f64,
        y: f64,
    },
    Click {
        x: f64,
        y: f64,
        #[serde(default)]
        ctrl: bool,
    },
    Drag {
        from: [f64; 2],
        to: [f64; 2],
    },
    DoubleClick {
        x: f64,
        y: f64,
    },
    TypeText {
        text: String,
    },
    CommitText,
    CancelText,
    Key {
        key: String,
        #[serde(default)]
        ctrl: bool,
        #[serde(default)]
        shift: bool,
    },
    DeleteSelected,
    SetNodeText {
        id: String,
        text: String,
    },
    SetLinkLabel {
        source: String,
        target: String,
        label: String,
    },
    SetSubgraphTitle {
        id: String,
        title: String,
    },
    SetNodeSubgraph {
        id: String,
        subgraph: Option<String>,
    },
    SetComments {
        text: String,
    },
}

#[derive(Debug, Deserialize)]
struct Script {
    steps: Vec<Step>,
}

pub fn run(args: &Args) -> Result<()> {
    let input_source = parse_input(args.input.as_deref())?;
    let format_preference = if args.png {
        Some(OutputFormat::Png)
    } else {
        args.output_format
    };

    let output_dest = parse_output(args.output.as_deref())?;
    let format = determine_format(format_preference, &output_dest)?;

    if format == OutputFormat::Png && args.scale <= 0.0 {
        bail!("--scale must be greater than zero for PNG output");
    }

    let config = match &args.config {
        Some(path) => EditorConfig::load(path)
            .with_context(|| format!("failed to load config '{}'", path.display()))?,
        None => EditorConfig::default(),
    };

    let steps = parse_script(&load_script(&input_source)?)?;
    let scene = if args.sequential_ids {
        Scene::with_id_generator(&config, Box::<SequentialIds>::default())
    } else {
        Scene::new(&config)
    };
    let measurer = Box::new(FixedWidthMeasurer::from_config(&config));
    let mut controller = Controller::new(scene, config, measurer).with_listener(|scene, update| {
        if update == Update::Commit {
            debug!(
                nodes = scene.nodes().count(),
                links = scene.links().len(),
                subgraphs = scene.subgraphs().count();
                "Scene committed"
            );
        }
    });

    for (index, step) in steps.into_iter().enumerate() {
        apply_step(&mut controller, step.clone())
            .with_context(|| format!("step {} ({step:?}) failed", index + 1))?;
    }
    // A replay that ends mid-edit keeps what was typed.
    controller.blur();

    info!(format:? = format; "Replay finished");
    let output_bytes = match format {
        OutputFormat::Mermaid => controller.serialized_diagram().into_bytes(),
        OutputFormat::Svg => render_svg(
            &controller.render(),
            controller.config(),
            &args.background_color,
        )?
        .into_bytes(),
        OutputFormat::Png => render_png_output(&controller, &args.background_color, args.scale)?,
    };

    write_output(output_dest, &output_bytes, args.quiet)
}

#[cfg(feature = "png")]
fn render_png_output(controller: &Controller, background: &str, scale: f32) -> Result<Vec<u8>> {
    let svg = render_svg(&controller.render(), controller.config(), background)?;
    Ok(oxflow::render::render_png(&svg, scale)?)
}

#[cfg(not(feature = "png"))]
fn render_png_output(_controller: &Controller, _background: &str, _scale: f32) -> Result<Vec<u8>> {
    bail!("PNG output requires the 'png' feature to be enabled")
}

fn apply_step(controller: &mut Controller, step: Step) -> Result<()> {
    match step {
        Step::AddNode => {
            controller.add_node()?;
        }
        Step::InsertNode { id, text, x, y } => {
            let text = text.unwrap_or_else(|| controller.config().node_default_text.clone());
            controller.insert_node(&id, &text, Point::new(x, y))?;
        }
        Step::AddSubgraph => {
            controller.add_subgraph()?;
        }
        Step::InsertSubgraph {
            id,
            title,
            x,
            y,
            width,
            height,
        } => {
            let config = controller.config();
            let title = title.unwrap_or_else(|| config.subgraph_default_title.clone());
            let bounds = Rect::from_origin(
                x,
                y,
                width.unwrap_or(config.subgraph_default_width),
                height.unwrap_or(config.subgraph_default_height),
            );
            controller.insert_subgraph(&id, &title, bounds)?;
        }
        Step::ToggleLinking => controller.toggle_linking_mode(),
        Step::CancelLinking => controller.cancel_linking(),
        Step::PointerDown { x, y, ctrl, shift } => {
            controller.pointer_down(Point::new(x, y), Modifiers { ctrl, shift })
        }
        Step::PointerMove { x, y } => controller.pointer_move(Point::new(x, y)),
        Step::PointerUp { x, y } => controller.pointer_up(Point::new(x, y)),
        Step::Click { x, y, ctrl } => {
            let point = Point::new(x, y);
            controller.pointer_down(point, Modifiers { ctrl, shift: false });
            controller.pointer_up(point);
        }
        Step::Drag { from, to } => {
            controller.pointer_down(Point::new(from[0], from[1]), Modifiers::NONE);
            controller.pointer_move(Point::new(to[0], to[1]));
            controller.pointer_up(Point::new(to[0], to[1]));
        }
        Step::DoubleClick { x, y } => {
            if controller.double_click(Point::new(x, y)).is_none() {
                debug!(x = x, y = y; "Double-click opened no editor");
            }
        }
        Step::TypeText { text } => controller.text_input(&text),
        Step::CommitText => controller.commit_text()?,
        Step::CancelText => controller.cancel_text(),
        Step::Key { key, ctrl, shift } => {
            let key: Key = key.parse()?;
            controller.key_down(key, Modifiers { ctrl, shift })?;
        }
        Step::DeleteSelected => {
            controller.delete_selected();
        }
        Step::SetNodeText { id, text } => controller.set_node_text(&id, &text)?,
        Step::SetLinkLabel {
            source,
            target,
            label,
        } => controller.set_link_label(&LinkKey::new(source, target), &label)?,
        Step::SetSubgraphTitle { id, title } => controller.set_subgraph_title(&id, &title)?,
        Step::SetNodeSubgraph { id, subgraph } => {
            controller.set_node_subgraph(&id, subgraph.as_deref())?
        }
        Step::SetComments { text } => controller.set_comments(&text),
    }
    Ok(())
}

fn parse_script(source: &str) -> Result<Vec<Step>> {
    let steps = if source.trim_start().starts_with('[') {
        serde_json::from_str::<Vec<Step>>(source)
    } else {
        serde_json::from_str::<Script>(source).map(|script| script.steps)
    };
    steps.context("failed to parse replay script")
}

fn parse_input(input: Option<&str>) -> Result<InputSource> {
    match input {
        Some("-") | None => Ok(InputSource::Stdin),
        Some(path_str) => {
            let path = PathBuf::from(path_str);
            if !path.exists() {
                return Err(anyhow!("input file '{path_str}' does not exist"));
            }
            Ok(InputSource::File(path))
        }
    }
}

fn parse_output(output: Option<&str>) -> Result<OutputDestination> {
    match output {
        Some("-") | None => Ok(OutputDestination::Stdout),
        Some(path_str) => {
            let path = PathBuf::from(path_str);
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(anyhow!(
                        "output directory '{}' does not exist",
                        parent.display()
                    ));
                }
            }
            Ok(OutputDestination::File(path))
        }
    }
}

fn determine_format(
    preference: Option<OutputFormat>,
    output: &OutputDestination,
) -> Result<OutputFormat> {
    if let Some(format) = preference {
        return Ok(format);
    }

    match output {
        OutputDestination::Stdout => Ok(OutputFormat::Mermaid),
        OutputDestination::File(path) => OutputFormat::from_path(path).ok_or_else(|| {
            anyhow!(
                "unable to determine output format from '{}'; please specify --output-format",
                path.display()
            )
        }),
    }
}

fn load_script(source: &InputSource) -> Result<String> {
    match source {
        InputSource::Stdin => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            if buffer.trim().is_empty() {
                Err(anyhow!("no replay script supplied on stdin"))
            } else {
                Ok(buffer)
            }
        }
        InputSource::File(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read '{}'", path.display()))?;
            if contents.trim().is_empty() {
                Err(anyhow!("input file '{}' was empty", path.display()))
            } else {
                Ok(contents)
            }
        }
    }
}

fn write_output(dest: OutputDestination, bytes: &[u8], quiet: bool) -> Result<()> {
    match dest {
        OutputDestination::Stdout => {
            let mut stdout = io::stdout();
            stdout.write_all(bytes)?;
            stdout.flush()?;
        }
        OutputDestination::File(path) => {
            fs::write(&path, bytes)
                .with_context(|| format!("failed to write '{}'", path.display()))?;
            if !quiet {
                println!("Generated diagram -> {}", path.display());
            }
        }
    }
    Ok(())
}
