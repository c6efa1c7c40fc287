use crate::config::{Config, load_config};
use crate::ir::{FamilyTreeData, normalize_entity_id, parse_family_tree};
use crate::layout_dump::write_layout_dump;
use crate::render::{DrawingSurface, SvgSurface, write_output_svg};
use crate::routing::route;
use crate::theme::Theme;
use crate::view::FamilyTreeView;
use crate::walk::{RelationStore, walk};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "famtree", version, about = "Family tree layout and SVG renderer")]
pub struct Args {
    /// Family tree JSON/JSON5 file or '-' for stdin
    #[arg(short = 'i', long = "input", conflicts_with = "relations")]
    pub input: Option<PathBuf>,

    /// Relation store JSON to walk instead of a prepared family tree
    #[arg(short = 'r', long = "relations", requires = "entity")]
    pub relations: Option<PathBuf>,

    /// Entity to start the walk from (bare ids get the `wd:` prefix)
    #[arg(long = "entity")]
    pub entity: Option<String>,

    /// Maximum walk distance from the start entity
    #[arg(long = "max-distance", allow_negative_numbers = true)]
    pub max_distance: Option<i64>,

    /// Output file (svg/png). Defaults to stdout for SVG if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config JSON file (sizing, theme, themeVariables)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Built-in theme, overrides the config file
    #[arg(short = 't', long = "theme", value_enum)]
    pub theme: Option<ThemeName>,

    #[arg(long = "nodeWidth")]
    pub node_width: Option<f32>,

    #[arg(long = "nodeHeight")]
    pub node_height: Option<f32>,

    #[arg(long = "nodeSpacingX")]
    pub node_spacing_x: Option<f32>,

    #[arg(long = "nodeSpacingY")]
    pub node_spacing_y: Option<f32>,

    /// Raster width
    #[arg(short = 'w', long = "width", default_value_t = 1200.0)]
    pub width: f32,

    /// Raster height
    #[arg(short = 'H', long = "height", default_value_t = 800.0)]
    pub height: f32,

    /// Draw row/column/offset and connection slots next to each node
    #[arg(long = "debug")]
    pub debug: bool,

    /// Mark this entity as focused in the output
    #[arg(long = "focus")]
    pub focus: Option<String>,

    /// Write the computed layout as JSON
    #[arg(long = "dump-layout")]
    pub dump_layout: Option<PathBuf>,

    /// Write the input graph, with ids replaced by labels, as JSON
    #[arg(long = "dump-graph")]
    pub dump_graph: Option<PathBuf>,

    /// More log output (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Svg,
    Png,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum ThemeName {
    Classic,
    Modern,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = load_config(args.config.as_deref())?;
    apply_args(&mut config, &args);

    let graph = load_graph(&args)?;
    if let Some(path) = &args.dump_graph {
        let json = serde_json::to_string_pretty(&graph.to_labelled())?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    let surface = SvgSurface::new(config.theme.clone());
    let mut view = FamilyTreeView::new(surface, config.sizing, &config.view);
    view.redraw(&graph)?;
    if let Some(raw) = &args.focus
        && !focus_entity(&mut view, raw)?
    {
        tracing::warn!(entity = %raw, "focus entity is not part of the drawing");
    }

    if let Some(path) = &args.dump_layout {
        match view.plan() {
            Some(plan) => {
                let scene = route(plan, &config.sizing, config.view.debug_info);
                write_layout_dump(path, plan, &scene, &graph)?;
            }
            None => tracing::warn!("empty family tree, no layout to dump"),
        }
    }

    let svg = view.surface().to_svg();
    match args.output_format {
        OutputFormat::Svg => {
            write_output_svg(&svg, args.output.as_deref())?;
        }
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            write_png(&svg, &output, &config)?;
        }
    }
    Ok(())
}

/// Scrolls to `raw` after normalizing it the same way as `--entity`.
fn focus_entity<S: DrawingSurface>(view: &mut FamilyTreeView<S>, raw: &str) -> Result<bool> {
    let id = normalize_entity_id(raw)?;
    Ok(view.scroll_to_entity(&id))
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "famtree=warn",
        1 => "famtree=debug",
        _ => "famtree=trace",
    };
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init();
}

fn apply_args(config: &mut Config, args: &Args) {
    config.render.width = args.width;
    config.render.height = args.height;
    match args.theme {
        Some(ThemeName::Classic) => config.theme = Theme::classic(),
        Some(ThemeName::Modern) => config.theme = Theme::modern(),
        None => {}
    }
    config.render.background = config.theme.background.clone();
    if let Some(v) = args.node_width {
        config.sizing.node_width = v;
    }
    if let Some(v) = args.node_height {
        config.sizing.node_height = v;
    }
    if let Some(v) = args.node_spacing_x {
        config.sizing.node_spacing_x = v;
    }
    if let Some(v) = args.node_spacing_y {
        config.sizing.node_spacing_y = v;
    }
    if args.debug {
        config.view.debug_info = true;
    }
}

fn load_graph(args: &Args) -> Result<FamilyTreeData> {
    if let Some(path) = &args.relations {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let store = RelationStore::from_json(&content)?;
        let raw = args
            .entity
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("--entity is required with --relations"))?;
        let entity = normalize_entity_id(raw)?;
        return Ok(walk(&store, &entity, args.max_distance)?);
    }
    let input = read_input(args.input.as_deref())?;
    Ok(parse_family_tree(&input)?)
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()));
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}

#[cfg(feature = "png")]
fn write_png(svg: &str, output: &Path, config: &Config) -> Result<()> {
    crate::render::write_output_png(svg, output, &config.render)
}

#[cfg(not(feature = "png"))]
fn write_png(_svg: &str, _output: &Path, _config: &Config) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `png` feature"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizing_flags_override_config() {
        let args = Args::parse_from([
            "famtree",
            "--nodeWidth",
            "120",
            "--nodeSpacingY",
            "30",
            "--debug",
            "-t",
            "classic",
        ]);
        let mut config = Config::default();
        apply_args(&mut config, &args);
        assert_eq!(config.sizing.node_width, 120.0);
        assert_eq!(config.sizing.node_height, 50.0);
        assert_eq!(config.sizing.node_spacing_y, 30.0);
        assert!(config.view.debug_info);
        assert_eq!(config.theme.node_border, Theme::classic().node_border);
    }

    #[test]
    fn negative_distance_is_rejected_before_layout() {
        let args = Args::parse_from([
            "famtree",
            "--relations",
            "does-not-matter.json",
            "--entity",
            "Q1",
            "--max-distance",
            "-1",
        ]);
        assert_eq!(args.max_distance, Some(-1));
        let store = RelationStore::new();
        let err = walk(&store, "wd:Q1", args.max_distance).unwrap_err();
        assert!(err.to_string().contains("-1"));
    }

    #[test]
    fn focus_accepts_bare_ids() {
        let mut graph = FamilyTreeData::new();
        graph.add_root("wd:Q1").add_child("wd:Q1", None, "wd:Q42");
        let mut view = FamilyTreeView::new(
            SvgSurface::new(Theme::modern()),
            Config::default().sizing,
            &Config::default().view,
        );
        view.redraw(&graph).unwrap();

        assert!(focus_entity(&mut view, "Q42").unwrap());
        assert_eq!(view.surface().focused_entity(), Some("wd:Q42"));
        assert!(focus_entity(&mut view, "wd:Q1").unwrap());
        assert!(!focus_entity(&mut view, "Q7").unwrap());
        assert!(focus_entity(&mut view, "two words").is_err());
    }

    #[test]
    fn output_path_required_for_png() {
        assert!(ensure_output(&None, "png").is_err());
    }
}
