#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod debounce;
pub mod error;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod render;
pub mod routing;
pub mod text_metrics;
pub mod theme;
pub mod view;
pub mod walk;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, SizingConfig};
pub use error::{FamilyTreeError, Result};
pub use ir::{FamilyTreeData, parse_family_tree};
pub use layout::{Connection, LayoutPlan, layout_family_tree};
pub use render::{DrawingSurface, NodeContent, SvgSurface};
pub use routing::{Scene, route};
pub use theme::Theme;
pub use view::FamilyTreeView;
pub use walk::{RelationSource, RelationStore, walk};

/// One-shot rendering settings for [`render_with_options`].
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub theme: Theme,
    pub sizing: SizingConfig,
    pub debug_info: bool,
}

impl RenderOptions {
    pub fn classic() -> Self {
        Self {
            theme: Theme::classic(),
            ..Self::default()
        }
    }

    pub fn modern() -> Self {
        Self::default()
    }
}

/// Parses a family tree document and renders it to an SVG string.
pub fn render_with_options(input: &str, options: RenderOptions) -> Result<String> {
    let graph = parse_family_tree(input)?;
    render_family_tree(&graph, options)
}

pub fn render_family_tree(graph: &FamilyTreeData, options: RenderOptions) -> Result<String> {
    let config = Config {
        theme: options.theme.clone(),
        sizing: options.sizing,
        ..Config::default()
    };
    let mut view = FamilyTreeView::new(
        SvgSurface::new(config.theme),
        config.sizing,
        &config::ViewConfig {
            debug_info: options.debug_info,
            ..config.view
        },
    );
    view.redraw(graph)?;
    Ok(view.surface().to_svg())
}
