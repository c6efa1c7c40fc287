#[cfg(feature = "png")]
use crate::config::RenderConfig;
use crate::routing::{Connector, Rect, Scene};
use crate::text_metrics::fit_label;
use crate::theme::Theme;
use anyhow::Result;
use std::path::Path;

/// Handle to a per-node container created by [`DrawingSurface::embed`].
pub type ContainerId = usize;

const LABEL_LINE_HEIGHT: f32 = 1.3;
const LABEL_PADDING: f32 = 6.0;
const DEBUG_FONT_SCALE: f32 = 0.75;

/// What a render callback wants shown inside a node box.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeContent {
    pub title: String,
    pub subtitle: Option<String>,
}

impl NodeContent {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
        }
    }
}

/// The mutations the drawing driver performs on its output.
pub trait DrawingSurface {
    /// Drops everything drawn so far, including embedded containers.
    fn clear(&mut self);
    fn set_size(&mut self, width: f32, height: f32, view_box: (f32, f32, f32, f32));
    fn draw_rect(&mut self, rect: &Rect);
    fn draw_polyline(&mut self, connector: &Connector);
    fn draw_text(&mut self, x: f32, y: f32, lines: &[String]);
    fn embed(&mut self, id: &str, rect: &Rect, content: NodeContent) -> ContainerId;
    fn scroll_into_view(&mut self, container: ContainerId);
}

/// Draws every rectangle, connector and debug overlay of `scene`.
pub fn draw_scene<S: DrawingSurface + ?Sized>(surface: &mut S, scene: &Scene) {
    surface.set_size(scene.width, scene.height, scene.view_box);
    for node in &scene.nodes {
        surface.draw_rect(&node.rect);
    }
    for connector in &scene.connectors {
        surface.draw_polyline(connector);
    }
    for node in &scene.nodes {
        if let Some(lines) = &node.debug {
            surface.draw_text(node.rect.left, node.rect.bottom() + 2.0, lines);
        }
    }
}

#[derive(Debug, Clone)]
struct Container {
    id: String,
    rect: Rect,
    content: NodeContent,
}

/// A [`DrawingSurface`] that accumulates SVG fragments.
#[derive(Debug, Clone)]
pub struct SvgSurface {
    theme: Theme,
    width: f32,
    height: f32,
    view_box: (f32, f32, f32, f32),
    shapes: Vec<String>,
    containers: Vec<Container>,
    focused: Option<ContainerId>,
}

impl SvgSurface {
    pub fn new(theme: Theme) -> Self {
        Self {
            theme,
            width: 0.0,
            height: 0.0,
            view_box: (0.0, 0.0, 0.0, 0.0),
            shapes: Vec::new(),
            containers: Vec::new(),
            focused: None,
        }
    }

    /// Entity shown by the last `scroll_into_view`, if its container still
    /// exists.
    pub fn focused_entity(&self) -> Option<&str> {
        let container = self.containers.get(self.focused?)?;
        Some(container.id.as_str())
    }

    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    pub fn to_svg(&self) -> String {
        let (vx, vy, vw, vh) = self.view_box;
        let mut svg = String::new();
        svg.push_str(&format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" class=\"family-tree\" width=\"{:.2}\" height=\"{:.2}\" viewBox=\"{vx:.2} {vy:.2} {vw:.2} {vh:.2}\">",
            self.width, self.height
        ));
        svg.push_str(&format!(
            "<style>.family-tree-connection{{fill:none;stroke-width:1.4}}.family-tree-connection-mate{{stroke:{}}}.family-tree-connection-child{{stroke:{}}}</style>",
            self.theme.mate_line_color, self.theme.child_line_color
        ));
        svg.push_str(&format!(
            "<rect x=\"{vx:.2}\" y=\"{vy:.2}\" width=\"100%\" height=\"100%\" fill=\"{}\"/>",
            self.theme.background
        ));
        for shape in &self.shapes {
            svg.push_str(shape);
        }
        for (idx, container) in self.containers.iter().enumerate() {
            svg.push_str(&self.container_svg(idx, container));
        }
        svg.push_str("</svg>");
        svg
    }

    fn container_svg(&self, idx: ContainerId, container: &Container) -> String {
        let rect = &container.rect;
        let font_size = self.theme.font_size;
        let max_width = (rect.width - 2.0 * LABEL_PADDING).max(font_size);
        let room = ((rect.height - 2.0 * LABEL_PADDING) / (font_size * LABEL_LINE_HEIGHT)).floor();
        let max_lines = (room as usize).max(1);
        let title_lines = if container.content.subtitle.is_some() {
            max_lines.saturating_sub(1).max(1)
        } else {
            max_lines
        };
        let mut lines = fit_label(
            &container.content.title,
            max_width,
            title_lines,
            font_size,
            &self.theme.font_family,
        );
        if let Some(subtitle) = &container.content.subtitle
            && lines.len() < max_lines
        {
            lines.extend(fit_label(
                subtitle,
                max_width,
                1,
                font_size,
                &self.theme.font_family,
            ));
        }

        let mut out = format!(
            "<g class=\"family-tree-node\" data-entity=\"{}\"{}>",
            escape_xml(&container.id),
            if self.focused == Some(idx) {
                " data-focused=\"true\""
            } else {
                ""
            }
        );
        out.push_str(&text_block_svg(
            rect.center_x(),
            rect.center_y(),
            &lines,
            font_size,
            &self.theme.font_family,
            &self.theme.text_color,
        ));
        out.push_str("</g>");
        out
    }
}

impl DrawingSurface for SvgSurface {
    fn clear(&mut self) {
        self.shapes.clear();
        self.containers.clear();
        self.focused = None;
        self.width = 0.0;
        self.height = 0.0;
        self.view_box = (0.0, 0.0, 0.0, 0.0);
    }

    fn set_size(&mut self, width: f32, height: f32, view_box: (f32, f32, f32, f32)) {
        self.width = width;
        self.height = height;
        self.view_box = view_box;
    }

    fn draw_rect(&mut self, rect: &Rect) {
        self.shapes.push(format!(
            "<rect class=\"family-tree-box\" x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"6\" ry=\"6\" fill=\"{}\" stroke=\"{}\" stroke-width=\"1.2\"/>",
            rect.left,
            rect.top,
            rect.width,
            rect.height,
            self.theme.node_fill,
            self.theme.node_border
        ));
    }

    fn draw_polyline(&mut self, connector: &Connector) {
        self.shapes.push(format!(
            "<polyline class=\"{}\" points=\"{}\"/>",
            connector.kind.class_name(),
            points_attr(&connector.points)
        ));
    }

    fn draw_text(&mut self, x: f32, y: f32, lines: &[String]) {
        let font_size = self.theme.font_size * DEBUG_FONT_SCALE;
        let mut text = format!(
            "<text class=\"family-tree-debug\" x=\"{x:.2}\" y=\"{:.2}\" font-family=\"{}\" font-size=\"{font_size:.2}\" fill=\"{}\">",
            y + font_size,
            escape_xml(&self.theme.font_family),
            self.theme.debug_text_color
        );
        for (idx, line) in lines.iter().enumerate() {
            let dy = if idx == 0 { 0.0 } else { font_size * LABEL_LINE_HEIGHT };
            text.push_str(&format!(
                "<tspan x=\"{x:.2}\" dy=\"{dy:.2}\">{}</tspan>",
                escape_xml(line)
            ));
        }
        text.push_str("</text>");
        self.shapes.push(text);
    }

    fn embed(&mut self, id: &str, rect: &Rect, content: NodeContent) -> ContainerId {
        self.containers.push(Container {
            id: id.to_string(),
            rect: *rect,
            content,
        });
        self.containers.len() - 1
    }

    fn scroll_into_view(&mut self, container: ContainerId) {
        if container < self.containers.len() {
            self.focused = Some(container);
        }
    }
}

fn points_attr(points: &[(f32, f32)]) -> String {
    points
        .iter()
        .map(|(x, y)| format!("{x:.2},{y:.2}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn text_block_svg(
    x: f32,
    y: f32,
    lines: &[String],
    font_size: f32,
    font_family: &str,
    fill: &str,
) -> String {
    let line_height = font_size * LABEL_LINE_HEIGHT;
    let total_height = lines.len() as f32 * line_height;
    let start_y = y - total_height / 2.0 + font_size;
    let mut text = format!(
        "<text x=\"{x:.2}\" y=\"{start_y:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{font_size}\" fill=\"{fill}\">",
        escape_xml(font_family)
    );
    for (idx, line) in lines.iter().enumerate() {
        let dy = if idx == 0 { 0.0 } else { line_height };
        text.push_str(&format!(
            "<tspan x=\"{x:.2}\" dy=\"{dy:.2}\">{}</tspan>",
            escape_xml(line)
        ));
    }
    text.push_str("</text>");
    text
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, render_cfg: &RenderConfig) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = "Inter".to_string();
    opt.default_size = usvg::Size::from_wh(render_cfg.width, render_cfg.height)
        .ok_or_else(|| anyhow::anyhow!("invalid render size"))?;

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;
    if let Some(color) = parse_hex_color(&render_cfg.background) {
        pixmap.fill(color);
    }

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

#[cfg(feature = "png")]
fn parse_hex_color(value: &str) -> Option<resvg::tiny_skia::Color> {
    if value.eq_ignore_ascii_case("white") {
        return Some(resvg::tiny_skia::Color::WHITE);
    }
    if value.eq_ignore_ascii_case("transparent") {
        return Some(resvg::tiny_skia::Color::TRANSPARENT);
    }
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(resvg::tiny_skia::Color::from_rgba8(
        channel(0)?,
        channel(2)?,
        channel(4)?,
        255,
    ))
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
