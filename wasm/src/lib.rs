use famtree::{RenderOptions, render_with_options};
use serde::Deserialize;
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FamilyTreeRenderOptions {
    theme: Option<String>,
    font_family: Option<String>,
    font_size: Option<f32>,
    node_width: Option<f32>,
    node_height: Option<f32>,
    node_spacing_x: Option<f32>,
    node_spacing_y: Option<f32>,
    debug_info: Option<bool>,
}

fn build_render_options(options: FamilyTreeRenderOptions) -> RenderOptions {
    let mut render_options = if options.theme.as_deref() == Some("classic") {
        RenderOptions::classic()
    } else {
        RenderOptions::modern()
    };

    if let Some(font_family) = options.font_family {
        render_options.theme.font_family = font_family;
    }
    if let Some(font_size) = options.font_size {
        render_options.theme.font_size = font_size;
    }
    if let Some(v) = options.node_width {
        render_options.sizing.node_width = v;
    }
    if let Some(v) = options.node_height {
        render_options.sizing.node_height = v;
    }
    if let Some(v) = options.node_spacing_x {
        render_options.sizing.node_spacing_x = v;
    }
    if let Some(v) = options.node_spacing_y {
        render_options.sizing.node_spacing_y = v;
    }
    render_options.debug_info = options.debug_info.unwrap_or(false);

    render_options
}

#[wasm_bindgen]
pub fn render_family_tree_svg(
    graph_json: &str,
    options_json: Option<String>,
) -> Result<String, JsValue> {
    let options = if let Some(raw_options) = options_json {
        serde_json::from_str::<FamilyTreeRenderOptions>(&raw_options)
            .map_err(|error| JsValue::from_str(&error.to_string()))?
    } else {
        FamilyTreeRenderOptions::default()
    };

    let render_options = build_render_options(options);
    render_with_options(graph_json, render_options)
        .map_err(|error| JsValue::from_str(&error.to_string()))
}

#[cfg(test)]
mod tests {
    use famtree::render_with_options;

    use crate::{FamilyTreeRenderOptions, build_render_options};

    #[test]
    fn renders_couple_with_children() {
        let graph = r#"{
            "roots": ["A", "C"],
            "mates": [["A", "C"]],
            "children": [["A", "C", "B"], ["A", "C", "D"]],
            "labels": {"A": "Ada", "C": "Charles"}
        }"#;

        let svg = render_with_options(
            graph,
            build_render_options(FamilyTreeRenderOptions::default()),
        )
        .expect("family tree should render");

        assert!(svg.contains("<svg"));
        assert!(svg.contains("Ada"));
        assert!(svg.contains("family-tree-connection-mate"));
    }
}
