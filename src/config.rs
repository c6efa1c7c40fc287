use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Box and spacing sizes used by the router, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizingConfig {
    pub node_width: f32,
    pub node_height: f32,
    pub node_spacing_x: f32,
    pub node_spacing_y: f32,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            node_width: 100.0,
            node_height: 50.0,
            node_spacing_x: 50.0,
            node_spacing_y: 20.0,
        }
    }
}

/// Raster output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: f32,
    pub height: f32,
    pub background: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            background: "white".to_string(),
        }
    }
}

/// Drawing driver behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Quiet period before a requested redraw runs.
    pub debounce_ms: u64,
    /// Draw row/column/offset and connection slots next to each node.
    pub debug_info: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            debug_info: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub theme: Theme,
    pub sizing: SizingConfig,
    pub render: RenderConfig,
    pub view: ViewConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<f32>,
    node_fill: Option<String>,
    node_border: Option<String>,
    text_color: Option<String>,
    mate_line_color: Option<String>,
    child_line_color: Option<String>,
    debug_text_color: Option<String>,
    background: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SizingConfigFile {
    node_width: Option<f32>,
    node_height: Option<f32>,
    node_spacing_x: Option<f32>,
    node_spacing_y: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    sizing: Option<SizingConfigFile>,
    debounce_ms: Option<u64>,
    debug_info: Option<bool>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)?;
    let parsed: ConfigFile = serde_json::from_str(&contents)?;
    apply_config_file(&mut config, parsed);
    Ok(config)
}

fn apply_config_file(config: &mut Config, parsed: ConfigFile) {
    if let Some(theme_name) = parsed.theme.as_deref() {
        if theme_name == "classic" || theme_name == "default" {
            config.theme = Theme::classic();
        } else if theme_name == "modern" {
            config.theme = Theme::modern();
        }
    }

    if let Some(vars) = parsed.theme_variables {
        if let Some(v) = vars.font_family {
            config.theme.font_family = v;
        }
        if let Some(v) = vars.font_size {
            config.theme.font_size = v;
        }
        if let Some(v) = vars.node_fill {
            config.theme.node_fill = v;
        }
        if let Some(v) = vars.node_border {
            config.theme.node_border = v;
        }
        if let Some(v) = vars.text_color {
            config.theme.text_color = v;
        }
        if let Some(v) = vars.mate_line_color {
            config.theme.mate_line_color = v;
        }
        if let Some(v) = vars.child_line_color {
            config.theme.child_line_color = v;
        }
        if let Some(v) = vars.debug_text_color {
            config.theme.debug_text_color = v;
        }
        if let Some(v) = vars.background {
            config.theme.background = v;
        }
    }

    if let Some(sizing) = parsed.sizing {
        if let Some(v) = sizing.node_width {
            config.sizing.node_width = v;
        }
        if let Some(v) = sizing.node_height {
            config.sizing.node_height = v;
        }
        if let Some(v) = sizing.node_spacing_x {
            config.sizing.node_spacing_x = v;
        }
        if let Some(v) = sizing.node_spacing_y {
            config.sizing.node_spacing_y = v;
        }
    }

    if let Some(v) = parsed.debounce_ms {
        config.view.debounce_ms = v;
    }
    if let Some(v) = parsed.debug_info {
        config.view.debug_info = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizing_defaults() {
        let sizing = SizingConfig::default();
        assert_eq!(sizing.node_width, 100.0);
        assert_eq!(sizing.node_height, 50.0);
        assert_eq!(sizing.node_spacing_x, 50.0);
        assert_eq!(sizing.node_spacing_y, 20.0);
    }

    #[test]
    fn partial_overrides_keep_other_defaults() {
        let parsed: ConfigFile = serde_json::from_str(
            r#"{"theme": "classic", "sizing": {"nodeWidth": 140}, "debugInfo": true}"#,
        )
        .unwrap();
        let mut config = Config::default();
        apply_config_file(&mut config, parsed);
        assert_eq!(config.sizing.node_width, 140.0);
        assert_eq!(config.sizing.node_height, 50.0);
        assert!(config.view.debug_info);
        assert_eq!(config.view.debounce_ms, 100);
        assert_eq!(config.theme.node_border, Theme::classic().node_border);
    }
}
