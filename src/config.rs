use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EditorError, Result};

/// Tunables for sizing, auto-fit and gesture handling.
///
/// Every field has a default, so a JSON file only needs to name the values it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    pub node_min_width: f64,
    pub node_min_height: f64,
    pub node_default_width: f64,
    pub node_default_height: f64,
    pub node_default_text: String,

    pub subgraph_min_size: f64,
    pub subgraph_default_width: f64,
    pub subgraph_default_height: f64,
    pub subgraph_default_title: String,
    pub subgraph_title_height: f64,

    /// Node height for text that fits on a single line.
    pub baseline_height: f64,
    pub line_height: f64,
    /// Wrapped lines allowed beyond the first before the node grows wider.
    pub extra_lines: u32,
    pub vertical_padding: f64,
    pub horizontal_padding: f64,
    pub char_width: f64,
    pub width_step: f64,
    pub max_width: f64,

    pub handle_size: f64,
    pub link_hit_tolerance: f64,
    pub drag_threshold: f64,

    pub canvas_width: f64,
    pub canvas_height: f64,
    pub direction: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            node_min_width: 80.0,
            node_min_height: 50.0,
            node_default_width: 120.0,
            node_default_height: 60.0,
            node_default_text: "New Node".to_string(),
            subgraph_min_size: 50.0,
            subgraph_default_width: 300.0,
            subgraph_default_height: 250.0,
            subgraph_default_title: "New Subgraph".to_string(),
            subgraph_title_height: 30.0,
            baseline_height: 60.0,
            line_height: 20.0,
            extra_lines: 2,
            vertical_padding: 30.0,
            horizontal_padding: 10.0,
            char_width: 8.0,
            width_step: 10.0,
            max_width: 500.0,
            handle_size: 8.0,
            link_hit_tolerance: 6.0,
            drag_threshold: 3.0,
            canvas_width: 800.0,
            canvas_height: 600.0,
            direction: "TD".to_string(),
        }
    }
}

impl EditorConfig {
    pub fn from_json(source: &str) -> Result<Self> {
        let config: EditorConfig = serde_json::from_str(source)
            .map_err(|err| EditorError::InvalidConfig(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|err| {
            EditorError::InvalidConfig(format!("failed to read '{}': {err}", path.display()))
        })?;
        log::debug!(path = path.display().to_string(); "Loading editor configuration");
        Self::from_json(&contents)
    }

    /// Height of a node whose text fills every allowed line: the first line
    /// plus `extra_lines`, with vertical padding.
    pub fn max_text_height(&self) -> f64 {
        self.vertical_padding + self.line_height * (f64::from(self.extra_lines) + 1.0)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("nodeMinWidth", self.node_min_width),
            ("nodeMinHeight", self.node_min_height),
            ("subgraphMinSize", self.subgraph_min_size),
            ("baselineHeight", self.baseline_height),
            ("lineHeight", self.line_height),
            ("charWidth", self.char_width),
            ("widthStep", self.width_step),
            ("handleSize", self.handle_size),
            ("canvasWidth", self.canvas_width),
            ("canvasHeight", self.canvas_height),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(EditorError::InvalidConfig(format!(
                    "'{name}' must be a positive number, found {value}"
                )));
            }
        }

        if self.node_default_width < self.node_min_width
            || self.node_default_height < self.node_min_height
        {
            return Err(EditorError::InvalidConfig(
                "default node size must not be below the minimum node size".to_string(),
            ));
        }
        if self.subgraph_default_width < self.subgraph_min_size
            || self.subgraph_default_height < self.subgraph_min_size
        {
            return Err(EditorError::InvalidConfig(
                "default subgraph size must not be below the minimum subgraph size".to_string(),
            ));
        }
        if self.max_width < self.node_min_width {
            return Err(EditorError::InvalidConfig(format!(
                "'maxWidth' ({}) must be at least 'nodeMinWidth' ({})",
                self.max_width, self.node_min_width
            )));
        }
        if self.baseline_height < self.node_min_height {
            return Err(EditorError::InvalidConfig(
                "'baselineHeight' must be at least 'nodeMinHeight'".to_string(),
            ));
        }
        if self.max_text_height() < self.baseline_height {
            return Err(EditorError::InvalidConfig(
                "line settings leave no room above the baseline height".to_string(),
            ));
        }

        match self.direction.to_ascii_uppercase().as_str() {
            "TD" | "TB" | "BT" | "LR" | "RL" => Ok(()),
            other => Err(EditorError::InvalidConfig(format!(
                "unsupported direction '{other}'; supported values are TD, TB, BT, LR, RL"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EditorConfig::default();
        config.validate().unwrap();
        assert_eq!(config.max_text_height(), 90.0);
    }

    #[test]
    fn text_cap_is_padding_plus_allowed_lines() {
        let config = EditorConfig {
            line_height: 18.0,
            extra_lines: 3,
            vertical_padding: 20.0,
            ..EditorConfig::default()
        };
        assert_eq!(config.max_text_height(), 20.0 + 18.0 * 4.0);

        let single = EditorConfig {
            extra_lines: 0,
            ..EditorConfig::default()
        };
        assert!(single.validate().is_err());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = EditorConfig::from_json(r#"{ "maxWidth": 640, "direction": "LR" }"#).unwrap();
        assert_eq!(config.max_width, 640.0);
        assert_eq!(config.direction, "LR");
        assert_eq!(config.node_min_width, 80.0);
    }

    #[test]
    fn rejects_unknown_direction() {
        let err = EditorConfig::from_json(r#"{ "direction": "XY" }"#).unwrap_err();
        assert!(matches!(err, EditorError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_ceiling_below_minimum() {
        let err = EditorConfig::from_json(r#"{ "maxWidth": 40 }"#).unwrap_err();
        assert!(err.to_string().contains("maxWidth"));
    }
}
