//! Auto-fit of node boxes to their wrapped text.
//!
//! Wrapping depends on the host's fonts, so measurement goes through the
//! [`TextMeasurer`] trait. [`FixedWidthMeasurer`] is a deterministic stand-in
//! used by the CLI and the tests.

use crate::config::EditorConfig;
use crate::error::Result;
use crate::geometry::Size;
use crate::scene::Scene;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    pub lines: usize,
    pub height: f64,
}

pub trait TextMeasurer {
    /// Wraps `text` into lines no wider than `width` and reports the block
    /// height.
    fn measure(&self, text: &str, width: f64) -> TextMetrics;
}

/// Greedy word wrap assuming every character has the same advance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedWidthMeasurer {
    pub char_width: f64,
    pub line_height: f64,
}

impl FixedWidthMeasurer {
    pub fn new(char_width: f64, line_height: f64) -> Self {
        Self {
            char_width,
            line_height,
        }
    }

    pub fn from_config(config: &EditorConfig) -> Self {
        Self::new(config.char_width, config.line_height)
    }

    fn wrapped_lines(&self, paragraph: &str, max_chars: usize) -> usize {
        let mut lines = 0;
        let mut current = 0;

        for word in paragraph.split_whitespace() {
            let mut len = word.chars().count();
            if current > 0 && current + 1 + len <= max_chars {
                current += 1 + len;
                continue;
            }
            if current > 0 {
                lines += 1;
            }
            while len > max_chars {
                lines += 1;
                len -= max_chars;
            }
            current = len;
        }

        if current > 0 || lines == 0 {
            lines += 1;
        }
        lines
    }
}

impl TextMeasurer for FixedWidthMeasurer {
    fn measure(&self, text: &str, width: f64) -> TextMetrics {
        let max_chars = ((width / self.char_width).floor() as usize).max(1);
        let lines = text
            .split('\n')
            .map(|paragraph| self.wrapped_lines(paragraph, max_chars))
            .sum::<usize>();

        TextMetrics {
            lines,
            height: lines as f64 * self.line_height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitMode {
    /// Text changed: height follows the content, up or down.
    Reflow,
    /// Box changed: only grow what no longer contains the content.
    Contain,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoFit {
    min: Size,
    baseline_height: f64,
    max_height: f64,
    vertical_padding: f64,
    horizontal_padding: f64,
    width_step: f64,
    max_width: f64,
}

impl AutoFit {
    pub fn from_config(config: &EditorConfig) -> Self {
        Self {
            min: Size::new(config.node_min_width, config.node_min_height),
            baseline_height: config.baseline_height,
            max_height: config.max_text_height(),
            vertical_padding: config.vertical_padding,
            horizontal_padding: config.horizontal_padding,
            width_step: config.width_step,
            max_width: config.max_width,
        }
    }

    /// Height of the wrapped text plus padding at the given box width.
    pub fn required_height(&self, measurer: &dyn TextMeasurer, text: &str, width: f64) -> f64 {
        let content_width = (width - self.horizontal_padding).max(0.0);
        measurer.measure(text, content_width).height + self.vertical_padding
    }

    pub fn fit(&self, measurer: &dyn TextMeasurer, text: &str, current: Size, mode: FitMode) -> Size {
        let mut width = current.width.max(self.min.width);

        while self.required_height(measurer, text, width) > self.max_height && width < self.max_width {
            width = (width + self.width_step).min(self.max_width);
        }

        let fitted = self
            .required_height(measurer, text, width)
            .max(self.baseline_height)
            .min(self.max_height);
        let height = match mode {
            FitMode::Reflow => fitted,
            FitMode::Contain => current.height.max(fitted),
        };

        Size::new(width, height.max(self.min.height))
    }
}

/// Refits one node in place. Returns whether its size changed.
pub fn auto_fit_node(
    scene: &mut Scene,
    fit: &AutoFit,
    measurer: &dyn TextMeasurer,
    id: &str,
    mode: FitMode,
) -> Result<bool> {
    let Some(node) = scene.node(id) else {
        return Err(crate::error::EditorError::UnknownNode(id.to_string()));
    };

    let current = node.size();
    let fitted = fit.fit(measurer, &node.text, current, mode);
    if fitted == current {
        return Ok(false);
    }

    log::debug!(
        node = id,
        width = fitted.width,
        height = fitted.height;
        "Auto-fit resized node"
    );
    scene.set_node_size(id, fitted)?;
    Ok(true)
}
