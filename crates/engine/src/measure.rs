//! Measurement surface: the text-shaping oracle behind pagination.
//!
//! `CellSurface` predicts the rendered height of a candidate string on the
//! terminal cell grid without committing it to the visible tree. The display
//! chrome renders pages through the same [`wrap_lines`] breaker, so measured
//! and rendered line counts cannot drift apart.

use thiserror::Error;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::LayoutConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MeasureError {
    #[error("measurement surface unavailable")]
    SurfaceUnavailable,
}

/// Height oracle for candidate text under a layout configuration.
///
/// Implementations must be stateless across calls and must reflect the exact
/// wrapping the display chrome will later produce for the same layout.
pub trait MeasurementSurface {
    fn measure_height(&self, text: &str, layout: &LayoutConfig) -> Result<u32, MeasureError>;
}

/// Terminal cell-grid probe. Attaches nothing; each call derives the column
/// budget from the layout, wraps, and reports `lines * line_height_px`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CellSurface;

impl CellSurface {
    pub fn new() -> Self {
        Self
    }
}

impl MeasurementSurface for CellSurface {
    fn measure_height(&self, text: &str, layout: &LayoutConfig) -> Result<u32, MeasureError> {
        let lines = wrap_lines(text, layout)?;
        Ok(lines.len() as u32 * layout.line_height_px())
    }
}

/// Break `text` into display lines exactly as the reader view renders them:
/// greedy word wrap at the layout's column budget, hard newlines respected,
/// display width per `unicode-width`, over-long words broken at the boundary.
pub fn wrap_lines(text: &str, layout: &LayoutConfig) -> Result<Vec<String>, MeasureError> {
    let columns = layout.columns();
    if columns == 0 || layout.usable_height_px() == 0 {
        return Err(MeasureError::SurfaceUnavailable);
    }
    Ok(wrap_to_columns(text, columns))
}

fn wrap_to_columns(text: &str, columns: usize) -> Vec<String> {
    let mut lines = Vec::new();

    for raw in text.split('\n') {
        let mut line = String::new();
        let mut line_width = 0usize;

        for word in raw.split_whitespace() {
            let word_width = word.width();

            if word_width > columns {
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                    line_width = 0;
                }
                (line, line_width) = break_long_word(word, columns, &mut lines);
                continue;
            }

            let fits = if line.is_empty() {
                word_width <= columns
            } else {
                line_width + 1 + word_width <= columns
            };

            if !fits {
                lines.push(std::mem::take(&mut line));
                line_width = 0;
            }
            if !line.is_empty() {
                line.push(' ');
                line_width += 1;
            }
            line.push_str(word);
            line_width += word_width;
        }

        lines.push(line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Hard-break a word wider than the column budget; returns the trailing
/// partial line so following words continue on it.
fn break_long_word(word: &str, columns: usize, lines: &mut Vec<String>) -> (String, usize) {
    let mut piece = String::new();
    let mut piece_width = 0usize;

    for ch in word.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if piece_width + ch_width > columns && !piece.is_empty() {
            lines.push(std::mem::take(&mut piece));
            piece_width = 0;
        }
        piece.push(ch);
        piece_width += ch_width;
    }

    (piece, piece_width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_core::{DisplaySettings, FontFamily};

    fn layout_with_columns(columns: u32) -> LayoutConfig {
        // Mono advance is 0.60 em; font 20 gives a 12 px advance, so width
        // maps 1:1 onto the requested column count.
        let settings = DisplaySettings::default()
            .with_font_size(20)
            .with_font_family(FontFamily::Mono);
        LayoutConfig {
            viewport_width_px: columns * 12,
            viewport_height_px: 680,
            padding_px: 0,
            ..LayoutConfig::for_viewport(columns * 12, 680, &settings)
        }
    }

    #[test]
    fn wraps_at_column_budget() {
        let layout = layout_with_columns(11);
        let lines = wrap_lines("the quick brown fox jumps", &layout).unwrap();
        assert_eq!(lines, vec!["the quick", "brown fox", "jumps"]);
    }

    #[test]
    fn respects_hard_newlines() {
        let layout = layout_with_columns(40);
        let lines = wrap_lines("first\n\nsecond", &layout).unwrap();
        assert_eq!(lines, vec!["first", "", "second"]);
    }

    #[test]
    fn breaks_words_wider_than_a_line() {
        let layout = layout_with_columns(4);
        let lines = wrap_lines("abcdefghij", &layout).unwrap();
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn continues_after_a_broken_word() {
        let layout = layout_with_columns(4);
        let lines = wrap_lines("abcdef gh", &layout).unwrap();
        assert_eq!(lines, vec!["abcd", "ef", "gh"]);
    }

    #[test]
    fn empty_text_is_one_empty_line() {
        let layout = layout_with_columns(10);
        assert_eq!(wrap_lines("", &layout).unwrap(), vec![String::new()]);
    }

    #[test]
    fn zero_width_surface_is_unavailable() {
        let settings = DisplaySettings::default();
        let layout = LayoutConfig::for_viewport(0, 680, &settings);
        assert_eq!(
            wrap_lines("text", &layout),
            Err(MeasureError::SurfaceUnavailable)
        );
        assert_eq!(
            CellSurface.measure_height("text", &layout),
            Err(MeasureError::SurfaceUnavailable)
        );
    }

    #[test]
    fn measured_height_is_lines_times_line_height() {
        let layout = layout_with_columns(11);
        let height = CellSurface.measure_height("the quick brown fox jumps", &layout).unwrap();
        assert_eq!(height, 3 * layout.line_height_px());
    }

    #[test]
    fn wide_glyphs_count_double() {
        let layout = layout_with_columns(4);
        // CJK glyphs are two cells wide.
        let lines = wrap_lines("你好 世界", &layout).unwrap();
        assert_eq!(lines, vec!["你好", "世界"]);
    }
}
