//! Pagination engine: converts (content, layout) into viewport-sized pages.

use std::hash::{Hash as _, Hasher as _};

use quire_core::{DisplaySettings, FontFamily};
use thiserror::Error;

mod measure;

pub use measure::{CellSurface, MeasureError, MeasurementSurface, wrap_lines};

/// Line height multiplier used by the reader view.
pub const DEFAULT_LINE_HEIGHT: f32 = 1.7;
/// Horizontal and vertical padding around the page body, in pixels.
pub const DEFAULT_PADDING_PX: u32 = 32;

const ADVANCE_EM_SERIF: f32 = 0.50;
const ADVANCE_EM_SANS: f32 = 0.52;
const ADVANCE_EM_MONO: f32 = 0.60;

const CODE_FENCE: &str = "```";

/// Geometry and typography that determine text wrapping. Derived from the
/// rendering surface at pagination time; never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConfig {
    pub viewport_width_px: u32,
    pub viewport_height_px: u32,
    pub font_size_px: u16,
    pub font_family: FontFamily,
    pub line_height: f32,
    pub padding_px: u32,
}

impl LayoutConfig {
    pub fn for_viewport(width_px: u32, height_px: u32, settings: &DisplaySettings) -> Self {
        Self {
            viewport_width_px: width_px,
            viewport_height_px: height_px,
            font_size_px: settings.font_size_px,
            font_family: settings.font_family,
            line_height: DEFAULT_LINE_HEIGHT,
            padding_px: DEFAULT_PADDING_PX,
        }
    }

    pub fn usable_width_px(&self) -> u32 {
        self.viewport_width_px
            .saturating_sub(self.padding_px.saturating_mul(2))
    }

    pub fn usable_height_px(&self) -> u32 {
        self.viewport_height_px
            .saturating_sub(self.padding_px.saturating_mul(2))
    }

    pub fn line_height_px(&self) -> u32 {
        ((f32::from(self.font_size_px) * self.line_height).round() as u32).max(1)
    }

    /// Average glyph advance for the configured family, in pixels.
    pub fn advance_px(&self) -> u32 {
        let em = match self.font_family {
            FontFamily::Serif => ADVANCE_EM_SERIF,
            FontFamily::Sans => ADVANCE_EM_SANS,
            FontFamily::Mono => ADVANCE_EM_MONO,
        };
        ((f32::from(self.font_size_px) * em).round() as u32).max(1)
    }

    /// Column budget for wrapping; zero means the surface is unusable.
    pub fn columns(&self) -> usize {
        (self.usable_width_px() / self.advance_px()) as usize
    }

}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PaginateError {
    #[error("measurement surface unavailable")]
    MeasurementUnavailable,
}

impl From<MeasureError> for PaginateError {
    fn from(err: MeasureError) -> Self {
        match err {
            MeasureError::SurfaceUnavailable => PaginateError::MeasurementUnavailable,
        }
    }
}

/// Ordered page contents, valid only for the exact (content, layout) pair
/// that produced them. Replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSet {
    pages: Vec<String>,
    source_hash: u64,
    layout: LayoutConfig,
}

impl PageSet {
    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    /// Always at least 1: empty content paginates to one empty page.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn page(&self, index: usize) -> Option<&str> {
        self.pages.get(index).map(String::as_str)
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    pub fn is_valid_for(&self, content: &str, layout: &LayoutConfig) -> bool {
        self.source_hash == content_hash(content) && self.layout == *layout
    }
}

pub fn content_hash(content: &str) -> u64 {
    let mut hasher = std::hash::DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}

/// Whitespace-handling policy knobs. Upstream never settled on either
/// behavior, so both stay togglable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentPolicy {
    /// Treat the leading line as an unsplittable title kept with its newline.
    pub title_first_line: bool,
    /// Treat ``` fenced spans as atomic segments that never split across pages.
    pub code_fences: bool,
}

impl Default for ContentPolicy {
    fn default() -> Self {
        Self {
            title_first_line: true,
            code_fences: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sep {
    Space,
    Newline,
}

impl Sep {
    fn as_char(self) -> char {
        match self {
            Sep::Space => ' ',
            Sep::Newline => '\n',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    text: String,
    /// Separator placed before this segment when the accumulator is non-empty.
    sep: Sep,
}

/// Word-greedy paginator: one measurement call per segment, accumulator
/// flushed to a page whenever the candidate overflows the viewport.
#[derive(Debug, Clone, Default)]
pub struct Paginator {
    policy: ContentPolicy,
}

impl Paginator {
    pub fn new(policy: ContentPolicy) -> Self {
        Self { policy }
    }

    pub fn paginate(
        &self,
        content: &str,
        layout: &LayoutConfig,
        surface: &dyn MeasurementSurface,
    ) -> Result<PageSet, PaginateError> {
        // Probe the surface up front so an unmounted viewport fails the same
        // way regardless of content.
        surface.measure_height("", layout)?;

        let limit = layout.usable_height_px();
        let mut pages: Vec<String> = Vec::new();
        let mut acc = String::new();

        for segment in self.segments(content) {
            let candidate = if acc.is_empty() {
                segment.text.clone()
            } else {
                let mut joined =
                    String::with_capacity(acc.len() + 1 + segment.text.len());
                joined.push_str(&acc);
                joined.push(segment.sep.as_char());
                joined.push_str(&segment.text);
                joined
            };

            let height = surface.measure_height(&candidate, layout)?;
            if height > limit && !acc.is_empty() {
                pages.push(std::mem::take(&mut acc));
                // The rejected segment opens the next page; a segment taller
                // than the viewport stays alone on its own page.
                acc = segment.text;
            } else {
                acc = candidate;
            }
        }

        if !acc.is_empty() || pages.is_empty() {
            pages.push(acc);
        }

        log::debug!(
            "paginated {} bytes into {} pages ({}x{} px, {} px font)",
            content.len(),
            pages.len(),
            layout.viewport_width_px,
            layout.viewport_height_px,
            layout.font_size_px
        );

        Ok(PageSet {
            pages,
            source_hash: content_hash(content),
            layout: *layout,
        })
    }

    fn segments(&self, content: &str) -> Vec<Segment> {
        let mut out = Vec::new();
        let mut rest = content;
        // Separator for the next emitted segment; the first one never joins.
        let mut next_sep = Sep::Space;

        if self.policy.title_first_line
            && let Some((first, tail)) = content.split_once('\n')
            && !first.trim().is_empty()
        {
            out.push(Segment {
                text: first.trim_end().to_string(),
                sep: Sep::Space,
            });
            rest = tail;
            next_sep = Sep::Newline;
        }

        while !rest.is_empty() {
            let fence = if self.policy.code_fences {
                find_fenced_block(rest)
            } else {
                None
            };

            match fence {
                Some((start, end)) => {
                    push_words(&rest[..start], &mut out, &mut next_sep);
                    out.push(Segment {
                        text: rest[start..end].trim_end().to_string(),
                        sep: Sep::Newline,
                    });
                    next_sep = Sep::Newline;
                    rest = &rest[end..];
                }
                None => {
                    push_words(rest, &mut out, &mut next_sep);
                    rest = "";
                }
            }
        }

        out
    }
}

fn push_words(text: &str, out: &mut Vec<Segment>, next_sep: &mut Sep) {
    for word in text.split_whitespace() {
        out.push(Segment {
            text: word.to_string(),
            sep: *next_sep,
        });
        *next_sep = Sep::Space;
    }
}

/// Byte span of the first complete ``` … ``` block, fences included.
/// An unclosed fence is not a block; the text paginates as plain words.
fn find_fenced_block(text: &str) -> Option<(usize, usize)> {
    let start = text.find(CODE_FENCE)?;
    let body = start + CODE_FENCE.len();
    let close = text[body..].find(CODE_FENCE)?;
    Some((start, body + close + CODE_FENCE.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic oracle: every whitespace token is 10 px tall, so a
    /// viewport of `10 * n` usable px fits exactly `n` tokens per page.
    struct TokenSurface;

    const TOKEN_HEIGHT_PX: u32 = 10;

    impl MeasurementSurface for TokenSurface {
        fn measure_height(&self, text: &str, _layout: &LayoutConfig) -> Result<u32, MeasureError> {
            Ok(text.split_whitespace().count() as u32 * TOKEN_HEIGHT_PX)
        }
    }

    fn token_layout(tokens_per_page: u32) -> LayoutConfig {
        LayoutConfig {
            viewport_width_px: 640,
            viewport_height_px: tokens_per_page * TOKEN_HEIGHT_PX,
            font_size_px: 16,
            font_family: FontFamily::Serif,
            line_height: DEFAULT_LINE_HEIGHT,
            padding_px: 0,
        }
    }

    fn plain() -> Paginator {
        Paginator::new(ContentPolicy {
            title_first_line: false,
            code_fences: false,
        })
    }

    #[test]
    fn empty_content_yields_one_empty_page() {
        let set = plain()
            .paginate("", &token_layout(5), &TokenSurface)
            .unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.page(0), Some(""));
    }

    #[test]
    fn short_content_fits_one_page() {
        let set = plain()
            .paginate("hello world", &token_layout(5), &TokenSurface)
            .unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.page(0), Some("hello world"));
    }

    #[test]
    fn six_hundred_words_at_hundred_per_page_is_six_pages() {
        let words: Vec<String> = (0..600).map(|i| format!("w{i}")).collect();
        let content = words.join(" ");
        let layout = token_layout(100);
        let set = plain().paginate(&content, &layout, &TokenSurface).unwrap();
        assert_eq!(set.len(), 6);
        for page in set.pages() {
            let height = TokenSurface.measure_height(page, &layout).unwrap();
            assert!(height <= layout.usable_height_px());
        }
    }

    #[test]
    fn no_token_lost_duplicated_or_reordered() {
        let words: Vec<String> = (0..137).map(|i| format!("tok{i}")).collect();
        let content = words.join(" ");
        let set = plain()
            .paginate(&content, &token_layout(7), &TokenSurface)
            .unwrap();
        let rejoined = set.pages().join(" ");
        let original: Vec<&str> = content.split_whitespace().collect();
        let recovered: Vec<&str> = rejoined.split_whitespace().collect();
        assert_eq!(original, recovered);
    }

    #[test]
    fn pagination_is_deterministic() {
        let words: Vec<String> = (0..90).map(|i| format!("x{i}")).collect();
        let content = words.join(" ");
        let layout = token_layout(8);
        let first = plain().paginate(&content, &layout, &TokenSurface).unwrap();
        let second = plain().paginate(&content, &layout, &TokenSurface).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn oversized_code_block_lands_alone_unsplit() {
        let block_body: Vec<String> = (0..30).map(|i| format!("line{i}")).collect();
        let block = format!("```\n{}\n```", block_body.join("\n"));
        let content = format!("before text {block} after text");
        let paginator = Paginator::new(ContentPolicy {
            title_first_line: false,
            code_fences: true,
        });
        let set = paginator
            .paginate(&content, &token_layout(10), &TokenSurface)
            .unwrap();

        let block_pages: Vec<&String> = set
            .pages()
            .iter()
            .filter(|p| p.contains(CODE_FENCE))
            .collect();
        assert_eq!(block_pages.len(), 1);
        assert_eq!(block_pages[0].matches(CODE_FENCE).count(), 2);
        assert!(block_pages[0].starts_with(CODE_FENCE));
        assert!(set.pages().iter().any(|p| p.contains("before")));
        assert!(set.pages().iter().any(|p| p.contains("after")));
    }

    #[test]
    fn unclosed_fence_paginates_as_plain_words() {
        let content = "alpha ``` beta gamma";
        let paginator = Paginator::new(ContentPolicy {
            title_first_line: false,
            code_fences: true,
        });
        let set = paginator
            .paginate(content, &token_layout(10), &TokenSurface)
            .unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.page(0), Some("alpha ``` beta gamma"));
    }

    #[test]
    fn title_line_keeps_its_newline() {
        let paginator = Paginator::new(ContentPolicy {
            title_first_line: true,
            code_fences: false,
        });
        let set = paginator
            .paginate("Chapter One\nIt was a dark night.", &token_layout(20), &TokenSurface)
            .unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.page(0), Some("Chapter One\nIt was a dark night."));
    }

    #[test]
    fn oversized_single_token_gets_its_own_page() {
        // Three tokens per page, but the middle "token" is a code block
        // measuring ten tokens tall.
        let content = "a b ``` c d e f g h i j ``` k";
        let paginator = Paginator::new(ContentPolicy {
            title_first_line: false,
            code_fences: true,
        });
        let set = paginator
            .paginate(content, &token_layout(3), &TokenSurface)
            .unwrap();
        assert_eq!(set.pages().len(), 3);
        assert_eq!(set.page(0), Some("a b"));
        assert!(set.page(1).unwrap().starts_with(CODE_FENCE));
        assert_eq!(set.page(2), Some("k"));
    }

    #[test]
    fn page_set_invalidates_on_content_or_layout_change() {
        let layout = token_layout(5);
        let set = plain().paginate("same text", &layout, &TokenSurface).unwrap();
        assert!(set.is_valid_for("same text", &layout));
        assert!(!set.is_valid_for("other text", &layout));

        let mut grown = layout;
        grown.font_size_px = 20;
        assert!(!set.is_valid_for("same text", &grown));
    }

    #[test]
    fn surface_failure_surfaces_as_measurement_unavailable() {
        struct DeadSurface;
        impl MeasurementSurface for DeadSurface {
            fn measure_height(&self, _: &str, _: &LayoutConfig) -> Result<u32, MeasureError> {
                Err(MeasureError::SurfaceUnavailable)
            }
        }
        let err = plain()
            .paginate("text", &token_layout(5), &DeadSurface)
            .unwrap_err();
        assert_eq!(err, PaginateError::MeasurementUnavailable);
    }

    #[test]
    fn larger_font_never_reduces_page_count_on_cell_surface() {
        let words: Vec<String> = (0..220).map(|i| format!("word{i:03}")).collect();
        let content = words.join(" ");
        let surface = CellSurface::new();
        let mut previous = 0usize;
        for font_size in quire_core::MIN_FONT_SIZE_PX..=quire_core::MAX_FONT_SIZE_PX {
            let settings = quire_core::DisplaySettings::default().with_font_size(font_size);
            let layout = LayoutConfig::for_viewport(480, 360, &settings);
            let set = plain().paginate(&content, &layout, &surface).unwrap();
            assert!(
                set.len() >= previous,
                "page count fell from {previous} to {} at {font_size} px",
                set.len()
            );
            previous = set.len();
        }
    }

    #[test]
    fn cell_surface_pages_fit_the_viewport() {
        let words: Vec<String> = (0..150).map(|i| format!("word{i}")).collect();
        let content = words.join(" ");
        let surface = CellSurface::new();
        let settings = quire_core::DisplaySettings::default();
        let layout = LayoutConfig::for_viewport(480, 360, &settings);
        let set = plain().paginate(&content, &layout, &surface).unwrap();
        assert!(set.len() > 1);
        for page in set.pages() {
            let height = surface.measure_height(page, &layout).unwrap();
            assert!(height <= layout.usable_height_px());
        }
    }
}
