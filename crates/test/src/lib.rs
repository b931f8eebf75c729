//! Test helpers and fixtures.

use quire_core::{AccountId, DisplaySettings, Document, DocumentId, FontFamily, Theme};
use quire_engine::{LayoutConfig, MeasureError, MeasurementSurface};

pub fn make_settings(font_size_px: u16) -> DisplaySettings {
    DisplaySettings::default()
        .with_font_size(font_size_px)
        .with_theme(Theme::Dark)
        .with_font_family(FontFamily::Serif)
}

pub fn make_document(id: i64, content: &str) -> Document {
    Document {
        id: DocumentId(id),
        owner_id: AccountId(1),
        title: format!("Fixture {id}"),
        content: content.to_string(),
        created_at: 0,
        last_accessed: 0,
        current_page: 0,
        settings: DisplaySettings::default(),
    }
}

/// Content with `words` space-separated words, one sentence per 12 words.
pub fn make_prose(words: usize) -> String {
    let mut out = String::new();
    for i in 0..words {
        if i > 0 {
            out.push(' ');
        }
        out.push_str("word");
        out.push_str(&i.to_string());
        if i % 12 == 11 {
            out.push('.');
        }
    }
    out
}

/// Deterministic height oracle: every word costs a fixed pixel height, no
/// matter the layout. Keeps pagination tests independent of wrap math.
#[derive(Debug, Clone, Copy)]
pub struct FixedSurface {
    pub px_per_word: u32,
}

impl MeasurementSurface for FixedSurface {
    fn measure_height(&self, text: &str, _layout: &LayoutConfig) -> Result<u32, MeasureError> {
        Ok(text.split_whitespace().count() as u32 * self.px_per_word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_settings() {
        let settings = make_settings(20);
        assert_eq!(settings.font_size_px, 20);
        assert_eq!(settings.theme, Theme::Dark);
    }

    #[test]
    fn prose_has_requested_word_count() {
        assert_eq!(make_prose(120).split_whitespace().count(), 120);
    }

    #[test]
    fn fixture_document_paginates_with_a_fixed_surface() {
        let doc = make_document(3, &make_prose(50));
        let surface = FixedSurface { px_per_word: 10 };
        let layout = LayoutConfig {
            viewport_height_px: 100,
            padding_px: 0,
            ..LayoutConfig::for_viewport(640, 100, &doc.settings)
        };
        let set = quire_engine::Paginator::default()
            .paginate(&doc.content, &layout, &surface)
            .unwrap();
        assert_eq!(set.len(), 5, "50 words at 10 per page");
    }
}

#[cfg(test)]
mod integration {
    use std::time::{Duration, Instant};

    use quire_application::{AuthGateway, DocumentStore, Nav, ReaderSession, SAVE_DELAY};
    use quire_core::DisplaySettings;
    use quire_engine::{CellSurface, LayoutConfig, Paginator};
    use quire_storage::Storage;

    use super::make_prose;

    #[test]
    fn reading_position_survives_reopen() {
        let mut storage = Storage::open_in_memory().unwrap();
        let account = storage.sign_in_with_provider().unwrap();
        let id = storage
            .create_document(account.id, "Long read", &make_prose(2000))
            .unwrap();
        let doc = storage.get_document(account.id, id).unwrap().unwrap();

        let surface = CellSurface::new();
        let layout = LayoutConfig::for_viewport(640, 384, &DisplaySettings::default());
        let mut session = ReaderSession::new(Paginator::default());
        let t0 = Instant::now();
        session.load_book(doc, layout, &surface, t0);
        assert!(session.page_count() > 1);

        session.navigate(Nav::Next, t0);
        let after_turn = t0 + Duration::from_millis(600);
        session.tick(after_turn, &surface, &mut storage);
        assert_eq!(session.current_page_index(), 1);

        session.tick(after_turn + SAVE_DELAY + Duration::from_millis(1), &surface, &mut storage);

        let reopened = storage.get_document(account.id, id).unwrap().unwrap();
        assert_eq!(reopened.current_page, 1);
    }

    #[test]
    fn closing_mid_debounce_still_persists() {
        let mut storage = Storage::open_in_memory().unwrap();
        let account = storage.sign_in_with_provider().unwrap();
        let id = storage
            .create_document(account.id, "Short read", &make_prose(400))
            .unwrap();
        let doc = storage.get_document(account.id, id).unwrap().unwrap();

        let surface = CellSurface::new();
        let layout = LayoutConfig::for_viewport(640, 384, &DisplaySettings::default());
        let mut session = ReaderSession::new(Paginator::default());
        let t0 = Instant::now();
        session.load_book(doc, layout, &surface, t0);

        session.step_font_size(2, t0);
        session.close(&mut storage);

        let reopened = storage.get_document(account.id, id).unwrap().unwrap();
        assert_eq!(
            reopened.settings.font_size_px,
            DisplaySettings::default().font_size_px + 2
        );
    }
}
