//! ratatui-based UI.

use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use anyhow::Context as _;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{event, terminal};
use quire_application::{
    AuthGateway, DocumentStore, Nav, ReaderSession, SessionFailure, SessionPhase,
};
use quire_core::{Account, Document, DocumentId, Theme};
use quire_engine::{CellSurface, LayoutConfig, Paginator, wrap_lines};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Margin, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};

/// Assumed terminal cell geometry; the pagination engine works in pixels.
const CELL_WIDTH_PX: u32 = 8;
const CELL_HEIGHT_PX: u32 = 16;

const TICK_RATE: Duration = Duration::from_millis(50);

/// Reader chrome: one header row, one footer row.
const READER_CHROME_ROWS: u16 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Auth,
    Library,
    Import,
    Reader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthMode {
    SignIn,
    SignUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthFocus {
    Email,
    Password,
}

#[derive(Debug, Clone)]
struct AuthPanel {
    mode: AuthMode,
    focus: AuthFocus,
    email: String,
    password: String,
    error: Option<String>,
}

impl Default for AuthPanel {
    fn default() -> Self {
        Self {
            mode: AuthMode::SignIn,
            focus: AuthFocus::Email,
            email: String::new(),
            password: String::new(),
            error: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct LibraryPanel {
    docs: Vec<Document>,
    selected: usize,
    confirm_delete: Option<DocumentId>,
    error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImportFocus {
    Title,
    Path,
}

#[derive(Debug, Clone)]
struct ImportPanel {
    focus: ImportFocus,
    title: String,
    path: String,
    error: Option<String>,
}

impl Default for ImportPanel {
    fn default() -> Self {
        Self {
            focus: ImportFocus::Title,
            title: String::new(),
            path: String::new(),
            error: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct GotoPanel {
    open: bool,
    input: String,
}

/// Theme palette for the chrome; the single point where an abstract theme
/// value becomes terminal colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Palette {
    bg: Color,
    fg: Color,
    accent: Color,
}

fn palette(theme: Theme) -> Palette {
    match theme {
        Theme::Light => Palette {
            bg: Color::White,
            fg: Color::Black,
            accent: Color::Blue,
        },
        Theme::Dark => Palette {
            bg: Color::Black,
            fg: Color::Gray,
            accent: Color::Yellow,
        },
        Theme::Sepia => Palette {
            bg: Color::Rgb(244, 232, 208),
            fg: Color::Rgb(91, 70, 54),
            accent: Color::Rgb(166, 124, 82),
        },
        Theme::Indigo => Palette {
            bg: Color::Rgb(30, 27, 75),
            fg: Color::Rgb(224, 231, 255),
            accent: Color::Rgb(129, 140, 248),
        },
    }
}

pub struct Ui<G: DocumentStore + AuthGateway> {
    store: G,
    account: Option<Account>,
    screen: Screen,
    auth: AuthPanel,
    library: LibraryPanel,
    import: ImportPanel,
    goto_panel: GotoPanel,
    settings_open: bool,
    session: ReaderSession,
    surface: CellSurface,
    last_size: (u16, u16),
}

impl<G: DocumentStore + AuthGateway> Ui<G> {
    pub fn new(store: G) -> Self {
        Self {
            store,
            account: None,
            screen: Screen::Auth,
            auth: AuthPanel::default(),
            library: LibraryPanel::default(),
            import: ImportPanel::default(),
            goto_panel: GotoPanel::default(),
            settings_open: false,
            session: ReaderSession::new(Paginator::default()),
            surface: CellSurface::new(),
            last_size: (80, 24),
        }
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        let mut terminal = setup_terminal()?;
        terminal.clear().ok();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.event_loop(&mut terminal)
        }));
        let restore_result = restore_terminal(&mut terminal);

        match (result, restore_result) {
            (Ok(Ok(())), Ok(())) => Ok(()),
            (Ok(Ok(())), Err(err)) => Err(err),
            (Ok(Err(err)), _) => Err(err),
            (Err(panic), Ok(())) => Err(anyhow::anyhow!(panic_to_string(panic))),
            (Err(panic), Err(err)) => Err(anyhow::anyhow!(
                "{}\n(additionally failed to restore terminal: {err})",
                panic_to_string(panic)
            )),
        }
    }

    fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    ) -> anyhow::Result<()> {
        let size = terminal.size().context("query terminal size")?;
        self.last_size = (size.width, size.height);

        loop {
            terminal.draw(|frame| {
                let area = frame.area();
                self.draw(area, frame);
            })?;

            let now = Instant::now();
            if self.screen == Screen::Reader {
                self.session.tick(now, &self.surface, &mut self.store);
            }

            if !event::poll(TICK_RATE)? {
                continue;
            }

            match event::read()? {
                Event::Resize(width, height) => {
                    self.last_size = (width, height);
                    if self.screen == Screen::Reader {
                        self.session
                            .viewport_resized(self.reader_layout(), Instant::now());
                    }
                }
                Event::Key(key) => {
                    if key.kind == KeyEventKind::Release {
                        continue;
                    }
                    if !self.handle_key(key) {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
    }

    /// Returns false when the app should quit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        match self.screen {
            Screen::Auth => self.handle_auth_key(key),
            Screen::Library => self.handle_library_key(key),
            Screen::Import => self.handle_import_key(key),
            Screen::Reader => self.handle_reader_key(key),
        }
    }

    fn handle_auth_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Esc => return false,
            KeyCode::Tab | KeyCode::Down | KeyCode::Up => {
                self.auth.focus = match self.auth.focus {
                    AuthFocus::Email => AuthFocus::Password,
                    AuthFocus::Password => AuthFocus::Email,
                };
            }
            KeyCode::Char('t') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.auth.mode = match self.auth.mode {
                    AuthMode::SignIn => AuthMode::SignUp,
                    AuthMode::SignUp => AuthMode::SignIn,
                };
                self.auth.error = None;
            }
            KeyCode::Char('g') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                match self.store.sign_in_with_provider() {
                    Ok(account) => self.finish_sign_in(account),
                    Err(err) => self.auth.error = Some(err.to_string()),
                }
            }
            KeyCode::Enter => {
                let result = match self.auth.mode {
                    AuthMode::SignIn => self.store.sign_in(&self.auth.email, &self.auth.password),
                    AuthMode::SignUp => self.store.sign_up(&self.auth.email, &self.auth.password),
                };
                match result {
                    Ok(account) => self.finish_sign_in(account),
                    Err(err) => self.auth.error = Some(err.to_string()),
                }
            }
            KeyCode::Backspace => {
                match self.auth.focus {
                    AuthFocus::Email => self.auth.email.pop(),
                    AuthFocus::Password => self.auth.password.pop(),
                };
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                match self.auth.focus {
                    AuthFocus::Email => self.auth.email.clear(),
                    AuthFocus::Password => self.auth.password.clear(),
                }
            }
            KeyCode::Char(ch) => match self.auth.focus {
                AuthFocus::Email => self.auth.email.push(ch),
                AuthFocus::Password => self.auth.password.push(ch),
            },
            _ => {}
        }
        true
    }

    fn finish_sign_in(&mut self, account: Account) {
        self.account = Some(account);
        self.auth = AuthPanel::default();
        self.refresh_library();
        self.screen = Screen::Library;
    }

    fn refresh_library(&mut self) {
        let Some(account) = self.account.as_ref() else {
            return;
        };
        match self.store.list_documents(account.id) {
            Ok(docs) => {
                self.library.docs = docs;
                self.library.selected = self
                    .library
                    .selected
                    .min(self.library.docs.len().saturating_sub(1));
                self.library.error = None;
            }
            Err(err) => self.library.error = Some(err.to_string()),
        }
    }

    fn handle_library_key(&mut self, key: KeyEvent) -> bool {
        if let Some(id) = self.library.confirm_delete {
            match key.code {
                KeyCode::Char('y') | KeyCode::Enter => {
                    self.library.confirm_delete = None;
                    if let Some(account) = self.account.as_ref() {
                        let owner = account.id;
                        if let Err(err) = self.store.delete_document(owner, id) {
                            self.library.error = Some(err.to_string());
                        }
                    }
                    self.refresh_library();
                }
                KeyCode::Char('n') | KeyCode::Esc => {
                    self.library.confirm_delete = None;
                }
                _ => {}
            }
            return true;
        }

        match key.code {
            KeyCode::Esc => return false,
            KeyCode::Up | KeyCode::Char('k') => {
                self.library.selected = self.library.selected.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.library.selected + 1 < self.library.docs.len() {
                    self.library.selected += 1;
                }
            }
            KeyCode::Enter => self.open_selected(),
            KeyCode::Char('a') => {
                self.import = ImportPanel::default();
                self.screen = Screen::Import;
            }
            KeyCode::Char('d') => {
                if let Some(doc) = self.library.docs.get(self.library.selected) {
                    self.library.confirm_delete = Some(doc.id);
                }
            }
            KeyCode::Char('o') => {
                self.store.sign_out();
                self.account = None;
                self.library = LibraryPanel::default();
                self.screen = Screen::Auth;
            }
            KeyCode::Char('r') => self.refresh_library(),
            _ => {}
        }
        true
    }

    fn open_selected(&mut self) {
        let Some(account) = self.account.as_ref() else {
            return;
        };
        let owner = account.id;
        let Some(doc) = self.library.docs.get(self.library.selected) else {
            return;
        };
        match self.store.get_document(owner, doc.id) {
            Ok(Some(doc)) => {
                let layout = self.reader_layout();
                self.session
                    .load_book(doc, layout, &self.surface, Instant::now());
                self.settings_open = false;
                self.goto_panel = GotoPanel::default();
                self.screen = Screen::Reader;
            }
            Ok(None) => {
                self.library.error = Some("document no longer exists".to_string());
                self.refresh_library();
            }
            Err(err) => self.library.error = Some(err.to_string()),
        }
    }

    fn handle_import_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Esc => {
                self.screen = Screen::Library;
            }
            KeyCode::Tab | KeyCode::Down | KeyCode::Up => {
                self.import.focus = match self.import.focus {
                    ImportFocus::Title => ImportFocus::Path,
                    ImportFocus::Path => ImportFocus::Title,
                };
            }
            KeyCode::Enter => self.submit_import(),
            KeyCode::Backspace => {
                match self.import.focus {
                    ImportFocus::Title => self.import.title.pop(),
                    ImportFocus::Path => self.import.path.pop(),
                };
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                match self.import.focus {
                    ImportFocus::Title => self.import.title.clear(),
                    ImportFocus::Path => self.import.path.clear(),
                }
            }
            KeyCode::Char(ch) => match self.import.focus {
                ImportFocus::Title => self.import.title.push(ch),
                ImportFocus::Path => self.import.path.push(ch),
            },
            _ => {}
        }
        true
    }

    fn submit_import(&mut self) {
        let Some(account) = self.account.as_ref() else {
            return;
        };
        let owner = account.id;
        let content = match std::fs::read_to_string(self.import.path.trim()) {
            Ok(content) => content,
            Err(err) => {
                self.import.error = Some(format!("cannot read file: {err}"));
                return;
            }
        };
        match self.store.create_document(owner, &self.import.title, &content) {
            Ok(_) => {
                self.refresh_library();
                self.screen = Screen::Library;
            }
            Err(err) => self.import.error = Some(err.to_string()),
        }
    }

    fn handle_reader_key(&mut self, key: KeyEvent) -> bool {
        let now = Instant::now();

        if self.goto_panel.open {
            match key.code {
                KeyCode::Esc => {
                    self.goto_panel = GotoPanel::default();
                }
                KeyCode::Enter => {
                    if let Ok(page) = self.goto_panel.input.parse::<usize>()
                        && page > 0
                    {
                        self.session.navigate(Nav::JumpTo(page - 1), now);
                    }
                    self.goto_panel = GotoPanel::default();
                }
                KeyCode::Backspace => {
                    self.goto_panel.input.pop();
                }
                KeyCode::Char(ch) if ch.is_ascii_digit() => {
                    self.goto_panel.input.push(ch);
                }
                _ => {}
            }
            return true;
        }

        if self.settings_open {
            match key.code {
                KeyCode::Esc | KeyCode::Char('s') => self.settings_open = false,
                KeyCode::Char('+') | KeyCode::Char('=') => self.session.step_font_size(1, now),
                KeyCode::Char('-') => self.session.step_font_size(-1, now),
                KeyCode::Char('t') => {
                    if let Some(settings) = self.session.settings() {
                        self.session.set_theme(settings.theme.cycled(), now);
                    }
                }
                KeyCode::Char('a') => {
                    if let Some(settings) = self.session.settings() {
                        self.session.set_animation(settings.animation.cycled(), now);
                    }
                }
                KeyCode::Char('f') => {
                    if let Some(settings) = self.session.settings() {
                        self.session
                            .set_font_family(settings.font_family.cycled(), now);
                    }
                }
                _ => {}
            }
            return true;
        }

        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => {
                self.session.close(&mut self.store);
                self.refresh_library();
                self.screen = Screen::Library;
            }
            KeyCode::Right | KeyCode::Char('l') | KeyCode::Char(' ') => {
                self.session.navigate(Nav::Next, now);
            }
            KeyCode::Left | KeyCode::Char('h') => {
                self.session.navigate(Nav::Previous, now);
            }
            KeyCode::Char('g') => {
                self.goto_panel.open = true;
            }
            KeyCode::Char('s') => self.settings_open = true,
            KeyCode::Char('+') | KeyCode::Char('=') => self.session.step_font_size(1, now),
            KeyCode::Char('-') => self.session.step_font_size(-1, now),
            _ => {}
        }
        true
    }

    /// Pixel-space layout for the reader body at the current terminal size.
    fn reader_layout(&self) -> LayoutConfig {
        let (cols, rows) = self.last_size;
        let body_rows = rows.saturating_sub(READER_CHROME_ROWS);
        let settings = self.session.settings().unwrap_or_default();
        LayoutConfig::for_viewport(
            u32::from(cols) * CELL_WIDTH_PX,
            u32::from(body_rows) * CELL_HEIGHT_PX,
            &settings,
        )
    }

    fn current_theme(&self) -> Theme {
        self.session
            .settings()
            .map(|s| s.theme)
            .unwrap_or(Theme::Indigo)
    }

    fn draw(&mut self, area: Rect, frame: &mut ratatui::Frame) {
        self.last_size = (area.width, area.height);
        let colors = match self.screen {
            Screen::Reader => palette(self.current_theme()),
            _ => palette(Theme::Indigo),
        };
        frame.render_widget(
            Block::default().style(Style::default().bg(colors.bg).fg(colors.fg)),
            area,
        );

        match self.screen {
            Screen::Auth => self.draw_auth(area, frame, colors),
            Screen::Library => self.draw_library(area, frame, colors),
            Screen::Import => self.draw_import(area, frame, colors),
            Screen::Reader => self.draw_reader(area, frame, colors),
        }
    }

    fn draw_auth(&self, area: Rect, frame: &mut ratatui::Frame, colors: Palette) {
        let popup = centered_rect(60, 50, area);
        frame.render_widget(Clear, popup);

        let title = match self.auth.mode {
            AuthMode::SignIn => "Sign in",
            AuthMode::SignUp => "Create account",
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" Quire - {title} "))
            .style(Style::default().bg(colors.bg).fg(colors.fg));
        let inner = block.inner(popup);
        frame.render_widget(block, popup);

        let focus_style = Style::default()
            .fg(colors.accent)
            .add_modifier(Modifier::BOLD);
        let plain = Style::default().fg(colors.fg);
        let masked: String = "*".repeat(self.auth.password.len());

        let mut lines = vec![
            Line::from(vec![
                Span::styled(
                    "Email:    ",
                    if self.auth.focus == AuthFocus::Email {
                        focus_style
                    } else {
                        plain
                    },
                ),
                Span::raw(self.auth.email.clone()),
            ]),
            Line::from(vec![
                Span::styled(
                    "Password: ",
                    if self.auth.focus == AuthFocus::Password {
                        focus_style
                    } else {
                        plain
                    },
                ),
                Span::raw(masked),
            ]),
            Line::raw(""),
        ];
        if let Some(error) = &self.auth.error {
            lines.push(Line::styled(error.clone(), Style::default().fg(Color::Red)));
            lines.push(Line::raw(""));
        }
        lines.push(hint_line(&[
            ("Enter", "submit"),
            ("Tab", "switch field"),
            ("Ctrl+t", "sign in/up"),
        ]));
        lines.push(hint_line(&[("Ctrl+g", "device account"), ("Esc", "quit")]));

        frame.render_widget(Paragraph::new(lines), inner);
    }

    fn draw_library(&self, area: Rect, frame: &mut ratatui::Frame, colors: Palette) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(1),
                Constraint::Length(1),
            ])
            .split(area);

        let email = self
            .account
            .as_ref()
            .map(|a| a.email.clone())
            .unwrap_or_default();
        frame.render_widget(
            Paragraph::new(Line::from(vec![
                Span::styled("Quire", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(" library  "),
                Span::styled(email, Style::default().fg(colors.accent)),
            ])),
            chunks[0],
        );

        if self.library.docs.is_empty() {
            frame.render_widget(
                Paragraph::new("No documents yet. Press 'a' to import one.")
                    .alignment(Alignment::Center),
                chunks[1],
            );
        } else {
            let items: Vec<ListItem> = self
                .library
                .docs
                .iter()
                .map(|doc| {
                    ListItem::new(Line::from(vec![
                        Span::raw(doc.title.clone()),
                        Span::styled(
                            format!("  (page {})", doc.current_page + 1),
                            Style::default().fg(colors.accent),
                        ),
                    ]))
                })
                .collect();
            let list = List::new(items)
                .highlight_style(
                    Style::default()
                        .fg(colors.accent)
                        .add_modifier(Modifier::BOLD),
                )
                .highlight_symbol("> ");
            let mut state = ListState::default();
            state.select(Some(self.library.selected));
            frame.render_stateful_widget(list, chunks[1], &mut state);
        }

        let footer = if self.library.confirm_delete.is_some() {
            hint_line(&[("y", "delete"), ("n", "keep")])
        } else if let Some(error) = &self.library.error {
            Line::styled(error.clone(), Style::default().fg(Color::Red))
        } else {
            hint_line(&[
                ("Enter", "read"),
                ("a", "add"),
                ("d", "delete"),
                ("o", "sign out"),
                ("Esc", "quit"),
            ])
        };
        frame.render_widget(Paragraph::new(footer), chunks[2]);
    }

    fn draw_import(&self, area: Rect, frame: &mut ratatui::Frame, colors: Palette) {
        let popup = centered_rect(70, 50, area);
        frame.render_widget(Clear, popup);

        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Add new content ")
            .style(Style::default().bg(colors.bg).fg(colors.fg));
        let inner = block.inner(popup);
        frame.render_widget(block, popup);

        let focus_style = Style::default()
            .fg(colors.accent)
            .add_modifier(Modifier::BOLD);
        let plain = Style::default().fg(colors.fg);

        let mut lines = vec![
            Line::from(vec![
                Span::styled(
                    "Title: ",
                    if self.import.focus == ImportFocus::Title {
                        focus_style
                    } else {
                        plain
                    },
                ),
                Span::raw(self.import.title.clone()),
            ]),
            Line::from(vec![
                Span::styled(
                    "File:  ",
                    if self.import.focus == ImportFocus::Path {
                        focus_style
                    } else {
                        plain
                    },
                ),
                Span::raw(self.import.path.clone()),
            ]),
            Line::raw(""),
        ];
        if let Some(error) = &self.import.error {
            lines.push(Line::styled(error.clone(), Style::default().fg(Color::Red)));
            lines.push(Line::raw(""));
        }
        lines.push(hint_line(&[
            ("Enter", "save"),
            ("Tab", "switch field"),
            ("Esc", "back"),
        ]));

        frame.render_widget(Paragraph::new(lines), inner);
    }

    fn draw_reader(&self, area: Rect, frame: &mut ratatui::Frame, colors: Palette) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(1),
                Constraint::Length(1),
            ])
            .split(area);

        let title = self
            .session
            .document()
            .map(|doc| doc.title.clone())
            .unwrap_or_default();
        frame.render_widget(
            Paragraph::new(Line::styled(
                title,
                Style::default().add_modifier(Modifier::BOLD),
            ))
            .alignment(Alignment::Center),
            chunks[0],
        );

        self.draw_page_body(chunks[1], frame, colors);

        let footer = if let Some(progress) = self.session.progress() {
            Line::from(vec![
                Span::raw(format!(
                    "Page {} of {} ({:.0}%)   ",
                    progress.current_page,
                    progress.total_pages,
                    progress.percent()
                )),
                Span::styled(
                    "arrows turn  g goto  s settings  +/- font  Esc back",
                    Style::default().fg(colors.accent),
                ),
            ])
        } else {
            hint_line(&[("Esc", "back")])
        };
        frame.render_widget(
            Paragraph::new(footer).alignment(Alignment::Center),
            chunks[2],
        );

        if self.settings_open {
            self.draw_settings_panel(area, frame, colors);
        }
        if self.goto_panel.open {
            self.draw_goto_panel(area, frame, colors);
        }
    }

    fn draw_page_body(&self, area: Rect, frame: &mut ratatui::Frame, colors: Palette) {
        match self.session.phase() {
            SessionPhase::Paginating => {
                let message = match self.session.failure() {
                    Some(SessionFailure::PaginationFailed) => {
                        "Could not lay out this document. Reopen it to retry."
                    }
                    None => "Paginating...",
                };
                frame.render_widget(
                    Paragraph::new(message).alignment(Alignment::Center),
                    centered_rect(60, 20, area),
                );
                return;
            }
            SessionPhase::Idle => return,
            SessionPhase::Ready | SessionPhase::Transitioning => {}
        }

        let Some(content) = self.session.current_page_content() else {
            return;
        };
        let Some(layout) = self.session.page_layout() else {
            return;
        };
        // Render through the same line breaker the measurement surface used,
        // so the drawn page always fits what was measured.
        let Ok(wrapped) = wrap_lines(content, layout) else {
            return;
        };

        // During a page transition the body dims instead of animating; the
        // commit timing still matches the configured animation duration.
        let dimmed = self.session.phase() == SessionPhase::Transitioning;
        let body_style = if dimmed {
            Style::default().fg(colors.accent)
        } else {
            Style::default().fg(colors.fg)
        };

        let first_page = self.session.current_page_index() == 0;
        let lines: Vec<Line> = wrapped
            .iter()
            .enumerate()
            .map(|(i, text)| {
                if first_page && i == 0 && content.contains('\n') {
                    Line::styled(
                        text.clone(),
                        Style::default()
                            .fg(colors.accent)
                            .add_modifier(Modifier::BOLD),
                    )
                } else {
                    Line::styled(text.clone(), body_style)
                }
            })
            .collect();

        let inner = area.inner(Margin {
            horizontal: (layout.padding_px / CELL_WIDTH_PX) as u16,
            vertical: (layout.padding_px / CELL_HEIGHT_PX) as u16,
        });
        frame.render_widget(Paragraph::new(lines), inner);
    }

    fn draw_settings_panel(&self, area: Rect, frame: &mut ratatui::Frame, colors: Palette) {
        let popup = centered_rect(50, 50, area);
        frame.render_widget(Clear, popup);

        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Display settings ")
            .style(Style::default().bg(colors.bg).fg(colors.fg));
        let inner = block.inner(popup);
        frame.render_widget(block, popup);

        let Some(settings) = self.session.settings() else {
            return;
        };
        let value_style = Style::default()
            .fg(colors.accent)
            .add_modifier(Modifier::BOLD);
        let lines = vec![
            Line::from(vec![
                Span::raw("Font size   "),
                Span::styled(format!("{} px", settings.font_size_px), value_style),
                Span::raw("   (+/-)"),
            ]),
            Line::from(vec![
                Span::raw("Theme       "),
                Span::styled(settings.theme.to_string(), value_style),
                Span::raw("   (t)"),
            ]),
            Line::from(vec![
                Span::raw("Transition  "),
                Span::styled(settings.animation.to_string(), value_style),
                Span::raw("   (a)"),
            ]),
            Line::from(vec![
                Span::raw("Font        "),
                Span::styled(settings.font_family.to_string(), value_style),
                Span::raw("   (f)"),
            ]),
            Line::raw(""),
            hint_line(&[("Esc", "close")]),
        ];
        frame.render_widget(Paragraph::new(lines), inner);
    }

    fn draw_goto_panel(&self, area: Rect, frame: &mut ratatui::Frame, colors: Palette) {
        let popup = centered_rect(30, 20, area);
        frame.render_widget(Clear, popup);

        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Go to page ")
            .style(Style::default().bg(colors.bg).fg(colors.fg));
        let inner = block.inner(popup);
        frame.render_widget(block, popup);

        frame.render_widget(
            Paragraph::new(vec![
                Line::styled(
                    self.goto_panel.input.clone(),
                    Style::default().fg(colors.accent),
                ),
                hint_line(&[("Enter", "jump"), ("Esc", "cancel")]),
            ]),
            inner,
        );
    }
}

fn hint_line(hints: &[(&'static str, &'static str)]) -> Line<'static> {
    let mut spans = Vec::with_capacity(hints.len() * 2);
    for (i, (key, action)) in hints.iter().enumerate() {
        spans.push(Span::styled(
            *key,
            Style::default().add_modifier(Modifier::BOLD),
        ));
        let trailing = if i + 1 < hints.len() { "  " } else { "" };
        spans.push(Span::raw(format!(" {action}{trailing}")));
    }
    Line::from(spans)
}

fn setup_terminal() -> anyhow::Result<Terminal<CrosstermBackend<Stdout>>> {
    terminal::enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, EnterAlternateScreen).context("enter alt screen")?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("create terminal")
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    terminal::disable_raw_mode().context("disable raw mode")?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen).context("leave alt screen")?;
    Ok(())
}

fn panic_to_string(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic: (unknown payload)".to_string()
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
