//! Core domain types for Quire.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(pub i64);

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountId(pub i64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
}

pub const MIN_FONT_SIZE_PX: u16 = 12;
pub const MAX_FONT_SIZE_PX: u16 = 32;

/// Per-document display settings. Immutable value type: changes go through
/// the `with_*`/`step_*` constructors, which clamp at the point of change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub font_size_px: u16,
    pub theme: Theme,
    pub animation: Animation,
    pub font_family: FontFamily,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            font_size_px: 16,
            theme: Theme::Indigo,
            animation: Animation::Slide,
            font_family: FontFamily::Serif,
        }
    }
}

impl DisplaySettings {
    pub fn with_font_size(self, font_size_px: u16) -> Self {
        Self {
            font_size_px: font_size_px.clamp(MIN_FONT_SIZE_PX, MAX_FONT_SIZE_PX),
            ..self
        }
    }

    pub fn step_font_size(self, delta: i16) -> Self {
        let stepped = self.font_size_px.saturating_add_signed(delta);
        self.with_font_size(stepped)
    }

    pub fn with_theme(self, theme: Theme) -> Self {
        Self { theme, ..self }
    }

    pub fn with_animation(self, animation: Animation) -> Self {
        Self { animation, ..self }
    }

    pub fn with_font_family(self, font_family: FontFamily) -> Self {
        Self {
            font_family,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    Sepia,
    Indigo,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::Sepia => "sepia",
            Theme::Indigo => "indigo",
        }
    }

    pub fn cycled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Sepia,
            Theme::Sepia => Theme::Indigo,
            Theme::Indigo => Theme::Light,
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Theme {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "sepia" => Ok(Theme::Sepia),
            "indigo" => Ok(Theme::Indigo),
            _ => Err("unknown theme"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Animation {
    Slide,
    Fade,
}

impl Animation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Animation::Slide => "slide",
            Animation::Fade => "fade",
        }
    }

    /// Fixed page-transition duration per style.
    pub fn duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(500)
    }

    pub fn cycled(self) -> Self {
        match self {
            Animation::Slide => Animation::Fade,
            Animation::Fade => Animation::Slide,
        }
    }
}

impl std::fmt::Display for Animation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Animation {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "slide" => Ok(Animation::Slide),
            "fade" => Ok(Animation::Fade),
            _ => Err("unknown animation"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontFamily {
    Serif,
    Sans,
    Mono,
}

impl FontFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            FontFamily::Serif => "serif",
            FontFamily::Sans => "sans",
            FontFamily::Mono => "mono",
        }
    }

    pub fn cycled(self) -> Self {
        match self {
            FontFamily::Serif => FontFamily::Sans,
            FontFamily::Sans => FontFamily::Mono,
            FontFamily::Mono => FontFamily::Serif,
        }
    }
}

impl std::fmt::Display for FontFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FontFamily {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "serif" => Ok(FontFamily::Serif),
            "sans" => Ok(FontFamily::Sans),
            "mono" => Ok(FontFamily::Mono),
            _ => Err("unknown font family"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub owner_id: AccountId,
    pub title: String,
    pub content: String,
    pub created_at: i64,
    pub last_accessed: i64,
    pub current_page: u32,
    pub settings: DisplaySettings,
}

/// Partial update for `update_document`; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentUpdate {
    pub current_page: Option<u32>,
    pub settings: Option<DisplaySettings>,
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub current_page: u32,
    pub total_pages: u32,
}

impl Progress {
    pub fn percent(&self) -> f32 {
        if self.total_pages == 0 {
            0.0
        } else {
            (self.current_page as f32 / self.total_pages as f32) * 100.0
        }
    }
}

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("title is required")]
    EmptyTitle,
    #[error("content cannot be empty")]
    EmptyContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("document belongs to another account")]
    Permission,
    #[error("storage unavailable: {0}")]
    Backend(String),
}

/// Normalized auth failures; backend error codes never leak past here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("enter a valid email address")]
    InvalidEmail,
    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,
    #[error("an account with this email already exists")]
    EmailInUse,
    #[error("incorrect email or password")]
    InvalidCredentials,
    #[error("sign-in unavailable: {0}")]
    Backend(String),
}

pub fn validate_email(email: &str) -> Result<(), AuthError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(AuthError::InvalidEmail),
    }
}

pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LEN {
        Err(AuthError::WeakPassword)
    } else {
        Ok(())
    }
}
