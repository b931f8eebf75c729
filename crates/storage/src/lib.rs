//! Sqlite-backed persistence and auth gateways.

use std::path::Path;

use anyhow::Context as _;
use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString};
use quire_application::{AuthGateway, DocumentStore, SavedState, StateStore};
use quire_core::{
    Account, AccountId, AuthError, DisplaySettings, Document, DocumentId, DocumentUpdate,
    StoreError, ValidationError, validate_email, validate_password,
};
use rusqlite::{Connection, OptionalExtension as _};

#[derive(Debug)]
pub struct Storage {
    conn: Connection,
    signed_in: Option<Account>,
}

impl Storage {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("open sqlite db at {}", path.as_ref().display()))?;
        let storage = Self {
            conn,
            signed_in: None,
        };
        storage.migrate()?;
        Ok(storage)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
        let storage = Self {
            conn,
            signed_in: None,
        };
        storage.migrate()?;
        Ok(storage)
    }

    fn migrate(&self) -> anyhow::Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA foreign_keys=ON;

            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT,
                created_at INTEGER NOT NULL DEFAULT (unixepoch())
            );

            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY,
                owner_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at INTEGER NOT NULL DEFAULT (unixepoch()),
                last_accessed INTEGER NOT NULL DEFAULT (unixepoch()),
                current_page INTEGER NOT NULL DEFAULT 0,
                font_size INTEGER NOT NULL DEFAULT 16,
                theme TEXT NOT NULL DEFAULT 'indigo',
                animation TEXT NOT NULL DEFAULT 'slide'
            );
            "#,
        )?;

        match self.conn.execute(
            "ALTER TABLE documents ADD COLUMN font_family TEXT NOT NULL DEFAULT 'serif'",
            [],
        ) {
            Ok(_) => {}
            Err(err) => {
                let msg = err.to_string();
                if !msg.contains("duplicate column name") {
                    return Err(err).context("add documents.font_family column");
                }
            }
        }

        Ok(())
    }

    pub fn current_account(&self) -> Option<&Account> {
        self.signed_in.as_ref()
    }

    fn account_by_email(&self, email: &str) -> Result<Option<(Account, Option<String>)>, AuthError> {
        self.conn
            .query_row(
                "SELECT id, email, password_hash FROM accounts WHERE email = ?",
                [email],
                |row| {
                    Ok((
                        Account {
                            id: AccountId(row.get(0)?),
                            email: row.get(1)?,
                        },
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(auth_backend)
    }

    fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
        let font_size: i64 = row.get(6)?;
        let theme: String = row.get(7)?;
        let animation: String = row.get(8)?;
        let font_family: String = row.get(9)?;

        // Lenient settings load: unknown values fall back to defaults.
        let defaults = DisplaySettings::default();
        let settings = defaults
            .with_font_size(u16::try_from(font_size).unwrap_or(defaults.font_size_px))
            .with_theme(theme.parse().unwrap_or(defaults.theme))
            .with_animation(animation.parse().unwrap_or(defaults.animation))
            .with_font_family(font_family.parse().unwrap_or(defaults.font_family));

        Ok(Document {
            id: DocumentId(row.get(0)?),
            owner_id: AccountId(row.get(1)?),
            title: row.get(2)?,
            content: row.get(3)?,
            created_at: row.get(4)?,
            last_accessed: row.get(5)?,
            current_page: u32::try_from(row.get::<_, i64>(10)?).unwrap_or(0),
            settings,
        })
    }
}

const DOCUMENT_COLUMNS: &str = "id, owner_id, title, content, created_at, last_accessed, \
     font_size, theme, animation, font_family, current_page";

fn store_backend(err: rusqlite::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn auth_backend(err: rusqlite::Error) -> AuthError {
    AuthError::Backend(err.to_string())
}

impl StateStore for Storage {
    fn save_document_state(
        &mut self,
        id: DocumentId,
        state: &SavedState,
    ) -> Result<(), StoreError> {
        let settings = state.settings;
        let changed = self
            .conn
            .execute(
                r#"
                UPDATE documents
                SET current_page = ?, font_size = ?, theme = ?, animation = ?,
                    font_family = ?, last_accessed = unixepoch()
                WHERE id = ?
                "#,
                (
                    i64::from(state.current_page),
                    i64::from(settings.font_size_px),
                    settings.theme.as_str(),
                    settings.animation.as_str(),
                    settings.font_family.as_str(),
                    id.0,
                ),
            )
            .map_err(store_backend)?;
        log::debug!("saved state for document {id} ({changed} row)");
        Ok(())
    }
}

impl DocumentStore for Storage {
    fn create_document(
        &mut self,
        owner: AccountId,
        title: &str,
        content: &str,
    ) -> Result<DocumentId, StoreError> {
        if title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle.into());
        }
        if content.trim().is_empty() {
            return Err(ValidationError::EmptyContent.into());
        }

        let defaults = DisplaySettings::default();
        self.conn
            .execute(
                r#"
                INSERT INTO documents (owner_id, title, content, current_page,
                                       font_size, theme, animation, font_family)
                VALUES (?, ?, ?, 0, ?, ?, ?, ?)
                "#,
                (
                    owner.0,
                    title.trim(),
                    content,
                    i64::from(defaults.font_size_px),
                    defaults.theme.as_str(),
                    defaults.animation.as_str(),
                    defaults.font_family.as_str(),
                ),
            )
            .map_err(store_backend)?;
        Ok(DocumentId(self.conn.last_insert_rowid()))
    }

    fn get_document(
        &mut self,
        owner: AccountId,
        id: DocumentId,
    ) -> Result<Option<Document>, StoreError> {
        let doc = self
            .conn
            .query_row(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?"),
                [id.0],
                Storage::row_to_document,
            )
            .optional()
            .map_err(store_backend)?;

        match doc {
            Some(doc) if doc.owner_id != owner => Err(StoreError::Permission),
            other => Ok(other),
        }
    }

    fn list_documents(&mut self, owner: AccountId) -> Result<Vec<Document>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE owner_id = ? \
                 ORDER BY last_accessed DESC, id DESC"
            ))
            .map_err(store_backend)?;
        let rows = stmt
            .query_map([owner.0], Storage::row_to_document)
            .map_err(store_backend)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(store_backend)
    }

    fn update_document(
        &mut self,
        owner: AccountId,
        id: DocumentId,
        update: DocumentUpdate,
    ) -> Result<(), StoreError> {
        let Some(current) = self.get_document(owner, id)? else {
            return Ok(());
        };

        if let Some(title) = &update.title
            && title.trim().is_empty()
        {
            return Err(ValidationError::EmptyTitle.into());
        }
        if let Some(content) = &update.content
            && content.trim().is_empty()
        {
            return Err(ValidationError::EmptyContent.into());
        }

        let title = update.title.unwrap_or(current.title);
        let content = update.content.unwrap_or(current.content);
        let current_page = update.current_page.unwrap_or(current.current_page);
        let settings = update.settings.unwrap_or(current.settings);

        self.conn
            .execute(
                r#"
                UPDATE documents
                SET title = ?, content = ?, current_page = ?, font_size = ?,
                    theme = ?, animation = ?, font_family = ?,
                    last_accessed = unixepoch()
                WHERE id = ?
                "#,
                (
                    title.trim(),
                    content,
                    i64::from(current_page),
                    i64::from(settings.font_size_px),
                    settings.theme.as_str(),
                    settings.animation.as_str(),
                    settings.font_family.as_str(),
                    id.0,
                ),
            )
            .map_err(store_backend)?;
        Ok(())
    }

    fn delete_document(&mut self, owner: AccountId, id: DocumentId) -> Result<(), StoreError> {
        if self.get_document(owner, id)?.is_none() {
            return Ok(());
        }
        self.conn
            .execute("DELETE FROM documents WHERE id = ?", [id.0])
            .map_err(store_backend)?;
        Ok(())
    }
}

impl AuthGateway for Storage {
    fn sign_up(&mut self, email: &str, password: &str) -> Result<Account, AuthError> {
        validate_email(email)?;
        validate_password(password)?;
        let email = email.trim().to_ascii_lowercase();

        if self.account_by_email(&email)?.is_some() {
            return Err(AuthError::EmailInUse);
        }

        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|err| AuthError::Backend(err.to_string()))?
            .to_string();

        self.conn
            .execute(
                "INSERT INTO accounts (email, password_hash) VALUES (?, ?)",
                (&email, &hash),
            )
            .map_err(auth_backend)?;

        let account = Account {
            id: AccountId(self.conn.last_insert_rowid()),
            email,
        };
        self.signed_in = Some(account.clone());
        Ok(account)
    }

    fn sign_in(&mut self, email: &str, password: &str) -> Result<Account, AuthError> {
        let email = email.trim().to_ascii_lowercase();
        // Unknown email, provider-only account, and bad password all collapse
        // into the same answer; no account enumeration.
        let Some((account, Some(stored))) = self.account_by_email(&email)? else {
            return Err(AuthError::InvalidCredentials);
        };

        let parsed =
            PasswordHash::new(&stored).map_err(|err| AuthError::Backend(err.to_string()))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| AuthError::InvalidCredentials)?;

        self.signed_in = Some(account.clone());
        Ok(account)
    }

    /// Provider sign-in, terminal style: a passwordless device account keyed
    /// by the local username, created on first use.
    fn sign_in_with_provider(&mut self) -> Result<Account, AuthError> {
        let user = std::env::var("USER").unwrap_or_else(|_| "reader".to_string());
        let email = format!("{}@localhost", user.trim().to_ascii_lowercase());

        let account = match self.account_by_email(&email)? {
            Some((account, _)) => account,
            None => {
                self.conn
                    .execute(
                        "INSERT INTO accounts (email, password_hash) VALUES (?, NULL)",
                        [&email],
                    )
                    .map_err(auth_backend)?;
                Account {
                    id: AccountId(self.conn.last_insert_rowid()),
                    email,
                }
            }
        };
        self.signed_in = Some(account.clone());
        Ok(account)
    }

    fn sign_out(&mut self) {
        self.signed_in = None;
    }
}
