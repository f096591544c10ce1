//! facegate-store: the SQLite-backed user store.
//!
//! One row per user: a single face vector (re-registration overwrites it)
//! and the set of guilds the user has registered or verified in. The guild
//! set only grows.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::Utc;
use facegate_core::types::BlobError;
use facegate_core::{FaceMatcher, FaceVector};
use rusqlite::{params, OptionalExtension};
use thiserror::Error;
use tokio_rusqlite::Connection;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),
    #[error("could not create store directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt face vector for user {user_id}: {source}")]
    CorruptVector {
        user_id: String,
        #[source]
        source: BlobError,
    },
    #[error("corrupt guild list for user {user_id}: {source}")]
    CorruptGuilds {
        user_id: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A stored user.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub user_id: String,
    pub face_vector: FaceVector,
    pub guilds: BTreeSet<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Row as it sits in SQLite, before decoding.
struct RawRow {
    user_id: String,
    blob: Vec<u8>,
    model_version: Option<String>,
    guilds: String,
    created_at: String,
    updated_at: String,
}

const SELECT_COLUMNS: &str =
    "SELECT user_id, face_vector, model_version, guilds, created_at, updated_at FROM users";

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            user_id: row.get(0)?,
            blob: row.get(1)?,
            model_version: row.get(2)?,
            guilds: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn decode(self) -> Result<UserRecord> {
        let guilds = decode_guilds(&self.user_id, &self.guilds)?;
        self.decode_with_guilds(guilds)
    }

    fn decode_with_guilds(self, guilds: BTreeSet<String>) -> Result<UserRecord> {
        let mut face_vector = FaceVector::from_blob(&self.blob).map_err(|source| {
            StoreError::CorruptVector { user_id: self.user_id.clone(), source }
        })?;
        face_vector.model_version = self.model_version;
        Ok(UserRecord {
            user_id: self.user_id,
            face_vector,
            guilds,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn decode_guilds(user_id: &str, raw: &str) -> Result<BTreeSet<String>> {
    serde_json::from_str(raw)
        .map_err(|source| StoreError::CorruptGuilds { user_id: user_id.to_string(), source })
}

fn encode_guilds(guilds: &BTreeSet<String>) -> String {
    // A set of strings always serializes.
    serde_json::to_string(guilds).unwrap_or_else(|_| "[]".to_string())
}

/// SQLite-backed store of face vectors and guild memberships.
pub struct UserStore {
    conn: Connection,
}

impl UserStore {
    /// Open (or create) the store at `path`, creating parent directories.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).await?;
        let store = Self { conn };
        store.init_schema().await?;
        tracing::info!(path = %path.display(), "user store opened");
        Ok(store)
    }

    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        let store = Self { conn };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                conn.execute_batch(
                    "
                    CREATE TABLE IF NOT EXISTS users (
                        user_id TEXT PRIMARY KEY,
                        face_vector BLOB NOT NULL,
                        model_version TEXT,
                        guilds TEXT NOT NULL DEFAULT '[]',
                        created_at TEXT NOT NULL,
                        updated_at TEXT NOT NULL
                    );
                    ",
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn get(&self, user_id: &str) -> Result<Option<UserRecord>> {
        let user_id = user_id.to_string();
        let raw = self
            .conn
            .call(move |conn| {
                let row = conn
                    .query_row(
                        &format!("{SELECT_COLUMNS} WHERE user_id = ?1"),
                        params![user_id],
                        RawRow::from_row,
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;
        raw.map(RawRow::decode).transpose()
    }

    pub async fn face_vector(&self, user_id: &str) -> Result<Option<FaceVector>> {
        Ok(self.get(user_id).await?.map(|r| r.face_vector))
    }

    /// Store `vector` as the user's only face vector and add `guild_id` to
    /// their guilds. Replaces any earlier vector.
    pub async fn save_registration(
        &self,
        user_id: &str,
        vector: &FaceVector,
        guild_id: &str,
    ) -> Result<UserRecord> {
        let owned_user = user_id.to_string();
        let guild_id = guild_id.to_string();
        let blob = vector.to_blob();
        let model_version = vector.model_version.clone();
        let now = Utc::now().to_rfc3339();
        let updated_at = now.clone();

        let (guilds, created_at) = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let existing: Option<(String, String)> = tx
                    .query_row(
                        "SELECT guilds, created_at FROM users WHERE user_id = ?1",
                        params![owned_user],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?;

                let (mut guilds, created_at) = match existing {
                    Some((raw, created_at)) => {
                        let guilds: BTreeSet<String> = serde_json::from_str(&raw)
                            .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
                        (guilds, created_at)
                    }
                    None => (BTreeSet::new(), now.clone()),
                };
                guilds.insert(guild_id);

                tx.execute(
                    "INSERT INTO users (user_id, face_vector, model_version, guilds, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(user_id) DO UPDATE SET
                        face_vector = excluded.face_vector,
                        model_version = excluded.model_version,
                        guilds = excluded.guilds,
                        updated_at = excluded.updated_at",
                    params![owned_user, blob, model_version, encode_guilds(&guilds), created_at, now],
                )?;
                tx.commit()?;
                Ok((guilds, created_at))
            })
            .await?;

        tracing::info!(user_id, guilds = guilds.len(), "face vector stored");
        Ok(UserRecord {
            user_id: user_id.to_string(),
            face_vector: vector.clone(),
            guilds,
            created_at,
            updated_at,
        })
    }

    /// Add a guild to a registered user's set. Returns `true` if it was new;
    /// unknown users are left alone.
    pub async fn add_guild(&self, user_id: &str, guild_id: &str) -> Result<bool> {
        let owned_user = user_id.to_string();
        let guild_id = guild_id.to_string();
        let now = Utc::now().to_rfc3339();

        let added = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let existing: Option<String> = tx
                    .query_row(
                        "SELECT guilds FROM users WHERE user_id = ?1",
                        params![owned_user],
                        |row| row.get(0),
                    )
                    .optional()?;
                let Some(raw) = existing else {
                    return Ok(false);
                };

                let mut guilds: BTreeSet<String> = serde_json::from_str(&raw)
                    .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
                if !guilds.insert(guild_id) {
                    return Ok(false);
                }

                tx.execute(
                    "UPDATE users SET guilds = ?2, updated_at = ?3 WHERE user_id = ?1",
                    params![owned_user, encode_guilds(&guilds), now],
                )?;
                tx.commit()?;
                Ok(true)
            })
            .await?;

        if added {
            tracing::info!(user_id, "guild added to verified set");
        }
        Ok(added)
    }

    /// Guilds the user has registered or verified in; empty if unknown.
    pub async fn verified_guilds(&self, user_id: &str) -> Result<BTreeSet<String>> {
        Ok(self.get(user_id).await?.map(|r| r.guilds).unwrap_or_default())
    }

    /// Every user whose guild set contains `guild_id`.
    ///
    /// Rows outside the guild are never decoded past their guild list; a row
    /// whose guild list is unreadable is logged and skipped.
    pub async fn records_in_guild(&self, guild_id: &str) -> Result<Vec<UserRecord>> {
        let raw = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY user_id"))?;
                let rows = stmt
                    .query_map([], RawRow::from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        let mut records = Vec::new();
        for row in raw {
            let guilds = match decode_guilds(&row.user_id, &row.guilds) {
                Ok(guilds) => guilds,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping row with unreadable guild list");
                    continue;
                }
            };
            if guilds.contains(guild_id) {
                records.push(row.decode_with_guilds(guilds)?);
            }
        }
        Ok(records)
    }

    /// Other users in `guild_id` whose face matches `user_id`'s.
    ///
    /// `None` when `user_id` has no stored vector. Linear in the number of
    /// stored users.
    pub async fn find_alts(
        &self,
        user_id: &str,
        guild_id: &str,
        matcher: &FaceMatcher,
    ) -> Result<Option<Vec<String>>> {
        let Some(target) = self.face_vector(user_id).await? else {
            return Ok(None);
        };

        let alts: Vec<String> = self
            .records_in_guild(guild_id)
            .await?
            .into_iter()
            .filter(|r| r.user_id != user_id)
            .filter(|r| matcher.is_match(&r.face_vector, &target))
            .map(|r| r.user_id)
            .collect();

        tracing::info!(user_id, guild_id, alts = alts.len(), "alt check finished");
        Ok(Some(alts))
    }
}
