//! Local SQLite cache of the last known profile per user.
//!
//! Read only when the remote profile read fails, so a returning patient
//! keeps their demographics while the document store is unreachable.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{Demographics, Gender};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Cache directory error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Internal lock error")]
    LockPoisoned,
}

/// Profile fields kept locally.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedProfile {
    pub demographics: Option<Demographics>,
    pub session_count: u32,
    pub updated_at: DateTime<Utc>,
}

const MIGRATIONS: &[(i64, &str)] = &[(
    1,
    "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY);
     CREATE TABLE IF NOT EXISTS cached_profiles (
         uid TEXT PRIMARY KEY,
         age INTEGER,
         gender TEXT,
         session_count INTEGER NOT NULL DEFAULT 0,
         updated_at TEXT NOT NULL
     );
     INSERT OR IGNORE INTO schema_version (version) VALUES (1);",
)];

/// SQLite-backed profile cache. The connection is shared behind a mutex.
pub struct ProfileCache {
    conn: Mutex<Connection>,
}

impl ProfileCache {
    /// Open (or create) the cache file and run migrations.
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open an in-memory cache (for testing and for runs without a data dir).
    pub fn open_in_memory() -> Result<Self, CacheError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, CacheError> {
        conn.execute_batch("PRAGMA journal_mode=DELETE;")?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert or replace the cached profile for `uid`.
    pub fn save(&self, uid: &str, profile: &CachedProfile) -> Result<(), CacheError> {
        let conn = self.conn.lock().map_err(|_| CacheError::LockPoisoned)?;
        let (age, gender) = match profile.demographics {
            Some(d) => (Some(i64::from(d.age)), Some(d.gender.as_str())),
            None => (None, None),
        };
        conn.execute(
            "INSERT INTO cached_profiles (uid, age, gender, session_count, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(uid) DO UPDATE SET
                 age = excluded.age,
                 gender = excluded.gender,
                 session_count = excluded.session_count,
                 updated_at = excluded.updated_at",
            params![
                uid,
                age,
                gender,
                i64::from(profile.session_count),
                profile.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Load the cached profile for `uid`, if any.
    ///
    /// Rows with an unreadable gender or age keep their session count and
    /// drop the demographics.
    pub fn load(&self, uid: &str) -> Result<Option<CachedProfile>, CacheError> {
        let conn = self.conn.lock().map_err(|_| CacheError::LockPoisoned)?;
        let row = conn
            .query_row(
                "SELECT age, gender, session_count, updated_at
                 FROM cached_profiles WHERE uid = ?1",
                params![uid],
                |row| {
                    Ok((
                        row.get::<_, Option<i64>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        Ok(row.map(|(age, gender, session_count, updated_at)| {
            let demographics = match (
                age.and_then(|a| u8::try_from(a).ok()),
                gender.as_deref().and_then(|g| g.parse::<Gender>().ok()),
            ) {
                (Some(age), Some(gender)) => Some(Demographics { age, gender }),
                _ => None,
            };
            CachedProfile {
                demographics,
                session_count: u32::try_from(session_count).unwrap_or(0),
                updated_at: DateTime::parse_from_rfc3339(&updated_at)
                    .map(|t| t.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
            }
        }))
    }
}

/// Run all pending migrations
fn run_migrations(conn: &Connection) -> Result<(), CacheError> {
    let current_version = get_current_version(conn);

    for (version, sql) in MIGRATIONS {
        if *version > current_version {
            tracing::info!("Running profile cache migration v{version}");
            conn.execute_batch(sql)
                .map_err(|e| CacheError::MigrationFailed {
                    version: *version,
                    reason: e.to_string(),
                })?;
        }
    }

    Ok(())
}

/// Current schema version (0 if no schema exists yet)
fn get_current_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, i64>(0)
    })
    .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cached(age: u8, gender: Gender, sessions: u32) -> CachedProfile {
        CachedProfile {
            demographics: Some(Demographics { age, gender }),
            session_count: sessions,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn load_missing_returns_none() {
        let cache = ProfileCache::open_in_memory().unwrap();
        assert!(cache.load("nobody").unwrap().is_none());
    }

    #[test]
    fn save_then_load() {
        let cache = ProfileCache::open_in_memory().unwrap();
        cache.save("u1", &cached(52, Gender::Male, 4)).unwrap();

        let loaded = cache.load("u1").unwrap().unwrap();
        assert_eq!(loaded.demographics, Some(Demographics { age: 52, gender: Gender::Male }));
        assert_eq!(loaded.session_count, 4);
    }

    #[test]
    fn save_overwrites_existing_row() {
        let cache = ProfileCache::open_in_memory().unwrap();
        cache.save("u1", &cached(52, Gender::Male, 4)).unwrap();
        cache.save("u1", &cached(53, Gender::Male, 5)).unwrap();

        let loaded = cache.load("u1").unwrap().unwrap();
        assert_eq!(loaded.demographics.unwrap().age, 53);
        assert_eq!(loaded.session_count, 5);
    }

    #[test]
    fn profile_without_demographics_keeps_count() {
        let cache = ProfileCache::open_in_memory().unwrap();
        let profile = CachedProfile {
            demographics: None,
            session_count: 2,
            updated_at: Utc::now(),
        };
        cache.save("u1", &profile).unwrap();
        let loaded = cache.load("u1").unwrap().unwrap();
        assert!(loaded.demographics.is_none());
        assert_eq!(loaded.session_count, 2);
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("profile_cache.db");
        {
            let cache = ProfileCache::open(&path).unwrap();
            cache.save("u1", &cached(41, Gender::Female, 7)).unwrap();
        }
        let cache = ProfileCache::open(&path).unwrap();
        assert_eq!(cache.load("u1").unwrap().unwrap().session_count, 7);
    }

    #[test]
    fn migrations_idempotent() {
        let cache = ProfileCache::open_in_memory().unwrap();
        let conn = cache.conn.lock().unwrap();
        assert!(run_migrations(&conn).is_ok());
        assert_eq!(get_current_version(&conn), 1);
    }
}
