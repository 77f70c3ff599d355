use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use crate::backend::Subject;
use crate::cache::SubjectKey;
use crate::cascade::PersistedFilters;
use crate::db;

/// Durable per-workspace storage for the filter snapshot, the subject-list
/// cache, and the session credentials. Loads fail open: a missing or
/// unparseable row yields the empty default instead of an error, so a bad
/// snapshot can never keep the dashboard from mounting.
pub struct SessionStore {
    conn: Connection,
}

impl SessionStore {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            conn: db::open_db(workspace)?,
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        db::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn load_filters(&self) -> PersistedFilters {
        let payload: Option<String> = self
            .conn
            .query_row("SELECT payload FROM filter_state WHERE id = 1", [], |r| {
                r.get(0)
            })
            .optional()
            .unwrap_or_default();
        match payload {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "discarding unparseable filter snapshot");
                PersistedFilters::default()
            }),
            None => PersistedFilters::default(),
        }
    }

    pub fn save_filters(&self, filters: &PersistedFilters) -> anyhow::Result<()> {
        let payload = serde_json::to_string(filters)?;
        self.conn.execute(
            "INSERT INTO filter_state(id, payload, updated_at)
             VALUES(1, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
               payload = excluded.payload,
               updated_at = excluded.updated_at",
            (&payload, Utc::now().to_rfc3339()),
        )?;
        Ok(())
    }

    pub fn set_return_flag(&self, value: bool) -> anyhow::Result<()> {
        let mut filters = self.load_filters();
        filters.return_from_detail = value;
        self.save_filters(&filters)
    }

    pub fn load_subject_cache(&self) -> Vec<(SubjectKey, Vec<Subject>)> {
        let mut out = Vec::new();
        let Ok(mut stmt) = self
            .conn
            .prepare("SELECT cache_key, payload FROM subject_cache")
        else {
            return out;
        };
        let rows = stmt
            .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
            .unwrap_or_default();
        for (raw_key, raw_payload) in rows {
            let key = serde_json::from_str::<SubjectKey>(&raw_key);
            let subjects = serde_json::from_str::<Vec<Subject>>(&raw_payload);
            match (key, subjects) {
                (Ok(key), Ok(subjects)) => out.push((key, subjects)),
                _ => tracing::warn!("discarding unparseable subject cache row"),
            }
        }
        out
    }

    pub fn save_subject_entry(&self, key: &SubjectKey, subjects: &[Subject]) -> anyhow::Result<()> {
        let raw_key = serde_json::to_string(key)?;
        let payload = serde_json::to_string(subjects)?;
        self.conn.execute(
            "INSERT INTO subject_cache(cache_key, payload, updated_at)
             VALUES(?, ?, ?)
             ON CONFLICT(cache_key) DO UPDATE SET
               payload = excluded.payload,
               updated_at = excluded.updated_at",
            (&raw_key, &payload, Utc::now().to_rfc3339()),
        )?;
        Ok(())
    }

    pub fn clear_subject_cache(&self) -> anyhow::Result<()> {
        self.conn.execute("DELETE FROM subject_cache", [])?;
        Ok(())
    }

    fn session_field(&self, column: &str) -> Option<String> {
        let sql = format!("SELECT {} FROM session WHERE id = 1", column);
        self.conn
            .query_row(&sql, [], |r| r.get::<_, Option<String>>(0))
            .optional()
            .unwrap_or_default()
            .flatten()
    }

    fn set_session_field(&self, column: &str, value: &str) -> anyhow::Result<()> {
        self.conn
            .execute("INSERT OR IGNORE INTO session(id) VALUES(1)", [])?;
        let sql = format!(
            "UPDATE session SET {} = ?, updated_at = ? WHERE id = 1",
            column
        );
        self.conn
            .execute(&sql, (value, Utc::now().to_rfc3339()))?;
        Ok(())
    }

    pub fn token(&self) -> Option<String> {
        self.session_field("token")
    }

    pub fn set_token(&self, value: &str) -> anyhow::Result<()> {
        self.set_session_field("token", value)
    }

    pub fn teacher_id(&self) -> Option<String> {
        self.session_field("teacher_id")
    }

    pub fn set_teacher_id(&self, value: &str) -> anyhow::Result<()> {
        self.set_session_field("teacher_id", value)
    }

    pub fn backend_url(&self) -> Option<String> {
        self.session_field("backend_url")
    }

    pub fn set_backend_url(&self, value: &str) -> anyhow::Result<()> {
        self.set_session_field("backend_url", value)
    }

    pub fn session_id(&self) -> Option<String> {
        self.session_field("session_id")
    }

    pub fn set_session_id(&self, value: &str) -> anyhow::Result<()> {
        self.set_session_field("session_id", value)
    }
}
