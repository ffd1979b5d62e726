use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::store::repo::CursorStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCursor {
    pub user: String,
    pub folder: String,
    pub token: String,
    pub updated_epoch: i64,
}

pub struct SqliteCursorStore {
    conn: Connection,
}

impl SqliteCursorStore {
    pub fn open(path: &std::path::Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS sync_state (
                user           TEXT NOT NULL,
                folder         TEXT NOT NULL,
                token          TEXT NOT NULL,
                updated_epoch  INTEGER NOT NULL,
                PRIMARY KEY (user, folder)
            );
            "#,
        )?;
        Ok(())
    }

    /// All stored cursors, optionally restricted to one user.
    pub fn list(&self, user: Option<&str>) -> Result<Vec<StoredCursor>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT user, folder, token, updated_epoch
            FROM sync_state
            WHERE ?1 IS NULL OR user = ?1
            ORDER BY user, folder
            "#,
        )?;

        let mut rows = stmt.query(params![user])?;
        let mut out = Vec::new();
        while let Some(r) = rows.next()? {
            out.push(StoredCursor {
                user: r.get(0)?,
                folder: r.get(1)?,
                token: r.get(2)?,
                updated_epoch: r.get(3)?,
            });
        }
        Ok(out)
    }

    /// Forget every cursor of `user`; their next harvest starts from scratch.
    pub fn clear_user(&self, user: &str) -> Result<usize> {
        let n = self
            .conn
            .execute(r#"DELETE FROM sync_state WHERE user=?1"#, params![user])?;
        Ok(n)
    }
}

impl CursorStore for SqliteCursorStore {
    fn get_last_sync_state(&self, user: &str, folder: &str) -> Result<Option<String>> {
        let token = self
            .conn
            .query_row(
                r#"SELECT token FROM sync_state WHERE user=?1 AND folder=?2"#,
                params![user, folder],
                |r| r.get(0),
            )
            .optional()?;
        Ok(token)
    }

    fn set_sync_state(&self, user: &str, folder: &str, token: &str) -> Result<()> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64;
        self.conn.execute(
            r#"
            INSERT INTO sync_state (user, folder, token, updated_epoch)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user, folder) DO UPDATE SET
              token=excluded.token,
              updated_epoch=excluded.updated_epoch
            "#,
            params![user, folder, token, now],
        )?;
        Ok(())
    }
}
