use std::fmt;
use std::rc::Rc;

use crate::error::SyncError;
use crate::store::repo::CursorStore;

/// A (user, folder) pair bound to the store holding its sync cursor.
#[derive(Clone)]
pub struct FolderContext {
    folder: String,
    user: String,
    cursor_store: Rc<dyn CursorStore>,
}

impl FolderContext {
    pub fn new(
        user: impl Into<String>,
        folder: impl Into<String>,
        cursor_store: Rc<dyn CursorStore>,
    ) -> Self {
        Self {
            folder: folder.into(),
            user: user.into(),
            cursor_store,
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    /// Folder name as the server expects it. IMAP treats the inbox name
    /// case-insensitively, every other name is passed through.
    pub fn remote_folder(&self) -> &str {
        if self.folder.eq_ignore_ascii_case("INBOX") {
            "INBOX"
        } else {
            &self.folder
        }
    }

    /// Stored cursor, or `""` when this folder was never synced.
    pub fn cursor(&self) -> Result<String, SyncError> {
        self.cursor_store
            .get_last_sync_state(&self.user, &self.folder)
            .map(Option::unwrap_or_default)
            .map_err(|source| self.store_error(source))
    }

    pub fn set_cursor(&self, token: &str) -> Result<(), SyncError> {
        self.cursor_store
            .set_sync_state(&self.user, &self.folder, token)
            .map_err(|source| self.store_error(source))
    }

    fn store_error(&self, source: anyhow::Error) -> SyncError {
        SyncError::CursorStore {
            user: self.user.clone(),
            folder: self.folder.clone(),
            source,
        }
    }
}

impl fmt::Debug for FolderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FolderContext")
            .field("folder", &self.folder)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}
