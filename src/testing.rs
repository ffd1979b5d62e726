//! Scripted stand-ins for the remote service and cursor store.

use anyhow::{Result, bail};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::domain::record::MailRecord;
use crate::error::{ErrorKind, ServiceError};
use crate::mail::service::{MailService, SyncPage};
use crate::store::repo::CursorStore;
use crate::sync::context::FolderContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Discover {
        user: String,
    },
    Sync {
        user: String,
        folder: String,
        cursor: String,
        page_size: usize,
    },
    Resolve {
        user: String,
        folder: String,
        ids: Vec<String>,
    },
}

pub fn page(ids: &[&str], is_final_page: bool, next_cursor: &str) -> SyncPage {
    SyncPage {
        identifiers: ids.iter().map(|s| s.to_string()).collect(),
        is_final_page,
        next_cursor: next_cursor.to_string(),
    }
}

pub fn subjects(records: &[MailRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.get("Subject").unwrap_or_default().to_string())
        .collect()
}

fn service_error(kind: ErrorKind, what: &str) -> ServiceError {
    match kind {
        ErrorKind::Authentication => ServiceError::Authentication(what.to_string()),
        ErrorKind::Protocol => ServiceError::Protocol {
            code: "ErrorServerBusy".to_string(),
            message: what.to_string(),
        },
        ErrorKind::Transport => ServiceError::Transport {
            status: Some(503),
            message: what.to_string(),
        },
        ErrorKind::CursorStore | ErrorKind::Other => ServiceError::Other(anyhow::anyhow!("{what}")),
    }
}

/// Serves scripted folders and pages; every resolved item becomes a record
/// whose `Subject` is its id.
#[derive(Default)]
pub struct FakeService {
    folders: HashMap<String, Vec<String>>,
    discovery_failures: HashMap<String, ErrorKind>,
    pages: HashMap<(String, String, String), SyncPage>,
    bad_items: HashSet<String>,
    calls: RefCell<Vec<Call>>,
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn folders(mut self, user: &str, folders: &[&str]) -> Self {
        self.folders.insert(
            user.to_string(),
            folders.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn page(mut self, user: &str, folder: &str, cursor: &str, page: SyncPage) -> Self {
        self.pages
            .insert((user.to_string(), folder.to_string(), cursor.to_string()), page);
        self
    }

    pub fn fail_discovery(mut self, user: &str, kind: ErrorKind) -> Self {
        self.discovery_failures.insert(user.to_string(), kind);
        self
    }

    pub fn fail_resolve_of(mut self, id: &str) -> Self {
        self.bad_items.insert(id.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn sync_calls(&self) -> Vec<(String, String, usize)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Call::Sync {
                    folder,
                    cursor,
                    page_size,
                    ..
                } => Some((folder.clone(), cursor.clone(), *page_size)),
                _ => None,
            })
            .collect()
    }

    pub fn resolve_calls(&self) -> Vec<Vec<String>> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Call::Resolve { ids, .. } => Some(ids.clone()),
                _ => None,
            })
            .collect()
    }
}

impl MailService for FakeService {
    fn discover_folders(&self, user: &str) -> Result<Vec<String>, ServiceError> {
        self.calls.borrow_mut().push(Call::Discover {
            user: user.to_string(),
        });
        if let Some(kind) = self.discovery_failures.get(user) {
            return Err(service_error(*kind, "folder discovery refused"));
        }
        Ok(self.folders.get(user).cloned().unwrap_or_default())
    }

    fn sync_folder(
        &self,
        folder: &FolderContext,
        cursor: &str,
        page_size: usize,
    ) -> Result<SyncPage, ServiceError> {
        self.calls.borrow_mut().push(Call::Sync {
            user: folder.user().to_string(),
            folder: folder.remote_folder().to_string(),
            cursor: cursor.to_string(),
            page_size,
        });
        let key = (
            folder.user().to_string(),
            folder.folder().to_string(),
            cursor.to_string(),
        );
        self.pages.get(&key).cloned().ok_or_else(|| ServiceError::Protocol {
            code: "ErrorInvalidSyncStateData".to_string(),
            message: format!("unknown sync state {cursor:?}"),
        })
    }

    fn resolve_items(
        &self,
        folder: &FolderContext,
        ids: &[String],
    ) -> Result<Vec<MailRecord>, ServiceError> {
        self.calls.borrow_mut().push(Call::Resolve {
            user: folder.user().to_string(),
            folder: folder.folder().to_string(),
            ids: ids.to_vec(),
        });
        if ids.iter().any(|id| self.bad_items.contains(id)) {
            return Err(service_error(ErrorKind::Transport, "item fetch failed"));
        }
        Ok(ids
            .iter()
            .map(|id| {
                [
                    ("Subject", id.as_str()),
                    ("X-User", folder.user()),
                    ("X-Folder", folder.folder()),
                ]
                .into_iter()
                .collect()
            })
            .collect())
    }
}

/// Cursor store whose backend is gone.
pub struct FailingCursorStore;

impl CursorStore for FailingCursorStore {
    fn get_last_sync_state(&self, _user: &str, _folder: &str) -> Result<Option<String>> {
        bail!("cursor database is locked")
    }

    fn set_sync_state(&self, _user: &str, _folder: &str, _token: &str) -> Result<()> {
        bail!("cursor database is locked")
    }
}
