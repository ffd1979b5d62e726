use crate::domain::record::MailRecord;
use crate::error::ServiceError;
use crate::sync::context::FolderContext;

/// One page of item identifiers returned by a folder sync call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPage {
    pub identifiers: Vec<String>,
    pub is_final_page: bool,
    pub next_cursor: String,
}

/// The remote operations a harvest needs from a groupware server.
///
/// Every call blocks until the server answers.
pub trait MailService {
    /// Folders of `user` that should be harvested.
    fn discover_folders(&self, user: &str) -> Result<Vec<String>, ServiceError>;

    /// Up to `page_size` item identifiers changed since `cursor`.
    ///
    /// An empty cursor asks for a full sync from scratch.
    fn sync_folder(
        &self,
        folder: &FolderContext,
        cursor: &str,
        page_size: usize,
    ) -> Result<SyncPage, ServiceError>;

    /// Full content for a batch of identifiers, in one remote call.
    fn resolve_items(
        &self,
        folder: &FolderContext,
        ids: &[String],
    ) -> Result<Vec<MailRecord>, ServiceError>;
}
