use log::debug;
use std::rc::Rc;

use crate::domain::record::MailRecord;
use crate::error::SyncError;
use crate::mail::service::MailService;
use crate::sync::chain::{Chain, Produce};
use crate::sync::context::FolderContext;

pub type Resolved =
    std::iter::Map<std::vec::IntoIter<MailRecord>, fn(MailRecord) -> Result<MailRecord, SyncError>>;

/// Cuts known item ids into batches and resolves one batch per remote call.
pub struct ItemBatches {
    service: Rc<dyn MailService>,
    folder: FolderContext,
    ids: std::vec::IntoIter<String>,
    batch_size: usize,
}

impl Produce for ItemBatches {
    type Item = MailRecord;
    type Error = SyncError;
    type Seq = Resolved;

    fn produce_next(&mut self) -> Result<Option<Resolved>, SyncError> {
        let batch: Vec<String> = self.ids.by_ref().take(self.batch_size).collect();
        if batch.is_empty() {
            return Ok(None);
        }

        debug!(
            "resolving {} items of {}/{}",
            batch.len(),
            self.folder.user(),
            self.folder.folder()
        );
        let records = self
            .service
            .resolve_items(&self.folder, &batch)
            .map_err(|source| SyncError::Items {
                user: self.folder.user().to_string(),
                folder: self.folder.folder().to_string(),
                source,
            })?;

        Ok(Some(records.into_iter().map(Ok as fn(_) -> _)))
    }
}

/// Resolved records for a list of item ids, fetched `batch_size` at a time.
pub type ItemContent = Chain<ItemBatches>;

pub fn item_content(
    service: Rc<dyn MailService>,
    folder: FolderContext,
    ids: Vec<String>,
    batch_size: usize,
) -> ItemContent {
    Chain::new(ItemBatches {
        service,
        folder,
        ids: ids.into_iter(),
        batch_size: batch_size.max(1),
    })
}
