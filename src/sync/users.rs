use log::{debug, info};
use std::rc::Rc;

use crate::config::HarvestConfig;
use crate::domain::record::MailRecord;
use crate::error::SyncError;
use crate::mail::service::MailService;
use crate::sync::chain::{Chain, Produce};
use crate::sync::context::FolderContext;
use crate::sync::folder::{FolderSync, folder_sync};
use crate::sync::guard::{FailureLog, Guarded, record_failure};

/// The discovered folders of one user, synced one after the other.
pub struct UserFolders {
    service: Rc<dyn MailService>,
    config: HarvestConfig,
    user: String,
    folders: std::vec::IntoIter<String>,
}

impl Produce for UserFolders {
    type Item = MailRecord;
    type Error = SyncError;
    type Seq = FolderSync;

    fn produce_next(&mut self) -> Result<Option<FolderSync>, SyncError> {
        let Some(folder) = self.folders.next() else {
            return Ok(None);
        };
        let ctx = FolderContext::new(
            self.user.as_str(),
            folder,
            self.config.cursor_store().clone(),
        );
        Ok(Some(folder_sync(
            self.service.clone(),
            ctx,
            self.config.id_page_size(),
            self.config.item_page_size(),
        )))
    }
}

pub type UserMail = Guarded<Chain<UserFolders>>;

/// Walks the user list; each user becomes one guarded sub-sequence.
pub struct UserProducer<U> {
    service: Rc<dyn MailService>,
    config: HarvestConfig,
    users: U,
    failures: FailureLog,
}

impl<U> UserProducer<U> {
    pub fn new(
        service: Rc<dyn MailService>,
        config: HarvestConfig,
        users: U,
        failures: FailureLog,
    ) -> Self {
        Self {
            service,
            config,
            users,
            failures,
        }
    }
}

impl<U: Iterator<Item = String>> Produce for UserProducer<U> {
    type Item = MailRecord;
    type Error = SyncError;
    type Seq = UserMail;

    fn produce_next(&mut self) -> Result<Option<UserMail>, SyncError> {
        for user in self.users.by_ref() {
            let folders = match self.service.discover_folders(&user) {
                Ok(folders) => folders,
                Err(source) => {
                    let err = SyncError::Discovery {
                        user: user.clone(),
                        source,
                    };
                    if !err.is_isolated() {
                        return Err(err);
                    }
                    record_failure(&self.failures, &user, &err);
                    continue;
                }
            };

            info!("harvesting {} folder(s) of {}", folders.len(), user);
            debug!("folders of {user}: {folders:?}");
            let chain = Chain::new(UserFolders {
                service: self.service.clone(),
                config: self.config.clone(),
                user: user.clone(),
                folders: folders.into_iter(),
            });
            return Ok(Some(Guarded::new(user, chain, self.failures.clone())));
        }
        Ok(None)
    }
}

/// Every user's records, one user after the other; a failing user is
/// skipped instead of ending the harvest.
pub type UserIterator<U> = Chain<UserProducer<U>>;
