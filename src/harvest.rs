use std::rc::Rc;

use crate::config::HarvestConfig;
use crate::domain::record::MailRecord;
use crate::error::SyncError;
use crate::mail::service::MailService;
use crate::store::repo::CursorStore;
use crate::sync::chain::Chain;
use crate::sync::guard::{FailureLog, UserFailure};
use crate::sync::users::{UserIterator, UserProducer};

/// Entry point: harvests mail of many users from one mail service.
pub struct MailStore {
    service: Rc<dyn MailService>,
    config: HarvestConfig,
}

impl MailStore {
    pub fn new(service: Rc<dyn MailService>, config: HarvestConfig) -> Self {
        Self { service, config }
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Lazy sequence of every new record of `users`, checkpointed in
    /// `cursor_store`. Nothing is fetched until the sequence is pulled, and
    /// every call starts an independent pass.
    pub fn get_mail<I>(&self, users: I, cursor_store: Rc<dyn CursorStore>) -> Mail<I::IntoIter>
    where
        I: IntoIterator<Item = String>,
    {
        let failures = FailureLog::default();
        let producer = UserProducer::new(
            self.service.clone(),
            self.config.with_cursor_store(cursor_store),
            users.into_iter(),
            failures.clone(),
        );
        Mail {
            inner: Chain::new(producer),
            failures,
        }
    }
}

/// Records of one harvest pass.
///
/// Yields `Err` only for failures that end the whole pass (rejected
/// credentials, unusable cursor store); nothing follows such an error.
pub struct Mail<U: Iterator<Item = String>> {
    inner: UserIterator<U>,
    failures: FailureLog,
}

impl<U: Iterator<Item = String>> Mail<U> {
    /// Users skipped so far, with the reason.
    pub fn failures(&self) -> Vec<UserFailure> {
        self.failures.borrow().clone()
    }

    pub fn has_next(&mut self) -> bool {
        self.inner.has_next()
    }
}

impl<U: Iterator<Item = String>> Iterator for Mail<U> {
    type Item = Result<MailRecord, SyncError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}
