pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod harvest;
pub mod mail;
pub mod output;
pub mod store;
pub mod sync;

#[cfg(test)]
mod testing;

pub use domain::record::MailRecord;
pub use error::{ErrorKind, ServiceError, SyncError};
pub use harvest::{Mail, MailStore};
