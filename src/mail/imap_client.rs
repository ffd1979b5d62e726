use anyhow::anyhow;
use log::{debug, warn};
use native_tls::TlsConnector;
use std::collections::HashMap;

use crate::domain::record::MailRecord;
use crate::error::ServiceError;
use crate::mail::decoders::record_from_header_block;
use crate::mail::service::{MailService, SyncPage};
use crate::sync::context::FolderContext;

type Session = imap::Session<native_tls::TlsStream<std::net::TcpStream>>;

/// SASL PLAIN payload: authorize as `user`, authenticate as `admin`.
fn build_plain_bytes(user: &str, admin: &str, password: &str) -> Vec<u8> {
    format!("{user}\x00{admin}\x00{password}").into_bytes()
}

struct PlainAuthenticator {
    response: Vec<u8>,
}

impl imap::Authenticator for PlainAuthenticator {
    type Response = Vec<u8>;
    fn process(&self, _challenge: &[u8]) -> Self::Response {
        self.response.clone()
    }
}

fn map_imap_error(e: imap::Error) -> ServiceError {
    match e {
        imap::Error::Io(e) => ServiceError::Transport {
            status: None,
            message: e.to_string(),
        },
        imap::Error::Tls(e) => ServiceError::Transport {
            status: None,
            message: e.to_string(),
        },
        imap::Error::TlsHandshake(e) => ServiceError::Transport {
            status: None,
            message: e.to_string(),
        },
        imap::Error::ConnectionLost => ServiceError::Transport {
            status: None,
            message: "connection lost".to_string(),
        },
        imap::Error::No(message) => ServiceError::Protocol {
            code: "NO".to_string(),
            message,
        },
        imap::Error::Bad(message) => ServiceError::Protocol {
            code: "BAD".to_string(),
            message,
        },
        other => ServiceError::Other(anyhow!("{other}")),
    }
}

/// Sync cursor: `"<uidvalidity>:<last uid handed out>"`.
pub fn parse_cursor(cursor: &str) -> Option<(u32, u32)> {
    let (validity, last) = cursor.split_once(':')?;
    Some((validity.parse().ok()?, last.parse().ok()?))
}

pub fn format_cursor(uid_validity: u32, last_uid: u32) -> String {
    format!("{uid_validity}:{last_uid}")
}

/// Next page of uids above `last_uid`, ascending, and whether it is the last one.
pub fn page_above(mut uids: Vec<u32>, last_uid: u32, page_size: usize) -> (Vec<u32>, bool) {
    // "n:*" always matches the highest uid, even when it is below n
    uids.retain(|&u| u > last_uid);
    uids.sort_unstable();
    uids.dedup();
    let is_final = uids.len() <= page_size;
    uids.truncate(page_size);
    (uids, is_final)
}

/// Harvests mailboxes of many users through one admin account, using
/// proxy authentication (the admin logs in on behalf of each user).
pub struct ImapService {
    pub server: String,
    pub port: u16,
    pub admin_user: String,
    admin_password: String,
    folders_exclude: Vec<String>,
}

impl ImapService {
    pub fn new(
        server: impl Into<String>,
        port: u16,
        admin_user: impl Into<String>,
        admin_password: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            port,
            admin_user: admin_user.into(),
            admin_password: admin_password.into(),
            folders_exclude: Vec::new(),
        }
    }

    pub fn with_excluded_folders(mut self, folders: Vec<String>) -> Self {
        self.folders_exclude = folders;
        self
    }

    fn is_excluded(&self, folder: &str) -> bool {
        self.folders_exclude
            .iter()
            .any(|f| f.eq_ignore_ascii_case(folder))
    }

    fn connect_as(&self, user: &str) -> Result<Session, ServiceError> {
        let tls = TlsConnector::builder()
            .build()
            .map_err(|e| ServiceError::Transport {
                status: None,
                message: e.to_string(),
            })?;
        let client = imap::connect(
            (self.server.as_str(), self.port),
            self.server.as_str(),
            &tls,
        )
        .map_err(map_imap_error)?;

        let auth = PlainAuthenticator {
            response: build_plain_bytes(user, &self.admin_user, &self.admin_password),
        };
        client
            .authenticate("PLAIN", &auth)
            .map_err(|(e, _)| map_login_error(e, &self.admin_user, user))
    }
}

/// `[CODE]` at the start of a tagged response text (RFC 5530).
fn response_code(text: &str) -> Option<&str> {
    let rest = text.trim_start().strip_prefix('[')?;
    let end = rest.find(|c: char| c == ']' || c.is_whitespace())?;
    Some(&rest[..end])
}

/// A rejected proxy login only ends the run when the admin's own
/// credentials are at fault; a user the admin may not act for is that
/// user's problem.
fn map_login_error(e: imap::Error, admin: &str, user: &str) -> ServiceError {
    let (status, text) = match e {
        imap::Error::No(text) => ("NO", text),
        imap::Error::Bad(text) => ("BAD", text),
        other => return map_imap_error(other),
    };
    let code = response_code(&text).map(str::to_ascii_uppercase);
    if code.as_deref() == Some("AUTHENTICATIONFAILED") || user.eq_ignore_ascii_case(admin) {
        return ServiceError::Authentication(format!("{admin} as {user}: {text}"));
    }
    ServiceError::Protocol {
        code: code.unwrap_or_else(|| status.to_string()),
        message: format!("login of {admin} as {user} refused: {text}"),
    }
}

/// Header fields of one message, preceded by where it was harvested from.
fn attributed_record(folder: &FolderContext, uid: u32, header: &[u8]) -> MailRecord {
    let headers = match record_from_header_block(header) {
        Ok(rec) => rec,
        Err(e) => {
            warn!(
                "{}/{}: unparsable header of uid {uid}: {e}",
                folder.user(),
                folder.folder()
            );
            MailRecord::default()
        }
    };
    let uid = uid.to_string();
    [
        ("X-Harvest-User", folder.user()),
        ("X-Harvest-Folder", folder.folder()),
        ("X-Harvest-Uid", uid.as_str()),
    ]
    .into_iter()
    .chain(headers.iter())
    .collect()
}

impl MailService for ImapService {
    fn discover_folders(&self, user: &str) -> Result<Vec<String>, ServiceError> {
        let mut session = self.connect_as(user)?;
        let names = session
            .list(Some(""), Some("*"))
            .map_err(map_imap_error)?;

        let folders = names
            .iter()
            .filter(|n| {
                !n.attributes()
                    .iter()
                    .any(|a| matches!(a, imap::types::NameAttribute::NoSelect))
            })
            .map(|n| n.name().to_string())
            .filter(|n| !self.is_excluded(n))
            .collect();

        session.logout().map_err(map_imap_error)?;
        Ok(folders)
    }

    fn sync_folder(
        &self,
        folder: &FolderContext,
        cursor: &str,
        page_size: usize,
    ) -> Result<SyncPage, ServiceError> {
        let mut session = self.connect_as(folder.user())?;
        let mailbox = session
            .examine(folder.remote_folder())
            .map_err(map_imap_error)?;
        let validity = mailbox.uid_validity.unwrap_or(0);

        // a reset mailbox invalidates every uid we know of: start over
        let last_uid = match parse_cursor(cursor) {
            Some((v, last)) if v == validity => last,
            Some(_) => {
                debug!(
                    "{}/{}: uidvalidity changed, full resync",
                    folder.user(),
                    folder.folder()
                );
                0
            }
            None => 0,
        };

        let query = format!("UID {}:*", last_uid.saturating_add(1));
        let found = session.uid_search(&query).map_err(map_imap_error)?;
        session.logout().map_err(map_imap_error)?;

        let (uids, is_final_page) = page_above(found.into_iter().collect(), last_uid, page_size);
        let next_last = uids.last().copied().unwrap_or(last_uid);

        Ok(SyncPage {
            identifiers: uids.iter().map(u32::to_string).collect(),
            is_final_page,
            next_cursor: format_cursor(validity, next_last),
        })
    }

    fn resolve_items(
        &self,
        folder: &FolderContext,
        ids: &[String],
    ) -> Result<Vec<MailRecord>, ServiceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut session = self.connect_as(folder.user())?;
        session
            .examine(folder.remote_folder())
            .map_err(map_imap_error)?;

        let fetches = session
            .uid_fetch(ids.join(","), "(UID BODY.PEEK[HEADER])")
            .map_err(map_imap_error)?;

        let mut by_uid: HashMap<String, MailRecord> = HashMap::new();
        for f in fetches.iter() {
            let (Some(uid), Some(header)) = (f.uid, f.header()) else {
                continue;
            };
            by_uid.insert(uid.to_string(), attributed_record(folder, uid, header));
        }
        session.logout().map_err(map_imap_error)?;

        // messages expunged since the id page was taken are simply missing
        Ok(ids.iter().filter_map(|id| by_uid.remove(id)).collect())
    }
}
