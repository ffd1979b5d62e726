use log::{debug, info};
use std::rc::Rc;

use crate::domain::record::MailRecord;
use crate::error::SyncError;
use crate::mail::service::MailService;
use crate::sync::chain::{Chain, Produce};
use crate::sync::context::FolderContext;
use crate::sync::items::{ItemContent, item_content};

#[derive(Debug, Clone, PartialEq, Eq)]
enum SyncState {
    /// Cursor not loaded yet.
    Start,
    /// `cursor` is the last committed token. `pending` is the token of the
    /// page handed out last, committed once that page has been drained.
    Paging {
        cursor: String,
        pending: Option<Pending>,
    },
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Pending {
    next_cursor: String,
    is_final_page: bool,
}

/// Drives the incremental sync of one folder, page after page.
pub struct FolderPages {
    service: Rc<dyn MailService>,
    folder: FolderContext,
    id_page_size: usize,
    item_page_size: usize,
    state: SyncState,
    pages: usize,
}

impl FolderPages {
    fn sync_error(&self, source: crate::error::ServiceError) -> SyncError {
        SyncError::Folder {
            user: self.folder.user().to_string(),
            folder: self.folder.folder().to_string(),
            source,
        }
    }
}

impl Produce for FolderPages {
    type Item = MailRecord;
    type Error = SyncError;
    type Seq = ItemContent;

    fn produce_next(&mut self) -> Result<Option<ItemContent>, SyncError> {
        loop {
            let cursor = match &mut self.state {
                SyncState::Done => return Ok(None),
                SyncState::Start => {
                    let cursor = self.folder.cursor()?;
                    debug!(
                        "starting sync of {}/{} from cursor {:?}",
                        self.folder.user(),
                        self.folder.folder(),
                        cursor
                    );
                    self.state = SyncState::Paging {
                        cursor,
                        pending: None,
                    };
                    continue;
                }
                SyncState::Paging { cursor, pending } => {
                    // the previous page is fully handed off: commit it before asking for more
                    if let Some(p) = pending.take() {
                        self.folder.set_cursor(&p.next_cursor)?;
                        *cursor = p.next_cursor;
                        if p.is_final_page {
                            info!(
                                "synced {}/{} in {} page(s)",
                                self.folder.user(),
                                self.folder.folder(),
                                self.pages
                            );
                            self.state = SyncState::Done;
                            return Ok(None);
                        }
                    }
                    cursor.clone()
                }
            };

            let page = self
                .service
                .sync_folder(&self.folder, &cursor, self.id_page_size)
                .map_err(|e| self.sync_error(e))?;
            self.pages += 1;
            debug!(
                "{}/{}: page {} with {} id(s), final={}",
                self.folder.user(),
                self.folder.folder(),
                self.pages,
                page.identifiers.len(),
                page.is_final_page
            );

            self.state = SyncState::Paging {
                cursor,
                pending: Some(Pending {
                    next_cursor: page.next_cursor,
                    is_final_page: page.is_final_page,
                }),
            };

            if !page.identifiers.is_empty() {
                return Ok(Some(item_content(
                    self.service.clone(),
                    self.folder.clone(),
                    page.identifiers,
                    self.item_page_size,
                )));
            }
            // empty page: nothing to drain, commit right away
        }
    }
}

/// Records of one folder, synced incrementally from its stored cursor.
pub type FolderSync = Chain<FolderPages>;

pub fn folder_sync(
    service: Rc<dyn MailService>,
    folder: FolderContext,
    id_page_size: usize,
    item_page_size: usize,
) -> FolderSync {
    Chain::new(FolderPages {
        service,
        folder,
        id_page_size: id_page_size.max(1),
        item_page_size: item_page_size.max(1),
        state: SyncState::Start,
        pages: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::repo::{CursorStore, MemoryCursorStore};
    use crate::testing::{Call, FakeService, FailingCursorStore, page, subjects};

    fn stored(store: &MemoryCursorStore) -> Option<String> {
        store.get_last_sync_state("alice", "INBOX").unwrap()
    }

    fn two_page_service() -> FakeService {
        FakeService::new()
            .page("alice", "INBOX", "", page(&["i1", "i2", "i3"], false, "tokA"))
            .page("alice", "INBOX", "tokA", page(&["i4"], true, "tokB"))
    }

    #[test]
    fn two_pages_end_with_final_cursor() {
        let store = Rc::new(MemoryCursorStore::new());
        let service = Rc::new(two_page_service());
        let sync = folder_sync(
            service.clone(),
            FolderContext::new("alice", "INBOX", store.clone()),
            3,
            2,
        );

        let records: Vec<_> = sync.collect::<Result<_, _>>().unwrap();
        assert_eq!(subjects(&records), ["i1", "i2", "i3", "i4"]);
        assert_eq!(stored(&store).as_deref(), Some("tokB"));
        assert_eq!(
            service.sync_calls(),
            [
                ("INBOX".to_string(), "".to_string(), 3),
                ("INBOX".to_string(), "tokA".to_string(), 3)
            ]
        );
    }

    #[test]
    fn cursor_is_committed_only_after_page_is_drained() {
        let store = Rc::new(MemoryCursorStore::new());
        let mut sync = folder_sync(
            Rc::new(two_page_service()),
            FolderContext::new("alice", "INBOX", store.clone()),
            3,
            2,
        );

        assert_eq!(sync.next().unwrap().unwrap().get("Subject"), Some("i1"));
        assert_eq!(stored(&store), None);
        sync.next().unwrap().unwrap();
        sync.next().unwrap().unwrap();
        // all of page A handed out, but nothing asked for beyond it yet
        assert_eq!(stored(&store), None);

        assert_eq!(sync.next().unwrap().unwrap().get("Subject"), Some("i4"));
        assert_eq!(stored(&store).as_deref(), Some("tokA"));

        assert!(sync.next().is_none());
        assert_eq!(stored(&store).as_deref(), Some("tokB"));
        assert!(sync.next().is_none());
    }

    #[test]
    fn has_next_past_a_page_commits_it() {
        let store = Rc::new(MemoryCursorStore::new());
        let mut sync = folder_sync(
            Rc::new(two_page_service()),
            FolderContext::new("alice", "INBOX", store.clone()),
            3,
            3,
        );
        for _ in 0..3 {
            sync.next().unwrap().unwrap();
        }
        assert_eq!(stored(&store), None);
        assert!(sync.has_next());
        assert_eq!(stored(&store).as_deref(), Some("tokA"));
    }

    #[test]
    fn empty_pages_commit_without_yielding() {
        let store = Rc::new(MemoryCursorStore::new());
        let service = Rc::new(
            FakeService::new()
                .page("alice", "INBOX", "", page(&[], false, "t1"))
                .page("alice", "INBOX", "t1", page(&["i1"], false, "t2"))
                .page("alice", "INBOX", "t2", page(&[], true, "t3")),
        );
        let sync = folder_sync(
            service,
            FolderContext::new("alice", "INBOX", store.clone()),
            10,
            10,
        );

        let records: Vec<_> = sync.collect::<Result<_, _>>().unwrap();
        assert_eq!(subjects(&records), ["i1"]);
        assert_eq!(stored(&store).as_deref(), Some("t3"));
    }

    #[test]
    fn resume_from_final_cursor_yields_nothing_new() {
        let store = Rc::new(MemoryCursorStore::new());
        let service =
            Rc::new(two_page_service().page("alice", "INBOX", "tokB", page(&[], true, "tokB")));

        let first = folder_sync(
            service.clone(),
            FolderContext::new("alice", "INBOX", store.clone()),
            3,
            3,
        );
        assert_eq!(first.count(), 4);

        let second = folder_sync(
            service.clone(),
            FolderContext::new("alice", "INBOX", store.clone()),
            3,
            3,
        );
        assert_eq!(second.count(), 0);
        assert_eq!(stored(&store).as_deref(), Some("tokB"));
        assert_eq!(service.sync_calls().last().unwrap().1, "tokB");
    }

    #[test]
    fn remote_failure_keeps_last_committed_cursor() {
        let store = Rc::new(MemoryCursorStore::new());
        // no page scripted for "tokA": the second sync call fails
        let service = Rc::new(
            FakeService::new().page("alice", "INBOX", "", page(&["i1", "i2"], false, "tokA")),
        );
        let mut sync = folder_sync(
            service,
            FolderContext::new("alice", "INBOX", store.clone()),
            2,
            2,
        );

        sync.next().unwrap().unwrap();
        sync.next().unwrap().unwrap();
        let err = sync.next().unwrap().unwrap_err();
        assert!(matches!(err, SyncError::Folder { .. }));
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(stored(&store).as_deref(), Some("tokA"));
        assert!(sync.next().is_none());
    }

    #[test]
    fn failed_item_batch_leaves_page_uncommitted() {
        let store = Rc::new(MemoryCursorStore::new());
        let service = Rc::new(
            FakeService::new()
                .page("alice", "INBOX", "", page(&["i1", "i2"], true, "tokA"))
                .fail_resolve_of("i2"),
        );
        let sync = folder_sync(
            service,
            FolderContext::new("alice", "INBOX", store.clone()),
            5,
            1,
        );

        let results: Vec<_> = sync.collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert_eq!(stored(&store), None);
    }

    #[test]
    fn cursor_store_failure_surfaces_before_any_remote_call() {
        let service = Rc::new(two_page_service());
        let mut sync = folder_sync(
            service.clone(),
            FolderContext::new("alice", "INBOX", Rc::new(FailingCursorStore)),
            3,
            3,
        );
        let err = sync.next().unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CursorStore);
        assert!(!service.calls().iter().any(|c| matches!(c, Call::Sync { .. })));
    }
}
