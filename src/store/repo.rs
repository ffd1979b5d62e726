use anyhow::Result;
use std::cell::RefCell;
use std::collections::HashMap;

/// Durable mapping `(user, folder) -> sync token`.
///
/// Last write wins per key; nothing else is promised.
pub trait CursorStore {
    fn get_last_sync_state(&self, user: &str, folder: &str) -> Result<Option<String>>;
    fn set_sync_state(&self, user: &str, folder: &str, token: &str) -> Result<()>;
}

/// Process-local store, used when nothing durable is wired in.
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    entries: RefCell<HashMap<(String, String), String>>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CursorStore for MemoryCursorStore {
    fn get_last_sync_state(&self, user: &str, folder: &str) -> Result<Option<String>> {
        Ok(self
            .entries
            .borrow()
            .get(&(user.to_string(), folder.to_string()))
            .cloned())
    }

    fn set_sync_state(&self, user: &str, folder: &str, token: &str) -> Result<()> {
        self.entries
            .borrow_mut()
            .insert((user.to_string(), folder.to_string()), token.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_write_wins_per_key() {
        let store = MemoryCursorStore::new();
        assert_eq!(store.get_last_sync_state("alice", "INBOX").unwrap(), None);

        store.set_sync_state("alice", "INBOX", "t1").unwrap();
        store.set_sync_state("alice", "INBOX", "t2").unwrap();
        store.set_sync_state("alice", "Sent", "s1").unwrap();

        assert_eq!(
            store.get_last_sync_state("alice", "INBOX").unwrap().as_deref(),
            Some("t2")
        );
        assert_eq!(
            store.get_last_sync_state("alice", "Sent").unwrap().as_deref(),
            Some("s1")
        );
        assert_eq!(store.get_last_sync_state("bob", "INBOX").unwrap(), None);
    }
}
