use log::{error, warn};
use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{ErrorKind, SyncError};

/// A user whose harvest was cut short, kept for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFailure {
    pub user: String,
    pub kind: ErrorKind,
    pub message: String,
}

pub type FailureLog = Rc<RefCell<Vec<UserFailure>>>;

pub(crate) fn record_failure(log: &FailureLog, user: &str, err: &SyncError) {
    let message = err.detail();
    error!("skipping rest of user {user}: {message}");
    log.borrow_mut().push(UserFailure {
        user: user.to_string(),
        kind: err.kind(),
        message,
    });
}

/// Turns an isolated failure of one user's records into the end of that
/// user's sequence, so the harvest moves on to the next user.
///
/// Fatal failures are passed through untouched.
pub struct Guarded<I> {
    user: String,
    inner: I,
    failures: FailureLog,
    done: bool,
}

impl<I> Guarded<I> {
    pub fn new(user: impl Into<String>, inner: I, failures: FailureLog) -> Self {
        Self {
            user: user.into(),
            inner,
            failures,
            done: false,
        }
    }
}

impl<T, I> Iterator for Guarded<I>
where
    I: Iterator<Item = Result<T, SyncError>>,
{
    type Item = Result<T, SyncError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.inner.next() {
            Some(Err(e)) if e.is_isolated() => {
                record_failure(&self.failures, &self.user, &e);
                self.done = true;
                None
            }
            Some(Err(e)) => {
                warn!("fatal failure while harvesting {}: {}", self.user, e.detail());
                self.done = true;
                Some(Err(e))
            }
            Some(ok) => Some(ok),
            None => {
                self.done = true;
                None
            }
        }
    }
}
