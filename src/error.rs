use std::fmt;

/// Failure reported by a remote mail service call.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Credentials rejected by the remote service.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The service answered but reported an application-level error.
    #[error("service error {code}: {message}")]
    Protocol { code: String, message: String },

    /// The service could not be reached or the connection broke.
    #[error("transport error{}: {message}", .status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Transport { status: Option<u16>, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    Protocol,
    Transport,
    CursorStore,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Authentication => "authentication",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Transport => "transport",
            ErrorKind::CursorStore => "cursor-store",
            ErrorKind::Other => "other",
        };
        f.write_str(s)
    }
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Authentication(_) => ErrorKind::Authentication,
            ServiceError::Protocol { .. } => ErrorKind::Protocol,
            ServiceError::Transport { .. } => ErrorKind::Transport,
            ServiceError::Other(_) => ErrorKind::Other,
        }
    }
}

/// Failure raised while harvesting, tagged with the user and folder it hit.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("cannot discover folders of {user}")]
    Discovery {
        user: String,
        #[source]
        source: ServiceError,
    },

    #[error("cannot synchronize folder {folder} of {user}")]
    Folder {
        user: String,
        folder: String,
        #[source]
        source: ServiceError,
    },

    #[error("cannot resolve items of folder {folder} of {user}")]
    Items {
        user: String,
        folder: String,
        #[source]
        source: ServiceError,
    },

    #[error("cursor store failed for folder {folder} of {user}")]
    CursorStore {
        user: String,
        folder: String,
        #[source]
        source: anyhow::Error,
    },
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Discovery { source, .. }
            | SyncError::Folder { source, .. }
            | SyncError::Items { source, .. } => source.kind(),
            SyncError::CursorStore { .. } => ErrorKind::CursorStore,
        }
    }

    pub fn user(&self) -> &str {
        match self {
            SyncError::Discovery { user, .. }
            | SyncError::Folder { user, .. }
            | SyncError::Items { user, .. }
            | SyncError::CursorStore { user, .. } => user,
        }
    }

    /// Whether the failure only concerns the current user.
    ///
    /// Authentication and cursor-store failures end the whole harvest: progress
    /// that cannot be recorded, or credentials that are rejected, would fail
    /// the same way for every other user.
    pub fn is_isolated(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Authentication | ErrorKind::CursorStore)
    }

    /// Full cause chain on one line, for logs.
    pub fn detail(&self) -> String {
        let mut out = self.to_string();
        let mut cause = std::error::Error::source(self);
        while let Some(c) = cause {
            out.push_str(": ");
            out.push_str(&c.to_string());
            cause = c.source();
        }
        out
    }
}
