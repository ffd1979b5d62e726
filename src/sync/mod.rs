//! Lazy harvest pipeline: users, then folders, then pages of item ids,
//! then batches of resolved records. Nothing talks to the server until
//! the consumer pulls.

pub mod chain;
pub mod context;
pub mod folder;
pub mod guard;
pub mod items;
pub mod users;
