//! # simplesync-remote
//!
//! Remote-shell session supervision and the mirror command built on top of it.
//!
//! [`SessionManager`] owns the single multiplexing ssh process; every
//! [`MirrorInvoker::run`] borrows the live [`RemoteSession`] so a pass can only
//! be started against a session that was just confirmed healthy.

pub mod error;
pub mod mirror;
pub mod session;

pub use error::RemoteError;
pub use mirror::{MirrorInvoker, MirrorReport};
pub use session::{RemoteSession, SessionManager};
