//! Cookie-backed sessions.
//!
//! The [`SessionStore`] owns every [`Session`]. Requests only carry the
//! session id; handlers reach the session through a [`SessionRef`].

pub mod cookie;
pub mod id;
pub mod store;

pub use store::{Session, SessionRef, SessionStore};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("secure random source unavailable: {0}")]
    Entropy(#[from] rand::Error),
}
