//! Host-provided interfaces
//!
//! The subsystem does not own identity or navigation. The embedding
//! application supplies both:
//! - [`Identity`]: who the current user is, gates every mutation
//! - [`Navigator`]: routing into and out of the story-detail view

use crate::store::types::UserId;
use std::sync::RwLock;

/// Identity provider supplied by the host application
pub trait Identity: Send + Sync {
    /// Currently signed-in user, if any
    fn current_user(&self) -> Option<UserId>;

    /// Whether a user is signed in
    fn is_authenticated(&self) -> bool {
        self.current_user().is_some()
    }
}

/// Navigation hooks supplied by the host application
///
/// `open_stories` routes to the story-detail view for an author;
/// `closed` is invoked when a playback session ends (both when the
/// last item finishes and on explicit close).
pub trait Navigator: Send + Sync {
    fn open_stories(&self, author_id: &str);
    fn closed(&self);
}

/// Fixed-user identity, for tests and single-user embeddings
pub struct StaticIdentity {
    user: RwLock<Option<UserId>>,
}

impl StaticIdentity {
    /// Identity signed in as `user`
    pub fn signed_in(user: impl Into<UserId>) -> Self {
        Self {
            user: RwLock::new(Some(user.into())),
        }
    }

    /// Identity with nobody signed in
    pub fn anonymous() -> Self {
        Self {
            user: RwLock::new(None),
        }
    }

    /// Switch the signed-in user
    pub fn set_user(&self, user: Option<UserId>) {
        *self.user.write().unwrap() = user;
    }
}

impl Identity for StaticIdentity {
    fn current_user(&self) -> Option<UserId> {
        self.user.read().unwrap().clone()
    }
}

/// Navigator that ignores all callbacks (headless embeddings, tests)
pub struct NullNavigator;

impl Navigator for NullNavigator {
    fn open_stories(&self, _author_id: &str) {}
    fn closed(&self) {}
}
