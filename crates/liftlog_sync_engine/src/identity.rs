//! Authenticated identity signal.

use crate::feed::{EventFeed, Listener};
use liftlog_model::UserId;
use parking_lot::RwLock;
use tracing::info;

/// A change of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityEvent {
    /// A user signed in, or the session switched to another user.
    SignedIn(UserId),
    /// The user signed out.
    SignedOut,
}

/// A source of the current identity and identity changes.
pub trait IdentityProvider: Send + Sync {
    /// The signed-in user, if any.
    fn current_user(&self) -> Option<UserId>;

    /// Registers a callback for future identity changes.
    fn watch(&self, listener: Listener<IdentityEvent>);
}

/// In-process authentication session.
#[derive(Debug, Default)]
pub struct AuthSession {
    user: RwLock<Option<UserId>>,
    feed: EventFeed<IdentityEvent>,
}

impl AuthSession {
    /// Creates a signed-out session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session already signed in as `user`.
    pub fn signed_in(user: UserId) -> Self {
        Self {
            user: RwLock::new(Some(user)),
            feed: EventFeed::new(),
        }
    }

    /// Signs `user` in, replacing any current user.
    pub fn sign_in(&self, user: UserId) {
        {
            let mut current = self.user.write();
            if current.as_ref() == Some(&user) {
                return;
            }
            *current = Some(user.clone());
        }
        info!(user = %user, "signed in");
        self.feed.emit(IdentityEvent::SignedIn(user));
    }

    /// Signs the current user out.
    pub fn sign_out(&self) {
        if self.user.write().take().is_none() {
            return;
        }
        info!("signed out");
        self.feed.emit(IdentityEvent::SignedOut);
    }
}

impl IdentityProvider for AuthSession {
    fn current_user(&self) -> Option<UserId> {
        self.user.read().clone()
    }

    fn watch(&self, listener: Listener<IdentityEvent>) {
        self.feed.watch(listener);
    }
}

impl<I: IdentityProvider + ?Sized> IdentityProvider for std::sync::Arc<I> {
    fn current_user(&self) -> Option<UserId> {
        (**self).current_user()
    }

    fn watch(&self, listener: Listener<IdentityEvent>) {
        (**self).watch(listener)
    }
}
