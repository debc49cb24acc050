//! Identity supplied by the surrounding application's session layer.

use crate::domain::UserId;

/// Source of the currently authenticated user.
///
/// Implemented for any `Fn() -> Option<UserId>`, so a closure over the
/// application's session store is enough.
pub trait SessionSource {
    /// The authenticated user, or `None` when nobody is signed in.
    fn current_user(&self) -> Option<UserId>;
}

impl<F> SessionSource for F
where
    F: Fn() -> Option<UserId>,
{
    fn current_user(&self) -> Option<UserId> {
        self()
    }
}

/// Session with a fixed identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticSession(pub Option<UserId>);

impl SessionSource for StaticSession {
    fn current_user(&self) -> Option<UserId> {
        self.0.clone()
    }
}
