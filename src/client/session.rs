//! Signed-in session.

use std::fmt;
use std::sync::{PoisonError, RwLock};

use tracing::debug;
use zeroize::Zeroizing;

use crate::core::{AuthContext, UserId};

struct Credentials {
    user: UserId,
    token: Zeroizing<String>,
}

/// Cached authentication state shared by the backends and the reconcilers.
///
/// The access token is zeroized when replaced or dropped and never printed.
#[derive(Default)]
pub struct Session {
    credentials: RwLock<Option<Credentials>>,
}

impl Session {
    /// Signed-out session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Session already signed in.
    pub fn signed_in(user: UserId, access_token: impl Into<String>) -> Self {
        let session = Self::new();
        session.sign_in(user, access_token);
        session
    }

    /// Store new credentials, replacing any previous ones.
    pub fn sign_in(&self, user: UserId, access_token: impl Into<String>) {
        debug!(user = %user, "session signed in");
        *self.credentials.write().unwrap_or_else(PoisonError::into_inner) = Some(Credentials {
            user,
            token: Zeroizing::new(access_token.into()),
        });
    }

    /// Forget the credentials.
    pub fn sign_out(&self) {
        let previous = self
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(credentials) = previous {
            debug!(user = %credentials.user, "session signed out");
        }
    }

    /// Check if a user is signed in.
    pub fn is_signed_in(&self) -> bool {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Copy of the access token for an `Authorization` header.
    pub(crate) fn bearer(&self) -> Option<Zeroizing<String>> {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|c| c.token.clone())
    }
}

impl AuthContext for Session {
    fn current_user(&self) -> Option<UserId> {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|c| c.user.clone())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let user = self.current_user();
        f.debug_struct("Session")
            .field("user", &user)
            .field("token", &user.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
