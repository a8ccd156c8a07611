//! Login and bearer-token authentication.

use uuid::Uuid;

use crate::DuetError;
use crate::entities::{UserRecord, UserStore};
use crate::services::CredentialService;

const BAD_LOGIN: &str = "Invalid username or password";

pub struct AuthHandler<S> {
    store: S,
    credentials: CredentialService,
}

impl<S: UserStore> AuthHandler<S> {
    pub fn new(store: S, credentials: CredentialService) -> Self {
        Self { store, credentials }
    }

    /// Check a username/password pair and issue a bearer token.
    ///
    /// Unknown users and wrong passwords fail identically.
    pub async fn login(&self, username: &str, password: &str) -> Result<(UserRecord, String), DuetError> {
        let Some(user) = self.store.find_user_by_username(username.trim()).await? else {
            return Err(DuetError::Unauthorized(BAD_LOGIN.into()));
        };
        if !self.credentials.verify_password(password, &user.password_hash)? {
            return Err(DuetError::Unauthorized(BAD_LOGIN.into()));
        }
        let token = self.credentials.issue_token(user.id)?;
        tracing::info!(user_id = %user.id, "login succeeded");
        Ok((user, token))
    }

    /// Resolve a bearer token to its user.
    pub async fn authenticate(&self, token: &str) -> Result<UserRecord, DuetError> {
        let user_id: Uuid = self.credentials.verify_token(token)?;
        match self.store.get_user(user_id).await {
            Ok(user) => Ok(user),
            // Token outlived its account.
            Err(crate::entities::StoreError::NotFound { .. }) => {
                Err(DuetError::Unauthorized("Invalid token".into()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
