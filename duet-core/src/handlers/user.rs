use uuid::Uuid;

use crate::DuetError;
use crate::entities::{UserRecord, UserStore};
use crate::handlers::check_len;
use crate::services::CredentialService;

pub const MAX_USERNAME: usize = 50;
pub const MAX_EMAIL: usize = 100;

pub struct UserHandler<S> {
    store: S,
    credentials: CredentialService,
}

impl<S: UserStore> UserHandler<S> {
    pub fn new(store: S, credentials: CredentialService) -> Self {
        Self { store, credentials }
    }

    /// Create an account. The password is stored hashed.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserRecord, DuetError> {
        let username = username.trim();
        let email = email.trim();
        if username.is_empty() {
            return Err(DuetError::BadRequest("username must not be empty".into()));
        }
        check_len("username", username, MAX_USERNAME)?;
        if !email.contains('@') {
            return Err(DuetError::BadRequest("email must be a valid address".into()));
        }
        check_len("email", email, MAX_EMAIL)?;
        if password.is_empty() {
            return Err(DuetError::BadRequest("password must not be empty".into()));
        }

        let user = UserRecord {
            id: Uuid::new_v4(),
            username: username.to_owned(),
            email: email.to_owned(),
            password_hash: self.credentials.hash_password(password)?,
        };
        self.store.create_user(user.clone()).await?;
        tracing::info!(user_id = %user.id, username = %user.username, "user registered");
        Ok(user)
    }

    pub async fn get(&self, id: Uuid) -> Result<UserRecord, DuetError> {
        Ok(self.store.get_user(id).await?)
    }
}
