//! Wiring of the core components for one CLI invocation.

use std::sync::Arc;

use duet_core::entities::SqliteStore;
use duet_core::handlers::{AuthHandler, ChatHandler, MessageOrchestrator, UserHandler};
use duet_core::runtime::ResidencyManager;
use duet_core::services::{
    CloudinaryUploader, CredentialService, DiffusionLoader, InferenceClient, LlamaLoader,
};
use duet_core::{Config, DuetError};

pub struct AppState {
    pub config: Config,
    pub store: SqliteStore,
    pub residency: Arc<ResidencyManager>,
}

impl AppState {
    pub async fn open(config: Config) -> anyhow::Result<Self> {
        let store = SqliteStore::connect(&config.database_url).await?;

        let client = InferenceClient::new(&config.inference);
        let residency = Arc::new(ResidencyManager::new(
            Arc::new(LlamaLoader::new(client.clone(), config.text.clone())),
            Arc::new(DiffusionLoader::new(client, config.image.clone())),
        ));

        Ok(Self {
            config,
            store,
            residency,
        })
    }

    fn credentials(&self) -> Result<CredentialService, DuetError> {
        Ok(CredentialService::new(
            self.config.secret_key.as_deref(),
            self.config.token_ttl_minutes,
        )?)
    }

    pub fn users(&self) -> Result<UserHandler<SqliteStore>, DuetError> {
        Ok(UserHandler::new(self.store.clone(), self.credentials()?))
    }

    pub fn auth(&self) -> Result<AuthHandler<SqliteStore>, DuetError> {
        Ok(AuthHandler::new(self.store.clone(), self.credentials()?))
    }

    pub fn chats(&self) -> ChatHandler<SqliteStore> {
        ChatHandler::new(self.store.clone())
    }

    pub fn messages(&self) -> MessageOrchestrator<SqliteStore> {
        MessageOrchestrator::new(
            self.store.clone(),
            Arc::clone(&self.residency),
            Arc::new(CloudinaryUploader::new(&self.config.cloudinary)),
            self.config.cloudinary.folder.clone(),
        )
    }
}
