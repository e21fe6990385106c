use std::sync::Arc;

use tracing::warn;

use crate::{
    auth::{Argon2Hasher, SessionKeys},
    config::AppConfig,
    db,
    notify::LogNotifier,
    users::{repo::PgUserStore, services::AccountService},
};

#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<AccountService>,
    pub keys: SessionKeys,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let pool = db::connect(&config).await?;
        if let Err(e) = db::migrate(&pool).await {
            warn!(error = %e, "migration failed; continuing");
        }

        let store = Arc::new(PgUserStore::new(pool));
        let notifier = Arc::new(LogNotifier::new(config.mail_from.clone()));
        let service = AccountService::new(config, store, notifier, Argon2Hasher::default());
        Ok(Self::from_service(service))
    }

    pub fn from_service(service: AccountService) -> Self {
        Self {
            keys: service.keys().clone(),
            accounts: Arc::new(service),
        }
    }
}
