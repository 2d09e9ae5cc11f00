//! Shared application state.

use std::sync::Arc;

use brewpos_db::Database;

use crate::auth::JwtManager;
use crate::config::ServerConfig;
use crate::storage::Storage;

/// State handed to every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<ServerConfig>,
    pub jwt: Arc<JwtManager>,
    pub storage: Arc<Storage>,
}

impl AppState {
    pub fn new(db: Database, config: ServerConfig) -> Self {
        let jwt = JwtManager::new(config.jwt_secret.clone(), config.jwt_lifetime_secs);
        let storage = Storage::new(config.storage_dir.clone());

        AppState {
            db,
            config: Arc::new(config),
            jwt: Arc::new(jwt),
            storage: Arc::new(storage),
        }
    }
}
