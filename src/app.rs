//! Shared application state for the query API

use sqlx::mysql::MySqlPool;

use crate::model::Config;

/// State injected into every Actix handler.
pub struct AppState {
    pub pool: MySqlPool,
    pub config: Config,
}
