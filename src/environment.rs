use std::sync::Arc;

use log::Logger;

use crate::config::Config;
use crate::db::SafeDb;
use crate::store::SafeStore;

/// The collaborators every operation runs against.
#[derive(Clone)]
pub struct Environment {
    pub logger: Arc<Logger>,
    pub db: Arc<SafeDb>,
    pub store: Arc<SafeStore>,
    pub config: Config,
}

impl Environment {
    pub fn new(logger: Arc<Logger>, db: Arc<SafeDb>, store: Arc<SafeStore>, config: Config) -> Self {
        Self {
            logger,
            db,
            store,
            config,
        }
    }
}
