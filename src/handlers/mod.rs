pub mod items;
pub mod memorandums;
pub mod requests;
pub mod uploads;
pub mod users;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::storage::ObjectStorage;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub items: Arc<crate::services::items::ItemService>,
    pub requests: Arc<crate::services::requests::RequestService>,
    pub memorandums: Arc<crate::services::memorandums::MemorandumService>,
    pub users: Arc<crate::services::users::UserService>,
    pub storage: Arc<dyn ObjectStorage>,
}

impl AppServices {
    /// Build the services container backing the HTTP handlers.
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: EventSender,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        let items = Arc::new(crate::services::items::ItemService::new(
            db_pool.clone(),
            event_sender.clone(),
        ));
        let requests = Arc::new(crate::services::requests::RequestService::new(
            db_pool.clone(),
            event_sender.clone(),
        ));
        let memorandums = Arc::new(crate::services::memorandums::MemorandumService::new(
            db_pool.clone(),
            event_sender,
        ));
        let users = Arc::new(crate::services::users::UserService::new(db_pool));

        Self {
            items,
            requests,
            memorandums,
            users,
            storage,
        }
    }
}
