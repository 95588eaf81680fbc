//! Per-request loader container

use std::time::Duration;

use super::loaders::{BatchLoader, BookLoader, UserLoader};
use crate::services::rpc::BackendClients;

/// Default wait once a window has settled
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(1);

/// Loader tuning shared by every request
#[derive(Debug, Clone, Copy)]
pub struct LoaderSettings {
    /// Extra wait after a window settles before it dispatches
    pub batch_delay: Duration,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            batch_delay: DEFAULT_BATCH_DELAY,
        }
    }
}

/// One loader per entity type, bound to one GraphQL request.
///
/// Built by the HTTP handler and attached with `Request::data`, so every
/// resolver of the request shares the same caches and the whole registry is
/// dropped with the request.
pub struct LoaderRegistry {
    books: BatchLoader<BookLoader>,
    users: BatchLoader<UserLoader>,
}

impl LoaderRegistry {
    pub fn for_request(clients: &BackendClients, settings: &LoaderSettings) -> Self {
        Self {
            books: BatchLoader::new(
                "book",
                BookLoader::new(clients.books.clone()),
                settings.batch_delay,
            ),
            users: BatchLoader::new(
                "user",
                UserLoader::new(clients.users.clone()),
                settings.batch_delay,
            ),
        }
    }

    pub fn books(&self) -> &BatchLoader<BookLoader> {
        &self.books
    }

    pub fn users(&self) -> &BatchLoader<UserLoader> {
        &self.users
    }

    /// Entity types this registry serves
    pub fn entity_types(&self) -> Vec<&'static str> {
        vec![self.books.entity(), self.users.entity()]
    }
}
