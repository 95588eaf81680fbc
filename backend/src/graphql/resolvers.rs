//! Relationship field resolution
//!
//! `Book.borrowedBy` and `User.borrowedBooks` never fail the response: a
//! missing registry, a failed id lookup or an unknown id all shrink the list.

use std::sync::Arc;

use async_graphql::Context;
use async_graphql::dataloader::Loader;
use tracing::{debug, error, warn};

use crate::services::graphql::{BatchLoader, LoaderRegistry};
use crate::services::rpc::{BackendClients, BookRecord, UserRecord};
use crate::services::LendingService;

/// Accessors for the data every schema carries
pub trait GatewayContext {
    fn clients(&self) -> &BackendClients;

    fn lending(&self) -> &Arc<LendingService>;

    /// The request's loaders, present when the request came through
    /// [`crate::AppState::execute`]
    fn loaders(&self) -> Option<&LoaderRegistry>;
}

impl<'a> GatewayContext for Context<'a> {
    fn clients(&self) -> &BackendClients {
        self.data_unchecked::<BackendClients>()
    }

    fn lending(&self) -> &Arc<LendingService> {
        self.data_unchecked::<Arc<LendingService>>()
    }

    fn loaders(&self) -> Option<&LoaderRegistry> {
        self.data_opt::<LoaderRegistry>()
    }
}

/// Users holding an active loan on `book_id`, in the order the book service
/// lists them.
pub async fn borrowers(ctx: &Context<'_>, book_id: &str) -> Vec<UserRecord> {
    let Some(loaders) = ctx.loaders() else {
        error!(book_id, "No loader registry attached to request");
        return Vec::new();
    };

    let ids = match ctx.clients().books.list_borrower_ids(book_id).await {
        Ok(related) if related.success => related.ids,
        Ok(related) => {
            warn!(book_id, reason = %related.message, "Failed to get borrowers for book");
            return Vec::new();
        }
        Err(e) => {
            error!(book_id, error = %e, "Error while fetching borrowers for book");
            return Vec::new();
        }
    };

    debug!(book_id, count = ids.len(), "Resolving borrowers");
    load_present(loaders.users(), &ids).await
}

/// Books on a user's own loan list, in list order.
pub async fn borrowed_books(ctx: &Context<'_>, user_id: &str, book_ids: &[String]) -> Vec<BookRecord> {
    let Some(loaders) = ctx.loaders() else {
        error!(user_id, "No loader registry attached to request");
        return Vec::new();
    };

    debug!(user_id, count = book_ids.len(), "Resolving borrowed books");
    load_present(loaders.books(), book_ids).await
}

/// Load every id through `loader`, keeping only the ids that resolved.
async fn load_present<L>(loader: &BatchLoader<L>, ids: &[String]) -> Vec<L::Value>
where
    L: Loader<String>,
    L::Error: std::fmt::Display,
{
    if ids.is_empty() {
        return Vec::new();
    }
    loader.load_many(ids).await.into_iter().flatten().collect()
}
