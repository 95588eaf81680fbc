// Helper functions shared across GraphQL query/mutation modules.

use futures::TryStreamExt;

use crate::error::{GatewayError, GatewayResult};
use crate::services::rpc::{BackendClients, BookRecord, SearchField, SearchRequest};

/// Upper bound for catalogue-wide scans behind the aggregate queries
pub(crate) const CATALOGUE_SCAN_LIMIT: i32 = 1000;

/// Page size of the unfiltered `books` listing
pub(crate) const DEFAULT_LISTING_LIMIT: i32 = 50;

/// Run a search and drain its result stream.
pub(crate) async fn search_catalogue(
    clients: &BackendClients,
    query: &str,
    field: SearchField,
    limit: i32,
    offset: i32,
) -> GatewayResult<Vec<BookRecord>> {
    let stream = clients
        .books
        .search_books(SearchRequest {
            query: query.to_string(),
            search_type: field,
            limit,
            offset,
        })
        .await?;

    let books: Vec<BookRecord> = stream.try_collect().await?;
    tracing::debug!(query, ?field, hits = books.len(), "Search complete");
    Ok(books)
}

/// Every book in the catalogue, up to [`CATALOGUE_SCAN_LIMIT`]
pub(crate) async fn scan_catalogue(clients: &BackendClients) -> GatewayResult<Vec<BookRecord>> {
    search_catalogue(clients, "", SearchField::All, CATALOGUE_SCAN_LIMIT, 0).await
}

/// Distinct non-blank genres, sorted
pub(crate) fn distinct_genres(books: &[BookRecord]) -> Vec<String> {
    let mut genres: Vec<String> = books
        .iter()
        .filter_map(|b| b.genre.as_deref())
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect();
    genres.sort();
    genres.dedup();
    genres
}

/// Apply offset/limit to an already filtered list
pub(crate) fn page_of<T>(items: Vec<T>, limit: i32, offset: i32) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

/// Log a failed root query and hand the error back for translation
pub(crate) fn log_failure(operation: &'static str, error: GatewayError) -> GatewayError {
    tracing::error!(operation, code = error.code(), error = %error, "Backend call failed");
    error
}
