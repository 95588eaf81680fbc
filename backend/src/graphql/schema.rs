//! GraphQL schema definition

use std::sync::Arc;

use async_graphql::extensions::Tracing;
use async_graphql::{EmptySubscription, MergedObject, Schema};

use super::mutations::{LendingMutations, UserMutations};
use super::queries::{BookQueries, UserQueries};
use crate::services::{BackendClients, LendingService};

/// The GraphQL schema type
pub type GatewaySchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

#[derive(MergedObject, Default)]
pub struct QueryRoot(BookQueries, UserQueries);

#[derive(MergedObject, Default)]
pub struct MutationRoot(LendingMutations, UserMutations);

/// Build the GraphQL schema with all resolvers.
///
/// Loaders are not schema data: each request attaches its own
/// [`LoaderRegistry`](crate::services::LoaderRegistry).
pub fn build_schema(clients: BackendClients, lending: Arc<LendingService>) -> GatewaySchema {
    Schema::build(QueryRoot::default(), MutationRoot::default(), EmptySubscription)
        .extension(Tracing)
        .data(clients)
        .data(lending)
        .finish()
}
