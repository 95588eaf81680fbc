//! GraphQL API
//!
//! Root queries call the backend clients directly. Relationship fields
//! (`Book.borrowedBy`, `User.borrowedBooks`) go through the request's batch
//! loaders so a list of N parents costs one batched lookup per entity type
//! instead of N point lookups.
//!
//! Queries and mutations live in domain modules under `queries/` and
//! `mutations/` and are combined with `MergedObject` in `schema.rs`.

pub mod helpers;
pub mod mutations;
pub mod queries;
pub mod resolvers;
mod schema;
pub mod types;

pub use resolvers::GatewayContext;
pub use schema::{GatewaySchema, MutationRoot, QueryRoot, build_schema};
