//! Data-fetching layer between GraphQL resolvers and the backend clients

pub mod loaders;
pub mod registry;

pub use loaders::{BatchLoader, BookLoader, UserLoader};
pub use registry::{LoaderRegistry, LoaderSettings};
