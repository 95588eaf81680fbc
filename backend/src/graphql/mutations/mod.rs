pub mod lending;
pub mod users;

pub use lending::LendingMutations;
pub use users::UserMutations;

pub(crate) mod prelude {
    pub(crate) use async_graphql::{Context, ErrorExtensions, Object, Result};

    pub(crate) use crate::error::GatewayError;
    pub(crate) use crate::graphql::helpers::*;
    pub(crate) use crate::graphql::resolvers::GatewayContext;
    pub(crate) use crate::graphql::types::*;
}
