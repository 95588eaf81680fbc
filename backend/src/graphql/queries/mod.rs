pub mod books;
pub mod users;

pub use books::BookQueries;
pub use users::UserQueries;

pub(crate) mod prelude {
    pub(crate) use async_graphql::{Context, ErrorExtensions, Object, Result};

    pub(crate) use crate::error::GatewayError;
    pub(crate) use crate::graphql::helpers::*;
    pub(crate) use crate::graphql::resolvers::GatewayContext;
    pub(crate) use crate::graphql::types::*;
    pub(crate) use crate::services::rpc::SearchField;
    pub(crate) use crate::services::validation::{self, Violations};
}
