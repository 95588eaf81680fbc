//! Backend clients and the workflows built on them

pub mod graphql;
pub mod lending;
pub mod rpc;
pub mod validation;

pub use graphql::{LoaderRegistry, LoaderSettings};
pub use lending::{BorrowOutcome, LendingService, ReturnOutcome};
pub use rpc::{BackendClients, BookServiceClient, RpcError, RpcStatus, UserServiceClient};
