//! API route definitions
//!
//! The primary API is GraphQL at /graphql. Plain HTTP routes cover probes.

pub mod health;
