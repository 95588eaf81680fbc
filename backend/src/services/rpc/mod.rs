//! Backend RPC contracts
//!
//! The book domain (inventory and the loan ledger) and the user domain
//! (profiles and loan counters) are owned by separate services. The gateway
//! only ever talks to them through [`BookServiceClient`] and
//! [`UserServiceClient`]:
//!
//! - `http` carries the calls as JSON over HTTP to the real services
//! - `memory` hosts both domains in-process (embedded mode and tests)
//!
//! Client handles are shared across requests and carry no per-request state.

pub mod http;
pub mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

pub use http::{HttpBookClient, HttpUserClient};
pub use memory::{InMemoryBookService, InMemoryUserService};

// ============================================================================
// Status and errors
// ============================================================================

/// Status codes a backend can answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RpcStatus {
    NotFound,
    AlreadyExists,
    InvalidArgument,
    FailedPrecondition,
    Unauthenticated,
    PermissionDenied,
    Unavailable,
    DeadlineExceeded,
    Internal,
    Unknown,
}

impl RpcStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RpcStatus::NotFound => "NOT_FOUND",
            RpcStatus::AlreadyExists => "ALREADY_EXISTS",
            RpcStatus::InvalidArgument => "INVALID_ARGUMENT",
            RpcStatus::FailedPrecondition => "FAILED_PRECONDITION",
            RpcStatus::Unauthenticated => "UNAUTHENTICATED",
            RpcStatus::PermissionDenied => "PERMISSION_DENIED",
            RpcStatus::Unavailable => "UNAVAILABLE",
            RpcStatus::DeadlineExceeded => "DEADLINE_EXCEEDED",
            RpcStatus::Internal => "INTERNAL",
            RpcStatus::Unknown => "UNKNOWN",
        }
    }

    /// Parse a wire status name. Unrecognised names become `Unknown`.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "NOT_FOUND" => RpcStatus::NotFound,
            "ALREADY_EXISTS" => RpcStatus::AlreadyExists,
            "INVALID_ARGUMENT" => RpcStatus::InvalidArgument,
            "FAILED_PRECONDITION" => RpcStatus::FailedPrecondition,
            "UNAUTHENTICATED" => RpcStatus::Unauthenticated,
            "PERMISSION_DENIED" => RpcStatus::PermissionDenied,
            "UNAVAILABLE" => RpcStatus::Unavailable,
            "DEADLINE_EXCEEDED" => RpcStatus::DeadlineExceeded,
            "INTERNAL" => RpcStatus::Internal,
            _ => RpcStatus::Unknown,
        }
    }
}

impl fmt::Display for RpcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed remote call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{service} rpc failed with {status}: {message}")]
pub struct RpcError {
    /// Which backend answered (`book-service` / `user-service`)
    pub service: &'static str,
    pub status: RpcStatus,
    pub message: String,
}

impl RpcError {
    pub fn new(service: &'static str, status: RpcStatus, message: impl Into<String>) -> Self {
        Self {
            service,
            status,
            message: message.into(),
        }
    }

    pub fn unavailable(service: &'static str, message: impl Into<String>) -> Self {
        Self::new(service, RpcStatus::Unavailable, message)
    }

    pub fn internal(service: &'static str, message: impl Into<String>) -> Self {
        Self::new(service, RpcStatus::Internal, message)
    }

    /// Transport-level failures, as opposed to answers from the backend.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.status,
            RpcStatus::Unavailable | RpcStatus::DeadlineExceeded
        )
    }
}

pub const BOOK_SERVICE: &str = "book-service";
pub const USER_SERVICE: &str = "user-service";

// ============================================================================
// Records
// ============================================================================

/// A book as owned by the book domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub id: String,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub publication_year: Option<i32>,
    #[serde(default)]
    pub genre: Option<String>,
    pub total_copies: i32,
    pub available_copies: i32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub pages: Option<i32>,
}

impl BookRecord {
    pub fn is_available(&self) -> bool {
        self.available_copies > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Active,
    Suspended,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Membership {
    Basic,
    Premium,
    Student,
}

impl Membership {
    /// Loan limit granted by each membership tier
    pub fn max_books(&self) -> i32 {
        match self {
            Membership::Basic => 3,
            Membership::Student => 5,
            Membership::Premium => 10,
        }
    }
}

/// A user profile as owned by the user domain
///
/// `current_borrowed_books` and `borrowed_book_ids` are the user domain's own
/// view of its loans. Nothing in the gateway writes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub registration_date: DateTime<Utc>,
    pub status: AccountStatus,
    pub membership_type: Membership,
    pub max_books_allowed: i32,
    pub current_borrowed_books: i32,
    pub outstanding_fines: f64,
    #[serde(default)]
    pub borrowed_book_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    Borrowed,
    Returned,
    Overdue,
}

/// One loan in the book domain's ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowTransaction {
    pub transaction_id: String,
    pub book_id: String,
    pub user_id: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub borrow_date: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub due_date: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub return_date: Option<DateTime<Utc>>,
    pub status: LoanStatus,
    pub fine_amount: f64,
}

impl BorrowTransaction {
    /// Stored status with OVERDUE derived from the due date.
    ///
    /// OVERDUE is never written to the ledger; an open loan past its due date
    /// reads as overdue.
    pub fn effective_status(&self, now: DateTime<Utc>) -> LoanStatus {
        match self.status {
            LoanStatus::Borrowed if self.due_date < now => LoanStatus::Overdue,
            status => status,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status != LoanStatus::Returned
    }
}

// ============================================================================
// Requests and replies
// ============================================================================

/// Fields a book search can match on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchField {
    #[default]
    All,
    Title,
    Author,
    Isbn,
    Genre,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub search_type: SearchField,
    pub limit: i32,
    pub offset: i32,
}

/// Related-id listing (`GetBorrowers`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedIds {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowRequest {
    pub book_id: String,
    pub user_id: String,
    pub borrow_epoch: i64,
    pub due_epoch: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowReply {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub due_epoch: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnRequest {
    pub book_id: String,
    pub user_id: String,
    pub return_epoch: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnReply {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub return_epoch: Option<i64>,
    #[serde(default)]
    pub fine_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub membership_type: Membership,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterReply {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub user: Option<UserRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRequest {
    pub user_id: String,
    #[serde(default)]
    pub status_filter: Option<LoanStatus>,
    pub limit: i32,
    pub offset: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub transaction: BorrowTransaction,
    pub book_title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryReply {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    pub total_count: i32,
}

// ============================================================================
// Client traits
// ============================================================================

/// Stream of search hits, each hit independently fallible
pub type BookStream = BoxStream<'static, Result<BookRecord, RpcError>>;

/// Book domain RPC stub
#[async_trait]
pub trait BookServiceClient: Send + Sync {
    /// `Ok(None)` when the book does not exist
    async fn get_book(&self, id: &str) -> Result<Option<BookRecord>, RpcError>;

    /// Batched lookup. Results are key-tagged by `id`; missing ids are omitted.
    async fn get_books(&self, ids: &[String]) -> Result<Vec<BookRecord>, RpcError>;

    async fn search_books(&self, request: SearchRequest) -> Result<BookStream, RpcError>;

    /// Ids of the users currently holding a loan for the book
    async fn list_borrower_ids(&self, book_id: &str) -> Result<RelatedIds, RpcError>;

    async fn borrow_book(&self, request: BorrowRequest) -> Result<BorrowReply, RpcError>;

    async fn return_book(&self, request: ReturnRequest) -> Result<ReturnReply, RpcError>;

    async fn borrow_history(&self, request: HistoryRequest) -> Result<HistoryReply, RpcError>;

    async fn ping(&self) -> Result<(), RpcError>;
}

/// User domain RPC stub
#[async_trait]
pub trait UserServiceClient: Send + Sync {
    /// `Ok(None)` when the user does not exist
    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, RpcError>;

    /// Batched lookup. Results are key-tagged by `id`; missing ids are omitted.
    async fn get_users(&self, ids: &[String]) -> Result<Vec<UserRecord>, RpcError>;

    async fn register_user(&self, request: RegisterRequest) -> Result<RegisterReply, RpcError>;

    async fn ping(&self) -> Result<(), RpcError>;
}

/// The pair of long-lived backend handles
#[derive(Clone)]
pub struct BackendClients {
    pub books: Arc<dyn BookServiceClient>,
    pub users: Arc<dyn UserServiceClient>,
}

impl BackendClients {
    pub fn new(books: Arc<dyn BookServiceClient>, users: Arc<dyn UserServiceClient>) -> Self {
        Self { books, users }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn loan(status: LoanStatus, due_in_days: i64) -> BorrowTransaction {
        let now = Utc::now();
        BorrowTransaction {
            transaction_id: "t1".to_string(),
            book_id: "1".to_string(),
            user_id: "1".to_string(),
            borrow_date: now - Duration::days(7),
            due_date: now + Duration::days(due_in_days),
            return_date: None,
            status,
            fine_amount: 0.0,
        }
    }

    #[test]
    fn test_overdue_is_derived_from_due_date() {
        let now = Utc::now();
        assert_eq!(loan(LoanStatus::Borrowed, -1).effective_status(now), LoanStatus::Overdue);
        assert_eq!(loan(LoanStatus::Borrowed, 3).effective_status(now), LoanStatus::Borrowed);
        assert_eq!(loan(LoanStatus::Returned, -1).effective_status(now), LoanStatus::Returned);
    }

    #[test]
    fn test_status_names_round_trip_through_wire_names() {
        assert_eq!(RpcStatus::from_name("failed_precondition"), RpcStatus::FailedPrecondition);
        assert_eq!(RpcStatus::from_name("DEADLINE_EXCEEDED"), RpcStatus::DeadlineExceeded);
        assert_eq!(RpcStatus::from_name("SOMETHING_ELSE"), RpcStatus::Unknown);
    }

    #[test]
    fn test_only_outages_are_transient() {
        assert!(RpcError::unavailable(BOOK_SERVICE, "down").is_transient());
        assert!(RpcError::new(USER_SERVICE, RpcStatus::DeadlineExceeded, "slow").is_transient());
        assert!(!RpcError::new(BOOK_SERVICE, RpcStatus::NotFound, "Book not found").is_transient());
        assert!(!RpcError::internal(BOOK_SERVICE, "bad body").is_transient());
    }

    #[test]
    fn test_membership_limits() {
        assert_eq!(Membership::Basic.max_books(), 3);
        assert_eq!(Membership::Student.max_books(), 5);
        assert_eq!(Membership::Premium.max_books(), 10);
    }
}
