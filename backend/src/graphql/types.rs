//! GraphQL type definitions
//!
//! Entity types wrap the backend records; relationship fields are resolved in
//! [`super::resolvers`] through the request's loaders.

use async_graphql::{Context, Enum, InputObject, Object, SimpleObject};
use chrono::{DateTime, Utc};

use super::resolvers;
use crate::error::{GatewayError, GatewayResult};
use crate::services::lending::{BorrowOutcome, ReturnOutcome};
use crate::services::rpc::{
    AccountStatus, BookRecord, HistoryEntry, LoanStatus, Membership, SearchField, UserRecord,
};
use crate::services::validation::{self, Violations};

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Enum)]
#[graphql(rename_items = "SCREAMING_SNAKE_CASE")]
pub enum SearchType {
    #[default]
    All,
    Title,
    Author,
    Isbn,
    Genre,
}

impl From<SearchType> for SearchField {
    fn from(t: SearchType) -> Self {
        match t {
            SearchType::All => SearchField::All,
            SearchType::Title => SearchField::Title,
            SearchType::Author => SearchField::Author,
            SearchType::Isbn => SearchField::Isbn,
            SearchType::Genre => SearchField::Genre,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
#[graphql(rename_items = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Active,
    Suspended,
    Inactive,
}

impl From<AccountStatus> for UserStatus {
    fn from(status: AccountStatus) -> Self {
        match status {
            AccountStatus::Active => UserStatus::Active,
            AccountStatus::Suspended => UserStatus::Suspended,
            AccountStatus::Inactive => UserStatus::Inactive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Enum)]
#[graphql(rename_items = "SCREAMING_SNAKE_CASE")]
pub enum MembershipType {
    #[default]
    Basic,
    Premium,
    Student,
}

impl From<Membership> for MembershipType {
    fn from(m: Membership) -> Self {
        match m {
            Membership::Basic => MembershipType::Basic,
            Membership::Premium => MembershipType::Premium,
            Membership::Student => MembershipType::Student,
        }
    }
}

impl From<MembershipType> for Membership {
    fn from(m: MembershipType) -> Self {
        match m {
            MembershipType::Basic => Membership::Basic,
            MembershipType::Premium => Membership::Premium,
            MembershipType::Student => Membership::Student,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
#[graphql(rename_items = "SCREAMING_SNAKE_CASE")]
pub enum BorrowStatus {
    Borrowed,
    Returned,
    Overdue,
}

impl From<LoanStatus> for BorrowStatus {
    fn from(status: LoanStatus) -> Self {
        match status {
            LoanStatus::Borrowed => BorrowStatus::Borrowed,
            LoanStatus::Returned => BorrowStatus::Returned,
            LoanStatus::Overdue => BorrowStatus::Overdue,
        }
    }
}

impl From<BorrowStatus> for LoanStatus {
    fn from(status: BorrowStatus) -> Self {
        match status {
            BorrowStatus::Borrowed => LoanStatus::Borrowed,
            BorrowStatus::Returned => LoanStatus::Returned,
            BorrowStatus::Overdue => LoanStatus::Overdue,
        }
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A catalogue entry from the book service
#[derive(Debug, Clone)]
pub struct Book(pub BookRecord);

#[Object]
impl Book {
    async fn id(&self) -> &str {
        &self.0.id
    }

    async fn title(&self) -> &str {
        &self.0.title
    }

    async fn author(&self) -> &str {
        &self.0.author
    }

    async fn isbn(&self) -> Option<&str> {
        self.0.isbn.as_deref()
    }

    async fn publisher(&self) -> Option<&str> {
        self.0.publisher.as_deref()
    }

    async fn publication_year(&self) -> Option<i32> {
        self.0.publication_year
    }

    async fn genre(&self) -> Option<&str> {
        self.0.genre.as_deref()
    }

    async fn total_copies(&self) -> i32 {
        self.0.total_copies
    }

    async fn available_copies(&self) -> i32 {
        self.0.available_copies
    }

    /// Whether at least one copy can be borrowed right now
    async fn is_available(&self) -> bool {
        self.0.is_available()
    }

    async fn description(&self) -> Option<&str> {
        self.0.description.as_deref()
    }

    async fn language(&self) -> Option<&str> {
        self.0.language.as_deref()
    }

    async fn pages(&self) -> Option<i32> {
        self.0.pages
    }

    /// Users currently holding a copy. Degrades to an empty list.
    async fn borrowed_by(&self, ctx: &Context<'_>) -> Vec<User> {
        resolvers::borrowers(ctx, &self.0.id)
            .await
            .into_iter()
            .map(User)
            .collect()
    }
}

/// A member profile from the user service
#[derive(Debug, Clone)]
pub struct User(pub UserRecord);

#[Object]
impl User {
    async fn id(&self) -> &str {
        &self.0.id
    }

    async fn username(&self) -> &str {
        &self.0.username
    }

    async fn email(&self) -> &str {
        &self.0.email
    }

    async fn first_name(&self) -> &str {
        &self.0.first_name
    }

    async fn last_name(&self) -> &str {
        &self.0.last_name
    }

    async fn full_name(&self) -> String {
        format!("{} {}", self.0.first_name, self.0.last_name)
    }

    async fn phone(&self) -> Option<&str> {
        self.0.phone.as_deref()
    }

    async fn address(&self) -> Option<&str> {
        self.0.address.as_deref()
    }

    async fn registration_date(&self) -> DateTime<Utc> {
        self.0.registration_date
    }

    async fn status(&self) -> UserStatus {
        self.0.status.into()
    }

    async fn membership_type(&self) -> MembershipType {
        self.0.membership_type.into()
    }

    async fn max_books_allowed(&self) -> i32 {
        self.0.max_books_allowed
    }

    async fn current_borrowed_books(&self) -> i32 {
        self.0.current_borrowed_books
    }

    async fn outstanding_fines(&self) -> f64 {
        self.0.outstanding_fines
    }

    async fn borrowed_book_ids(&self) -> Vec<String> {
        self.0.borrowed_book_ids.clone()
    }

    /// Books on the user's own loan list. Degrades to an empty list.
    async fn borrowed_books(&self, ctx: &Context<'_>) -> Vec<Book> {
        resolvers::borrowed_books(ctx, &self.0.id, &self.0.borrowed_book_ids)
            .await
            .into_iter()
            .map(Book)
            .collect()
    }
}

/// One loan from the book service's ledger
#[derive(Debug, Clone, SimpleObject)]
pub struct BorrowRecord {
    pub transaction_id: String,
    pub book_id: String,
    pub book_title: String,
    pub borrow_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: BorrowStatus,
    pub fine_amount: f64,
}

impl From<HistoryEntry> for BorrowRecord {
    fn from(entry: HistoryEntry) -> Self {
        let t = entry.transaction;
        Self {
            transaction_id: t.transaction_id,
            book_id: t.book_id,
            book_title: entry.book_title,
            borrow_date: t.borrow_date,
            due_date: t.due_date,
            return_date: t.return_date,
            status: t.status.into(),
            fine_amount: t.fine_amount,
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, SimpleObject)]
pub struct BookResponse {
    pub success: bool,
    pub message: String,
    pub error_code: Option<String>,
    pub book: Option<Book>,
}

impl BookResponse {
    pub fn failed(error: &GatewayError) -> Self {
        let descriptor = error.describe();
        Self {
            success: false,
            message: descriptor.message,
            error_code: Some(descriptor.code.to_string()),
            book: None,
        }
    }
}

#[derive(Debug, SimpleObject)]
pub struct BooksResponse {
    pub success: bool,
    pub message: String,
    pub error_code: Option<String>,
    pub books: Vec<Book>,
    pub total_count: i32,
}

impl BooksResponse {
    pub fn found(books: Vec<BookRecord>) -> Self {
        Self {
            success: true,
            message: "Books retrieved successfully".to_string(),
            error_code: None,
            total_count: books.len() as i32,
            books: books.into_iter().map(Book).collect(),
        }
    }

    pub fn failed(error: &GatewayError) -> Self {
        let descriptor = error.describe();
        Self {
            success: false,
            message: descriptor.message,
            error_code: Some(descriptor.code.to_string()),
            books: Vec::new(),
            total_count: 0,
        }
    }
}

#[derive(Debug, SimpleObject)]
pub struct UserResponse {
    pub success: bool,
    pub message: String,
    pub error_code: Option<String>,
    pub user: Option<User>,
}

impl UserResponse {
    pub fn failed(error: &GatewayError) -> Self {
        let descriptor = error.describe();
        Self {
            success: false,
            message: descriptor.message,
            error_code: Some(descriptor.code.to_string()),
            user: None,
        }
    }
}

#[derive(Debug, SimpleObject)]
pub struct BorrowHistoryResponse {
    pub success: bool,
    pub message: String,
    pub error_code: Option<String>,
    pub history: Vec<BorrowRecord>,
    /// Matching loans before paging
    pub total_count: i32,
}

impl BorrowHistoryResponse {
    pub fn failed(error: &GatewayError) -> Self {
        let descriptor = error.describe();
        Self {
            success: false,
            message: descriptor.message,
            error_code: Some(descriptor.code.to_string()),
            history: Vec::new(),
            total_count: 0,
        }
    }
}

#[derive(Debug, SimpleObject)]
pub struct BorrowResponse {
    pub success: bool,
    pub message: String,
    pub error_code: Option<String>,
    pub transaction_id: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub book: Option<Book>,
    pub user: Option<User>,
}

impl From<BorrowOutcome> for BorrowResponse {
    fn from(o: BorrowOutcome) -> Self {
        Self {
            success: o.success,
            message: o.message,
            error_code: o.error_code.map(str::to_string),
            transaction_id: o.transaction_id,
            due_date: o.due_date,
            book: o.book.map(Book),
            user: o.user.map(User),
        }
    }
}

#[derive(Debug, SimpleObject)]
pub struct ReturnResponse {
    pub success: bool,
    pub message: String,
    pub error_code: Option<String>,
    pub transaction_id: Option<String>,
    pub return_date: Option<DateTime<Utc>>,
    pub fine_amount: f64,
    pub book: Option<Book>,
    pub user: Option<User>,
}

impl From<ReturnOutcome> for ReturnResponse {
    fn from(o: ReturnOutcome) -> Self {
        Self {
            success: o.success,
            message: o.message,
            error_code: o.error_code.map(str::to_string),
            transaction_id: o.transaction_id,
            return_date: o.return_date,
            fine_amount: o.fine_amount,
            book: o.book.map(Book),
            user: o.user.map(User),
        }
    }
}

// ============================================================================
// Inputs
// ============================================================================

#[derive(Debug, Clone, InputObject)]
pub struct BookSearchInput {
    #[graphql(default)]
    pub query: String,
    #[graphql(default)]
    pub search_type: SearchType,
    #[graphql(default = 10)]
    pub limit: i32,
    #[graphql(default)]
    pub offset: i32,
}

impl BookSearchInput {
    pub fn validate(&self) -> GatewayResult<()> {
        let mut v = Violations::new();
        validation::max_chars(&mut v, "query", &self.query, validation::MAX_QUERY_CHARS);
        validation::page(&mut v, self.limit, self.offset);
        v.finish()
    }
}

#[derive(Debug, Clone, InputObject)]
pub struct UserInput {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[graphql(default)]
    pub membership_type: MembershipType,
}

impl UserInput {
    pub fn validate(&self) -> GatewayResult<()> {
        let mut v = Violations::new();
        validation::username(&mut v, &self.username);
        validation::email(&mut v, &self.email);
        validation::person_name(&mut v, "firstName", &self.first_name);
        validation::person_name(&mut v, "lastName", &self.last_name);
        if let Some(phone) = &self.phone {
            validation::phone(&mut v, phone);
        }
        if let Some(address) = &self.address {
            validation::address(&mut v, address);
        }
        v.finish()
    }
}

#[derive(Debug, Clone, InputObject)]
pub struct BorrowBookInput {
    pub book_id: String,
    pub user_id: String,
    /// Defaults to the configured loan period from now
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, InputObject)]
pub struct ReturnBookInput {
    pub book_id: String,
    pub user_id: String,
    /// Defaults to now
    pub return_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, InputObject)]
pub struct BorrowHistoryInput {
    pub user_id: String,
    pub status_filter: Option<BorrowStatus>,
    #[graphql(default = 10)]
    pub limit: i32,
    #[graphql(default)]
    pub offset: i32,
}

impl BorrowHistoryInput {
    pub fn validate(&self) -> GatewayResult<()> {
        let mut v = Violations::new();
        validation::required_id(&mut v, "userId", &self.user_id);
        validation::page(&mut v, self.limit, self.offset);
        v.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn user_input() -> UserInput {
        UserInput {
            username: "dora_reads".to_string(),
            email: "dora@library.example".to_string(),
            first_name: "Dora".to_string(),
            last_name: "Explorer".to_string(),
            phone: Some("+14155550100".to_string()),
            address: None,
            membership_type: MembershipType::Student,
        }
    }

    #[test]
    fn test_valid_user_input() {
        assert!(user_input().validate().is_ok());
    }

    #[test]
    fn test_user_input_reports_every_violation() {
        let input = UserInput {
            username: "x".to_string(),
            email: "nope".to_string(),
            ..user_input()
        };
        assert_matches!(
            input.validate(),
            Err(GatewayError::Validation(msg)) if msg.contains("username") && msg.contains("email")
        );
    }

    #[test]
    fn test_search_input_bounds() {
        let input = BookSearchInput {
            query: "q".repeat(101),
            search_type: SearchType::Title,
            limit: 0,
            offset: 0,
        };
        assert_matches!(
            input.validate(),
            Err(GatewayError::Validation(msg)) if msg.contains("query") && msg.contains("limit")
        );
    }

    #[test]
    fn test_history_input_requires_user() {
        let input = BorrowHistoryInput {
            user_id: String::new(),
            status_filter: None,
            limit: 10,
            offset: 0,
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_enum_conversions_round_trip_through_backend_types() {
        assert_eq!(Membership::from(MembershipType::Premium).max_books(), 10);
        assert_eq!(BorrowStatus::from(LoanStatus::from(BorrowStatus::Overdue)), BorrowStatus::Overdue);
    }
}
